pub mod boxes;
pub mod cvat;
pub mod etl;
pub mod sampling;
pub mod strategy;

pub use crate::domain::model::{DatasetLabels, FrameLabels, ImageFileCreateEntry};
pub use crate::domain::ports::{
    DatasetConfig, FrameExtractor, FramesConfig, Pipeline, Storage, TrainingApi, UploadConfig,
};
pub use crate::utils::error::Result;
