pub mod adapters;
pub mod app;
pub mod config;
pub mod core;
pub mod domain;
pub mod utils;

#[cfg(feature = "cli")]
pub use config::Cli;

pub use adapters::custom_vision::{CustomVisionClient, CustomVisionSettings};
pub use adapters::ffmpeg::FfmpegExtractor;
pub use adapters::storage::LocalStorage;
pub use app::{DatasetPipeline, FramesPipeline, UploadPipeline};
pub use config::JobConfig;
pub use crate::core::etl::EtlEngine;
pub use utils::error::{PipelineError, Result};
