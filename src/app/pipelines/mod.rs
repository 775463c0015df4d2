pub mod dataset_pipeline;
pub mod frames_pipeline;
pub mod upload_pipeline;
