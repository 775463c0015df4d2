// Application layer: pipelines wiring the core algorithms to storage and Custom Vision.

pub mod pipelines;

pub use pipelines::dataset_pipeline::DatasetPipeline;
pub use pipelines::frames_pipeline::FramesPipeline;
pub use pipelines::upload_pipeline::UploadPipeline;
