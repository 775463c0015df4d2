use crate::domain::model::{
    Domain, ImageCreateSummary, ImageFileCreateEntry, ProjectKind, Project, Tag, TagType,
};
use crate::utils::error::Result;
use async_trait::async_trait;
use std::path::Path;

pub trait Storage: Send + Sync {
    fn read_file(&self, path: &str) -> impl std::future::Future<Output = Result<Vec<u8>>> + Send;
    fn write_file(
        &self,
        path: &str,
        data: &[u8],
    ) -> impl std::future::Future<Output = Result<()>> + Send;
    /// 列出目錄下的檔案名稱（不含子目錄），依名稱排序
    fn list_files(&self, dir: &str) -> impl std::future::Future<Output = Result<Vec<String>>> + Send;
}

pub trait DatasetConfig: Send + Sync {
    fn clips_dir(&self) -> &str;
    fn labels_dir(&self) -> &str;
    fn output_dir(&self) -> &str;
    /// `None` 表示不抽樣
    fn max_clip_frames(&self) -> Option<usize>;
    fn seed(&self) -> Option<u64>;
}

pub trait UploadConfig: Send + Sync {
    fn dataset_path(&self) -> &str;
    fn labels_def_path(&self) -> &str;
    fn project_kind(&self) -> ProjectKind;
    fn target_label(&self) -> &str;
    fn include_all_labels(&self) -> bool;
    fn batch_size(&self) -> usize;
}

pub trait FramesConfig: Send + Sync {
    fn video_path(&self) -> &str;
    fn output_dir(&self) -> &str;
    fn frame_rate(&self) -> &str;
}

#[async_trait]
pub trait Pipeline: Send + Sync {
    type Extracted: Send;
    type Transformed: Send;

    fn name(&self) -> &str;
    async fn extract(&self) -> Result<Self::Extracted>;
    async fn transform(&self, data: Self::Extracted) -> Result<Self::Transformed>;
    async fn load(&self, result: Self::Transformed) -> Result<String>;
}

/// Custom Vision 訓練 API
#[async_trait]
pub trait TrainingApi: Send + Sync {
    async fn get_projects(&self) -> Result<Vec<Project>>;
    async fn get_domains(&self) -> Result<Vec<Domain>>;
    async fn create_project(&self, name: &str, domain_id: &str) -> Result<Project>;
    async fn get_tags(&self, project_id: &str) -> Result<Vec<Tag>>;
    async fn create_tag(&self, project_id: &str, name: &str, tag_type: TagType) -> Result<Tag>;
    async fn create_images_from_files(
        &self,
        project_id: &str,
        entries: &[ImageFileCreateEntry],
    ) -> Result<ImageCreateSummary>;
}

#[async_trait]
pub trait FrameExtractor: Send + Sync {
    async fn extract(&self, video: &Path, frames_dir: &Path, frame_rate: &str) -> Result<()>;
}
