use crate::adapters::storage::join_path;
use crate::core::{FrameExtractor, FramesConfig, Pipeline, Storage};
use crate::utils::error::{PipelineError, Result};
use async_trait::async_trait;
use std::io::{Cursor, Write};
use std::path::{Path, PathBuf};
use tempfile::{NamedTempFile, TempDir};
use zip::write::SimpleFileOptions;
use zip::ZipWriter;

#[derive(Debug)]
pub struct ExtractedFrames {
    // 保留暫存目錄直到壓縮完成
    _frames_dir: TempDir,
    pub files: Vec<PathBuf>,
}

/// 影片 -> 每秒影格的 JPEG 壓縮檔
pub struct FramesPipeline<S: Storage, C: FramesConfig, E: FrameExtractor> {
    storage: S,
    config: C,
    extractor: E,
}

impl<S: Storage, C: FramesConfig, E: FrameExtractor> FramesPipeline<S, C, E> {
    pub fn new(storage: S, config: C, extractor: E) -> Self {
        Self {
            storage,
            config,
            extractor,
        }
    }

    fn clip_name(&self) -> String {
        Path::new(self.config.video_path())
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "frames".to_string())
    }
}

#[async_trait]
impl<S: Storage, C: FramesConfig, E: FrameExtractor> Pipeline for FramesPipeline<S, C, E> {
    type Extracted = NamedTempFile;
    type Transformed = ExtractedFrames;

    fn name(&self) -> &str {
        "extract-frames"
    }

    async fn extract(&self) -> Result<NamedTempFile> {
        let video_path = self.config.video_path();
        tracing::info!("Extracting frames from video clip: {}", video_path);

        let data = self.storage.read_file(video_path).await?;
        let mut input_file = tempfile::Builder::new().suffix(".mp4").tempfile()?;
        input_file.write_all(&data)?;
        input_file.flush()?;

        tracing::debug!("Stored {} bytes in {}", data.len(), input_file.path().display());
        Ok(input_file)
    }

    async fn transform(&self, input_file: NamedTempFile) -> Result<ExtractedFrames> {
        let frames_dir = TempDir::new()?;
        self.extractor
            .extract(input_file.path(), frames_dir.path(), self.config.frame_rate())
            .await?;

        let mut files = Vec::new();
        let mut entries = tokio::fs::read_dir(frames_dir.path()).await?;
        while let Some(entry) = entries.next_entry().await? {
            if entry.file_type().await?.is_file() {
                files.push(entry.path());
            }
        }
        files.sort();

        if files.is_empty() {
            return Err(PipelineError::processing(format!(
                "No frames were extracted from {}",
                self.config.video_path()
            )));
        }

        Ok(ExtractedFrames {
            _frames_dir: frames_dir,
            files,
        })
    }

    async fn load(&self, frames: ExtractedFrames) -> Result<String> {
        let mut zip = ZipWriter::new(Cursor::new(Vec::new()));

        // 所有影格放在壓縮檔根目錄
        for path in &frames.files {
            let name = path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .ok_or_else(|| PipelineError::processing(format!("Invalid frame path {}", path.display())))?;
            let data = tokio::fs::read(path).await?;
            zip.start_file(name.as_str(), SimpleFileOptions::default())?;
            zip.write_all(&data)?;
            tracing::debug!("Adding file {} to the archive.", name);
        }

        let zip_data = zip.finish()?.into_inner();
        let output_path = join_path(self.config.output_dir(), &format!("{}.zip", self.clip_name()));
        self.storage.write_file(&output_path, &zip_data).await?;

        tracing::info!("🎞️ Stored {} frame files into {}", frames.files.len(), output_path);
        Ok(output_path)
    }
}
