use crate::adapters::storage::join_path;
use crate::core::cvat::parse_clip_labels;
use crate::core::sampling::{rng_from_seed, sample_frames};
use crate::core::{DatasetConfig, DatasetLabels, Pipeline, Storage};
use crate::domain::model::ClipAnnotations;
use crate::utils::error::{PipelineError, Result};
use async_trait::async_trait;
use std::io::{Cursor, Read, Write};
use std::path::Path;
use zip::write::SimpleFileOptions;
use zip::{ZipArchive, ZipWriter};

pub const LABELS_FILE_NAME: &str = "labels.json";

/// 影片片段的影格壓縮檔 + CVAT 標註 -> 訓練資料集壓縮檔
pub struct DatasetPipeline<S: Storage, C: DatasetConfig> {
    storage: S,
    config: C,
}

impl<S: Storage, C: DatasetConfig> DatasetPipeline<S, C> {
    pub fn new(storage: S, config: C) -> Self {
        Self { storage, config }
    }

    /// `dataset-YYYYmmdd-HHMMSS[-filtered-N].zip`
    pub fn archive_name(&self, timestamp: chrono::DateTime<chrono::Local>) -> String {
        let suffix = self
            .config
            .max_clip_frames()
            .map(|max| format!("-filtered-{}", max))
            .unwrap_or_default();
        format!("dataset-{}{}.zip", timestamp.format("%Y%m%d-%H%M%S"), suffix)
    }

    fn copy_labelled_frames(
        clip: &ClipAnnotations,
        archive: &[u8],
        zip_to: &mut ZipWriter<Cursor<Vec<u8>>>,
    ) -> Result<()> {
        let mut zip_from = ZipArchive::new(Cursor::new(archive))?;

        for (key, frame) in &clip.frames {
            let mut entry = zip_from.by_name(&frame.frame).map_err(|e| {
                PipelineError::processing(format!(
                    "Frame {} is labelled but missing from {}: {}",
                    frame.frame, clip.archive_path, e
                ))
            })?;

            let mut data = Vec::with_capacity(entry.size() as usize);
            entry.read_to_end(&mut data)?;

            zip_to.start_file(key.as_str(), SimpleFileOptions::default())?;
            zip_to.write_all(&data)?;
        }

        Ok(())
    }
}

/// 與原始工具輸出一致的 4 格縮排 JSON
pub fn labels_to_json(labels: &DatasetLabels) -> Result<Vec<u8>> {
    let mut buffer = Vec::new();
    let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
    let mut serializer = serde_json::Serializer::with_formatter(&mut buffer, formatter);
    serde::Serialize::serialize(labels, &mut serializer)?;
    Ok(buffer)
}

#[async_trait]
impl<S: Storage, C: DatasetConfig> Pipeline for DatasetPipeline<S, C> {
    type Extracted = Vec<ClipAnnotations>;
    type Transformed = Vec<ClipAnnotations>;

    fn name(&self) -> &str {
        "build-dataset"
    }

    async fn extract(&self) -> Result<Vec<ClipAnnotations>> {
        let clip_files = self.storage.list_files(self.config.clips_dir()).await?;
        let mut clips = Vec::with_capacity(clip_files.len());

        for clip_file in clip_files {
            tracing::info!("Processing {}...", clip_file);

            let clip_name = Path::new(&clip_file)
                .file_stem()
                .map(|s| s.to_string_lossy().into_owned())
                .unwrap_or_else(|| clip_file.clone());

            let label_path = join_path(self.config.labels_dir(), &format!("{}.xml", clip_name));
            let xml = self.storage.read_file(&label_path).await.map_err(|e| {
                PipelineError::processing(format!(
                    "Cannot read labels {} for clip {}: {}",
                    label_path, clip_file, e
                ))
            })?;
            let xml = String::from_utf8(xml).map_err(|e| {
                PipelineError::processing(format!("{} is not valid UTF-8: {}", label_path, e))
            })?;

            let frames = parse_clip_labels(&clip_name, &xml)?;
            tracing::debug!("Clip {} has {} labelled frames", clip_name, frames.len());

            clips.push(ClipAnnotations {
                clip_name,
                archive_path: join_path(self.config.clips_dir(), &clip_file),
                frames,
            });
        }

        tracing::info!("Extracted annotations for {} clips", clips.len());
        Ok(clips)
    }

    async fn transform(&self, clips: Vec<ClipAnnotations>) -> Result<Vec<ClipAnnotations>> {
        let max = self.config.max_clip_frames();
        let mut rng = rng_from_seed(self.config.seed());

        // 每個片段各自抽樣，減少同一片段中大量相似的影格
        Ok(clips
            .into_iter()
            .map(|mut clip| {
                let before = clip.frames.len();
                clip.frames = sample_frames(clip.frames, max, &mut rng);
                if clip.frames.len() < before {
                    tracing::debug!(
                        "Sampled {} of {} frames from {}",
                        clip.frames.len(),
                        before,
                        clip.clip_name
                    );
                }
                clip
            })
            .collect())
    }

    async fn load(&self, clips: Vec<ClipAnnotations>) -> Result<String> {
        let archive_name = self.archive_name(chrono::Local::now());
        let output_path = join_path(self.config.output_dir(), &archive_name);

        let mut zip_to = ZipWriter::new(Cursor::new(Vec::new()));
        let mut all_labels = DatasetLabels::new();

        for clip in clips {
            let archive = self.storage.read_file(&clip.archive_path).await?;
            Self::copy_labelled_frames(&clip, &archive, &mut zip_to)?;
            all_labels.extend(clip.frames);
        }

        zip_to.start_file(LABELS_FILE_NAME, SimpleFileOptions::default())?;
        zip_to.write_all(&labels_to_json(&all_labels)?)?;

        let zip_data = zip_to.finish()?.into_inner();
        tracing::debug!(
            "Writing dataset ({} frames, {} bytes) to {}",
            all_labels.len(),
            zip_data.len(),
            output_path
        );
        self.storage.write_file(&output_path, &zip_data).await?;

        tracing::info!("📦 Stored {} labelled frames into {}", all_labels.len(), output_path);
        Ok(output_path)
    }
}
