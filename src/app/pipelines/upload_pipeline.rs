use crate::app::pipelines::dataset_pipeline::LABELS_FILE_NAME;
use crate::core::strategy::{strategy_for, UploadStrategy};
use crate::core::{DatasetLabels, ImageFileCreateEntry, Pipeline, Storage, TrainingApi, UploadConfig};
use crate::domain::model::{LabelDefinitions, Project, TagIndex, TagType, UploadReport};
use crate::utils::error::{PipelineError, Result};
use async_trait::async_trait;
use std::io::{Cursor, Read};
use std::sync::Mutex;
use zip::ZipArchive;

/// 一次上傳的影像數上限（Custom Vision 的限制）
pub const MAX_BATCH_SIZE: usize = 64;

pub struct UploadSource {
    pub definitions: LabelDefinitions,
    pub archive: Vec<u8>,
    pub labels: DatasetLabels,
}

pub struct PreparedUpload {
    pub project: Project,
    pub tags: TagIndex,
    pub archive: Vec<u8>,
    pub labels: DatasetLabels,
}

/// 找出同名專案，沒有則以 `General` domain 建立
pub async fn initialize_project<A: TrainingApi + ?Sized>(
    api: &A,
    project_name: &str,
    domain_type: &str,
) -> Result<Project> {
    if let Some(project) = api
        .get_projects()
        .await?
        .into_iter()
        .find(|p| p.name == project_name)
    {
        tracing::info!("Using existing project {} ({})", project.name, project.id);
        return Ok(project);
    }

    let domain = api
        .get_domains()
        .await?
        .into_iter()
        .find(|d| d.domain_type == domain_type && d.name == "General")
        .ok_or_else(|| {
            PipelineError::processing(format!(
                "No General domain of type {} is available",
                domain_type
            ))
        })?;

    let project = api.create_project(project_name, &domain.id).await?;
    tracing::info!("🆕 Created project {} ({})", project.name, project.id);
    Ok(project)
}

/// 載入專案既有標籤並建立缺少的標籤
pub async fn populate_project_tags<A: TrainingApi + ?Sized>(
    api: &A,
    project: &Project,
    desired_tags: &[String],
) -> Result<TagIndex> {
    let mut tags: TagIndex = api
        .get_tags(&project.id)
        .await?
        .into_iter()
        .map(|tag| (tag.name.clone(), tag))
        .collect();

    for label in desired_tags {
        if !tags.contains_key(label) {
            let tag = api
                .create_tag(&project.id, label, TagType::for_name(label))
                .await?;
            tracing::debug!("Created {} tag {}", tag.tag_type.as_str(), tag.name);
            tags.insert(label.clone(), tag);
        }
    }

    tracing::info!("Loaded tags: {:?}", tags.keys().collect::<Vec<_>>());
    Ok(tags)
}

/// 上傳一批影像；空批次不送出，失敗時記錄每張影像的狀態並回傳 `false`
pub async fn upload_batch<A: TrainingApi + ?Sized>(
    api: &A,
    project: &Project,
    batch: &[ImageFileCreateEntry],
) -> Result<bool> {
    if batch.is_empty() {
        return Ok(true);
    }

    let summary = api.create_images_from_files(&project.id, batch).await?;
    if !summary.is_batch_successful {
        tracing::error!("❌ Image batch upload failed.");
        for image in &summary.images {
            tracing::error!(
                "Image status: {} - {}",
                image.source_url.as_deref().unwrap_or("<unknown>"),
                image.status
            );
        }
        return Ok(false);
    }

    Ok(true)
}

/// 資料集壓縮檔 -> Custom Vision 訓練專案
pub struct UploadPipeline<S: Storage, C: UploadConfig, A: TrainingApi> {
    storage: S,
    config: C,
    api: A,
    strategy: Box<dyn UploadStrategy>,
    report: Mutex<UploadReport>,
}

impl<S: Storage, C: UploadConfig, A: TrainingApi> UploadPipeline<S, C, A> {
    pub fn new(storage: S, config: C, api: A) -> Self {
        let strategy = strategy_for(
            config.project_kind(),
            config.target_label(),
            config.include_all_labels(),
        );
        Self {
            storage,
            config,
            api,
            strategy,
            report: Mutex::new(UploadReport::default()),
        }
    }

    pub fn report(&self) -> UploadReport {
        self.report
            .lock()
            .map(|r| r.clone())
            .unwrap_or_default()
    }

    fn batch_size(&self) -> usize {
        self.config.batch_size().clamp(1, MAX_BATCH_SIZE)
    }

    async fn send(&self, project: &Project, batch: Vec<ImageFileCreateEntry>) -> Result<()> {
        tracing::info!("Uploading in a batch of {}...", batch.len());
        let uploaded = upload_batch(&self.api, project, &batch).await?;
        tracing::info!("Batch upload status: {}", uploaded);

        if let Ok(mut report) = self.report.lock() {
            report.batches += 1;
            report.entries += batch.len();
            if !uploaded {
                report.failed_batches += 1;
            }
        }
        Ok(())
    }
}

fn read_entry(archive: &mut ZipArchive<Cursor<Vec<u8>>>, name: &str) -> Result<Vec<u8>> {
    let mut entry = archive.by_name(name)?;
    let mut data = Vec::with_capacity(entry.size() as usize);
    entry.read_to_end(&mut data)?;
    Ok(data)
}

#[async_trait]
impl<S: Storage, C: UploadConfig, A: TrainingApi> Pipeline for UploadPipeline<S, C, A> {
    type Extracted = UploadSource;
    type Transformed = PreparedUpload;

    fn name(&self) -> &str {
        "upload"
    }

    async fn extract(&self) -> Result<UploadSource> {
        let definitions_raw = self.storage.read_file(self.config.labels_def_path()).await?;
        let definitions: LabelDefinitions = serde_json::from_slice(&definitions_raw)?;

        let archive = self.storage.read_file(self.config.dataset_path()).await?;
        let mut zip = ZipArchive::new(Cursor::new(archive))?;
        let labels: DatasetLabels = serde_json::from_slice(&read_entry(&mut zip, LABELS_FILE_NAME)?)?;

        tracing::info!(
            "Loaded {} labelled images and {} label definitions",
            labels.len(),
            definitions.labels.len()
        );

        Ok(UploadSource {
            definitions,
            archive: zip.into_inner().into_inner(),
            labels,
        })
    }

    async fn transform(&self, source: UploadSource) -> Result<PreparedUpload> {
        let strategy = &self.strategy;
        tracing::info!(
            "Preparing {} project {}",
            strategy.kind(),
            strategy.project_name()
        );

        let project =
            initialize_project(&self.api, strategy.project_name(), strategy.domain_type()).await?;
        let desired = strategy.desired_tags(&source.definitions);
        let tags = populate_project_tags(&self.api, &project, &desired).await?;

        Ok(PreparedUpload {
            project,
            tags,
            archive: source.archive,
            labels: source.labels,
        })
    }

    async fn load(&self, prepared: PreparedUpload) -> Result<String> {
        let batch_size = self.batch_size();
        let mut zip = ZipArchive::new(Cursor::new(prepared.archive))?;
        let mut pending: Vec<ImageFileCreateEntry> = Vec::new();

        // 逐張讀取影像，湊滿一批就上傳
        for (file_name, frame) in &prepared.labels {
            let contents = read_entry(&mut zip, file_name)?;
            pending.extend(self.strategy.entries_for_image(
                file_name,
                contents,
                frame,
                &prepared.tags,
            )?);

            while pending.len() >= batch_size {
                let batch: Vec<_> = pending.drain(..batch_size).collect();
                self.send(&prepared.project, batch).await?;
            }
        }

        if !pending.is_empty() {
            self.send(&prepared.project, pending).await?;
        }

        let report = self.report();
        tracing::info!(
            "📊 Uploaded {} images in {} batches ({} failed)",
            report.entries,
            report.batches,
            report.failed_batches
        );

        Ok(format!(
            "{} project {}: {} images in {} batches, {} failed",
            self.strategy.kind(),
            prepared.project.name,
            report.entries,
            report.batches,
            report.failed_batches
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::storage::LocalStorage;
    use crate::domain::model::{
        BoxPoints, Domain, FrameLabels, ImageCreateResult, ImageCreateSummary, LabelShape,
        ProjectKind, Tag,
    };
    use std::io::Write;
    use std::sync::Mutex as StdMutex;
    use tempfile::TempDir;
    use zip::write::SimpleFileOptions;
    use zip::ZipWriter;

    #[derive(Default)]
    struct FakeApi {
        projects: Vec<Project>,
        tags: Vec<Tag>,
        created_tags: StdMutex<Vec<(String, TagType)>>,
        created_projects: StdMutex<Vec<(String, String)>>,
        batches: StdMutex<Vec<usize>>,
        // 前 N 個批次回報失敗
        failing_batches: usize,
    }

    #[async_trait]
    impl TrainingApi for FakeApi {
        async fn get_projects(&self) -> Result<Vec<Project>> {
            Ok(self.projects.clone())
        }

        async fn get_domains(&self) -> Result<Vec<Domain>> {
            Ok(vec![
                Domain {
                    id: "d-compact".to_string(),
                    name: "General (compact)".to_string(),
                    domain_type: "ObjectDetection".to_string(),
                },
                Domain {
                    id: "d-general".to_string(),
                    name: "General".to_string(),
                    domain_type: "ObjectDetection".to_string(),
                },
            ])
        }

        async fn create_project(&self, name: &str, domain_id: &str) -> Result<Project> {
            self.created_projects
                .lock()
                .unwrap()
                .push((name.to_string(), domain_id.to_string()));
            Ok(Project {
                id: "new".to_string(),
                name: name.to_string(),
                description: None,
            })
        }

        async fn get_tags(&self, _project_id: &str) -> Result<Vec<Tag>> {
            Ok(self.tags.clone())
        }

        async fn create_tag(&self, _project_id: &str, name: &str, tag_type: TagType) -> Result<Tag> {
            self.created_tags
                .lock()
                .unwrap()
                .push((name.to_string(), tag_type));
            Ok(Tag {
                id: format!("id-{}", name),
                name: name.to_string(),
                tag_type,
            })
        }

        async fn create_images_from_files(
            &self,
            _project_id: &str,
            entries: &[ImageFileCreateEntry],
        ) -> Result<ImageCreateSummary> {
            let failed = {
                let mut batches = self.batches.lock().unwrap();
                batches.push(entries.len());
                batches.len() <= self.failing_batches
            };
            Ok(ImageCreateSummary {
                is_batch_successful: !failed,
                images: entries
                    .iter()
                    .map(|e| ImageCreateResult {
                        source_url: Some(e.name.clone()),
                        status: if failed { "ErrorSource" } else { "OK" }.to_string(),
                    })
                    .collect(),
            })
        }
    }

    fn project(name: &str) -> Project {
        Project {
            id: "p1".to_string(),
            name: name.to_string(),
            description: None,
        }
    }

    fn entry(name: &str) -> ImageFileCreateEntry {
        ImageFileCreateEntry {
            name: name.to_string(),
            contents: vec![],
            regions: vec![],
            tag_ids: vec!["t".to_string()],
        }
    }

    #[tokio::test]
    async fn test_initialize_reuses_existing_project() {
        let api = FakeApi {
            projects: vec![project("Other"), project("PotDetection")],
            ..Default::default()
        };

        let found = initialize_project(&api, "PotDetection", "ObjectDetection")
            .await
            .unwrap();

        assert_eq!(found.name, "PotDetection");
        assert!(api.created_projects.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_initialize_creates_with_general_domain() {
        let api = FakeApi::default();

        let created = initialize_project(&api, "PotDetection", "ObjectDetection")
            .await
            .unwrap();

        assert_eq!(created.id, "new");
        assert_eq!(
            *api.created_projects.lock().unwrap(),
            vec![("PotDetection".to_string(), "d-general".to_string())]
        );
    }

    #[tokio::test]
    async fn test_initialize_without_domain_fails() {
        let api = FakeApi::default();
        assert!(initialize_project(&api, "PotClassification", "Classification")
            .await
            .is_err());
    }

    #[tokio::test]
    async fn test_populate_creates_missing_and_negative_tags() {
        let api = FakeApi {
            tags: vec![Tag {
                id: "existing".to_string(),
                name: "full".to_string(),
                tag_type: TagType::Regular,
            }],
            ..Default::default()
        };

        let desired = vec!["full".to_string(), "empty".to_string(), "?".to_string()];
        let tags = populate_project_tags(&api, &project("PotClassification"), &desired)
            .await
            .unwrap();

        assert_eq!(tags.len(), 3);
        assert_eq!(tags["full"].id, "existing");
        assert_eq!(
            *api.created_tags.lock().unwrap(),
            vec![
                ("empty".to_string(), TagType::Regular),
                ("?".to_string(), TagType::Negative)
            ]
        );
    }

    #[tokio::test]
    async fn test_upload_batch_skips_empty_and_reports_failure() {
        let api = FakeApi {
            failing_batches: 1,
            ..Default::default()
        };
        let p = project("PotDetection");

        assert!(upload_batch(&api, &p, &[]).await.unwrap());
        assert!(api.batches.lock().unwrap().is_empty());

        assert!(!upload_batch(&api, &p, &[entry("a"), entry("b")]).await.unwrap());
        assert_eq!(*api.batches.lock().unwrap(), vec![2]);
    }

    struct SmallBatches {
        dataset: String,
        definitions: String,
    }

    impl UploadConfig for SmallBatches {
        fn dataset_path(&self) -> &str {
            &self.dataset
        }

        fn labels_def_path(&self) -> &str {
            &self.definitions
        }

        fn project_kind(&self) -> ProjectKind {
            ProjectKind::Detection
        }

        fn target_label(&self) -> &str {
            "pot"
        }

        fn include_all_labels(&self) -> bool {
            false
        }

        fn batch_size(&self) -> usize {
            2
        }
    }

    fn write_detection_dataset(dir: &std::path::Path, images: usize) -> SmallBatches {
        let mut labels = DatasetLabels::new();
        let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
        for i in 0..images {
            let frame = format!("frame{:06}.jpg", i);
            let key = format!("clip_{}", frame);
            zip.start_file(key.as_str(), SimpleFileOptions::default()).unwrap();
            zip.write_all(b"jpeg").unwrap();
            labels.insert(
                key,
                FrameLabels {
                    clip: "clip".to_string(),
                    frame,
                    width: 100,
                    height: 100,
                    labels: vec![LabelShape {
                        label: "pot".to_string(),
                        shape_type: "box".to_string(),
                        occluded: false,
                        points: Some(BoxPoints {
                            x: 10.0,
                            y: 10.0,
                            width: 20.0,
                            height: 20.0,
                        }),
                        properties: Default::default(),
                    }],
                },
            );
        }
        zip.start_file(LABELS_FILE_NAME, SimpleFileOptions::default()).unwrap();
        zip.write_all(&serde_json::to_vec(&labels).unwrap()).unwrap();

        let dataset = dir.join("dataset.zip");
        std::fs::write(&dataset, zip.finish().unwrap().into_inner()).unwrap();
        let definitions = dir.join("labels_config.json");
        std::fs::write(
            &definitions,
            r#"{"labels": [{"name": "pot", "attributes": []}]}"#,
        )
        .unwrap();

        SmallBatches {
            dataset: dataset.to_string_lossy().into_owned(),
            definitions: definitions.to_string_lossy().into_owned(),
        }
    }

    #[tokio::test]
    async fn test_failed_batch_does_not_stop_upload() {
        let temp_dir = TempDir::new().unwrap();
        let config = write_detection_dataset(temp_dir.path(), 5);
        let api = FakeApi {
            projects: vec![project("PotDetection")],
            failing_batches: 1,
            ..Default::default()
        };
        let pipeline = UploadPipeline::new(LocalStorage::default(), config, api);

        let source = pipeline.extract().await.unwrap();
        let prepared = pipeline.transform(source).await.unwrap();
        let summary = pipeline.load(prepared).await.unwrap();

        // 5 張影像、每批 2 張：第一批失敗後仍繼續上傳其餘批次
        assert_eq!(*pipeline.api.batches.lock().unwrap(), vec![2, 2, 1]);
        let report = pipeline.report();
        assert_eq!(report.batches, 3);
        assert_eq!(report.entries, 5);
        assert_eq!(report.failed_batches, 1);
        assert!(summary.ends_with("5 images in 3 batches, 1 failed"));
    }
}
