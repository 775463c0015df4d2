use crate::adapters::custom_vision::CustomVisionSettings;
use crate::core::sampling::max_frames_from_arg;
use crate::core::strategy::DEFAULT_TARGET_LABEL;
use crate::core::{DatasetConfig, FramesConfig, UploadConfig};
use crate::domain::model::ProjectKind;
use crate::utils::error::{PipelineError, Result};
use crate::utils::validation::{
    validate_file_extension, validate_frame_rate, validate_non_empty_string, validate_path,
    validate_range, Validate,
};
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobConfig {
    pub job: JobInfo,
    pub frames: Option<FramesSection>,
    pub dataset: Option<DatasetSection>,
    pub upload: Option<UploadSection>,
    pub custom_vision: Option<CustomVisionSettings>,
    pub monitoring: Option<MonitoringSection>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobInfo {
    pub name: String,
    #[serde(default)]
    pub description: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FramesSection {
    #[serde(default = "enabled")]
    pub enabled: bool,
    pub video: String,
    pub output_path: String,
    #[serde(default = "default_frame_rate")]
    pub frame_rate: String,
    #[serde(default = "default_ffmpeg")]
    pub ffmpeg: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatasetSection {
    #[serde(default = "enabled")]
    pub enabled: bool,
    pub clips_path: String,
    pub labels_path: String,
    pub output_path: String,
    #[serde(default = "default_max_frames")]
    pub max_clip_frames: i64,
    pub seed: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadSection {
    #[serde(default = "enabled")]
    pub enabled: bool,
    /// 未設定時使用同一個作業剛產生的資料集
    pub dataset_path: Option<String>,
    pub labels_definitions: String,
    pub project_type: ProjectKind,
    #[serde(default = "default_target_label")]
    pub target_label: String,
    #[serde(default)]
    pub include_all_labels: bool,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonitoringSection {
    pub enabled: bool,
    /// RUST_LOG 未設定時的日誌等級
    pub log_level: Option<String>,
}

const LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

fn enabled() -> bool {
    true
}

fn default_frame_rate() -> String {
    "1/1".to_string()
}

fn default_ffmpeg() -> String {
    "ffmpeg".to_string()
}

fn default_max_frames() -> i64 {
    -1
}

fn default_target_label() -> String {
    DEFAULT_TARGET_LABEL.to_string()
}

fn default_batch_size() -> usize {
    64
}

impl JobConfig {
    /// 從 TOML 檔案載入配置
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(&path)?;
        Self::from_toml_str(&content)
    }

    /// 從 TOML 字串解析配置
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let processed = Self::substitute_env_vars(content);
        toml::from_str(&processed)
            .map_err(|e| PipelineError::config(format!("TOML parsing error: {}", e)))
    }

    /// 替換環境變數 (例如 ${CUSTOM_VISION_TRAINING_KEY})；未設定的變數保持原樣
    fn substitute_env_vars(content: &str) -> String {
        let re = regex::Regex::new(r"\$\{([A-Za-z_][A-Za-z0-9_]*)\}").expect("valid env var pattern");

        re.replace_all(content, |caps: &regex::Captures| {
            let var_name = &caps[1];
            std::env::var(var_name).unwrap_or_else(|_| format!("${{{}}}", var_name))
        })
        .into_owned()
    }

    pub fn monitoring_enabled(&self) -> bool {
        self.monitoring.as_ref().map(|m| m.enabled).unwrap_or(false)
    }

    pub fn log_level(&self) -> Option<&str> {
        self.monitoring.as_ref().and_then(|m| m.log_level.as_deref())
    }

    pub fn frames_stage(&self) -> Option<&FramesSection> {
        self.frames.as_ref().filter(|s| s.enabled)
    }

    pub fn dataset_stage(&self) -> Option<&DatasetSection> {
        self.dataset.as_ref().filter(|s| s.enabled)
    }

    pub fn upload_stage(&self) -> Option<&UploadSection> {
        self.upload.as_ref().filter(|s| s.enabled)
    }
}

impl Validate for JobConfig {
    fn validate(&self) -> Result<()> {
        validate_non_empty_string("job.name", &self.job.name)?;

        if self.frames_stage().is_none() && self.dataset_stage().is_none() && self.upload_stage().is_none() {
            return Err(PipelineError::config("No enabled stage in job configuration"));
        }

        if let Some(level) = self.log_level() {
            if !LOG_LEVELS.contains(&level.trim().to_ascii_lowercase().as_str()) {
                return Err(PipelineError::InvalidConfigValueError {
                    field: "monitoring.log_level".to_string(),
                    value: level.to_string(),
                    reason: format!("Expected one of: {}", LOG_LEVELS.join(", ")),
                });
            }
        }

        if let Some(frames) = self.frames_stage() {
            validate_path("frames.video", &frames.video)?;
            validate_path("frames.output_path", &frames.output_path)?;
            validate_frame_rate("frames.frame_rate", &frames.frame_rate)?;
        }

        if let Some(dataset) = self.dataset_stage() {
            validate_path("dataset.clips_path", &dataset.clips_path)?;
            validate_path("dataset.labels_path", &dataset.labels_path)?;
            validate_path("dataset.output_path", &dataset.output_path)?;
        }

        if let Some(upload) = self.upload_stage() {
            match &upload.dataset_path {
                Some(path) => validate_file_extension("upload.dataset_path", path, &["zip"])?,
                None if self.dataset_stage().is_none() => {
                    return Err(PipelineError::MissingConfigError {
                        field: "upload.dataset_path".to_string(),
                    })
                }
                None => {}
            }
            validate_path("upload.labels_definitions", &upload.labels_definitions)?;
            validate_range("upload.batch_size", upload.batch_size, 1, 64)?;

            let custom_vision = self.custom_vision.as_ref().ok_or_else(|| {
                PipelineError::MissingConfigError {
                    field: "custom_vision".to_string(),
                }
            })?;
            if custom_vision.training_key.starts_with("${") {
                return Err(PipelineError::MissingConfigError {
                    field: custom_vision.training_key.clone(),
                });
            }
            custom_vision.validate()?;
        }

        Ok(())
    }
}

impl FramesConfig for FramesSection {
    fn video_path(&self) -> &str {
        &self.video
    }

    fn output_dir(&self) -> &str {
        &self.output_path
    }

    fn frame_rate(&self) -> &str {
        &self.frame_rate
    }
}

impl DatasetConfig for DatasetSection {
    fn clips_dir(&self) -> &str {
        &self.clips_path
    }

    fn labels_dir(&self) -> &str {
        &self.labels_path
    }

    fn output_dir(&self) -> &str {
        &self.output_path
    }

    fn max_clip_frames(&self) -> Option<usize> {
        max_frames_from_arg(self.max_clip_frames)
    }

    fn seed(&self) -> Option<u64> {
        self.seed
    }
}

/// 上傳階段的設定，資料集路徑在執行時才決定
#[derive(Debug, Clone)]
pub struct ResolvedUpload {
    pub section: UploadSection,
    pub dataset_path: String,
}

impl UploadSection {
    pub fn resolve(&self, built_dataset: Option<&str>) -> Result<ResolvedUpload> {
        let dataset_path = self
            .dataset_path
            .as_deref()
            .or(built_dataset)
            .ok_or_else(|| PipelineError::MissingConfigError {
                field: "upload.dataset_path".to_string(),
            })?;
        Ok(ResolvedUpload {
            section: self.clone(),
            dataset_path: dataset_path.to_string(),
        })
    }
}

impl UploadConfig for ResolvedUpload {
    fn dataset_path(&self) -> &str {
        &self.dataset_path
    }

    fn labels_def_path(&self) -> &str {
        &self.section.labels_definitions
    }

    fn project_kind(&self) -> ProjectKind {
        self.section.project_type
    }

    fn target_label(&self) -> &str {
        &self.section.target_label
    }

    fn include_all_labels(&self) -> bool {
        self.section.include_all_labels
    }

    fn batch_size(&self) -> usize {
        self.section.batch_size
    }
}
