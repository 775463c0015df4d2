use crate::adapters::custom_vision::{
    CustomVisionSettings, TRAINING_ENDPOINT_ENV_VAR, TRAINING_KEY_ENV_VAR,
};
use crate::core::sampling::max_frames_from_arg;
use crate::core::strategy::DEFAULT_TARGET_LABEL;
use crate::core::{DatasetConfig, FramesConfig, UploadConfig};
use crate::domain::model::ProjectKind;
use crate::utils::error::{PipelineError, Result};
use crate::utils::validation::{
    validate_file_extension, validate_frame_rate, validate_path, validate_range,
    validate_required_field, Validate,
};
use clap::{Args, Parser, Subcommand};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Parser)]
#[command(name = "pot-dataset")]
#[command(about = "Prepare CVAT-labelled video frames as Custom Vision training data")]
pub struct Cli {
    #[arg(short, long, global = true, help = "Enable verbose output")]
    pub verbose: bool,

    #[arg(long, global = true, help = "Log CPU and memory usage per phase")]
    pub monitor: bool,

    #[arg(long, global = true, help = "Emit logs as JSON")]
    pub json_logs: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Clone, Subcommand)]
pub enum Command {
    /// Process clips+labels into dataset
    BuildDataset(BuildDatasetArgs),
    /// Upload a dataset archive to a Custom Vision project
    Upload(UploadArgs),
    /// Extract frames from a video clip into a zip archive
    ExtractFrames(ExtractFramesArgs),
}

#[derive(Debug, Clone, Args)]
pub struct BuildDatasetArgs {
    /// Folder with .zip frame archives
    #[arg(short, long = "clips")]
    pub clips_folder: String,

    /// Folder with .xml CVAT label files
    #[arg(short, long = "labels")]
    pub labels_folder: String,

    /// Output folder location
    #[arg(short, long = "output", default_value = "output")]
    pub output_folder: String,

    /// Maximum number of frames per clip (if one has more, frames will be sampled)
    #[arg(short, long = "max-frames", default_value_t = -1, allow_negative_numbers = true)]
    pub max_clip_frames: i64,

    /// Seed for frame sampling, for reproducible datasets
    #[arg(long)]
    pub seed: Option<u64>,
}

impl DatasetConfig for BuildDatasetArgs {
    fn clips_dir(&self) -> &str {
        &self.clips_folder
    }

    fn labels_dir(&self) -> &str {
        &self.labels_folder
    }

    fn output_dir(&self) -> &str {
        &self.output_folder
    }

    fn max_clip_frames(&self) -> Option<usize> {
        max_frames_from_arg(self.max_clip_frames)
    }

    fn seed(&self) -> Option<u64> {
        self.seed
    }
}

impl Validate for BuildDatasetArgs {
    fn validate(&self) -> Result<()> {
        validate_path("clips", &self.clips_folder)?;
        validate_path("labels", &self.labels_folder)?;
        validate_path("output", &self.output_folder)?;
        Ok(())
    }
}

#[derive(Debug, Clone, Args)]
pub struct UploadArgs {
    /// Path to a .zip dataset folder
    #[arg(long = "dataset")]
    pub dataset_path: String,

    /// Path to a file with labels definitions
    #[arg(long = "labels", default_value = "../labels_config.json")]
    pub labels_def_path: String,

    /// Type of Custom Vision project (detection, classification)
    #[arg(long = "type", value_parser = parse_project_kind)]
    pub project_type: ProjectKind,

    #[arg(long, env = TRAINING_ENDPOINT_ENV_VAR, hide_env_values = true)]
    pub endpoint: Option<String>,

    #[arg(long, env = TRAINING_KEY_ENV_VAR, hide_env_values = true)]
    pub training_key: Option<String>,

    /// Label whose boxes are uploaded (and whose attributes become classification tags)
    #[arg(long, default_value = DEFAULT_TARGET_LABEL)]
    pub target_label: String,

    /// Create detection tags for every label definition instead of the target label only
    #[arg(long = "all-labels")]
    pub all_labels: bool,

    #[arg(long, default_value_t = 64)]
    pub batch_size: usize,
}

fn parse_project_kind(value: &str) -> std::result::Result<ProjectKind, String> {
    value.parse().map_err(|e: PipelineError| e.to_string())
}

impl UploadArgs {
    pub fn custom_vision_settings(&self) -> Result<CustomVisionSettings> {
        let endpoint = validate_required_field("endpoint", &self.endpoint)?;
        let key = validate_required_field("training_key", &self.training_key)?;
        Ok(CustomVisionSettings::new(endpoint.clone(), key.clone()))
    }
}

impl UploadConfig for UploadArgs {
    fn dataset_path(&self) -> &str {
        &self.dataset_path
    }

    fn labels_def_path(&self) -> &str {
        &self.labels_def_path
    }

    fn project_kind(&self) -> ProjectKind {
        self.project_type
    }

    fn target_label(&self) -> &str {
        &self.target_label
    }

    fn include_all_labels(&self) -> bool {
        self.all_labels
    }

    fn batch_size(&self) -> usize {
        self.batch_size
    }
}

impl Validate for UploadArgs {
    fn validate(&self) -> Result<()> {
        validate_path("dataset", &self.dataset_path)?;
        validate_file_extension("dataset", &self.dataset_path, &["zip"])?;
        validate_path("labels", &self.labels_def_path)?;
        validate_range("batch_size", self.batch_size, 1, 64)?;
        self.custom_vision_settings()?.validate()?;
        Ok(())
    }
}

#[derive(Debug, Clone, Args)]
pub struct ExtractFramesArgs {
    /// Video clip to extract frames from
    #[arg(long)]
    pub video: String,

    /// Output folder location
    #[arg(short, long, default_value = "output")]
    pub output: String,

    /// ffmpeg -r value
    #[arg(long, default_value = "1/1")]
    pub frame_rate: String,

    /// ffmpeg executable
    #[arg(long, default_value = "ffmpeg")]
    pub ffmpeg: String,
}

impl FramesConfig for ExtractFramesArgs {
    fn video_path(&self) -> &str {
        &self.video
    }

    fn output_dir(&self) -> &str {
        &self.output
    }

    fn frame_rate(&self) -> &str {
        &self.frame_rate
    }
}

impl Validate for ExtractFramesArgs {
    fn validate(&self) -> Result<()> {
        validate_path("video", &self.video)?;
        validate_path("output", &self.output)?;
        validate_frame_rate("frame_rate", &self.frame_rate)?;
        if self.ffmpeg.trim().is_empty() {
            return Err(PipelineError::config("ffmpeg executable cannot be empty"));
        }
        Ok(())
    }
}

/// 載入 `.env` 中的環境變數 (已設定的變數不會被覆寫)；找不到檔案時回傳 None
pub fn load_dotenv(path: Option<&Path>) -> Result<Option<PathBuf>> {
    let loaded = match path {
        Some(path) => dotenvy::from_path(path).map(|_| path.to_path_buf()),
        None => dotenvy::dotenv(),
    };

    match loaded {
        Ok(path) => Ok(Some(path)),
        Err(e) if e.not_found() => Ok(None),
        Err(e) => Err(PipelineError::config(format!("Failed to load .env file: {}", e))),
    }
}

/// 日誌初始化之後再回報 `.env` 的載入結果
pub fn log_env_file(loaded: Result<Option<PathBuf>>) {
    match loaded {
        Ok(Some(path)) => tracing::info!("🔑 Loaded environment from {}", path.display()),
        Ok(None) => tracing::debug!("No .env file found"),
        Err(e) => tracing::warn!("⚠️ {}", e),
    }
}
