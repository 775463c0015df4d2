use crate::core::FrameExtractor;
use crate::utils::error::{PipelineError, Result};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::process::Command;

pub const FRAME_PATTERN: &str = "frame%06d.jpg";

#[derive(Debug, Clone)]
pub struct FfmpegExtractor {
    binary: PathBuf,
}

impl FfmpegExtractor {
    pub fn new(binary: impl Into<PathBuf>) -> Self {
        Self {
            binary: binary.into(),
        }
    }
}

impl Default for FfmpegExtractor {
    fn default() -> Self {
        Self::new("ffmpeg")
    }
}

#[async_trait]
impl FrameExtractor for FfmpegExtractor {
    async fn extract(&self, video: &Path, frames_dir: &Path, frame_rate: &str) -> Result<()> {
        tracing::info!(
            "🎞️ Extracting frames using {} at frame rate {}",
            self.binary.display(),
            frame_rate
        );

        let output = Command::new(&self.binary)
            .arg("-hide_banner")
            .arg("-loglevel")
            .arg("error")
            .arg("-i")
            .arg(video)
            .arg("-r")
            .arg(frame_rate)
            .arg(frames_dir.join(FRAME_PATTERN))
            .kill_on_drop(true)
            .output()
            .await?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let tail: Vec<&str> = stderr.lines().rev().take(5).collect();
            return Err(PipelineError::processing(format!(
                "ffmpeg exited with {}: {}",
                output.status,
                tail.into_iter().rev().collect::<Vec<_>>().join(" | ")
            )));
        }

        Ok(())
    }
}
