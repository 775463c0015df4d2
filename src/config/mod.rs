#[cfg(feature = "cli")]
pub mod cli;
pub mod job_config;

#[cfg(feature = "cli")]
pub use cli::{load_dotenv, log_env_file, BuildDatasetArgs, Cli, Command, ExtractFramesArgs, UploadArgs};
pub use job_config::JobConfig;
