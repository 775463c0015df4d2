use clap::Parser;
use pot_dataset_etl::config::{load_dotenv, log_env_file, JobConfig};
use pot_dataset_etl::utils::{logger, validation::Validate};
use pot_dataset_etl::{
    CustomVisionClient, DatasetPipeline, EtlEngine, FfmpegExtractor, FramesPipeline, LocalStorage,
    PipelineError, UploadPipeline,
};

#[derive(Parser)]
#[command(name = "dataset-job")]
#[command(about = "Run frame extraction, dataset build and upload from a TOML job file")]
struct Args {
    /// Path to TOML job file
    #[arg(short, long, default_value = "dataset-job.toml")]
    config: String,

    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,

    /// Override monitoring setting from config
    #[arg(long)]
    monitor: Option<bool>,

    /// Emit logs as JSON
    #[arg(long)]
    json_logs: bool,

    /// Dry run - show the stages without executing them
    #[arg(long)]
    dry_run: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let env_file = load_dotenv(None);
    let args = Args::parse();

    // ${VAR} 替換需要先載入 .env，設定檔的 log_level 需要先讀取設定檔
    let config = match JobConfig::from_file(&args.config) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("❌ Failed to load config file '{}': {}", args.config, e);
            eprintln!("💡 Make sure the file exists and is valid TOML format");
            std::process::exit(1);
        }
    };

    // 初始化日誌
    logger::init_logger(args.verbose, args.json_logs, config.log_level());

    tracing::info!("🚀 Starting TOML-based dataset job");
    tracing::info!("📁 Loaded configuration from: {}", args.config);
    log_env_file(env_file);

    if let Err(e) = config.validate() {
        tracing::error!("❌ Configuration validation failed: {}", e);
        tracing::error!("💡 Suggestion: {}", e.recovery_suggestion());
        eprintln!("❌ {}", e.user_friendly_message());
        std::process::exit(1);
    }

    tracing::info!("✅ Configuration loaded and validated successfully");
    display_config_summary(&config);

    if args.dry_run {
        tracing::info!("🔍 DRY RUN MODE - No actual processing will occur");
        return Ok(());
    }

    let monitor = args.monitor.unwrap_or_else(|| config.monitoring_enabled());
    if monitor {
        tracing::info!("🔍 System monitoring enabled");
    }

    match run_stages(&config, monitor).await {
        Ok(outputs) => {
            tracing::info!("✅ Job {} completed successfully!", config.job.name);
            println!("✅ Job {} completed successfully!", config.job.name);
            for output in outputs {
                println!("📁 {}", output);
            }
        }
        Err(e) => {
            tracing::error!(
                "❌ Job failed: {} (Category: {:?}, Severity: {:?})",
                e,
                e.category(),
                e.severity()
            );
            eprintln!("❌ {}", e.user_friendly_message());
            eprintln!("💡 Suggestion: {}", e.recovery_suggestion());

            let exit_code = e.exit_code();
            if exit_code > 0 {
                std::process::exit(exit_code);
            }
        }
    }

    Ok(())
}

/// 依序執行 frames -> dataset -> upload
async fn run_stages(config: &JobConfig, monitor: bool) -> Result<Vec<String>, PipelineError> {
    let mut outputs = Vec::new();
    let mut built_dataset: Option<String> = None;

    if let Some(frames) = config.frames_stage() {
        let extractor = FfmpegExtractor::new(&frames.ffmpeg);
        let pipeline = FramesPipeline::new(LocalStorage::default(), frames.clone(), extractor);
        outputs.push(EtlEngine::new_with_monitoring(pipeline, monitor).run().await?);
    }

    if let Some(dataset) = config.dataset_stage() {
        let pipeline = DatasetPipeline::new(LocalStorage::default(), dataset.clone());
        let archive = EtlEngine::new_with_monitoring(pipeline, monitor).run().await?;
        built_dataset = Some(archive.clone());
        outputs.push(archive);
    }

    if let Some(upload) = config.upload_stage() {
        let settings = config
            .custom_vision
            .clone()
            .ok_or_else(|| PipelineError::MissingConfigError {
                field: "custom_vision".to_string(),
            })?;
        let client = CustomVisionClient::new(settings)?;
        let resolved = upload.resolve(built_dataset.as_deref())?;
        let pipeline = UploadPipeline::new(LocalStorage::default(), resolved, client);
        outputs.push(EtlEngine::new_with_monitoring(pipeline, monitor).run().await?);
    }

    Ok(outputs)
}

fn display_config_summary(config: &JobConfig) {
    println!("📋 Job Summary:");
    println!("  Job: {}", config.job.name);
    if !config.job.description.is_empty() {
        println!("  Description: {}", config.job.description);
    }

    if let Some(frames) = config.frames_stage() {
        println!(
            "  🎞️ Frames: {} -> {} (rate {})",
            frames.video, frames.output_path, frames.frame_rate
        );
    }

    if let Some(dataset) = config.dataset_stage() {
        println!(
            "  📦 Dataset: {} + {} -> {}",
            dataset.clips_path, dataset.labels_path, dataset.output_path
        );
        if dataset.max_clip_frames > 0 {
            println!("     Max frames per clip: {}", dataset.max_clip_frames);
        }
    }

    if let Some(upload) = config.upload_stage() {
        println!(
            "  ☁️ Upload: {} project, dataset {}",
            upload.project_type,
            upload
                .dataset_path
                .as_deref()
                .unwrap_or("<built by this job>")
        );
        println!("     Batch size: {}", upload.batch_size);
    }

    println!();
}
