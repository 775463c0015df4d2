use clap::Parser;
use pot_dataset_etl::config::{load_dotenv, log_env_file, Cli, Command};
use pot_dataset_etl::core::Pipeline;
use pot_dataset_etl::utils::{logger, validation::Validate};
use pot_dataset_etl::{
    CustomVisionClient, DatasetPipeline, EtlEngine, FfmpegExtractor, FramesPipeline, LocalStorage,
    PipelineError, UploadPipeline,
};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // clap 在解析時讀取 env，因此 .env 必須先載入
    let env_file = load_dotenv(None);
    let cli = Cli::parse();

    // 初始化日誌
    logger::init_logger(cli.verbose, cli.json_logs, None);
    log_env_file(env_file);

    tracing::info!("Starting pot-dataset CLI");
    if cli.verbose {
        tracing::debug!("CLI command: {:?}", cli.command);
    }

    if cli.monitor {
        tracing::info!("🔍 System monitoring enabled");
    }

    let storage = LocalStorage::default();

    let result = match cli.command {
        Command::BuildDataset(args) => {
            exit_on_invalid(&args);
            run(DatasetPipeline::new(storage, args), cli.monitor).await
        }
        Command::Upload(args) => {
            exit_on_invalid(&args);
            match args
                .custom_vision_settings()
                .and_then(CustomVisionClient::new)
            {
                Ok(client) => run(UploadPipeline::new(storage, args, client), cli.monitor).await,
                Err(e) => Err(e),
            }
        }
        Command::ExtractFrames(args) => {
            exit_on_invalid(&args);
            let extractor = FfmpegExtractor::new(&args.ffmpeg);
            run(FramesPipeline::new(storage, args, extractor), cli.monitor).await
        }
    };

    match result {
        Ok(output) => {
            tracing::info!("✅ Completed successfully!");
            println!("✅ Completed successfully!");
            println!("📁 {}", output);
        }
        Err(e) => report_failure(&e),
    }

    Ok(())
}

async fn run<P: Pipeline>(pipeline: P, monitor: bool) -> pot_dataset_etl::Result<String> {
    EtlEngine::new_with_monitoring(pipeline, monitor).run().await
}

fn exit_on_invalid<V: Validate>(config: &V) {
    if let Err(e) = config.validate() {
        tracing::error!("❌ Configuration validation failed: {}", e);
        tracing::error!("💡 Suggestion: {}", e.recovery_suggestion());
        eprintln!("❌ {}", e.user_friendly_message());
        std::process::exit(1);
    }
}

fn report_failure(e: &PipelineError) {
    tracing::error!(
        "❌ Pipeline failed: {} (Category: {:?}, Severity: {:?})",
        e,
        e.category(),
        e.severity()
    );
    tracing::error!("💡 Recovery suggestion: {}", e.recovery_suggestion());

    eprintln!("❌ {}", e.user_friendly_message());
    eprintln!("💡 Suggestion: {}", e.recovery_suggestion());

    let exit_code = e.exit_code();
    if exit_code > 0 {
        std::process::exit(exit_code);
    }
}
