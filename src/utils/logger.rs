use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// RUST_LOG 未設定時使用的過濾規則；verbose 優先於設定檔的 log_level
fn filter_directive(verbose: bool, log_level: Option<&str>) -> String {
    if verbose {
        return "pot_dataset_etl=debug,info".to_string();
    }

    match log_level.map(str::trim).filter(|level| !level.is_empty()) {
        Some(level) => format!("pot_dataset_etl={}", level.to_ascii_lowercase()),
        None => "pot_dataset_etl=info".to_string(),
    }
}

fn default_filter(verbose: bool, log_level: Option<&str>) -> EnvFilter {
    EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(filter_directive(verbose, log_level)))
}

pub fn init_cli_logger(verbose: bool, log_level: Option<&str>) {
    tracing_subscriber::registry()
        .with(default_filter(verbose, log_level))
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_thread_ids(false)
                .with_file(false)
                .with_line_number(false)
                .compact(),
        )
        .init();
}

/// 結構化輸出，適合在容器或排程環境收集日誌
pub fn init_json_logger(verbose: bool, log_level: Option<&str>) {
    tracing_subscriber::registry()
        .with(default_filter(verbose, log_level))
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(true)
                .with_thread_ids(false)
                .with_file(false)
                .with_line_number(false)
                .json(),
        )
        .init();
}

pub fn init_logger(verbose: bool, json: bool, log_level: Option<&str>) {
    if json {
        init_json_logger(verbose, log_level);
    } else {
        init_cli_logger(verbose, log_level);
    }
}
