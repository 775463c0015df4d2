use thiserror::Error;

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Zip operation failed: {0}")]
    ZipError(#[from] zip::result::ZipError),

    #[error("API request failed: {0}")]
    ApiError(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("Image processing error: {0}")]
    ImageError(#[from] image::ImageError),

    #[error("XML parsing error: {0}")]
    XmlError(#[from] roxmltree::Error),

    #[error("Custom Vision returned HTTP {status} for {operation}: {body}")]
    ApiStatusError {
        operation: String,
        status: u16,
        body: String,
    },

    #[error("Configuration error: {message}")]
    ConfigError { message: String },

    #[error("Missing configuration: {field}")]
    MissingConfigError { field: String },

    #[error("Invalid value '{value}' for {field}: {reason}")]
    InvalidConfigValueError {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Data processing error: {message}")]
    ProcessingError { message: String },

    #[error("Validation error: {message}")]
    ValidationError { message: String },
}

pub type Result<T> = std::result::Result<T, PipelineError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Configuration,
    Network,
    Data,
    Storage,
    System,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ErrorSeverity {
    Low,
    Medium,
    High,
    Critical,
}

impl PipelineError {
    pub fn processing(message: impl Into<String>) -> Self {
        Self::ProcessingError {
            message: message.into(),
        }
    }

    pub fn config(message: impl Into<String>) -> Self {
        Self::ConfigError {
            message: message.into(),
        }
    }

    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::ConfigError { .. }
            | Self::MissingConfigError { .. }
            | Self::InvalidConfigValueError { .. } => ErrorCategory::Configuration,
            Self::ApiError(_) | Self::ApiStatusError { .. } => ErrorCategory::Network,
            Self::SerializationError(_)
            | Self::ImageError(_)
            | Self::XmlError(_)
            | Self::ProcessingError { .. }
            | Self::ValidationError { .. } => ErrorCategory::Data,
            Self::ZipError(_) => ErrorCategory::Storage,
            Self::IoError(_) => ErrorCategory::System,
        }
    }

    pub fn severity(&self) -> ErrorSeverity {
        match self {
            // 429 與 5xx 屬於可重試的錯誤
            Self::ApiStatusError { status, .. } if *status == 429 || *status >= 500 => {
                ErrorSeverity::Medium
            }
            Self::ApiError(e) if e.is_timeout() || e.is_connect() => ErrorSeverity::Medium,
            Self::IoError(_) => ErrorSeverity::Critical,
            _ => ErrorSeverity::High,
        }
    }

    pub fn is_retryable(&self) -> bool {
        self.severity() == ErrorSeverity::Medium
    }

    pub fn recovery_suggestion(&self) -> String {
        match self {
            Self::ConfigError { .. } | Self::InvalidConfigValueError { .. } => {
                "Check the command line arguments or the job TOML file".to_string()
            }
            Self::MissingConfigError { field } => {
                format!("Provide a value for '{}' (argument, TOML or environment variable)", field)
            }
            Self::ApiStatusError { status: 401, .. } => {
                "Verify CUSTOM_VISION_TRAINING_KEY belongs to the training resource".to_string()
            }
            Self::ApiStatusError { status: 404, .. } => {
                "Verify CUSTOM_VISION_TRAINING_ENDPOINT points to the training resource".to_string()
            }
            Self::ApiError(_) | Self::ApiStatusError { .. } => {
                "Check network connectivity and retry later".to_string()
            }
            Self::XmlError(_) => "Re-export the annotations from CVAT in the images format".to_string(),
            Self::ZipError(_) => "Make sure the archive exists and is a valid zip file".to_string(),
            Self::ImageError(_) => "Check the frames in the dataset archive are valid images".to_string(),
            Self::IoError(_) => "Check file paths and permissions".to_string(),
            Self::SerializationError(_) => "Check labels.json and the label definitions file".to_string(),
            Self::ProcessingError { .. } | Self::ValidationError { .. } => {
                "Inspect the input data referenced in the error".to_string()
            }
        }
    }

    pub fn user_friendly_message(&self) -> String {
        match self.category() {
            ErrorCategory::Configuration => format!("Configuration problem: {}", self),
            ErrorCategory::Network => format!("Custom Vision request failed: {}", self),
            ErrorCategory::Data => format!("Input data problem: {}", self),
            ErrorCategory::Storage => format!("Archive problem: {}", self),
            ErrorCategory::System => format!("System error: {}", self),
        }
    }

    /// 依嚴重程度決定 CLI 的退出碼
    pub fn exit_code(&self) -> i32 {
        match self.severity() {
            ErrorSeverity::Low => 0,
            ErrorSeverity::Medium => 2,
            ErrorSeverity::High => 1,
            ErrorSeverity::Critical => 3,
        }
    }
}
