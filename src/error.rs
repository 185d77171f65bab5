use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    // Configuration errors
    ConfigInvalidEndpoint,
    ConfigInvalidApiKey,
    ConfigInvalidBatchSize,
    ConfigInvalidInterval,

    // Storage errors
    StorageReadError,
    StorageWriteError,
    StorageDeleteError,

    // Event delivery errors
    EventSendFailed,
    EventFlushFailed,
}

impl ErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::ConfigInvalidEndpoint => "CONFIG_INVALID_ENDPOINT",
            ErrorCode::ConfigInvalidApiKey => "CONFIG_INVALID_API_KEY",
            ErrorCode::ConfigInvalidBatchSize => "CONFIG_INVALID_BATCH_SIZE",
            ErrorCode::ConfigInvalidInterval => "CONFIG_INVALID_INTERVAL",
            ErrorCode::StorageReadError => "STORAGE_READ_ERROR",
            ErrorCode::StorageWriteError => "STORAGE_WRITE_ERROR",
            ErrorCode::StorageDeleteError => "STORAGE_DELETE_ERROR",
            ErrorCode::EventSendFailed => "EVENT_SEND_FAILED",
            ErrorCode::EventFlushFailed => "EVENT_FLUSH_FAILED",
        }
    }

    pub fn is_storage_error(&self) -> bool {
        matches!(
            self,
            ErrorCode::StorageReadError
                | ErrorCode::StorageWriteError
                | ErrorCode::StorageDeleteError
        )
    }

    pub fn is_config_error(&self) -> bool {
        matches!(
            self,
            ErrorCode::ConfigInvalidEndpoint
                | ErrorCode::ConfigInvalidApiKey
                | ErrorCode::ConfigInvalidBatchSize
                | ErrorCode::ConfigInvalidInterval
        )
    }
}

impl std::fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Error, Debug)]
#[error("[{code}] {message}")]
pub struct FlagwireError {
    pub code: ErrorCode,
    pub message: String,
    #[source]
    pub source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl FlagwireError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            source: None,
        }
    }

    pub fn with_source(
        code: ErrorCode,
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self {
            code,
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    pub fn config_error(code: ErrorCode, message: impl Into<String>) -> Self {
        Self::new(code, message)
    }

    pub fn storage_error(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::StorageWriteError, message)
    }

    pub fn is_storage_error(&self) -> bool {
        self.code.is_storage_error()
    }

    pub fn is_config_error(&self) -> bool {
        self.code.is_config_error()
    }
}

pub type Result<T> = std::result::Result<T, FlagwireError>;
