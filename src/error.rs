use thiserror::Error;

/// Failures of the outbound model call. Each category maps to its own
/// user-facing notice; none of them are retried.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum TransportError {
    #[error("network error: {0}")]
    Network(String),

    #[error("rate limited: {0}")]
    RateLimited(String),

    #[error("quota exhausted: {0}")]
    QuotaExhausted(String),

    #[error("gateway returned {status}: {message}")]
    Api { status: u16, message: String },

    #[error("configuration error: {0}")]
    Config(String),

    #[error("stream cancelled")]
    Cancelled,
}

/// Short message shown to the human when something could not be done.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserNotice {
    pub title: String,
    pub description: String,
}

impl UserNotice {
    pub fn new(title: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            description: description.into(),
        }
    }
}

impl TransportError {
    /// Category-specific notice for the end user.
    pub fn notice(&self) -> UserNotice {
        match self {
            TransportError::RateLimited(_) => UserNotice::new(
                "Rate Limited",
                "Too many requests. Please wait a moment and try again.",
            ),
            TransportError::QuotaExhausted(_) => UserNotice::new(
                "Credits Exhausted",
                "AI credits have been used up. Please add more credits.",
            ),
            TransportError::Api { message, .. } if !message.is_empty() => {
                UserNotice::new("Error", message.clone())
            }
            TransportError::Api { .. } => {
                UserNotice::new("Error", "Failed to get response")
            }
            TransportError::Cancelled => UserNotice::new("Stopped", "The response was cancelled."),
            TransportError::Config(msg) => UserNotice::new("Configuration Error", msg.clone()),
            TransportError::Network(_) => UserNotice::new(
                "Connection Error",
                "Failed to connect to AI. Please try again.",
            ),
        }
    }
}

/// Errors raised by the project file-system collaborator.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FileSystemError {
    #[error("File already exists: {0}")]
    AlreadyExists(String),

    #[error("File not found: {0}")]
    NotFound(String),

    #[error("Path is not a file: {0}")]
    NotAFile(String),

    #[error("Folder is not empty: {0}")]
    NotEmpty(String),

    #[error("Destination already exists: {0}")]
    DestinationExists(String),

    #[error("Missing field `{field}` for {action}")]
    MissingField { action: String, field: String },

    #[error("Malformed operation: {0}")]
    Malformed(String),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

/// Errors from the conversation and mentor-report stores.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Not found: {0}")]
    NotFound(String),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid value for {key}: {value}")]
    InvalidValue { key: String, value: String },

    #[error("missing {0}")]
    Missing(String),
}
