use thiserror::Error;

/// Main error type for the sync engine
#[derive(Error, Debug)]
pub enum SyncError {
    // Configuration errors
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Alias database rejected: {0}")]
    AliasValidation(String),

    #[error("Alias file parse error: {0}")]
    AliasParse(#[from] toml::de::Error),

    // Database errors
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error("Persistence failure: {0}")]
    Persistence(String),

    // Network errors
    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Transient fetch failure for {target}: {reason}")]
    TransientFetch { target: String, reason: String },

    #[error("Rate limit slot not acquired within {waited_ms}ms")]
    RateLimitTimeout { waited_ms: u64 },

    // Feed data errors
    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid feed data: {0}")]
    InvalidFeedData(String),

    // IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // Generic errors
    #[error("Internal error: {0}")]
    Internal(String),

    #[error("Operation cancelled")]
    Cancelled,

    #[error("{0}")]
    Other(#[from] anyhow::Error),
}

impl SyncError {
    /// Errors worth one immediate retry (timeouts, connection resets, 5xx, 429)
    pub fn is_transient(&self) -> bool {
        match self {
            SyncError::TransientFetch { .. } => true,
            SyncError::Http(e) => e.is_timeout() || e.is_connect(),
            _ => false,
        }
    }

    /// Errors that must abort a whole cycle rather than a single game
    pub fn is_cycle_fatal(&self) -> bool {
        matches!(
            self,
            SyncError::Persistence(_)
                | SyncError::Database(_)
                | SyncError::Migration(_)
                | SyncError::Config(_)
                | SyncError::InvalidConfig(_)
                | SyncError::AliasValidation(_)
        )
    }
}

/// Result type alias for SyncError
pub type Result<T> = std::result::Result<T, SyncError>;
