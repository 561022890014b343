//! Error types for the signal engine

use thiserror::Error;

/// Errors raised while fetching, decoding or delivering signal data
#[derive(Error, Debug)]
pub enum BotError {
    /// Retryable upstream fault (5xx, rate limit, timeout, connection reset)
    #[error("Transient failure at {url}: {reason}")]
    Transient { url: String, reason: String },

    /// Host refused us by region (401/403/451); try a mirror
    #[error("HTTP {status} (geo-blocked) at {url}")]
    GeoBlocked { status: u16, url: String },

    /// Non-JSON body or JSON that does not match the expected shape
    #[error("Parse error: {0}")]
    Parse(String),

    /// Any other non-success status
    #[error("HTTP {status} at {url}")]
    Status { status: u16, url: String },

    /// Upstream kept paging past the configured limit
    #[error("Incomplete data: {0}")]
    Incomplete(String),

    #[error("No hosts available for {0}")]
    NoHosts(String),

    #[error("Notification failed: {0}")]
    Notify(String),

    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl BotError {
    /// Whether the same host is worth another attempt
    pub fn is_retryable(&self) -> bool {
        matches!(self, BotError::Transient { .. })
    }

    /// Whether the next mirror host should be tried
    pub fn is_geo_blocked(&self) -> bool {
        matches!(self, BotError::GeoBlocked { .. })
    }

    /// Classify a non-success HTTP status for `url`
    pub fn from_status(status: u16, url: &str) -> Self {
        match status {
            500 | 502 | 503 | 504 | 429 => BotError::Transient {
                url: url.to_string(),
                reason: format!("HTTP {}", status),
            },
            401 | 403 | 451 => BotError::GeoBlocked {
                status,
                url: url.to_string(),
            },
            _ => BotError::Status {
                status,
                url: url.to_string(),
            },
        }
    }
}

pub type Result<T> = std::result::Result<T, BotError>;
