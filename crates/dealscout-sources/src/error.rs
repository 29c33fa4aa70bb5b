use thiserror::Error;

#[derive(Debug, Error)]
pub enum SourceError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("authentication failed ({status}): {message}")]
    Authentication { status: u16, message: String },

    #[error("rate limited by {url}")]
    RateLimited { url: String },

    #[error("unexpected HTTP status {status} from {url}")]
    UnexpectedStatus { status: u16, url: String },

    #[error("JSON deserialization error for {context}: {source}")]
    Deserialize {
        context: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("invalid URL \"{url}\": {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("browser could not be started: {0}")]
    BrowserInit(String),

    #[error("browser operation failed: {0}")]
    Browser(String),

    #[error("timed out after {after_ms}ms waiting for {what}")]
    Timeout { what: String, after_ms: u64 },

    #[error("page extraction failed: {0}")]
    Extraction(String),

    #[error("scrape failed: {0}")]
    ScrapeFailed(String),
}
