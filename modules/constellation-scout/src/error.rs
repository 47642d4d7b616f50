use std::path::PathBuf;

/// Errors that end a scrape run. Everything recoverable (DOM timing,
/// avatar downloads, unparseable counts) is handled where it happens.
#[derive(Debug, thiserror::Error)]
pub enum ScrapeError {
    #[error("Session unavailable: {0}")]
    Session(#[from] SessionError),

    #[error("Dataset storage failed: {0}")]
    Storage(#[from] StoreError),

    #[error("Browser error: {0}")]
    Browser(#[from] headless_client::HeadlessError),

    #[error("Invalid selector configuration: {0}")]
    Selector(String),
}

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("no session file at {path}; run constellation-login first")]
    Missing { path: PathBuf },

    #[error("session file {path} contains no cookies; run constellation-login again")]
    Empty { path: PathBuf },

    #[error("session file {path} is unreadable: {source}")]
    Corrupt {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("session file I/O: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("dataset {path} is not a valid profile array: {source}")]
    Corrupt {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("dataset serialization failed: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("dataset write to {path} failed: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("dataset read from {path} failed: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

#[derive(Debug, thiserror::Error)]
pub enum DownloadError {
    #[error("no avatar URL")]
    EmptyUrl,

    #[error("Network error: {0}")]
    Network(String),

    #[error("HTTP {status} for {url}")]
    Status { status: u16, url: String },

    #[error("Stream error: {0}")]
    Stream(String),

    #[error("Avatar write failed: {0}")]
    Io(#[from] std::io::Error),
}

impl From<reqwest::Error> for DownloadError {
    fn from(err: reqwest::Error) -> Self {
        DownloadError::Network(err.to_string())
    }
}
