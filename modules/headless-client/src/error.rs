use thiserror::Error;

pub type Result<T> = std::result::Result<T, HeadlessError>;

#[derive(Debug, Error)]
pub enum HeadlessError {
    #[error("Browser launch failed: {0}")]
    Launch(String),

    #[error("Protocol error: {0}")]
    Protocol(String),

    #[error("DevTools error: {0}")]
    Cdp(String),
}

impl From<chromiumoxide::error::CdpError> for HeadlessError {
    fn from(err: chromiumoxide::error::CdpError) -> Self {
        HeadlessError::Cdp(err.to_string())
    }
}
