use std::path::{Path, PathBuf};

use headless_client::CookieRecord;
use tracing::info;

use crate::error::SessionError;
use crate::fsio::write_atomic;

/// The cookie jar captured by `constellation-login` and replayed by the scraper.
pub struct SessionStore {
    path: PathBuf,
}

impl SessionStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn load(&self) -> Result<Vec<CookieRecord>, SessionError> {
        let raw = match std::fs::read(&self.path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(SessionError::Missing {
                    path: self.path.clone(),
                });
            }
            Err(e) => return Err(SessionError::Io(e)),
        };

        let cookies: Vec<CookieRecord> =
            serde_json::from_slice(&raw).map_err(|source| SessionError::Corrupt {
                path: self.path.clone(),
                source,
            })?;

        if cookies.is_empty() {
            return Err(SessionError::Empty {
                path: self.path.clone(),
            });
        }

        info!(path = %self.path.display(), count = cookies.len(), "Loaded session cookies");
        Ok(cookies)
    }

    pub fn save(&self, cookies: &[CookieRecord]) -> Result<(), SessionError> {
        let json = serde_json::to_vec_pretty(cookies).map_err(|source| SessionError::Corrupt {
            path: self.path.clone(),
            source,
        })?;
        write_atomic(&self.path, &json)?;
        info!(path = %self.path.display(), count = cookies.len(), "Saved session cookies");
        Ok(())
    }
}
