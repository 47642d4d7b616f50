use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{CONTENT_TYPE, USER_AGENT};
use tracing::debug;

use crate::error::DownloadError;
use crate::fsio::write_atomic;

const BROWSER_UA: &str = "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36";

const KNOWN_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "gif", "webp"];

#[async_trait]
pub trait ImageFetcher: Send + Sync {
    /// Download `url` as `<destination_name>.<ext>` and return the written path.
    async fn fetch(&self, url: &str, destination_name: &str) -> Result<PathBuf, DownloadError>;

    /// Whether an image for `destination_name` is already on disk.
    async fn has_image(&self, destination_name: &str) -> bool;
}

/// Single-attempt avatar downloader into a flat directory.
pub struct HttpImageFetcher {
    client: reqwest::Client,
    dir: PathBuf,
}

impl HttpImageFetcher {
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self, DownloadError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()?;
        Ok(Self {
            client,
            dir: dir.into(),
        })
    }
}

#[async_trait]
impl ImageFetcher for HttpImageFetcher {
    async fn fetch(&self, url: &str, destination_name: &str) -> Result<PathBuf, DownloadError> {
        if url.trim().is_empty() {
            return Err(DownloadError::EmptyUrl);
        }

        let resp = self
            .client
            .get(url)
            .header(USER_AGENT, BROWSER_UA)
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            return Err(DownloadError::Status {
                status: status.as_u16(),
                url: url.to_string(),
            });
        }

        let content_type = resp
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let bytes = resp
            .bytes()
            .await
            .map_err(|e| DownloadError::Stream(e.to_string()))?;

        let ext = extension_for(url, content_type.as_deref());
        let path = self
            .dir
            .join(format!("{}.{ext}", sanitize_file_stem(destination_name)));
        write_atomic(&path, &bytes)?;

        debug!(url, path = %path.display(), bytes = bytes.len(), "Avatar saved");
        Ok(path)
    }

    async fn has_image(&self, destination_name: &str) -> bool {
        let stem = sanitize_file_stem(destination_name);
        for ext in KNOWN_EXTENSIONS {
            let candidate = self.dir.join(format!("{stem}.{ext}"));
            if tokio::fs::try_exists(&candidate).await.unwrap_or(false) {
                return true;
            }
        }
        false
    }
}

/// File extension from the URL path, else the content type, else `jpg`.
pub fn extension_for(url: &str, content_type: Option<&str>) -> &'static str {
    let from_path = url::Url::parse(url).ok().and_then(|parsed| {
        let ext = parsed.path().rsplit_once('.')?.1.to_ascii_lowercase();
        KNOWN_EXTENSIONS.iter().copied().find(|known| *known == ext)
    });
    if let Some(ext) = from_path {
        return ext;
    }

    match content_type.map(|ct| ct.split(';').next().unwrap_or_default().trim()) {
        Some("image/png") => "png",
        Some("image/gif") => "gif",
        Some("image/webp") => "webp",
        _ => "jpg",
    }
}

/// Keep a handle usable as a flat file name.
pub fn sanitize_file_stem(name: &str) -> String {
    let stem: String = name
        .chars()
        .map(|c| {
            if c.is_alphanumeric() || c == '_' || c == '-' {
                c
            } else {
                '_'
            }
        })
        .collect();
    if stem.is_empty() {
        "_".to_string()
    } else {
        stem
    }
}
