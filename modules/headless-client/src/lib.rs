pub mod cookie;
pub mod error;

pub use chromiumoxide::layout::Point;
pub use chromiumoxide::{Element, Page};
pub use cookie::CookieRecord;
pub use error::{HeadlessError, Result};

use std::path::PathBuf;
use std::time::Duration;

use chromiumoxide::{Browser, BrowserConfig};
use futures::StreamExt;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Consecutive handler errors after which the browser is treated as gone.
const MAX_HANDLER_ERRORS: usize = 10;

#[derive(Debug, Clone)]
pub struct LaunchOptions {
    pub headless: bool,
    pub chrome_bin: Option<PathBuf>,
    pub user_data_dir: Option<PathBuf>,
    pub window: (u32, u32),
    pub request_timeout: Duration,
}

impl Default for LaunchOptions {
    fn default() -> Self {
        Self {
            headless: true,
            chrome_bin: None,
            user_data_dir: None,
            window: (1280, 2000),
            request_timeout: Duration::from_secs(30),
        }
    }
}

/// A running Chromium instance plus the task that pumps its DevTools socket.
pub struct HeadlessBrowser {
    browser: Browser,
    handler: JoinHandle<()>,
}

impl HeadlessBrowser {
    pub async fn launch(options: &LaunchOptions) -> Result<Self> {
        let (width, height) = options.window;
        let mut builder = BrowserConfig::builder()
            .window_size(width, height)
            .viewport(None)
            .request_timeout(options.request_timeout)
            .arg("--disable-dev-shm-usage")
            .arg("--disable-blink-features=AutomationControlled");

        if !options.headless {
            builder = builder.with_head();
        }
        if let Some(ref bin) = options.chrome_bin {
            builder = builder.chrome_executable(bin);
        }
        if let Some(ref dir) = options.user_data_dir {
            builder = builder.user_data_dir(dir);
        }

        let config = builder.build().map_err(HeadlessError::Launch)?;
        let (browser, mut handler) = Browser::launch(config)
            .await
            .map_err(|e| HeadlessError::Launch(e.to_string()))?;

        let handler = tokio::spawn(async move {
            let mut errors = 0;
            while let Some(event) = handler.next().await {
                match event {
                    Ok(()) => errors = 0,
                    Err(e) => {
                        errors += 1;
                        warn!(error = %e, errors, "Browser handler error");
                        if errors >= MAX_HANDLER_ERRORS {
                            warn!("Browser handler giving up, browser process likely crashed");
                            break;
                        }
                    }
                }
            }
            debug!("Browser handler task ended");
        });

        info!(headless = options.headless, "Browser launched");
        Ok(Self { browser, handler })
    }

    /// Open `url` in a new tab, installing `cookies` before the first navigation
    /// so the initial request is already authenticated.
    pub async fn open(&self, url: &str, cookies: &[CookieRecord]) -> Result<Page> {
        let page = self.browser.new_page("about:blank").await?;

        if !cookies.is_empty() {
            let params = cookies
                .iter()
                .map(CookieRecord::to_param)
                .collect::<Result<Vec<_>>>()?;
            page.set_cookies(params).await?;
            debug!(count = cookies.len(), "Installed session cookies");
        }

        page.goto(url).await?;
        page.wait_for_navigation().await?;
        info!(url, "Page loaded");
        Ok(page)
    }

    /// Snapshot every cookie the page can see, for persisting a session.
    pub async fn cookies(&self, page: &Page) -> Result<Vec<CookieRecord>> {
        let cookies = page.get_cookies().await?;
        Ok(cookies.into_iter().map(CookieRecord::from).collect())
    }

    pub async fn close(mut self) -> Result<()> {
        self.browser.close().await?;
        if let Err(e) = self.browser.wait().await {
            debug!(error = %e, "Browser wait after close failed");
        }
        self.handler.abort();
        Ok(())
    }
}
