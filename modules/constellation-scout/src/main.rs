use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use anyhow::Result;
use clap::Parser;
use headless_client::{CookieRecord, HeadlessBrowser, LaunchOptions};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use constellation_scout::chrome_feed::ChromeFeed;
use constellation_scout::images::HttpImageFetcher;
use constellation_scout::wait::{wait_for, WaitPolicy};
use constellation_scout::{
    CollectionStore, Config, MemberFeed, ProfileExtractor, ScrapeConfig, ScrapeError,
    ScrapeReport, ScrapeSession, Scraper, SelectorConfig, SessionStore, UpsertPolicy,
};

/// How long the first page gets to render any member row before scanning anyway.
const FIRST_ROWS_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Parser)]
#[command(
    name = "constellation-scout",
    about = "Collect community member profiles (resumable)"
)]
struct Cli {
    /// Community members page to scrape
    #[arg(long)]
    url: Option<String>,

    /// Session cookies written by constellation-login
    #[arg(long)]
    session: Option<PathBuf>,

    /// Dataset file; resumed if it exists
    #[arg(long)]
    output: Option<PathBuf>,

    /// Directory for downloaded avatars
    #[arg(long)]
    avatars: Option<PathBuf>,

    /// Show the browser window
    #[arg(long)]
    headful: bool,

    /// Re-scrape members already in the dataset and update their records
    #[arg(long)]
    refresh: bool,

    /// Stop after collecting this many new profiles
    #[arg(long)]
    max_profiles: Option<usize>,
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("constellation_scout=info,headless_client=info")),
        )
        .init();

    match run(Cli::parse()).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => match e.downcast_ref::<ScrapeError>() {
            Some(ScrapeError::Session(inner)) => {
                error!(error = %inner, "No usable session. Run constellation-login, then retry.");
                ExitCode::from(2)
            }
            Some(ScrapeError::Storage(inner)) => {
                error!(error = %inner, "Dataset could not be read or written; the last checkpoint on disk is intact");
                ExitCode::from(3)
            }
            _ => {
                error!("Scrape failed: {e:#}");
                ExitCode::FAILURE
            }
        },
    }
}

async fn run(cli: Cli) -> Result<()> {
    let mut config = Config::from_env();
    if let Some(url) = cli.url {
        config.community_url = url;
    }
    if let Some(path) = cli.session {
        config.session_path = path;
    }
    if let Some(path) = cli.output {
        config.dataset_path = path;
    }
    if let Some(dir) = cli.avatars {
        config.avatar_dir = dir;
    }
    if cli.headful {
        config.headless = false;
    }
    config.log_redacted();

    let mut scrape_config = ScrapeConfig::from_env();
    if cli.refresh {
        scrape_config.upsert_policy = UpsertPolicy::Refresh;
    }
    scrape_config.max_profiles = cli.max_profiles;

    // Both fatal inputs are checked before a browser is started.
    let cookies = SessionStore::new(&config.session_path)
        .load()
        .map_err(ScrapeError::from)?;
    let store = CollectionStore::load(&config.dataset_path, scrape_config.upsert_policy)
        .map_err(ScrapeError::from)?;

    let extractor = ProfileExtractor::new(&SelectorConfig::default())?;
    let images = HttpImageFetcher::new(&config.avatar_dir)?;

    let browser = HeadlessBrowser::launch(&LaunchOptions {
        headless: config.headless,
        chrome_bin: config.chrome_bin.clone(),
        ..LaunchOptions::default()
    })
    .await
    .map_err(ScrapeError::from)?;

    let outcome = scrape_page(&browser, &config, &cookies, store, extractor, &images, scrape_config)
        .await;

    if let Err(e) = browser.close().await {
        warn!(error = %e, "Browser did not close cleanly");
    }

    let report = outcome?;
    info!(
        collected = report.stats.collected,
        total = report.total,
        dataset = %config.dataset_path.display(),
        "Done"
    );
    Ok(())
}

async fn scrape_page(
    browser: &HeadlessBrowser,
    config: &Config,
    cookies: &[CookieRecord],
    store: CollectionStore,
    extractor: ProfileExtractor,
    images: &HttpImageFetcher,
    scrape_config: ScrapeConfig,
) -> Result<ScrapeReport, ScrapeError> {
    let selectors = SelectorConfig::default();
    let page = browser.open(&config.community_url, cookies).await?;
    let feed = ChromeFeed::new(page, &selectors);
    wait_for_first_rows(&feed).await;

    let mut session = ScrapeSession::new(store);
    let scraper = Scraper::new(&feed, images, extractor, scrape_config, &config.dataset_path);
    scraper.run(&mut session).await
}

async fn wait_for_first_rows(feed: &ChromeFeed) {
    let policy = WaitPolicy::fixed(FIRST_ROWS_TIMEOUT, Duration::from_millis(500));
    let rows = wait_for(&policy, || async move {
        feed.rendered_rows().await.ok().filter(|rows| !rows.is_empty())
    })
    .await;

    match rows {
        Some(rows) => info!(rows = rows.len(), "Member list rendered"),
        None => warn!(
            timeout_secs = FIRST_ROWS_TIMEOUT.as_secs(),
            "No member rows rendered; the session may have expired"
        ),
    }
}
