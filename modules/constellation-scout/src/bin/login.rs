//! Interactive login: opens a visible browser on the login page, waits for
//! the operator to sign in, then saves the session cookies for the scraper.
//!
//! Usage: cargo run --bin constellation-login

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use headless_client::{HeadlessBrowser, LaunchOptions};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::info;
use tracing_subscriber::EnvFilter;

use constellation_scout::{Config, SessionStore};

#[derive(Parser)]
#[command(name = "constellation-login", about = "Capture a logged-in browser session")]
struct Cli {
    /// Login page to open
    #[arg(long)]
    url: Option<String>,

    /// Where to write the session cookies
    #[arg(long)]
    session: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let config = Config::from_env();
    let login_url = cli.url.unwrap_or(config.login_url);
    let store = SessionStore::new(cli.session.unwrap_or(config.session_path));

    let browser = HeadlessBrowser::launch(&LaunchOptions {
        headless: false,
        chrome_bin: config.chrome_bin,
        ..LaunchOptions::default()
    })
    .await
    .context("Failed to launch browser")?;

    let page = browser
        .open(&login_url, &[])
        .await
        .context("Failed to open login page")?;

    println!("Log in in the browser window, then press Enter here to save the session.");
    let mut line = String::new();
    BufReader::new(tokio::io::stdin())
        .read_line(&mut line)
        .await
        .context("Failed to read from stdin")?;

    let cookies = browser.cookies(&page).await.context("Failed to read cookies")?;
    if cookies.is_empty() {
        anyhow::bail!("Browser holds no cookies; was the login completed?");
    }
    store.save(&cookies)?;
    info!(path = %store.path().display(), count = cookies.len(), "Session captured");

    browser.close().await?;
    Ok(())
}
