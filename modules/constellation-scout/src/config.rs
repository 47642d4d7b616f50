use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use tracing::{info, warn};

use crate::types::UpsertPolicy;

const DEFAULT_COMMUNITY_URL: &str = "https://x.com/i/communities/1493446837214187523/members";
const DEFAULT_LOGIN_URL: &str = "https://x.com/i/flow/login";

/// Paths and endpoints, loaded from environment variables (and `.env`).
#[derive(Debug, Clone)]
pub struct Config {
    pub community_url: String,
    pub login_url: String,
    pub session_path: PathBuf,
    pub dataset_path: PathBuf,
    pub avatar_dir: PathBuf,
    pub chrome_bin: Option<PathBuf>,
    pub headless: bool,
}

impl Config {
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();

        Self {
            community_url: env::var("COMMUNITY_URL")
                .unwrap_or_else(|_| DEFAULT_COMMUNITY_URL.to_string()),
            login_url: env::var("LOGIN_URL").unwrap_or_else(|_| DEFAULT_LOGIN_URL.to_string()),
            session_path: env_path("SESSION_PATH", "data/session.json"),
            dataset_path: env_path("DATASET_PATH", "data/profiles.json"),
            avatar_dir: env_path("AVATAR_DIR", "data/avatars"),
            chrome_bin: env::var("CHROME_BIN").ok().map(PathBuf::from),
            headless: env_parse("HEADLESS", true),
        }
    }

    pub fn log_redacted(&self) {
        info!(
            community_url = self.community_url.as_str(),
            session = %self.session_path.display(),
            dataset = %self.dataset_path.display(),
            avatars = %self.avatar_dir.display(),
            chrome_bin = ?self.chrome_bin,
            headless = self.headless,
            "Configuration loaded"
        );
    }
}

/// Timing and limits for one scrape run.
#[derive(Debug, Clone)]
pub struct ScrapeConfig {
    /// Consecutive scrolls with no fresh handles before the feed counts as exhausted.
    pub stagnation_threshold: u32,
    /// Hard ceiling on scroll actions per run.
    pub max_scrolls: u32,
    pub checkpoint_every: usize,
    pub hover_card_timeout: Duration,
    pub poll_interval: Duration,
    pub settle_delay: Duration,
    pub hover_delay: Duration,
    pub upsert_policy: UpsertPolicy,
    pub max_profiles: Option<usize>,
}

impl Default for ScrapeConfig {
    fn default() -> Self {
        Self {
            stagnation_threshold: 5,
            max_scrolls: 400,
            checkpoint_every: 25,
            hover_card_timeout: Duration::from_millis(3000),
            poll_interval: Duration::from_millis(100),
            settle_delay: Duration::from_millis(1500),
            hover_delay: Duration::from_millis(250),
            upsert_policy: UpsertPolicy::KeepFirst,
            max_profiles: None,
        }
    }
}

impl ScrapeConfig {
    pub fn from_env() -> Self {
        let d = Self::default();
        Self {
            stagnation_threshold: env_parse("SCRAPE_STAGNATION_THRESHOLD", d.stagnation_threshold),
            max_scrolls: env_parse("SCRAPE_MAX_SCROLLS", d.max_scrolls),
            checkpoint_every: env_parse("SCRAPE_CHECKPOINT_EVERY", d.checkpoint_every).max(1),
            hover_card_timeout: env_millis("SCRAPE_HOVER_TIMEOUT_MS", d.hover_card_timeout),
            poll_interval: env_millis("SCRAPE_POLL_INTERVAL_MS", d.poll_interval),
            settle_delay: env_millis("SCRAPE_SETTLE_DELAY_MS", d.settle_delay),
            hover_delay: env_millis("SCRAPE_HOVER_DELAY_MS", d.hover_delay),
            upsert_policy: if env_parse("SCRAPE_REFRESH", false) {
                UpsertPolicy::Refresh
            } else {
                d.upsert_policy
            },
            max_profiles: None,
        }
    }

    /// Zero delays and timeouts, for driving fixtures.
    pub fn immediate() -> Self {
        Self {
            hover_card_timeout: Duration::ZERO,
            poll_interval: Duration::ZERO,
            settle_delay: Duration::ZERO,
            hover_delay: Duration::ZERO,
            ..Self::default()
        }
    }
}

/// CSS selectors and patterns for the member list markup.
#[derive(Debug, Clone)]
pub struct SelectorConfig {
    pub row: String,
    pub handle_attr: String,
    pub handle_prefix: String,
    pub name: String,
    pub hover_card: String,
    pub bio_block: String,
    pub interactive: String,
    pub follower_href: String,
}

impl Default for SelectorConfig {
    fn default() -> Self {
        Self {
            row: r#"[data-testid="UserCell"]"#.to_string(),
            handle_attr: "data-testid".to_string(),
            handle_prefix: "UserAvatar-Container-".to_string(),
            name: r#"a[role="link"] div[dir="ltr"] span"#.to_string(),
            hover_card: r#"[data-testid="HoverCard"]"#.to_string(),
            bio_block: r#"div[dir="auto"], div[dir="ltr"]"#.to_string(),
            interactive: r#"a, button, [role="button"], [role="link"]"#.to_string(),
            follower_href: r"/(?:verified_)?followers/?(?:[?#].*)?$".to_string(),
        }
    }
}

impl SelectorConfig {
    /// The element carrying the handle attribute, which is also the hover target.
    pub fn handle_carrier(&self) -> String {
        format!(r#"[{}^="{}"]"#, self.handle_attr, self.handle_prefix)
    }
}

fn env_path(key: &str, default: &str) -> PathBuf {
    env::var(key)
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from(default))
}

fn env_parse<T: FromStr + Copy + std::fmt::Debug>(key: &str, default: T) -> T {
    match env::var(key) {
        Ok(raw) => raw.trim().parse().unwrap_or_else(|_| {
            warn!(key, value = raw.as_str(), ?default, "Unparseable value, using default");
            default
        }),
        Err(_) => default,
    }
}

fn env_millis(key: &str, default: Duration) -> Duration {
    let ms = env_parse(key, default.as_millis() as u64);
    Duration::from_millis(ms)
}
