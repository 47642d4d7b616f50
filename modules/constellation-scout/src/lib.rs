pub mod chrome_feed;
pub mod config;
pub mod discovery;
pub mod dom;
pub mod error;
pub mod extractor;
pub mod feed;
mod fsio;
pub mod images;
pub mod scrape;
pub mod session;
pub mod store;
#[cfg(any(test, feature = "test-support"))]
pub mod testing;
pub mod types;
pub mod wait;

pub use config::{Config, ScrapeConfig, SelectorConfig};
pub use discovery::{DiscoveryState, ScrollDiscovery, SettleReason};
pub use error::{DownloadError, ScrapeError, SessionError, StoreError};
pub use extractor::{parse_follower_count, ProfileExtractor};
pub use feed::{MemberFeed, RenderedRow};
pub use scrape::{RunStats, ScrapeReport, ScrapeSession, Scraper};
pub use session::SessionStore;
pub use store::{CollectionStore, UpsertOutcome};
pub use types::{Profile, UpsertPolicy};
