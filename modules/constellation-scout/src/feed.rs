use anyhow::Result;
use async_trait::async_trait;

/// One rendered member row from a snapshot of the list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedRow {
    /// Position in the snapshot that produced it; only valid until the next
    /// call to [`MemberFeed::rendered_rows`].
    pub index: usize,
    pub html: String,
}

/// The live member listing, seen as the handful of actions the scraper needs.
///
/// Implemented over Chromium by `ChromeFeed` and over canned HTML by
/// `testing::FixtureFeed`.
#[async_trait]
pub trait MemberFeed: Send + Sync {
    /// Snapshot the member rows currently in the DOM.
    async fn rendered_rows(&self) -> Result<Vec<RenderedRow>>;

    /// Move the pointer over the row's avatar to summon its hover card.
    async fn hover_avatar(&self, row: &RenderedRow) -> Result<()>;

    /// Move the pointer somewhere neutral so any open hover card closes.
    async fn clear_hover(&self) -> Result<()>;

    /// The hover card's outer HTML if one is rendered right now. Does not wait.
    async fn hover_card(&self) -> Result<Option<String>>;

    /// Scroll the listing down by one viewport height.
    async fn scroll_viewport(&self) -> Result<()>;
}
