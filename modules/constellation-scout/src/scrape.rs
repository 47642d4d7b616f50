// Scrape orchestration.
//
// Drives a MemberFeed through the discovery state machine, one row at a time:
// de-hover → hover avatar → wait for that member's card → extract → de-hover →
// avatar → upsert → periodic checkpoint. Rows are strictly sequential because
// every hover shares the single hover-card node. Members already stored only
// get their avatar re-fetched, and only when it is missing on disk.
//
// Only dataset writes abort a run. Anything the DOM or network does wrong is
// logged and absorbed into a degraded-but-valid profile or a skipped row.

use std::collections::HashSet;
use std::path::PathBuf;

use tokio::time::sleep;
use tracing::{debug, info, warn};

use crate::config::ScrapeConfig;
use crate::discovery::{DiscoveryState, ScrollDiscovery, SettleReason};
use crate::error::ScrapeError;
use crate::extractor::ProfileExtractor;
use crate::feed::{MemberFeed, RenderedRow};
use crate::images::ImageFetcher;
use crate::store::{CollectionStore, UpsertOutcome};
use crate::types::UpsertPolicy;
use crate::wait::{wait_for, WaitPolicy};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunStats {
    pub collected: usize,
    pub refreshed: usize,
    pub degraded: usize,
    pub row_failures: usize,
    pub avatar_failures: usize,
    pub avatars_backfilled: usize,
    pub checkpoints: usize,
}

/// All mutable scrape state, owned by the caller and lent to [`Scraper::run`].
pub struct ScrapeSession {
    pub store: CollectionStore,
    /// Handles tried during this run, whether or not they ended up stored.
    attempted: HashSet<String>,
    new_since_checkpoint: usize,
    pub stats: RunStats,
}

impl ScrapeSession {
    pub fn new(store: CollectionStore) -> Self {
        Self {
            store,
            attempted: HashSet::new(),
            new_since_checkpoint: 0,
            stats: RunStats::default(),
        }
    }

    /// Whether a handle needs no further hovering this run.
    pub fn is_done(&self, handle: &str) -> bool {
        self.attempted.contains(handle) || self.is_kept(handle)
    }

    /// Stored under `KeepFirst`, so the record itself will not change.
    fn is_kept(&self, handle: &str) -> bool {
        self.store.policy() == UpsertPolicy::KeepFirst && self.store.has(handle)
    }

    pub fn into_store(self) -> CollectionStore {
        self.store
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScrapeReport {
    pub stats: RunStats,
    pub total: usize,
    pub scrolls: u32,
    pub settle_reason: SettleReason,
}

pub struct Scraper<'a> {
    feed: &'a dyn MemberFeed,
    images: &'a dyn ImageFetcher,
    extractor: ProfileExtractor,
    config: ScrapeConfig,
    dataset_path: PathBuf,
}

impl<'a> Scraper<'a> {
    pub fn new(
        feed: &'a dyn MemberFeed,
        images: &'a dyn ImageFetcher,
        extractor: ProfileExtractor,
        config: ScrapeConfig,
        dataset_path: impl Into<PathBuf>,
    ) -> Self {
        Self {
            feed,
            images,
            extractor,
            config,
            dataset_path: dataset_path.into(),
        }
    }

    pub async fn run(&self, session: &mut ScrapeSession) -> Result<ScrapeReport, ScrapeError> {
        let mut discovery =
            ScrollDiscovery::new(self.config.stagnation_threshold, self.config.max_scrolls);

        info!(
            resumed = session.store.len(),
            threshold = self.config.stagnation_threshold,
            "Scrape starting"
        );

        let settle_reason = loop {
            match discovery.state() {
                DiscoveryState::Scanning => {
                    self.scan_visible_rows(session, &mut discovery).await?;
                    discovery.pass_complete();
                }
                DiscoveryState::Scrolling => {
                    if let Err(e) = self.feed.scroll_viewport().await {
                        warn!(error = %e, "Scroll failed");
                    }
                    self.pause(self.config.settle_delay).await;

                    let fresh = self.fresh_handles(session).await;
                    let state = discovery.record_scroll(fresh);
                    debug!(
                        fresh,
                        scrolls = discovery.scrolls(),
                        stagnant = discovery.stagnant_scrolls(),
                        ?state,
                        "Scrolled"
                    );
                }
                DiscoveryState::Settled(reason) => break reason,
            }
        };

        session.store.checkpoint(&self.dataset_path)?;
        session.stats.checkpoints += 1;
        session.new_since_checkpoint = 0;

        let report = ScrapeReport {
            stats: session.stats.clone(),
            total: session.store.len(),
            scrolls: discovery.scrolls(),
            settle_reason,
        };
        info!(
            collected = report.stats.collected,
            total = report.total,
            degraded = report.stats.degraded,
            avatar_failures = report.stats.avatar_failures,
            avatars_backfilled = report.stats.avatars_backfilled,
            row_failures = report.stats.row_failures,
            scrolls = report.scrolls,
            reason = ?report.settle_reason,
            "Scrape settled"
        );
        Ok(report)
    }

    async fn scan_visible_rows(
        &self,
        session: &mut ScrapeSession,
        discovery: &mut ScrollDiscovery,
    ) -> Result<(), ScrapeError> {
        let rows = match self.feed.rendered_rows().await {
            Ok(rows) => rows,
            Err(e) => {
                warn!(error = %e, "Could not read member rows");
                return Ok(());
            }
        };

        for row in &rows {
            let Some(handle) = self.extractor.row_handle(&row.html) else {
                continue;
            };
            if session.attempted.contains(&handle) {
                continue;
            }
            if session.is_kept(&handle) {
                session.attempted.insert(handle.clone());
                self.backfill_avatar(session, &handle).await;
                continue;
            }

            self.process_row(session, row, handle).await?;

            if self.limit_reached(session) {
                info!(limit = ?self.config.max_profiles, "Profile limit reached");
                discovery.limit_reached();
                break;
            }
        }
        Ok(())
    }

    async fn process_row(
        &self,
        session: &mut ScrapeSession,
        row: &RenderedRow,
        handle: String,
    ) -> Result<(), ScrapeError> {
        session.attempted.insert(handle.clone());

        let card = match self.summon_hover_card(row, &handle).await {
            Ok(card) => card,
            Err(e) => {
                warn!(handle = handle.as_str(), error = %e, "Row unusable, skipping");
                session.stats.row_failures += 1;
                return Ok(());
            }
        };
        if let Err(e) = self.feed.clear_hover().await {
            debug!(error = %e, "De-hover failed");
        }

        let Some(profile) = self.extractor.extract_html(&row.html, card.as_deref()) else {
            return Ok(());
        };
        if card.is_none() || (profile.followers.is_none() && profile.bio.is_empty()) {
            debug!(handle = handle.as_str(), "Degraded profile (no usable hover card)");
            session.stats.degraded += 1;
        }

        if self.fetch_avatar(&profile.handle, &profile.pfp_url).await == Some(false) {
            session.stats.avatar_failures += 1;
        }

        let followers = profile.followers;
        match session.store.upsert(profile) {
            UpsertOutcome::Inserted => {
                session.stats.collected += 1;
                session.new_since_checkpoint += 1;
                info!(
                    handle = handle.as_str(),
                    followers = ?followers,
                    total = session.store.len(),
                    "Collected profile"
                );
            }
            UpsertOutcome::Refreshed => {
                session.stats.refreshed += 1;
                session.new_since_checkpoint += 1;
                info!(handle = handle.as_str(), followers = ?followers, "Refreshed profile");
            }
            UpsertOutcome::Unchanged => {}
        }

        if session.new_since_checkpoint >= self.config.checkpoint_every {
            session.store.checkpoint(&self.dataset_path)?;
            session.stats.checkpoints += 1;
            session.new_since_checkpoint = 0;
        }
        Ok(())
    }

    /// A stored member's avatar, re-fetched only if it never made it to disk.
    async fn backfill_avatar(&self, session: &mut ScrapeSession, handle: &str) {
        if self.images.has_image(handle).await {
            return;
        }
        let Some(url) = session.store.get(handle).map(|p| p.pfp_url.clone()) else {
            return;
        };
        match self.fetch_avatar(handle, &url).await {
            Some(true) => {
                session.stats.avatars_backfilled += 1;
                info!(handle, "Backfilled missing avatar");
            }
            Some(false) => session.stats.avatar_failures += 1,
            None => {}
        }
    }

    /// `None` when there is no avatar URL to fetch, else whether it saved.
    async fn fetch_avatar(&self, handle: &str, url: &str) -> Option<bool> {
        if url.trim().is_empty() {
            debug!(handle, "No avatar URL, skipping download");
            return None;
        }
        match self.images.fetch(url, handle).await {
            Ok(_) => Some(true),
            Err(e) => {
                warn!(handle, url, error = %e, "Avatar download failed");
                Some(false)
            }
        }
    }

    /// Hover the row's avatar and wait (bounded) for a card that belongs to
    /// `handle`. A card left over from the previous hover does not count.
    /// `Ok(None)` is the card never appearing; `Err` is the row itself being
    /// unusable.
    async fn summon_hover_card(
        &self,
        row: &RenderedRow,
        handle: &str,
    ) -> anyhow::Result<Option<String>> {
        if let Err(e) = self.feed.clear_hover().await {
            debug!(error = %e, "De-hover failed");
        }
        self.pause(self.config.hover_delay).await;
        self.feed.hover_avatar(row).await?;

        let policy = WaitPolicy::fixed(self.config.hover_card_timeout, self.config.poll_interval);
        let feed = self.feed;
        let extractor = &self.extractor;
        let card = wait_for(&policy, || async move {
            match feed.hover_card().await {
                Ok(card) => card.filter(|html| extractor.card_belongs_to(html, handle)),
                Err(e) => {
                    debug!(error = %e, "Hover card probe failed");
                    None
                }
            }
        })
        .await;
        Ok(card)
    }

    async fn fresh_handles(&self, session: &ScrapeSession) -> usize {
        let rows = match self.feed.rendered_rows().await {
            Ok(rows) => rows,
            Err(e) => {
                warn!(error = %e, "Could not read member rows after scroll");
                return 0;
            }
        };
        rows.iter()
            .filter_map(|row| self.extractor.row_handle(&row.html))
            .filter(|handle| !session.is_done(handle))
            .collect::<HashSet<_>>()
            .len()
    }

    fn limit_reached(&self, session: &ScrapeSession) -> bool {
        self.config
            .max_profiles
            .is_some_and(|max| session.stats.collected >= max)
    }

    async fn pause(&self, delay: std::time::Duration) {
        if !delay.is_zero() {
            sleep(delay).await;
        }
    }
}
