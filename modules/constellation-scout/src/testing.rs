// Test doubles for the scrape pipeline.
//
// One per trait boundary:
// - FixtureFeed (MemberFeed): canned row/card HTML revealed pass by pass
// - MockImageFetcher (ImageFetcher): records requests, fails on demand,
//   remembers which avatars are saved
//
// Plus HTML builders that mirror the member-list markup the default
// selectors expect.

use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::Mutex;

use anyhow::{bail, Result};
use async_trait::async_trait;

use crate::error::DownloadError;
use crate::feed::{MemberFeed, RenderedRow};
use crate::images::ImageFetcher;

// ---------------------------------------------------------------------------
// HTML builders
// ---------------------------------------------------------------------------

pub fn avatar_url(handle: &str) -> String {
    format!("https://pbs.twimg.com/profile_images/1/{handle}_normal.jpg")
}

pub fn member_row_html(handle: &str, name: &str) -> String {
    format!(
        r#"<div data-testid="UserCell"><div data-testid="UserAvatar-Container-{handle}"><a href="/{handle}"><img src="{avatar}"></a></div><div><a href="/{handle}" role="link"><div dir="ltr"><span>{name}</span></div></a><a href="/{handle}" role="link"><div dir="ltr"><span>@{handle}</span></div></a><div role="button"><span>Follow</span></div></div></div>"#,
        avatar = avatar_url(handle),
    )
}

/// `bio_html` is inserted verbatim, so it may carry `<img alt>` pictographs.
pub fn hover_card_html(handle: &str, bio_html: &str, followers_label: &str) -> String {
    format!(
        r#"<div data-testid="HoverCard"><div><a href="/{handle}"><span>{handle}</span></a><a href="/{handle}"><div dir="ltr"><span>@{handle}</span></div></a><div role="button"><span>Follow</span></div></div><div dir="auto" data-testid="UserDescription"><span>{bio_html}</span></div><div><a href="/{handle}/following"><span>120</span> <span>Following</span></a><a href="/{handle}/verified_followers"><span>{followers_label}</span> <span>Followers</span></a></div></div>"#
    )
}

// ---------------------------------------------------------------------------
// FixtureFeed
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct FixtureMember {
    pub handle: String,
    pub row_html: String,
    pub card_html: Option<String>,
}

impl FixtureMember {
    pub fn with_card(handle: &str, name: &str, bio: &str, followers: &str) -> Self {
        Self {
            handle: handle.to_string(),
            row_html: member_row_html(handle, name),
            card_html: Some(hover_card_html(handle, bio, followers)),
        }
    }

    /// A member whose hover card never renders.
    pub fn without_card(handle: &str, name: &str) -> Self {
        Self {
            handle: handle.to_string(),
            row_html: member_row_html(handle, name),
            card_html: None,
        }
    }

    /// A non-profile row (headers, "show more" links).
    pub fn filler(html: &str) -> Self {
        Self {
            handle: String::new(),
            row_html: html.to_string(),
            card_html: None,
        }
    }
}

type HoverHook = Box<dyn Fn(&str) + Send + Sync>;

#[derive(Default)]
struct FeedState {
    pass: usize,
    hovered: Option<usize>,
    scrolls: u32,
    hovers: Vec<String>,
    clears: usize,
    /// The last card that rendered, and how many more lookups it survives.
    lingering: Option<(String, usize)>,
}

/// A member list whose visible rows are `passes[n]` after `n` scrolls.
/// Scrolling past the last pass keeps showing it.
pub struct FixtureFeed {
    passes: Vec<Vec<FixtureMember>>,
    detached: HashSet<String>,
    on_hover: Option<HoverHook>,
    linger_lookups: usize,
    state: Mutex<FeedState>,
}

impl FixtureFeed {
    pub fn new(passes: Vec<Vec<FixtureMember>>) -> Self {
        Self {
            passes,
            detached: HashSet::new(),
            on_hover: None,
            linger_lookups: 0,
            state: Mutex::new(FeedState::default()),
        }
    }

    /// Split `members` into disjoint windows of `size`, like a virtualized list.
    pub fn windows(members: Vec<FixtureMember>, size: usize) -> Self {
        Self::new(members.chunks(size).map(<[_]>::to_vec).collect())
    }

    /// Make hovering this handle fail, as if the row detached mid-scroll.
    pub fn detach(mut self, handle: &str) -> Self {
        self.detached.insert(handle.to_string());
        self
    }

    /// Keep the previous member's card in the DOM for the first `lookups`
    /// card lookups after each hover, like a card still fading out.
    pub fn lingering_cards(mut self, lookups: usize) -> Self {
        self.linger_lookups = lookups;
        self
    }

    pub fn on_hover(mut self, hook: impl Fn(&str) + Send + Sync + 'static) -> Self {
        self.on_hover = Some(Box::new(hook));
        self
    }

    pub fn scrolls(&self) -> u32 {
        self.state.lock().unwrap().scrolls
    }

    pub fn hovered_handles(&self) -> Vec<String> {
        self.state.lock().unwrap().hovers.clone()
    }

    pub fn clears(&self) -> usize {
        self.state.lock().unwrap().clears
    }

    fn visible(&self, pass: usize) -> &[FixtureMember] {
        match self.passes.len() {
            0 => &[],
            n => &self.passes[pass.min(n - 1)],
        }
    }
}

#[async_trait]
impl MemberFeed for FixtureFeed {
    async fn rendered_rows(&self) -> Result<Vec<RenderedRow>> {
        let pass = self.state.lock().unwrap().pass;
        Ok(self
            .visible(pass)
            .iter()
            .enumerate()
            .map(|(index, m)| RenderedRow {
                index,
                html: m.row_html.clone(),
            })
            .collect())
    }

    async fn hover_avatar(&self, row: &RenderedRow) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        let Some(member) = self.visible(state.pass).get(row.index) else {
            bail!("FixtureFeed: row {} not rendered", row.index);
        };
        if self.detached.contains(&member.handle) {
            bail!("FixtureFeed: row for {} detached", member.handle);
        }
        if let Some(ref hook) = self.on_hover {
            hook(&member.handle);
        }
        state.hovers.push(member.handle.clone());
        state.hovered = Some(row.index);
        if let Some((_, left)) = state.lingering.as_mut() {
            *left = self.linger_lookups;
        }
        Ok(())
    }

    async fn clear_hover(&self) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        state.hovered = None;
        state.clears += 1;
        Ok(())
    }

    async fn hover_card(&self) -> Result<Option<String>> {
        let mut state = self.state.lock().unwrap();
        if let Some((card, left)) = state.lingering.as_mut() {
            if *left > 0 {
                *left -= 1;
                return Ok(Some(card.clone()));
            }
        }

        let card = state
            .hovered
            .and_then(|i| self.visible(state.pass).get(i))
            .and_then(|m| m.card_html.clone());
        if let Some(ref html) = card {
            state.lingering = Some((html.clone(), 0));
        }
        Ok(card)
    }

    async fn scroll_viewport(&self) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        state.pass += 1;
        state.scrolls += 1;
        state.hovered = None;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// MockImageFetcher
// ---------------------------------------------------------------------------

/// Records every requested download. Names in `failing` get an HTTP 404;
/// every other request counts as saved.
#[derive(Default)]
pub struct MockImageFetcher {
    failing: HashSet<String>,
    requests: Mutex<Vec<(String, String)>>,
    saved: Mutex<HashSet<String>>,
}

impl MockImageFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing_for(mut self, name: &str) -> Self {
        self.failing.insert(name.to_string());
        self
    }

    /// Start with these avatars already on disk, e.g. from an earlier run.
    pub fn with_saved(self, names: impl IntoIterator<Item = String>) -> Self {
        self.saved.lock().unwrap().extend(names);
        self
    }

    pub fn requests(&self) -> Vec<(String, String)> {
        self.requests.lock().unwrap().clone()
    }

    pub fn requested_names(&self) -> Vec<String> {
        self.requests().into_iter().map(|(_, name)| name).collect()
    }

    pub fn saved(&self) -> HashSet<String> {
        self.saved.lock().unwrap().clone()
    }
}

#[async_trait]
impl ImageFetcher for MockImageFetcher {
    async fn fetch(&self, url: &str, destination_name: &str) -> Result<PathBuf, DownloadError> {
        self.requests
            .lock()
            .unwrap()
            .push((url.to_string(), destination_name.to_string()));
        if self.failing.contains(destination_name) {
            return Err(DownloadError::Status {
                status: 404,
                url: url.to_string(),
            });
        }
        self.saved
            .lock()
            .unwrap()
            .insert(destination_name.to_string());
        Ok(PathBuf::from(format!("{destination_name}.jpg")))
    }

    async fn has_image(&self, destination_name: &str) -> bool {
        self.saved.lock().unwrap().contains(destination_name)
    }
}
