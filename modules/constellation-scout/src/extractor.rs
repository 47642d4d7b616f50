use tracing::debug;

use crate::config::SelectorConfig;
use crate::dom::{DomSelectors, HoverCard, HtmlHoverCard, HtmlMemberRow, MemberRow, TextBlock};
use crate::error::ScrapeError;
use crate::types::Profile;

/// Above this many links/buttons per word a block reads as controls, not prose.
const MAX_INTERACTIVE_DENSITY: f32 = 0.5;

/// Exact labels of hover-card controls that sit in text blocks.
const CALL_TO_ACTION: &[&str] = &[
    "follow",
    "following",
    "follows you",
    "follow back",
    "click to follow",
    "unfollow",
    "subscribe",
    "message",
    "view profile",
];

pub struct ProfileExtractor {
    selectors: DomSelectors,
}

impl ProfileExtractor {
    pub fn new(config: &SelectorConfig) -> Result<Self, ScrapeError> {
        Ok(Self {
            selectors: DomSelectors::compile(config)?,
        })
    }

    /// Read the handle off a row snapshot without extracting anything else.
    pub fn row_handle(&self, row_html: &str) -> Option<String> {
        HtmlMemberRow::parse(row_html, &self.selectors).handle()
    }

    /// The member a hover card belongs to, read off its follower link.
    pub fn card_owner(&self, card_html: &str) -> Option<String> {
        let card = HtmlHoverCard::parse(card_html, &self.selectors);
        self.link_owner(&card.follower_link()?.href)
    }

    /// Whether a rendered card can be `handle`'s. Cards with no follower link
    /// carry no owner and are accepted.
    pub fn card_belongs_to(&self, card_html: &str, handle: &str) -> bool {
        self.card_owner(card_html)
            .map_or(true, |owner| owner.eq_ignore_ascii_case(handle))
    }

    pub fn extract_html(&self, row_html: &str, card_html: Option<&str>) -> Option<Profile> {
        let row = HtmlMemberRow::parse(row_html, &self.selectors);
        let card = card_html.map(|html| HtmlHoverCard::parse(html, &self.selectors));
        self.extract(&row, card.as_ref().map(|c| c as &dyn HoverCard))
    }

    /// Build a profile from a row and, when one rendered, its hover card.
    /// Returns `None` only for rows that carry no handle.
    pub fn extract(&self, row: &dyn MemberRow, card: Option<&dyn HoverCard>) -> Option<Profile> {
        let handle = row.handle()?;
        let name = row.display_name();
        let mut profile = Profile::from_row(handle, name, row.avatar_url().unwrap_or_default());

        let Some(card) = card else {
            debug!(handle = profile.handle.as_str(), "No hover card, row-only profile");
            return Some(profile);
        };

        let follower_link = card.follower_link();
        if let Some(ref link) = follower_link {
            if let Some(owner) = self.link_owner(&link.href) {
                if !owner.eq_ignore_ascii_case(&profile.handle) {
                    debug!(
                        handle = profile.handle.as_str(),
                        card_owner = owner.as_str(),
                        "Hover card belongs to another member, ignoring it"
                    );
                    return Some(profile);
                }
            }
        }

        profile.followers = follower_link.and_then(|link| parse_follower_count(&link.label));
        profile.bio = select_bio(&card.bio_candidate_blocks(), &profile.name, &profile.handle)
            .unwrap_or_default();
        Some(profile)
    }

    /// The handle a follower link points at: the path segment before the
    /// followers endpoint.
    fn link_owner(&self, href: &str) -> Option<String> {
        let path = match url::Url::parse(href) {
            Ok(absolute) => absolute.path().to_string(),
            Err(_) => href.split(['?', '#']).next().unwrap_or_default().to_string(),
        };
        let mut segments = path.split('/').filter(|s| !s.is_empty()).rev();
        segments.next()?;
        segments.next().map(str::to_string)
    }
}

/// Pick the prose block among hover-card text blocks. Best effort: the first
/// block that is not empty, not a handle line, not a control label, not a
/// follow-count line, not the display name, and not link-dense.
pub fn select_bio(blocks: &[TextBlock], name: &str, handle: &str) -> Option<String> {
    blocks
        .iter()
        .find(|block| looks_like_bio(block, name, handle))
        .map(|block| block.text.clone())
}

fn looks_like_bio(block: &TextBlock, name: &str, handle: &str) -> bool {
    let text = block.text.trim();
    if text.is_empty() || text.starts_with('@') {
        return false;
    }
    if text == name || text.eq_ignore_ascii_case(handle) {
        return false;
    }

    let lowered = text.to_lowercase();
    if CALL_TO_ACTION.contains(&lowered.as_str()) || is_follow_count_line(&lowered) {
        return false;
    }

    let words = text.split_whitespace().count().max(1);
    (block.interactive as f32 / words as f32) <= MAX_INTERACTIVE_DENSITY
}

fn is_follow_count_line(lowered: &str) -> bool {
    let mut tokens = lowered.split_whitespace();
    let (Some(count), Some(label), None) = (tokens.next(), tokens.next(), tokens.next()) else {
        return false;
    };
    parse_follower_count(count).is_some()
        && matches!(label, "followers" | "following" | "subscribers")
}

/// Parse a follower label such as `12.3K Followers`, `1.2M` or `4,502`.
///
/// Suffixed values are floored after scaling (`12.34k` → 12340, `1.2345k` →
/// 1234). Unrecognised text yields `None`.
pub fn parse_follower_count(label: &str) -> Option<u64> {
    let token = label
        .split_whitespace()
        .find(|t| t.starts_with(|c: char| c.is_ascii_digit()))?;
    let token = token.replace(',', "").to_ascii_lowercase();

    let (number, multiplier) = match token.chars().last()? {
        'k' => (&token[..token.len() - 1], 1_000u64),
        'm' => (&token[..token.len() - 1], 1_000_000),
        'b' => (&token[..token.len() - 1], 1_000_000_000),
        _ => (token.as_str(), 1),
    };

    if multiplier == 1 {
        let digits: String = number.chars().filter(|c| c.is_ascii_digit()).collect();
        if digits.is_empty() || number.contains('.') {
            return None;
        }
        return digits.parse().ok();
    }

    scaled_floor(number, multiplier)
}

/// `whole.frac × multiplier`, floored, in integer arithmetic.
fn scaled_floor(number: &str, multiplier: u64) -> Option<u64> {
    let (whole, frac) = number.split_once('.').unwrap_or((number, ""));
    if whole.is_empty() && frac.is_empty() {
        return None;
    }
    if !whole.chars().all(|c| c.is_ascii_digit()) || !frac.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }

    let whole: u64 = if whole.is_empty() { 0 } else { whole.parse().ok()? };
    let mut value = whole.checked_mul(multiplier)?;

    // Digits past the multiplier's precision only ever round down.
    let precision = multiplier.ilog10() as usize;
    let kept = &frac[..frac.len().min(precision)];
    if !kept.is_empty() {
        let scale = 10u64.pow((precision - kept.len()) as u32);
        value = value.checked_add(kept.parse::<u64>().ok()? * scale)?;
    }
    Some(value)
}
