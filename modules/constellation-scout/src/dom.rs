// Capability interfaces over member-list markup.
//
// MemberRow / HoverCard are what the extractor reads. The HTML-backed
// implementations parse outerHTML snapshots taken from the live page, so
// extraction runs against fixtures exactly as it runs against Chromium.
// Every selector string used to read a row or card lives behind these types.

use regex::Regex;
use scraper::{ElementRef, Html, Node, Selector};

use crate::config::SelectorConfig;
use crate::error::ScrapeError;

/// A block of visible text inside a hover card, with how many interactive
/// elements (links, buttons) it contains.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextBlock {
    pub text: String,
    pub interactive: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Anchor {
    pub href: String,
    pub label: String,
}

pub trait MemberRow {
    /// Stable per-row identifier. `None` means this is not a profile row.
    fn handle(&self) -> Option<String>;
    fn display_name(&self) -> String;
    fn avatar_url(&self) -> Option<String>;
}

pub trait HoverCard {
    fn bio_candidate_blocks(&self) -> Vec<TextBlock>;
    fn follower_link(&self) -> Option<Anchor>;
}

/// Compiled form of [`SelectorConfig`].
#[derive(Debug)]
pub struct DomSelectors {
    handle_carrier: Selector,
    handle_attr: String,
    handle_prefix: String,
    name: Selector,
    image: Selector,
    bio_block: Selector,
    interactive: Selector,
    anchor: Selector,
    follower_href: Regex,
}

impl DomSelectors {
    pub fn compile(config: &SelectorConfig) -> Result<Self, ScrapeError> {
        Ok(Self {
            handle_carrier: parse_selector(&config.handle_carrier())?,
            handle_attr: config.handle_attr.clone(),
            handle_prefix: config.handle_prefix.clone(),
            name: parse_selector(&config.name)?,
            image: parse_selector("img")?,
            bio_block: parse_selector(&config.bio_block)?,
            interactive: parse_selector(&config.interactive)?,
            anchor: parse_selector("a[href]")?,
            follower_href: Regex::new(&config.follower_href).map_err(|e| {
                ScrapeError::Selector(format!("follower_href {}: {e}", config.follower_href))
            })?,
        })
    }
}

fn parse_selector(raw: &str) -> Result<Selector, ScrapeError> {
    Selector::parse(raw).map_err(|e| ScrapeError::Selector(format!("{raw}: {e:?}")))
}

pub struct HtmlMemberRow<'a> {
    html: Html,
    selectors: &'a DomSelectors,
}

impl<'a> HtmlMemberRow<'a> {
    pub fn parse(outer_html: &str, selectors: &'a DomSelectors) -> Self {
        Self {
            html: Html::parse_fragment(outer_html),
            selectors,
        }
    }

    fn carrier(&self) -> Option<ElementRef<'_>> {
        self.html.select(&self.selectors.handle_carrier).next()
    }
}

impl MemberRow for HtmlMemberRow<'_> {
    fn handle(&self) -> Option<String> {
        let value = self.carrier()?.value().attr(&self.selectors.handle_attr)?;
        let handle = value.strip_prefix(self.selectors.handle_prefix.as_str())?.trim();
        (!handle.is_empty()).then(|| handle.to_string())
    }

    fn display_name(&self) -> String {
        self.html
            .select(&self.selectors.name)
            .map(rendered_text)
            .find(|text| !text.is_empty() && !text.starts_with('@'))
            .unwrap_or_default()
    }

    fn avatar_url(&self) -> Option<String> {
        let image = self
            .carrier()
            .and_then(|c| c.select(&self.selectors.image).next())
            .or_else(|| self.html.select(&self.selectors.image).next())?;
        image
            .value()
            .attr("src")
            .map(str::trim)
            .filter(|src| !src.is_empty())
            .map(str::to_string)
    }
}

pub struct HtmlHoverCard<'a> {
    html: Html,
    selectors: &'a DomSelectors,
}

impl<'a> HtmlHoverCard<'a> {
    pub fn parse(outer_html: &str, selectors: &'a DomSelectors) -> Self {
        Self {
            html: Html::parse_fragment(outer_html),
            selectors,
        }
    }
}

impl HoverCard for HtmlHoverCard<'_> {
    fn bio_candidate_blocks(&self) -> Vec<TextBlock> {
        self.html
            .select(&self.selectors.bio_block)
            .map(|block| TextBlock {
                text: rendered_text(block),
                interactive: block.select(&self.selectors.interactive).count(),
            })
            .collect()
    }

    fn follower_link(&self) -> Option<Anchor> {
        self.html
            .select(&self.selectors.anchor)
            .filter_map(|a| {
                let href = a.value().attr("href")?;
                self.selectors
                    .follower_href
                    .is_match(href)
                    .then(|| Anchor {
                        href: href.to_string(),
                        label: rendered_text(a),
                    })
            })
            .next()
    }
}

/// Visible text of an element. Pictographs rendered as `<img alt>` contribute
/// their alt text, `<br>` becomes a newline, runs of spaces collapse.
pub fn rendered_text(element: ElementRef<'_>) -> String {
    let mut raw = String::new();
    for node in element.descendants() {
        match node.value() {
            Node::Text(text) => raw.push_str(text),
            Node::Element(el) if el.name() == "img" => {
                if let Some(alt) = el.attr("alt") {
                    raw.push_str(alt);
                }
            }
            Node::Element(el) if el.name() == "br" => raw.push('\n'),
            _ => {}
        }
    }
    normalize_whitespace(&raw)
}

fn normalize_whitespace(raw: &str) -> String {
    raw.lines()
        .map(|line| line.split_whitespace().collect::<Vec<_>>().join(" "))
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}
