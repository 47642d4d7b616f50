use anyhow::{Context, Result};
use async_trait::async_trait;
use headless_client::{Element, HeadlessError, Page, Point};
use tokio::sync::Mutex;
use tracing::debug;

use crate::config::SelectorConfig;
use crate::feed::{MemberFeed, RenderedRow};

/// Where the pointer parks between hovers: the top-left corner, clear of the list.
const NEUTRAL_POINT: (f64, f64) = (2.0, 2.0);

pub struct ChromeFeed {
    page: Page,
    row_selector: String,
    hover_target: String,
    card_selector: String,
    rows: Mutex<Vec<Element>>,
}

impl ChromeFeed {
    pub fn new(page: Page, selectors: &SelectorConfig) -> Self {
        Self {
            page,
            row_selector: selectors.row.clone(),
            hover_target: selectors.handle_carrier(),
            card_selector: selectors.hover_card.clone(),
            rows: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl MemberFeed for ChromeFeed {
    async fn rendered_rows(&self) -> Result<Vec<RenderedRow>> {
        let elements = match self.page.find_elements(self.row_selector.as_str()).await {
            Ok(elements) => elements,
            Err(e) => {
                debug!(error = %e, "No member rows in DOM");
                Vec::new()
            }
        };

        let mut rows = Vec::with_capacity(elements.len());
        for (index, element) in elements.iter().enumerate() {
            // Rows detach while the list virtualizes; skip the ones that vanished.
            match element.outer_html().await {
                Ok(Some(html)) => rows.push(RenderedRow { index, html }),
                Ok(None) => {}
                Err(e) => debug!(index, error = %e, "Row detached before snapshot"),
            }
        }

        *self.rows.lock().await = elements;
        Ok(rows)
    }

    async fn hover_avatar(&self, row: &RenderedRow) -> Result<()> {
        let rows = self.rows.lock().await;
        let element = rows
            .get(row.index)
            .with_context(|| format!("row {} is not in the current snapshot", row.index))?;
        let target = element
            .find_element(self.hover_target.as_str())
            .await
            .map_err(HeadlessError::from)
            .context("avatar not found in row")?;
        target
            .hover()
            .await
            .map_err(HeadlessError::from)
            .context("hover failed")?;
        Ok(())
    }

    async fn clear_hover(&self) -> Result<()> {
        let (x, y) = NEUTRAL_POINT;
        self.page
            .move_mouse(Point::new(x, y))
            .await
            .map_err(HeadlessError::from)
            .context("pointer move failed")?;
        Ok(())
    }

    async fn hover_card(&self) -> Result<Option<String>> {
        match self.page.find_element(self.card_selector.as_str()).await {
            Ok(card) => Ok(card.outer_html().await.map_err(HeadlessError::from)?),
            Err(_) => Ok(None),
        }
    }

    async fn scroll_viewport(&self) -> Result<()> {
        self.page
            .evaluate("window.scrollBy(0, window.innerHeight)")
            .await
            .map_err(HeadlessError::from)
            .context("scroll failed")?;
        Ok(())
    }
}
