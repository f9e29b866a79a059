use std::time::Duration;

use chromiumoxide::Page;
use tracing::debug;

use crate::error::{BrowserSessionError, Result};

/// Rendered state of a tab at one moment.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PageSnapshot {
    /// URL after redirects; auth walls show up here.
    pub url: String,
    pub html: String,
}

/// One browser tab driven over CDP.
///
/// Every navigation is bounded by `nav_timeout` and followed by a fixed
/// settle delay so client-rendered content has time to appear.
pub struct CdpPage {
    page: Page,
    nav_timeout: Duration,
    settle: Duration,
}

impl CdpPage {
    pub(crate) fn new(page: Page, nav_timeout: Duration, settle: Duration) -> Self {
        Self {
            page,
            nav_timeout,
            settle,
        }
    }

    pub async fn load(&self, url: &str) -> Result<PageSnapshot> {
        debug!(url, "Navigating");
        tokio::time::timeout(self.nav_timeout, self.page.goto(url))
            .await
            .map_err(|_| BrowserSessionError::Timeout(url.to_string()))??;
        tokio::time::sleep(self.settle).await;
        self.snapshot().await
    }

    pub async fn snapshot(&self) -> Result<PageSnapshot> {
        let url = self.page.url().await?.unwrap_or_default();
        let html = self.page.content().await?;
        Ok(PageSnapshot { url, html })
    }

    /// Scroll the window to `y` pixels so lazy sections render, then snapshot.
    pub async fn scroll_to(&self, y: u32) -> Result<PageSnapshot> {
        self.page
            .evaluate(format!("window.scrollTo(0, {y});"))
            .await?;
        tokio::time::sleep(self.settle).await;
        self.snapshot().await
    }

    /// Type into each `(selector, value)` field, click `submit`, wait for the
    /// resulting navigation.
    pub async fn fill_and_submit(
        &self,
        fields: &[(&str, &str)],
        submit: &str,
    ) -> Result<PageSnapshot> {
        for (selector, value) in fields {
            let element = self.page.find_element(*selector).await?;
            element.click().await?;
            element.type_str(*value).await?;
        }
        self.page.find_element(submit).await?.click().await?;

        tokio::time::timeout(self.nav_timeout, self.page.wait_for_navigation())
            .await
            .map_err(|_| BrowserSessionError::Timeout(submit.to_string()))??;
        tokio::time::sleep(self.settle).await;
        self.snapshot().await
    }
}
