//! The browser seam: everything a session asks of a page

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::error::E2eResult;
use crate::locator::Locator;
use crate::observe::Channel;

/// Outcome of a page navigation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NavigationResponse {
    /// Final URL after redirects
    pub url: String,

    /// HTTP status, `None` when the navigation produced no response
    pub status: Option<u16>,
}

impl NavigationResponse {
    pub fn is_success(&self) -> bool {
        self.status.map_or(true, |s| (200..400).contains(&s))
    }
}

/// Page load states (Playwright parity)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LoadState {
    #[default]
    Load,
    DomContentLoaded,
    NetworkIdle,
}

impl LoadState {
    pub fn as_str(&self) -> &'static str {
        match self {
            LoadState::Load => "load",
            LoadState::DomContentLoaded => "domcontentloaded",
            LoadState::NetworkIdle => "networkidle",
        }
    }
}

/// Something the page reported on its own
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageEvent {
    pub channel: Channel,
    pub message: String,
}

impl PageEvent {
    pub fn new(channel: Channel, message: impl Into<String>) -> Self {
        Self {
            channel,
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ClickOptions {
    /// Skip actionability checks (visibility, animations, overlays)
    pub force: bool,

    /// Which match to click; 0 is the first in document order
    pub index: usize,
}

impl ClickOptions {
    pub fn forced() -> Self {
        Self {
            force: true,
            index: 0,
        }
    }

    pub fn nth(mut self, index: usize) -> Self {
        self.index = index;
        self
    }
}

/// A single browser page under remote control.
///
/// Implementations are driven by one session at a time, so every call takes
/// `&mut self`. Events raised by the page between calls are buffered and
/// handed out by [`PageDriver::drain_events`].
#[async_trait]
pub trait PageDriver: Send {
    async fn goto(&mut self, url: &str, timeout: Duration) -> E2eResult<NavigationResponse>;

    async fn reload(&mut self, timeout: Duration) -> E2eResult<NavigationResponse>;

    async fn wait_for_load_state(&mut self, state: LoadState, timeout: Duration) -> E2eResult<()>;

    async fn url(&mut self) -> E2eResult<String>;

    async fn title(&mut self) -> E2eResult<String>;

    /// `textContent` of `<body>`, untrimmed
    async fn body_text(&mut self) -> E2eResult<String>;

    /// Serialized HTML of the whole document
    async fn content(&mut self) -> E2eResult<String>;

    async fn count(&mut self, locator: &Locator) -> E2eResult<usize>;

    async fn is_visible(&mut self, locator: &Locator, index: usize) -> E2eResult<bool>;

    /// `textContent` of every match, in document order
    async fn texts(&mut self, locator: &Locator) -> E2eResult<Vec<String>>;

    async fn click(&mut self, locator: &Locator, options: ClickOptions) -> E2eResult<()>;

    async fn screenshot(&mut self, path: &Path, full_page: bool) -> E2eResult<()>;

    /// Evaluate a JavaScript expression and return its JSON value
    async fn evaluate(&mut self, expression: &str) -> E2eResult<serde_json::Value>;

    fn drain_events(&mut self) -> Vec<PageEvent>;

    async fn close(&mut self) -> E2eResult<()>;
}

/// Launches a fresh page for each scenario run
#[async_trait]
pub trait DriverFactory: Send + Sync {
    async fn launch(&self) -> E2eResult<Box<dyn PageDriver>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_navigation_success_range() {
        let ok = NavigationResponse {
            url: "http://x/".into(),
            status: Some(200),
        };
        let redirect = NavigationResponse {
            status: Some(304),
            ..ok.clone()
        };
        let missing = NavigationResponse {
            status: Some(404),
            ..ok.clone()
        };
        let none = NavigationResponse {
            status: None,
            ..ok.clone()
        };

        assert!(ok.is_success());
        assert!(redirect.is_success());
        assert!(!missing.is_success());
        assert!(none.is_success());
    }

    #[test]
    fn test_click_options() {
        let opts = ClickOptions::forced().nth(2);
        assert!(opts.force);
        assert_eq!(opts.index, 2);
        assert!(!ClickOptions::default().force);
    }
}
