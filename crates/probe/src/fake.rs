//! In-memory page for exercising sessions and scenarios without a browser
//!
//! A [`FakePage`] is a small state machine: each named [`FakeState`] holds the
//! body text, markup and elements of one screen, and clicking an element can
//! move the page to another state. Navigation picks a state by matching the
//! URL against registered routes.

use async_trait::async_trait;
use serde_json::Value;
use std::collections::{HashMap, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::driver::{ClickOptions, DriverFactory, LoadState, NavigationResponse, PageDriver, PageEvent};
use crate::error::{E2eError, E2eResult};
use crate::locator::Locator;
use crate::observe::Channel;

#[derive(Debug, Clone)]
pub struct FakeElement {
    pub text: String,
    pub visible: bool,
    pub interactable: bool,

    /// Clicks that fail as detached before the element settles
    pub stale_clicks: u32,

    /// State entered when clicked
    pub goes_to: Option<String>,
}

impl FakeElement {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            visible: true,
            interactable: true,
            stale_clicks: 0,
            goes_to: None,
        }
    }

    pub fn hidden(mut self) -> Self {
        self.visible = false;
        self
    }

    /// Visible but covered, e.g. by a running CSS transition
    pub fn animating(mut self) -> Self {
        self.interactable = false;
        self
    }

    pub fn stale_for(mut self, clicks: u32) -> Self {
        self.stale_clicks = clicks;
        self
    }

    pub fn goes_to(mut self, state: impl Into<String>) -> Self {
        self.goes_to = Some(state.into());
        self
    }
}

#[derive(Debug, Clone, Default)]
pub struct FakeState {
    pub url: String,
    pub title: String,
    pub body_text: String,
    pub html: String,
    pub elements: HashMap<String, Vec<FakeElement>>,
    pub eval: HashMap<String, Value>,

    /// Raised when the page enters this state
    pub events: Vec<PageEvent>,
}

impl FakeState {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Default::default()
        }
    }

    pub fn title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    pub fn body(mut self, text: impl Into<String>) -> Self {
        self.body_text = text.into();
        self
    }

    pub fn html(mut self, html: impl Into<String>) -> Self {
        self.html = html.into();
        self
    }

    pub fn element(mut self, locator: &Locator, element: FakeElement) -> Self {
        self.elements.entry(locator.selector()).or_default().push(element);
        self
    }

    pub fn eval(mut self, expression: impl Into<String>, value: Value) -> Self {
        self.eval.insert(expression.into(), value);
        self
    }

    pub fn event(mut self, channel: Channel, message: impl Into<String>) -> Self {
        self.events.push(PageEvent::new(channel, message));
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClickRecord {
    pub selector: String,
    pub index: usize,
    pub force: bool,
}

/// What happened to a fake page, shared across clones
#[derive(Debug, Default)]
pub struct Recorded {
    pub clicks: Vec<ClickRecord>,
    pub screenshots: Vec<PathBuf>,
    pub visited: Vec<String>,
    pub body_reads: usize,
    pub closed: bool,
}

#[derive(Debug, Clone)]
struct Route {
    pattern: String,
    status: u16,
    state: String,
}

#[derive(Debug, Clone)]
pub struct FakePage {
    states: HashMap<String, FakeState>,
    blank: FakeState,
    routes: Vec<Route>,
    current: String,
    hang_navigation: bool,
    body_failures: VecDeque<String>,
    pending: Vec<PageEvent>,
    recorded: Arc<Mutex<Recorded>>,
}

const BLANK: &str = "__blank__";

impl FakePage {
    pub fn new() -> Self {
        Self {
            states: HashMap::new(),
            blank: FakeState::new("about:blank"),
            routes: Vec::new(),
            current: BLANK.to_string(),
            hang_navigation: false,
            body_failures: VecDeque::new(),
            pending: Vec::new(),
            recorded: Arc::new(Mutex::new(Recorded::default())),
        }
    }

    /// One reachable state with the given body text, served for every URL
    pub fn single(body: impl Into<String>) -> Self {
        Self::new()
            .state("main", FakeState::new("http://game.test/").body(body))
            .route("", "main")
    }

    pub fn state(mut self, name: impl Into<String>, state: FakeState) -> Self {
        self.states.insert(name.into(), state);
        self
    }

    /// Serve `state` for URLs containing `pattern`; the longest match wins
    pub fn route(self, pattern: impl Into<String>, state: impl Into<String>) -> Self {
        self.route_status(pattern, 200, state)
    }

    pub fn route_status(mut self, pattern: impl Into<String>, status: u16, state: impl Into<String>) -> Self {
        self.routes.push(Route {
            pattern: pattern.into(),
            status,
            state: state.into(),
        });
        self
    }

    /// Navigations never complete and run into their timeout
    pub fn hanging(mut self) -> Self {
        self.hang_navigation = true;
        self
    }

    /// Make the next body text read fail as a detached element
    pub fn fail_body_read(mut self, message: impl Into<String>) -> Self {
        self.body_failures.push_back(message.into());
        self
    }

    pub fn recorder(&self) -> Arc<Mutex<Recorded>> {
        Arc::clone(&self.recorded)
    }

    pub fn current_state(&self) -> &str {
        &self.current
    }

    fn with_recorded<R>(&self, f: impl FnOnce(&mut Recorded) -> R) -> R {
        let mut guard = self.recorded.lock().unwrap_or_else(|p| p.into_inner());
        f(&mut guard)
    }

    fn state_ref(&self) -> &FakeState {
        self.states.get(&self.current).unwrap_or(&self.blank)
    }

    fn enter(&mut self, name: &str) {
        self.current = name.to_string();
        let events = self.state_ref().events.clone();
        self.pending.extend(events);
        self.with_recorded(|r| r.visited.push(name.to_string()));
    }

    fn resolve(&self, url: &str) -> Option<Route> {
        self.routes
            .iter()
            .filter(|r| url.contains(&r.pattern))
            .max_by_key(|r| r.pattern.len())
            .cloned()
    }

    fn matches(&self, locator: &Locator) -> &[FakeElement] {
        self.state_ref()
            .elements
            .get(&locator.selector())
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }
}

impl Default for FakePage {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PageDriver for FakePage {
    async fn goto(&mut self, url: &str, timeout: Duration) -> E2eResult<NavigationResponse> {
        if self.hang_navigation {
            tokio::time::sleep(timeout).await;
            return Err(E2eError::NavigationTimeout {
                url: url.to_string(),
                timeout_ms: timeout.as_millis() as u64,
            });
        }

        match self.resolve(url) {
            Some(route) => {
                self.enter(&route.state);
                Ok(NavigationResponse {
                    url: url.to_string(),
                    status: Some(route.status),
                })
            }
            None => {
                self.enter(BLANK);
                Ok(NavigationResponse {
                    url: url.to_string(),
                    status: Some(404),
                })
            }
        }
    }

    async fn reload(&mut self, timeout: Duration) -> E2eResult<NavigationResponse> {
        let url = self.state_ref().url.clone();
        self.goto(&url, timeout).await
    }

    async fn wait_for_load_state(&mut self, _state: LoadState, _timeout: Duration) -> E2eResult<()> {
        Ok(())
    }

    async fn url(&mut self) -> E2eResult<String> {
        Ok(self.state_ref().url.clone())
    }

    async fn title(&mut self) -> E2eResult<String> {
        Ok(self.state_ref().title.clone())
    }

    async fn body_text(&mut self) -> E2eResult<String> {
        self.with_recorded(|r| r.body_reads += 1);
        if let Some(message) = self.body_failures.pop_front() {
            return Err(E2eError::StaleElement(message));
        }
        Ok(self.state_ref().body_text.clone())
    }

    async fn content(&mut self) -> E2eResult<String> {
        let state = self.state_ref();
        if state.html.is_empty() {
            Ok(format!("<html><body><div id=\"root\">{}</div></body></html>", state.body_text))
        } else {
            Ok(state.html.clone())
        }
    }

    async fn count(&mut self, locator: &Locator) -> E2eResult<usize> {
        Ok(self.matches(locator).len())
    }

    async fn is_visible(&mut self, locator: &Locator, index: usize) -> E2eResult<bool> {
        Ok(self.matches(locator).get(index).map_or(false, |e| e.visible))
    }

    async fn texts(&mut self, locator: &Locator) -> E2eResult<Vec<String>> {
        Ok(self.matches(locator).iter().map(|e| e.text.clone()).collect())
    }

    async fn click(&mut self, locator: &Locator, options: ClickOptions) -> E2eResult<()> {
        let selector = locator.selector();
        let current = self.current.clone();

        let element = self
            .states
            .get_mut(&current)
            .and_then(|s| s.elements.get_mut(&selector))
            .and_then(|els| els.get_mut(options.index))
            .ok_or_else(|| E2eError::ElementNotFound(selector.clone()))?;

        if element.stale_clicks > 0 {
            element.stale_clicks -= 1;
            return Err(E2eError::StaleElement(selector));
        }
        if !options.force && (!element.visible || !element.interactable) {
            return Err(E2eError::NotInteractable(selector));
        }
        let next = element.goes_to.clone();

        self.with_recorded(|r| {
            r.clicks.push(ClickRecord {
                selector,
                index: options.index,
                force: options.force,
            })
        });

        if let Some(next) = next {
            self.enter(&next);
        }
        Ok(())
    }

    async fn screenshot(&mut self, path: &Path, _full_page: bool) -> E2eResult<()> {
        let mut data = b"\x89PNG\r\n\x1a\n".to_vec();
        data.extend_from_slice(self.current.as_bytes());
        std::fs::write(path, data)?;
        self.with_recorded(|r| r.screenshots.push(path.to_path_buf()));
        Ok(())
    }

    async fn evaluate(&mut self, expression: &str) -> E2eResult<Value> {
        Ok(self.state_ref().eval.get(expression).cloned().unwrap_or(Value::Null))
    }

    fn drain_events(&mut self) -> Vec<PageEvent> {
        std::mem::take(&mut self.pending)
    }

    async fn close(&mut self) -> E2eResult<()> {
        self.with_recorded(|r| r.closed = true);
        Ok(())
    }
}

/// Hands out clones of one fake page
#[derive(Debug, Clone)]
pub struct FakeLauncher {
    page: FakePage,
}

impl FakeLauncher {
    pub fn new(page: FakePage) -> Self {
        Self { page }
    }
}

#[async_trait]
impl DriverFactory for FakeLauncher {
    async fn launch(&self) -> E2eResult<Box<dyn PageDriver>> {
        Ok(Box::new(self.page.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_routes_and_clicks() {
        let start = Locator::button("▶️");
        let mut page = FakePage::new()
            .state(
                "menu",
                FakeState::new("http://game.test/games-number-racing.html")
                    .body("Гонка чисел")
                    .element(&start, FakeElement::new("▶️ Старт").goes_to("race")),
            )
            .state("race", FakeState::new("http://game.test/games-number-racing.html").body("2 + 1"))
            .route("games-number-racing.html", "menu");

        let nav = page
            .goto("http://game.test/games-number-racing.html", Duration::from_secs(1))
            .await
            .unwrap();
        assert_eq!(nav.status, Some(200));
        assert_eq!(page.body_text().await.unwrap(), "Гонка чисел");

        page.click(&start, ClickOptions::default()).await.unwrap();
        assert_eq!(page.current_state(), "race");
        assert_eq!(page.recorder().lock().unwrap().clicks.len(), 1);
    }

    #[tokio::test]
    async fn test_unknown_route_is_404() {
        let mut page = FakePage::new();
        let nav = page.goto("http://game.test/missing", Duration::from_secs(1)).await.unwrap();
        assert_eq!(nav.status, Some(404));
    }

    #[tokio::test]
    async fn test_events_raised_on_enter() {
        let mut page = FakePage::new()
            .state("crash", FakeState::new("http://game.test/").event(Channel::PageError, "boom"))
            .route("", "crash");
        page.goto("http://game.test/", Duration::from_secs(1)).await.unwrap();

        let events = page.drain_events();
        assert_eq!(events, vec![PageEvent::new(Channel::PageError, "boom")]);
        assert!(page.drain_events().is_empty());
    }
}
