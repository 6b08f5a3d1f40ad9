//! Browser session: one page, its observation log and its evidence

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::future::Future;
use std::path::PathBuf;
use std::pin::Pin;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, info, warn};

use crate::api::{ApiConfig, GameApi, ProfileId};
use crate::checks::Checklist;
use crate::condition::Condition;
use crate::dispatch;
use crate::driver::{ClickOptions, LoadState, NavigationResponse, PageDriver};
use crate::error::{E2eError, E2eResult};
use crate::evidence::{Artifact, EvidenceCollector, DEFAULT_LOG_TAIL};
use crate::game::{GamePage, DEFAULT_PROFILE_ID};
use crate::locator::Locator;
use crate::observe::{Channel, Observation, ObservationLog, DEFAULT_LOG_CAPACITY};
use crate::poll::{PollOutcome, Poller, DEFAULT_MAX_ATTEMPTS, DEFAULT_POLL_DELAY_MS};

/// Visible text shorter than this reads as a white screen
pub const DEFAULT_WHITE_SCREEN_MIN_CHARS: usize = 100;

/// Lifecycle of one scenario run. Linear; a session never goes back.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Phase {
    NotStarted,
    Navigating,
    Polling,
    Done,
    TimedOut,
    Errored,
}

impl Phase {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Phase::Done | Phase::TimedOut | Phase::Errored)
    }
}

/// Configuration shared by every session of a run
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Base URL the game is deployed at
    pub base_url: String,

    /// Profile passed to game pages as `?profile=<id>`
    pub profile: Option<ProfileId>,

    pub navigation_timeout_ms: u64,

    pub white_screen_min_chars: usize,

    /// Observations kept per session
    pub log_capacity: usize,

    /// Observations reported at teardown
    pub log_tail: usize,

    /// Directory for screenshots
    pub evidence_dir: PathBuf,

    /// Capture the whole scrollable page rather than the viewport
    pub full_page_screenshots: bool,

    pub poll_attempts: u32,
    pub poll_delay_ms: u64,

    /// Game API the scenarios cross-check against, set from the harness
    /// configuration's `api` section
    #[serde(skip)]
    pub api: ApiConfig,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            base_url: "http://83.222.23.107:8081/".to_string(),
            profile: Some(ProfileId::Number(DEFAULT_PROFILE_ID)),
            navigation_timeout_ms: 30_000,
            white_screen_min_chars: DEFAULT_WHITE_SCREEN_MIN_CHARS,
            log_capacity: DEFAULT_LOG_CAPACITY,
            log_tail: DEFAULT_LOG_TAIL,
            evidence_dir: PathBuf::from("test-results/screenshots"),
            full_page_screenshots: true,
            poll_attempts: DEFAULT_MAX_ATTEMPTS,
            poll_delay_ms: DEFAULT_POLL_DELAY_MS,
            api: ApiConfig::default(),
        }
    }
}

impl SessionConfig {
    /// Resolve a page path against the base URL; absolute URLs pass through
    pub fn resolve_url(&self, target: &str) -> E2eResult<String> {
        let base = reqwest::Url::parse(&self.base_url)
            .map_err(|e| E2eError::Config(format!("invalid base url '{}': {}", self.base_url, e)))?;
        let url = base
            .join(target)
            .map_err(|e| E2eError::Config(format!("invalid target '{}': {}", target, e)))?;
        Ok(url.to_string())
    }

    pub fn navigation_timeout(&self) -> Duration {
        Duration::from_millis(self.navigation_timeout_ms)
    }

    pub fn poller(&self) -> Poller {
        Poller::new(self.poll_attempts, Duration::from_millis(self.poll_delay_ms))
    }

    /// Client for the game API; the page base URL stands in when no API
    /// base is configured
    pub fn game_api(&self) -> E2eResult<GameApi> {
        GameApi::from_config(&self.api, &self.base_url)
    }
}

/// What a closed session leaves behind
#[derive(Debug, Clone)]
pub struct SessionOutput {
    pub checks: Checklist,
    pub artifacts: Vec<Artifact>,
    pub log: ObservationLog,
    pub tail: Vec<Observation>,
}

/// Explicit context object for one scenario run.
///
/// Owns the page driver exclusively. Every driver call is followed by moving
/// the page's pending console and error events into the observation log.
pub struct Session {
    driver: Box<dyn PageDriver>,
    config: SessionConfig,
    log: ObservationLog,
    evidence: EvidenceCollector,
    checks: Checklist,
    phase: Phase,
    closed: bool,
}

impl Session {
    pub fn new(driver: Box<dyn PageDriver>, config: SessionConfig) -> Self {
        let mut evidence = EvidenceCollector::new(&config.evidence_dir);
        if !config.full_page_screenshots {
            evidence = evidence.viewport_only();
        }
        Self {
            log: ObservationLog::new(config.log_capacity),
            evidence,
            driver,
            config,
            checks: Checklist::default(),
            phase: Phase::NotStarted,
            closed: false,
        }
    }

    /// Create a session and navigate to `target`
    pub async fn bootstrap(driver: Box<dyn PageDriver>, config: SessionConfig, target: &str) -> E2eResult<Self> {
        let mut session = Self::new(driver, config);
        session.open(target).await?;
        Ok(session)
    }

    /// First navigation: moves the session from navigating to polling
    pub async fn open(&mut self, target: &str) -> E2eResult<NavigationResponse> {
        self.phase = Phase::Navigating;
        let response = self.goto(target).await?;
        self.phase = Phase::Polling;
        Ok(response)
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub(crate) fn finish(&mut self, phase: Phase) {
        self.phase = phase;
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn log(&self) -> &ObservationLog {
        &self.log
    }

    pub fn checks(&mut self) -> &mut Checklist {
        &mut self.checks
    }

    pub fn poller(&self) -> Poller {
        self.config.poller()
    }

    pub fn artifacts(&self) -> &[Artifact] {
        self.evidence.artifacts()
    }

    fn pump(&mut self) {
        for event in self.driver.drain_events() {
            self.log.push(event.channel, event.message);
        }
    }

    /// Open a game page, with the configured profile when `with_profile`
    pub async fn open_page(&mut self, page: GamePage, with_profile: bool) -> E2eResult<NavigationResponse> {
        let profile = if with_profile { self.config.profile.clone() } else { None };
        self.goto(&page.url(profile.as_ref())).await
    }

    pub async fn goto(&mut self, target: &str) -> E2eResult<NavigationResponse> {
        let url = self.config.resolve_url(target)?;
        info!(%url, "navigating");

        let result = self.driver.goto(&url, self.config.navigation_timeout()).await;
        self.pump();
        let response = result?;

        if !response.is_success() {
            return Err(E2eError::NavigationStatus {
                url,
                status: response.status.unwrap_or_default(),
            });
        }
        Ok(response)
    }

    /// Navigate without treating an error status as fatal
    pub async fn fetch(&mut self, target: &str) -> E2eResult<NavigationResponse> {
        let url = self.config.resolve_url(target)?;
        let result = self.driver.goto(&url, self.config.navigation_timeout()).await;
        self.pump();
        result
    }

    pub async fn reload(&mut self) -> E2eResult<NavigationResponse> {
        let result = self.driver.reload(self.config.navigation_timeout()).await;
        self.pump();
        result
    }

    pub async fn wait_for_load_state(&mut self, state: LoadState) -> E2eResult<()> {
        let result = self
            .driver
            .wait_for_load_state(state, self.config.navigation_timeout())
            .await;
        self.pump();
        result
    }

    /// Fixed pause, e.g. to let React render or an animation finish
    pub async fn settle(&mut self, ms: u64) {
        sleep(Duration::from_millis(ms)).await;
        self.pump();
    }

    pub async fn url(&mut self) -> E2eResult<String> {
        let result = self.driver.url().await;
        self.pump();
        result
    }

    pub async fn title(&mut self) -> E2eResult<String> {
        let result = self.driver.title().await;
        self.pump();
        result
    }

    pub async fn body_text(&mut self) -> E2eResult<String> {
        let result = self.driver.body_text().await;
        self.pump();
        result
    }

    pub async fn content(&mut self) -> E2eResult<String> {
        let result = self.driver.content().await;
        self.pump();
        result
    }

    pub async fn count(&mut self, locator: &Locator) -> E2eResult<usize> {
        let result = self.driver.count(locator).await;
        self.pump();
        result
    }

    pub async fn is_visible(&mut self, locator: &Locator) -> E2eResult<bool> {
        self.is_visible_nth(locator, 0).await
    }

    pub async fn is_visible_nth(&mut self, locator: &Locator, index: usize) -> E2eResult<bool> {
        let result = self.driver.is_visible(locator, index).await;
        self.pump();
        result
    }

    /// Poll visibility for up to `timeout_ms`, checking every 100 ms
    pub async fn is_visible_within(&mut self, locator: &Locator, timeout_ms: u64) -> E2eResult<bool> {
        let poller = Poller::new(visibility_attempts(timeout_ms), Duration::from_millis(100));
        let outcome = self.poll_until(&Condition::visible(locator.clone()), poller).await?;
        Ok(outcome.is_satisfied())
    }

    pub async fn texts(&mut self, locator: &Locator) -> E2eResult<Vec<String>> {
        let result = self.driver.texts(locator).await;
        self.pump();
        result
    }

    pub async fn click(&mut self, locator: &Locator) -> E2eResult<()> {
        self.click_with(locator, ClickOptions::default()).await
    }

    /// Click past animation overlays
    pub async fn force_click(&mut self, locator: &Locator) -> E2eResult<()> {
        self.click_with(locator, ClickOptions::forced()).await
    }

    pub async fn click_with(&mut self, locator: &Locator, options: ClickOptions) -> E2eResult<()> {
        debug!(%locator, force = options.force, index = options.index, "click");
        let result = dispatch::click(self.driver.as_mut(), locator, options).await;
        self.pump();
        result
    }

    pub async fn click_first_visible(&mut self, locator: &Locator) -> E2eResult<Option<usize>> {
        let result = dispatch::click_first_visible(self.driver.as_mut(), locator, false).await;
        self.pump();
        result
    }

    pub async fn evaluate(&mut self, expression: &str) -> E2eResult<Value> {
        let result = self.driver.evaluate(expression).await;
        self.pump();
        result
    }

    /// Read a local-storage key; JSON values come back parsed
    pub async fn read_local_storage(&mut self, key: &str) -> E2eResult<Option<Value>> {
        let expression = format!("localStorage.getItem({})", serde_json::to_string(key)?);
        match self.evaluate(&expression).await? {
            Value::Null => Ok(None),
            Value::String(raw) => Ok(Some(serde_json::from_str(&raw).unwrap_or(Value::String(raw)))),
            other => Ok(Some(other)),
        }
    }

    pub async fn screenshot(&mut self, name: &str) -> E2eResult<PathBuf> {
        let result = self.evidence.capture(self.driver.as_mut(), name).await;
        self.pump();
        result
    }

    pub async fn screenshot_with(&mut self, name: &str, full_page: bool) -> E2eResult<PathBuf> {
        let result = self.evidence.capture_as(self.driver.as_mut(), name, full_page).await;
        self.pump();
        result
    }

    /// Length of the trimmed visible body text
    pub async fn visible_text_len(&mut self) -> E2eResult<usize> {
        Ok(self.body_text().await?.trim().chars().count())
    }

    /// Fail with [`E2eError::WhiteScreenDetected`] when the page shows fewer
    /// than `min_chars` characters; a screenshot named `label` is taken first.
    pub async fn ensure_not_white_screen(&mut self, label: &str, min_chars: usize) -> E2eResult<usize> {
        let chars = self.visible_text_len().await?;
        if chars >= min_chars {
            debug!(chars, min_chars, "page has content");
            return Ok(chars);
        }

        warn!(chars, min_chars, "WHITE SCREEN detected at {}", label);
        let screenshot = match self.screenshot(label).await {
            Ok(path) => Some(path),
            Err(e) => {
                warn!("could not capture white screen: {}", e);
                None
            }
        };
        Err(E2eError::WhiteScreenDetected {
            chars,
            threshold: min_chars,
            screenshot,
        })
    }

    /// White-screen check with the configured threshold
    pub async fn expect_content(&mut self, label: &str) -> E2eResult<usize> {
        let min = self.config.white_screen_min_chars;
        self.ensure_not_white_screen(label, min).await
    }

    /// Evaluate a condition against the page once
    pub fn holds<'a>(&'a mut self, condition: &'a Condition) -> Pin<Box<dyn Future<Output = E2eResult<bool>> + Send + 'a>> {
        Box::pin(async move {
            match condition {
                Condition::TextContains(s) => Ok(self.body_text().await?.contains(s.as_str())),
                Condition::HtmlContains(s) => Ok(self.content().await?.contains(s.as_str())),
                Condition::Visible(locator) => self.is_visible(locator).await,
                Condition::CountAtLeast { locator, count } => Ok(self.count(locator).await? >= *count),
                Condition::UrlContains(s) => Ok(self.url().await?.contains(s.as_str())),
                Condition::Not(inner) => Ok(!self.holds(inner).await?),
                Condition::Any(items) => {
                    for item in items {
                        if self.holds(item).await? {
                            return Ok(true);
                        }
                    }
                    Ok(false)
                }
                Condition::All(items) => {
                    for item in items {
                        if !self.holds(item).await? {
                            return Ok(false);
                        }
                    }
                    Ok(true)
                }
            }
        })
    }

    /// Sample `condition` until it holds or the poller's budget is spent
    pub async fn poll_until(&mut self, condition: &Condition, poller: Poller) -> E2eResult<PollOutcome<()>> {
        let what = condition.to_string();
        let mut attempts = poller.attempts();

        while let Some(attempt) = attempts.next().await {
            let sample = self.holds(condition).await.map(|met| met.then_some(()));
            if attempts.absorb(&what, sample)?.is_some() {
                return Ok(PollOutcome::Satisfied { value: (), attempts: attempt });
            }
            self.pump();
        }

        Ok(PollOutcome::TimedOut {
            attempts: attempts.taken(),
        })
    }

    /// Page errors seen so far
    pub fn page_errors(&self) -> Vec<&Observation> {
        self.log.on_channel(Channel::PageError)
    }

    /// Escalate the first uncaught page exception, if any
    pub fn check_page_errors(&self) -> E2eResult<()> {
        match self.page_errors().first() {
            Some(first) => Err(E2eError::UnhandledPageError(first.message.clone())),
            None => Ok(()),
        }
    }

    /// Close the browser; safe to call more than once
    pub async fn close(&mut self) -> E2eResult<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        let result = self.driver.close().await;
        self.pump();
        if let Err(e) = self.evidence.write_manifest() {
            warn!("could not write artifact manifest: {}", e);
        }
        result
    }

    /// Close and hand back what the run collected
    pub async fn finish_output(mut self) -> (SessionOutput, E2eResult<()>) {
        let closed = self.close().await;
        let tail = self.evidence.report_tail(&self.log, self.config.log_tail);
        let output = SessionOutput {
            checks: self.checks,
            artifacts: self.evidence.artifacts().to_vec(),
            log: self.log,
            tail,
        };
        (output, closed)
    }
}

fn visibility_attempts(timeout_ms: u64) -> u32 {
    u32::try_from(timeout_ms / 100).unwrap_or(u32::MAX).max(1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fake::{FakeElement, FakePage, FakeState};
    use serde_json::json;
    use tokio::time::Instant;

    fn config(dir: &std::path::Path) -> SessionConfig {
        SessionConfig {
            base_url: "http://game.test/".into(),
            evidence_dir: dir.to_path_buf(),
            ..Default::default()
        }
    }

    #[test]
    fn test_resolve_url() {
        let config = SessionConfig {
            base_url: "http://game.test/".into(),
            ..Default::default()
        };
        assert_eq!(
            config.resolve_url("games-number-racing.html?profile=1").unwrap(),
            "http://game.test/games-number-racing.html?profile=1"
        );
        assert_eq!(
            config.resolve_url("https://other.test/api/health").unwrap(),
            "https://other.test/api/health"
        );
    }

    #[tokio::test]
    async fn test_bootstrap_moves_to_polling() {
        let tmp = tempfile::tempdir().unwrap();
        let session = Session::bootstrap(Box::new(FakePage::single("menu")), config(tmp.path()), "/")
            .await
            .unwrap();
        assert_eq!(session.phase(), Phase::Polling);
    }

    #[tokio::test]
    async fn test_bootstrap_rejects_error_status() {
        let tmp = tempfile::tempdir().unwrap();
        let page = FakePage::new()
            .state("down", FakeState::new("http://game.test/"))
            .route_status("", 502, "down");

        let err = Session::bootstrap(Box::new(page), config(tmp.path()), "/")
            .await
            .err()
            .unwrap();
        assert!(matches!(err, E2eError::NavigationStatus { status: 502, .. }));
    }

    #[tokio::test(start_paused = true)]
    async fn test_bootstrap_times_out() {
        let tmp = tempfile::tempdir().unwrap();
        let cfg = SessionConfig {
            navigation_timeout_ms: 3000,
            ..config(tmp.path())
        };
        let start = Instant::now();

        let err = Session::bootstrap(Box::new(FakePage::single("x").hanging()), cfg, "/")
            .await
            .err()
            .unwrap();

        assert!(matches!(err, E2eError::NavigationTimeout { timeout_ms: 3000, .. }));
        assert_eq!(start.elapsed(), Duration::from_millis(3000));
    }

    #[tokio::test(start_paused = true)]
    async fn test_poll_text_times_out_after_exact_attempts() {
        let tmp = tempfile::tempdir().unwrap();
        let page = FakePage::single("Гонка чисел: меню");
        let recorder = page.recorder();
        let mut session = Session::bootstrap(Box::new(page), config(tmp.path()), "/").await.unwrap();

        let start = Instant::now();
        let outcome = session
            .poll_until(&Condition::text("ПОБЕДА"), Poller::new(5, Duration::from_millis(250)))
            .await
            .unwrap();

        assert_eq!(outcome, PollOutcome::TimedOut { attempts: 5 });
        assert_eq!(recorder.lock().unwrap().body_reads, 5);
        assert_eq!(start.elapsed(), Duration::from_millis(4 * 250));
    }

    #[tokio::test(start_paused = true)]
    async fn test_poll_absorbs_detached_read() {
        let tmp = tempfile::tempdir().unwrap();
        let page = FakePage::single("ПОБЕДА 🏆").fail_body_read("body detached");
        let mut session = Session::bootstrap(Box::new(page), config(tmp.path()), "/").await.unwrap();

        let outcome = session
            .poll_until(&Condition::text("ПОБЕДА"), Poller::new(3, Duration::from_millis(10)))
            .await
            .unwrap();
        assert_eq!(outcome.attempts(), 2);
    }

    #[tokio::test]
    async fn test_white_screen_after_click_captures_screenshot() {
        let tmp = tempfile::tempdir().unwrap();
        let answer = Locator::css(".grid.grid-cols-3 button");
        let page = FakePage::new()
            .state(
                "race",
                FakeState::new("http://game.test/games-number-racing.html")
                    .body("Сколько машинок? 1 2 3")
                    .element(&answer, FakeElement::new("3").goes_to("crash")),
            )
            .state("crash", FakeState::new("http://game.test/games-number-racing.html").body(""))
            .route("", "race");
        let recorder = page.recorder();
        let mut session = Session::bootstrap(Box::new(page), config(tmp.path()), "/").await.unwrap();

        session.force_click(&answer).await.unwrap();
        let err = session.ensure_not_white_screen("after_answer", 10).await.unwrap_err();

        match err {
            E2eError::WhiteScreenDetected { chars, screenshot, .. } => {
                assert_eq!(chars, 0);
                let path = screenshot.unwrap();
                assert!(path.exists());
                assert_eq!(recorder.lock().unwrap().screenshots, vec![path]);
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_events_reach_log_and_page_errors_escalate() {
        let tmp = tempfile::tempdir().unwrap();
        let page = FakePage::new()
            .state(
                "menu",
                FakeState::new("http://game.test/")
                    .event(Channel::ConsoleLog, "profile loaded")
                    .event(Channel::PageError, "TypeError: task is null"),
            )
            .route("", "menu");
        let mut session = Session::bootstrap(Box::new(page), config(tmp.path()), "/").await.unwrap();

        assert_eq!(session.log().len(), 2);
        assert!(matches!(
            session.check_page_errors(),
            Err(E2eError::UnhandledPageError(msg)) if msg.contains("TypeError")
        ));

        session.close().await.unwrap();
        session.close().await.unwrap();
    }

    #[tokio::test]
    async fn test_read_local_storage_parses_json() {
        let tmp = tempfile::tempdir().unwrap();
        let raw = json!({ "progress": 33.3, "stars": 2 }).to_string();
        let page = FakePage::new()
            .state(
                "race",
                FakeState::new("http://game.test/").eval("localStorage.getItem(\"raceInProgress\")", json!(raw)),
            )
            .route("", "race");
        let mut session = Session::bootstrap(Box::new(page), config(tmp.path()), "/").await.unwrap();

        let saved = session.read_local_storage("raceInProgress").await.unwrap().unwrap();
        assert_eq!(saved["stars"], 2);
        assert!(session.read_local_storage("missing").await.unwrap().is_none());
    }

    #[test]
    fn test_visibility_attempts_saturate() {
        assert_eq!(visibility_attempts(0), 1);
        assert_eq!(visibility_attempts(2000), 20);
        assert_eq!(visibility_attempts(u64::from(u32::MAX) * 100 + 100), u32::MAX);
        assert_eq!(visibility_attempts(u64::MAX), u32::MAX);
    }

    #[tokio::test(start_paused = true)]
    async fn test_visible_within_huge_timeout_still_finds_element() {
        let tmp = tempfile::tempdir().unwrap();
        let grid = crate::game::answer_buttons();
        let page = FakePage::new()
            .state(
                "race",
                FakeState::new("http://game.test/").element(&grid, FakeElement::new("3")),
            )
            .route("", "race");
        let mut session = Session::bootstrap(Box::new(page), config(tmp.path()), "/").await.unwrap();

        assert!(session.is_visible_within(&grid, u64::MAX).await.unwrap());
    }
}
