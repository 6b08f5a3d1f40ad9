//! Playwright browser automation over a long-lived Node.js bridge
//!
//! The bridge is a small script written to a temp directory and run with
//! `node`. It owns one browser, one context and one page, reads one JSON
//! command per line on stdin and answers on stdout. Console messages, page
//! errors and failed requests are written to stdout as event lines between
//! replies.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::str::FromStr;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Lines};
use tokio::process::{Child, ChildStdin, ChildStdout, Command};
use tokio::time::timeout;
use tracing::{debug, info, warn};

use crate::driver::{ClickOptions, DriverFactory, LoadState, NavigationResponse, PageDriver, PageEvent};
use crate::error::{E2eError, E2eResult};
use crate::locator::Locator;
use crate::observe::Channel;

const BRIDGE_SCRIPT: &str = r##"
const readline = require('readline');
const pw = require('playwright');

const config = JSON.parse(process.env.RACING_BRIDGE_CONFIG || '{}');

function emit(obj) {
  process.stdout.write(JSON.stringify(obj) + '\n');
}

function classify(err) {
  const msg = String((err && err.message) || err);
  let kind = 'other';
  if (/not attached|detached/i.test(msg)) {
    kind = 'stale';
  } else if (/not visible|not enabled|intercepts pointer events|not stable|outside of the viewport/i.test(msg)) {
    kind = 'not_interactable';
  } else if ((err && err.name === 'TimeoutError') || /Timeout \d+ms exceeded/.test(msg)) {
    kind = 'timeout';
  }
  return { kind, message: msg.split('\n')[0] };
}

(async () => {
  const browserType = pw[config.browser || 'chromium'];
  const browser = await browserType.launch({
    headless: config.headless !== false,
    slowMo: config.slow_mo_ms || 0,
  });
  const context = await browser.newContext({
    viewport: { width: config.viewport_width || 1280, height: config.viewport_height || 720 },
  });
  const page = await context.newPage();

  page.on('console', (msg) => emit({ event: 'console', type: msg.type(), text: msg.text() }));
  page.on('pageerror', (err) => emit({ event: 'pageerror', message: String(err) }));
  page.on('requestfailed', (req) =>
    emit({ event: 'requestfailed', url: req.url(), failure: (req.failure() || {}).errorText || 'unknown' })
  );

  const nav = (r) => ({ url: page.url(), status: r ? r.status() : null });

  const ops = {
    goto: async (c) => nav(await page.goto(c.url, { timeout: c.timeout_ms })),
    reload: async (c) => nav(await page.reload({ timeout: c.timeout_ms })),
    wait_for_load_state: async (c) => {
      await page.waitForLoadState(c.state, { timeout: c.timeout_ms });
      return null;
    },
    url: async () => page.url(),
    title: async () => page.title(),
    body_text: async () => (await page.locator('body').textContent()) || '',
    content: async () => page.content(),
    count: async (c) => page.locator(c.selector).count(),
    is_visible: async (c) => page.locator(c.selector).nth(c.index).isVisible(),
    texts: async (c) => page.locator(c.selector).allTextContents(),
    click: async (c) => {
      const loc = page.locator(c.selector);
      if ((await loc.count()) <= c.index) {
        const e = new Error('no element matches ' + c.selector);
        e.kind = 'not_found';
        throw e;
      }
      await loc.nth(c.index).click({ force: c.force, timeout: c.timeout_ms });
      return null;
    },
    screenshot: async (c) => {
      await page.screenshot({ path: c.path, fullPage: c.full_page });
      return null;
    },
    evaluate: async (c) => {
      const v = await page.evaluate(c.expression);
      return v === undefined ? null : v;
    },
    close: async () => {
      await browser.close();
      return null;
    },
  };

  emit({ event: 'ready' });

  const rl = readline.createInterface({ input: process.stdin });
  for await (const line of rl) {
    if (!line.trim()) continue;
    let cmd;
    try {
      cmd = JSON.parse(line);
    } catch (e) {
      emit({ id: null, ok: false, error: { kind: 'other', message: 'bad command: ' + e.message } });
      continue;
    }
    const op = ops[cmd.op];
    if (!op) {
      emit({ id: cmd.id, ok: false, error: { kind: 'other', message: 'unknown op ' + cmd.op } });
      continue;
    }
    try {
      const result = await op(cmd);
      emit({ id: cmd.id, ok: true, result: result === undefined ? null : result });
    } catch (e) {
      emit({ id: cmd.id, ok: false, error: e.kind ? { kind: e.kind, message: e.message } : classify(e) });
    }
    if (cmd.op === 'close') break;
  }
  process.exit(0);
})().catch((e) => {
  emit({ event: 'fatal', message: String((e && e.stack) || e) });
  process.exit(1);
});
"##;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Browser {
    #[default]
    Chromium,
    Firefox,
    Webkit,
}

impl Browser {
    fn as_str(&self) -> &'static str {
        match self {
            Browser::Chromium => "chromium",
            Browser::Firefox => "firefox",
            Browser::Webkit => "webkit",
        }
    }
}

impl FromStr for Browser {
    type Err = E2eError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "chromium" | "chrome" => Ok(Browser::Chromium),
            "firefox" => Ok(Browser::Firefox),
            "webkit" => Ok(Browser::Webkit),
            other => Err(E2eError::Config(format!("unknown browser: {}", other))),
        }
    }
}

/// Configuration for the Playwright bridge
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PlaywrightConfig {
    pub browser: Browser,
    pub headless: bool,

    /// Delay Playwright inserts before every action
    pub slow_mo_ms: u64,

    pub viewport_width: u32,
    pub viewport_height: u32,

    /// `node` executable
    pub node_binary: PathBuf,

    /// Directory holding the `playwright` package, exported as NODE_PATH
    pub node_modules: Option<PathBuf>,

    pub launch_timeout_ms: u64,

    /// Upper bound for one bridge round trip (navigation adds its own timeout)
    pub command_timeout_ms: u64,

    /// Playwright's own wait for a clickable element
    pub action_timeout_ms: u64,
}

impl Default for PlaywrightConfig {
    fn default() -> Self {
        Self {
            browser: Browser::Chromium,
            headless: true,
            slow_mo_ms: 0,
            viewport_width: 1280,
            viewport_height: 720,
            node_binary: PathBuf::from("node"),
            node_modules: None,
            launch_timeout_ms: 30_000,
            command_timeout_ms: 15_000,
            action_timeout_ms: 5_000,
        }
    }
}

impl PlaywrightConfig {
    fn node_path(&self) -> Option<PathBuf> {
        self.node_modules.clone().or_else(|| {
            let local = PathBuf::from("node_modules");
            local.is_dir().then(|| local.canonicalize().unwrap_or(local))
        })
    }

    fn bridge_env(&self) -> Value {
        json!({
            "browser": self.browser.as_str(),
            "headless": self.headless,
            "slow_mo_ms": self.slow_mo_ms,
            "viewport_width": self.viewport_width,
            "viewport_height": self.viewport_height,
        })
    }
}

#[derive(Debug, Deserialize)]
struct BridgeError {
    kind: String,
    message: String,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "event", rename_all = "lowercase")]
enum BridgeEvent {
    Ready,
    Console {
        #[serde(rename = "type")]
        kind: String,
        text: String,
    },
    Pageerror {
        message: String,
    },
    Requestfailed {
        url: String,
        failure: String,
    },
    Fatal {
        message: String,
    },
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum BridgeMessage {
    Reply {
        id: Option<u64>,
        ok: bool,
        #[serde(default)]
        result: Value,
        error: Option<BridgeError>,
    },
    Event(BridgeEvent),
}

/// Launches one bridge process per scenario
#[derive(Debug, Clone, Default)]
pub struct PlaywrightLauncher {
    config: PlaywrightConfig,
}

impl PlaywrightLauncher {
    pub fn new(config: PlaywrightConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl DriverFactory for PlaywrightLauncher {
    async fn launch(&self) -> E2eResult<Box<dyn PageDriver>> {
        let driver = PlaywrightDriver::launch(self.config.clone()).await?;
        Ok(Box::new(driver))
    }
}

/// Playwright page handle backed by a Node.js bridge process
pub struct PlaywrightDriver {
    child: Child,
    stdin: ChildStdin,
    lines: Lines<BufReader<ChildStdout>>,
    next_id: u64,
    events: Vec<PageEvent>,
    command_timeout: Duration,
    action_timeout: Duration,
    closed: bool,
    _workdir: tempfile::TempDir,
}

impl PlaywrightDriver {
    /// Start the bridge and wait until the page is ready
    pub async fn launch(config: PlaywrightConfig) -> E2eResult<Self> {
        let node_path = config.node_path();
        Self::check_playwright_installed(&config.node_binary, node_path.as_deref()).await?;

        let workdir = tempfile::tempdir()?;
        let script_path = workdir.path().join("bridge.js");
        std::fs::write(&script_path, BRIDGE_SCRIPT)?;

        info!(browser = config.browser.as_str(), headless = config.headless, "launching Playwright bridge");

        let mut cmd = Command::new(&config.node_binary);
        cmd.arg(&script_path)
            .env("RACING_BRIDGE_CONFIG", config.bridge_env().to_string())
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .kill_on_drop(true);
        if let Some(path) = &node_path {
            cmd.env("NODE_PATH", path);
        }

        let mut child = cmd
            .spawn()
            .map_err(|e| E2eError::Playwright(format!("failed to spawn {}: {}", config.node_binary.display(), e)))?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| E2eError::Playwright("bridge stdin unavailable".into()))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| E2eError::Playwright("bridge stdout unavailable".into()))?;

        let mut driver = Self {
            child,
            stdin,
            lines: BufReader::new(stdout).lines(),
            next_id: 1,
            events: Vec::new(),
            command_timeout: Duration::from_millis(config.command_timeout_ms),
            action_timeout: Duration::from_millis(config.action_timeout_ms),
            closed: false,
            _workdir: workdir,
        };

        timeout(Duration::from_millis(config.launch_timeout_ms), driver.wait_ready())
            .await
            .map_err(|_| E2eError::Playwright("browser did not start in time".into()))??;

        debug!(pid = ?driver.child.id(), "bridge ready");
        Ok(driver)
    }

    async fn check_playwright_installed(node: &Path, node_path: Option<&Path>) -> E2eResult<()> {
        let mut cmd = Command::new(node);
        cmd.args(["-e", "require.resolve('playwright')"])
            .stdout(Stdio::null())
            .stderr(Stdio::null());
        if let Some(path) = node_path {
            cmd.env("NODE_PATH", path);
        }

        match cmd.status().await {
            Ok(status) if status.success() => Ok(()),
            _ => Err(E2eError::PlaywrightNotFound),
        }
    }

    async fn wait_ready(&mut self) -> E2eResult<()> {
        loop {
            match self.read_message().await? {
                BridgeMessage::Event(BridgeEvent::Ready) => return Ok(()),
                BridgeMessage::Event(event) => self.record(event)?,
                BridgeMessage::Reply { .. } => {
                    warn!("bridge replied before it was ready");
                }
            }
        }
    }

    async fn read_message(&mut self) -> E2eResult<BridgeMessage> {
        loop {
            let line = self.lines.next_line().await?.ok_or(E2eError::BridgeClosed)?;
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<BridgeMessage>(&line) {
                Ok(msg) => return Ok(msg),
                Err(_) => debug!(%line, "ignoring non-protocol bridge output"),
            }
        }
    }

    fn record(&mut self, event: BridgeEvent) -> E2eResult<()> {
        let event = match event {
            BridgeEvent::Ready => return Ok(()),
            BridgeEvent::Console { kind, text } => PageEvent::new(Channel::from_console_type(&kind), text),
            BridgeEvent::Pageerror { message } => PageEvent::new(Channel::PageError, message),
            BridgeEvent::Requestfailed { url, failure } => {
                PageEvent::new(Channel::RequestFailed, format!("Failed: {} - {}", url, failure))
            }
            BridgeEvent::Fatal { message } => return Err(E2eError::Playwright(message)),
        };
        self.events.push(event);
        Ok(())
    }

    /// One round trip. The outer result is transport failure, the inner one
    /// is the operation's own failure as reported by Playwright.
    async fn call(&mut self, op: &str, payload: Value, extra: Duration) -> E2eResult<Result<Value, BridgeError>> {
        let wait = self.command_timeout + extra;
        self.call_within(op, payload, wait)
            .await?
            .ok_or_else(|| E2eError::Playwright(format!("no reply to '{}' within {:?}", op, wait)))
    }

    /// Like `call`, with `None` when no reply arrived within `wait`
    async fn call_within(
        &mut self,
        op: &str,
        mut payload: Value,
        wait: Duration,
    ) -> E2eResult<Option<Result<Value, BridgeError>>> {
        if self.closed {
            return Err(E2eError::BridgeClosed);
        }

        let id = self.next_id;
        self.next_id += 1;
        payload["id"] = json!(id);
        payload["op"] = json!(op);

        let mut line = serde_json::to_string(&payload)?;
        line.push('\n');
        self.stdin.write_all(line.as_bytes()).await?;
        self.stdin.flush().await?;

        timeout(wait, self.read_reply(id)).await.ok().transpose()
    }

    async fn read_reply(&mut self, id: u64) -> E2eResult<Result<Value, BridgeError>> {
        loop {
            match self.read_message().await? {
                BridgeMessage::Event(event) => self.record(event)?,
                BridgeMessage::Reply { id: Some(rid), ok, result, error } if rid == id => {
                    return Ok(if ok {
                        Ok(result)
                    } else {
                        Err(error.unwrap_or(BridgeError {
                            kind: "other".into(),
                            message: "unknown bridge failure".into(),
                        }))
                    });
                }
                BridgeMessage::Reply { id: rid, .. } => {
                    warn!(expected = id, got = ?rid, "discarding out-of-order bridge reply");
                }
            }
        }
    }

    async fn request(&mut self, op: &str, payload: Value) -> E2eResult<Value> {
        self.call(op, payload, Duration::ZERO)
            .await?
            .map_err(|e| map_bridge_error(e, op))
    }

    async fn navigate(&mut self, op: &str, url: &str, nav_timeout: Duration) -> E2eResult<NavigationResponse> {
        let payload = json!({ "url": url, "timeout_ms": nav_timeout.as_millis() as u64 });
        let reply = self.call_within(op, payload, self.command_timeout + nav_timeout).await?;
        navigation_outcome(op, url, nav_timeout, reply)
    }

    /// Stop the bridge, asking nicely first
    async fn shutdown(&mut self) {
        #[cfg(unix)]
        {
            use nix::sys::signal::{kill, Signal};
            use nix::unistd::Pid;

            if let Some(pid) = self.child.id() {
                let _ = kill(Pid::from_raw(pid as i32), Signal::SIGTERM);
                if timeout(Duration::from_millis(500), self.child.wait()).await.is_ok() {
                    return;
                }
            }
        }

        let _ = self.child.kill().await;
    }
}

/// A navigation that Playwright gave up on and one the bridge never answered
/// both surface as a navigation timeout.
fn navigation_outcome(
    op: &str,
    url: &str,
    nav_timeout: Duration,
    reply: Option<Result<Value, BridgeError>>,
) -> E2eResult<NavigationResponse> {
    let timed_out = || E2eError::NavigationTimeout {
        url: url.to_string(),
        timeout_ms: nav_timeout.as_millis() as u64,
    };
    match reply {
        None => Err(timed_out()),
        Some(Ok(value)) => Ok(serde_json::from_value(value)?),
        Some(Err(e)) if e.kind == "timeout" => Err(timed_out()),
        Some(Err(e)) => Err(E2eError::Driver(format!("{} {}: {}", op, url, e.message))),
    }
}

fn click_payload(locator: &Locator, options: &ClickOptions, action_timeout: Duration) -> Value {
    json!({
        "selector": locator.selector(),
        "index": options.index,
        "force": options.force,
        "timeout_ms": action_timeout.as_millis() as u64,
    })
}

fn map_bridge_error(err: BridgeError, context: &str) -> E2eError {
    match err.kind.as_str() {
        "stale" => E2eError::StaleElement(err.message),
        "not_found" => E2eError::ElementNotFound(err.message),
        "not_interactable" => E2eError::NotInteractable(err.message),
        _ => E2eError::Driver(format!("{}: {}", context, err.message)),
    }
}

#[async_trait]
impl PageDriver for PlaywrightDriver {
    async fn goto(&mut self, url: &str, timeout: Duration) -> E2eResult<NavigationResponse> {
        self.navigate("goto", url, timeout).await
    }

    async fn reload(&mut self, timeout: Duration) -> E2eResult<NavigationResponse> {
        let url = self.url().await?;
        self.navigate("reload", &url, timeout).await
    }

    async fn wait_for_load_state(&mut self, state: LoadState, timeout: Duration) -> E2eResult<()> {
        let payload = json!({ "state": state.as_str(), "timeout_ms": timeout.as_millis() as u64 });
        self.call("wait_for_load_state", payload, timeout)
            .await?
            .map_err(|e| map_bridge_error(e, "wait_for_load_state"))?;
        Ok(())
    }

    async fn url(&mut self) -> E2eResult<String> {
        Ok(serde_json::from_value(self.request("url", json!({})).await?)?)
    }

    async fn title(&mut self) -> E2eResult<String> {
        Ok(serde_json::from_value(self.request("title", json!({})).await?)?)
    }

    async fn body_text(&mut self) -> E2eResult<String> {
        Ok(serde_json::from_value(self.request("body_text", json!({})).await?)?)
    }

    async fn content(&mut self) -> E2eResult<String> {
        Ok(serde_json::from_value(self.request("content", json!({})).await?)?)
    }

    async fn count(&mut self, locator: &Locator) -> E2eResult<usize> {
        let value = self.request("count", json!({ "selector": locator.selector() })).await?;
        Ok(serde_json::from_value(value)?)
    }

    async fn is_visible(&mut self, locator: &Locator, index: usize) -> E2eResult<bool> {
        let payload = json!({ "selector": locator.selector(), "index": index });
        Ok(serde_json::from_value(self.request("is_visible", payload).await?)?)
    }

    async fn texts(&mut self, locator: &Locator) -> E2eResult<Vec<String>> {
        let value = self.request("texts", json!({ "selector": locator.selector() })).await?;
        Ok(serde_json::from_value(value)?)
    }

    async fn click(&mut self, locator: &Locator, options: ClickOptions) -> E2eResult<()> {
        let payload = click_payload(locator, &options, self.action_timeout);
        self.call("click", payload, self.action_timeout)
            .await?
            .map_err(|e| map_bridge_error(e, "click"))?;
        Ok(())
    }

    async fn screenshot(&mut self, path: &Path, full_page: bool) -> E2eResult<()> {
        let payload = json!({ "path": path.to_string_lossy(), "full_page": full_page });
        self.request("screenshot", payload).await?;
        Ok(())
    }

    async fn evaluate(&mut self, expression: &str) -> E2eResult<Value> {
        self.request("evaluate", json!({ "expression": expression })).await
    }

    fn drain_events(&mut self) -> Vec<PageEvent> {
        std::mem::take(&mut self.events)
    }

    async fn close(&mut self) -> E2eResult<()> {
        if self.closed {
            return Ok(());
        }

        let result = self.request("close", json!({})).await;
        self.closed = true;
        if let Err(e) = &result {
            warn!("browser close failed: {}", e);
        }

        if timeout(Duration::from_secs(2), self.child.wait()).await.is_err() {
            self.shutdown().await;
        }
        result.map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_reply_and_events() {
        let reply: BridgeMessage = serde_json::from_str(r#"{"id":3,"ok":true,"result":42}"#).unwrap();
        assert!(matches!(reply, BridgeMessage::Reply { id: Some(3), ok: true, .. }));

        let failure: BridgeMessage =
            serde_json::from_str(r#"{"id":4,"ok":false,"error":{"kind":"stale","message":"Element is not attached"}}"#)
                .unwrap();
        match failure {
            BridgeMessage::Reply { error: Some(e), .. } => assert_eq!(e.kind, "stale"),
            other => panic!("unexpected {:?}", other),
        }

        let console: BridgeMessage =
            serde_json::from_str(r#"{"event":"console","type":"error","text":"boom"}"#).unwrap();
        assert!(matches!(
            console,
            BridgeMessage::Event(BridgeEvent::Console { ref kind, .. }) if kind == "error"
        ));

        let ready: BridgeMessage = serde_json::from_str(r#"{"event":"ready"}"#).unwrap();
        assert!(matches!(ready, BridgeMessage::Event(BridgeEvent::Ready)));
    }

    #[test]
    fn test_bridge_error_mapping() {
        let err = map_bridge_error(
            BridgeError {
                kind: "not_interactable".into(),
                message: "element is not visible".into(),
            },
            "click",
        );
        assert!(matches!(err, E2eError::NotInteractable(_)));
        assert!(err.is_transient());

        let err = map_bridge_error(
            BridgeError {
                kind: "timeout".into(),
                message: "Timeout 5000ms exceeded".into(),
            },
            "click",
        );
        assert!(matches!(err, E2eError::Driver(_)));
    }

    #[test]
    fn test_browser_from_str() {
        assert_eq!("firefox".parse::<Browser>().unwrap(), Browser::Firefox);
        assert_eq!("chrome".parse::<Browser>().unwrap(), Browser::Chromium);
        assert!("netscape".parse::<Browser>().is_err());
    }

    #[test]
    fn test_bridge_env_carries_viewport() {
        let config = PlaywrightConfig {
            viewport_width: 800,
            slow_mo_ms: 300,
            ..Default::default()
        };
        let env = config.bridge_env();
        assert_eq!(env["viewport_width"], 800);
        assert_eq!(env["slow_mo_ms"], 300);
        assert_eq!(env["browser"], "chromium");
    }

    #[test]
    fn test_unanswered_navigation_is_a_timeout() {
        let err = navigation_outcome("goto", "http://game.test/", Duration::from_secs(30), None).unwrap_err();
        match err {
            E2eError::NavigationTimeout { url, timeout_ms } => {
                assert_eq!(url, "http://game.test/");
                assert_eq!(timeout_ms, 30_000);
            }
            other => panic!("unexpected {:?}", other),
        }

        let reported = Some(Err(BridgeError {
            kind: "timeout".into(),
            message: "page.goto: Timeout 30000ms exceeded".into(),
        }));
        let err = navigation_outcome("goto", "http://game.test/", Duration::from_secs(30), reported).unwrap_err();
        assert!(matches!(err, E2eError::NavigationTimeout { .. }));

        let refused = Some(Err(BridgeError {
            kind: "other".into(),
            message: "net::ERR_CONNECTION_REFUSED".into(),
        }));
        let err = navigation_outcome("goto", "http://game.test/", Duration::from_secs(30), refused).unwrap_err();
        assert!(matches!(err, E2eError::Driver(_)));
    }

    #[test]
    fn test_click_uses_configured_action_timeout() {
        let config = PlaywrightConfig {
            action_timeout_ms: 12_000,
            ..Default::default()
        };
        let payload = click_payload(
            &Locator::button("▶️"),
            &ClickOptions::forced(),
            Duration::from_millis(config.action_timeout_ms),
        );
        assert_eq!(payload["timeout_ms"], 12_000);
        assert_eq!(payload["force"], true);
        assert_eq!(payload["index"], 0);
    }
}
