//! Declarative YAML scenarios

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use tracing::{debug, info};

use crate::api::ProfileId;
use crate::condition::Condition;
use crate::driver::{ClickOptions, LoadState};
use crate::error::{E2eError, E2eResult};
use crate::locator::Locator;
use crate::poll::Poller;
use crate::scenarios::Scenario;
use crate::session::{Session, SessionConfig};

/// A scenario parsed from YAML
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScenarioSpec {
    /// Unique name for this scenario
    pub name: String,

    #[serde(default)]
    pub description: String,

    /// Tags for filtering
    #[serde(default)]
    pub tags: Vec<String>,

    /// First page, relative to the base URL
    #[serde(default = "default_entry")]
    pub entry: String,

    /// Profile appended to the entry page as `?profile=<id>`
    #[serde(default)]
    pub profile: Option<ProfileId>,

    /// Steps to execute in order
    pub steps: Vec<Step>,
}

fn default_entry() -> String {
    "/".to_string()
}

fn default_true() -> bool {
    true
}

/// A single step of a declarative scenario
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum Step {
    /// Navigate to a URL (relative to base)
    Navigate {
        url: String,
        #[serde(default)]
        wait_for: Option<Locator>,
        #[serde(default = "default_wait_timeout")]
        timeout_ms: u64,
    },

    Click {
        locator: Locator,
        #[serde(default)]
        force: bool,
        #[serde(default)]
        index: usize,
    },

    /// Fixed pause
    Settle { ms: u64 },

    WaitForLoadState {
        #[serde(default)]
        state: LoadState,
    },

    /// Sample a condition until it holds
    PollUntil {
        condition: Condition,
        #[serde(default)]
        max_attempts: Option<u32>,
        #[serde(default)]
        delay_ms: Option<u64>,
        /// Fail the scenario when the condition never holds
        #[serde(default = "default_true")]
        required: bool,
    },

    AssertVisible {
        locator: Locator,
        #[serde(default = "default_true")]
        visible: bool,
    },

    /// Body text contains the string
    AssertText { contains: String },

    /// White-screen guard
    ExpectContent {
        #[serde(default)]
        min_chars: Option<usize>,
    },

    Screenshot {
        name: String,
        #[serde(default = "default_true")]
        full_page: bool,
    },

    /// Execute JavaScript, optionally comparing its result
    Evaluate {
        script: String,
        #[serde(default)]
        expected: Option<serde_json::Value>,
    },

    Log { message: String },
}

fn default_wait_timeout() -> u64 {
    5000
}

impl Step {
    /// One-line description for logs and failures
    pub fn describe(&self) -> String {
        match self {
            Step::Navigate { url, .. } => format!("navigate {}", url),
            Step::Click { locator, force, index } => {
                format!("click {}{}{}", locator, if *force { " (forced)" } else { "" }, match index {
                    0 => String::new(),
                    i => format!(" #{}", i),
                })
            }
            Step::Settle { ms } => format!("settle {} ms", ms),
            Step::WaitForLoadState { state } => format!("wait for {}", state.as_str()),
            Step::PollUntil { condition, .. } => format!("poll until {}", condition),
            Step::AssertVisible { locator, visible } => {
                format!("assert {} {}", locator, if *visible { "visible" } else { "hidden" })
            }
            Step::AssertText { contains } => format!("assert text '{}'", contains),
            Step::ExpectContent { .. } => "expect content".to_string(),
            Step::Screenshot { name, .. } => format!("screenshot {}", name),
            Step::Evaluate { script, .. } => format!("evaluate {}", script),
            Step::Log { message } => format!("log {}", message),
        }
    }
}

impl ScenarioSpec {
    pub fn from_yaml(yaml: &str) -> E2eResult<Self> {
        serde_yaml::from_str(yaml).map_err(E2eError::from)
    }

    pub fn from_file(path: &Path) -> E2eResult<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content).map_err(|e| E2eError::SpecParse(format!("{}: {}", path.display(), e)))
    }

    /// Load every `*.yaml` / `*.yml` under `dir`, in file name order
    pub fn load_all(dir: &Path) -> E2eResult<Vec<Self>> {
        let mut specs = Vec::new();

        for entry in walkdir::WalkDir::new(dir)
            .sort_by_file_name()
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| {
                e.path()
                    .extension()
                    .map(|ext| ext == "yaml" || ext == "yml")
                    .unwrap_or(false)
            })
        {
            specs.push(Self::from_file(entry.path())?);
        }

        debug!(dir = %dir.display(), count = specs.len(), "loaded scenario specs");
        Ok(specs)
    }

    async fn execute(&self, session: &mut Session, step: &Step) -> E2eResult<()> {
        match step {
            Step::Navigate { url, wait_for, timeout_ms } => {
                session.goto(url).await?;
                if let Some(locator) = wait_for {
                    if !session.is_visible_within(locator, *timeout_ms).await? {
                        return Err(step_failed(step, format!("{} not visible after {} ms", locator, timeout_ms)));
                    }
                }
            }
            Step::Click { locator, force, index } => {
                let options = ClickOptions {
                    force: *force,
                    index: *index,
                };
                session.click_with(locator, options).await?;
            }
            Step::Settle { ms } => session.settle(*ms).await,
            Step::WaitForLoadState { state } => session.wait_for_load_state(*state).await?,
            Step::PollUntil {
                condition,
                max_attempts,
                delay_ms,
                required,
            } => {
                let defaults = session.poller();
                let poller = Poller::new(
                    max_attempts.unwrap_or(defaults.max_attempts()),
                    delay_ms.map(Duration::from_millis).unwrap_or(defaults.delay()),
                );
                let outcome = session.poll_until(condition, poller).await?;
                let attempts = outcome.attempts();
                if outcome.is_satisfied() {
                    session.checks().pass(step.describe(), format!("after {} attempt(s)", attempts));
                } else if *required {
                    outcome.into_result(&condition.to_string())?;
                } else {
                    session.checks().warn(step.describe(), format!("not met after {} attempt(s)", attempts));
                }
            }
            Step::AssertVisible { locator, visible } => {
                let actual = session.is_visible(locator).await?;
                if actual != *visible {
                    return Err(step_failed(step, format!("visible is {}", actual)));
                }
                session.checks().pass(step.describe(), "");
            }
            Step::AssertText { contains } => {
                let body = session.body_text().await?;
                if !body.contains(contains.as_str()) {
                    let preview: String = body.trim().chars().take(120).collect();
                    return Err(step_failed(step, format!("body was '{}'", preview)));
                }
                session.checks().pass(step.describe(), "");
            }
            Step::ExpectContent { min_chars } => {
                let label = format!("{}-white-screen", self.name);
                let chars = match min_chars {
                    Some(min) => session.ensure_not_white_screen(&label, *min).await?,
                    None => session.expect_content(&label).await?,
                };
                session.checks().pass(step.describe(), format!("{} chars", chars));
            }
            Step::Screenshot { name, full_page } => {
                session.screenshot_with(name, *full_page).await?;
            }
            Step::Evaluate { script, expected } => {
                let value = session.evaluate(script).await?;
                if let Some(expected) = expected {
                    if &value != expected {
                        return Err(step_failed(step, format!("expected {}, got {}", expected, value)));
                    }
                    session.checks().pass(step.describe(), value.to_string());
                }
            }
            Step::Log { message } => info!("{}", message),
        }
        Ok(())
    }
}

fn step_failed(step: &Step, reason: String) -> E2eError {
    E2eError::StepFailed {
        step: step.describe(),
        reason,
    }
}

#[async_trait]
impl Scenario for ScenarioSpec {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        &self.description
    }

    fn tags(&self) -> Vec<&str> {
        self.tags.iter().map(String::as_str).collect()
    }

    fn entry(&self, _config: &SessionConfig) -> String {
        match &self.profile {
            Some(id) => {
                let sep = if self.entry.contains('?') { '&' } else { '?' };
                format!("{}{}profile={}", self.entry, sep, id)
            }
            None => self.entry.clone(),
        }
    }

    async fn run(&self, session: &mut Session) -> E2eResult<()> {
        for (i, step) in self.steps.iter().enumerate() {
            debug!(step = i + 1, "{}", step.describe());
            self.execute(session, step).await?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAUSE_SPEC: &str = r#"
name: pause-menu
description: Pause menu opens mid-race
tags: [race, pause]
entry: /games-number-racing.html
profile: 1764998591846
steps:
  - action: wait_for_load_state
    state: networkidle
  - action: click
    locator: { by: button, value: "▶️" }
  - action: click
    locator: { by: css, value: ".grid.grid-cols-3 button" }
    force: true
    index: 1
  - action: poll_until
    condition: { text_contains: "Пауза" }
    max_attempts: 3
    delay_ms: 500
    required: false
  - action: expect_content
    min_chars: 10
  - action: screenshot
    name: pause_menu
"#;

    #[test]
    fn test_parse_spec() {
        let spec = ScenarioSpec::from_yaml(PAUSE_SPEC).unwrap();
        assert_eq!(spec.name, "pause-menu");
        assert_eq!(spec.steps.len(), 6);
        assert_eq!(spec.profile, Some(ProfileId::Number(1764998591846)));

        match &spec.steps[2] {
            Step::Click { force, index, .. } => {
                assert!(*force);
                assert_eq!(*index, 1);
            }
            other => panic!("unexpected {:?}", other),
        }
        match &spec.steps[5] {
            Step::Screenshot { full_page, .. } => assert!(*full_page),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_entry_with_profile() {
        let spec = ScenarioSpec::from_yaml(PAUSE_SPEC).unwrap();
        assert_eq!(
            spec.entry(&SessionConfig::default()),
            "/games-number-racing.html?profile=1764998591846"
        );
    }

    #[test]
    fn test_unknown_action_is_rejected() {
        let yaml = "name: bad\nsteps:\n  - action: hover\n    selector: x\n";
        assert!(ScenarioSpec::from_yaml(yaml).is_err());
    }

    #[test]
    fn test_load_all_reads_yaml_files() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(tmp.path().join("nested")).unwrap();
        std::fs::write(tmp.path().join("a.yaml"), PAUSE_SPEC).unwrap();
        std::fs::write(
            tmp.path().join("nested").join("b.yml"),
            "name: home\nsteps:\n  - action: log\n    message: hi\n",
        )
        .unwrap();
        std::fs::write(tmp.path().join("notes.txt"), "not a spec").unwrap();

        let specs = ScenarioSpec::load_all(tmp.path()).unwrap();
        let names: Vec<_> = specs.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["pause-menu", "home"]);
    }

    #[test]
    fn test_broken_file_names_path() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::write(tmp.path().join("broken.yaml"), "name: [").unwrap();
        let err = ScenarioSpec::load_all(tmp.path()).unwrap_err();
        assert!(matches!(err, E2eError::SpecParse(msg) if msg.contains("broken.yaml")));
    }
}
