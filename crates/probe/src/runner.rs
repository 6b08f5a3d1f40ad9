//! Scenario runner: one fresh browser per scenario, results on disk

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{debug, error, info, warn};

use crate::checks::{Check, CheckStatus};
use crate::driver::DriverFactory;
use crate::error::{E2eError, E2eResult};
use crate::evidence::{slug, Artifact};
use crate::observe::{Channel, Observation};
use crate::scenarios::Scenario;
use crate::session::{Phase, Session, SessionConfig};

/// Result of running a single scenario
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScenarioResult {
    pub name: String,
    pub phase: Phase,
    pub success: bool,
    pub duration_ms: u64,
    pub checks: Vec<Check>,
    pub artifacts: Vec<Artifact>,
    pub console_tail: Vec<Observation>,
    pub channel_totals: BTreeMap<Channel, usize>,
    pub error: Option<String>,
}

impl ScenarioResult {
    fn not_started(name: &str, error: &E2eError, duration_ms: u64) -> Self {
        Self {
            name: name.to_string(),
            phase: Phase::Errored,
            success: false,
            duration_ms,
            checks: Vec::new(),
            artifacts: Vec::new(),
            console_tail: Vec::new(),
            channel_totals: BTreeMap::new(),
            error: Some(error.to_string()),
        }
    }

    pub fn warnings(&self) -> usize {
        self.checks.iter().filter(|c| c.status == CheckStatus::Warn).count()
    }

    /// First failed check, for one-line summaries
    pub fn first_failure(&self) -> Option<&Check> {
        self.checks.iter().find(|c| c.status == CheckStatus::Fail)
    }
}

/// Result of running a batch of scenarios
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SuiteResult {
    pub total: usize,
    pub passed: usize,
    pub failed: usize,
    pub timed_out: usize,
    pub duration_ms: u64,
    pub results: Vec<ScenarioResult>,
}

impl SuiteResult {
    pub fn all_passed(&self) -> bool {
        self.failed == 0
    }
}

/// Runner configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RunnerConfig {
    pub session: SessionConfig,

    /// Where `test-results.json` is written
    pub output_dir: PathBuf,

    /// Turn uncaught page exceptions into scenario failures
    pub fail_on_page_error: bool,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            session: SessionConfig::default(),
            output_dir: PathBuf::from("test-results"),
            fail_on_page_error: false,
        }
    }
}

/// Runs scenarios against browsers produced by a [`DriverFactory`]
pub struct ScenarioRunner {
    factory: Box<dyn DriverFactory>,
    config: RunnerConfig,
}

impl ScenarioRunner {
    pub fn new(factory: Box<dyn DriverFactory>, config: RunnerConfig) -> Self {
        Self { factory, config }
    }

    pub fn config(&self) -> &RunnerConfig {
        &self.config
    }

    /// Run one scenario in a fresh browser.
    ///
    /// Never fails: launch problems and scenario errors end up in the result.
    /// The browser is closed on every path.
    pub async fn run_one(&self, scenario: &dyn Scenario) -> ScenarioResult {
        let start = Instant::now();
        let name = scenario.name().to_string();
        info!("▶ {}", name);

        let mut session_config = self.config.session.clone();
        session_config.evidence_dir = session_config.evidence_dir.join(slug(&name));

        let driver = match self.factory.launch().await {
            Ok(driver) => driver,
            Err(e) => {
                error!(scenario = %name, "browser launch failed: {}", e);
                return ScenarioResult::not_started(&name, &e, start.elapsed().as_millis() as u64);
            }
        };

        let mut session = Session::new(driver, session_config);
        let entry = scenario.entry(session.config());

        let mut outcome = match session.open(&entry).await {
            Ok(response) => {
                debug!(url = %response.url, status = ?response.status, "entry page loaded");
                scenario.run(&mut session).await
            }
            Err(e) => Err(e),
        };
        if outcome.is_ok() && self.config.fail_on_page_error {
            outcome = session.check_page_errors();
        }

        let phase = match &outcome {
            Ok(()) => Phase::Done,
            Err(e) if e.is_timeout() => Phase::TimedOut,
            Err(_) => Phase::Errored,
        };

        if let Err(e) = &outcome {
            error!(scenario = %name, "{}", e);
            if let Err(shot) = session.screenshot(&format!("{}-error", name)).await {
                warn!("could not capture error screenshot: {}", shot);
            }
        }
        session.finish(phase);

        let (output, closed) = session.finish_output().await;
        if let Err(e) = closed {
            warn!(scenario = %name, "browser did not close cleanly: {}", e);
        }

        let success = outcome.is_ok() && !output.checks.has_failures();
        ScenarioResult {
            name,
            phase,
            success,
            duration_ms: start.elapsed().as_millis() as u64,
            channel_totals: output.log.totals(),
            checks: output.checks.into_vec(),
            artifacts: output.artifacts,
            console_tail: output.tail,
            error: outcome.err().map(|e| e.to_string()),
        }
    }

    /// Run scenarios one after another
    pub async fn run_all(&self, scenarios: &[&dyn Scenario]) -> SuiteResult {
        let start = Instant::now();
        let mut results = Vec::with_capacity(scenarios.len());

        info!("Running {} scenario(s)...", scenarios.len());

        for scenario in scenarios {
            let result = self.run_one(*scenario).await;
            if result.success {
                info!("✓ {} ({} ms)", result.name, result.duration_ms);
            } else {
                let reason = result
                    .error
                    .clone()
                    .or_else(|| result.first_failure().map(|c| format!("{}: {}", c.name, c.detail)))
                    .unwrap_or_else(|| "unknown error".to_string());
                error!("✗ {} - {}", result.name, reason);
            }
            results.push(result);
        }

        let passed = results.iter().filter(|r| r.success).count();
        let timed_out = results.iter().filter(|r| r.phase == Phase::TimedOut).count();
        let duration_ms = start.elapsed().as_millis() as u64;

        info!(
            "Scenario results: {} passed, {} failed ({} ms)",
            passed,
            results.len() - passed,
            duration_ms
        );

        SuiteResult {
            total: results.len(),
            passed,
            failed: results.len() - passed,
            timed_out,
            duration_ms,
            results,
        }
    }

    /// Write `test-results.json` into the output directory
    pub fn write_results(&self, results: &SuiteResult) -> E2eResult<PathBuf> {
        write_results(&self.config.output_dir, results)
    }
}

pub fn write_results(dir: &Path, results: &SuiteResult) -> E2eResult<PathBuf> {
    std::fs::create_dir_all(dir)?;
    let path = dir.join("test-results.json");
    std::fs::write(&path, serde_json::to_string_pretty(results)?)?;
    info!("Results written to {}", path.display());
    Ok(path)
}

/// Pick scenarios by name and tag. No names means all; an unknown name is an error.
pub fn select<'a>(
    scenarios: &'a [Box<dyn Scenario>],
    names: &[String],
    tag: Option<&str>,
) -> E2eResult<Vec<&'a dyn Scenario>> {
    for wanted in names {
        if !scenarios.iter().any(|s| s.name() == wanted) {
            return Err(E2eError::ScenarioNotFound(wanted.clone()));
        }
    }

    Ok(scenarios
        .iter()
        .map(|s| s.as_ref())
        .filter(|s| names.is_empty() || names.iter().any(|n| n == s.name()))
        .filter(|s| tag.map_or(true, |t| s.tags().contains(&t)))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scenarios;

    #[test]
    fn test_select_by_name_and_tag() {
        let all = scenarios::builtin();

        let picked = select(&all, &["pause".to_string(), "navigation".to_string()], None).unwrap();
        let names: Vec<_> = picked.iter().map(|s| s.name()).collect();
        assert_eq!(names, vec!["navigation", "pause"]);

        let profile = select(&all, &[], Some("profile")).unwrap();
        assert!(profile.iter().all(|s| s.tags().contains(&"profile")));
        assert_eq!(profile.len(), 2);

        assert_eq!(select(&all, &[], None).unwrap().len(), all.len());
    }

    #[test]
    fn test_select_unknown_name() {
        let all = scenarios::builtin();
        match select(&all, &["no-such".to_string()], None) {
            Err(E2eError::ScenarioNotFound(name)) => assert_eq!(name, "no-such"),
            Err(other) => panic!("unexpected error {:?}", other),
            Ok(picked) => panic!("selected {} scenario(s)", picked.len()),
        }
    }

    #[test]
    fn test_write_results() {
        let tmp = tempfile::tempdir().unwrap();
        let suite = SuiteResult {
            total: 0,
            passed: 0,
            failed: 0,
            timed_out: 0,
            duration_ms: 0,
            results: vec![],
        };
        let path = write_results(tmp.path(), &suite).unwrap();
        let text = std::fs::read_to_string(path).unwrap();
        assert!(text.contains("\"total\": 0"));
    }
}
