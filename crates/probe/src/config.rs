//! Harness configuration

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::api::ApiConfig;
use crate::error::{E2eError, E2eResult};
use crate::playwright::PlaywrightConfig;
use crate::runner::RunnerConfig;
use crate::session::SessionConfig;

/// Everything a scenario run needs, loadable from one YAML file
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct HarnessConfig {
    /// Session settings (base URL, timeouts, polling, evidence)
    pub session: SessionConfig,

    /// Browser settings
    pub playwright: PlaywrightConfig,

    /// Game API settings
    pub api: ApiConfig,

    /// Runner settings
    pub runner: RunnerSettings,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RunnerSettings {
    /// Directory of declarative `*.yaml` scenarios
    pub specs_dir: Option<PathBuf>,

    /// Where results and screenshots are written
    pub output_dir: PathBuf,

    pub fail_on_page_error: bool,
}

impl Default for RunnerSettings {
    fn default() -> Self {
        Self {
            specs_dir: None,
            output_dir: PathBuf::from("test-results"),
            fail_on_page_error: false,
        }
    }
}

impl HarnessConfig {
    pub fn from_yaml(yaml: &str) -> E2eResult<Self> {
        serde_yaml::from_str(yaml).map_err(|e| E2eError::Config(e.to_string()))
    }

    pub fn from_yaml_file(path: &Path) -> E2eResult<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| E2eError::Config(format!("{}: {}", path.display(), e)))?;
        Self::from_yaml(&content)
    }

    /// Point results and screenshots at `dir`
    pub fn set_output_dir(&mut self, dir: PathBuf) {
        self.session.evidence_dir = dir.join("screenshots");
        self.runner.output_dir = dir;
    }

    pub fn runner_config(&self) -> RunnerConfig {
        let mut session = self.session.clone();
        session.api = self.api.clone();
        RunnerConfig {
            session,
            output_dir: self.runner.output_dir.clone(),
            fail_on_page_error: self.runner.fail_on_page_error,
        }
    }

    /// Base URL for API calls
    pub fn api_base(&self) -> &str {
        self.api.base_url.as_deref().unwrap_or(&self.session.base_url)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::ProfileId;
    use crate::playwright::Browser;

    #[test]
    fn test_defaults() {
        let config = HarnessConfig::default();
        assert_eq!(config.session.white_screen_min_chars, 100);
        assert_eq!(config.session.poll_attempts, 5);
        assert!(config.playwright.headless);
        assert_eq!(config.api_base(), config.session.base_url);
    }

    #[test]
    fn test_partial_yaml_keeps_defaults() {
        let yaml = r#"
session:
  base_url: http://localhost:8081/
  profile: 42
  poll_delay_ms: 250
playwright:
  browser: firefox
  headless: false
api:
  base_url: http://localhost:3000/
runner:
  fail_on_page_error: true
"#;
        let config = HarnessConfig::from_yaml(yaml).unwrap();
        assert_eq!(config.session.base_url, "http://localhost:8081/");
        assert_eq!(config.session.profile, Some(ProfileId::Number(42)));
        assert_eq!(config.session.poll_delay_ms, 250);
        assert_eq!(config.session.navigation_timeout_ms, 30_000);
        assert_eq!(config.playwright.browser, Browser::Firefox);
        assert!(!config.playwright.headless);
        assert_eq!(config.api_base(), "http://localhost:3000/");
        assert!(config.runner_config().fail_on_page_error);

        let session = config.runner_config().session;
        assert_eq!(session.api.base_url.as_deref(), Some("http://localhost:3000/"));
        assert_eq!(session.api.request_timeout_ms, 5_000);
    }

    #[test]
    fn test_output_dir_moves_screenshots() {
        let mut config = HarnessConfig::default();
        config.set_output_dir(PathBuf::from("out"));
        assert_eq!(config.session.evidence_dir, PathBuf::from("out/screenshots"));
        assert_eq!(config.runner_config().output_dir, PathBuf::from("out"));
    }

    #[test]
    fn test_bad_yaml_is_config_error() {
        let err = HarnessConfig::from_yaml("session: [").unwrap_err();
        assert!(matches!(err, E2eError::Config(_)));
    }
}
