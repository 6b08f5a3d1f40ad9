//! Error types for browser scenarios

use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum E2eError {
    #[error("Navigation to {url} timed out after {timeout_ms} ms")]
    NavigationTimeout { url: String, timeout_ms: u64 },

    #[error("Navigation to {url} returned HTTP {status}")]
    NavigationStatus { url: String, status: u16 },

    #[error("No element matches {0}")]
    ElementNotFound(String),

    #[error("Element detached while in use: {0}")]
    StaleElement(String),

    #[error("Element is not interactable: {0}")]
    NotInteractable(String),

    #[error("White screen detected: {chars} visible chars (threshold: {threshold})")]
    WhiteScreenDetected {
        chars: usize,
        threshold: usize,
        screenshot: Option<PathBuf>,
    },

    #[error("Unhandled page error: {0}")]
    UnhandledPageError(String),

    #[error("Timed out waiting for {what} after {attempts} attempts")]
    PollTimeout { what: String, attempts: u32 },

    #[error("Game API health check failed after {0} attempts")]
    ApiHealthCheck(u32),

    #[error("Playwright not found. Install with: npm install playwright && npx playwright install")]
    PlaywrightNotFound,

    #[error("Playwright bridge error: {0}")]
    Playwright(String),

    #[error("Playwright bridge closed unexpectedly")]
    BridgeClosed,

    #[error("Driver operation failed: {0}")]
    Driver(String),

    #[error("Scenario not found: {0}")]
    ScenarioNotFound(String),

    #[error("Scenario spec parse error: {0}")]
    SpecParse(String),

    #[error("Step failed: {step} - {reason}")]
    StepFailed { step: String, reason: String },

    #[error("Assertion failed: {0}")]
    AssertionFailed(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

impl E2eError {
    /// Errors a polling loop may absorb as "condition not met yet"
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            E2eError::StaleElement(_)
                | E2eError::ElementNotFound(_)
                | E2eError::NotInteractable(_)
                | E2eError::Driver(_)
        )
    }

    /// Poll timeouts end a scenario as timed-out rather than errored
    pub fn is_timeout(&self) -> bool {
        matches!(
            self,
            E2eError::PollTimeout { .. } | E2eError::NavigationTimeout { .. }
        )
    }
}

pub type E2eResult<T> = Result<T, E2eError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_classification() {
        assert!(E2eError::StaleElement("button".into()).is_transient());
        assert!(E2eError::Driver("locator timeout".into()).is_transient());
        assert!(!E2eError::BridgeClosed.is_transient());
        assert!(!E2eError::WhiteScreenDetected {
            chars: 0,
            threshold: 100,
            screenshot: None
        }
        .is_transient());
    }

    #[test]
    fn test_white_screen_message() {
        let err = E2eError::WhiteScreenDetected {
            chars: 4,
            threshold: 10,
            screenshot: None,
        };
        assert_eq!(
            err.to_string(),
            "White screen detected: 4 visible chars (threshold: 10)"
        );
    }
}
