//! Non-fatal pass/warn/fail observations recorded by scenarios

use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::{error, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CheckStatus {
    Pass,
    Warn,
    Fail,
}

impl fmt::Display for CheckStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            CheckStatus::Pass => "OK",
            CheckStatus::Warn => "WARN",
            CheckStatus::Fail => "FAIL",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Check {
    pub name: String,
    pub status: CheckStatus,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub detail: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Checklist {
    checks: Vec<Check>,
}

impl Checklist {
    pub fn record(&mut self, status: CheckStatus, name: impl Into<String>, detail: impl Into<String>) {
        let check = Check {
            name: name.into(),
            status,
            detail: detail.into(),
        };
        match status {
            CheckStatus::Pass => info!("[{}] {} {}", status, check.name, check.detail),
            CheckStatus::Warn => warn!("[{}] {} {}", status, check.name, check.detail),
            CheckStatus::Fail => error!("[{}] {} {}", status, check.name, check.detail),
        }
        self.checks.push(check);
    }

    pub fn pass(&mut self, name: impl Into<String>, detail: impl Into<String>) {
        self.record(CheckStatus::Pass, name, detail);
    }

    pub fn warn(&mut self, name: impl Into<String>, detail: impl Into<String>) {
        self.record(CheckStatus::Warn, name, detail);
    }

    pub fn fail(&mut self, name: impl Into<String>, detail: impl Into<String>) {
        self.record(CheckStatus::Fail, name, detail);
    }

    /// Pass when `ok`, otherwise fail
    pub fn expect(&mut self, ok: bool, name: impl Into<String>, detail: impl Into<String>) {
        let status = if ok { CheckStatus::Pass } else { CheckStatus::Fail };
        self.record(status, name, detail);
    }

    /// Pass when `ok`, otherwise warn
    pub fn hope(&mut self, ok: bool, name: impl Into<String>, detail: impl Into<String>) {
        let status = if ok { CheckStatus::Pass } else { CheckStatus::Warn };
        self.record(status, name, detail);
    }

    pub fn has_failures(&self) -> bool {
        self.checks.iter().any(|c| c.status == CheckStatus::Fail)
    }

    pub fn count(&self, status: CheckStatus) -> usize {
        self.checks.iter().filter(|c| c.status == status).count()
    }

    pub fn find(&self, name: &str) -> Option<&Check> {
        self.checks.iter().find(|c| c.name == name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Check> {
        self.checks.iter()
    }

    pub fn into_vec(self) -> Vec<Check> {
        self.checks
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_failures_and_counts() {
        let mut checks = Checklist::default();
        checks.pass("menu loaded", "");
        checks.hope(false, "auto-save", "no raceInProgress yet");
        assert!(!checks.has_failures());

        checks.expect(false, "back to menu", "start button missing");
        assert!(checks.has_failures());
        assert_eq!(checks.count(CheckStatus::Warn), 1);
        assert_eq!(checks.find("back to menu").unwrap().status, CheckStatus::Fail);
    }
}
