//! Screenshot artifacts and end-of-run reporting

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use crate::driver::PageDriver;
use crate::error::E2eResult;
use crate::observe::{Observation, ObservationLog};

/// Default number of log entries reported at teardown
pub const DEFAULT_LOG_TAIL: usize = 5;

/// A screenshot written during a run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Artifact {
    pub name: String,
    pub path: PathBuf,
    pub sha256: String,
    pub captured_at: DateTime<Utc>,
}

/// Writes screenshots into one directory and remembers what it wrote.
///
/// Every name maps to its own file, so two differently-named captures never
/// collide. Re-using a name overwrites that name's file.
#[derive(Debug, Clone)]
pub struct EvidenceCollector {
    dir: PathBuf,
    full_page: bool,
    artifacts: Vec<Artifact>,
}

impl EvidenceCollector {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            full_page: true,
            artifacts: Vec::new(),
        }
    }

    /// Capture the viewport only instead of the whole scrollable page
    pub fn viewport_only(mut self) -> Self {
        self.full_page = false;
        self
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn artifacts(&self) -> &[Artifact] {
        &self.artifacts
    }

    /// Where an artifact called `name` would be written
    pub fn path_for(&self, name: &str) -> PathBuf {
        self.dir.join(format!("{}.png", slug(name)))
    }

    /// Screenshot the page as `<dir>/<name>.png`, creating the directory on
    /// first use
    pub async fn capture(&mut self, driver: &mut dyn PageDriver, name: &str) -> E2eResult<PathBuf> {
        let full_page = self.full_page;
        self.capture_as(driver, name, full_page).await
    }

    /// Like [`capture`](Self::capture) with an explicit page extent
    pub async fn capture_as(&mut self, driver: &mut dyn PageDriver, name: &str, full_page: bool) -> E2eResult<PathBuf> {
        std::fs::create_dir_all(&self.dir)?;

        let path = self.path_for(name);
        driver.screenshot(&path, full_page).await?;

        let sha256 = match std::fs::read(&path) {
            Ok(data) => hex::encode(Sha256::digest(&data)),
            Err(e) => {
                warn!(path = %path.display(), "screenshot not readable for hashing: {}", e);
                String::new()
            }
        };

        info!(path = %path.display(), "📸 screenshot saved");

        self.artifacts.retain(|a| a.path != path);
        self.artifacts.push(Artifact {
            name: name.to_string(),
            path: path.clone(),
            sha256,
            captured_at: Utc::now(),
        });
        Ok(path)
    }

    /// Log the last `n` observations and return them for the report
    pub fn report_tail(&self, log: &ObservationLog, n: usize) -> Vec<Observation> {
        let tail = log.tail(n);
        if !tail.is_empty() {
            info!("[Console] Last {} of {} messages:", tail.len(), log.len());
            for entry in &tail {
                info!("   {}", entry);
            }
        }
        tail
    }

    /// Write `artifacts.json` next to the screenshots
    pub fn write_manifest(&self) -> E2eResult<Option<PathBuf>> {
        if self.artifacts.is_empty() {
            return Ok(None);
        }
        std::fs::create_dir_all(&self.dir)?;

        let path = self.dir.join("artifacts.json");
        std::fs::write(&path, serde_json::to_string_pretty(&self.artifacts)?)?;
        Ok(Some(path))
    }
}

/// Reduce a name to characters safe in a file name.
///
/// Names that are already safe map to themselves. Any other name gets a short
/// digest of the raw name appended, so distinct names never share a slug.
pub(crate) fn slug(name: &str) -> String {
    let s: String = name
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == '.' {
                c
            } else {
                '_'
            }
        })
        .collect();
    let s = s.trim_matches('.');
    if !s.is_empty() && s == name {
        return s.to_string();
    }

    let digest = hex::encode(Sha256::digest(name.as_bytes()));
    let readable = if s.is_empty() { "screenshot" } else { s };
    format!("{}-{}", readable, &digest[..8])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fake::FakePage;
    use crate::observe::Channel;
    use std::collections::HashSet;

    #[tokio::test]
    async fn test_capture_creates_missing_directory() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = tmp.path().join("nested").join("screens");
        let mut evidence = EvidenceCollector::new(&dir);
        let mut page = FakePage::single("menu");

        let path = evidence.capture(&mut page, "menu").await.unwrap();

        assert!(path.exists());
        assert_eq!(path, dir.join("menu.png"));
        assert_eq!(evidence.artifacts().len(), 1);
        assert_eq!(evidence.artifacts()[0].sha256.len(), 64);
    }

    #[tokio::test]
    async fn test_distinct_names_do_not_overwrite() {
        let tmp = tempfile::tempdir().unwrap();
        let mut evidence = EvidenceCollector::new(tmp.path());
        let mut page = FakePage::single("menu");

        let a = evidence.capture(&mut page, "before_answer").await.unwrap();
        let b = evidence.capture(&mut page, "after_answer").await.unwrap();
        let again = evidence.capture(&mut page, "after_answer").await.unwrap();

        assert_ne!(a, b);
        assert_eq!(b, again);
        assert!(a.exists() && b.exists());
        assert_eq!(evidence.artifacts().len(), 2);
    }

    #[test]
    fn test_slug() {
        assert_eq!(slug("01_marketplace_home"), "01_marketplace_home");
        assert_eq!(slug("first-task"), "first-task");

        let escaped = slug("../etc/passwd");
        assert!(escaped.starts_with("_etc_passwd-"));
        assert!(!escaped.contains('/'));

        assert!(slug("white screen #1").starts_with("white_screen__1-"));
        assert!(slug("").starts_with("screenshot-"));
        assert_eq!(slug("пауза"), slug("пауза"));
    }

    #[test]
    fn test_slug_keeps_distinct_names_apart() {
        let names = ["white screen", "white_screen", "white/screen", "пауза", "старт", "финиш", ""];
        let slugs: HashSet<String> = names.iter().map(|n| slug(n)).collect();
        assert_eq!(slugs.len(), names.len());
    }

    #[tokio::test]
    async fn test_colliding_names_keep_their_own_files() {
        let tmp = tempfile::tempdir().unwrap();
        let mut evidence = EvidenceCollector::new(tmp.path());
        let mut page = FakePage::single("menu");

        let mut paths = Vec::new();
        for name in ["white screen", "white_screen", "пауза", "старт"] {
            paths.push(evidence.capture(&mut page, name).await.unwrap());
        }

        let unique: HashSet<&PathBuf> = paths.iter().collect();
        assert_eq!(unique.len(), 4);
        assert!(paths.iter().all(|p| p.exists()));
        assert_eq!(paths[1], tmp.path().join("white_screen.png"));

        let recorded: Vec<&str> = evidence.artifacts().iter().map(|a| a.name.as_str()).collect();
        assert_eq!(recorded, vec!["white screen", "white_screen", "пауза", "старт"]);
    }

    #[test]
    fn test_report_tail_and_manifest() {
        let tmp = tempfile::tempdir().unwrap();
        let evidence = EvidenceCollector::new(tmp.path());
        let mut log = ObservationLog::default();
        for i in 0..8 {
            log.push(Channel::ConsoleLog, format!("line {}", i));
        }

        let tail = evidence.report_tail(&log, DEFAULT_LOG_TAIL);
        assert_eq!(tail.len(), 5);
        assert_eq!(tail[0].message, "line 3");

        assert!(evidence.write_manifest().unwrap().is_none());
    }
}
