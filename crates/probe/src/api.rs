//! Game API client - health checks and profile lookup

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::error::{E2eError, E2eResult};
use crate::poll::Poller;

/// Profile identifier; the API hands out numbers but older records use strings
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ProfileId {
    Number(u64),
    Text(String),
}

impl fmt::Display for ProfileId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProfileId::Number(n) => write!(f, "{}", n),
            ProfileId::Text(s) => f.write_str(s),
        }
    }
}

impl From<u64> for ProfileId {
    fn from(n: u64) -> Self {
        ProfileId::Number(n)
    }
}

impl From<&str> for ProfileId {
    fn from(s: &str) -> Self {
        match s.parse::<u64>() {
            Ok(n) => ProfileId::Number(n),
            Err(_) => ProfileId::Text(s.to_string()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Health {
    pub status: String,
    #[serde(default)]
    pub timestamp: Option<String>,
}

impl Health {
    pub fn is_ok(&self) -> bool {
        self.status == "ok"
    }
}

/// Number Racing progress stored on a profile
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NumberRacingData {
    #[serde(default = "default_stage")]
    pub learning_stage: u8,
    #[serde(default = "default_difficulty")]
    pub difficulty: u8,
}

fn default_stage() -> u8 {
    1
}

fn default_difficulty() -> u8 {
    1
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Profile {
    pub id: ProfileId,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub stars: u32,
    #[serde(default)]
    pub number_racing_data: Option<NumberRacingData>,
}

/// Connection settings for the game API
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    /// Overrides the session base URL when the API is served elsewhere
    pub base_url: Option<String>,

    pub request_timeout_ms: u64,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: None,
            request_timeout_ms: 5_000,
        }
    }
}

/// Thin typed client for `/api/health` and `/api/profiles`
#[derive(Debug, Clone)]
pub struct GameApi {
    client: reqwest::Client,
    base: reqwest::Url,
}

impl GameApi {
    pub fn new(base_url: &str, request_timeout: Duration) -> E2eResult<Self> {
        let base = reqwest::Url::parse(base_url)
            .map_err(|e| E2eError::Config(format!("invalid api url '{}': {}", base_url, e)))?;
        let client = reqwest::Client::builder().timeout(request_timeout).build()?;
        Ok(Self { client, base })
    }

    pub fn from_config(config: &ApiConfig, fallback_base: &str) -> E2eResult<Self> {
        let base = config.base_url.as_deref().unwrap_or(fallback_base);
        Self::new(base, Duration::from_millis(config.request_timeout_ms))
    }

    fn endpoint(&self, path: &str) -> E2eResult<reqwest::Url> {
        self.base
            .join(path)
            .map_err(|e| E2eError::Config(format!("invalid api path '{}': {}", path, e)))
    }

    pub async fn health(&self) -> E2eResult<Health> {
        let url = self.endpoint("/api/health")?;
        debug!(%url, "api health");
        let health = self
            .client
            .get(url)
            .send()
            .await?
            .error_for_status()?
            .json::<Health>()
            .await?;
        Ok(health)
    }

    pub async fn profiles(&self) -> E2eResult<Vec<Profile>> {
        let url = self.endpoint("/api/profiles")?;
        let profiles = self
            .client
            .get(url)
            .send()
            .await?
            .error_for_status()?
            .json::<Vec<Profile>>()
            .await?;
        debug!(count = profiles.len(), "profiles loaded");
        Ok(profiles)
    }

    /// Look one profile up; an unknown id is `None`
    pub async fn profile(&self, id: &ProfileId) -> E2eResult<Option<Profile>> {
        let url = self.endpoint(&format!("/api/profiles/{}", id))?;
        let resp = self.client.get(url).send().await?;
        if resp.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }
        Ok(Some(resp.error_for_status()?.json::<Profile>().await?))
    }

    /// Wait until `/api/health` reports ok
    pub async fn wait_for_healthy(&self, poller: Poller) -> E2eResult<Health> {
        let mut attempts = poller.attempts();

        while let Some(attempt) = attempts.next().await {
            match self.health().await {
                Ok(health) if health.is_ok() => {
                    info!(attempt, "game API is healthy");
                    return Ok(health);
                }
                Ok(health) => warn!(status = %health.status, "health check not ok"),
                Err(E2eError::Http(e)) if e.is_connect() => {
                    if attempt == 1 {
                        info!("Waiting for game API...");
                    }
                }
                Err(e) => warn!("Health check error: {}", e),
            }
        }

        Err(E2eError::ApiHealthCheck(attempts.taken()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_profile_with_numeric_id() {
        let json = r#"[{
            "id": 1764998591846,
            "name": "Маша",
            "stars": 42,
            "numberRacingData": { "learningStage": 3, "difficulty": 2 }
        }]"#;
        let profiles: Vec<Profile> = serde_json::from_str(json).unwrap();
        assert_eq!(profiles[0].id, ProfileId::Number(1764998591846));
        let data = profiles[0].number_racing_data.as_ref().unwrap();
        assert_eq!(data.learning_stage, 3);
        assert_eq!(data.difficulty, 2);
    }

    #[test]
    fn test_profile_with_string_id_and_no_racing_data() {
        let profile: Profile = serde_json::from_str(r#"{"id": "legacy-7", "name": "Петя"}"#).unwrap();
        assert_eq!(profile.id.to_string(), "legacy-7");
        assert_eq!(profile.stars, 0);
        assert!(profile.number_racing_data.is_none());
    }

    #[test]
    fn test_profile_id_from_str() {
        assert_eq!(ProfileId::from("1764998591846"), ProfileId::Number(1764998591846));
        assert_eq!(ProfileId::from("abc"), ProfileId::Text("abc".into()));
    }

    #[test]
    fn test_health_status() {
        let health: Health = serde_json::from_str(r#"{"status":"ok","timestamp":"2025-12-06T10:00:00Z"}"#).unwrap();
        assert!(health.is_ok());
    }
}
