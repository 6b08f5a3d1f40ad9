//! Built-in diagnostic scenarios
//!
//! Each scenario is a short navigate/act/observe script over a [`Session`].
//! Heuristics such as "click the first answer" are approximate, so most
//! findings are recorded as checks rather than returned as errors.

mod race;
mod site;
mod stage;

use async_trait::async_trait;
use tracing::warn;

use crate::driver::{ClickOptions, LoadState};
use crate::error::E2eResult;
use crate::game;
use crate::session::{Session, SessionConfig};

pub use race::{AnswerScenarios, FinishScreen, FirstTask, Pause};
pub use site::{GamePages, Marketplace, Navigation, ProfileLoading, ProfileMenu};
pub use stage::{AddSubIcons, StageCheck};

/// Time React needs to render after the network goes idle
pub(crate) const RENDER_SETTLE_MS: u64 = 2_000;

/// One self-contained sequence of navigate/act/assert steps
#[async_trait]
pub trait Scenario: Send + Sync {
    fn name(&self) -> &str;

    fn description(&self) -> &str;

    fn tags(&self) -> Vec<&str> {
        Vec::new()
    }

    /// Page the session is opened on, relative to the base URL
    fn entry(&self, config: &SessionConfig) -> String;

    async fn run(&self, session: &mut Session) -> E2eResult<()>;
}

/// All built-in scenarios in their canonical order
pub fn builtin() -> Vec<Box<dyn Scenario>> {
    vec![
        Box::new(Marketplace),
        Box::new(GamePages),
        Box::new(Navigation),
        Box::new(FirstTask),
        Box::new(AnswerScenarios),
        Box::new(Pause),
        Box::new(FinishScreen),
        Box::new(StageCheck),
        Box::new(AddSubIcons),
        Box::new(ProfileLoading),
        Box::new(ProfileMenu),
    ]
}

/// Wait for the network to go idle and React to render
pub(crate) async fn wait_for_render(session: &mut Session, settle_ms: u64) -> E2eResult<()> {
    session.wait_for_load_state(LoadState::NetworkIdle).await?;
    session.settle(settle_ms).await;
    Ok(())
}

/// Press ▶️ on the menu and let the first task render
pub(crate) async fn start_race(session: &mut Session) -> E2eResult<()> {
    session.click(&game::start_button()).await?;
    session.settle(RENDER_SETTLE_MS).await;
    Ok(())
}

/// Force-click answer `index` of the current task.
///
/// Transient failures (the grid re-rendering under the click) become a
/// warning check and `Ok(false)`; anything else is returned.
pub(crate) async fn answer(session: &mut Session, index: usize, question: u32) -> E2eResult<bool> {
    match session
        .click_with(&game::answer_buttons(), ClickOptions::forced().nth(index))
        .await
    {
        Ok(()) => Ok(true),
        Err(e) if e.is_transient() => {
            warn!(question, index, "answer click failed: {}", e);
            session
                .checks()
                .warn(format!("answer question {}", question), e.to_string());
            Ok(false)
        }
        Err(e) => Err(e),
    }
}

/// Record whether any uncaught page or console error was observed
pub(crate) fn check_js_errors(session: &mut Session, fatal: bool) {
    let errors: Vec<String> = session.log().errors().iter().map(|o| o.to_string()).collect();
    let detail = if errors.is_empty() {
        "none".to_string()
    } else {
        format!("{} error(s): {}", errors.len(), errors.iter().take(5).cloned().collect::<Vec<_>>().join("; "))
    };
    if fatal {
        session.checks().expect(errors.is_empty(), "javascript errors", detail);
    } else {
        session.checks().hope(errors.is_empty(), "javascript errors", detail);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_builtin_names_are_unique() {
        let scenarios = builtin();
        let names: HashSet<_> = scenarios.iter().map(|s| s.name().to_string()).collect();
        assert_eq!(names.len(), scenarios.len());
        assert_eq!(scenarios.len(), 11);
    }

    #[test]
    fn test_entries_carry_profile_where_needed() {
        let config = SessionConfig::default();
        let scenarios = builtin();
        let entry = |name: &str| {
            scenarios
                .iter()
                .find(|s| s.name() == name)
                .map(|s| s.entry(&config))
                .unwrap()
        };

        assert_eq!(entry("marketplace"), "/");
        assert_eq!(entry("navigation"), "/games-number-racing.html");
        assert_eq!(entry("pause"), "/games-number-racing.html?profile=1764998591846");
    }
}
