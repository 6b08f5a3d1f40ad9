//! Learning stage indicator and stage 4 task icons

use async_trait::async_trait;
use tracing::info;

use super::{answer, start_race, Scenario};
use crate::error::E2eResult;
use crate::game::{self, GamePage, LearningStage, Operator};
use crate::session::{Session, SessionConfig};

/// Questions answered while looking for addition/subtraction tasks
const MAX_ADD_SUB_QUESTIONS: u32 = 50;

/// How long the first task is watched before the page is checked again
const OBSERVE_MS: u64 = 5_000;

/// Record which stage label the menu shows; a fresh profile must be on stage 1
pub(super) async fn check_stage_indicator(session: &mut Session) -> E2eResult<Option<LearningStage>> {
    for stage in LearningStage::all() {
        if session.is_visible(&stage.indicator()).await? {
            session
                .checks()
                .expect(stage == LearningStage::CountToThree, "learning stage", stage.to_string());
            return Ok(Some(stage));
        }
    }
    session.checks().warn("learning stage", "no stage indicator found");
    Ok(None)
}

pub struct StageCheck;

#[async_trait]
impl Scenario for StageCheck {
    fn name(&self) -> &str {
        "stage-check"
    }

    fn description(&self) -> &str {
        "Menu shows the profile's learning stage and the first task renders"
    }

    fn tags(&self) -> Vec<&str> {
        vec!["stage"]
    }

    fn entry(&self, config: &SessionConfig) -> String {
        GamePage::NumberRacing.url(config.profile.as_ref())
    }

    async fn run(&self, session: &mut Session) -> E2eResult<()> {
        session.settle(3_000).await;

        let stage = check_stage_indicator(session).await?;
        info!(stage = ?stage, "stage indicator");
        session.screenshot("stage_indicator").await?;

        start_race(session).await?;
        session.screenshot("first_task").await?;

        let marks = session.count(&game::number_line()).await?;
        session
            .checks()
            .hope(marks > 0, "number line", format!("{} elements showing 0", marks));

        session.settle(OBSERVE_MS).await;
        let chars = session.visible_text_len().await?;
        let min = session.config().white_screen_min_chars;
        session.checks().hope(
            chars >= min,
            "race after observation",
            format!("{} chars after {} ms", chars, OBSERVE_MS),
        );
        session.screenshot("after_observation").await?;
        Ok(())
    }
}

pub struct AddSubIcons;

#[async_trait]
impl Scenario for AddSubIcons {
    fn name(&self) -> &str {
        "addsub-icons"
    }

    fn description(&self) -> &str {
        "Addition and subtraction tasks show their operator icon and offer zero"
    }

    fn tags(&self) -> Vec<&str> {
        vec!["race", "stage"]
    }

    fn entry(&self, config: &SessionConfig) -> String {
        GamePage::NumberRacing.url(config.profile.as_ref())
    }

    async fn run(&self, session: &mut Session) -> E2eResult<()> {
        let grid = game::answer_buttons();

        session.settle(3_000).await;
        start_race(session).await?;

        let mut found_plus = false;
        let mut found_minus = false;
        let mut found_zero = false;
        let mut asked = 0;

        for question in 1..=MAX_ADD_SUB_QUESTIONS {
            asked = question;
            session.settle(800).await;

            let html = session.content().await?;
            if let Some(operator) = game::detect_add_sub(&html) {
                match operator {
                    Some(Operator::Plus) => found_plus = true,
                    Some(Operator::Minus) => found_minus = true,
                    None => {}
                }

                let options: Vec<String> = session
                    .texts(&grid)
                    .await?
                    .into_iter()
                    .map(|t| t.trim().to_string())
                    .collect();
                info!(question, operator = ?operator, ?options, "add/sub task");
                if options.iter().any(|o| o == "0") {
                    found_zero = true;
                }
                session.screenshot(&format!("addsub_detailed_{}", question)).await?;
            }

            if !session.is_visible_within(&grid, 2_000).await? {
                info!(question, "race ended");
                break;
            }
            if !answer(session, 0, question).await? {
                break;
            }
            session.settle(1_000).await;
        }

        let summary = format!("{} questions", asked);
        match (found_plus, found_minus) {
            (true, true) => session.checks().pass("add/sub icons", summary),
            (true, false) | (false, true) => session
                .checks()
                .warn("add/sub icons", format!("only one operator seen in {}", summary)),
            (false, false) => session
                .checks()
                .warn("add/sub icons", format!("stage 4 not reached in {}", summary)),
        }
        session.checks().hope(found_zero, "zero answer option", "");
        Ok(())
    }
}
