//! Scenarios that play a race

use async_trait::async_trait;
use tracing::{debug, info};

use super::{answer, check_js_errors, start_race, wait_for_render, Scenario, RENDER_SETTLE_MS};
use crate::error::{E2eError, E2eResult};
use crate::game::{self, GamePage, LearningStage, SavedRace};
use crate::locator::Locator;
use crate::session::{Session, SessionConfig};

/// The first-task crash left a handful of characters on screen
const FIRST_TASK_MIN_CHARS: usize = 10;

/// Answers a race needs at most before the finish screen
const MAX_FINISH_QUESTIONS: u32 = 10;

pub struct FirstTask;

#[async_trait]
impl Scenario for FirstTask {
    fn name(&self) -> &str {
        "first-task"
    }

    fn description(&self) -> &str {
        "Answering the first task does not white-screen the race"
    }

    fn tags(&self) -> Vec<&str> {
        vec!["race", "white-screen"]
    }

    fn entry(&self, _config: &SessionConfig) -> String {
        GamePage::NumberRacing.url(None)
    }

    async fn run(&self, session: &mut Session) -> E2eResult<()> {
        wait_for_render(session, RENDER_SETTLE_MS).await?;
        start_race(session).await?;
        session.screenshot("before_answer").await?;

        let options = session.texts(&game::answer_buttons()).await?;
        match options.first() {
            Some(first) => {
                info!(button = %first.trim(), "clicking first answer");
                answer(session, 0, 1).await?;
                session.settle(3_000).await;
            }
            None => session.checks().warn("answer buttons", "no answer buttons found"),
        }

        session.screenshot("after_answer").await?;
        let chars = session
            .ensure_not_white_screen("white_screen_after_answer", FIRST_TASK_MIN_CHARS)
            .await?;
        session
            .checks()
            .pass("page after first answer", format!("{} chars", chars));

        check_js_errors(session, true);
        Ok(())
    }
}

pub struct AnswerScenarios;

#[async_trait]
impl Scenario for AnswerScenarios {
    fn name(&self) -> &str {
        "answer-scenarios"
    }

    fn description(&self) -> &str {
        "Three wrong answers then a different one keep the race on screen"
    }

    fn tags(&self) -> Vec<&str> {
        vec!["race", "white-screen"]
    }

    fn entry(&self, _config: &SessionConfig) -> String {
        GamePage::NumberRacing.url(None)
    }

    async fn run(&self, session: &mut Session) -> E2eResult<()> {
        let grid = game::answer_buttons();

        wait_for_render(session, RENDER_SETTLE_MS).await?;
        start_race(session).await?;

        for attempt in 1..=3u32 {
            if session.count(&grid).await? == 0 {
                session
                    .checks()
                    .warn(format!("wrong attempt {}", attempt), "no answer buttons");
                break;
            }
            if !answer(session, 0, attempt).await? {
                break;
            }
            session.settle(1_500).await;
            let chars = session
                .expect_content(&format!("white_screen_attempt_{}", attempt))
                .await?;
            session
                .checks()
                .pass(format!("screen after attempt {}", attempt), format!("{} chars", chars));
        }

        if session.count(&grid).await? > 1 && answer(session, 1, 4).await? {
            session.settle(RENDER_SETTLE_MS).await;
            let chars = session.expect_content("white_screen_after_correct").await?;
            session
                .checks()
                .pass("screen after second button", format!("{} chars", chars));
        }

        session.screenshot("scenario1_end").await?;
        check_js_errors(session, false);
        Ok(())
    }
}

pub struct Pause;

#[async_trait]
impl Scenario for Pause {
    fn name(&self) -> &str {
        "pause"
    }

    fn description(&self) -> &str {
        "Pause menu, resume, auto-save of the race and the continue-race prompt"
    }

    fn tags(&self) -> Vec<&str> {
        vec!["race", "pause"]
    }

    fn entry(&self, config: &SessionConfig) -> String {
        GamePage::NumberRacing.url(config.profile.as_ref())
    }

    async fn run(&self, session: &mut Session) -> E2eResult<()> {
        let start = game::start_button();
        let pause = game::pause_button();

        session.settle(3_000).await;
        if !session.is_visible_within(&start, 5_000).await? {
            return Err(E2eError::AssertionFailed("menu did not load".into()));
        }
        session.checks().pass("menu loaded", "");

        start_race(session).await?;
        if !session.is_visible_within(&game::answer_buttons(), 3_000).await? {
            return Err(E2eError::AssertionFailed("race screen did not load".into()));
        }
        session.checks().pass("race started", "");

        for question in 1..=3u32 {
            if !answer(session, 0, question).await? {
                break;
            }
            session.settle(1_200).await;
            debug!(question, "answered");
        }

        if session.is_visible(&pause).await? {
            session.click(&pause).await?;
            session.settle(1_000).await;

            if session.is_visible(&Locator::text(game::PAUSE_TITLE)).await? {
                session.checks().pass("pause menu", "");
                let stats = session.is_visible(&Locator::text(game::PAUSE_PROGRESS)).await?;
                session.checks().hope(stats, "pause stats", "");
                session.screenshot("pause_menu").await?;

                let resume = game::resume_button();
                if session.is_visible(&resume).await? {
                    session.click(&resume).await?;
                    session.settle(1_000).await;
                    session.checks().pass("race resumed", "");
                } else {
                    session.checks().fail("race resumed", "resume button missing");
                }
            } else {
                session.checks().fail("pause menu", "not displayed");
            }
        } else {
            session.checks().fail("pause button", "not found");
        }

        session.settle(game::AUTO_SAVE_INTERVAL_MS + 1_000).await;
        match session.read_local_storage(game::RACE_IN_PROGRESS_KEY).await? {
            Some(value) => match serde_json::from_value::<SavedRace>(value) {
                Ok(race) => {
                    let stage = race
                        .learning_stage
                        .and_then(LearningStage::from_number)
                        .map(|s| s.to_string())
                        .unwrap_or_else(|| "stage unknown".to_string());
                    session.checks().pass(
                        "auto-save",
                        format!(
                            "progress {:.1}%, {} stars, {}",
                            race.progress.unwrap_or_default(),
                            race.stars.unwrap_or_default(),
                            stage
                        ),
                    );
                }
                Err(e) => session
                    .checks()
                    .fail("auto-save", format!("raceInProgress is not a saved race: {}", e)),
            },
            None => session
                .checks()
                .warn("auto-save", "no raceInProgress yet"),
        }

        if session.is_visible(&pause).await? {
            session.click(&pause).await?;
            session.settle(1_000).await;

            let exit = game::exit_to_menu_button();
            if session.is_visible(&exit).await? {
                session.click(&exit).await?;
                session.settle(RENDER_SETTLE_MS).await;

                let on_menu = session.is_visible(&start).await?;
                session.checks().expect(on_menu, "exit to menu", "");
                if on_menu {
                    let prompt = Locator::text(game::CONTINUE_RACE_PROMPT);
                    let shown = session.is_visible_within(&prompt, 2_000).await?;
                    session.checks().hope(shown, "continue race prompt", "");
                    if shown {
                        session.screenshot("continue_dialog").await?;
                    }
                }
            } else {
                session.checks().fail("exit to menu", "exit button missing");
            }
        }

        check_js_errors(session, false);
        Ok(())
    }
}

pub struct FinishScreen;

#[async_trait]
impl Scenario for FinishScreen {
    fn name(&self) -> &str {
        "finish-screen"
    }

    fn description(&self) -> &str {
        "A new profile starts on stage 1 and a won race ends on the victory screen"
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
        super::stage::check_stage_indicator(session).await?;
        session.screenshot("menu_stage1").await?;

        start_race(session).await?;

        let mut correct = 0u32;
        'questions: for question in 1..=MAX_FINISH_QUESTIONS {
            if !session.is_visible_within(&grid, 2_000).await? {
                info!(question, "race ended");
                break;
            }

            let options = session.count(&grid).await?;
            for index in 0..options {
                if !answer(session, index, question).await? {
                    break 'questions;
                }
                session.settle(1_200).await;

                if session.is_visible(&Locator::text(game::CORRECT_MARK)).await? {
                    correct += 1;
                    debug!(question, index, "correct");
                    break;
                }
                if session.is_visible(&Locator::text(game::WRONG_MARK)).await? {
                    session.settle(800).await;
                    continue;
                }
                break;
            }
        }
        info!(correct, "answers given");

        session.settle(3_000).await;
        let victory = session.is_visible(&Locator::text(game::VICTORY_TEXT)).await?
            || session.is_visible(&Locator::text(game::TROPHY)).await?;

        if victory {
            session
                .checks()
                .pass("finish screen", format!("{} correct answers", correct));
            session.screenshot("finish_screen").await?;
        } else {
            session.expect_content("finish_white_screen").await?;
            let body = session.body_text().await?;
            let preview: String = body.trim().chars().take(200).collect();
            session.checks().warn("finish screen", format!("different screen: {}", preview));
        }

        session.screenshot("final_state").await?;
        Ok(())
    }
}
