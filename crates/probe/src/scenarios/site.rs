//! Marketplace, page loading, menu navigation and profile scenarios

use async_trait::async_trait;
use serde_json::Value;
use tracing::info;

use super::{check_js_errors, wait_for_render, Scenario, RENDER_SETTLE_MS};
use crate::driver::LoadState;
use crate::error::E2eResult;
use crate::game::{self, GamePage, LearningStage};
use crate::locator::Locator;
use crate::observe::Channel;
use crate::session::{Session, SessionConfig};

const CHARACTER_CARDS: &str = r#"[class*="character"], [class*="fox"], [class*="bear"], [class*="rabbit"]"#;

/// Babel compiles the game pages in the browser
const COMPILE_SETTLE_MS: u64 = 3_000;

/// Profile data is fetched after the first render
const PROFILE_SETTLE_MS: u64 = 5_000;

pub struct Marketplace;

#[async_trait]
impl Scenario for Marketplace {
    fn name(&self) -> &str {
        "marketplace"
    }

    fn description(&self) -> &str {
        "Marketplace home, console errors, API endpoints and game pages load"
    }

    fn tags(&self) -> Vec<&str> {
        vec!["smoke", "api"]
    }

    fn entry(&self, _config: &SessionConfig) -> String {
        GamePage::Marketplace.url(None)
    }

    async fn run(&self, session: &mut Session) -> E2eResult<()> {
        session.wait_for_load_state(LoadState::NetworkIdle).await?;
        let title = session.title().await?;
        session.checks().pass("marketplace loaded", title);
        session.screenshot("01_marketplace_home").await?;

        let buttons = session.count(&game::any_button()).await?;
        session.checks().pass("buttons", format!("{} buttons", buttons));
        let characters = session.count(&Locator::css(CHARACTER_CARDS)).await?;
        session
            .checks()
            .hope(characters > 0, "character cards", format!("{} character elements", characters));

        let errors_before = session.log().total(Channel::ConsoleError);
        session.reload().await?;
        session.wait_for_load_state(LoadState::NetworkIdle).await?;
        let new_errors = session.log().total(Channel::ConsoleError).saturating_sub(errors_before);
        session.checks().hope(
            new_errors == 0,
            "console after reload",
            format!("{} console error(s)", new_errors),
        );

        let api = session.config().game_api()?;
        match api.health().await {
            Ok(health) => session
                .checks()
                .expect(health.is_ok(), "api health", format!("status {}", health.status)),
            Err(e) => session.checks().fail("api health", e.to_string()),
        }
        match api.profiles().await {
            Ok(profiles) => session
                .checks()
                .pass("api profiles", format!("{} profiles", profiles.len())),
            Err(e) => session.checks().fail("api profiles", e.to_string()),
        }

        for (page, shot) in [
            (GamePage::NumberRacing, "02_number_racing"),
            (GamePage::Reading, "03_reading_game"),
        ] {
            session.open_page(page, false).await?;
            wait_for_render(session, RENDER_SETTLE_MS).await?;
            session.screenshot(shot).await?;
            let title = session.title().await?;
            session.checks().pass(format!("{} loaded", page), title);
        }

        session.open_page(GamePage::Marketplace, false).await?;
        session.wait_for_load_state(LoadState::NetworkIdle).await?;
        for global in ["React", "ReactDOM", "Babel"] {
            let loaded = session
                .evaluate(&format!("typeof {} !== \"undefined\"", global))
                .await?;
            session
                .checks()
                .expect(loaded == Value::Bool(true), format!("{} loaded", global), "");
        }
        Ok(())
    }
}

pub struct GamePages;

#[async_trait]
impl Scenario for GamePages {
    fn name(&self) -> &str {
        "game-pages"
    }

    fn description(&self) -> &str {
        "Every game page renders, and the marketplace passes the profile on"
    }

    fn tags(&self) -> Vec<&str> {
        vec!["smoke", "pages"]
    }

    fn entry(&self, _config: &SessionConfig) -> String {
        GamePage::Marketplace.url(None)
    }

    async fn run(&self, session: &mut Session) -> E2eResult<()> {
        wait_for_render(session, RENDER_SETTLE_MS).await?;
        session.screenshot("main").await?;
        let html = session.content().await?;
        session.checks().hope(html.contains("root"), "react root", "");

        session.open_page(GamePage::NumberRacing, false).await?;
        wait_for_render(session, COMPILE_SETTLE_MS).await?;
        session.screenshot("game").await?;
        expect_rendered(session, GamePage::NumberRacing).await?;

        session.open_page(GamePage::Marketplace, false).await?;
        wait_for_render(session, RENDER_SETTLE_MS).await?;
        match session.click_first_visible(&game::any_button()).await? {
            Some(index) => {
                session.settle(COMPILE_SETTLE_MS).await;
                session.screenshot("game_from_main").await?;
                let url = session.url().await?;
                info!(index, %url, "opened game from marketplace");
                session
                    .checks()
                    .hope(url.contains("profile="), "profile passed in url", url);
            }
            None => session.checks().warn("profile passed in url", "no visible button on marketplace"),
        }

        for (page, shot) in [(GamePage::NumberIsland, "island"), (GamePage::Reading, "reading")] {
            session.open_page(page, true).await?;
            wait_for_render(session, COMPILE_SETTLE_MS).await?;
            session.screenshot(shot).await?;
            expect_rendered(session, page).await?;
        }

        check_js_errors(session, true);
        Ok(())
    }
}

async fn expect_rendered(session: &mut Session, page: GamePage) -> E2eResult<()> {
    let chars = session.expect_content(&format!("{}_white_screen", page)).await?;
    let roots = session.count(&Locator::css("#root")).await?;
    session
        .checks()
        .expect(roots > 0, format!("{} rendered", page), format!("{} chars", chars));
    Ok(())
}

pub struct Navigation;

#[async_trait]
impl Scenario for Navigation {
    fn name(&self) -> &str {
        "navigation"
    }

    fn description(&self) -> &str {
        "Back buttons return from garage and stats to the menu, and from the menu to the marketplace"
    }

    fn tags(&self) -> Vec<&str> {
        vec!["menu"]
    }

    fn entry(&self, _config: &SessionConfig) -> String {
        GamePage::NumberRacing.url(None)
    }

    async fn run(&self, session: &mut Session) -> E2eResult<()> {
        let start = game::start_button();

        wait_for_render(session, RENDER_SETTLE_MS).await?;
        let on_menu = session.is_visible(&start).await?;
        session.checks().expect(on_menu, "menu screen", "start button visible");

        session.click(&game::garage_button()).await?;
        session.settle(1_000).await;
        let locks = session.count(&Locator::text(game::LOCKED_CAR)).await?;
        session
            .checks()
            .hope(locks > 0, "garage screen", format!("{} locked cars", locks));

        session.click(&game::back_button()).await?;
        session.settle(1_000).await;
        let back_on_menu = session.is_visible(&start).await?;
        if !back_on_menu {
            session.screenshot("navigation_fail").await?;
        }
        session
            .checks()
            .expect(back_on_menu, "garage back to menu", "");

        session.click(&game::back_button()).await?;
        session.settle(RENDER_SETTLE_MS).await;
        let url = session.url().await?;
        let home = session.config().resolve_url(GamePage::Marketplace.path())?;
        session.checks().expect(
            url == home || url.contains("index.html"),
            "menu back to marketplace",
            url,
        );

        session.open_page(GamePage::NumberRacing, false).await?;
        wait_for_render(session, RENDER_SETTLE_MS).await?;
        session.click(&game::stats_button()).await?;
        session.settle(1_000).await;
        session.click(&game::stats_back_button()).await?;
        session.settle(1_000).await;
        let back_from_stats = session.is_visible(&start).await?;
        session
            .checks()
            .expect(back_from_stats, "stats back to menu", "");
        Ok(())
    }
}

pub struct ProfileLoading;

#[async_trait]
impl Scenario for ProfileLoading {
    fn name(&self) -> &str {
        "profile-loading"
    }

    fn description(&self) -> &str {
        "Game opened with ?profile= renders, stops loading and the profile exists"
    }

    fn tags(&self) -> Vec<&str> {
        vec!["profile", "api"]
    }

    fn entry(&self, config: &SessionConfig) -> String {
        GamePage::NumberRacing.url(config.profile.as_ref())
    }

    async fn run(&self, session: &mut Session) -> E2eResult<()> {
        session.settle(PROFILE_SETTLE_MS).await;

        let chars = session.expect_content("profile_loading_white_screen").await?;
        session
            .checks()
            .pass("page has content", format!("{} chars", chars));
        session.screenshot("profile_loading").await?;

        let stuck = session.is_visible(&Locator::text(game::LOADING_CAR)).await?;
        session
            .checks()
            .hope(!stuck, "loading finished", "loading indicator still visible");

        let failed_requests = session.log().total(Channel::RequestFailed);
        session.checks().hope(
            failed_requests == 0,
            "network requests",
            format!("{} failed", failed_requests),
        );

        let Some(id) = session.config().profile.clone() else {
            session.checks().warn("profile in api", "no profile configured");
            return Ok(());
        };

        let profiles = match session.config().game_api()?.profiles().await {
            Ok(profiles) => profiles,
            Err(e) => {
                session.checks().fail("api profiles", e.to_string());
                return Ok(());
            }
        };
        session
            .checks()
            .pass("api profiles", format!("{} profiles", profiles.len()));

        let wanted = id.to_string();
        match profiles.into_iter().find(|p| p.id.to_string() == wanted) {
            Some(profile) => {
                session.checks().pass(
                    "profile in api",
                    format!("{} ({} stars)", profile.name, profile.stars),
                );
                match profile.number_racing_data {
                    Some(data) => {
                        let stage = LearningStage::from_number(data.learning_stage)
                            .map(|s| s.to_string())
                            .unwrap_or_else(|| format!("unknown stage {}", data.learning_stage));
                        session.checks().pass(
                            "number racing data",
                            format!("{}, difficulty {}", stage, data.difficulty),
                        );
                    }
                    None => session.checks().warn("number racing data", "missing"),
                }
            }
            None => session
                .checks()
                .warn("profile in api", format!("profile {} not found", wanted)),
        }
        Ok(())
    }
}

pub struct ProfileMenu;

#[async_trait]
impl Scenario for ProfileMenu {
    fn name(&self) -> &str {
        "profile-menu"
    }

    fn description(&self) -> &str {
        "Menu with start, garage and stats buttons after loading a profile"
    }

    fn tags(&self) -> Vec<&str> {
        vec!["profile", "smoke"]
    }

    fn entry(&self, config: &SessionConfig) -> String {
        GamePage::NumberRacing.url(config.profile.as_ref())
    }

    async fn run(&self, session: &mut Session) -> E2eResult<()> {
        session.settle(PROFILE_SETTLE_MS).await;

        let start = session.is_visible(&game::start_button()).await?;
        let garage = session.is_visible(&game::garage_button()).await?;
        let stats = session.is_visible(&game::stats_button()).await?;
        let total = session.count(&game::any_button()).await?;

        session.checks().hope(garage, "garage button", "");
        session.checks().hope(stats, "stats button", "");
        session.checks().expect(
            start && total >= 3,
            "menu screen loaded",
            format!("start visible: {}, {} buttons", start, total),
        );

        session.screenshot("profile_final").await?;
        Ok(())
    }
}
