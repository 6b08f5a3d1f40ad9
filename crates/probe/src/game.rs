//! Number Racing page model: URLs, button locators and text markers

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::OnceLock;

use crate::api::ProfileId;
use crate::locator::Locator;

/// Profile the diagnostic runs load by default
pub const DEFAULT_PROFILE_ID: u64 = 1764998591846;

/// Local-storage key holding an unfinished race
pub const RACE_IN_PROGRESS_KEY: &str = "raceInProgress";

/// Interval of the in-race auto-save
pub const AUTO_SAVE_INTERVAL_MS: u64 = 5_000;

/// Selector of the three answer buttons under a task
pub const ANSWER_GRID: &str = ".grid.grid-cols-3 button";

/// Markup signature of the addition/subtraction task icon
pub const ADD_SUB_ICON_MARKER: &str = "viewBox=\"0 0 100 60\"";

pub const PAUSE_TITLE: &str = "Пауза";
pub const PAUSE_PROGRESS: &str = "Прогресс:";
pub const CONTINUE_RACE_PROMPT: &str = "Продолжить гонку?";
pub const CORRECT_MARK: &str = "🎉";
pub const WRONG_MARK: &str = "🙈";
pub const VICTORY_TEXT: &str = "ПОБЕДА";
pub const TROPHY: &str = "🏆";
pub const LOCKED_CAR: &str = "🔒";
pub const LOADING_CAR: &str = "🏎️";

/// Game pages served next to the marketplace
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum GamePage {
    Marketplace,
    NumberRacing,
    NumberIsland,
    Reading,
}

impl GamePage {
    pub fn path(&self) -> &'static str {
        match self {
            GamePage::Marketplace => "/",
            GamePage::NumberRacing => "/games-number-racing.html",
            GamePage::NumberIsland => "/games-number-island.html",
            GamePage::Reading => "/games-reading.html",
        }
    }

    /// Page path with an optional `profile=<id>` query
    pub fn url(&self, profile: Option<&ProfileId>) -> String {
        match profile {
            Some(id) => format!("{}?profile={}", self.path(), id),
            None => self.path().to_string(),
        }
    }

    pub fn all() -> [GamePage; 4] {
        [
            GamePage::Marketplace,
            GamePage::NumberRacing,
            GamePage::NumberIsland,
            GamePage::Reading,
        ]
    }
}

impl fmt::Display for GamePage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            GamePage::Marketplace => "marketplace",
            GamePage::NumberRacing => "number-racing",
            GamePage::NumberIsland => "number-island",
            GamePage::Reading => "reading",
        })
    }
}

pub fn start_button() -> Locator {
    Locator::button("▶️")
}

pub fn pause_button() -> Locator {
    Locator::button("⏸️")
}

pub fn garage_button() -> Locator {
    Locator::button("🚗")
}

pub fn stats_button() -> Locator {
    Locator::button("📊")
}

/// Back button of the menu and garage screens
pub fn back_button() -> Locator {
    Locator::button("← Назад")
}

/// The stats screen has its own back button
pub fn stats_back_button() -> Locator {
    Locator::button("◀️")
}

pub fn resume_button() -> Locator {
    Locator::button("Продолжить")
}

pub fn exit_to_menu_button() -> Locator {
    Locator::button("Выйти в меню")
}

pub fn answer_buttons() -> Locator {
    Locator::css(ANSWER_GRID)
}

pub fn any_button() -> Locator {
    Locator::css("button")
}

/// Number line under the task; its first mark is 0
pub fn number_line() -> Locator {
    Locator::css_with_text("div", "0")
}

/// Learning stages in the order the game unlocks them
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum LearningStage {
    CountToThree = 1,
    CompareNumbers = 2,
    Sequences = 3,
    AddSub = 4,
}

impl LearningStage {
    pub fn all() -> [LearningStage; 4] {
        [
            LearningStage::CountToThree,
            LearningStage::CompareNumbers,
            LearningStage::Sequences,
            LearningStage::AddSub,
        ]
    }

    pub fn from_number(n: u8) -> Option<Self> {
        Self::all().into_iter().find(|s| s.number() == n)
    }

    pub fn number(&self) -> u8 {
        *self as u8
    }

    /// Indicator text on the menu screen
    pub fn label(&self) -> &'static str {
        match self {
            LearningStage::CountToThree => "Считаем до 3",
            LearningStage::CompareNumbers => "Сравниваем числа",
            LearningStage::Sequences => "Последовательности",
            LearningStage::AddSub => "Сложение и вычитание",
        }
    }

    pub fn indicator(&self) -> Locator {
        Locator::exact_text(self.label())
    }
}

impl fmt::Display for LearningStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "stage {} ({})", self.number(), self.label())
    }
}

/// The `raceInProgress` blob the game auto-saves
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SavedRace {
    pub progress: Option<f64>,
    pub stars: Option<u32>,
    pub correct: Option<u32>,
    pub wrong: Option<u32>,
    pub errors: Option<u32>,
    pub streak: Option<u32>,
    pub timestamp: Option<u64>,
    pub learning_stage: Option<u8>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Operator {
    Plus,
    Minus,
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Operator::Plus => "+",
            Operator::Minus => "−",
        })
    }
}

/// Operator shown in an addition/subtraction task icon, if the page shows one.
///
/// `Some(None)` means the task icon is present but its operator is not.
pub fn detect_add_sub(html: &str) -> Option<Option<Operator>> {
    if !html.contains(ADD_SUB_ICON_MARKER) {
        return None;
    }

    static OPERATOR: OnceLock<Option<Regex>> = OnceLock::new();
    let re = OPERATOR.get_or_init(|| Regex::new(r">\s*([+\-−])\s*<").ok());

    let op = re.as_ref().and_then(|re| {
        re.captures_iter(html).find_map(|caps| match &caps[1] {
            "+" => Some(Operator::Plus),
            "-" | "−" => Some(Operator::Minus),
            _ => None,
        })
    });
    Some(op)
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test_case(GamePage::Marketplace, None, "/" ; "marketplace")]
    #[test_case(GamePage::NumberRacing, None, "/games-number-racing.html" ; "racing without profile")]
    #[test_case(GamePage::Reading, Some(1764998591846), "/games-reading.html?profile=1764998591846" ; "reading with profile")]
    fn test_page_urls(page: GamePage, profile: Option<u64>, expected: &str) {
        let profile = profile.map(ProfileId::from);
        assert_eq!(page.url(profile.as_ref()), expected);
    }

    #[test]
    fn test_stage_labels() {
        assert_eq!(LearningStage::from_number(1), Some(LearningStage::CountToThree));
        assert_eq!(LearningStage::from_number(4).unwrap().label(), "Сложение и вычитание");
        assert_eq!(LearningStage::from_number(5), None);
        assert_eq!(
            LearningStage::CountToThree.indicator().selector(),
            "text=\"Считаем до 3\""
        );
    }

    #[test]
    fn test_saved_race_partial() {
        let race: SavedRace =
            serde_json::from_str(r#"{"progress": 50.0, "stars": 3, "learningStage": 2}"#).unwrap();
        assert_eq!(race.progress, Some(50.0));
        assert_eq!(race.learning_stage, Some(2));
        assert!(race.streak.is_none());
    }

    #[test_case(r#"<svg viewBox="0 0 100 60"><text>+</text></svg>"#, Some(Some(Operator::Plus)) ; "addition")]
    #[test_case(r#"<svg viewBox="0 0 100 60"><text>−</text></svg>"#, Some(Some(Operator::Minus)) ; "unicode minus")]
    #[test_case(r#"<svg viewBox="0 0 100 60"><text>-</text></svg>"#, Some(Some(Operator::Minus)) ; "ascii minus")]
    #[test_case(r#"<svg viewBox="0 0 100 60"><circle/></svg>"#, Some(None) ; "icon without operator")]
    #[test_case(r#"<svg viewBox="0 0 24 24"><text>+</text></svg>"#, None ; "other icon")]
    fn test_detect_add_sub(html: &str, expected: Option<Option<Operator>>) {
        assert_eq!(detect_add_sub(html), expected);
    }
}
