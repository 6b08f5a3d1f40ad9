//! Output formatting for the CLI

use clap::ValueEnum;
use colored::Colorize;
use comfy_table::{presets::UTF8_FULL, Cell, Color, ContentArrangement, Table};
use serde::Serialize;

use racing_probe::api::Profile;
use racing_probe::checks::CheckStatus;
use racing_probe::{Phase, ScenarioResult, SuiteResult};

#[derive(Debug, Clone, Copy, ValueEnum, Default)]
pub enum OutputFormat {
    /// Human-readable tables
    #[default]
    Table,
    Json,
}

/// Items that can be displayed as one table row
pub trait TableDisplay {
    fn headers() -> Vec<&'static str>;
    fn row(&self) -> Vec<Cell>;
}

/// One line of `racing-probe list`
#[derive(Debug, Serialize)]
pub struct ScenarioRow {
    pub name: String,
    pub kind: &'static str,
    pub tags: Vec<String>,
    pub description: String,
}

impl TableDisplay for ScenarioRow {
    fn headers() -> Vec<&'static str> {
        vec!["Name", "Kind", "Tags", "Description"]
    }

    fn row(&self) -> Vec<Cell> {
        vec![
            Cell::new(&self.name),
            Cell::new(self.kind),
            Cell::new(self.tags.join(", ")),
            Cell::new(&self.description),
        ]
    }
}

impl TableDisplay for ScenarioResult {
    fn headers() -> Vec<&'static str> {
        vec!["Scenario", "Result", "Phase", "Checks", "Duration", "Detail"]
    }

    fn row(&self) -> Vec<Cell> {
        let result = if self.success {
            Cell::new("PASS").fg(Color::Green)
        } else if self.phase == Phase::TimedOut {
            Cell::new("TIMEOUT").fg(Color::Yellow)
        } else {
            Cell::new("FAIL").fg(Color::Red)
        };

        let passed = self.checks.iter().filter(|c| c.status == CheckStatus::Pass).count();
        let checks = format!("{}/{} ok, {} warn", passed, self.checks.len(), self.warnings());

        let detail = self
            .error
            .clone()
            .or_else(|| self.first_failure().map(|c| format!("{}: {}", c.name, c.detail)))
            .unwrap_or_default();

        vec![
            Cell::new(&self.name),
            result,
            Cell::new(format!("{:?}", self.phase)),
            Cell::new(checks),
            Cell::new(format!("{:.1}s", self.duration_ms as f64 / 1000.0)),
            Cell::new(detail),
        ]
    }
}

impl TableDisplay for Profile {
    fn headers() -> Vec<&'static str> {
        vec!["ID", "Name", "Stars", "Stage", "Difficulty"]
    }

    fn row(&self) -> Vec<Cell> {
        let (stage, difficulty) = match &self.number_racing_data {
            Some(data) => (data.learning_stage.to_string(), data.difficulty.to_string()),
            None => ("-".to_string(), "-".to_string()),
        };
        vec![
            Cell::new(self.id.to_string()),
            Cell::new(&self.name),
            Cell::new(self.stars),
            Cell::new(stage),
            Cell::new(difficulty),
        ]
    }
}

pub fn print_list<T: Serialize + TableDisplay>(items: &[T], format: OutputFormat) {
    match format {
        OutputFormat::Table => {
            if items.is_empty() {
                println!("No items found.");
                return;
            }

            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic);

            table.set_header(T::headers());
            for item in items {
                table.add_row(item.row());
            }

            println!("{table}");
        }
        OutputFormat::Json => print_json(items),
    }
}

pub fn print_json<T: Serialize + ?Sized>(value: &T) {
    println!("{}", serde_json::to_string_pretty(value).unwrap_or_default());
}

/// Per-scenario table followed by a one-line summary
pub fn print_suite(suite: &SuiteResult, format: OutputFormat) {
    match format {
        OutputFormat::Table => {
            print_list(&suite.results, format);
            let summary = format!(
                "{} passed, {} failed, {} timed out ({:.1}s)",
                suite.passed,
                suite.failed,
                suite.timed_out,
                suite.duration_ms as f64 / 1000.0
            );
            if suite.all_passed() {
                print_success(&summary);
            } else {
                print_error(&summary);
            }
        }
        OutputFormat::Json => print_json(suite),
    }
}

pub fn print_success(message: &str) {
    println!("{} {}", "✓".green().bold(), message);
}

pub fn print_error(message: &str) {
    eprintln!("{} {}", "✗".red().bold(), message);
}

pub fn print_warning(message: &str) {
    println!("{} {}", "!".yellow().bold(), message);
}
