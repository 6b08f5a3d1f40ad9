//! Scenario commands

use clap::Args;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::{info, warn};

use racing_probe::{runner, scenarios};
use racing_probe::{HarnessConfig, PlaywrightLauncher, Scenario, ScenarioRunner, ScenarioSpec};

use crate::output::{self, OutputFormat, ScenarioRow};

#[derive(Args)]
pub struct ListArgs {
    /// Directory of declarative `*.yaml` scenarios
    #[arg(long)]
    pub specs: Option<PathBuf>,
}

#[derive(Args)]
pub struct RunArgs {
    /// Scenario names (default: all)
    pub names: Vec<String>,

    /// Only run scenarios carrying this tag
    #[arg(long)]
    pub tag: Option<String>,

    /// Directory of declarative `*.yaml` scenarios
    #[arg(long)]
    pub specs: Option<PathBuf>,

    /// Turn uncaught page exceptions into failures
    #[arg(long)]
    pub fail_on_page_error: bool,
}

/// Built-in scenarios followed by the declarative ones
fn catalogue(config: &HarnessConfig, specs: Option<&PathBuf>) -> anyhow::Result<(Vec<Box<dyn Scenario>>, usize)> {
    let mut all = scenarios::builtin();
    let builtin = all.len();

    if let Some(dir) = specs.or(config.runner.specs_dir.as_ref()) {
        let loaded = ScenarioSpec::load_all(dir)?;
        info!("Loaded {} declarative scenario(s) from {}", loaded.len(), dir.display());
        for spec in loaded {
            if all.iter().any(|s| s.name() == spec.name) {
                warn!("declarative scenario '{}' shadows an existing one, skipped", spec.name);
                continue;
            }
            all.push(Box::new(spec));
        }
    }

    Ok((all, builtin))
}

pub fn list(args: ListArgs, config: &HarnessConfig, format: OutputFormat) -> anyhow::Result<ExitCode> {
    let (all, builtin) = catalogue(config, args.specs.as_ref())?;

    let rows: Vec<ScenarioRow> = all
        .iter()
        .enumerate()
        .map(|(i, s)| ScenarioRow {
            name: s.name().to_string(),
            kind: if i < builtin { "built-in" } else { "yaml" },
            tags: s.tags().into_iter().map(String::from).collect(),
            description: s.description().to_string(),
        })
        .collect();

    output::print_list(&rows, format);
    Ok(ExitCode::SUCCESS)
}

pub async fn run(args: RunArgs, config: &HarnessConfig, format: OutputFormat) -> anyhow::Result<ExitCode> {
    let (all, _) = catalogue(config, args.specs.as_ref())?;
    let selected = runner::select(&all, &args.names, args.tag.as_deref())?;
    if selected.is_empty() {
        output::print_warning("No scenarios matched");
        return Ok(ExitCode::SUCCESS);
    }

    let mut runner_config = config.runner_config();
    runner_config.fail_on_page_error |= args.fail_on_page_error;

    let launcher = PlaywrightLauncher::new(config.playwright.clone());
    let runner = ScenarioRunner::new(Box::new(launcher), runner_config);

    let suite = runner.run_all(&selected).await;
    runner.write_results(&suite)?;
    output::print_suite(&suite, format);

    Ok(if suite.all_passed() {
        ExitCode::SUCCESS
    } else {
        ExitCode::from(1)
    })
}
