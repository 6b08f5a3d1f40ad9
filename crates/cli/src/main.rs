//! racing-probe - browser probes for the Number Racing games

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;

mod commands;
mod output;

use commands::{api, scenarios};
use racing_probe::playwright::Browser;
use racing_probe::{HarnessConfig, ProfileId};

#[derive(Parser)]
#[command(name = "racing-probe")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Harness configuration file (YAML)
    #[arg(long, env = "RACING_PROBE_CONFIG", global = true)]
    config: Option<PathBuf>,

    /// Base URL of the deployed games
    #[arg(long, env = "RACING_PROBE_BASE_URL", global = true)]
    base_url: Option<String>,

    /// Profile id appended as `profile=<id>`
    #[arg(long, global = true)]
    profile: Option<String>,

    /// Directory for test-results.json and screenshots
    #[arg(long, global = true)]
    output: Option<PathBuf>,

    /// Show the browser window
    #[arg(long, global = true)]
    headed: bool,

    /// Delay before every browser action, in milliseconds
    #[arg(long, global = true)]
    slow_mo: Option<u64>,

    /// chromium, firefox or webkit
    #[arg(long, global = true)]
    browser: Option<Browser>,

    /// Output format
    #[arg(long, default_value = "table", global = true)]
    format: output::OutputFormat,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List built-in and declarative scenarios
    List(scenarios::ListArgs),

    /// Run scenarios in a real browser
    Run(scenarios::RunArgs),

    /// Check the game API health endpoint
    Health(api::HealthArgs),

    /// List profiles or show one
    Profiles(api::ProfilesArgs),
}

impl Cli {
    /// File configuration with command-line overrides applied
    fn harness_config(&self) -> anyhow::Result<HarnessConfig> {
        let mut config = match &self.config {
            Some(path) => HarnessConfig::from_yaml_file(path)?,
            None => HarnessConfig::default(),
        };

        if let Some(url) = &self.base_url {
            config.session.base_url = url.clone();
        }
        if let Some(profile) = &self.profile {
            config.session.profile = Some(ProfileId::from(profile.as_str()));
        }
        if let Some(dir) = &self.output {
            config.set_output_dir(dir.clone());
        }
        if self.headed {
            config.playwright.headless = false;
        }
        if let Some(ms) = self.slow_mo {
            config.playwright.slow_mo_ms = ms;
        }
        if let Some(browser) = self.browser {
            config.playwright.browser = browser;
        }

        Ok(config)
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let log_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level)),
        )
        .with_target(false)
        .init();

    match dispatch(cli).await {
        Ok(code) => code,
        Err(e) => {
            output::print_error(&format!("{:#}", e));
            ExitCode::from(2)
        }
    }
}

async fn dispatch(cli: Cli) -> anyhow::Result<ExitCode> {
    let config = cli.harness_config()?;

    match cli.command {
        Commands::List(args) => scenarios::list(args, &config, cli.format),
        Commands::Run(args) => scenarios::run(args, &config, cli.format).await,
        Commands::Health(args) => api::health(args, &config, cli.format).await,
        Commands::Profiles(args) => api::profiles(args, &config, cli.format).await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_is_well_formed() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_flags_override_defaults() {
        let cli = Cli::try_parse_from([
            "racing-probe",
            "--base-url",
            "http://localhost:8081/",
            "--profile",
            "42",
            "--output",
            "out",
            "--headed",
            "--browser",
            "firefox",
            "run",
            "pause",
            "--tag",
            "race",
        ])
        .unwrap();

        let config = cli.harness_config().unwrap();
        assert_eq!(config.session.base_url, "http://localhost:8081/");
        assert_eq!(config.session.profile, Some(ProfileId::Number(42)));
        assert_eq!(config.session.evidence_dir, PathBuf::from("out/screenshots"));
        assert!(!config.playwright.headless);
        assert_eq!(config.playwright.browser, Browser::Firefox);

        match cli.command {
            Commands::Run(args) => {
                assert_eq!(args.names, vec!["pause".to_string()]);
                assert_eq!(args.tag.as_deref(), Some("race"));
            }
            _ => panic!("expected run"),
        }
    }
}
