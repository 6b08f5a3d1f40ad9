//! Game API commands

use clap::Args;
use std::process::ExitCode;
use std::time::Duration;

use racing_probe::{GameApi, HarnessConfig, Poller, ProfileId};

use crate::output::{self, OutputFormat};

#[derive(Args)]
pub struct HealthArgs {
    /// Keep polling up to this many attempts until the API is healthy
    #[arg(long)]
    pub wait: Option<u32>,

    /// Delay between attempts when waiting
    #[arg(long, default_value = "1000")]
    pub delay_ms: u64,
}

#[derive(Args)]
pub struct ProfilesArgs {
    /// Show a single profile
    #[arg(long)]
    pub id: Option<String>,
}

fn client(config: &HarnessConfig) -> anyhow::Result<GameApi> {
    Ok(GameApi::from_config(&config.api, &config.session.base_url)?)
}

pub async fn health(args: HealthArgs, config: &HarnessConfig, format: OutputFormat) -> anyhow::Result<ExitCode> {
    let api = client(config)?;

    let health = match args.wait {
        Some(attempts) => {
            api.wait_for_healthy(Poller::new(attempts, Duration::from_millis(args.delay_ms)))
                .await
        }
        None => api.health().await,
    };

    match (health, format) {
        (Ok(health), OutputFormat::Json) => {
            output::print_json(&health);
            Ok(if health.is_ok() { ExitCode::SUCCESS } else { ExitCode::from(1) })
        }
        (Ok(health), OutputFormat::Table) if health.is_ok() => {
            output::print_success(&format!("Game API is healthy at {}", config.api_base()));
            Ok(ExitCode::SUCCESS)
        }
        (Ok(health), OutputFormat::Table) => {
            output::print_error(&format!("Game API reports status '{}'", health.status));
            Ok(ExitCode::from(1))
        }
        (Err(e), _) => {
            output::print_error(&format!("Game API is not responding at {}: {}", config.api_base(), e));
            Ok(ExitCode::from(1))
        }
    }
}

pub async fn profiles(args: ProfilesArgs, config: &HarnessConfig, format: OutputFormat) -> anyhow::Result<ExitCode> {
    let api = client(config)?;

    match args.id {
        Some(id) => {
            let id = ProfileId::from(id.as_str());
            match api.profile(&id).await? {
                Some(profile) => {
                    output::print_list(std::slice::from_ref(&profile), format);
                    Ok(ExitCode::SUCCESS)
                }
                None => {
                    output::print_error(&format!("Profile {} not found", id));
                    Ok(ExitCode::from(1))
                }
            }
        }
        None => {
            let profiles = api.profiles().await?;
            output::print_list(&profiles, format);
            Ok(ExitCode::SUCCESS)
        }
    }
}
