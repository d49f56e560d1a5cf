pub mod completions;
pub mod config;
pub mod new_task;
pub mod projects;
pub mod show;
pub mod tree;
pub mod verify;
pub mod watch;

use anyhow::{Result, bail};
use clap::Args;
use std::path::Path;
use std::time::Duration;

use spira_core::SpiraProvider;
use spira_core::config::{SpiraConfig, resolve_config};
use spira_core::error::ErrorCode;

use crate::output::{CliError, OutputMode, render_error};

/// Shared flags for commands that populate the tree before answering.
#[derive(Args, Debug, Clone, Copy)]
pub struct RefreshArgs {
    /// Seconds to wait for all three collections.
    #[arg(long, default_value_t = 30)]
    pub timeout_secs: u64,
}

impl RefreshArgs {
    pub const fn timeout(self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Effective config that has credentials, or a rendered error.
pub fn load_configured(config_flag: Option<&Path>, output: OutputMode) -> Result<SpiraConfig> {
    let config = match resolve_config(config_flag) {
        Ok(config) => config,
        Err(err) => {
            render_error(
                output,
                &CliError::from_code(ErrorCode::ConfigParseError, format!("{err:#}")),
            )?;
            return Err(err);
        }
    };

    if !config.is_configured() {
        render_error(
            output,
            &CliError::from_code(
                ErrorCode::NotConfigured,
                "url, username and api key must all be set",
            ),
        )?;
        bail!("{}", ErrorCode::NotConfigured.message());
    }
    Ok(config)
}

/// One explicit refresh, waited on. Fails when the cycle does not settle or
/// any collection could not be fetched.
pub fn populate(provider: &mut SpiraProvider, refresh: RefreshArgs, output: OutputMode) -> Result<()> {
    provider.refresh(true);
    if !provider.wait_settled(refresh.timeout()) {
        render_error(
            output,
            &CliError::from_code(
                ErrorCode::FetchFailed,
                format!("Spira did not answer within {}s", refresh.timeout_secs),
            ),
        )?;
        bail!("{}", ErrorCode::FetchFailed.message());
    }

    let failed = provider.failed_categories();
    if !failed.is_empty() {
        let names: Vec<_> = failed.iter().map(|category| category.collection()).collect();
        render_error(
            output,
            &CliError::from_code(
                ErrorCode::FetchFailed,
                format!("failed to fetch {}", names.join(", ")),
            ),
        )?;
        bail!("{}", ErrorCode::FetchFailed.message());
    }
    Ok(())
}
