use std::path::Path;

use anyhow::Result;
use spira_core::client::SpiraClient;
use spira_core::error::ErrorCode;

use crate::cmd::load_configured;
use crate::output::{CliError, OutputMode, render_error, render_success};

/// Check that the configured credentials can read the project list.
///
/// # Errors
///
/// Returns an error when the server rejects or cannot be reached.
pub fn run_verify(config_flag: Option<&Path>, output: OutputMode) -> Result<()> {
    let config = load_configured(config_flag, output)?;
    let url = config.credentials.url.clone();
    let client = SpiraClient::new(config.credentials);

    match client.verify() {
        Ok(count) => {
            tracing::debug!(%url, projects = count, "credentials accepted");
            render_success(output, &format!("credentials valid for {url} ({count} projects)"))
        }
        Err(err) => {
            render_error(
                output,
                &CliError::from_code(
                    ErrorCode::FetchFailed,
                    format!("Spira rejected the credentials: {err}"),
                ),
            )?;
            Err(err.into())
        }
    }
}
