use anyhow::Result;
use serde::Serialize;
use std::io::{self, Write};
use std::path::Path;

use spira_core::client::SpiraClient;
use spira_core::error::ErrorCode;
use spira_core::model::project::Project;

use crate::cmd::load_configured;
use crate::output::{CliError, OutputMode, Renderable, render_error, render_list};

#[derive(Debug, Serialize)]
#[serde(transparent)]
struct ProjectRow(Project);

impl Renderable for ProjectRow {
    fn render_human(&self, w: &mut dyn Write) -> io::Result<()> {
        writeln!(w, "{:>5}  {}", self.0.project_id, self.0.name)
    }

    fn render_table(&self, w: &mut dyn Write) -> io::Result<()> {
        writeln!(w, "{}\t{}", self.0.project_id, self.0.name)
    }

    fn table_headers() -> &'static [&'static str] {
        &["ID", "NAME"]
    }
}

pub fn run_projects(config_flag: Option<&Path>, output: OutputMode) -> Result<()> {
    let config = load_configured(config_flag, output)?;
    let client = SpiraClient::new(config.credentials);

    let projects = match client.projects() {
        Ok(projects) => projects,
        Err(err) => {
            render_error(
                output,
                &CliError::from_code(ErrorCode::FetchFailed, format!("failed to list projects: {err}")),
            )?;
            return Err(err.into());
        }
    };

    let rows: Vec<_> = projects.into_iter().map(ProjectRow).collect();
    render_list(&rows, output)
}
