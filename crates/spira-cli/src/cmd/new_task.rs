use anyhow::{Result, bail};
use clap::Args;
use serde::Serialize;
use std::io::{self, Write};
use std::path::Path;

use spira_core::SpiraProvider;
use spira_core::client::SpiraClient;
use spira_core::error::ErrorCode;
use spira_core::model::project::find_project;

use crate::cmd::{RefreshArgs, load_configured, populate};
use crate::output::{CliError, OutputMode, render, render_error};

#[derive(Args, Debug)]
pub struct NewTaskArgs {
    /// Name of the new task.
    #[arg(long)]
    pub name: String,

    /// Project name or id.
    #[arg(long)]
    pub project: String,

    #[command(flatten)]
    pub refresh: RefreshArgs,
}

#[derive(Debug, Serialize)]
struct Created {
    key: String,
    name: String,
    project_id: i64,
    project: String,
    owner_id: i64,
    in_tree: bool,
}

fn write_created(created: &Created, w: &mut dyn Write) -> io::Result<()> {
    writeln!(w, "✓ New task beamed up: {} - [{}]", created.name, created.key)?;
    if !created.in_tree {
        writeln!(w, "  (not in the refreshed tree yet)")?;
    }
    Ok(())
}

pub fn run_new_task(args: &NewTaskArgs, config_flag: Option<&Path>, output: OutputMode) -> Result<()> {
    let config = load_configured(config_flag, output)?;
    let client = SpiraClient::new(config.credentials.clone());

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
    let Some(project) = find_project(&projects, &args.project) else {
        render_error(
            output,
            &CliError::with_details(
                format!("project '{}' not found", args.project),
                "use `spira projects` to see available projects",
                ErrorCode::ArtifactNotFound.code(),
            ),
        )?;
        bail!("project '{}' not found", args.project);
    };

    let owner_id = match client.current_user_id() {
        Ok(id) => id,
        Err(err) => {
            render_error(
                output,
                &CliError::from_code(
                    ErrorCode::TaskCreateFailed,
                    format!("failed to look up user '{}': {err}", config.credentials.username),
                ),
            )?;
            return Err(err.into());
        }
    };

    let task = match client.create_task(project.project_id, owner_id, &args.name) {
        Ok(task) => task,
        Err(err) => {
            render_error(output, &CliError::from_code(err.code(), err.to_string()))?;
            return Err(err.into());
        }
    };

    let mut provider = SpiraProvider::connect(config);
    populate(&mut provider, args.refresh, output)?;

    let created = Created {
        key: task.composite_key(),
        name: task.display_name().to_string(),
        project_id: project.project_id,
        project: project.name.clone(),
        owner_id,
        in_tree: provider.lookup("TK", task.item_id()).is_some(),
    };
    render(output, &created, write_created)
}
