use anyhow::Result;
use chrono::{DateTime, Local, Utc};
use clap::Args;
use serde::Serialize;
use std::io::{self, Write};
use std::path::Path;

use spira_core::sync::CycleId;
use spira_core::{Artifact, Category, SpiraProvider};

use crate::cmd::{RefreshArgs, load_configured, populate};
use crate::output::{OutputMode, pretty_kv, pretty_section, render_mode};

#[derive(Args, Debug)]
pub struct TreeArgs {
    #[command(flatten)]
    pub refresh: RefreshArgs,
}

/// One published generation, shaped for output.
#[derive(Debug, Serialize)]
pub struct TreeView {
    pub generation: CycleId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub refreshed_at: Option<DateTime<Utc>>,
    pub headers: Vec<HeaderView>,
}

#[derive(Debug, Serialize)]
pub struct HeaderView {
    pub label: String,
    pub category: Category,
    pub expandable: bool,
    pub items: Vec<ItemView>,
}

#[derive(Debug, Serialize)]
pub struct ItemView {
    pub key: String,
    pub label: String,
    pub tooltip: String,
    #[serde(flatten)]
    pub artifact: Artifact,
}

impl TreeView {
    pub fn from_provider(provider: &SpiraProvider) -> Self {
        let headers = provider
            .children(None)
            .into_iter()
            .map(|header| HeaderView {
                label: header.label(),
                category: header.category(),
                expandable: header.expandable(),
                items: provider
                    .children(Some(&header))
                    .into_iter()
                    .map(|artifact| ItemView {
                        key: artifact.composite_key(),
                        label: artifact.label(),
                        tooltip: artifact.tooltip(),
                        artifact,
                    })
                    .collect(),
            })
            .collect();

        Self {
            generation: provider.snapshot().generation(),
            refreshed_at: provider.last_published(),
            headers,
        }
    }
}

fn write_lines(view: &TreeView, w: &mut dyn Write) -> io::Result<()> {
    for header in &view.headers {
        writeln!(w, "{}", header.label)?;
        for item in &header.items {
            writeln!(w, "  {}", item.label)?;
        }
    }
    Ok(())
}

fn write_pretty(view: &TreeView, w: &mut dyn Write) -> io::Result<()> {
    pretty_section(w, "Spira artifacts")?;
    pretty_kv(w, "Generation", view.generation.to_string())?;
    if let Some(at) = view.refreshed_at {
        let local: DateTime<Local> = at.into();
        pretty_kv(w, "Refreshed", local.format("%Y-%m-%d %H:%M:%S").to_string())?;
    }
    writeln!(w)?;
    if view.headers.is_empty() {
        writeln!(w, "(nothing to show)")?;
    }
    write_lines(view, w)
}

pub fn print_tree(view: &TreeView, output: OutputMode) -> Result<()> {
    render_mode(output, view, write_lines, write_pretty)
}

pub fn run_tree(args: &TreeArgs, config_flag: Option<&Path>, output: OutputMode) -> Result<()> {
    let config = load_configured(config_flag, output)?;
    let mut provider = SpiraProvider::connect(config);
    populate(&mut provider, args.refresh, output)?;
    print_tree(&TreeView::from_provider(&provider), output)
}
