use anyhow::{Result, bail};
use clap::Args;
use serde::Serialize;
use std::io::{self, Write};
use std::path::Path;

use spira_core::SpiraProvider;
use spira_core::model::artifact::ArtifactKey;
use spira_core::model::detail::ArtifactDetail;

use crate::cmd::{RefreshArgs, load_configured, populate};
use crate::output::{CliError, OutputMode, pretty_kv, pretty_rule, pretty_section, render_error, render_mode};

#[derive(Args, Debug)]
pub struct ShowArgs {
    /// Artifact key, `TOKEN:ID` (e.g. `TK:42`, `IN:7`, `RQ:3`).
    pub key: String,

    #[command(flatten)]
    pub refresh: RefreshArgs,
}

#[derive(Debug, Serialize)]
struct ShowView {
    key: String,
    #[serde(flatten)]
    detail: ArtifactDetail,
}

fn write_text(view: &ShowView, w: &mut dyn Write) -> io::Result<()> {
    for line in &view.detail.lines {
        writeln!(w, "{line}")?;
    }
    if let Some(url) = &view.detail.url {
        writeln!(w, "{url}")?;
    }
    Ok(())
}

fn write_pretty(view: &ShowView, w: &mut dyn Write) -> io::Result<()> {
    pretty_section(w, &view.key)?;
    for line in &view.detail.lines {
        writeln!(w, "{line}")?;
    }
    if let Some(url) = &view.detail.url {
        pretty_rule(w)?;
        pretty_kv(w, "Open", url)?;
    }
    Ok(())
}

pub fn run_show(args: &ShowArgs, config_flag: Option<&Path>, output: OutputMode) -> Result<()> {
    let key = match args.key.parse::<ArtifactKey>() {
        Ok(key) => key,
        Err(err) => {
            render_error(output, &CliError::from_code(err.code(), err.to_string()))?;
            bail!("{err}");
        }
    };

    let config = load_configured(config_flag, output)?;
    let mut provider = SpiraProvider::connect(config);
    populate(&mut provider, args.refresh, output)?;

    let detail = provider.detail(&key.to_string())?;
    if !detail.found {
        tracing::info!(%key, "artifact not in the current tree");
    }
    let view = ShowView {
        key: key.to_string(),
        detail,
    };
    render_mode(output, &view, write_text, write_pretty)
}

#[cfg(test)]
mod tests {
    use super::*;
    use spira_core::model::detail::NO_INFORMATION;

    #[test]
    fn not_found_text_is_the_placeholder() {
        let view = ShowView {
            key: "TK:9".into(),
            detail: ArtifactDetail::not_found(),
        };
        let mut buf = Vec::new();
        write_text(&view, &mut buf).expect("write");
        assert_eq!(String::from_utf8(buf).expect("utf8"), format!("{NO_INFORMATION}\n"));

        let json = serde_json::to_value(&view).expect("serialize");
        assert_eq!(json["found"], false);
        assert_eq!(json["key"], "TK:9");
        assert!(json.get("url").is_none());
    }
}
