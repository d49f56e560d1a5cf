use anyhow::{Context, Result, anyhow, bail};
use clap::{Args, Subcommand};
use serde_json::json;
use std::path::{Path, PathBuf};
use toml::Value;

use spira_core::config::{KNOWN_KEYS, SpiraConfig, resolve_config, resolve_config_path};

use crate::output::OutputMode;

#[derive(Args, Debug)]
pub struct ConfigArgs {
    #[command(subcommand)]
    command: ConfigCommand,
}

#[derive(Subcommand, Debug)]
enum ConfigCommand {
    /// Show the effective configuration (api key redacted)
    Show(ShowArgs),
    /// Set a configuration key in the config file
    Set(SetArgs),
    /// Remove a configuration key from the config file
    Unset(UnsetArgs),
}

#[derive(Args, Debug)]
struct ShowArgs {
    /// Show the raw config file instead of the effective values
    #[arg(long)]
    raw: bool,
}

#[derive(Args, Debug)]
struct SetArgs {
    /// Dot path key (e.g. credentials.url, refresh.refresh_time)
    key: String,

    /// New value
    value: String,
}

#[derive(Args, Debug)]
struct UnsetArgs {
    /// Dot path key (e.g. view.show_incidents)
    key: String,
}

pub fn run_config(args: &ConfigArgs, config_flag: Option<&Path>, output: OutputMode) -> Result<()> {
    match &args.command {
        ConfigCommand::Show(show) => run_show(show, config_flag, output),
        ConfigCommand::Set(set) => run_set(set, config_flag, output),
        ConfigCommand::Unset(unset) => run_unset(unset, config_flag, output),
    }
}

fn config_path(config_flag: Option<&Path>) -> Result<PathBuf> {
    resolve_config_path(config_flag).ok_or_else(|| anyhow!("Unable to resolve user config directory"))
}

fn run_show(args: &ShowArgs, config_flag: Option<&Path>, output: OutputMode) -> Result<()> {
    let path = config_path(config_flag)?;

    if args.raw {
        let mut value = load_toml_table(&path)?;
        redact_table(&mut value);
        print_toml_or_json(&value, output);
        return Ok(());
    }

    let effective = resolve_config(Some(&path))?.redacted();
    print_effective(&effective, &path, output)
}

fn run_set(args: &SetArgs, config_flag: Option<&Path>, output: OutputMode) -> Result<()> {
    let path = config_path(config_flag)?;
    let mut value = load_toml_table(&path)?;
    apply_set(&mut value, &args.key, &args.value)?;
    write_toml_table(&path, &value)?;
    tracing::debug!(key = %args.key, path = %path.display(), "config key set");
    render_mutation(output, "set", &path, &args.key)
}

fn run_unset(args: &UnsetArgs, config_flag: Option<&Path>, output: OutputMode) -> Result<()> {
    let path = config_path(config_flag)?;
    let mut value = load_toml_table(&path)?;
    apply_unset(&mut value, &args.key)?;
    write_toml_table(&path, &value)?;
    render_mutation(output, "unset", &path, &args.key)
}

fn apply_set(root: &mut Value, key: &str, raw: &str) -> Result<()> {
    let parsed = parse_value(key, raw)?;
    let (section, leaf) = split_known_key(key)?;

    let table = root
        .as_table_mut()
        .ok_or_else(|| anyhow!("Config root must be a TOML table"))?;

    let section_entry = table
        .entry(section.to_string())
        .or_insert_with(|| Value::Table(toml::map::Map::new()));

    let section_table = section_entry
        .as_table_mut()
        .ok_or_else(|| anyhow!("Section {section} must be a TOML table"))?;

    section_table.insert(leaf.to_string(), parsed);
    Ok(())
}

fn apply_unset(root: &mut Value, key: &str) -> Result<()> {
    let (section, leaf) = split_known_key(key)?;
    let table = root
        .as_table_mut()
        .ok_or_else(|| anyhow!("Config root must be a TOML table"))?;

    if let Some(section_entry) = table.get_mut(section)
        && let Some(section_table) = section_entry.as_table_mut()
    {
        section_table.remove(leaf);
        if section_table.is_empty() {
            table.remove(section);
        }
    }

    Ok(())
}

fn split_known_key(key: &str) -> Result<(&str, &str)> {
    if !KNOWN_KEYS.contains(&key) {
        bail!(
            "Unsupported key `{key}`; expected one of: {}",
            KNOWN_KEYS.join(", ")
        );
    }
    key.split_once('.')
        .ok_or_else(|| anyhow!("Key must use section.key format"))
}

fn parse_value(key: &str, raw: &str) -> Result<Value> {
    let (section, _) = split_known_key(key)?;

    match section {
        "credentials" => Ok(Value::String(raw.trim().to_string())),
        "refresh" => {
            let seconds: i64 = raw
                .trim()
                .parse()
                .with_context(|| format!("{key} expects whole seconds"))?;
            Ok(Value::Integer(seconds))
        }
        _ => {
            let value: bool = raw
                .trim()
                .parse()
                .with_context(|| format!("{key} expects true or false"))?;
            Ok(Value::Boolean(value))
        }
    }
}

fn redact_table(root: &mut Value) {
    if let Some(key) = root
        .get_mut("credentials")
        .and_then(|credentials| credentials.get_mut("api_key"))
    {
        *key = Value::String("********".to_string());
    }
}

fn load_toml_table(path: &Path) -> Result<Value> {
    if !path.exists() {
        return Ok(Value::Table(toml::map::Map::new()));
    }

    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;

    let value: Value =
        toml::from_str(&content).with_context(|| format!("Failed to parse {}", path.display()))?;

    if !value.is_table() {
        bail!("{} must contain a top-level TOML table", path.display());
    }

    Ok(value)
}

fn write_toml_table(path: &Path, value: &Value) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }

    let serialized = toml::to_string_pretty(value)?;
    std::fs::write(path, serialized).with_context(|| format!("Failed to write {}", path.display()))
}

fn print_toml_or_json(value: &Value, output: OutputMode) {
    match output {
        OutputMode::Json => match serde_json::to_string_pretty(value) {
            Ok(json) => println!("{json}"),
            Err(_) => println!("{{}}"),
        },
        OutputMode::Text | OutputMode::Pretty => {
            println!("{}", toml::to_string_pretty(value).unwrap_or_default());
        }
    }
}

fn print_effective(value: &SpiraConfig, path: &Path, output: OutputMode) -> Result<()> {
    match output {
        OutputMode::Json => {
            println!(
                "{}",
                serde_json::to_string_pretty(&json!({
                    "path": path.display().to_string(),
                    "configured": value.is_configured(),
                    "config": value,
                }))?
            );
        }
        OutputMode::Text => {
            println!("path={}", path.display());
            for key in KNOWN_KEYS {
                println!("{key}={}", value.get(key).unwrap_or_default());
            }
        }
        OutputMode::Pretty => {
            println!("# {}", path.display());
            print!("{}", toml::to_string_pretty(value)?);
        }
    }
    Ok(())
}

fn render_mutation(output: OutputMode, action: &str, path: &Path, key: &str) -> Result<()> {
    match output {
        OutputMode::Json => {
            println!(
                "{}",
                serde_json::to_string_pretty(&json!({
                    "ok": true,
                    "action": action,
                    "path": path.display().to_string(),
                    "key": key,
                }))?
            );
        }
        OutputMode::Text => {
            println!("ok=true action={action} key={key}");
        }
        OutputMode::Pretty => {
            println!("{} {} in {}", action_to_title(action), key, path.display());
        }
    }
    Ok(())
}

fn action_to_title(action: &str) -> &'static str {
    match action {
        "set" => "Set",
        "unset" => "Unset",
        _ => "Updated",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn empty() -> Value {
        Value::Table(toml::map::Map::new())
    }

    #[test]
    fn set_creates_section_and_typed_values() {
        let mut root = empty();
        apply_set(&mut root, "credentials.url", " https://demo/Spira ").expect("set url");
        apply_set(&mut root, "refresh.refresh_time", "15").expect("set refresh");
        apply_set(&mut root, "view.show_tasks", "false").expect("set view");

        assert_eq!(root["credentials"]["url"].as_str(), Some("https://demo/Spira"));
        assert_eq!(root["refresh"]["refresh_time"].as_integer(), Some(15));
        assert_eq!(root["view"]["show_tasks"].as_bool(), Some(false));

        let parsed: SpiraConfig = root.try_into().expect("valid config");
        assert!(!parsed.view.show_tasks);
        assert!(parsed.view.show_incidents);
    }

    #[test]
    fn unset_removes_empty_sections() {
        let mut root = empty();
        apply_set(&mut root, "view.show_incidents", "false").expect("set");
        apply_unset(&mut root, "view.show_incidents").expect("unset");
        assert!(root.get("view").is_none());
    }

    #[test]
    fn rejects_unknown_keys_and_bad_values() {
        let mut root = empty();
        assert!(apply_set(&mut root, "view.show_epics", "true").is_err());
        assert!(apply_set(&mut root, "refresh.refresh_time", "often").is_err());
        assert!(apply_set(&mut root, "view.show_tasks", "yes").is_err());
        assert!(apply_unset(&mut root, "nope").is_err());
    }

    #[test]
    fn raw_view_masks_api_key() {
        let mut root = empty();
        apply_set(&mut root, "credentials.api_key", "{SECRET}").expect("set");
        redact_table(&mut root);
        assert_eq!(root["credentials"]["api_key"].as_str(), Some("********"));
    }

    #[test]
    fn write_then_load_round_trips_through_disk() {
        let dir = tempfile::tempdir().expect("temp dir");
        let path = dir.path().join("nested/config.toml");
        let mut root = empty();
        apply_set(&mut root, "credentials.username", "fredbloggs").expect("set");
        write_toml_table(&path, &root).expect("write");
        let loaded = load_toml_table(&path).expect("load");
        assert_eq!(loaded["credentials"]["username"].as_str(), Some("fredbloggs"));
    }
}
