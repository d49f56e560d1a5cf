use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::model::artifact::{Category, PerCategory};

/// Shortest allowed interval between timer-driven refreshes.
pub const MIN_REFRESH_INTERVAL: Duration = Duration::from_millis(5000);

/// Every dot-path key accepted by [`SpiraConfig::get`].
pub const KNOWN_KEYS: [&str; 7] = [
    "credentials.url",
    "credentials.username",
    "credentials.api_key",
    "refresh.refresh_time",
    "view.show_requirements",
    "view.show_tasks",
    "view.show_incidents",
];

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpiraConfig {
    #[serde(default)]
    pub credentials: CredentialsConfig,
    #[serde(default)]
    pub refresh: RefreshConfig,
    #[serde(default)]
    pub view: ViewConfig,
}

/// Opaque credentials; the api key is the "RSS Token" from the Spira profile.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CredentialsConfig {
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub api_key: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefreshConfig {
    /// Seconds between timer-driven refreshes; `0` disables the timer.
    #[serde(default = "default_refresh_time")]
    pub refresh_time: i64,
}

impl Default for RefreshConfig {
    fn default() -> Self {
        Self {
            refresh_time: default_refresh_time(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ViewConfig {
    #[serde(default = "default_true")]
    pub show_requirements: bool,
    #[serde(default = "default_true")]
    pub show_tasks: bool,
    #[serde(default = "default_true")]
    pub show_incidents: bool,
}

impl Default for ViewConfig {
    fn default() -> Self {
        Self {
            show_requirements: default_true(),
            show_tasks: default_true(),
            show_incidents: default_true(),
        }
    }
}

impl ViewConfig {
    #[must_use]
    pub const fn is_visible(&self, category: Category) -> bool {
        match category {
            Category::Requirement => self.show_requirements,
            Category::Task => self.show_tasks,
            Category::Incident => self.show_incidents,
        }
    }

    #[must_use]
    pub fn visibility(&self) -> PerCategory<bool> {
        PerCategory::from_fn(|category| self.is_visible(category))
    }
}

impl SpiraConfig {
    /// True when url, username and api key are all present.
    #[must_use]
    pub fn is_configured(&self) -> bool {
        let c = &self.credentials;
        !c.url.trim().is_empty() && !c.username.trim().is_empty() && !c.api_key.trim().is_empty()
    }

    /// Timer interval, or `None` when the timer is disabled.
    #[must_use]
    pub fn refresh_interval(&self) -> Option<Duration> {
        effective_interval(self.refresh.refresh_time)
    }

    /// Look up a value by dot path (`view.show_tasks`). The api key is
    /// returned verbatim; use [`SpiraConfig::redacted`] before display.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<String> {
        let value = match key {
            "credentials.url" => self.credentials.url.clone(),
            "credentials.username" => self.credentials.username.clone(),
            "credentials.api_key" => self.credentials.api_key.clone(),
            "refresh.refresh_time" => self.refresh.refresh_time.to_string(),
            "view.show_requirements" => self.view.show_requirements.to_string(),
            "view.show_tasks" => self.view.show_tasks.to_string(),
            "view.show_incidents" => self.view.show_incidents.to_string(),
            _ => return None,
        };
        Some(value)
    }

    /// Copy with the api key masked.
    #[must_use]
    pub fn redacted(&self) -> Self {
        let mut copy = self.clone();
        if !copy.credentials.api_key.is_empty() {
            copy.credentials.api_key = "********".to_string();
        }
        copy
    }
}

/// `max(secs * 1000ms, 5000ms)` for positive `secs`; `None` otherwise.
#[must_use]
pub fn effective_interval(refresh_time_secs: i64) -> Option<Duration> {
    if refresh_time_secs <= 0 {
        return None;
    }
    let configured = Duration::from_secs(refresh_time_secs.unsigned_abs());
    Some(configured.max(MIN_REFRESH_INTERVAL))
}

/// `$XDG_CONFIG_HOME/spira/config.toml` (or the platform equivalent).
#[must_use]
pub fn user_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("spira/config.toml"))
}

/// Config file precedence: explicit flag, `SPIRA_CONFIG`, user config dir.
#[must_use]
pub fn resolve_config_path(flag: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = flag {
        return Some(path.to_path_buf());
    }
    if let Some(path) = env::var_os("SPIRA_CONFIG").filter(|p| !p.is_empty()) {
        return Some(PathBuf::from(path));
    }
    user_config_path()
}

/// A missing file yields the defaults.
///
/// # Errors
///
/// Returns an error if the file cannot be read or is not valid TOML.
pub fn load_config(path: &Path) -> Result<SpiraConfig> {
    if !path.exists() {
        return Ok(SpiraConfig::default());
    }

    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;

    toml::from_str::<SpiraConfig>(&content)
        .with_context(|| format!("Failed to parse {}", path.display()))
}

/// Load the effective configuration: file (if any) plus environment overrides.
///
/// # Errors
///
/// Fails when the file does not parse or `SPIRA_REFRESH_TIME` is not an integer.
pub fn resolve_config(flag: Option<&Path>) -> Result<SpiraConfig> {
    let mut config = match resolve_config_path(flag) {
        Some(path) => load_config(&path)?,
        None => SpiraConfig::default(),
    };
    apply_env_overrides(&mut config, |key| env::var(key).ok())?;
    Ok(config)
}

fn apply_env_overrides(
    config: &mut SpiraConfig,
    lookup: impl Fn(&str) -> Option<String>,
) -> Result<()> {
    if let Some(url) = lookup("SPIRA_URL") {
        config.credentials.url = url;
    }
    if let Some(username) = lookup("SPIRA_USERNAME") {
        config.credentials.username = username;
    }
    if let Some(api_key) = lookup("SPIRA_API_KEY") {
        config.credentials.api_key = api_key;
    }
    if let Some(raw) = lookup("SPIRA_REFRESH_TIME") {
        config.refresh.refresh_time = raw
            .trim()
            .parse()
            .with_context(|| format!("SPIRA_REFRESH_TIME expects whole seconds, got '{raw}'"))?;
    }
    Ok(())
}

const fn default_true() -> bool {
    true
}

const fn default_refresh_time() -> i64 {
    60
}
