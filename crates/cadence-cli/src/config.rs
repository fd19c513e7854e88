use std::{
    fs,
    path::{Path, PathBuf},
    time::Duration,
};

use cadence_task::SchedulerSettings;
use color_eyre::Result;
use dirs::config_dir;
use serde::{Deserialize, Serialize};

/// User-level configuration loaded from `~/.config/cadence/config.toml` (platform-specific).
#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq, Eq)]
#[serde(default)]
pub struct Config {
    /// Override for the data directory holding tasks and preferences.
    pub data_dir: Option<PathBuf>,
    pub alarms: AlarmConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(default)]
pub struct AlarmConfig {
    /// Seconds between alarm checks.
    pub tick_seconds: u64,
    /// Minutes around the due time in which a reminder may fire.
    pub window_minutes: i64,
    /// Sound clip played with each notification; unset for silence.
    pub sound: Option<String>,
    /// When false, reminders fall back to plain terminal messages.
    pub desktop_notifications: bool,
}

impl Default for AlarmConfig {
    fn default() -> Self {
        let defaults = SchedulerSettings::default();
        Self {
            tick_seconds: defaults.alarm_tick.as_secs(),
            window_minutes: defaults.alarm_window_minutes,
            sound: defaults.sound,
            desktop_notifications: true,
        }
    }
}

impl AlarmConfig {
    pub fn scheduler_settings(&self) -> SchedulerSettings {
        SchedulerSettings {
            alarm_tick: Duration::from_secs(self.tick_seconds.max(1)),
            alarm_window_minutes: self.window_minutes.max(0),
            sound: self.sound.clone(),
        }
    }
}

/// Load config from the default path; if missing, return defaults.
pub fn load() -> Result<Config> {
    let path = default_path()?;
    load_from_path(path)
}

/// Load config from a given path; if missing or empty, return defaults.
pub fn load_from_path(path: impl AsRef<Path>) -> Result<Config> {
    let path = path.as_ref();
    if !path.exists() {
        return Ok(Config::default());
    }
    let contents = fs::read_to_string(path)?;
    if contents.trim().is_empty() {
        return Ok(Config::default());
    }
    let cfg: Config = toml::from_str(&contents)?;
    Ok(cfg)
}

/// Resolve the default config path (platform aware).
pub fn default_path() -> Result<PathBuf> {
    let base = config_dir().ok_or_else(|| color_eyre::eyre::eyre!("no config dir available"))?;
    Ok(base.join("cadence").join("config.toml"))
}

/// Write the given config to the default path unless a file is already there.
pub fn write_default_if_missing(config: &Config) -> Result<PathBuf> {
    write_if_missing(config, &default_path()?)
}

fn write_if_missing(config: &Config, path: &Path) -> Result<PathBuf> {
    if path.exists() {
        return Ok(path.to_path_buf());
    }
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let body = toml::to_string_pretty(config)?;
    fs::write(path, body)?;
    Ok(path.to_path_buf())
}
