use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogSettings {
    #[serde(default = "default_level")]
    pub level: String, // "trace", "debug", "info", "warn", "error"
    #[serde(default = "default_false")]
    pub file_logging_enabled: bool,
    #[serde(default = "default_true")]
    pub console_logging_enabled: bool,
    #[serde(default = "default_log_dir")]
    pub log_dir: String,
    #[serde(default = "default_prefix")]
    pub file_name_prefix: String,
    #[serde(default = "default_false")]
    pub show_file_line: bool,
    #[serde(default = "default_false")]
    pub show_target: bool,
    #[serde(default = "default_true")]
    pub ansi_colors: bool,
    #[serde(default = "default_rotation")]
    pub rotation: String, // "daily", "hourly", "minutely", "never"
}

impl Default for LogSettings {
    fn default() -> Self {
        Self {
            level: default_level(),
            file_logging_enabled: default_false(),
            console_logging_enabled: default_true(),
            log_dir: default_log_dir(),
            file_name_prefix: default_prefix(),
            show_file_line: default_false(),
            show_target: default_false(),
            ansi_colors: default_true(),
            rotation: default_rotation(),
        }
    }
}

fn default_level() -> String {
    "info".to_string()
}
fn default_true() -> bool {
    true
}
fn default_false() -> bool {
    false
}
fn default_log_dir() -> String {
    "logs".to_string()
}
fn default_prefix() -> String {
    "jimny_remote".to_string()
}
fn default_rotation() -> String {
    "daily".to_string()
}

/// Which keyboard reader drives the control loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KeyboardBackend {
    /// Key events from the controlling terminal.
    Terminal,
    /// Global key state from the OS; Windows only.
    Windows,
}

impl Default for KeyboardBackend {
    fn default() -> Self {
        if cfg!(windows) {
            Self::Windows
        } else {
            Self::Terminal
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    // BLE Settings
    #[serde(default = "default_device_address")]
    pub device_address: String,
    #[serde(default = "default_write_uuid")]
    pub write_char_uuid: String,
    #[serde(default = "default_battery_uuid")]
    pub battery_char_uuid: String,
    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,

    // Loop timing
    #[serde(default = "default_tick_interval_ms")]
    pub tick_interval_ms: u64,
    #[serde(default = "default_true")]
    pub battery_poll_enabled: bool,
    #[serde(default = "default_battery_poll_interval_ms")]
    pub battery_poll_interval_ms: u64,

    // Input Settings
    #[serde(default)]
    pub keyboard_backend: KeyboardBackend,
    /// Without key release events, a press this soon after the previous one
    /// is taken as auto-repeat and holds the key.
    #[serde(default = "default_key_hold_timeout_ms")]
    pub key_hold_timeout_ms: u64,

    // Logging Settings
    #[serde(default)]
    pub log_settings: LogSettings,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            device_address: default_device_address(),
            write_char_uuid: default_write_uuid(),
            battery_char_uuid: default_battery_uuid(),
            connect_timeout_ms: default_connect_timeout_ms(),
            tick_interval_ms: default_tick_interval_ms(),
            battery_poll_enabled: true,
            battery_poll_interval_ms: default_battery_poll_interval_ms(),
            keyboard_backend: KeyboardBackend::default(),
            key_hold_timeout_ms: default_key_hold_timeout_ms(),
            log_settings: LogSettings::default(),
        }
    }
}

impl Settings {
    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms.max(1))
    }

    pub fn battery_poll_interval(&self) -> Duration {
        Duration::from_millis(self.battery_poll_interval_ms.max(1))
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    pub fn key_hold_timeout(&self) -> Duration {
        Duration::from_millis(self.key_hold_timeout_ms)
    }
}

fn default_device_address() -> String {
    "9B947988-8931-F761-091F-026912A95ECE".to_string()
}
fn default_write_uuid() -> String {
    "4fbbffe3-c59c-478d-bb99-d6e06367e344".to_string()
}
fn default_battery_uuid() -> String {
    "00002a19-0000-1000-8000-00805f9b34fb".to_string()
}
fn default_connect_timeout_ms() -> u64 {
    10_000
}
fn default_tick_interval_ms() -> u64 {
    100
}
fn default_battery_poll_interval_ms() -> u64 {
    10_000
}
fn default_key_hold_timeout_ms() -> u64 {
    550
}

pub struct SettingsService {
    settings: Settings,
    settings_path: PathBuf,
}

impl SettingsService {
    /// Load from the per-user config directory, falling back to defaults
    /// when there is no settings file yet.
    pub fn new() -> anyhow::Result<Self> {
        let settings_path = Self::get_settings_path()?;
        Self::from_path(settings_path)
    }

    /// Load from an explicit file. A missing file yields defaults; a file that
    /// cannot be read or parsed is an error, so it is never overwritten by
    /// a later `save`.
    pub fn from_path(settings_path: PathBuf) -> anyhow::Result<Self> {
        let settings = match fs::read_to_string(&settings_path) {
            Ok(contents) => serde_json::from_str(&contents).with_context(|| {
                format!("parsing settings file {}", settings_path.display())
            })?,
            Err(e) if e.kind() == io::ErrorKind::NotFound => Settings::default(),
            Err(e) => {
                return Err(anyhow::Error::new(e)
                    .context(format!("reading settings file {}", settings_path.display())))
            }
        };

        Ok(Self {
            settings,
            settings_path,
        })
    }

    fn get_settings_path() -> anyhow::Result<PathBuf> {
        let mut path = dirs::config_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not determine config directory"))?;
        path.push("JimnyRemote");
        path.push("settings.json");
        Ok(path)
    }

    pub fn save(&self) -> anyhow::Result<()> {
        if let Some(parent) = self.settings_path.parent() {
            fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(&self.settings)?;
        fs::write(&self.settings_path, json)?;
        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.settings_path
    }

    pub fn get(&self) -> &Settings {
        &self.settings
    }

    pub fn get_mut(&mut self) -> &mut Settings {
        &mut self.settings
    }
}
