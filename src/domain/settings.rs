use crate::domain::models::ClockStyle;
use crate::infrastructure::bluetooth::connection::ConnectionConfig;
use crate::infrastructure::bluetooth::protocol::MAX_WRITE_LEN;
use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::fs;
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
    pub show_thread_ids: bool,
    #[serde(default = "default_true")]
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
            show_thread_ids: default_false(),
            show_target: default_true(),
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
    "idot_display".to_string()
}
fn default_rotation() -> String {
    "daily".to_string()
}

/// Clock face preferences applied when syncing the clock.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClockSettings {
    #[serde(default)]
    pub style: ClockStyle,
    #[serde(default = "default_true")]
    pub show_date: bool,
    #[serde(default = "default_true")]
    pub hour24: bool,
    /// `"R,G,B"`; unset leaves every channel at zero.
    #[serde(default)]
    pub colour: Option<String>,
}

impl Default for ClockSettings {
    fn default() -> Self {
        Self {
            style: ClockStyle::default(),
            show_date: true,
            hour24: true,
            colour: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    /// MAC address of the display, e.g. `"AA:BB:CC:DD:EE:FF"`.
    #[serde(default)]
    pub target_address: Option<String>,

    // BLE Settings
    /// Maximum scan time in seconds; 0 scans until found or interrupted.
    #[serde(default)]
    pub scan_timeout_secs: u64,
    #[serde(default = "default_max_write_len")]
    pub max_write_len: usize,
    #[serde(default)]
    pub write_timeout_ms: Option<u64>,

    // Display Settings
    #[serde(default)]
    pub clock: ClockSettings,
    /// When set, the image is shown instead of syncing the clock.
    #[serde(default)]
    pub image_file: Option<PathBuf>,

    // Logging Settings
    #[serde(default)]
    pub log_settings: LogSettings,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            target_address: None,
            scan_timeout_secs: 0,
            max_write_len: default_max_write_len(),
            write_timeout_ms: None,
            clock: ClockSettings::default(),
            image_file: None,
            log_settings: LogSettings::default(),
        }
    }
}

fn default_max_write_len() -> usize {
    MAX_WRITE_LEN
}

impl Settings {
    pub fn connection_config(&self) -> ConnectionConfig {
        ConnectionConfig {
            max_scan_time: (self.scan_timeout_secs > 0)
                .then(|| Duration::from_secs(self.scan_timeout_secs)),
            max_write_len: self.max_write_len,
            write_timeout: self.write_timeout_ms.map(Duration::from_millis),
        }
    }
}

pub struct SettingsService {
    settings: Settings,
    settings_path: PathBuf,
}

impl SettingsService {
    pub fn new() -> anyhow::Result<Self> {
        let settings_path = Self::get_settings_path()?;
        Ok(Self::open(settings_path))
    }

    /// Load settings from an explicit path, falling back to defaults when the
    /// file is missing or unreadable.
    pub fn open(settings_path: PathBuf) -> Self {
        let settings = match Self::load_from_file(&settings_path) {
            Ok(settings) => settings,
            Err(e) => {
                tracing::debug!("Using default settings: {:#}", e);
                Settings::default()
            }
        };

        Self {
            settings,
            settings_path,
        }
    }

    fn get_settings_path() -> anyhow::Result<PathBuf> {
        let mut path = dirs::config_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not determine config directory"))?;
        path.push("iDotDisplay");
        fs::create_dir_all(&path)
            .with_context(|| format!("creating config directory {}", path.display()))?;
        path.push("settings.json");
        Ok(path)
    }

    fn load_from_file(path: &Path) -> anyhow::Result<Settings> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("reading {}", path.display()))?;
        let settings = serde_json::from_str(&contents)
            .with_context(|| format!("parsing {}", path.display()))?;
        Ok(settings)
    }

    pub fn save(&self) -> anyhow::Result<()> {
        let json = serde_json::to_string_pretty(&self.settings)?;
        fs::write(&self.settings_path, json)
            .with_context(|| format!("writing {}", self.settings_path.display()))?;
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

    /// Remember the display address for the next run.
    pub fn set_target_address(&mut self, address: &str) -> anyhow::Result<()> {
        if self.settings.target_address.as_deref() != Some(address) {
            self.settings.target_address = Some(address.to_string());
            self.save()?;
        }
        Ok(())
    }
}
