use crate::infrastructure::bluetooth::coordinator::CoordinatorConfig;
use crate::infrastructure::bluetooth::protocol;
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
    "senstick".to_string()
}
fn default_rotation() -> String {
    "daily".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    // Scanning
    #[serde(default = "default_scan_secs")]
    pub default_scan_secs: f64,
    #[serde(default = "default_service_uuid")]
    pub advertising_service_uuid: String,
    #[serde(default = "default_true")]
    pub filter_by_service: bool,

    // Logging Settings
    #[serde(default)]
    pub log_settings: LogSettings,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            default_scan_secs: default_scan_secs(),
            advertising_service_uuid: default_service_uuid(),
            filter_by_service: default_true(),
            log_settings: LogSettings::default(),
        }
    }
}

fn default_scan_secs() -> f64 {
    5.0
}
fn default_service_uuid() -> String {
    protocol::ADVERTISING_SERVICE_UUID.to_string()
}

impl Settings {
    /// Runtime coordinator configuration derived from these settings
    pub fn coordinator_config(&self) -> anyhow::Result<CoordinatorConfig> {
        let service_filter = if self.filter_by_service {
            vec![protocol::parse_uuid(&self.advertising_service_uuid)?]
        } else {
            Vec::new()
        };

        Ok(CoordinatorConfig {
            service_filter,
            default_scan_duration: scan_duration_from_secs(self.default_scan_secs)?,
        })
    }
}

/// Convert a user-supplied number of seconds; rejects negative, NaN,
/// infinite and out-of-range values instead of panicking
pub fn scan_duration_from_secs(secs: f64) -> anyhow::Result<Duration> {
    Duration::try_from_secs_f64(secs)
        .map_err(|_| anyhow::anyhow!("Invalid scan duration: {}", secs))
}

pub struct SettingsService {
    settings: Settings,
    settings_path: PathBuf,
}

impl SettingsService {
    pub fn new() -> anyhow::Result<Self> {
        let settings_path = Self::get_settings_path()?;
        Ok(Self::with_path(settings_path))
    }

    /// Use an explicit settings file; missing or unreadable files yield defaults
    pub fn with_path(settings_path: PathBuf) -> Self {
        let settings = Self::load_from_file(&settings_path).unwrap_or_default();
        Self {
            settings,
            settings_path,
        }
    }

    fn get_settings_path() -> anyhow::Result<PathBuf> {
        let mut path = dirs::config_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not determine config directory"))?;
        path.push("SenStick");
        fs::create_dir_all(&path)?;
        path.push("settings.json");
        Ok(path)
    }

    fn load_from_file(path: &Path) -> anyhow::Result<Settings> {
        let contents = fs::read_to_string(path)?;
        let settings = serde_json::from_str(&contents)?;
        Ok(settings)
    }

    pub fn save(&self) -> anyhow::Result<()> {
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
