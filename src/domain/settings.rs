use crate::domain::profiles::DeviceNames;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// Highest slot id the virtual joystick driver exposes.
pub const MAX_DEVICE_SLOT: u32 = 16;

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("could not determine config directory")]
    NoConfigDir,
    #[error("failed to access settings file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid settings file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("device slot {0} is outside 1..=16")]
    InvalidSlot(u32),
    #[error("sensitivity for axis {axis} must be a positive number, got {value}")]
    InvalidSensitivity { axis: char, value: f64 },
    #[error("{0} must be greater than zero")]
    Zero(&'static str),
    #[error("device name for {0} is empty")]
    EmptyDeviceName(&'static str),
    #[error("device name {0:?} is used by more than one controller family")]
    DuplicateDeviceName(String),
}

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
    "rhythm_controller_feeder".to_string()
}
fn default_rotation() -> String {
    "daily".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    // Output
    #[serde(default = "default_device_slot")]
    pub device_slot: u32,

    // Axis calibration
    #[serde(default = "default_sensitivity")]
    pub sensitivity_x: f64,
    #[serde(default = "default_sensitivity")]
    pub sensitivity_y: f64,
    #[serde(default = "default_false")]
    pub digital_mode: bool,

    // BLE
    #[serde(default = "default_operation_timeout_ms")]
    pub operation_timeout_ms: u64,
    #[serde(default = "default_notification_queue_capacity")]
    pub notification_queue_capacity: usize,
    #[serde(default = "default_false")]
    pub rescan_on_disconnect: bool,
    #[serde(default)]
    pub device_names: DeviceNames,

    // Logging Settings
    #[serde(default)]
    pub log_settings: LogSettings,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            device_slot: default_device_slot(),
            sensitivity_x: default_sensitivity(),
            sensitivity_y: default_sensitivity(),
            digital_mode: false,
            operation_timeout_ms: default_operation_timeout_ms(),
            notification_queue_capacity: default_notification_queue_capacity(),
            rescan_on_disconnect: false,
            device_names: DeviceNames::default(),
            log_settings: LogSettings::default(),
        }
    }
}

fn default_device_slot() -> u32 {
    1
}
fn default_sensitivity() -> f64 {
    1.0
}
fn default_operation_timeout_ms() -> u64 {
    10_000
}
fn default_notification_queue_capacity() -> usize {
    64
}

impl Settings {
    pub fn sensitivity(&self) -> [f64; 2] {
        [self.sensitivity_x, self.sensitivity_y]
    }

    pub fn operation_timeout(&self) -> Duration {
        Duration::from_millis(self.operation_timeout_ms)
    }

    /// Reject values the feeder cannot run with.
    pub fn validate(&self) -> Result<(), SettingsError> {
        if !(1..=MAX_DEVICE_SLOT).contains(&self.device_slot) {
            return Err(SettingsError::InvalidSlot(self.device_slot));
        }

        for (axis, value) in [('X', self.sensitivity_x), ('Y', self.sensitivity_y)] {
            if !value.is_finite() || value <= 0.0 {
                return Err(SettingsError::InvalidSensitivity { axis, value });
            }
        }

        if self.operation_timeout_ms == 0 {
            return Err(SettingsError::Zero("operation_timeout_ms"));
        }
        if self.notification_queue_capacity == 0 {
            return Err(SettingsError::Zero("notification_queue_capacity"));
        }

        let names = &self.device_names;
        let mut seen = HashSet::new();
        for (label, name) in [
            ("iidx", &names.iidx),
            ("sdvx", &names.sdvx),
            ("popn", &names.popn),
            ("gitadora", &names.gitadora),
        ] {
            if name.is_empty() {
                return Err(SettingsError::EmptyDeviceName(label));
            }
            if !seen.insert(name.as_str()) {
                return Err(SettingsError::DuplicateDeviceName(name.clone()));
            }
        }

        Ok(())
    }
}

pub struct SettingsService {
    settings: Settings,
    settings_path: PathBuf,
}

impl SettingsService {
    /// Load from the default location. A missing file yields defaults.
    pub fn new() -> Result<Self, SettingsError> {
        let settings_path = Self::default_settings_path()?;
        Self::from_path(settings_path)
    }

    /// Load from `settings_path`. A missing file yields defaults.
    pub fn from_path(settings_path: PathBuf) -> Result<Self, SettingsError> {
        let settings = if settings_path.exists() {
            Self::load_from_file(&settings_path)?
        } else {
            Settings::default()
        };

        Ok(Self {
            settings,
            settings_path,
        })
    }

    pub fn default_settings_path() -> Result<PathBuf, SettingsError> {
        let mut path = dirs::config_dir().ok_or(SettingsError::NoConfigDir)?;
        path.push("RhythmControllerFeeder");
        path.push("settings.json");
        Ok(path)
    }

    fn load_from_file(path: &Path) -> Result<Settings, SettingsError> {
        let contents = fs::read_to_string(path).map_err(|source| SettingsError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&contents).map_err(|source| SettingsError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn save(&self) -> Result<(), SettingsError> {
        let io_error = |source| SettingsError::Io {
            path: self.settings_path.clone(),
            source,
        };

        if let Some(parent) = self.settings_path.parent() {
            fs::create_dir_all(parent).map_err(io_error)?;
        }
        let json = serde_json::to_string_pretty(&self.settings).map_err(|source| {
            SettingsError::Parse {
                path: self.settings_path.clone(),
                source,
            }
        })?;
        fs::write(&self.settings_path, json).map_err(io_error)
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
