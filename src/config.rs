//! Configuration management for Hotkey Trainer
//!
//! Settings are read from a platform-specific TOML file. A missing file
//! means defaults; a malformed one is an error.
//!
//! ## Config File Locations
//!
//! | Platform | Path |
//! |----------|------|
//! | Linux | `~/.config/hotkey-trainer/config.toml` |
//! | macOS | `~/Library/Application Support/hotkey-trainer/config.toml` |
//! | Windows | `%APPDATA%\hotkey-trainer\config.toml` |
//!
//! ## Example
//!
//! ```no_run
//! use hotkey_trainer::Config;
//!
//! let mut config = Config::load().unwrap_or_default();
//! config.capture.toggle = "ctrl+alt+f12".to_string();
//! config.save().expect("Failed to save config");
//! ```

use crate::keyboard::Quirks;
use crate::practice::MatcherSettings;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// Error type for configuration operations
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to determine config directory
    #[error("Could not determine config directory")]
    NoConfigDir,
    /// IO error reading or writing config file
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
    /// Failed to parse config file
    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),
    /// Failed to serialize config
    #[error("Serialize error: {0}")]
    Serialize(#[from] toml::ser::Error),
}

/// Returns the path to the config file, creating its directory if needed
pub fn config_path() -> Result<PathBuf, ConfigError> {
    let config_dir = dirs::config_dir().ok_or(ConfigError::NoConfigDir)?;
    let app_dir = config_dir.join("hotkey-trainer");

    if !app_dir.exists() {
        fs::create_dir_all(&app_dir)?;
    }

    Ok(app_dir.join("config.toml"))
}

/// Default output channel: `~/hotkey-trainer/captured_keys.txt`
pub fn default_output_path() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join("hotkey-trainer")
        .join("captured_keys.txt")
}

/// Main application configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct Config {
    #[serde(default)]
    pub capture: CaptureConfig,
    #[serde(default)]
    pub practice: PracticeConfig,
}

/// Capture process settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct CaptureConfig {
    /// Combination that switches capture on and off
    pub toggle: String,
    /// Output channel location; `None` uses [`default_output_path`]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_path: Option<PathBuf>,
    /// Upper bound on waiting for the writer when capture turns off
    pub close_timeout_ms: u64,
    /// How long the capture loop waits for input before re-checking shutdown
    pub poll_interval_ms: u64,
    /// Drop `fn` reported together with arrow keys
    pub fn_arrow_quirk: bool,
    /// Read `fn` + page-up/page-down/home/end as arrows
    pub fn_page_nav_quirk: bool,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            toggle: "cmd+shift+-".to_string(),
            output_path: None,
            close_timeout_ms: 500,
            poll_interval_ms: 5,
            fn_arrow_quirk: true,
            fn_page_nav_quirk: true,
        }
    }
}

impl CaptureConfig {
    pub fn output_path(&self) -> PathBuf {
        self.output_path.clone().unwrap_or_else(default_output_path)
    }

    pub fn close_timeout(&self) -> Duration {
        Duration::from_millis(self.close_timeout_ms)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms.max(1))
    }

    pub fn quirks(&self) -> Quirks {
        Quirks {
            fn_arrows: self.fn_arrow_quirk,
            fn_page_nav_to_arrows: self.fn_page_nav_quirk,
        }
    }
}

/// Practice session settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct PracticeConfig {
    /// Pause between chord steps that counts as a hesitation
    pub hesitation_ms: u64,
    /// Give up on an attempt after this many seconds; 0 disables
    pub attempt_timeout_secs: u64,
    /// Maximum gap between the two skips of an abort; 0 means any gap
    pub abort_window_ms: u64,
    /// How often the output channel is checked for new tokens
    pub poll_interval_ms: u64,
}

impl Default for PracticeConfig {
    fn default() -> Self {
        Self {
            hesitation_ms: 1500,
            attempt_timeout_secs: 0,
            abort_window_ms: 0,
            poll_interval_ms: 20,
        }
    }
}

impl PracticeConfig {
    pub fn matcher_settings(&self) -> MatcherSettings {
        MatcherSettings {
            hesitation: Duration::from_millis(self.hesitation_ms),
            attempt_timeout: (self.attempt_timeout_secs > 0)
                .then(|| Duration::from_secs(self.attempt_timeout_secs)),
            abort_window: (self.abort_window_ms > 0)
                .then(|| Duration::from_millis(self.abort_window_ms)),
        }
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms.max(1))
    }
}

impl Config {
    /// Load configuration from the default config file.
    ///
    /// Returns the default configuration if the file doesn't exist.
    pub fn load() -> Result<Self, ConfigError> {
        let path = config_path()?;

        if !path.exists() {
            return Ok(Self::default());
        }

        Self::load_from(&path)
    }

    /// Load configuration from a specific path.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path)?;
        let config: Config = toml::from_str(&contents)?;
        Ok(config)
    }

    /// Save configuration to the default config file.
    pub fn save(&self) -> Result<(), ConfigError> {
        let path = config_path()?;
        self.save_to(&path)
    }

    /// Save configuration to a specific path.
    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        let contents = toml::to_string_pretty(self)?;
        fs::write(path, contents)?;
        Ok(())
    }
}
