//! Configuration management for rawkey.
//!
//! This module provides:
//! - TOML configuration file loading from `~/.rawkey/config.toml`
//! - Conversion of the file settings into raw-mode and printer options
//!
//! # Configuration File
//!
//! ```toml
//! # Letter whose Ctrl chord quits (also accepts "ctrl-x" or "^X")
//! quit_key = "q"
//!
//! # tracing filter, overridden by RAWKEY_LOG
//! log_level = "info"
//!
//! [terminal]
//! read_timeout_ms = 100
//! output_processing = false
//!
//! [display]
//! color = true
//! show_timeouts = false
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::Context;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::core::terminal::RawModeOptions;
use crate::ui::{KeyMapper, PrinterOptions};

/// Main configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Quit chord key
    pub quit_key: String,
    /// Log filter directive
    pub log_level: String,
    /// Terminal driver settings
    pub terminal: TerminalConfig,
    /// Key echo settings
    pub display: DisplayConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            quit_key: "q".to_string(),
            log_level: "info".to_string(),
            terminal: TerminalConfig::default(),
            display: DisplayConfig::default(),
        }
    }
}

/// Terminal driver configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TerminalConfig {
    pub read_timeout_ms: u32,
    pub output_processing: bool,
}

impl Default for TerminalConfig {
    fn default() -> Self {
        Self {
            read_timeout_ms: 100,
            output_processing: false,
        }
    }
}

/// Display configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DisplayConfig {
    pub color: bool,
    pub show_timeouts: bool,
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            color: true,
            show_timeouts: false,
        }
    }
}

/// Quit chord parsed from config
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QuitKey {
    pub byte: u8,
}

impl QuitKey {
    pub fn parse(s: &str) -> Option<Self> {
        KeyMapper::parse_chord(s).map(|byte| Self { byte })
    }
}

impl Default for QuitKey {
    fn default() -> Self {
        Self {
            byte: crate::ui::ctrl_key(b'q'),
        }
    }
}

impl Config {
    /// Load configuration from `~/.rawkey/config.toml`, falling back to defaults.
    ///
    /// Runs before logging is set up, so a file that cannot be used is
    /// returned alongside the defaults for the caller to report.
    pub fn load() -> (Self, Option<anyhow::Error>) {
        match Self::get_config_path() {
            Some(path) => Self::load_or_default(&path),
            None => (Self::default(), None),
        }
    }

    /// Load `path` if it exists; defaults plus the error if it is unusable
    pub fn load_or_default(path: &Path) -> (Self, Option<anyhow::Error>) {
        if !path.exists() {
            return (Self::default(), None);
        }
        match Self::load_from(path) {
            Ok(config) => (config, None),
            Err(e) => (Self::default(), Some(e)),
        }
    }

    pub fn load_from(path: &Path) -> anyhow::Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        toml::from_str(&content).with_context(|| format!("failed to parse {}", path.display()))
    }

    /// Save configuration to `~/.rawkey/config.toml`
    pub fn save(&self) -> anyhow::Result<PathBuf> {
        let path = Self::get_config_path().context("could not determine config path")?;
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir)
                .with_context(|| format!("failed to create {}", dir.display()))?;
        }
        self.save_to(&path)?;
        Ok(path)
    }

    pub fn save_to(&self, path: &Path) -> anyhow::Result<()> {
        let content = toml::to_string_pretty(self).context("failed to serialize config")?;
        fs::write(path, content).with_context(|| format!("failed to write {}", path.display()))
    }

    /// Get config file path
    fn get_config_path() -> Option<PathBuf> {
        config_dir().map(|dir| dir.join("config.toml"))
    }

    /// Quit chord, defaulting to Ctrl-Q when the setting is invalid
    pub fn quit_key(&self) -> QuitKey {
        QuitKey::parse(&self.quit_key).unwrap_or_else(|| {
            warn!("Invalid quit_key {:?}, using Ctrl-Q", self.quit_key);
            QuitKey::default()
        })
    }

    pub fn raw_mode_options(&self) -> RawModeOptions {
        RawModeOptions {
            read_timeout: RawModeOptions::deciseconds_from_millis(self.terminal.read_timeout_ms),
            output_processing: self.terminal.output_processing,
        }
    }

    pub fn printer_options(&self) -> PrinterOptions {
        PrinterOptions {
            color: self.display.color,
            show_timeouts: self.display.show_timeouts,
        }
    }
}

/// `~/.rawkey`, also home of the log file
pub fn config_dir() -> Option<PathBuf> {
    home_dir().map(|home| home.join(".rawkey"))
}

// Get home directory
fn home_dir() -> Option<PathBuf> {
    std::env::var_os("HOME").map(PathBuf::from)
}
