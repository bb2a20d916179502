//! Process-wide settings, fixed at startup.
//!
//! Sources, later ones winning: built-in defaults, an optional TOML file,
//! then `WATER_*` environment variables. The loaded [`Settings`] is handed
//! to whatever needs it; nothing reads configuration from a global.

use anyhow::{bail, Context, Result};
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Config file picked up from the working directory when none is given
pub const DEFAULT_CONFIG_FILE: &str = "water.toml";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    /// SQLite database file
    pub db_path: PathBuf,
    /// Price charged per cubic meter
    pub unit_rate: f64,
    /// Currency label shown next to prices
    pub currency: String,
    /// Default `tracing` filter when `RUST_LOG` is unset
    pub log_level: String,
    /// Where logs go while the terminal UI owns the screen
    pub log_file: Option<PathBuf>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            db_path: PathBuf::from("water_management.db"),
            unit_rate: 4.5,
            currency: "Baht".to_string(),
            log_level: "info".to_string(),
            log_file: None,
        }
    }
}

impl Settings {
    /// Load from `config_file` (or `water.toml` if present) and the environment
    pub fn load(config_file: Option<&Path>) -> Result<Self> {
        let mut figment = Figment::from(Serialized::defaults(Settings::default()));

        match config_file {
            Some(path) => {
                if !path.exists() {
                    bail!("Config file not found: {}", path.display());
                }
                figment = figment.merge(Toml::file(path));
            }
            None => figment = figment.merge(Toml::file(DEFAULT_CONFIG_FILE)),
        }

        Self::from_figment(figment.merge(Env::prefixed("WATER_")))
    }

    pub fn from_figment(figment: Figment) -> Result<Self> {
        let settings: Settings = figment.extract().context("Invalid configuration")?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<()> {
        if !self.unit_rate.is_finite() || self.unit_rate < 0.0 {
            bail!("unit_rate must be a non-negative number, got {}", self.unit_rate);
        }
        if self.db_path.as_os_str().is_empty() {
            bail!("db_path must not be empty");
        }
        Ok(())
    }
}
