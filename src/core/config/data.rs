use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::core::constants::{DEFAULT_BASE_URL, DEFAULT_MODEL};
use crate::core::modes::Mode;

/// Contents of `config.toml`. Missing keys fall back to the defaults.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct Config {
    /// Base URL of the model server API, e.g. `http://localhost:11434/api/`
    pub base_url: String,
    /// Model identifier passed with every request
    pub model: String,
    /// Sampling seed; unset lets the server pick
    pub seed: Option<u64>,
    /// Sampling temperature in `[0, 2]`; unset uses the model default
    pub temperature: Option<f64>,
    /// Mode used when none is given on the command line
    pub default_mode: Option<Mode>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            model: DEFAULT_MODEL.to_string(),
            seed: None,
            temperature: None,
            default_mode: None,
        }
    }
}

/// The part of the configuration a generation needs.
#[derive(Debug, Clone, PartialEq)]
pub struct ServerSettings {
    pub base_url: String,
    pub model: String,
    pub seed: Option<u64>,
    pub temperature: Option<f64>,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Config::default().server_settings()
    }
}

impl Config {
    pub fn server_settings(&self) -> ServerSettings {
        ServerSettings {
            base_url: self.base_url.clone(),
            model: self.model.clone(),
            seed: self.seed,
            temperature: self.temperature,
        }
    }

    pub fn mode(&self) -> Mode {
        self.default_mode.unwrap_or_default()
    }

    pub fn print_all(&self) {
        println!("Current configuration:");
        println!("  url: {}", self.base_url);
        println!("  model: {}", self.model);
        match self.seed {
            Some(seed) => println!("  seed: {seed}"),
            None => println!("  seed: (unset)"),
        }
        match self.temperature {
            Some(temperature) => println!("  temperature: {temperature}"),
            None => println!("  temperature: (unset)"),
        }
        println!("  mode: {}", self.mode());
    }
}

/// Get a user-friendly display string for a path
/// Converts absolute paths to use ~ notation on Unix-like systems when possible
pub fn path_display<P: AsRef<Path>>(path: P) -> String {
    let path = path.as_ref();

    #[cfg(unix)]
    {
        if let Some(home) = std::env::var_os("HOME") {
            let home_path = PathBuf::from(home);
            if let Ok(relative) = path.strip_prefix(&home_path) {
                return format!("~/{}", relative.display());
            }
        }
    }

    path.display().to_string()
}
