use std::fmt;
use std::str::FromStr;

use crate::core::config::data::Config;
use crate::core::constants::{MAX_SEED, MAX_TEMPERATURE, MIN_TEMPERATURE};
use crate::core::modes::Mode;
use crate::utils::url::parse_http_url;

/// A rejected settings value, phrased for the person who typed it.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{field}: {message}")]
pub struct ValidationError {
    pub field: &'static str,
    pub message: String,
}

impl ValidationError {
    fn new(field: &'static str, message: &str) -> Self {
        Self {
            field,
            message: message.to_string(),
        }
    }
}

/// Keys accepted by `set` / `unset`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigKey {
    Url,
    Model,
    Seed,
    Temperature,
    Mode,
}

impl ConfigKey {
    pub const ALL: [ConfigKey; 5] = [
        ConfigKey::Url,
        ConfigKey::Model,
        ConfigKey::Seed,
        ConfigKey::Temperature,
        ConfigKey::Mode,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            ConfigKey::Url => "url",
            ConfigKey::Model => "model",
            ConfigKey::Seed => "seed",
            ConfigKey::Temperature => "temperature",
            ConfigKey::Mode => "mode",
        }
    }
}

impl fmt::Display for ConfigKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ConfigKey {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "url" | "base-url" | "base_url" => Ok(ConfigKey::Url),
            "model" => Ok(ConfigKey::Model),
            "seed" => Ok(ConfigKey::Seed),
            "temperature" | "temp" => Ok(ConfigKey::Temperature),
            "mode" | "default-mode" | "default_mode" => Ok(ConfigKey::Mode),
            other => {
                let known: Vec<&str> = ConfigKey::ALL.iter().map(|key| key.as_str()).collect();
                Err(format!(
                    "Unknown config key: {other} (expected one of: {})",
                    known.join(", ")
                ))
            }
        }
    }
}

pub fn validate_base_url(value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        return Err(ValidationError::new("url", "URL cannot be empty"));
    }
    if parse_http_url(value).is_none() {
        return Err(ValidationError::new("url", "URL is not valid"));
    }
    Ok(())
}

pub fn validate_model(value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        return Err(ValidationError::new("model", "Model cannot be empty"));
    }
    Ok(())
}

/// Parse a seed as typed by the user. Blank means unset.
pub fn parse_seed(value: &str) -> Result<Option<u64>, ValidationError> {
    let value = value.trim();
    if value.is_empty() {
        return Ok(None);
    }

    match value.parse::<u64>() {
        Ok(seed) if seed < MAX_SEED => Ok(Some(seed)),
        Ok(_) => Err(ValidationError::new("seed", "Seed must be positive integer")),
        Err(_) => match value.parse::<f64>() {
            Ok(number) if number.is_finite() => {
                Err(ValidationError::new("seed", "Seed must be positive integer"))
            }
            _ => Err(ValidationError::new("seed", "Seed must be a valid number")),
        },
    }
}

pub fn validate_seed(seed: Option<u64>) -> Result<(), ValidationError> {
    match seed {
        Some(seed) if seed >= MAX_SEED => {
            Err(ValidationError::new("seed", "Seed must be positive integer"))
        }
        _ => Ok(()),
    }
}

/// Parse a temperature as typed by the user. Blank means unset.
pub fn parse_temperature(value: &str) -> Result<Option<f64>, ValidationError> {
    let value = value.trim();
    if value.is_empty() {
        return Ok(None);
    }

    let temperature = match value.parse::<f64>() {
        Ok(number) if number.is_finite() => number,
        _ => {
            return Err(ValidationError::new(
                "temperature",
                "Temperature must be a valid number",
            ))
        }
    };
    validate_temperature(Some(temperature))?;
    Ok(Some(temperature))
}

pub fn validate_temperature(temperature: Option<f64>) -> Result<(), ValidationError> {
    match temperature {
        Some(t) if !(MIN_TEMPERATURE..=MAX_TEMPERATURE).contains(&t) => Err(ValidationError::new(
            "temperature",
            "Temperature must be between 0 and 2",
        )),
        _ => Ok(()),
    }
}

impl Config {
    /// Every rule that the current values break.
    pub fn validate(&self) -> Vec<ValidationError> {
        [
            validate_base_url(&self.base_url),
            validate_model(&self.model),
            validate_seed(self.seed),
            validate_temperature(self.temperature),
        ]
        .into_iter()
        .filter_map(Result::err)
        .collect()
    }

    /// Set `key` from user input, leaving the config untouched when the
    /// value is rejected.
    pub fn set_value(&mut self, key: ConfigKey, value: &str) -> Result<(), ValidationError> {
        match key {
            ConfigKey::Url => {
                validate_base_url(value)?;
                self.base_url = value.trim().to_string();
            }
            ConfigKey::Model => {
                validate_model(value)?;
                self.model = value.trim().to_string();
            }
            ConfigKey::Seed => self.seed = parse_seed(value)?,
            ConfigKey::Temperature => self.temperature = parse_temperature(value)?,
            ConfigKey::Mode => {
                let mode = value
                    .parse::<Mode>()
                    .map_err(|message| ValidationError { field: "mode", message })?;
                self.default_mode = Some(mode);
            }
        }
        Ok(())
    }

    /// Reset `key` to its default.
    pub fn unset_value(&mut self, key: ConfigKey) {
        let defaults = Config::default();
        match key {
            ConfigKey::Url => self.base_url = defaults.base_url,
            ConfigKey::Model => self.model = defaults.model,
            ConfigKey::Seed => self.seed = None,
            ConfigKey::Temperature => self.temperature = None,
            ConfigKey::Mode => self.default_mode = None,
        }
    }
}
