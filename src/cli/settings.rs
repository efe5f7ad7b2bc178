//! `set`, `unset` and `show` for the settings file.

use std::error::Error;
use std::process::ExitCode;

use crate::core::config::data::path_display;
use crate::core::config::io::ConfigError;
use crate::core::config::validation::ConfigKey;
use crate::core::config::SettingsStore;

/// Errors reported by the settings commands.
#[derive(Debug, thiserror::Error)]
pub enum SettingError {
    #[error("{0}")]
    UnknownKey(String),
    #[error("Missing value for {key}. Example: {example}")]
    MissingValue {
        key: ConfigKey,
        example: &'static str,
    },
    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl SettingError {
    /// Print the error message to stderr with appropriate formatting.
    pub fn print(&self) {
        match self {
            SettingError::MissingValue { .. } => eprintln!("⚠️  {self}"),
            SettingError::Config(ConfigError::Invalid(invalid)) => {
                eprintln!("❌ Invalid {}: {}", invalid.field, invalid.message);
            }
            _ => eprintln!("❌ {self}"),
        }
    }

    pub fn exit_code(&self) -> ExitCode {
        ExitCode::FAILURE
    }
}

fn example_for(key: ConfigKey) -> &'static str {
    match key {
        ConfigKey::Url => "adricopilot set url http://localhost:11434/api/",
        ConfigKey::Model => "adricopilot set model llama3:latest",
        ConfigKey::Seed => "adricopilot set seed 42",
        ConfigKey::Temperature => "adricopilot set temperature 0.7",
        ConfigKey::Mode => "adricopilot set mode physics",
    }
}

/// Validate and store `value` under `key`. Returns the confirmation line.
pub fn set_setting(store: &SettingsStore, key: &str, value: &str) -> Result<String, SettingError> {
    let key: ConfigKey = key.parse().map_err(SettingError::UnknownKey)?;
    let value = value.trim();
    if value.is_empty() {
        return Err(SettingError::MissingValue {
            key,
            example: example_for(key),
        });
    }

    store.mutate(|config| Ok(config.set_value(key, value)?))?;
    Ok(format!("✅ Set {key} to: {value}"))
}

pub fn unset_setting(store: &SettingsStore, key: &str) -> Result<String, SettingError> {
    let key: ConfigKey = key.parse().map_err(SettingError::UnknownKey)?;
    store.mutate(|config| {
        config.unset_value(key);
        Ok(())
    })?;
    Ok(format!("✅ Reset {key} to its default"))
}

fn report(result: Result<String, SettingError>) -> ExitCode {
    match result {
        Ok(message) => {
            println!("{message}");
            ExitCode::SUCCESS
        }
        Err(err) => {
            err.print();
            err.exit_code()
        }
    }
}

pub fn run_set(store: &SettingsStore, key: &str, value: &str) -> Result<ExitCode, Box<dyn Error>> {
    Ok(report(set_setting(store, key, value)))
}

pub fn run_unset(store: &SettingsStore, key: &str) -> Result<ExitCode, Box<dyn Error>> {
    Ok(report(unset_setting(store, key)))
}

pub fn run_show(store: &SettingsStore) -> Result<(), Box<dyn Error>> {
    let config = store.load()?;
    config.print_all();
    println!("  (from {})", path_display(store.path()));
    for problem in config.validate() {
        eprintln!("⚠️  {}: {}", problem.field, problem.message);
    }
    Ok(())
}
