use crate::core::config::data::Config;
use crate::core::config::io::ConfigError;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};
use std::time::SystemTime;
use tracing::{debug, warn};

#[derive(Default)]
struct CacheState {
    config: Option<Config>,
    modified: Option<SystemTime>,
}

/// Load/save collaborator for the settings file.
///
/// Loads are cached until the file's modification time changes, so an edit
/// made by hand (or by another process) is picked up on the next load.
pub struct SettingsStore {
    path: PathBuf,
    state: Mutex<CacheState>,
}

impl SettingsStore {
    pub fn new(path: PathBuf) -> Self {
        Self {
            path,
            state: Mutex::new(CacheState::default()),
        }
    }

    /// Store backed by the per-user config directory.
    pub fn open_default() -> Result<Self, ConfigError> {
        Ok(Self::new(Config::default_config_path()?))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn load(&self) -> Result<Config, ConfigError> {
        let mut state = self.lock();
        let config = Self::refresh(&self.path, &mut state)?;
        for problem in config.validate() {
            warn!(path = %self.path.display(), %problem, "invalid setting in config file");
        }
        Ok(config)
    }

    pub fn save(&self, config: &Config) -> Result<(), ConfigError> {
        config.save_to_path(&self.path)?;
        let mut state = self.lock();
        state.modified = Self::modified_time(&self.path);
        state.config = Some(config.clone());
        debug!(path = %self.path.display(), "saved config");
        Ok(())
    }

    /// Apply `mutator` to the latest config and persist the result. Nothing is
    /// written when the mutator fails.
    pub fn mutate<F, T>(&self, mutator: F) -> Result<T, ConfigError>
    where
        F: FnOnce(&mut Config) -> Result<T, ConfigError>,
    {
        let mut working = {
            let mut state = self.lock();
            Self::refresh(&self.path, &mut state)?
        };

        let result = mutator(&mut working)?;
        self.save(&working)?;
        Ok(result)
    }

    fn refresh(path: &Path, state: &mut CacheState) -> Result<Config, ConfigError> {
        let disk_modified = Self::modified_time(path);
        match &state.config {
            Some(config) if state.modified == disk_modified => Ok(config.clone()),
            _ => {
                let config = Config::load_from_path(path)?;
                state.modified = disk_modified;
                state.config = Some(config.clone());
                Ok(config)
            }
        }
    }

    fn lock(&self) -> MutexGuard<'_, CacheState> {
        self.state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn modified_time(path: &Path) -> Option<SystemTime> {
        fs::metadata(path).ok()?.modified().ok()
    }
}
