use std::fs;
use std::ops::DerefMut;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use anyhow::{Context, Result};
use tracing::warn;

use crate::settings::config::Settings;

/// Process-wide settings handle. Clones share one in-memory copy; changes
/// reach disk only through `save`/`save_settings`.
#[derive(Clone)]
pub struct SettingsManager {
    settings_path: PathBuf,
    inner: Arc<Mutex<Settings>>,
}

impl SettingsManager {
    /// Load from `~/.agentfs/settings.toml`, creating it if needed.
    pub fn new() -> Result<Self> {
        Self::from_path(Self::default_settings_path()?)
    }

    /// Load from `path`. A missing file is created with defaults.
    pub fn from_path(path: PathBuf) -> Result<Self> {
        if !path.exists() {
            write_settings(&path, &Settings::default())?;
        }

        let loaded = Self::load_from_file_with_backup(&path)?;

        Ok(Self {
            settings_path: path,
            inner: Arc::new(Mutex::new(loaded)),
        })
    }

    pub fn default_settings_path() -> Result<PathBuf> {
        let home = dirs::home_dir().context("Failed to get home directory")?;
        Ok(home.join(".agentfs").join("settings.toml"))
    }

    /// A file that does not parse is moved aside to `settings.toml.backup`
    /// and replaced by defaults.
    fn load_from_file_with_backup(path: &Path) -> Result<Settings> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read settings from {path:?}"))?;

        match toml::from_str(&contents) {
            Ok(settings) => Ok(settings),
            Err(e) => {
                let backup_path = path.with_extension("toml.backup");
                warn!(
                    ?path,
                    ?backup_path,
                    error = %e,
                    "Settings file is corrupted, restoring defaults"
                );
                fs::rename(path, &backup_path).with_context(|| {
                    format!("Failed to backup corrupted settings to {backup_path:?}")
                })?;

                let defaults = Settings::default();
                write_settings(path, &defaults)?;
                Ok(defaults)
            }
        }
    }

    pub fn settings(&self) -> Settings {
        self.inner.lock().expect("lock poisoned").clone()
    }

    /// Changes the in-memory copy only.
    pub fn update_setting<F>(&self, updater: F)
    where
        F: FnOnce(&mut Settings),
    {
        let mut guard = self.inner.lock().expect("lock poisoned");
        updater(guard.deref_mut());
    }

    pub fn save_settings(&self, settings: Settings) -> Result<()> {
        write_settings(&self.settings_path, &settings)?;
        *self.inner.lock().expect("lock poisoned") = settings;
        Ok(())
    }

    pub fn save(&self) -> Result<()> {
        self.save_settings(self.settings())
    }

    pub fn path(&self) -> &Path {
        &self.settings_path
    }
}

fn write_settings(path: &Path, settings: &Settings) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory: {parent:?}"))?;
    }
    let contents = toml::to_string_pretty(settings).context("Failed to serialize settings")?;
    fs::write(path, contents).with_context(|| format!("Failed to write settings to {path:?}"))
}
