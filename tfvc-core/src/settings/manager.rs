use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use anyhow::{Context, Result};
use tracing::{debug, warn};

use crate::settings::config::Settings;

const BACKUP_EXTENSION: &str = "toml.backup";

/// Settings shared by the client and the front ends. In-memory updates last
/// for the process; `save` persists them for future processes.
#[derive(Clone)]
pub struct SettingsManager {
    settings_path: PathBuf,
    inner: Arc<Mutex<Settings>>,
}

impl SettingsManager {
    /// Manager for `~/.tfvc/settings.toml`.
    pub fn new() -> Result<Self> {
        Self::from_path(Self::default_settings_path()?)
    }

    /// Reads `path`, writing defaults first when it does not exist. A file
    /// that fails to parse is moved aside and replaced by defaults.
    pub fn from_path(path: PathBuf) -> Result<Self> {
        let settings = if path.exists() {
            read_or_reset(&path)?
        } else {
            debug!(?path, "No settings file, writing defaults");
            let defaults = Settings::default();
            write_settings(&path, &defaults)?;
            defaults
        };

        Ok(Self {
            settings_path: path,
            inner: Arc::new(Mutex::new(settings)),
        })
    }

    pub fn default_settings_path() -> Result<PathBuf> {
        let home = dirs::home_dir().context("Could not determine the home directory")?;
        Ok(home.join(".tfvc").join("settings.toml"))
    }

    /// Snapshot of the current in-memory settings.
    pub fn settings(&self) -> Settings {
        self.inner.lock().unwrap().clone()
    }

    /// Changes the in-memory settings only.
    pub fn update_setting(&self, updater: impl FnOnce(&mut Settings)) {
        updater(&mut *self.inner.lock().unwrap());
    }

    pub fn save_settings(&self, settings: Settings) -> Result<()> {
        write_settings(&self.settings_path, &settings)?;
        *self.inner.lock().unwrap() = settings;
        Ok(())
    }

    pub fn save(&self) -> Result<()> {
        let snapshot = self.settings();
        write_settings(&self.settings_path, &snapshot)
    }

    pub fn path(&self) -> &Path {
        &self.settings_path
    }
}

fn read_or_reset(path: &Path) -> Result<Settings> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("Could not read settings at {}", path.display()))?;

    let error = match toml::from_str::<Settings>(&raw) {
        Ok(settings) => return Ok(settings),
        Err(error) => error,
    };

    let backup = path.with_extension(BACKUP_EXTENSION);
    warn!(?path, ?backup, %error, "Unreadable settings moved aside, using defaults");
    fs::rename(path, &backup)
        .with_context(|| format!("Could not move settings to {}", backup.display()))?;

    let defaults = Settings::default();
    write_settings(path, &defaults)?;
    Ok(defaults)
}

fn write_settings(path: &Path, settings: &Settings) -> Result<()> {
    if let Some(dir) = path.parent() {
        fs::create_dir_all(dir)
            .with_context(|| format!("Could not create {}", dir.display()))?;
    }
    let text = toml::to_string_pretty(settings).context("Could not serialize settings")?;
    fs::write(path, text).with_context(|| format!("Could not write settings to {}", path.display()))
}
