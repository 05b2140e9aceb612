use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::{
    env, fs,
    path::{Path, PathBuf},
    sync::{PoisonError, RwLock},
};

use crate::db::models::ToolKind;
use crate::sensing::SamplingRate;

pub const DB_PATH_ENV: &str = "MISURA_DB_PATH";
pub const DEBUG_ENV: &str = "MISURA_DEBUG";

const APP_DIR: &str = "misura";
const DB_FILE: &str = "misura.sqlite3";
const SETTINGS_FILE: &str = "settings.json";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SamplingSettings {
    pub barometer: SamplingRate,
    pub magnetometer: SamplingRate,
}

impl Default for SamplingSettings {
    fn default() -> Self {
        Self {
            barometer: SamplingRate::Fastest,
            magnetometer: SamplingRate::Game,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Settings {
    pub database_path: Option<PathBuf>,
    pub sampling: SamplingSettings,
    pub locale: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            database_path: None,
            sampling: SamplingSettings::default(),
            locale: "en".into(),
        }
    }
}

impl Settings {
    /// Rate a sensor-backed tool subscribes at; `None` for manual-input tools.
    pub fn rate_for(&self, kind: ToolKind) -> Option<SamplingRate> {
        match kind {
            ToolKind::Barometer => Some(self.sampling.barometer),
            ToolKind::Magnetometer => Some(self.sampling.magnetometer),
            ToolKind::Ruler => None,
        }
    }

    /// Database file: `MISURA_DB_PATH`, then the configured path, then the
    /// platform data directory.
    pub fn resolved_database_path(&self) -> PathBuf {
        let from_env = env::var_os(DB_PATH_ENV)
            .filter(|value| !value.is_empty())
            .map(PathBuf::from);
        self.database_path_with(from_env)
    }

    fn database_path_with(&self, override_path: Option<PathBuf>) -> PathBuf {
        override_path
            .or_else(|| self.database_path.clone())
            .or_else(default_database_path)
            .unwrap_or_else(|| PathBuf::from(DB_FILE))
    }
}

pub fn default_settings_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join(APP_DIR).join(SETTINGS_FILE))
}

pub fn default_database_path() -> Option<PathBuf> {
    dirs::data_local_dir().map(|dir| dir.join(APP_DIR).join(DB_FILE))
}

/// `MISURA_DEBUG` set to `1` or `true`.
pub fn debug_enabled() -> bool {
    env::var(DEBUG_ENV)
        .map(|value| matches!(value.trim().to_ascii_lowercase().as_str(), "1" | "true"))
        .unwrap_or(false)
}

pub struct SettingsStore {
    path: PathBuf,
    data: RwLock<Settings>,
}

impl SettingsStore {
    pub fn new(path: PathBuf) -> Result<Self> {
        let data = if path.exists() {
            read_settings(&path)?
        } else {
            Settings::default()
        };

        Ok(Self {
            path,
            data: RwLock::new(data),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn snapshot(&self) -> Settings {
        self.data
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Applies `change` and writes the result to disk.
    pub fn update(&self, change: impl FnOnce(&mut Settings)) -> Result<()> {
        let mut guard = self.data.write().unwrap_or_else(PoisonError::into_inner);
        change(&mut guard);
        self.persist(&guard)
    }

    pub fn reload(&self) -> Result<()> {
        let data = read_settings(&self.path)?;
        *self.data.write().unwrap_or_else(PoisonError::into_inner) = data;
        Ok(())
    }

    fn persist(&self, data: &Settings) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create settings directory {}", parent.display())
            })?;
        }
        let serialized = serde_json::to_string_pretty(data)?;
        fs::write(&self.path, serialized)
            .with_context(|| format!("Failed to write settings to {}", self.path.display()))
    }
}

fn read_settings(path: &Path) -> Result<Settings> {
    let contents = fs::read_to_string(path)
        .with_context(|| format!("Failed to read settings from {}", path.display()))?;
    serde_json::from_str(&contents)
        .with_context(|| format!("Failed to parse settings in {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let store = SettingsStore::new(dir.path().join("settings.json")).unwrap();

        let settings = store.snapshot();
        assert_eq!(settings, Settings::default());
        assert_eq!(settings.rate_for(ToolKind::Barometer), Some(SamplingRate::Fastest));
        assert_eq!(settings.rate_for(ToolKind::Magnetometer), Some(SamplingRate::Game));
        assert_eq!(settings.rate_for(ToolKind::Ruler), None);
    }

    #[test]
    fn updates_persist_and_reload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("settings.json");
        let store = SettingsStore::new(path.clone()).unwrap();

        store
            .update(|settings| {
                settings.sampling.barometer = SamplingRate::Ui;
                settings.locale = "it".into();
            })
            .unwrap();

        let reopened = SettingsStore::new(path).unwrap();
        let settings = reopened.snapshot();
        assert_eq!(settings.sampling.barometer, SamplingRate::Ui);
        assert_eq!(settings.sampling.magnetometer, SamplingRate::Game);
        assert_eq!(settings.locale, "it");
    }

    #[test]
    fn partial_files_fill_in_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        fs::write(&path, r#"{ "sampling": { "magnetometer": "normal" } }"#).unwrap();

        let settings = SettingsStore::new(path).unwrap().snapshot();
        assert_eq!(settings.sampling.barometer, SamplingRate::Fastest);
        assert_eq!(settings.sampling.magnetometer, SamplingRate::Normal);
        assert_eq!(settings.locale, "en");
    }

    #[test]
    fn malformed_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        fs::write(&path, "not json").unwrap();

        assert!(SettingsStore::new(path).is_err());
    }

    #[test]
    fn override_path_wins_over_configured_path() {
        let settings = Settings {
            database_path: Some(PathBuf::from("/data/configured.sqlite3")),
            ..Settings::default()
        };

        assert_eq!(
            settings.database_path_with(Some(PathBuf::from("/tmp/override.sqlite3"))),
            PathBuf::from("/tmp/override.sqlite3")
        );
        assert_eq!(
            settings.database_path_with(None),
            PathBuf::from("/data/configured.sqlite3")
        );
    }
}
