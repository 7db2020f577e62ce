use crate::weather::{self, Bitmap};
use anyhow::Context;
use log::{error, info};
use serde::{Deserialize, Serialize};
use std::{
    fs,
    path::{Path, PathBuf},
};

/// Everything the face shows besides the clock. Only changed by a sync
/// update (or the startup load), read on every draw.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct DisplayState {
    pub high_temp: String,
    pub low_temp: String,
    pub weather_code: i64,
    /// Derived from `weather_code`. `None` for no data or an unmapped code
    pub icon: Option<Bitmap>,
}

impl DisplayState {
    /// Replace the weather with new values, reloading the icon to match
    pub fn set_weather(&mut self, preferences: &PersistedPreferences) {
        self.high_temp = preferences.high_temp.clone();
        self.low_temp = preferences.low_temp.clone();
        self.weather_code = preferences.weather_code;
        self.icon = weather::load_icon(self.weather_code);
    }

    /// The values worth keeping across restarts
    pub fn preferences(&self) -> PersistedPreferences {
        PersistedPreferences {
            high_temp: self.high_temp.clone(),
            low_temp: self.low_temp.clone(),
            weather_code: self.weather_code,
        }
    }
}

impl From<&PersistedPreferences> for DisplayState {
    fn from(preferences: &PersistedPreferences) -> Self {
        let mut state = Self::default();
        state.set_weather(preferences);
        state
    }
}

/// Last-known weather, so a restart doesn't show a blank face until the next
/// sync arrives
#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
pub struct PersistedPreferences {
    #[serde(rename = "pref_temp_high", default)]
    pub high_temp: String,
    #[serde(rename = "pref_temp_low", default)]
    pub low_temp: String,
    #[serde(rename = "pref_weather_icon_id", default)]
    pub weather_code: i64,
}

/// Flat key-value file holding [PersistedPreferences]
#[derive(Debug)]
pub struct PreferencesStore {
    path: PathBuf,
}

impl PreferencesStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load saved preferences. A missing or unreadable file is not fatal, we
    /// just start from blank values.
    pub fn load(&self) -> PersistedPreferences {
        // Shitty try block
        let helper = || {
            let contents = fs::read(&self.path)?;
            Ok::<PersistedPreferences, anyhow::Error>(serde_json::from_slice(
                &contents,
            )?)
        };
        match helper() {
            Ok(preferences) => {
                info!(
                    "Loaded preferences from {}: {preferences:?}",
                    self.path.display()
                );
                preferences
            }
            Err(err) => {
                error!(
                    "Error loading preferences from {}: {}",
                    self.path.display(),
                    err
                );
                PersistedPreferences::default()
            }
        }
    }

    /// Overwrite the saved preferences. Nothing from the previous file is
    /// carried over.
    pub fn save(&self, preferences: &PersistedPreferences) -> anyhow::Result<()> {
        info!("Saving preferences: {preferences:?}");
        let serialized = serde_json::to_string_pretty(preferences)?;
        fs::write(&self.path, serialized).with_context(|| {
            format!("Error saving preferences to {}", self.path.display())
        })?;
        Ok(())
    }
}
