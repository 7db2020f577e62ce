use crate::util::Color;
use anyhow::{anyhow, bail, Context};
use chrono::Locale;
use log::info;
use serde::Deserialize;
use std::{fs::File, path::Path, path::PathBuf, time::Duration};

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct Config {
    /// SPI device for the e-paper panel. Only used on the device itself
    pub display_port: String,
    /// Screen shape, as reported to the face through window insets
    pub round: bool,
    /// Whether the screen only has 1 bit per color in ambient mode
    pub low_bit_ambient: bool,
    /// Locale for day and month names, e.g. `en_US`
    pub locale: String,
    /// Where the last-known weather is kept between runs
    pub preferences_path: PathBuf,
    pub companion: CompanionConfig,
    pub colors: ColorConfig,
}

impl Config {
    pub const PATH: &'static str = "./config.json";

    /// Load config from a JSON file. Every field is optional, but whatever is
    /// given must be valid.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        info!("Loading config from `{}`", path.display());
        let file = File::open(path).with_context(|| {
            format!("Error opening config file {}", path.display())
        })?;
        let config: Self = serde_json::from_reader(file).with_context(|| {
            format!("Error parsing config file {}", path.display())
        })?;
        config.locale()?;
        if config.companion.poll_interval_secs == 0 {
            bail!("`companion.poll_interval_secs` must be at least 1");
        }
        Ok(config)
    }

    pub fn locale(&self) -> anyhow::Result<Locale> {
        Locale::try_from(self.locale.as_str())
            .map_err(|_| anyhow!("Unknown locale `{}`", self.locale))
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            display_port: "/dev/spidev0.0".into(),
            round: true,
            low_bit_ambient: false,
            locale: "en_US".into(),
            preferences_path: "./preferences.json".into(),
            companion: CompanionConfig::default(),
            colors: ColorConfig::default(),
        }
    }
}

/// Where to reach the paired companion device
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct CompanionConfig {
    pub url: String,
    pub poll_interval_secs: u64,
}

impl CompanionConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }
}

impl Default for CompanionConfig {
    fn default() -> Self {
        Self {
            url: "http://localhost:8000".into(),
            poll_interval_secs: 5,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct ColorConfig {
    pub background: Color,
    pub digital_text: Color,
    pub light_digital_text: Color,
    pub icon: Color,
}

impl Default for ColorConfig {
    fn default() -> Self {
        Self {
            background: Color::new(0x03, 0xa9, 0xf4),
            digital_text: Color::WHITE,
            light_digital_text: Color::new(0xb3, 0xe5, 0xfc),
            icon: Color::WHITE,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_load_partial() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(
            &path,
            r##"{
                "round": false,
                "locale": "fr_FR",
                "companion": {"url": "http://phone.local:8080"},
                "colors": {"background": "#000000"}
            }"##,
        )
        .unwrap();

        let config = Config::load(&path).unwrap();
        assert!(!config.round);
        assert_eq!(config.locale().unwrap(), Locale::fr_FR);
        assert_eq!(config.companion.url, "http://phone.local:8080");
        assert_eq!(config.companion.poll_interval(), Duration::from_secs(5));
        assert_eq!(config.colors.background, Color::BLACK);
        assert_eq!(config.colors.digital_text, Color::WHITE);
        assert_eq!(config.preferences_path, PathBuf::from("./preferences.json"));
    }

    #[test]
    fn test_load_invalid() {
        let dir = tempfile::tempdir().unwrap();

        let bad_color = dir.path().join("color.json");
        fs::write(&bad_color, r#"{"colors": {"icon": "white"}}"#).unwrap();
        assert!(Config::load(&bad_color).is_err());

        let bad_locale = dir.path().join("locale.json");
        fs::write(&bad_locale, r#"{"locale": "xx_XX"}"#).unwrap();
        assert!(Config::load(&bad_locale).is_err());

        let no_interval = dir.path().join("interval.json");
        fs::write(&no_interval, r#"{"companion": {"poll_interval_secs": 0}}"#)
            .unwrap();
        let err = Config::load(&no_interval).unwrap_err();
        assert!(err.to_string().contains("poll_interval_secs"), "{err}");

        assert!(Config::load(&dir.path().join("missing.json")).is_err());
    }
}
