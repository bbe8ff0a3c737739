//! Application settings

use crate::speech::backend::BackendKind;
use crate::speech::request::{normalize_language, DEFAULT_LANGUAGE};
use crate::state::storage::FileStore;
use crate::{FirstWordsError, Result};
use ini::Ini;
use log::{debug, info, warn};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Settings file name, placed in the home directory
pub const SETTINGS_FILE: &str = ".firstwords.cfg";

/// Application settings for the speech layer
///
/// Backed by an INI file with `[speech]` and `[storage]` sections. Missing
/// keys read as their defaults.
#[derive(Debug)]
pub struct Settings {
    /// INI configuration storage
    ini: Ini,

    /// Settings file path (~/.firstwords.cfg)
    path: PathBuf,
}

impl Settings {
    /// Load settings from the home directory, creating the file if needed
    pub fn load() -> Result<Self> {
        Self::load_from(Self::settings_path())
    }

    /// Load settings from `path`, creating it with defaults if absent
    pub fn load_from(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        debug!("Loading settings from {:?}", path);

        let ini = if path.exists() {
            Ini::load_from_file(&path)
                .map_err(|e| FirstWordsError::IniParse(format!("Failed to load settings: {}", e)))?
        } else {
            info!("Settings file not found, creating default");
            let default = Self::default_ini();
            default
                .write_to_file(&path)
                .map_err(|e| FirstWordsError::Config(format!("Failed to write settings: {}", e)))?;
            default
        };

        Ok(Self { ini, path })
    }

    /// Defaults only, never written anywhere unless `save` is called
    pub fn defaults() -> Self {
        Self {
            ini: Self::default_ini(),
            path: Self::settings_path(),
        }
    }

    /// Save settings to disk
    pub fn save(&self) -> Result<()> {
        debug!("Saving settings to {:?}", self.path);
        self.ini
            .write_to_file(&self.path)
            .map_err(|e| FirstWordsError::Config(format!("Failed to save settings: {}", e)))
    }

    /// Get settings file path (~/.firstwords.cfg)
    fn settings_path() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(SETTINGS_FILE)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn default_ini() -> Ini {
        let mut ini = Ini::new();

        ini.with_section(Some("speech"))
            .set("backend", "auto")
            .set("fallback", "true")
            .set("language", DEFAULT_LANGUAGE)
            .set("self_test", "false")
            .set("self_test_delay_ms", "500")
            .set("self_test_phrase", "Olá")
            .set("poll_interval_ms", "20");

        ini.with_section(Some("storage"));

        ini
    }

    /// Get a boolean value
    pub fn get_bool(&self, section: &str, key: &str, default: bool) -> bool {
        self.ini
            .get_from(Some(section), key)
            .and_then(|v| v.trim().parse().ok())
            .unwrap_or(default)
    }

    /// Get a string value
    pub fn get_string(&self, section: &str, key: &str, default: &str) -> String {
        self.ini
            .get_from(Some(section), key)
            .unwrap_or(default)
            .to_string()
    }

    /// Get an unsigned integer value
    pub fn get_u64(&self, section: &str, key: &str, default: u64) -> u64 {
        self.ini
            .get_from(Some(section), key)
            .and_then(|v| v.trim().parse().ok())
            .unwrap_or(default)
    }

    /// Set a value
    pub fn set(&mut self, section: &str, key: &str, value: &str) {
        self.ini.with_section(Some(section)).set(key, value);
    }

    /// Backend forced by the user; `None` means pick by environment
    pub fn backend_override(&self) -> Option<BackendKind> {
        let value = self.get_string("speech", "backend", "auto");
        if value.trim().eq_ignore_ascii_case("auto") || value.trim().is_empty() {
            return None;
        }
        match value.parse() {
            Ok(kind) => Some(kind),
            Err(e) => {
                warn!("{}; choosing by environment", e);
                None
            }
        }
    }

    /// Try the other backend when the selected one is unavailable?
    pub fn fallback(&self) -> bool {
        self.get_bool("speech", "fallback", true)
    }

    /// Default language tag for utterances
    pub fn language(&self) -> String {
        let value = self.get_string("speech", "language", DEFAULT_LANGUAGE);
        normalize_language(&value).unwrap_or_else(|| {
            warn!("Invalid language {:?} in settings, using {}", value, DEFAULT_LANGUAGE);
            DEFAULT_LANGUAGE.to_string()
        })
    }

    /// Speak a fixed phrase after startup initialization?
    pub fn self_test(&self) -> bool {
        self.get_bool("speech", "self_test", false)
    }

    pub fn self_test_delay(&self) -> Duration {
        Duration::from_millis(self.get_u64("speech", "self_test_delay_ms", 500))
    }

    pub fn self_test_phrase(&self) -> String {
        self.get_string("speech", "self_test_phrase", "Olá")
    }

    /// Interval between playback checks while waiting on an utterance
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.get_u64("speech", "poll_interval_ms", 20).max(1))
    }

    /// Path of the key-value storage file
    pub fn storage_path(&self) -> PathBuf {
        match self.ini.get_from(Some("storage"), "path") {
            Some(path) if !path.trim().is_empty() => PathBuf::from(path.trim()),
            _ => FileStore::default_path(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let settings = Settings::defaults();
        assert_eq!(settings.backend_override(), None);
        assert!(settings.fallback());
        assert_eq!(settings.language(), "pt-BR");
        assert!(!settings.self_test());
        assert_eq!(settings.self_test_delay(), Duration::from_millis(500));
        assert_eq!(settings.self_test_phrase(), "Olá");
        assert_eq!(settings.poll_interval(), Duration::from_millis(20));
        assert!(settings.storage_path().ends_with("storage.json"));
    }

    #[test]
    fn test_overrides() {
        let mut settings = Settings::defaults();
        settings.set("speech", "backend", "espeak");
        settings.set("speech", "language", "en_us");
        settings.set("speech", "poll_interval_ms", "0");
        settings.set("storage", "path", "/tmp/fw.json");

        assert_eq!(settings.backend_override(), Some(BackendKind::Process));
        assert_eq!(settings.language(), "en-US");
        assert_eq!(settings.poll_interval(), Duration::from_millis(1));
        assert_eq!(settings.storage_path(), PathBuf::from("/tmp/fw.json"));
    }

    #[test]
    fn test_bad_values_fall_back() {
        let mut settings = Settings::defaults();
        settings.set("speech", "backend", "festival");
        settings.set("speech", "language", "???");
        settings.set("speech", "fallback", "maybe");

        assert_eq!(settings.backend_override(), None);
        assert_eq!(settings.language(), "pt-BR");
        assert!(settings.fallback());
    }
}
