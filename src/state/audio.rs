//! Persisted voice preferences
//!
//! A single `AudioConfig` record lives under the `audioConfig` storage key.
//! It is read once at startup and written whole on every change; each write
//! stamps `lastUpdated`. Concurrent writers are not coordinated, the last
//! write wins.

use crate::speech::request::{
    clamp_param, SpeechRequest, DEFAULT_PITCH, PITCH_RANGE, RATE_RANGE,
};
use crate::state::storage::KeyValueStore;
use crate::Result;
use chrono::{DateTime, Utc};
use log::{debug, error, info, warn};
use serde::{Deserialize, Serialize};

/// Storage key of the persisted record
pub const AUDIO_CONFIG_KEY: &str = "audioConfig";

/// Children's default: a little slower than normal
pub const DEFAULT_CONFIG_RATE: f32 = 0.8;

/// Voice, rate and pitch chosen by the user
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AudioConfig {
    /// Voice id, empty for the backend default
    pub selected_voice: String,
    pub pitch: f32,
    pub rate: f32,
    pub last_updated: DateTime<Utc>,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            selected_voice: String::new(),
            pitch: DEFAULT_PITCH,
            rate: DEFAULT_CONFIG_RATE,
            last_updated: DateTime::<Utc>::UNIX_EPOCH,
        }
    }
}

impl AudioConfig {
    /// Bring a record read from storage back into valid ranges
    pub fn reconciled(mut self) -> Self {
        self.rate = clamp_param(self.rate, RATE_RANGE, DEFAULT_CONFIG_RATE);
        self.pitch = clamp_param(self.pitch, PITCH_RANGE, DEFAULT_PITCH);
        self.selected_voice = self.selected_voice.trim().to_string();
        self
    }

    /// Build a request for `text` carrying these preferences
    pub fn request(&self, text: impl Into<String>, language: &str) -> SpeechRequest {
        SpeechRequest::new(text)
            .language(language)
            .rate(self.rate)
            .pitch(self.pitch)
            .voice(self.selected_voice.clone())
    }
}

/// Owner of the in-memory `AudioConfig` and its persisted copy
pub struct AudioConfigStore {
    store: Box<dyn KeyValueStore>,
    config: AudioConfig,
}

impl AudioConfigStore {
    /// Open the store and load the persisted record
    ///
    /// Never fails: unreadable or missing data yields defaults.
    pub fn open(store: Box<dyn KeyValueStore>) -> Self {
        let mut this = Self {
            store,
            config: AudioConfig::default(),
        };
        this.config = this.load();
        this
    }

    /// Read the persisted record, falling back to defaults
    pub fn load(&self) -> AudioConfig {
        let raw = match self.store.get(AUDIO_CONFIG_KEY) {
            Ok(Some(raw)) => raw,
            Ok(None) => {
                info!("No stored audio config found. Using defaults.");
                return AudioConfig::default();
            }
            Err(e) => {
                warn!("Failed to read audio config: {}. Using defaults.", e);
                return AudioConfig::default();
            }
        };

        match serde_json::from_str::<AudioConfig>(&raw) {
            Ok(config) => {
                debug!("Loaded audio config: {:?}", config);
                config.reconciled()
            }
            Err(e) => {
                warn!("Failed to deserialize stored audio config: {}. Using defaults.", e);
                AudioConfig::default()
            }
        }
    }

    /// Reload the in-memory copy from storage
    pub fn reload(&mut self) -> &AudioConfig {
        self.config = self.load();
        &self.config
    }

    pub fn config(&self) -> &AudioConfig {
        &self.config
    }

    /// The single save path: stamp, keep in memory, write whole
    ///
    /// The in-memory copy is updated even when the write fails.
    pub fn save(&mut self, config: AudioConfig) -> Result<()> {
        let mut config = config.reconciled();
        config.last_updated = Utc::now();
        self.config = config;

        let json = serde_json::to_string(&self.config)?;
        self.store.set(AUDIO_CONFIG_KEY, &json).map_err(|e| {
            error!("Failed to save audio config: {}", e);
            e
        })
    }

    pub fn set_rate(&mut self, rate: f32) -> Result<()> {
        let mut config = self.config.clone();
        config.rate = rate;
        self.save(config)
    }

    pub fn set_pitch(&mut self, pitch: f32) -> Result<()> {
        let mut config = self.config.clone();
        config.pitch = pitch;
        self.save(config)
    }

    pub fn set_voice(&mut self, voice: impl Into<String>) -> Result<()> {
        let mut config = self.config.clone();
        config.selected_voice = voice.into();
        self.save(config)
    }

    /// Forget the user's choices
    pub fn reset_to_defaults(&mut self) -> Result<()> {
        self.save(AudioConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::storage::MemoryStore;

    #[test]
    fn test_defaults_when_empty() {
        let store = AudioConfigStore::open(Box::new(MemoryStore::new()));
        assert_eq!(store.config(), &AudioConfig::default());
        assert_eq!(store.config().rate, 0.8);
    }

    #[test]
    fn test_reconcile_fills_and_clamps() {
        let mut kv = MemoryStore::new();
        kv.set(AUDIO_CONFIG_KEY, r#"{"rate": 9.0, "selectedVoice": " luciana "}"#)
            .unwrap();
        let store = AudioConfigStore::open(Box::new(kv));

        assert_eq!(store.config().rate, 2.0);
        assert_eq!(store.config().pitch, 1.0);
        assert_eq!(store.config().selected_voice, "luciana");
    }

    #[test]
    fn test_garbage_record_yields_defaults() {
        let mut kv = MemoryStore::new();
        kv.set(AUDIO_CONFIG_KEY, "[1, 2").unwrap();
        let store = AudioConfigStore::open(Box::new(kv));
        assert_eq!(store.config(), &AudioConfig::default());
    }

    #[test]
    fn test_serialized_field_names() {
        let json = serde_json::to_value(AudioConfig::default()).unwrap();
        for key in ["selectedVoice", "pitch", "rate", "lastUpdated"] {
            assert!(json.get(key).is_some(), "missing {}", key);
        }
    }

    #[test]
    fn test_request_uses_preferences() {
        let config = AudioConfig {
            selected_voice: "luciana".to_string(),
            pitch: 1.2,
            rate: 0.6,
            ..AudioConfig::default()
        };
        let req = config.request("bola", "pt-BR");
        assert_eq!(req.voice.as_deref(), Some("luciana"));
        assert_eq!(req.rate, 0.6);
        assert_eq!(req.pitch, 1.2);

        let req = AudioConfig::default().request("bola", "pt-BR");
        assert_eq!(req.voice, None);
    }
}
