//! Native TTS backend using the tts crate
//!
//! This backend uses the `tts` crate which provides a unified interface to:
//! - Speech Dispatcher on Linux (via native bindings)
//! - AVFoundation on macOS/iOS
//! - WinRT on Windows, the Web Speech API on wasm, Android TTS
//!
//! It is the backend for standalone builds.

use crate::speech::backend::{BackendKind, Playback, SpeechBackend, Voice, DEFAULT_POLL_INTERVAL};
use crate::speech::request::{primary_language, SpeechRequest, PITCH_RANGE, RATE_RANGE};
use crate::{FirstWordsError, Result};
use log::{debug, error, warn};
use std::ops::RangeInclusive;
use std::time::Duration;
use tts::Tts as TtsCrate;

/// How long after `speak` the engine may still report not speaking
///
/// Speech Dispatcher flips its speaking flag from an asynchronous begin
/// callback, so the first polls after `speak` can read false.
pub const START_GRACE: Duration = Duration::from_secs(2);

/// Engine-reported parameter range
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EngineRange {
    pub min: f32,
    pub normal: f32,
    pub max: f32,
}

impl EngineRange {
    /// Map a request multiplier onto this engine range
    ///
    /// 1.0 lands on `normal`; the ends of `request_range` land on `min` and
    /// `max`, linearly on either side.
    pub fn scale(&self, multiplier: f32, request_range: RangeInclusive<f32>) -> f32 {
        let (lo, hi) = (*request_range.start(), *request_range.end());
        let m = multiplier.clamp(lo, hi);
        let value = if m >= 1.0 {
            self.normal + (m - 1.0) / (hi - 1.0) * (self.max - self.normal)
        } else {
            self.normal - (1.0 - m) / (1.0 - lo) * (self.normal - self.min)
        };
        value.clamp(self.min, self.max)
    }
}

/// Native TTS backend using the tts crate
pub struct NativeBackend {
    /// The tts crate's TTS instance, set by `initialize`
    tts: Option<TtsCrate>,

    /// Voices fetched at initialization, used to resolve language to voice
    voices: Vec<Voice>,

    /// Voice id currently selected on the engine
    current_voice: Option<String>,

    poll_interval: Duration,
}

impl NativeBackend {
    pub fn new() -> Self {
        Self::with_poll_interval(DEFAULT_POLL_INTERVAL)
    }

    pub fn with_poll_interval(poll_interval: Duration) -> Self {
        Self {
            tts: None,
            voices: Vec::new(),
            current_voice: None,
            poll_interval,
        }
    }

    fn engine(&mut self) -> Result<&mut TtsCrate> {
        self.tts
            .as_mut()
            .ok_or_else(|| FirstWordsError::Unavailable("native TTS not initialized".to_string()))
    }

    fn fetch_voices(tts: &TtsCrate) -> Result<Vec<Voice>> {
        let voices = tts
            .voices()
            .map_err(|e| FirstWordsError::Playback(format!("Failed to get voices: {}", e)))?;

        Ok(voices
            .iter()
            .map(|v| Voice {
                id: v.id(),
                name: v.name(),
                language: v.language().to_string(),
            })
            .collect())
    }

    /// Pick a voice for a request: explicit id first, then exact language,
    /// then primary language (`pt-BR` matches `pt-PT` before nothing)
    pub fn resolve_voice<'a>(voices: &'a [Voice], request: &SpeechRequest) -> Option<&'a Voice> {
        if let Some(id) = &request.voice {
            if let Some(voice) = voices.iter().find(|v| &v.id == id || &v.name == id) {
                return Some(voice);
            }
            warn!("Voice {:?} not offered by the native engine", id);
        }

        voices
            .iter()
            .find(|v| v.language.eq_ignore_ascii_case(&request.language))
            .or_else(|| {
                let wanted = primary_language(&request.language);
                voices
                    .iter()
                    .find(|v| primary_language(&v.language).eq_ignore_ascii_case(wanted))
            })
    }

    /// Push rate, pitch and voice for one request onto the engine
    fn apply(&mut self, request: &SpeechRequest) -> Result<()> {
        let wanted = Self::resolve_voice(&self.voices, request).map(|v| v.id.clone());
        let voice_is_current = wanted.is_none() || wanted == self.current_voice;
        let tts = self.engine()?;
        let features = tts.supported_features();

        if features.rate {
            let range = EngineRange {
                min: tts.min_rate(),
                normal: tts.normal_rate(),
                max: tts.max_rate(),
            };
            tts.set_rate(range.scale(request.rate, RATE_RANGE))
                .map_err(|e| FirstWordsError::Playback(format!("Failed to set rate: {}", e)))?;
        } else {
            debug!("Rate control not supported on this platform");
        }

        if features.pitch {
            let range = EngineRange {
                min: tts.min_pitch(),
                normal: tts.normal_pitch(),
                max: tts.max_pitch(),
            };
            tts.set_pitch(range.scale(request.pitch, PITCH_RANGE))
                .map_err(|e| FirstWordsError::Playback(format!("Failed to set pitch: {}", e)))?;
        } else {
            debug!("Pitch control not supported on this platform");
        }

        if !features.voice || voice_is_current {
            return Ok(());
        }

        let engine_voice = tts
            .voices()
            .map_err(|e| FirstWordsError::Playback(format!("Failed to get voices: {}", e)))?
            .into_iter()
            .find(|v| Some(v.id()) == wanted);
        if let Some(voice) = engine_voice {
            debug!("Selecting voice: {}", voice.id());
            tts.set_voice(&voice)
                .map_err(|e| FirstWordsError::Playback(format!("Failed to set voice: {}", e)))?;
            self.current_voice = wanted;
        }

        Ok(())
    }
}

impl Default for NativeBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl SpeechBackend for NativeBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Native
    }

    fn is_initialized(&self) -> bool {
        self.tts.is_some()
    }

    fn initialize(&mut self) -> Result<()> {
        if self.is_initialized() {
            debug!("Native TTS backend already initialized");
            return Ok(());
        }

        debug!("Creating native TTS backend");
        let tts = TtsCrate::default()
            .map_err(|e| FirstWordsError::Unavailable(format!("Failed to initialize TTS: {}", e)))?;

        self.voices = match Self::fetch_voices(&tts) {
            Ok(voices) => voices,
            Err(e) => {
                warn!("Native engine gave no voice list: {}", e);
                Vec::new()
            }
        };
        debug!("Native TTS backend created with {} voices", self.voices.len());

        self.tts = Some(tts);
        Ok(())
    }

    fn start(&mut self, request: &SpeechRequest) -> Result<()> {
        self.apply(request)?;

        debug!("Speaking: {}", request.text);
        self.engine()?.speak(request.text.as_str(), true).map_err(|e| {
            error!("Failed to speak: {}", e);
            FirstWordsError::Playback(format!("Speak failed: {}", e))
        })?;

        Ok(())
    }

    fn poll(&mut self) -> Result<Playback> {
        let tts = self.engine()?;
        if !tts.supported_features().is_speaking {
            // Cannot observe playback; treat the utterance as handed off
            return Ok(Playback::Idle);
        }

        match tts.is_speaking() {
            Ok(true) => Ok(Playback::Playing),
            Ok(false) => Ok(Playback::Idle),
            Err(e) => Err(FirstWordsError::Playback(format!("Failed to query playback: {}", e))),
        }
    }

    fn halt(&mut self) -> Result<()> {
        debug!("Canceling speech");
        self.engine()?.stop().map_err(|e| {
            error!("Failed to cancel speech: {}", e);
            FirstWordsError::Playback(format!("Cancel failed: {}", e))
        })?;

        Ok(())
    }

    fn voices(&mut self) -> Result<Vec<Voice>> {
        let voices = Self::fetch_voices(self.engine()?)?;
        self.voices = voices.clone();
        Ok(voices)
    }

    fn poll_interval(&self) -> Duration {
        self.poll_interval
    }

    fn start_grace(&self) -> Duration {
        match &self.tts {
            Some(tts) if tts.supported_features().is_speaking => START_GRACE,
            _ => Duration::ZERO,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn voice(id: &str, language: &str) -> Voice {
        Voice {
            id: id.to_string(),
            name: id.to_uppercase(),
            language: language.to_string(),
        }
    }

    #[test]
    fn test_create_native_backend() {
        // May fail without speech-dispatcher (Linux) or in CI without audio
        let mut backend = NativeBackend::new();
        match backend.initialize() {
            Ok(_) => println!("✓ Native TTS backend initialized successfully"),
            Err(e) => println!("⚠ TTS initialization failed (may be expected in CI): {}", e),
        }
    }

    #[test]
    fn test_rate_scaling() {
        let range = EngineRange {
            min: 0.1,
            normal: 1.0,
            max: 10.0,
        };
        assert_eq!(range.scale(1.0, RATE_RANGE), 1.0);
        assert_eq!(range.scale(2.0, RATE_RANGE), 10.0);
        assert!((range.scale(0.1, RATE_RANGE) - 0.1).abs() < 1e-4);
        assert!((range.scale(1.5, RATE_RANGE) - 5.5).abs() < 1e-4);
        assert_eq!(range.scale(50.0, RATE_RANGE), 10.0);
    }

    #[test]
    fn test_pitch_scaling() {
        let range = EngineRange {
            min: 0.0,
            normal: 1.0,
            max: 2.0,
        };
        assert_eq!(range.scale(1.0, PITCH_RANGE), 1.0);
        assert_eq!(range.scale(0.5, PITCH_RANGE), 0.0);
        assert!((range.scale(0.75, PITCH_RANGE) - 0.5).abs() < 1e-4);
    }

    #[test]
    fn test_resolve_voice() {
        let voices = vec![voice("en", "en-US"), voice("luciana", "pt-BR"), voice("joana", "pt-PT")];

        let req = SpeechRequest::new("oi").language("pt-BR");
        assert_eq!(NativeBackend::resolve_voice(&voices, &req).unwrap().id, "luciana");

        let req = SpeechRequest::new("oi").language("pt-AO");
        assert_eq!(NativeBackend::resolve_voice(&voices, &req).unwrap().id, "luciana");

        let req = SpeechRequest::new("oi").language("pt-BR").voice("joana");
        assert_eq!(NativeBackend::resolve_voice(&voices, &req).unwrap().id, "joana");

        let req = SpeechRequest::new("hi").language("de-DE");
        assert!(NativeBackend::resolve_voice(&voices, &req).is_none());
    }

    #[test]
    fn test_uninitialized_operations_degrade() {
        let mut backend = NativeBackend::new();
        assert!(!backend.is_speaking());
        backend.stop();
        assert!(backend.poll().is_err());
        assert_eq!(backend.start_grace(), Duration::ZERO);
    }
}
