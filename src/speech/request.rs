//! Speech requests, outcomes and lifecycle observers

use crate::{FirstWordsError, Result};
use log::warn;
use once_cell::sync::Lazy;
use regex::Regex;
use std::ops::RangeInclusive;

/// Accepted range for the rate multiplier (1.0 is the engine's normal rate)
pub const RATE_RANGE: RangeInclusive<f32> = 0.1..=2.0;

/// Accepted range for the pitch multiplier (1.0 is the engine's normal pitch)
pub const PITCH_RANGE: RangeInclusive<f32> = 0.5..=2.0;

pub const DEFAULT_RATE: f32 = 1.0;
pub const DEFAULT_PITCH: f32 = 1.0;

/// Language used when a request carries none or an unusable one
pub const DEFAULT_LANGUAGE: &str = "pt-BR";

/// BCP 47-ish locale tag: a 2-3 letter language plus optional subtags
static LANGUAGE_TAG: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[A-Za-z]{2,3}([-_][A-Za-z0-9]{2,8})*$").expect("valid language tag pattern")
});

/// One utterance to be spoken
#[derive(Debug, Clone, PartialEq)]
pub struct SpeechRequest {
    pub text: String,
    /// Locale tag such as `pt-BR`
    pub language: String,
    pub rate: f32,
    pub pitch: f32,
    /// Backend-specific voice identifier
    pub voice: Option<String>,
    /// Block until playback ends instead of returning once it starts
    pub wait: bool,
}

impl SpeechRequest {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            language: DEFAULT_LANGUAGE.to_string(),
            rate: DEFAULT_RATE,
            pitch: DEFAULT_PITCH,
            voice: None,
            wait: true,
        }
    }

    pub fn language(mut self, language: impl Into<String>) -> Self {
        self.language = language.into();
        self
    }

    pub fn rate(mut self, rate: f32) -> Self {
        self.rate = rate;
        self
    }

    pub fn pitch(mut self, pitch: f32) -> Self {
        self.pitch = pitch;
        self
    }

    pub fn voice(mut self, voice: impl Into<String>) -> Self {
        let voice = voice.into();
        self.voice = if voice.trim().is_empty() { None } else { Some(voice) };
        self
    }

    pub fn wait(mut self, wait: bool) -> Self {
        self.wait = wait;
        self
    }

    /// Validate and normalize the request before it reaches a backend
    ///
    /// Empty text is an error. Everything else is repaired: rate and pitch
    /// are clamped, and an unusable language tag is replaced with
    /// `fallback_language`.
    pub fn normalized(&self, fallback_language: &str) -> Result<SpeechRequest> {
        let text = self.text.trim();
        if text.is_empty() {
            return Err(FirstWordsError::InvalidRequest("text is empty".to_string()));
        }

        let language = match normalize_language(&self.language) {
            Some(tag) => tag,
            None => {
                warn!(
                    "Invalid language tag {:?}, using {}",
                    self.language, fallback_language
                );
                normalize_language(fallback_language).unwrap_or_else(|| DEFAULT_LANGUAGE.to_string())
            }
        };

        Ok(SpeechRequest {
            text: text.to_string(),
            language,
            rate: clamp_param(self.rate, RATE_RANGE, DEFAULT_RATE),
            pitch: clamp_param(self.pitch, PITCH_RANGE, DEFAULT_PITCH),
            voice: self
                .voice
                .as_deref()
                .map(str::trim)
                .filter(|v| !v.is_empty())
                .map(str::to_string),
            wait: self.wait,
        })
    }
}

/// Clamp a multiplier into `range`, replacing NaN/inf with `default`
pub fn clamp_param(value: f32, range: RangeInclusive<f32>, default: f32) -> f32 {
    if !value.is_finite() {
        return default;
    }
    value.clamp(*range.start(), *range.end())
}

/// Normalize a locale tag to `ll-RR` casing, or None if it is not one
///
/// Underscores are accepted as separators (`pt_br` → `pt-BR`).
pub fn normalize_language(tag: &str) -> Option<String> {
    let tag = tag.trim();
    if !LANGUAGE_TAG.is_match(tag) {
        return None;
    }

    let mut parts = tag.split(['-', '_']);
    let mut out = parts.next()?.to_ascii_lowercase();
    for part in parts {
        out.push('-');
        match part.len() {
            2 => out.push_str(&part.to_ascii_uppercase()),
            4 => {
                // Script subtag: Latn, Cyrl
                let mut chars = part.chars();
                if let Some(first) = chars.next() {
                    out.push(first.to_ascii_uppercase());
                    out.push_str(&chars.as_str().to_ascii_lowercase());
                }
            }
            _ => out.push_str(&part.to_ascii_lowercase()),
        }
    }
    Some(out)
}

/// Primary language subtag: `pt-BR` → `pt`
pub fn primary_language(tag: &str) -> &str {
    tag.split(['-', '_']).next().unwrap_or(tag)
}

/// How an utterance ended (or that it was only started)
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SpeechOutcome {
    /// Playback began and the caller asked not to wait for it
    Started,
    Finished,
    Errored(String),
    Stopped,
}

/// Lifecycle callbacks for one utterance
///
/// All methods default to no-ops. For a waited utterance `on_start` is
/// followed by exactly one of the three terminal callbacks.
/// An unwaited one only gets `on_start`.
pub trait SpeechObserver {
    fn on_start(&mut self) {}
    fn on_finish(&mut self) {}
    fn on_error(&mut self, _reason: &str) {}
    fn on_stopped(&mut self) {}
}

/// Observer that ignores every event
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopObserver;

impl SpeechObserver for NoopObserver {}

/// Lifecycle event as recorded by `RecordingObserver`
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SpeechEvent {
    Start,
    Finish,
    Error(String),
    Stopped,
}

/// Observer that keeps every event it receives, in order
#[derive(Debug, Default, Clone)]
pub struct RecordingObserver {
    pub events: Vec<SpeechEvent>,
}

impl SpeechObserver for RecordingObserver {
    fn on_start(&mut self) {
        self.events.push(SpeechEvent::Start);
    }

    fn on_finish(&mut self) {
        self.events.push(SpeechEvent::Finish);
    }

    fn on_error(&mut self, reason: &str) {
        self.events.push(SpeechEvent::Error(reason.to_string()));
    }

    fn on_stopped(&mut self) {
        self.events.push(SpeechEvent::Stopped);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_text_rejected() {
        let err = SpeechRequest::new("   ").normalized(DEFAULT_LANGUAGE).unwrap_err();
        assert!(matches!(err, FirstWordsError::InvalidRequest(_)));
    }

    #[test]
    fn test_rate_and_pitch_clamped() {
        let req = SpeechRequest::new("bola")
            .rate(5.0)
            .pitch(0.0)
            .normalized(DEFAULT_LANGUAGE)
            .unwrap();
        assert_eq!(req.rate, 2.0);
        assert_eq!(req.pitch, 0.5);

        let req = SpeechRequest::new("bola")
            .rate(f32::NAN)
            .normalized(DEFAULT_LANGUAGE)
            .unwrap();
        assert_eq!(req.rate, DEFAULT_RATE);
    }

    #[test]
    fn test_language_normalization() {
        assert_eq!(normalize_language("pt-br").as_deref(), Some("pt-BR"));
        assert_eq!(normalize_language("EN_us").as_deref(), Some("en-US"));
        assert_eq!(normalize_language("zh-hant-tw").as_deref(), Some("zh-Hant-TW"));
        assert_eq!(normalize_language("es-419").as_deref(), Some("es-419"));
        assert_eq!(normalize_language("not a tag"), None);
        assert_eq!(normalize_language(""), None);
    }

    #[test]
    fn test_language_pattern_shared_across_threads() {
        let handles: Vec<_> = ["pt_br", " en-gb ", "fr", "x1"]
            .into_iter()
            .map(|tag| std::thread::spawn(move || normalize_language(tag)))
            .collect();
        let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();

        assert_eq!(
            results,
            vec![
                Some("pt-BR".to_string()),
                Some("en-GB".to_string()),
                Some("fr".to_string()),
                None
            ]
        );
    }

    #[test]
    fn test_invalid_language_falls_back() {
        let req = SpeechRequest::new("gato")
            .language("??")
            .normalized("en-US")
            .unwrap();
        assert_eq!(req.language, "en-US");
    }

    #[test]
    fn test_text_and_voice_trimmed() {
        let req = SpeechRequest::new("  Olá  ")
            .voice("   ")
            .normalized(DEFAULT_LANGUAGE)
            .unwrap();
        assert_eq!(req.text, "Olá");
        assert_eq!(req.voice, None);
    }

    #[test]
    fn test_primary_language() {
        assert_eq!(primary_language("pt-BR"), "pt");
        assert_eq!(primary_language("en"), "en");
    }

    #[test]
    fn test_recording_observer() {
        let mut obs = RecordingObserver::default();
        obs.on_start();
        obs.on_error("oops");
        assert_eq!(
            obs.events,
            vec![SpeechEvent::Start, SpeechEvent::Error("oops".to_string())]
        );
    }
}
