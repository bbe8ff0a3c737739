//! Startup initialization of the speech service
//!
//! Runs once when the app starts. Nothing here can abort startup: failures
//! are logged and the app carries on without audio.

use crate::speech::backend::BackendKind;
use crate::speech::facade::SpeechService;
use crate::speech::request::SpeechOutcome;
use crate::state::audio::AudioConfig;
use crate::state::config::Settings;
use log::{error, info, warn};
use std::thread;

/// What happened during startup initialization
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct InitReport {
    pub backend: Option<BackendKind>,
    /// Why initialization failed, if it did
    pub error: Option<String>,
    /// Outcome of the self-test utterance, when one ran
    pub self_test: Option<SpeechOutcome>,
}

impl InitReport {
    pub fn initialized(&self) -> bool {
        self.backend.is_some()
    }
}

/// Initialize `service` and optionally speak the self-test phrase
pub fn initialize_speech(
    service: &mut SpeechService,
    settings: &Settings,
    audio: &AudioConfig,
) -> InitReport {
    let mut report = InitReport::default();

    match service.initialize() {
        Ok(kind) => {
            info!("Speech ready using {} backend", kind);
            report.backend = Some(kind);
        }
        Err(e) => {
            error!("Speech initialization failed, continuing without audio: {}", e);
            report.error = Some(e.to_string());
            return report;
        }
    }

    if !settings.self_test() {
        return report;
    }

    thread::sleep(settings.self_test_delay());
    let request = audio.request(settings.self_test_phrase(), &settings.language());
    let outcome = match service.speak(&request) {
        Ok(outcome) => outcome,
        Err(e) => SpeechOutcome::Errored(e.to_string()),
    };

    match &outcome {
        SpeechOutcome::Finished | SpeechOutcome::Started => info!("Speech self-test passed"),
        other => warn!("Speech self-test did not complete: {:?}", other),
    }
    report.self_test = Some(outcome);
    report
}
