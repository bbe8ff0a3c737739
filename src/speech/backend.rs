//! Speech backend abstraction
//!
//! Both adapters implement `SpeechBackend`. The trait supplies `speak` as a
//! provided method so the lifecycle (lazy init, start, wait, exactly one
//! terminal callback) is identical no matter which engine is underneath.

use crate::platform::{Environment, RuntimeMode};
use crate::speech::request::{SpeechObserver, SpeechOutcome, SpeechRequest};
use crate::{FirstWordsError, Result};
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

/// Default interval between playback polls while waiting
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(20);

/// A voice offered by a backend
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Voice {
    /// Identifier accepted back by the same backend
    pub id: String,
    pub name: String,
    /// Locale tag, e.g. `pt-BR`
    pub language: String,
}

/// The closed set of adapters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendKind {
    /// Platform engine through the `tts` crate
    Native,
    /// One `espeak-ng` process per utterance
    Process,
}

impl BackendKind {
    /// Adapter to use for an environment
    ///
    /// The preview runtime has no native speech bindings linked in, and under
    /// WSL the platform engine is rarely configured, so both use a process.
    pub fn for_environment(env: &Environment) -> Self {
        if env.runtime == RuntimeMode::ManagedPreview || env.wsl {
            BackendKind::Process
        } else {
            BackendKind::Native
        }
    }

    /// The other adapter, tried when fallback is enabled
    pub fn alternate(self) -> Self {
        match self {
            BackendKind::Native => BackendKind::Process,
            BackendKind::Process => BackendKind::Native,
        }
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BackendKind::Native => f.write_str("native"),
            BackendKind::Process => f.write_str("process"),
        }
    }
}

impl FromStr for BackendKind {
    type Err = FirstWordsError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "native" | "tts" => Ok(BackendKind::Native),
            "process" | "espeak" | "espeak-ng" => Ok(BackendKind::Process),
            other => Err(FirstWordsError::Config(format!(
                "Unknown speech backend: {}. Available: native, process",
                other
            ))),
        }
    }
}

/// Playback state reported by `SpeechBackend::poll`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Playback {
    Playing,
    Idle,
}

/// Cross-thread stop request for an utterance being waited on
#[derive(Debug, Clone, Default)]
pub struct StopHandle(Arc<AtomicBool>);

impl StopHandle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Ask the current utterance to stop
    pub fn request_stop(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_stop_requested(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    /// Consume a pending request
    pub fn take(&self) -> bool {
        self.0.swap(false, Ordering::SeqCst)
    }

    pub fn clear(&self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

/// Speech backend trait
///
/// Implementors provide the engine-specific primitives; `speak` is shared.
pub trait SpeechBackend: Send {
    fn kind(&self) -> BackendKind;

    fn is_initialized(&self) -> bool;

    /// Acquire the underlying mechanism
    ///
    /// Must be a no-op returning `Ok` when already initialized.
    fn initialize(&mut self) -> Result<()>;

    /// Begin playback of an already-normalized request
    fn start(&mut self, request: &SpeechRequest) -> Result<()>;

    /// Check on the utterance started last
    ///
    /// `Err` means playback failed; it is reported through `on_error`.
    fn poll(&mut self) -> Result<Playback>;

    /// Silence current playback
    fn halt(&mut self) -> Result<()>;

    /// Enumerate voices from the engine
    fn voices(&mut self) -> Result<Vec<Voice>>;

    /// How often `speak` checks on a waited utterance
    fn poll_interval(&self) -> Duration {
        DEFAULT_POLL_INTERVAL
    }

    /// How long a started utterance may report `Idle` before it is first
    /// seen `Playing`
    ///
    /// Engines that report playback asynchronously need this; an `Idle`
    /// inside the window means "not begun yet", not "done".
    fn start_grace(&self) -> Duration {
        Duration::ZERO
    }

    /// Speak a request, reporting progress to `observer`
    ///
    /// Returns `Err` only when the backend cannot be initialized; in that case
    /// no callback fires. Playback failures come back as
    /// `Ok(SpeechOutcome::Errored)` after `on_error`.
    fn speak(
        &mut self,
        request: &SpeechRequest,
        observer: &mut dyn SpeechObserver,
        stop: &StopHandle,
    ) -> Result<SpeechOutcome> {
        if !self.is_initialized() {
            self.initialize()?;
        }

        // Interrupt-and-replace: whatever is still playing is cut off
        if self.is_speaking() {
            debug!("Interrupting previous utterance");
            self.stop();
        }
        stop.clear();

        if let Err(e) = self.start(request) {
            warn!("{} backend failed to start playback: {}", self.kind(), e);
            observer.on_start();
            let reason = e.to_string();
            observer.on_error(&reason);
            return Ok(SpeechOutcome::Errored(reason));
        }
        observer.on_start();

        if !request.wait {
            return Ok(SpeechOutcome::Started);
        }

        let interval = self.poll_interval();
        let grace = self.start_grace();
        Ok(wait_for_end(self, observer, stop, interval, grace))
    }

    /// Best-effort stop; never fails
    fn stop(&mut self) {
        if !self.is_initialized() {
            debug!("Stop requested before {} backend initialized, nothing to do", self.kind());
            return;
        }
        if !self.is_speaking() {
            debug!("Stop requested with nothing playing, ignoring");
            return;
        }
        if let Err(e) = self.halt() {
            warn!("Failed to stop {} backend: {}", self.kind(), e);
        }
    }

    /// Voices, or an empty list if the engine cannot be queried
    fn list_voices(&mut self) -> Vec<Voice> {
        if !self.is_initialized() {
            if let Err(e) = self.initialize() {
                warn!("Cannot list voices: {}", e);
                return Vec::new();
            }
        }
        match self.voices() {
            Ok(voices) => voices,
            Err(e) => {
                warn!("Failed to list {} voices: {}", self.kind(), e);
                Vec::new()
            }
        }
    }

    /// Whether audio is currently playing; false on any failure
    fn is_speaking(&mut self) -> bool {
        if !self.is_initialized() {
            return false;
        }
        matches!(self.poll(), Ok(Playback::Playing))
    }
}

/// Poll a started utterance until it ends or a stop is requested
///
/// `Idle` ends the utterance only once `Playing` has been seen or `grace`
/// has run out since the wait began. Fires exactly one terminal callback.
pub fn wait_for_end<B: SpeechBackend + ?Sized>(
    backend: &mut B,
    observer: &mut dyn SpeechObserver,
    stop: &StopHandle,
    interval: Duration,
    grace: Duration,
) -> SpeechOutcome {
    let began = Instant::now();
    let mut seen_playing = false;
    loop {
        if stop.take() {
            if let Err(e) = backend.halt() {
                warn!("Failed to halt {} backend: {}", backend.kind(), e);
            }
            debug!("Utterance stopped");
            observer.on_stopped();
            return SpeechOutcome::Stopped;
        }

        match backend.poll() {
            Ok(Playback::Playing) => {
                seen_playing = true;
                thread::sleep(interval);
            }
            Ok(Playback::Idle) if !seen_playing && began.elapsed() < grace => {
                thread::sleep(interval);
            }
            Ok(Playback::Idle) => {
                debug!("Utterance finished");
                observer.on_finish();
                return SpeechOutcome::Finished;
            }
            Err(e) => {
                let reason = e.to_string();
                warn!("Playback failed: {}", reason);
                observer.on_error(&reason);
                return SpeechOutcome::Errored(reason);
            }
        }
    }
}
