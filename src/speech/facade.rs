//! Speech service facade
//!
//! `SpeechService` is the single entry point the app talks to. It is built
//! explicitly and passed around; on first use it probes the environment,
//! picks a backend, initializes it, and keeps it until `reset` or `dispose`.

use crate::platform::{Environment, EnvironmentProbe, HostProbe};
use crate::speech::backend::{BackendKind, SpeechBackend, StopHandle, Voice, DEFAULT_POLL_INTERVAL};
use crate::speech::backends::{NativeBackend, ProcessBackend};
use crate::speech::request::{
    NoopObserver, SpeechObserver, SpeechOutcome, SpeechRequest, DEFAULT_LANGUAGE,
};
use crate::state::config::Settings;
use crate::{FirstWordsError, Result};
use log::{debug, error, info, warn};
use std::time::Duration;

/// Builds adapters on demand
pub trait BackendFactory: Send {
    fn create(&self, kind: BackendKind) -> Box<dyn SpeechBackend>;
}

/// Factory for the real adapters
#[derive(Debug, Clone, Copy)]
pub struct DefaultBackendFactory {
    pub poll_interval: Duration,
}

impl Default for DefaultBackendFactory {
    fn default() -> Self {
        Self {
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }
}

impl BackendFactory for DefaultBackendFactory {
    fn create(&self, kind: BackendKind) -> Box<dyn SpeechBackend> {
        match kind {
            BackendKind::Native => Box::new(NativeBackend::with_poll_interval(self.poll_interval)),
            BackendKind::Process => Box::new(ProcessBackend::with_poll_interval(self.poll_interval)),
        }
    }
}

/// Selection knobs
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceOptions {
    /// Skip environment-based selection
    pub backend_override: Option<BackendKind>,
    /// Try the other adapter when the selected one is unavailable
    pub fallback: bool,
    /// Used when a request's language tag is unusable
    pub language: String,
}

impl Default for ServiceOptions {
    fn default() -> Self {
        Self {
            backend_override: None,
            fallback: true,
            language: DEFAULT_LANGUAGE.to_string(),
        }
    }
}

impl ServiceOptions {
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            backend_override: settings.backend_override(),
            fallback: settings.fallback(),
            language: settings.language(),
        }
    }
}

/// Lifecycle of the facade
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServiceState {
    Uninitialized,
    Probing,
    Initialized,
}

/// Facade over the selected speech backend
pub struct SpeechService {
    probe: Box<dyn EnvironmentProbe>,
    factory: Box<dyn BackendFactory>,
    options: ServiceOptions,
    state: ServiceState,
    environment: Option<Environment>,
    backend: Option<Box<dyn SpeechBackend>>,
    stop: StopHandle,
}

impl SpeechService {
    pub fn new(
        probe: Box<dyn EnvironmentProbe>,
        factory: Box<dyn BackendFactory>,
        options: ServiceOptions,
    ) -> Self {
        Self {
            probe,
            factory,
            options,
            state: ServiceState::Uninitialized,
            environment: None,
            backend: None,
            stop: StopHandle::new(),
        }
    }

    /// Service wired to the host probe and the real adapters
    pub fn from_settings(settings: &Settings) -> Self {
        Self::new(
            Box::new(HostProbe),
            Box::new(DefaultBackendFactory {
                poll_interval: settings.poll_interval(),
            }),
            ServiceOptions::from_settings(settings),
        )
    }

    pub fn state(&self) -> ServiceState {
        self.state
    }

    pub fn is_initialized(&self) -> bool {
        self.state == ServiceState::Initialized
    }

    /// Environment seen by the last probe
    pub fn environment(&self) -> Option<Environment> {
        self.environment
    }

    /// Kind of the cached backend, if any
    pub fn backend_kind(&self) -> Option<BackendKind> {
        self.backend.as_ref().map(|b| b.kind())
    }

    pub fn options(&self) -> &ServiceOptions {
        &self.options
    }

    /// Handle for stopping a waited utterance from another thread
    pub fn stop_handle(&self) -> StopHandle {
        self.stop.clone()
    }

    /// Probe, select and initialize a backend
    ///
    /// A no-op when already initialized. On failure the facade stays
    /// `Uninitialized` and the next operation tries again.
    pub fn initialize(&mut self) -> Result<BackendKind> {
        if let (ServiceState::Initialized, Some(backend)) = (self.state, self.backend.as_ref()) {
            debug!("Speech service already initialized with {} backend", backend.kind());
            return Ok(backend.kind());
        }

        self.state = ServiceState::Probing;
        let env = self.probe.detect();
        info!(
            "Detected {} platform, {} runtime{}",
            env.platform,
            env.runtime,
            if env.wsl { " (WSL)" } else { "" }
        );
        self.environment = Some(env);

        let primary = self
            .options
            .backend_override
            .unwrap_or_else(|| BackendKind::for_environment(&env));
        let mut candidates = vec![primary];
        if self.options.fallback {
            candidates.push(primary.alternate());
        }

        let mut failures = Vec::new();
        for kind in candidates {
            info!("Trying {} speech backend...", kind);
            let mut backend = self.factory.create(kind);
            match backend.initialize() {
                Ok(()) => {
                    info!("✓ Successfully initialized {} backend", kind);
                    self.backend = Some(backend);
                    self.state = ServiceState::Initialized;
                    return Ok(kind);
                }
                Err(e) => {
                    info!("✗ {} backend unavailable: {}", kind, e);
                    failures.push(format!("{}: {}", kind, e));
                }
            }
        }

        self.backend = None;
        self.state = ServiceState::Uninitialized;
        let message = format!("No speech backend available. Tried: {}", failures.join("; "));
        error!("{}", message);
        Err(FirstWordsError::Unavailable(message))
    }

    /// Speak without lifecycle callbacks
    pub fn speak(&mut self, request: &SpeechRequest) -> Result<SpeechOutcome> {
        self.speak_with(request, &mut NoopObserver)
    }

    /// Speak a request, reporting lifecycle events to `observer`
    ///
    /// Returns `Err` for an invalid request or when no backend can be
    /// initialized; no callback fires in either case. A new utterance
    /// interrupts one still playing.
    pub fn speak_with(
        &mut self,
        request: &SpeechRequest,
        observer: &mut dyn SpeechObserver,
    ) -> Result<SpeechOutcome> {
        let request = request.normalized(&self.options.language)?;
        self.initialize()?;

        let backend = self
            .backend
            .as_mut()
            .ok_or_else(|| FirstWordsError::Unavailable("speech backend missing".to_string()))?;
        debug!(
            "Speaking {:?} ({}, rate {}, pitch {}) via {} backend",
            request.text,
            request.language,
            request.rate,
            request.pitch,
            backend.kind()
        );
        backend.speak(&request, observer, &self.stop)
    }

    /// Best-effort stop of current playback
    pub fn stop(&mut self) {
        match self.backend.as_mut() {
            Some(backend) => backend.stop(),
            None => debug!("Stop requested with no backend selected, nothing to do"),
        }
    }

    /// Voices of the selected backend; empty if none can be initialized
    pub fn list_voices(&mut self) -> Vec<Voice> {
        if let Err(e) = self.initialize() {
            warn!("Cannot list voices: {}", e);
            return Vec::new();
        }
        self.backend
            .as_mut()
            .map(|backend| backend.list_voices())
            .unwrap_or_default()
    }

    pub fn is_speaking(&mut self) -> bool {
        self.backend
            .as_mut()
            .map(|backend| backend.is_speaking())
            .unwrap_or(false)
    }

    /// Forget the selected backend so the next call probes again
    pub fn reset(&mut self) {
        info!("Resetting speech service");
        self.release();
        self.state = ServiceState::Uninitialized;
        self.environment = None;
    }

    /// Stop playback and release the backend for good
    pub fn dispose(mut self) {
        info!("Disposing speech service");
        self.release();
    }

    fn release(&mut self) {
        if let Some(mut backend) = self.backend.take() {
            backend.stop();
        }
        self.stop.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::{FixedProbe, Platform, RuntimeMode};

    /// Factory whose adapters never initialize
    struct NothingAvailable;

    struct DeadBackend(BackendKind);

    impl SpeechBackend for DeadBackend {
        fn kind(&self) -> BackendKind {
            self.0
        }
        fn is_initialized(&self) -> bool {
            false
        }
        fn initialize(&mut self) -> Result<()> {
            Err(FirstWordsError::Unavailable(format!("{} missing", self.0)))
        }
        fn start(&mut self, _request: &SpeechRequest) -> Result<()> {
            unreachable!("never initialized")
        }
        fn poll(&mut self) -> Result<crate::speech::backend::Playback> {
            unreachable!("never initialized")
        }
        fn halt(&mut self) -> Result<()> {
            Ok(())
        }
        fn voices(&mut self) -> Result<Vec<Voice>> {
            Ok(Vec::new())
        }
    }

    impl BackendFactory for NothingAvailable {
        fn create(&self, kind: BackendKind) -> Box<dyn SpeechBackend> {
            Box::new(DeadBackend(kind))
        }
    }

    fn service() -> SpeechService {
        SpeechService::new(
            Box::new(FixedProbe(Environment {
                platform: Platform::Ios,
                runtime: RuntimeMode::Standalone,
                wsl: false,
            })),
            Box::new(NothingAvailable),
            ServiceOptions::default(),
        )
    }

    #[test]
    fn test_failed_initialize_stays_uninitialized() {
        let mut service = service();
        let err = service.initialize().unwrap_err();
        assert!(err.is_unavailable());
        assert_eq!(service.state(), ServiceState::Uninitialized);
        assert_eq!(service.backend_kind(), None);
        assert!(err.to_string().contains("native"));
        assert!(err.to_string().contains("process"));
    }

    #[test]
    fn test_invalid_request_rejected_before_init() {
        let mut service = service();
        let err = service.speak(&SpeechRequest::new("")).unwrap_err();
        assert!(matches!(err, FirstWordsError::InvalidRequest(_)));
        assert_eq!(service.environment(), None);
    }

    #[test]
    fn test_stop_without_backend_is_noop() {
        let mut service = service();
        service.stop();
        assert!(!service.is_speaking());
        assert!(service.list_voices().is_empty());
    }

    #[test]
    fn test_options_from_settings() {
        let mut settings = Settings::defaults();
        settings.set("speech", "backend", "native");
        settings.set("speech", "fallback", "false");
        let options = ServiceOptions::from_settings(&settings);
        assert_eq!(options.backend_override, Some(BackendKind::Native));
        assert!(!options.fallback);
        assert_eq!(options.language, "pt-BR");
    }
}
