//! Speech service layer

pub mod backend;
pub mod backends;
pub mod facade;
pub mod initializer;
pub mod request;

pub use backend::{BackendKind, SpeechBackend, StopHandle, Voice};
pub use facade::{BackendFactory, DefaultBackendFactory, ServiceOptions, ServiceState, SpeechService};
pub use initializer::{initialize_speech, InitReport};
pub use request::{SpeechObserver, SpeechOutcome, SpeechRequest};
