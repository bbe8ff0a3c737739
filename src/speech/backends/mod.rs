//! Speech backend adapters

// Platform engine through the tts crate (standalone builds)
pub mod native;

// espeak-ng subprocess (managed preview, WSL)
pub mod process;

pub use native::NativeBackend;
pub use process::ProcessBackend;
