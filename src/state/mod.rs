//! Persistent state: app settings and the user's audio preferences

pub mod audio;
pub mod config;
pub mod storage;

pub use audio::{AudioConfig, AudioConfigStore};
pub use config::Settings;
pub use storage::{FileStore, KeyValueStore, MemoryStore};
