//! firstwords - speech layer of the My First Words learning app
//!
//! Picks a text-to-speech backend for the environment the app runs in,
//! speaks words through it, and keeps the child's voice preferences.

pub mod error;
pub mod platform;
pub mod speech;
pub mod state;

pub use error::{FirstWordsError, Result};

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
