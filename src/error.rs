//! Error types for the speech layer

use std::io;
use thiserror::Error;

/// Main error type for firstwords
#[derive(Error, Debug)]
pub enum FirstWordsError {
    /// The speech mechanism is absent in this environment
    #[error("Speech backend unavailable: {0}")]
    Unavailable(String),

    /// The mechanism failed while producing an utterance
    #[error("Playback error: {0}")]
    Playback(String),

    /// Persisted key-value storage could not be read or written
    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Invalid speech request: {0}")]
    InvalidRequest(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("INI parse error: {0}")]
    IniParse(String),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

/// Result type alias for firstwords operations
pub type Result<T> = std::result::Result<T, FirstWordsError>;

impl FirstWordsError {
    /// True for the "no backend here" case, which callers treat as silence
    pub fn is_unavailable(&self) -> bool {
        matches!(self, FirstWordsError::Unavailable(_))
    }
}

impl From<serde_json::Error> for FirstWordsError {
    fn from(e: serde_json::Error) -> Self {
        FirstWordsError::Storage(format!("JSON error: {}", e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unavailable_detection() {
        assert!(FirstWordsError::Unavailable("no engine".into()).is_unavailable());
        assert!(!FirstWordsError::Playback("boom".into()).is_unavailable());
    }

    #[test]
    fn test_json_errors_map_to_storage() {
        let err: FirstWordsError = serde_json::from_str::<u32>("nope").unwrap_err().into();
        assert!(matches!(err, FirstWordsError::Storage(_)));
    }
}
