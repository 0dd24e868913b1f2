//! The one error type shared by every Syllatrack library crate.
//!
//! HTTP handlers turn [`SyllatrackError::Validation`] into a 400 and anything
//! else into a 500; the CLI reports through `color-eyre`.

use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum SyllatrackError {
    /// Caller input was missing or malformed. The message is shown verbatim.
    #[error("validation error: {message}")]
    Validation { message: String },

    /// A record or blob that must exist does not.
    #[error("not found: {0}")]
    NotFound(String),

    #[error("storage error: {0}")]
    Storage(String),

    /// The model endpoint answered with an error status or an empty reply.
    #[error("extraction error: {0}")]
    Extraction(String),

    #[error("network error: {0}")]
    Network(String),

    /// A body that should have been JSON was not.
    #[error("parse error: {0}")]
    Parse(String),

    #[error("config error: {message}")]
    Config { message: String },

    #[error("I/O error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
}

pub type Result<T> = std::result::Result<T, SyllatrackError>;

impl SyllatrackError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation {
            message: msg.into(),
        }
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// The unprefixed message of a validation error; `None` for every other kind.
    pub fn validation_message(&self) -> Option<&str> {
        match self {
            Self::Validation { message } => Some(message),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_carries_kind_prefix() {
        let err = SyllatrackError::config("LLM endpoint is empty");
        assert_eq!(err.to_string(), "config error: LLM endpoint is empty");

        let err = SyllatrackError::validation("courseName is required");
        assert_eq!(err.to_string(), "validation error: courseName is required");
    }

    #[test]
    fn only_validation_has_a_caller_message() {
        let err = SyllatrackError::validation("fileBase64 is required");
        assert_eq!(err.validation_message(), Some("fileBase64 is required"));
        assert_eq!(SyllatrackError::Network("down".into()).validation_message(), None);
        assert_eq!(SyllatrackError::NotFound("blob".into()).validation_message(), None);
    }
}
