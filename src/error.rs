//! Crate-wide error type.
//!
//! # Design Notes
//! - One enum for the whole pipeline: every stage funnels into the same
//!   error channel, so the variants are the union of what the stages can
//!   produce rather than per-stage enums.
//! - Cancellation is an error variant so it can travel the same channels
//!   as real failures, but it is classified out at the top level via
//!   [`Error::is_cancelled`] and never surfaces to the user.
//! - I/O errors preserve their source to keep diagnostics actionable.

use std::fmt;
use std::io;

/// Errors produced by configuration, scanning, and scratch management.
#[derive(Debug)]
#[non_exhaustive]
pub enum Error {
    /// Invalid command line or programmatic configuration.
    Config(String),
    /// I/O error during file operations.
    Io(io::Error),
    /// Keyword file could not be parsed.
    Yaml(serde_yaml::Error),
    /// The keyword list was empty at matcher construction.
    EmptyKeywords,
    /// A keyword record had an empty `word`.
    EmptyKeyword,
    /// A keyword exceeded the supported length bound.
    KeywordTooLong { len: usize, max: usize },
    /// No keywords survived the policy filter.
    NoPolicyMatch(String),
    /// Requested hit context exceeds what the streaming window can serve.
    ContextTooLarge { context: usize, max: usize },
    /// Ramdisk attach/mount/detach failure; carries the tool output.
    Ramdisk(String),
    /// Summary serialization failure (JSON).
    Json(serde_json::Error),
    /// Cooperative cancellation observed.
    Cancelled,
}

impl Error {
    /// True when this error is user-initiated cancellation rather than a
    /// failure. Cancellation is converted to a clean exit by the driver.
    #[inline]
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Error::Cancelled)
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Config(msg) => write!(f, "error: {msg}"),
            Error::Io(err) => write!(f, "{err}"),
            Error::Yaml(err) => write!(f, "error parsing keywords: {err}"),
            Error::EmptyKeywords => write!(f, "empty keywords"),
            Error::EmptyKeyword => write!(f, "empty keyword in dictionary"),
            Error::KeywordTooLong { len, max } => {
                write!(f, "keyword of {len} bytes exceeds supported maximum of {max} bytes")
            }
            Error::NoPolicyMatch(filter) => {
                write!(f, "no keywords matched policy filter: {filter}")
            }
            Error::ContextTooLarge { context, max } => {
                write!(f, "context of {context} bytes cannot exceed {max} bytes")
            }
            Error::Ramdisk(detail) => write!(f, "ramdisk error: {detail}"),
            Error::Json(err) => write!(f, "error writing summary: {err}"),
            Error::Cancelled => write!(f, "cancelled"),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Io(err) => Some(err),
            Error::Yaml(err) => Some(err),
            Error::Json(err) => Some(err),
            _ => None,
        }
    }
}

impl From<io::Error> for Error {
    fn from(err: io::Error) -> Self {
        Error::Io(err)
    }
}

impl From<serde_yaml::Error> for Error {
    fn from(err: serde_yaml::Error) -> Self {
        Error::Yaml(err)
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Json(err)
    }
}
