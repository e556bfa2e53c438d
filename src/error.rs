//! Error types for media-dl
//!
//! This module provides the error type shared by every layer of the library:
//! - Configuration errors (fatal at construction time, never retried)
//! - Transport errors raised by a single fetch attempt (usually transient)
//! - Permanent transfer failures wrapping the last transport error together
//!   with the byte counters reached before giving up
//! - Save and lookup errors raised by the domain layer

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for media-dl operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for media-dl
///
/// Each variant carries enough context to tell which resource or setting
/// failed. Errors travelling inside events are shared behind an `Arc`, so the
/// type itself does not need to be `Clone`.
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error with context about which setting is invalid
    #[error("configuration error: {message}")]
    Config {
        /// Human-readable error message describing the configuration issue
        message: String,
        /// The configuration key that caused the error (e.g., "bundle_pool_size")
        key: Option<String>,
    },

    /// Network error raised by the HTTP client
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    /// The server answered with a non-success status code
    #[error("HTTP {status} for {url}")]
    Http {
        /// Status code returned by the server
        status: u16,
        /// The requested URL
        url: String,
    },

    /// The response could not be used (empty body, bad headers, ...)
    #[error("malformed response from {url}: {reason}")]
    MalformedResponse {
        /// The requested URL
        url: String,
        /// What was wrong with the response
        reason: String,
    },

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A URL could not be parsed
    #[error("invalid URL: {0}")]
    Url(#[from] url::ParseError),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The operation is not allowed in the current lifecycle state
    #[error("invalid state: {0}")]
    InvalidState(String),

    /// A transfer gave up permanently
    ///
    /// Wraps the last transport error and records how far the transfer got.
    #[error("error reading {url} (read {read} of {total} bytes)")]
    Transfer {
        /// The URL being transferred
        url: String,
        /// Bytes received before giving up
        read: u64,
        /// Total bytes expected (0 if never learned)
        total: u64,
        /// The underlying failure of the last attempt
        #[source]
        source: Box<Error>,
    },

    /// An item was asked to save itself but its download failed
    #[error("nothing to save for {item}: the download was erroneous")]
    NothingToSave {
        /// Display name of the item
        item: String,
    },

    /// Writing an item to disk failed
    #[error("failed to save {path}: {reason}")]
    Save {
        /// Destination that could not be written
        path: PathBuf,
        /// The reason saving failed
        reason: String,
    },

    /// No registered reader understands the URL
    #[error("no reader available for {0}")]
    NoReader(String),

    /// Other error
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Shorthand for a configuration error tied to a config key
    pub fn config(message: impl Into<String>, key: impl Into<String>) -> Self {
        Error::Config {
            message: message.into(),
            key: Some(key.into()),
        }
    }

    /// Returns the innermost error of a [`Error::Transfer`] chain, or `self`
    pub fn root_cause(&self) -> &Error {
        match self {
            Error::Transfer { source, .. } => source.root_cause(),
            other => other,
        }
    }
}
