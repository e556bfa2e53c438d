//! Core value types for media-dl

use bytes::Bytes;
use std::fmt;

/// Snapshot of bytes transferred against the total size of one transfer
///
/// A `total_bytes` of zero means the length is not known yet.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Progress {
    /// Bytes received so far
    pub bytes_read: u64,
    /// Total bytes of the resource (0 = unknown)
    pub total_bytes: u64,
}

impl Progress {
    /// Create a new progress snapshot
    pub fn new(bytes_read: u64, total_bytes: u64) -> Self {
        Self {
            bytes_read,
            total_bytes,
        }
    }

    /// Fraction of the transfer that is done, in `[0, 1]`
    ///
    /// Returns `0.0` while the total is unknown.
    pub fn percentage(&self) -> f64 {
        if self.total_bytes == 0 {
            return 0.0;
        }
        (self.bytes_read as f64 / self.total_bytes as f64).clamp(0.0, 1.0)
    }

    /// Whether the total length has been learned
    pub fn is_length_known(&self) -> bool {
        self.total_bytes != 0
    }
}

impl fmt::Display for Progress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.1}%", self.percentage() * 100.0)
    }
}

/// Result of one successful transfer: content type plus raw payload
///
/// Cloning is cheap, the payload is reference counted.
#[derive(Clone, PartialEq, Eq)]
pub struct TransferOutcome {
    content_type: Option<String>,
    payload: Bytes,
}

impl TransferOutcome {
    /// Create an outcome
    pub fn new(content_type: Option<String>, payload: impl Into<Bytes>) -> Self {
        Self {
            content_type,
            payload: payload.into(),
        }
    }

    /// Declared content type, if the server sent one
    pub fn content_type(&self) -> Option<&str> {
        self.content_type.as_deref()
    }

    /// Raw bytes
    pub fn payload(&self) -> &Bytes {
        &self.payload
    }

    /// Payload length in bytes
    pub fn len(&self) -> usize {
        self.payload.len()
    }

    /// Whether the payload is empty
    pub fn is_empty(&self) -> bool {
        self.payload.is_empty()
    }
}

impl fmt::Debug for TransferOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "TransferOutcome[{} bytes, {}]",
            self.payload.len(),
            self.content_type.as_deref().unwrap_or("unknown type")
        )
    }
}
