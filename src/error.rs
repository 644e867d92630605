//! Error types for the display protocol engine.

use std::time::Duration;

use thiserror::Error;

use crate::infrastructure::bluetooth::connection::ConnectionState;

/// Errors surfaced by the display protocol engine.
///
/// Encoding and validation errors are always returned before any BLE I/O is
/// attempted. Transport errors abort the remainder of the current packet.
#[derive(Debug, Error)]
pub enum Error {
    /// Discovery failed to start, timed out or was cancelled without a match.
    #[error("device {address} not found: {reason}")]
    DeviceNotFound { address: String, reason: String },

    /// The BLE adapter could not be enabled.
    #[error("bluetooth adapter unavailable: {0}")]
    AdapterUnavailable(String),

    /// Link-layer connect or GATT discovery error.
    #[error("failed to connect to {address}: {reason}")]
    ConnectFailed { address: String, reason: String },

    /// The peripheral does not expose the expected service profile.
    #[error("protocol mismatch: {0}")]
    ProtocolMismatch(String),

    #[error("invalid colour {0:?}, please use the format 'R, G, B' with values 0-255")]
    InvalidColourFormat(String),

    #[error("invalid clock style {0}, expected 0..=4")]
    InvalidStyle(u8),

    #[error("image of {len} bytes exceeds the maximum of {max} bytes")]
    ImageTooLarge { len: usize, max: usize },

    /// An operation needing a ready link was called in another state.
    #[error("device is not ready (state: {0:?})")]
    NotReady(ConnectionState),

    /// A fragment write was rejected; the remaining fragments were not sent.
    #[error("write of fragment {fragment} at offset {offset} failed: {reason}")]
    WriteFailed {
        fragment: usize,
        offset: usize,
        reason: String,
    },

    /// A fragment write did not complete in time. Retrying the whole operation is safe.
    #[error("write of fragment {fragment} timed out after {timeout:?}")]
    WriteTimeout { fragment: usize, timeout: Duration },
}

impl Error {
    /// Whether retrying the whole operation after a fresh connect may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::WriteTimeout { .. }
                | Self::WriteFailed { .. }
                | Self::ConnectFailed { .. }
                | Self::DeviceNotFound { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, Error>;
