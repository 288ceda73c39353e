//! End-device error type.

use loralite_core::{ConfigError, RadioError};
use loralite_proto::ProtocolError;
use thiserror::Error;

use crate::groups::BufferError;

/// Failures surfaced by the end-device role.
///
/// Frame-level problems on the receive path (`Frame`,
/// `AuthenticationFailed`, `UnknownSession`) are recovered by dropping
/// the frame; the poll loop logs them and carries on. `JoinFailed` is the
/// one handshake outcome reported to the caller as a value.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DeviceError {
    /// Join retries exhausted without a valid accept.
    #[error("join failed after {attempts} attempts")]
    JoinFailed {
        /// Attempts made.
        attempts: u32,
    },

    /// No session established for the peer.
    #[error("no session for {dev_eui}")]
    UnknownSession {
        /// Hex EUI the lookup used.
        dev_eui: String,
    },

    /// Frame tag did not verify.
    #[error("frame authentication failed")]
    AuthenticationFailed,

    /// Structurally invalid frame.
    #[error(transparent)]
    Frame(#[from] ProtocolError),

    /// Physical layer failure.
    #[error(transparent)]
    Radio(#[from] RadioError),

    /// Group-file buffer failure.
    #[error(transparent)]
    Buffer(#[from] BufferError),

    /// Rejected configuration.
    #[error(transparent)]
    Config(#[from] ConfigError),
}
