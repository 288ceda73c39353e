//! Gateway error type.

use loralite_core::RadioError;
use loralite_proto::ProtocolError;
use thiserror::Error;

/// Failures surfaced by the gateway role.
///
/// All of these are recovered locally on the receive path: the frame is
/// dropped, the error logged, and no state is mutated. They are returned
/// as values so tests (and the downlink API) can observe the exact
/// outcome.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GatewayError {
    /// Length outside the accepted sets or structural parse failure.
    #[error(transparent)]
    Frame(#[from] ProtocolError),

    /// Frame length matched no dispatch rule.
    #[error("unroutable frame of {0} bytes")]
    UnroutableLength(usize),

    /// No session for the source identifier.
    #[error("no session for {dev_eui}")]
    UnknownSession {
        /// Hex EUI the lookup used.
        dev_eui: String,
    },

    /// HMAC or MIC mismatch.
    #[error("frame authentication failed")]
    AuthenticationFailed,

    /// A join request arrived for a device that already has a session.
    #[error("device {dev_eui} already joined")]
    AlreadyJoined {
        /// Hex EUI of the duplicate joiner.
        dev_eui: String,
    },

    /// Physical-layer failure.
    #[error(transparent)]
    Radio(#[from] RadioError),
}
