//! Codec error type.

use thiserror::Error;

/// Structural framing errors.
///
/// Everything here means "drop the frame": the receive pipeline recovers
/// locally by logging and discarding. Authentication failures are not
/// represented at this layer; tag verification returns `bool` and the
/// protocol engines map a mismatch to their own error kinds.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    /// Buffer shorter than the minimum for its frame type.
    #[error("frame too short: expected at least {expected} bytes, got {actual}")]
    FrameTooShort {
        /// Minimum length for the attempted parse
        expected: usize,
        /// Bytes actually available
        actual: usize,
    },

    /// Buffer length outside the accepted set for its frame type.
    #[error("invalid frame length {actual}, expected exactly {expected}")]
    InvalidLength {
        /// The only length this frame type accepts
        expected: usize,
        /// Bytes actually available
        actual: usize,
    },

    /// A record header claims more payload than the buffer holds.
    #[error("record truncated: header claims {claimed} bytes, {available} remain")]
    RecordTruncated {
        /// Payload length from the record header
        claimed: usize,
        /// Bytes left in the buffer
        available: usize,
    },

    /// Record length field below the 1-byte minimum (the type tag).
    #[error("record length field must be at least 1")]
    EmptyRecord,

    /// Byte does not name a known payload type.
    #[error("unknown data type tag {0:#04x}")]
    UnknownDataType(u8),
}
