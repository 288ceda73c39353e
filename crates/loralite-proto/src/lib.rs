//! Wire formats for the loralite protocol.
//!
//! Three frame shapes exist on the air:
//!
//! - `JoinRequest` (exactly 22 bytes): device → gateway handshake opener.
//! - `JoinAccept` (exactly 16 bytes): gateway → device, AES-ECB sealed.
//! - `DataFrame` (33 bytes or more): authenticated-encrypted payload in
//!   either direction.
//!
//! The receive path routes purely on length, so the three sets must stay
//! disjoint; see the constants on each type.
//!
//! Decoding is split into structural parsing and authentication, in that
//! order: `decode` guarantees a well-formed layout but says nothing about
//! who sent it. Tag and MIC verification are separate, explicit steps. All
//! multi-byte integers are little-endian.

mod error;
mod frame;
mod ids;
mod join;
mod record;

pub use error::ProtocolError;
pub use frame::DataFrame;
pub use ids::{AppEui, DevEui};
pub use join::{JoinAccept, JoinRequest};
pub use record::{decode_region, scan_regions, DataType, Record, Region};

/// Convenience alias used throughout the codec.
pub type Result<T> = core::result::Result<T, ProtocolError>;
