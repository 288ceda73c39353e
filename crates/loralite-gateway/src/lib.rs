//! Gateway role.
//!
//! A [`Gateway`] terminates the radio side of the network: it answers
//! join requests, verifies and decrypts uplinks, acknowledges them, and
//! hands the decoded payloads to a northbound hook. The inbound half of
//! the northbound link routes `{dst, payload}` commands back out as
//! downlink data frames.
//!
//! Like the end device, the gateway is driven from a single-threaded
//! main loop calling [`Gateway::poll`]. Frames are dispatched purely on
//! length: exactly 22 bytes is a join request, more than 32 is a data
//! frame, everything else is dropped.

mod error;
mod gateway;
mod northbound;

pub use error::GatewayError;
pub use gateway::Gateway;
pub use northbound::{GatewayEvent, Northbound, NullNorthbound};
