//! End-device role.
//!
//! An [`EndDevice`] owns everything a constrained node needs to talk to
//! the gateway: the radio mediator, the two-tier session store, and the
//! store-and-forward group-file buffer. The application drives it from a
//! single-threaded main loop:
//!
//! - call [`EndDevice::join`] once after boot (a no-op if a persisted
//!   session survived),
//! - stage sensor payloads with [`EndDevice::store_packet`],
//! - periodically [`EndDevice::drain_group`] to batch them over the air,
//! - call [`EndDevice::poll`] each loop iteration to process downlinks.
//!
//! # State machine
//!
//! ```text
//! UNJOINED --join--> JOINING --valid accept--> JOINED
//!    ^                  |                        |
//!    +--retries out-----+      flush_session-----+
//! ```

mod device;
mod error;
mod fs;
mod groups;

pub use device::{DeviceReply, EndDevice, ReplyPayload};
pub use error::DeviceError;
pub use fs::{DirFs, FileStore, FsError, MemoryFs};
pub use groups::{BufferError, GroupStore};
