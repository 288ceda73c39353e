//! Shared infrastructure for the loralite protocol engines.
//!
//! The device and gateway roles both sit on the same three services:
//!
//! - the two-tier [`SessionStore`] (volatile cache over an encrypted
//!   [`KvStore`] persistence layer),
//! - the [`RadioMediator`], the single owner of the physical-layer
//!   collaborator, which serialises transmit/receive transitions,
//! - the configuration types assembled by the outer sketch at startup.
//!
//! Nothing here is process-global: a role owns one of each, created at
//! startup and carried by value.

pub mod config;
pub mod radio;
pub mod session;
pub mod storage;

pub use config::{ConfigError, DeviceConfig, GatewayConfig, GroupConfig, JoinConfig};
pub use radio::{PhysicalLayer, RadioError, RadioMediator, RadioTiming, MAX_FRAME_LEN};
pub use session::{SessionInfo, SessionStore};
pub use storage::{KvStore, MemoryKv, RedbKv, StorageError};
