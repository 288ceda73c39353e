//! Stack configuration.
//!
//! The outer sketch assembles one of these at startup and hands it to the
//! role value. Identities and root keys are provisioned out of band;
//! everything else has working defaults.

use std::time::Duration;

use loralite_crypto::{AppKey, HmacKey};
use loralite_proto::{AppEui, DevEui};
use thiserror::Error;

use crate::radio::RadioTiming;

/// Configuration rejected at startup.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// `group_limit` outside `1..=32`.
    #[error("group_limit {0} outside supported range 1..=32")]
    GroupLimit(usize),

    /// `group_prefix_limit` must allow at least one file per group.
    #[error("group_prefix_limit must be at least 1")]
    GroupPrefixLimit,

    /// `max_file_size` too small to hold a single record header.
    #[error("max_file_size {0} cannot hold any record")]
    MaxFileSize(usize),
}

/// Join retry policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JoinConfig {
    /// Attempts before giving up.
    pub max_retries: u32,
    /// Wait for the accept after each attempt. Fixed, no backoff.
    pub retry_delay: Duration,
}

impl Default for JoinConfig {
    fn default() -> Self {
        Self { max_retries: 3, retry_delay: Duration::from_secs(2) }
    }
}

/// Group-file buffer limits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GroupConfig {
    /// Hard upper bound on each group file's byte size.
    pub max_file_size: usize,
    /// Number of distinct group prefixes supported (at most 32).
    pub group_limit: usize,
    /// Maximum suffix count per prefix.
    pub group_prefix_limit: usize,
}

impl GroupConfig {
    /// Most group prefixes any configuration may enable.
    pub const MAX_GROUPS: usize = 32;

    /// Check the limits.
    ///
    /// # Errors
    ///
    /// See [`ConfigError`].
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.group_limit == 0 || self.group_limit > Self::MAX_GROUPS {
            return Err(ConfigError::GroupLimit(self.group_limit));
        }
        if self.group_prefix_limit == 0 {
            return Err(ConfigError::GroupPrefixLimit);
        }
        // Smallest record: 2-byte length, type tag, empty payload.
        if self.max_file_size < 3 {
            return Err(ConfigError::MaxFileSize(self.max_file_size));
        }
        Ok(())
    }
}

impl Default for GroupConfig {
    fn default() -> Self {
        Self { max_file_size: 200, group_limit: 4, group_prefix_limit: 9 }
    }
}

/// End-device configuration.
#[derive(Debug, Clone)]
pub struct DeviceConfig {
    /// This device's identifier.
    pub dev_eui: DevEui,
    /// Application identifier sent in the join request.
    pub app_eui: AppEui,
    /// Device root key.
    pub app_key: AppKey,
    /// Network-wide frame authentication key.
    pub hmac_key: HmacKey,
    /// Join retry policy.
    pub join: JoinConfig,
    /// Group-file buffer limits.
    pub group: GroupConfig,
    /// Transmit choreography delays.
    pub radio: RadioTiming,
    /// Quiet period between the files of a multi-file drain.
    pub quiet_period: Duration,
}

impl DeviceConfig {
    /// Build a configuration with default policies.
    pub fn new(dev_eui: DevEui, app_eui: AppEui, app_key: AppKey, hmac_key: HmacKey) -> Self {
        Self {
            dev_eui,
            app_eui,
            app_key,
            hmac_key,
            join: JoinConfig::default(),
            group: GroupConfig::default(),
            radio: RadioTiming::default(),
            quiet_period: Duration::from_millis(500),
        }
    }
}

/// Gateway configuration.
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    /// The gateway's own identifier, used as the sender of downlinks.
    pub gateway_eui: DevEui,
    /// Root key shared with the device fleet.
    pub app_key: AppKey,
    /// Network-wide frame authentication key.
    pub hmac_key: HmacKey,
    /// Provisioned network identifier placed in join accepts.
    pub net_id: [u8; 3],
    /// Transmit choreography delays.
    pub radio: RadioTiming,
}

impl GatewayConfig {
    /// Build a configuration with the default radio timing.
    pub fn new(gateway_eui: DevEui, app_key: AppKey, hmac_key: HmacKey, net_id: [u8; 3]) -> Self {
        Self { gateway_eui, app_key, hmac_key, net_id, radio: RadioTiming::default() }
    }
}
