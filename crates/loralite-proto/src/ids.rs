//! Device and application identifiers.
//!
//! EUIs are opaque 8-byte values. Their canonical textual form — lowercase
//! hex, no separators — keys the session store and names devices in logs
//! and northbound messages.

use core::fmt;

/// 64-bit device identifier.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct DevEui([u8; 8]);

impl DevEui {
    /// Number of bytes in an EUI.
    pub const LEN: usize = 8;

    /// Wrap raw identifier bytes.
    #[must_use]
    pub fn new(bytes: [u8; 8]) -> Self {
        Self(bytes)
    }

    /// Read an EUI from the start of a buffer.
    ///
    /// Callers have already length-checked the enclosing frame; this slices
    /// the first 8 bytes.
    #[must_use]
    pub fn from_slice(bytes: &[u8]) -> Self {
        let mut eui = [0u8; 8];
        eui.copy_from_slice(&bytes[..8]);
        Self(eui)
    }

    /// Raw identifier bytes.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8; 8] {
        &self.0
    }

    /// Canonical lowercase-hex form (16 characters).
    #[must_use]
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Parse the canonical hex form (as carried in northbound `dst`
    /// fields). Case-insensitive; `None` unless exactly 16 hex digits.
    #[must_use]
    pub fn from_hex(text: &str) -> Option<Self> {
        let bytes = hex::decode(text).ok()?;
        let eui: [u8; 8] = bytes.try_into().ok()?;
        Some(Self(eui))
    }
}

impl fmt::Display for DevEui {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl fmt::Debug for DevEui {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "DevEui({})", self.to_hex())
    }
}

/// 64-bit application identifier.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct AppEui([u8; 8]);

impl AppEui {
    /// Wrap raw identifier bytes.
    #[must_use]
    pub fn new(bytes: [u8; 8]) -> Self {
        Self(bytes)
    }

    /// Raw identifier bytes.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8; 8] {
        &self.0
    }

    /// Canonical lowercase-hex form (16 characters).
    #[must_use]
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl fmt::Display for AppEui {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl fmt::Debug for AppEui {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "AppEui({})", self.to_hex())
    }
}
