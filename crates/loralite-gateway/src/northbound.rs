//! Northbound seam.
//!
//! The gateway's uplink results leave the core through this trait; an
//! MQTT client (out of scope here) implements it and publishes the
//! events to the broker. The inbound direction — broker commands routed
//! to a device — enters through [`crate::Gateway::enqueue_downlink`].

use loralite_proto::{DevEui, Region};

/// Something the northbound side may want to know about.
#[derive(Debug, Clone, PartialEq)]
pub enum GatewayEvent {
    /// A device completed the join handshake.
    Joined {
        /// The device.
        dev_eui: DevEui,
        /// Address it was assigned.
        dev_addr: u32,
    },
    /// An authenticated uplink was decoded.
    Uplink {
        /// Sending device.
        dev_eui: DevEui,
        /// Decoded payload regions, in wire order.
        regions: Vec<Region>,
    },
    /// An ACK went out to a device.
    AckSent {
        /// The acknowledged device.
        dev_eui: DevEui,
    },
}

/// Event sink towards the broker side.
pub trait Northbound {
    /// Publish one event. Best effort; the gateway does not react to the
    /// sink's internal failures.
    fn publish(&mut self, event: GatewayEvent);
}

/// Sink that discards everything; the default for radio-only setups.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullNorthbound;

impl Northbound for NullNorthbound {
    fn publish(&mut self, _event: GatewayEvent) {}
}
