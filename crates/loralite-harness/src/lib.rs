//! End-to-end test rig.
//!
//! Couples a real [`EndDevice`] to a real [`Gateway`] over the in-process
//! [`LinkedRadio`] pair. The gateway runs its poll loop on a background
//! thread so the device's blocking join works exactly as it does on
//! hardware; [`Rig::shutdown`] stops the thread and hands both roles back
//! for synchronous, deterministic assertions.

mod link;
mod rng;

use std::{
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc, Mutex,
    },
    thread::{self, JoinHandle},
    time::{Duration, Instant},
};

use loralite_core::{DeviceConfig, GatewayConfig, MemoryKv, RadioTiming};
use loralite_crypto::{AppKey, HmacKey};
use loralite_device::{EndDevice, MemoryFs};
use loralite_gateway::{Gateway, GatewayEvent, Northbound};
use loralite_proto::{AppEui, DevEui};

pub use link::{LinkMonitor, LinkedRadio};
pub use rng::ScriptedRng;

/// Device role as assembled by the rig.
pub type RigDevice = EndDevice<LinkedRadio, MemoryKv, MemoryFs>;
/// Gateway role as assembled by the rig.
pub type RigGateway = Gateway<LinkedRadio, MemoryKv, SharedNorthbound>;

/// Northbound sink shared with the test thread.
#[derive(Clone, Default)]
pub struct SharedNorthbound {
    events: Arc<Mutex<Vec<GatewayEvent>>>,
}

impl SharedNorthbound {
    /// Snapshot of everything published so far.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    #[allow(clippy::expect_used)]
    #[must_use]
    pub fn snapshot(&self) -> Vec<GatewayEvent> {
        self.events.lock().expect("mutex poisoned").clone()
    }
}

impl Northbound for SharedNorthbound {
    #[allow(clippy::expect_used)]
    fn publish(&mut self, event: GatewayEvent) {
        self.events.lock().expect("mutex poisoned").push(event);
    }
}

/// Device EUI used by the rig's default configuration.
#[must_use]
pub fn device_eui() -> DevEui {
    DevEui::new([0, 0, 0, 0, 0, 0, 0, 1])
}

/// Gateway EUI used by the rig's default configuration.
#[must_use]
pub fn gateway_eui() -> DevEui {
    DevEui::new([9, 9, 9, 9, 9, 9, 9, 9])
}

fn fast_radio_timing() -> RadioTiming {
    RadioTiming {
        pre_transmit: Duration::from_micros(50),
        post_transmit: Duration::from_micros(100),
    }
}

/// Device configuration with all-zero root keys and test-friendly
/// timings (the key/nonce values match the interop scenarios).
#[must_use]
pub fn test_device_config() -> DeviceConfig {
    let mut config = DeviceConfig::new(
        device_eui(),
        AppEui::new([0, 0, 0, 0, 0, 0, 0, 2]),
        AppKey::new([0u8; 16]),
        HmacKey::new([0u8; 16]),
    );
    config.join.max_retries = 2;
    config.join.retry_delay = Duration::from_millis(400);
    config.radio = fast_radio_timing();
    config.quiet_period = Duration::from_millis(5);
    config
}

/// Gateway configuration matching [`test_device_config`].
#[must_use]
pub fn test_gateway_config() -> GatewayConfig {
    let mut config = GatewayConfig::new(
        gateway_eui(),
        AppKey::new([0u8; 16]),
        HmacKey::new([0u8; 16]),
        [0x01, 0x23, 0x45],
    );
    config.radio = fast_radio_timing();
    config
}

/// Signals the gateway thread to exit when the rig goes away.
struct StopGuard(Arc<AtomicBool>);

impl Drop for StopGuard {
    fn drop(&mut self) {
        self.0.store(true, Ordering::Release);
    }
}

/// A linked device + gateway with the gateway polling on a background
/// thread.
pub struct Rig {
    /// The device role, driven directly by the test.
    pub device: RigDevice,
    /// Link hooks: transmission counters, frame interception.
    pub monitor: LinkMonitor,
    northbound: SharedNorthbound,
    stop: StopGuard,
    gateway_thread: Option<JoinHandle<RigGateway>>,
}

impl Rig {
    /// Build and start a rig with the default test configurations.
    ///
    /// `gateway_rng` supplies the gateway's join nonces and addresses, so
    /// scenarios can pin them.
    #[must_use]
    pub fn start(gateway_rng: ScriptedRng) -> Self {
        Self::start_with(test_device_config(), test_gateway_config(), gateway_rng)
    }

    /// Build and start a rig with explicit configurations.
    ///
    /// # Panics
    ///
    /// Panics on invalid configuration or a failing (in-process) radio —
    /// both are test-setup bugs.
    #[must_use]
    pub fn start_with(
        device_config: DeviceConfig,
        gateway_config: GatewayConfig,
        mut gateway_rng: ScriptedRng,
    ) -> Self {
        let (device_radio, gateway_radio, monitor) = LinkedRadio::pair();

        let northbound = SharedNorthbound::default();
        let mut gateway =
            Gateway::new(gateway_config, gateway_radio, MemoryKv::new(), northbound.clone());
        let mut device = EndDevice::new(device_config, device_radio, MemoryKv::new(), MemoryFs::new())
            .expect("rig device config is valid");

        monitor.bind_device_flag(device.received_flag());
        monitor.bind_gateway_flag(gateway.received_flag());

        gateway.start().expect("in-process radio cannot fail");
        device.start().expect("in-process radio cannot fail");

        let stop = Arc::new(AtomicBool::new(false));
        let stop_signal = Arc::clone(&stop);
        let gateway_thread = thread::spawn(move || {
            while !stop_signal.load(Ordering::Acquire) {
                gateway.poll(&mut gateway_rng);
                thread::sleep(Duration::from_micros(200));
            }
            gateway
        });

        Self {
            device,
            monitor,
            northbound,
            stop: StopGuard(stop),
            gateway_thread: Some(gateway_thread),
        }
    }

    /// Events the gateway has published so far.
    #[must_use]
    pub fn events(&self) -> Vec<GatewayEvent> {
        self.northbound.snapshot()
    }

    /// Wait until the northbound log satisfies `predicate`, up to
    /// `timeout`.
    pub fn wait_for_events(
        &self,
        timeout: Duration,
        predicate: impl Fn(&[GatewayEvent]) -> bool,
    ) -> bool {
        let deadline = Instant::now() + timeout;
        loop {
            if predicate(&self.events()) {
                return true;
            }
            if Instant::now() >= deadline {
                return false;
            }
            thread::sleep(Duration::from_millis(1));
        }
    }

    /// Poll the device until it reports a reply or `timeout` elapses.
    pub fn poll_device_reply(&mut self, timeout: Duration) -> Option<loralite_device::DeviceReply> {
        let deadline = Instant::now() + timeout;
        loop {
            if let Some(reply) = self.device.poll() {
                return Some(reply);
            }
            if Instant::now() >= deadline {
                return None;
            }
            thread::sleep(Duration::from_millis(1));
        }
    }

    /// Stop the gateway thread and hand both roles back for synchronous
    /// assertions.
    ///
    /// # Panics
    ///
    /// Panics if the gateway thread panicked.
    #[must_use]
    pub fn shutdown(mut self) -> (RigDevice, RigGateway, LinkMonitor, SharedNorthbound) {
        self.stop.0.store(true, Ordering::Release);
        let gateway = self
            .gateway_thread
            .take()
            .expect("thread present until shutdown")
            .join()
            .expect("gateway thread panicked");
        (self.device, gateway, self.monitor, self.northbound)
    }
}
