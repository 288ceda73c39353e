//! In-process full-duplex radio link.
//!
//! Two [`LinkedRadio`]s connected crosswise: a transmit on one side lands
//! in the peer's inbox and raises the peer's received flag, exactly like
//! a frame interrupt would. Each side models the listen state, so a frame
//! sent while the peer is not receiving is lost — the same half-duplex
//! hazard the real link has.
//!
//! The mediator owns the received flag and is constructed inside the role
//! values, so the link learns the flags after the roles exist: the
//! [`LinkMonitor`] carries the binding cells plus test hooks for
//! intercepting and injecting frames.

use std::{
    collections::VecDeque,
    sync::{
        atomic::{AtomicBool, AtomicUsize, Ordering},
        Arc, Mutex,
    },
    thread,
    time::{Duration, Instant},
};

use loralite_core::{PhysicalLayer, RadioError};

type Inbox = Arc<Mutex<VecDeque<Vec<u8>>>>;
type FlagCell = Arc<Mutex<Option<Arc<AtomicBool>>>>;

/// Shared state of one link end.
#[derive(Clone)]
struct Side {
    inbox: Inbox,
    flag: FlagCell,
    listening: Arc<AtomicBool>,
    tx_count: Arc<AtomicUsize>,
}

impl Side {
    fn new() -> Self {
        Self {
            inbox: Arc::new(Mutex::new(VecDeque::new())),
            flag: Arc::new(Mutex::new(None)),
            listening: Arc::new(AtomicBool::new(false)),
            tx_count: Arc::new(AtomicUsize::new(0)),
        }
    }

    #[allow(clippy::expect_used)]
    fn raise_flag(&self) {
        if let Some(flag) = self.flag.lock().expect("mutex poisoned").as_ref() {
            flag.store(true, Ordering::Release);
        }
    }

    #[allow(clippy::expect_used)]
    fn clear_flag_if_idle(&self) {
        let inbox = self.inbox.lock().expect("mutex poisoned");
        if inbox.is_empty() {
            if let Some(flag) = self.flag.lock().expect("mutex poisoned").as_ref() {
                flag.store(false, Ordering::Release);
            }
        }
    }
}

/// One end of the in-process link.
pub struct LinkedRadio {
    own: Side,
    peer: Side,
}

impl LinkedRadio {
    /// Create a connected pair: (device side, gateway side, monitor).
    #[must_use]
    pub fn pair() -> (LinkedRadio, LinkedRadio, LinkMonitor) {
        let device = Side::new();
        let gateway = Side::new();

        let device_radio = LinkedRadio { own: device.clone(), peer: gateway.clone() };
        let gateway_radio = LinkedRadio { own: gateway.clone(), peer: device.clone() };
        let monitor = LinkMonitor { device, gateway };

        (device_radio, gateway_radio, monitor)
    }
}

impl PhysicalLayer for LinkedRadio {
    fn standby(&mut self) -> Result<(), RadioError> {
        self.own.listening.store(false, Ordering::Release);
        Ok(())
    }

    #[allow(clippy::expect_used)]
    fn transmit(&mut self, frame: &[u8]) -> Result<(), RadioError> {
        self.own.tx_count.fetch_add(1, Ordering::AcqRel);

        if !self.peer.listening.load(Ordering::Acquire) {
            tracing::debug!(len = frame.len(), "peer not listening, frame lost");
            return Ok(());
        }

        self.peer.inbox.lock().expect("mutex poisoned").push_back(frame.to_vec());
        self.peer.raise_flag();
        Ok(())
    }

    fn start_receive(&mut self) -> Result<(), RadioError> {
        self.own.listening.store(true, Ordering::Release);
        Ok(())
    }

    #[allow(clippy::expect_used)]
    fn packet_length(&mut self) -> usize {
        self.own.inbox.lock().expect("mutex poisoned").front().map_or(0, Vec::len)
    }

    #[allow(clippy::expect_used)]
    fn read_data(&mut self, buf: &mut [u8]) -> Result<usize, RadioError> {
        let Some(frame) = self.own.inbox.lock().expect("mutex poisoned").pop_front() else {
            return Ok(0);
        };
        buf[..frame.len()].copy_from_slice(&frame);
        Ok(frame.len())
    }

    #[allow(clippy::expect_used)]
    fn receive(&mut self, timeout: Duration) -> Result<Option<Vec<u8>>, RadioError> {
        self.own.listening.store(true, Ordering::Release);
        let deadline = Instant::now() + timeout;

        loop {
            let frame = self.own.inbox.lock().expect("mutex poisoned").pop_front();
            if let Some(frame) = frame {
                self.own.clear_flag_if_idle();
                return Ok(Some(frame));
            }
            if Instant::now() >= deadline {
                return Ok(None);
            }
            thread::sleep(Duration::from_micros(200));
        }
    }
}

/// Test-side view of both link ends.
pub struct LinkMonitor {
    device: Side,
    gateway: Side,
}

impl LinkMonitor {
    /// Tell the device side which flag its incoming frames should raise.
    #[allow(clippy::expect_used)]
    pub fn bind_device_flag(&self, flag: Arc<AtomicBool>) {
        *self.device.flag.lock().expect("mutex poisoned") = Some(flag);
    }

    /// Tell the gateway side which flag its incoming frames should raise.
    #[allow(clippy::expect_used)]
    pub fn bind_gateway_flag(&self, flag: Arc<AtomicBool>) {
        *self.gateway.flag.lock().expect("mutex poisoned") = Some(flag);
    }

    /// Frames the device has put on the air so far.
    #[must_use]
    pub fn device_transmissions(&self) -> usize {
        self.device.tx_count.load(Ordering::Acquire)
    }

    /// Frames the gateway has put on the air so far.
    #[must_use]
    pub fn gateway_transmissions(&self) -> usize {
        self.gateway.tx_count.load(Ordering::Acquire)
    }

    /// Intercept the next frame queued towards the gateway.
    #[allow(clippy::expect_used)]
    pub fn pop_frame_to_gateway(&self) -> Option<Vec<u8>> {
        let frame = self.gateway.inbox.lock().expect("mutex poisoned").pop_front();
        self.gateway.clear_flag_if_idle();
        frame
    }

    /// Queue a frame towards the gateway, raising its flag.
    #[allow(clippy::expect_used)]
    pub fn push_frame_to_gateway(&self, frame: Vec<u8>) {
        self.gateway.inbox.lock().expect("mutex poisoned").push_back(frame);
        self.gateway.raise_flag();
    }

    /// Intercept the next frame queued towards the device.
    #[allow(clippy::expect_used)]
    pub fn pop_frame_to_device(&self) -> Option<Vec<u8>> {
        let frame = self.device.inbox.lock().expect("mutex poisoned").pop_front();
        self.device.clear_flag_if_idle();
        frame
    }
}
