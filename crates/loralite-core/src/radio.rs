//! Physical-layer abstraction and the radio mediator.
//!
//! The radio driver is an external collaborator reached only through the
//! [`PhysicalLayer`] trait: standby, transmit, start-receive, packet
//! length, read-data, and a blocking receive with timeout. A frame
//! arriving in hardware raises a "received" flag from interrupt context;
//! in this stack that flag is an `Arc<AtomicBool>` owned by the
//! [`RadioMediator`] — the driver side holds a clone and only ever sets
//! it.
//!
//! The mediator is the radio's single owner and serialises every
//! transition. Each transmit runs the fixed choreography:
//!
//! ```text
//! transmitting = true
//!   -> standby -> ~5 ms -> transmit -> ~10 ms -> start_receive
//! transmitting = false
//! ```
//!
//! The two short delays give the hardware time to settle between state
//! transitions; they are tunable but must not be removed. A frame that
//! arrives while `transmitting` is true is lost — accepted behaviour of
//! the half-duplex link, no queue is kept.

use std::{
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    thread,
    time::Duration,
};

use thiserror::Error;

/// Largest frame the physical layer can deliver.
pub const MAX_FRAME_LEN: usize = 255;

/// Physical-layer failure.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RadioError {
    /// The driver returned a non-OK status code.
    #[error("physical layer returned status {0}")]
    Driver(i32),

    /// The driver reported a frame larger than [`MAX_FRAME_LEN`].
    #[error("oversized frame of {0} bytes")]
    Oversized(usize),
}

/// Capability set of the radio driver.
///
/// Abstracts over the concrete module; implementations are provided by
/// the platform layer (and by the test harness as an in-process link).
pub trait PhysicalLayer {
    /// Enter standby, aborting any receive in progress.
    fn standby(&mut self) -> Result<(), RadioError>;

    /// Transmit one frame. Blocks until the air time is over.
    fn transmit(&mut self, frame: &[u8]) -> Result<(), RadioError>;

    /// Arm the receiver; a later frame raises the received flag.
    fn start_receive(&mut self) -> Result<(), RadioError>;

    /// Length of the frame waiting in the driver's buffer, zero if none.
    fn packet_length(&mut self) -> usize;

    /// Copy the waiting frame into `buf`; returns the byte count.
    fn read_data(&mut self, buf: &mut [u8]) -> Result<usize, RadioError>;

    /// Block up to `timeout` for one frame. `Ok(None)` on timeout.
    fn receive(&mut self, timeout: Duration) -> Result<Option<Vec<u8>>, RadioError>;
}

/// Delays wrapped around each transmit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RadioTiming {
    /// Pause between standby and transmit.
    pub pre_transmit: Duration,
    /// Pause between transmit and re-arming receive.
    pub post_transmit: Duration,
}

impl Default for RadioTiming {
    fn default() -> Self {
        Self {
            pre_transmit: Duration::from_millis(5),
            post_transmit: Duration::from_millis(10),
        }
    }
}

/// Single owner of the physical layer.
///
/// Serialises transmit/receive transitions and exposes the event-driven
/// receive loop. All methods take `&mut self`; the surrounding role runs
/// a single-threaded poll loop, so transitions cannot interleave.
pub struct RadioMediator<R: PhysicalLayer> {
    radio: R,
    received: Arc<AtomicBool>,
    transmitting: bool,
    timing: RadioTiming,
}

impl<R: PhysicalLayer> RadioMediator<R> {
    /// Take ownership of the radio.
    pub fn new(radio: R, timing: RadioTiming) -> Self {
        Self {
            radio,
            received: Arc::new(AtomicBool::new(false)),
            transmitting: false,
            timing,
        }
    }

    /// Take ownership of the radio, sharing an existing received flag.
    ///
    /// The driver/ISR side keeps a clone of `received` and sets it when a
    /// frame lands.
    pub fn with_flag(radio: R, timing: RadioTiming, received: Arc<AtomicBool>) -> Self {
        Self { radio, received, transmitting: false, timing }
    }

    /// Handle to the received flag for the driver side to raise.
    #[must_use]
    pub fn received_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.received)
    }

    /// True while a transmit choreography is in progress.
    #[must_use]
    pub fn is_transmitting(&self) -> bool {
        self.transmitting
    }

    /// Borrow the owned radio (inspection only; transitions go through
    /// the mediator).
    #[must_use]
    pub fn radio(&self) -> &R {
        &self.radio
    }

    /// Transmit a frame and re-arm the receiver.
    pub fn transmit(&mut self, frame: &[u8]) -> Result<(), RadioError> {
        self.transmit_with(frame, true)
    }

    /// Transmit a frame without re-arming the receiver.
    ///
    /// Used between the files of a multi-file drain, where the receiver
    /// is only reopened after the last transmission.
    pub fn transmit_no_reopen(&mut self, frame: &[u8]) -> Result<(), RadioError> {
        self.transmit_with(frame, false)
    }

    fn transmit_with(&mut self, frame: &[u8], reopen: bool) -> Result<(), RadioError> {
        self.transmitting = true;
        let result = self.transmit_sequence(frame, reopen);
        self.transmitting = false;
        result
    }

    fn transmit_sequence(&mut self, frame: &[u8], reopen: bool) -> Result<(), RadioError> {
        self.radio.standby()?;
        thread::sleep(self.timing.pre_transmit);
        self.radio.transmit(frame)?;
        thread::sleep(self.timing.post_transmit);
        if reopen {
            self.radio.start_receive()?;
        }
        Ok(())
    }

    /// Re-arm the receiver.
    pub fn start_receive(&mut self) -> Result<(), RadioError> {
        self.radio.start_receive()
    }

    /// Poll the received flag; if raised, read and return the frame.
    ///
    /// Returns `None` when no frame is pending, when the driver reports an
    /// empty length, or when the read fails — the latter two are logged
    /// and the frame is lost, matching the drop-and-log recovery policy.
    pub fn on_received(&mut self) -> Option<Vec<u8>> {
        if !self.received.swap(false, Ordering::AcqRel) {
            return None;
        }

        let len = self.radio.packet_length();
        if len == 0 {
            tracing::debug!("received flag raised without a pending frame");
            return None;
        }
        if len > MAX_FRAME_LEN {
            tracing::warn!(len, "dropping oversized frame");
            return None;
        }

        let mut buf = [0u8; MAX_FRAME_LEN];
        match self.radio.read_data(&mut buf[..len]) {
            Ok(read) => Some(buf[..read].to_vec()),
            Err(err) => {
                tracing::warn!(error = %err, "failed to read received frame");
                None
            }
        }
    }

    /// Block up to `timeout` for a frame (join-reply wait).
    pub fn receive(&mut self, timeout: Duration) -> Result<Option<Vec<u8>>, RadioError> {
        self.radio.receive(timeout)
    }
}
