//! The blocking request/response channel built on the three regions.

use std::sync::Arc;

use tracing::trace;

use crate::config::SharedChannelConfig;
use crate::data::DataRegion;
use crate::error::{Result, SharedMemoryError};
use crate::interrupt::InterruptFlag;
use crate::lock::{LockRegion, LockState};

/// Handles to the three shared regions.
///
/// This is what a host publishes to its worker during the session
/// handshake; both sides build a [`SharedChannel`] over the same buffers.
#[derive(Debug, Clone)]
pub struct SharedBuffers {
    /// Control word and wait/notify signal.
    pub lock: Arc<LockRegion>,
    /// Payload of the in-flight blocking round trip.
    pub data: Arc<DataRegion>,
    /// Advisory cancellation flag.
    pub interrupt: InterruptFlag,
}

impl SharedBuffers {
    /// Allocate fresh regions sized by `config`.
    pub fn allocate(config: &SharedChannelConfig) -> Self {
        Self {
            lock: Arc::new(LockRegion::new()),
            data: Arc::new(DataRegion::new(config.data_capacity)),
            interrupt: InterruptFlag::new(),
        }
    }
}

/// A blocking request/response primitive between two contexts.
///
/// The worker calls [`request_sync`](Self::request_sync) and parks; the host
/// answers with [`respond`](Self::respond), which never blocks. Only one
/// blocking round trip may be outstanding per channel - concurrent callers
/// must be serialised upstream, and a second caller is refused with
/// [`SharedMemoryError::ChannelBusy`].
///
/// There is no timeout. If the host never responds the worker stays parked;
/// cancellation of a whole run goes through the interrupt flag and an outer
/// watchdog.
#[derive(Debug, Clone)]
pub struct SharedChannel {
    buffers: SharedBuffers,
}

impl SharedChannel {
    /// Create a channel over freshly allocated regions.
    pub fn new(config: SharedChannelConfig) -> Self {
        Self::from_buffers(SharedBuffers::allocate(&config))
    }

    /// Create a channel over regions allocated elsewhere.
    pub fn from_buffers(buffers: SharedBuffers) -> Self {
        Self { buffers }
    }

    /// The underlying region handles.
    pub fn buffers(&self) -> &SharedBuffers {
        &self.buffers
    }

    /// Current value of the lock word.
    pub fn state(&self) -> LockState {
        self.buffers.lock.state()
    }

    /// Largest payload either side may place in the data region.
    pub fn max_payload(&self) -> usize {
        self.buffers.data.max_payload()
    }

    /// Perform one blocking round trip. Worker side only.
    ///
    /// Writes `payload` into the data region, flips the lock word to
    /// `request-pending`, rings `doorbell` so the host learns about the
    /// request, then parks until the host flips the word to
    /// `response-ready`. The response is copied out and the word returns to
    /// `idle`.
    ///
    /// If the doorbell fails the word is reset to `idle` and the error is
    /// returned without waiting.
    pub fn request_sync<F, E>(&self, payload: &[u8], doorbell: F) -> std::result::Result<Vec<u8>, E>
    where
        F: FnOnce() -> std::result::Result<(), E>,
        E: From<SharedMemoryError>,
    {
        let lock = &self.buffers.lock;

        {
            let mut word = lock.word();
            if *word != LockState::Idle {
                return Err(SharedMemoryError::ChannelBusy.into());
            }
            self.buffers.data.write(payload)?;
            *word = LockState::RequestPending;
        }
        trace!(size = payload.len(), "blocking request pending");

        if let Err(e) = doorbell() {
            *lock.word() = LockState::Idle;
            return Err(e);
        }

        let mut word = lock.wait_for(lock.word(), LockState::ResponseReady);
        let response = self.buffers.data.read();
        *word = LockState::Idle;
        drop(word);

        let response = response?;
        trace!(size = response.len(), "blocking response received");
        Ok(response)
    }

    /// Answer the outstanding request and wake the worker. Host side only.
    ///
    /// An oversized response is rejected with the word left at
    /// `request-pending`, so the host can still answer with a smaller
    /// payload (typically an encoded failure).
    pub fn respond(&self, response: &[u8]) -> Result<()> {
        let lock = &self.buffers.lock;
        let mut word = lock.word();
        if *word != LockState::RequestPending {
            return Err(SharedMemoryError::UnexpectedState {
                expected: LockState::RequestPending,
                found: *word,
            });
        }
        self.buffers.data.write(response)?;
        *word = LockState::ResponseReady;
        drop(word);

        lock.notify_all();
        trace!(size = response.len(), "blocking response written");
        Ok(())
    }

    /// Raise the interrupt flag.
    pub fn interrupt(&self) {
        self.buffers.interrupt.interrupt();
    }

    /// Lower the interrupt flag.
    pub fn clear_interrupt(&self) {
        self.buffers.interrupt.clear();
    }

    /// Whether the interrupt flag is raised.
    pub fn is_interrupted(&self) -> bool {
        self.buffers.interrupt.is_set()
    }

    /// Handle to the interrupt flag, for the embedded runtime to poll.
    pub fn interrupter(&self) -> InterruptFlag {
        self.buffers.interrupt.clone()
    }
}
