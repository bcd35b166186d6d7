//! The lock region: control word plus wait/notify signal.

use std::fmt;
use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};

/// State of the lock word.
///
/// The word cycles `Idle -> RequestPending -> ResponseReady -> Idle`. The
/// client owns the data region in `Idle` and `ResponseReady`, the host owns
/// it in `RequestPending`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum LockState {
    /// No blocking round trip in flight.
    Idle = 0,
    /// The client wrote a request and is waiting.
    RequestPending = 1,
    /// The host wrote a response and notified.
    ResponseReady = 2,
}

impl fmt::Display for LockState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            LockState::Idle => "idle",
            LockState::RequestPending => "request-pending",
            LockState::ResponseReady => "response-ready",
        };
        f.write_str(name)
    }
}

/// Control word and the condition variable the worker parks on.
#[derive(Debug)]
pub struct LockRegion {
    word: Mutex<LockState>,
    signal: Condvar,
}

impl LockRegion {
    pub(crate) fn new() -> Self {
        Self {
            word: Mutex::new(LockState::Idle),
            signal: Condvar::new(),
        }
    }

    /// Current value of the lock word.
    pub fn state(&self) -> LockState {
        *self.word()
    }

    /// Lock the control word.
    ///
    /// The word is a plain enum, so a poisoned guard still holds a valid
    /// state and is recovered.
    pub(crate) fn word(&self) -> MutexGuard<'_, LockState> {
        self.word.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Park until the word becomes `target`.
    pub(crate) fn wait_for<'a>(
        &self,
        mut guard: MutexGuard<'a, LockState>,
        target: LockState,
    ) -> MutexGuard<'a, LockState> {
        while *guard != target {
            guard = self
                .signal
                .wait(guard)
                .unwrap_or_else(PoisonError::into_inner);
        }
        guard
    }

    /// Wake every thread parked on this region.
    pub(crate) fn notify_all(&self) {
        self.signal.notify_all();
    }
}
