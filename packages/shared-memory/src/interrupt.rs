//! The interrupt region: one advisory cancellation flag.

use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;

/// Signal number written when the host requests an interrupt.
pub const SIGINT: u8 = 2;

/// Handle to the interrupt flag.
///
/// The host sets it at any time; the embedded runtime polls it at its own
/// safe points. Setting it never releases a blocked
/// [`request_sync`](crate::SharedChannel::request_sync).
#[derive(Debug, Clone, Default)]
pub struct InterruptFlag {
    signal: Arc<AtomicU8>,
}

impl InterruptFlag {
    /// Create a cleared flag.
    pub fn new() -> Self {
        Self::default()
    }

    /// Raise the flag with [`SIGINT`].
    pub fn interrupt(&self) {
        self.signal.store(SIGINT, Ordering::SeqCst);
    }

    /// Lower the flag.
    pub fn clear(&self) {
        self.signal.store(0, Ordering::SeqCst);
    }

    /// Whether the flag is raised.
    pub fn is_set(&self) -> bool {
        self.signal() != 0
    }

    /// Raw signal value, `0` when clear.
    pub fn signal(&self) -> u8 {
        self.signal.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn interrupt_and_clear() {
        let flag = InterruptFlag::new();
        assert!(!flag.is_set());

        flag.interrupt();
        assert!(flag.is_set());
        assert_eq!(flag.signal(), SIGINT);

        flag.clear();
        assert!(!flag.is_set());
    }

    #[test]
    fn clones_share_the_flag() {
        let host = InterruptFlag::new();
        let worker = host.clone();
        host.interrupt();
        assert!(worker.is_set());
    }
}
