//! Errors raised while bringing up or tearing down a session.

use std::path::PathBuf;

use syncproxy_core::ProxyError;
use thiserror::Error;

/// Kernel-level error type.
#[derive(Debug, Error)]
pub enum KernelError {
    /// A proxy operation failed.
    #[error("proxy error: {0}")]
    Proxy(#[from] ProxyError),

    /// A configuration document could not be parsed.
    #[error("invalid configuration: {0}")]
    Config(#[from] serde_json::Error),

    /// A configuration file could not be read.
    #[error("failed to read {path}: {source}")]
    ReadConfig {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A filesystem call from the worker failed.
    #[error("filesystem error: {0}")]
    Fs(#[from] std::io::Error),

    /// The worker thread could not be started.
    #[error("failed to start worker: {0}")]
    Spawn(#[source] std::io::Error),

    /// The worker stopped before announcing itself ready.
    #[error("worker exited before it was initialized")]
    WorkerLost,

    /// The worker thread panicked.
    #[error("worker panicked")]
    WorkerPanicked,
}

impl KernelError {
    /// Whether the session can no longer be used.
    pub fn is_fatal(&self) -> bool {
        match self {
            KernelError::Proxy(e) => e.is_fatal(),
            KernelError::Fs(_) => false,
            _ => true,
        }
    }
}

/// Result type alias for kernel operations.
pub type Result<T> = std::result::Result<T, KernelError>;
