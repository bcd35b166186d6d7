//! Session bootstrap for a host and the worker it drives.
//!
//! A [`HostSession`] allocates the shared buffers, registers the `input`,
//! `filesystem` and `global_this` roots, and starts a worker thread. The
//! worker receives a [`WorkerSession`] with blocking access to all three:
//!
//! ```rust,no_run
//! use syncproxy_kernel::{Environment, HostSession, SessionConfig};
//!
//! # async fn demo() -> syncproxy_kernel::Result<()> {
//! let session = HostSession::start(SessionConfig::default(), Environment::default(), |worker| {
//!     worker.fs().put("/home/pyodide/hello.txt", Some("hi"))?;
//!     worker.fs().get("/home/pyodide/hello.txt")
//! })
//! .await?;
//! let contents = session.join().await?;
//! assert_eq!(contents.ok().flatten().as_deref(), Some("hi"));
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod error;
pub mod fs;
pub mod input;
pub mod session;

pub use config::{default_global_exclusions, SessionConfig, DEFAULT_ROOT};
pub use error::{KernelError, Result};
pub use fs::{FileSystem, FsError, FsResult, MemoryFileSystem, SyncFs};
pub use input::{default_input, Input, InputFn};
pub use session::{Environment, Handshake, HostSession, RootIds, WorkerSession};
