//! syncproxy: synchronous access to host objects from a worker.
//!
//! A worker that cannot suspend holds proxies to objects living on its
//! host. Each operation on a proxy is shipped to the host as a message;
//! the worker either awaits the reply or parks on a shared-memory channel
//! until the host writes the result.
//!
//! - [`shared_memory`]: the blocking request/response channel.
//! - [`protocol`]: values, property paths, protocol messages, errors.
//! - [`object_proxy`]: the host registry and interpreter, the client and its
//!   proxies.
//! - [`kernel`]: session bootstrap with filesystem and input roots.

pub use syncproxy_core as protocol;
pub use syncproxy_kernel as kernel;
pub use syncproxy_object_proxy as object_proxy;
pub use syncproxy_shared_memory as shared_memory;

pub use syncproxy_core::{ProxyError, Value};
pub use syncproxy_kernel::{Environment, HostSession, SessionConfig, WorkerSession};
pub use syncproxy_object_proxy::{ObjectProxy, ProxyClient, ProxyHost, SelectiveProxy};
pub use syncproxy_shared_memory::SharedChannel;
