//! Object proxying between a host and a worker.
//!
//! The host half ([`ProxyHost`]) owns a [`Registry`] of live objects and
//! executes reflected operations against them. The client half
//! ([`ProxyClient`]) hands out [`ObjectProxy`] handles whose methods turn
//! into protocol messages. Results come back either asynchronously over the
//! message port or, through [`ProxyClient::then_sync`], over the blocking
//! shared-memory path.
//!
//! # Example
//!
//! ```rust,no_run
//! use syncproxy_core::Value;
//! use syncproxy_object_proxy::{message_channel, ProxyClient, ProxyHost};
//! use syncproxy_shared_memory::{SharedChannel, SharedChannelConfig};
//!
//! # async fn demo() -> syncproxy_core::Result<()> {
//! let channel = SharedChannel::new(SharedChannelConfig::default());
//! let (to_host, host_inbox) = message_channel();
//! let (to_worker, worker_inbox) = message_channel();
//!
//! let host = ProxyHost::new(channel.clone(), to_worker);
//! let id = host.register_root(Value::from(vec![1i64, 2, 3]));
//! tokio::spawn(async move { host.serve(host_inbox).await });
//!
//! let client = ProxyClient::new(channel, to_host);
//! let listener = client.clone();
//! tokio::spawn(async move { listener.listen(worker_inbox).await });
//!
//! let length = client.object_proxy(id).get("length").await?;
//! assert_eq!(length.as_data(), Some(&Value::Integer(3)));
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod host;
pub mod port;

pub use client::{Deferred, ExclusionSet, Member, ObjectProxy, ProxyClient, RemoteValue, SelectiveProxy};
pub use host::{
    DynamicObject, HostFunction, HostObject, HostPromise, HostValue, OpResult, ProxyHost,
    Registry, Resolver, Settlement, SharedRecord,
};
pub use port::{message_channel, MessageReceiver, PostMessage};
