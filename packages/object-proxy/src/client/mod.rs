//! The client half: remote handles on the worker side.
//!
//! Every interaction with an [`ObjectProxy`] produces a [`Deferred`]. Awaiting
//! it sends a `reflect` message and waits for the matching `reply`; passing
//! it to [`ProxyClient::then_sync`] sends the same operation down the
//! blocking path instead and parks the calling thread.

mod deferred;
mod handle;
mod selective;

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use syncproxy_core::{
    codec, Failure, ObjectId, OperationError, Outcome, PromiseState, PropertyKey, ProxyError,
    ProxyMessage, ReflectRequest, RemoteKind, RemoteRef, RequestId, Result, Value, WireValue,
};
use syncproxy_shared_memory::SharedChannel;
use tokio::sync::{oneshot, watch};
use tracing::{debug, error, trace, warn};

use crate::port::{MessageReceiver, PostMessage};

pub use deferred::Deferred;
pub use handle::{ObjectProxy, RemoteValue};
pub use selective::{ExclusionSet, Member, SelectiveProxy};

type PromiseSlot = watch::Sender<Option<Outcome>>;

/// Worker-side endpoint of a proxy session.
///
/// Cloning is cheap and yields a handle to the same client.
#[derive(Clone)]
pub struct ProxyClient {
    inner: Arc<ClientInner>,
}

struct ClientInner {
    channel: SharedChannel,
    port: Box<dyn PostMessage>,
    next_request: AtomicU64,
    pending: Mutex<HashMap<RequestId, oneshot::Sender<Outcome>>>,
    /// Settlements of promises the host handed out, kept even before anyone
    /// waits on them.
    promises: Mutex<HashMap<ObjectId, PromiseSlot>>,
}

impl ProxyClient {
    /// Create a client posting to the host over `port`.
    pub fn new(channel: SharedChannel, port: impl PostMessage + 'static) -> Self {
        Self {
            inner: Arc::new(ClientInner {
                channel,
                port: Box::new(port),
                next_request: AtomicU64::new(0),
                pending: Mutex::new(HashMap::new()),
                promises: Mutex::new(HashMap::new()),
            }),
        }
    }

    /// A handle to the host object registered under `id`.
    pub fn object_proxy(&self, id: ObjectId) -> ObjectProxy {
        ObjectProxy::new(self.clone(), id, RemoteKind::Object)
    }

    pub fn channel(&self) -> &SharedChannel {
        &self.inner.channel
    }

    /// Whether the host has raised the interrupt flag.
    pub fn is_interrupted(&self) -> bool {
        self.inner.channel.is_interrupted()
    }

    /// Run `deferred` over the blocking path and return its value.
    ///
    /// Parks the calling thread until the host answers, including while the
    /// host waits on an asynchronous result. Call it only from a thread that
    /// may block; never from inside an async task.
    pub fn then_sync(&self, deferred: Deferred) -> Result<RemoteValue> {
        self.reflect_sync(deferred.into_request())
    }

    /// Perform `request` over the message port.
    ///
    /// A promise result is awaited and its settled value returned.
    pub async fn reflect(&self, request: ReflectRequest) -> Result<RemoteValue> {
        trace!(%request, "reflect");
        let outcome = self
            .round_trip(|request_id| ProxyMessage::Reflect {
                request_id,
                request,
            })
            .await?;
        self.revive(outcome).await
    }

    /// Perform `request` over the blocking path.
    pub fn reflect_sync(&self, request: ReflectRequest) -> Result<RemoteValue> {
        trace!(%request, "reflect over shared memory");
        let payload = codec::encode(&request)?;
        let response = self.inner.channel.request_sync(&payload, || {
            self.inner.port.post(ProxyMessage::SharedMemory { request })
        })?;
        let outcome: Outcome = codec::decode(&response)?;
        // The host settles promises before answering on this path.
        Ok(match outcome? {
            WireValue::Data(value) => RemoteValue::Data(value),
            WireValue::Remote(remote) => RemoteValue::Object(self.proxy_for(remote)),
        })
    }

    /// Ask the host for a printable rendering of `id` at `path`.
    pub async fn print_object(&self, id: ObjectId, path: Vec<PropertyKey>) -> Result<String> {
        let outcome = self
            .round_trip(|request_id| ProxyMessage::PrintObject {
                request_id,
                id,
                path,
            })
            .await?;
        Ok(match outcome? {
            WireValue::Data(Value::String(text)) => text,
            other => format!("{:?}", other),
        })
    }

    /// Route one message from the host.
    pub fn handle_proxy_message(&self, message: ProxyMessage) -> Result<()> {
        match message {
            ProxyMessage::Reply {
                request_id,
                outcome,
            } => {
                let waiter = self.pending().remove(&request_id).ok_or_else(|| {
                    ProxyError::Protocol(format!("reply to unknown request {}", request_id))
                })?;
                if waiter.send(outcome).is_err() {
                    trace!(request_id, "reply arrived after its caller gave up");
                }
                Ok(())
            }
            ProxyMessage::Promise {
                id,
                state,
                value,
                error,
            } => {
                let outcome = match state {
                    PromiseState::Pending => return Ok(()),
                    PromiseState::Fulfilled => Ok(value.unwrap_or(WireValue::Data(Value::Null))),
                    PromiseState::Rejected => Err(Failure::Operation {
                        error: error.unwrap_or_else(|| OperationError::error("promise rejected")),
                    }),
                };
                debug!(%id, ?state, "promise settled");
                self.promises()
                    .entry(id)
                    .or_insert_with(|| watch::channel(None).0)
                    .send_replace(Some(outcome));
                Ok(())
            }
            other => Err(ProxyError::Protocol(format!(
                "worker received a {} message",
                other.kind()
            ))),
        }
    }

    /// Route messages until the host's port closes, then fail anything
    /// still waiting with `ChannelClosed`.
    pub async fn listen(&self, mut messages: MessageReceiver) -> Result<()> {
        while let Some(message) = messages.recv().await {
            if let Err(e) = self.handle_proxy_message(message) {
                if e.is_fatal() {
                    error!(error = %e, "proxy client desynchronised");
                    self.close();
                    return Err(e);
                }
                warn!(error = %e, "proxy message ignored");
            }
        }
        debug!("host port closed");
        self.close();
        Ok(())
    }

    pub(crate) fn proxy_for(&self, remote: RemoteRef) -> ObjectProxy {
        ObjectProxy::new(self.clone(), remote.id, remote.kind)
    }

    async fn round_trip(&self, message: impl FnOnce(RequestId) -> ProxyMessage) -> Result<Outcome> {
        let request_id = self.inner.next_request.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = oneshot::channel();
        self.pending().insert(request_id, tx);
        if let Err(e) = self.inner.port.post(message(request_id)) {
            self.pending().remove(&request_id);
            return Err(e);
        }
        rx.await.map_err(|_| ProxyError::ChannelClosed)
    }

    /// Turn an outcome into a local value, waiting out promises.
    async fn revive(&self, mut outcome: Outcome) -> Result<RemoteValue> {
        loop {
            match outcome? {
                WireValue::Data(value) => return Ok(RemoteValue::Data(value)),
                WireValue::Remote(RemoteRef {
                    id,
                    kind: RemoteKind::Promise,
                }) => outcome = self.await_promise(id).await?,
                WireValue::Remote(remote) => return Ok(RemoteValue::Object(self.proxy_for(remote))),
            }
        }
    }

    /// Wait for a promise's settlement, then drop its slot once no other
    /// waiter is subscribed.
    async fn await_promise(&self, id: ObjectId) -> Result<Outcome> {
        let mut rx = self
            .promises()
            .entry(id.clone())
            .or_insert_with(|| watch::channel(None).0)
            .subscribe();
        let outcome = rx
            .wait_for(Option::is_some)
            .await
            .map_err(|_| ProxyError::ChannelClosed)?
            .clone()
            .ok_or(ProxyError::ChannelClosed)?;

        let mut promises = self.promises();
        if promises
            .get(&id)
            .is_some_and(|slot| slot.receiver_count() <= 1)
        {
            promises.remove(&id);
        }
        Ok(outcome)
    }

    fn close(&self) {
        self.pending().clear();
        self.promises().clear();
    }

    fn pending(&self) -> MutexGuard<'_, HashMap<RequestId, oneshot::Sender<Outcome>>> {
        self.inner
            .pending
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn promises(&self) -> MutexGuard<'_, HashMap<ObjectId, PromiseSlot>> {
        self.inner
            .promises
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}
