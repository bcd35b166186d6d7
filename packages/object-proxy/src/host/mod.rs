//! The host half: owns the registry and executes reflected operations.
//!
//! A [`ProxyHost`] consumes the worker's messages in arrival order. Answers
//! to `reflect` and `print_object` go back over the message port; answers to
//! `shared_memory` go through the [`SharedChannel`], waking the parked
//! worker.

mod interpreter;
mod object;
mod promise;
mod registry;

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use syncproxy_core::{
    codec, display_path, Failure, ObjectId, OperationError, Outcome, PromiseState, PropertyKey,
    ProxyError, ProxyMessage, ReflectRequest, RequestId, Result, SharedMemoryError, WireValue,
};
use syncproxy_shared_memory::SharedChannel;
use tracing::{debug, error, trace, warn};

use crate::port::{MessageReceiver, PostMessage};

pub use object::{DynamicObject, HostFunction, HostObject, HostValue, OpResult, SharedRecord};
pub use promise::{HostPromise, Resolver, Settlement};
pub use registry::Registry;

/// Placeholder returned by `print_object` when a value cannot be rendered.
pub const UNPRINTABLE: &str = "<unprintable object>";

/// Executes operations requested by the worker against real host objects.
///
/// Cloning is cheap and yields a handle to the same host.
#[derive(Clone)]
pub struct ProxyHost {
    inner: Arc<HostInner>,
}

struct HostInner {
    registry: Mutex<Registry>,
    channel: SharedChannel,
    port: Box<dyn PostMessage>,
}

impl ProxyHost {
    /// Create a host answering over `port` and `channel`.
    pub fn new(channel: SharedChannel, port: impl PostMessage + 'static) -> Self {
        Self {
            inner: Arc::new(HostInner {
                registry: Mutex::new(Registry::new()),
                channel,
                port: Box::new(port),
            }),
        }
    }

    /// Register a root object and return the id to publish to the worker.
    pub fn register_root(&self, value: impl Into<HostValue>) -> ObjectId {
        let id = self.registry().register_root(value);
        debug!(%id, "registered root object");
        id
    }

    /// The value behind `id`.
    pub fn resolve(&self, id: &ObjectId) -> Result<HostValue> {
        self.registry().resolve(id)
    }

    /// Number of live registry entries.
    pub fn registry_len(&self) -> usize {
        self.registry().len()
    }

    pub fn channel(&self) -> &SharedChannel {
        &self.inner.channel
    }

    /// Ask the worker's runtime to stop at its next safe point.
    pub fn interrupt(&self) {
        self.inner.channel.interrupt();
    }

    pub fn clear_interrupt(&self) {
        self.inner.channel.clear_interrupt();
    }

    /// Process messages until the worker's port closes.
    ///
    /// Returns early with the error if a message reveals the session is
    /// desynchronised.
    pub async fn serve(&self, mut messages: MessageReceiver) -> Result<()> {
        while let Some(message) = messages.recv().await {
            if let Err(e) = self.handle(message).await {
                if e.is_fatal() {
                    error!(error = %e, "terminating proxy session");
                    return Err(e);
                }
                warn!(error = %e, "proxy message failed");
            }
        }
        debug!("worker port closed");
        Ok(())
    }

    /// Handle one message from the worker.
    pub async fn handle(&self, message: ProxyMessage) -> Result<()> {
        trace!(kind = message.kind(), "host handling message");
        match message {
            ProxyMessage::Reflect {
                request_id,
                request,
            } => self.handle_reflect(request_id, request),
            ProxyMessage::SharedMemory { request } => self.handle_shared_memory(request).await,
            ProxyMessage::PrintObject {
                request_id,
                id,
                path,
            } => {
                let text = self.print_object(&id, &path);
                self.inner.port.post(ProxyMessage::Reply {
                    request_id,
                    outcome: Ok(WireValue::Data(text.into())),
                })
            }
            other @ (ProxyMessage::Reply { .. } | ProxyMessage::Promise { .. }) => Err(
                ProxyError::Protocol(format!("host received a {} message", other.kind())),
            ),
        }
    }

    fn handle_reflect(&self, request_id: RequestId, request: ReflectRequest) -> Result<()> {
        match self.run(&request) {
            Ok(value) => {
                let wire = self.registry().adopt(value.clone());
                self.inner.port.post(ProxyMessage::Reply {
                    request_id,
                    outcome: Ok(wire.clone()),
                })?;
                if let (HostValue::Promise(promise), Some(remote)) = (value, wire.as_remote()) {
                    self.watch_promise(remote.id.clone(), promise);
                }
                Ok(())
            }
            Err(e) => {
                self.inner.port.post(ProxyMessage::Reply {
                    request_id,
                    outcome: Err(e.to_failure()),
                })?;
                self.escalate(e, &request)
            }
        }
    }

    async fn handle_shared_memory(&self, request: ReflectRequest) -> Result<()> {
        let result = match self.run(&request) {
            Ok(HostValue::Promise(promise)) => promise.settled().await.map_err(ProxyError::from),
            other => other,
        };
        match result {
            Ok(value) => {
                let wire = self.registry().adopt(value);
                self.respond(Ok(wire))
            }
            Err(e) => {
                self.respond(Err(e.to_failure()))?;
                self.escalate(e, &request)
            }
        }
    }

    /// Write an outcome into the data region and wake the worker.
    ///
    /// An outcome too large for the region is replaced by a
    /// `PayloadTooLarge` failure so the worker is still released.
    fn respond(&self, outcome: Outcome) -> Result<()> {
        let bytes = codec::encode(&outcome)?;
        match self.inner.channel.respond(&bytes) {
            Ok(()) => Ok(()),
            Err(SharedMemoryError::PayloadTooLarge { size, capacity }) => {
                warn!(size, capacity, "response does not fit in the data region");
                let fallback: Outcome = Err(Failure::PayloadTooLarge { size, capacity });
                self.inner.channel.respond(&codec::encode(&fallback)?)?;
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }

    fn escalate(&self, e: ProxyError, request: &ReflectRequest) -> Result<()> {
        if e.is_fatal() {
            return Err(e);
        }
        debug!(%request, error = %e, "reflected operation failed");
        Ok(())
    }

    fn run(&self, request: &ReflectRequest) -> Result<HostValue> {
        let (root, args, value) = {
            let registry = self.registry();
            let root = registry.resolve(&request.id)?;
            let args = request
                .args
                .iter()
                .cloned()
                .map(|arg| registry.revive(arg))
                .collect::<Result<Vec<_>>>()?;
            let value = request
                .value
                .clone()
                .map(|v| registry.revive(v))
                .transpose()?;
            (root, args, value)
        };
        Ok(interpreter::execute(root, request, args, value)?)
    }

    /// Best-effort rendering of a value. Never fails.
    pub fn print_object(&self, id: &ObjectId, path: &[PropertyKey]) -> String {
        let rendered = self
            .resolve(id)
            .map_err(|e| OperationError::error(e.to_string()))
            .and_then(|root| interpreter::render(root, path));
        match rendered {
            Ok(text) => text,
            Err(e) => {
                debug!(%id, path = %display_path(path), error = %e, "print_object fell back");
                UNPRINTABLE.to_string()
            }
        }
    }

    /// Report the promise's settlement to the worker once it happens.
    fn watch_promise(&self, id: ObjectId, promise: HostPromise) {
        let host = self.clone();
        tokio::spawn(async move {
            let message = match promise.settled().await {
                Ok(value) => ProxyMessage::Promise {
                    id,
                    state: PromiseState::Fulfilled,
                    value: Some(host.registry().adopt(value)),
                    error: None,
                },
                Err(error) => ProxyMessage::Promise {
                    id,
                    state: PromiseState::Rejected,
                    value: None,
                    error: Some(error),
                },
            };
            if let Err(e) = host.inner.port.post(message) {
                warn!(error = %e, "dropping promise settlement");
            }
        });
    }

    fn registry(&self) -> MutexGuard<'_, Registry> {
        self.inner
            .registry
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::port::message_channel;
    use syncproxy_core::{path, RemoteKind, Value};
    use syncproxy_shared_memory::SharedChannelConfig;

    fn host() -> (ProxyHost, MessageReceiver) {
        let (tx, rx) = message_channel();
        let channel = SharedChannel::new(SharedChannelConfig::default());
        (ProxyHost::new(channel, tx), rx)
    }

    async fn reply(rx: &mut MessageReceiver) -> (u64, Outcome) {
        match rx.recv().await {
            Some(ProxyMessage::Reply {
                request_id,
                outcome,
            }) => (request_id, outcome),
            other => panic!("expected reply, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn reflect_get_length() {
        let (host, mut rx) = host();
        let id = host.register_root(Value::from(vec!["a", "b", "c"]));
        host.handle(ProxyMessage::Reflect {
            request_id: 1,
            request: ReflectRequest::get(id, path!["length"]),
        })
        .await
        .unwrap();

        let (request_id, outcome) = reply(&mut rx).await;
        assert_eq!(request_id, 1);
        assert_eq!(outcome, Ok(WireValue::Data(Value::Integer(3))));
    }

    #[tokio::test]
    async fn operation_failures_are_replies_not_errors() {
        let (host, mut rx) = host();
        let id = host.register_root(Value::map());
        host.handle(ProxyMessage::Reflect {
            request_id: 2,
            request: ReflectRequest::apply(id, path!["missing"], Vec::new()),
        })
        .await
        .unwrap();

        let (_, outcome) = reply(&mut rx).await;
        let Err(Failure::Operation { error }) = outcome else {
            panic!("expected operation failure");
        };
        assert_eq!(error.name, "TypeError");
    }

    #[tokio::test]
    async fn unknown_ids_are_fatal_but_answered() {
        let (host, mut rx) = host();
        let result = host
            .handle(ProxyMessage::Reflect {
                request_id: 3,
                request: ReflectRequest::get(ObjectId::from_string("stale"), path![]),
            })
            .await;
        assert!(matches!(result, Err(ProxyError::UnknownObjectId(_))));
        let (_, outcome) = reply(&mut rx).await;
        assert!(matches!(outcome, Err(Failure::UnknownObjectId { .. })));
    }

    #[tokio::test]
    async fn promise_results_settle_later() {
        let (host, mut rx) = host();
        let id = host.register_root(DynamicObject::new().with_method("later", |_| {
            Ok(HostPromise::from_future(async {
                tokio::time::sleep(Duration::from_millis(10)).await;
                Ok(Value::from("done").into())
            })
            .into())
        }));
        host.handle(ProxyMessage::Reflect {
            request_id: 4,
            request: ReflectRequest::apply(id, path!["later"], Vec::new()),
        })
        .await
        .unwrap();

        let (_, outcome) = reply(&mut rx).await;
        let remote = outcome.unwrap().as_remote().cloned().unwrap();
        assert_eq!(remote.kind, RemoteKind::Promise);

        match rx.recv().await {
            Some(ProxyMessage::Promise {
                id, state, value, ..
            }) => {
                assert_eq!(id, remote.id);
                assert_eq!(state, PromiseState::Fulfilled);
                assert_eq!(value, Some(WireValue::Data(Value::from("done"))));
            }
            other => panic!("expected promise message, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn print_object_never_fails() {
        let (host, mut rx) = host();
        host.handle(ProxyMessage::PrintObject {
            request_id: 5,
            id: ObjectId::from_string("nothing"),
            path: Vec::new(),
        })
        .await
        .unwrap();
        let (_, outcome) = reply(&mut rx).await;
        assert_eq!(outcome, Ok(WireValue::Data(Value::from(UNPRINTABLE))));
    }

    #[tokio::test]
    async fn stray_replies_are_protocol_errors() {
        let (host, _rx) = host();
        let result = host
            .handle(ProxyMessage::Reply {
                request_id: 0,
                outcome: Ok(WireValue::Data(Value::Null)),
            })
            .await;
        assert!(matches!(result, Err(ProxyError::Protocol(_))));
    }

    #[tokio::test]
    async fn shared_memory_without_waiter_is_rejected() {
        let (host, _rx) = host();
        let id = host.register_root(Value::map());
        let result = host
            .handle(ProxyMessage::SharedMemory {
                request: ReflectRequest::get(id, path!["x"]),
            })
            .await;
        assert!(matches!(result, Err(ProxyError::SharedMemory(_))));
    }
}
