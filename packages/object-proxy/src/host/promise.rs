//! Host-side eventual values.

use std::fmt;
use std::future::Future;
use std::sync::Arc;

use tokio::sync::watch;

use syncproxy_core::OperationError;

use super::object::{HostValue, OpResult};

/// Current state of a [`HostPromise`].
#[derive(Clone, Debug)]
pub enum Settlement {
    Pending,
    Fulfilled(HostValue),
    Rejected(OperationError),
}

impl Settlement {
    pub fn is_pending(&self) -> bool {
        matches!(self, Settlement::Pending)
    }
}

/// A value the host will produce later.
///
/// Cloning yields the same promise. Settlement happens at most once,
/// through the paired [`Resolver`].
#[derive(Clone)]
pub struct HostPromise {
    state: Arc<watch::Sender<Settlement>>,
}

impl HostPromise {
    /// Create a pending promise and the resolver that settles it.
    pub fn channel() -> (HostPromise, Resolver) {
        let (tx, _rx) = watch::channel(Settlement::Pending);
        let state = Arc::new(tx);
        let resolver = Resolver {
            state: Arc::clone(&state),
        };
        (HostPromise { state }, resolver)
    }

    pub fn resolved(value: impl Into<HostValue>) -> Self {
        let (promise, resolver) = Self::channel();
        resolver.resolve(value);
        promise
    }

    pub fn rejected(error: OperationError) -> Self {
        let (promise, resolver) = Self::channel();
        resolver.reject(error);
        promise
    }

    /// Drive `future` on the current tokio runtime and settle with its output.
    ///
    /// Must be called from within a runtime context.
    pub fn from_future<F>(future: F) -> Self
    where
        F: Future<Output = OpResult<HostValue>> + Send + 'static,
    {
        let (promise, resolver) = Self::channel();
        tokio::spawn(async move {
            match future.await {
                Ok(value) => resolver.resolve(value),
                Err(error) => resolver.reject(error),
            }
        });
        promise
    }

    /// Snapshot of the current state.
    pub fn state(&self) -> Settlement {
        self.state.borrow().clone()
    }

    /// Wait until settled and return the outcome.
    ///
    /// A promise fulfilled with another promise settles with the inner
    /// promise's outcome.
    pub async fn settled(&self) -> OpResult<HostValue> {
        let mut current = self.clone();
        loop {
            let mut rx = current.state.subscribe();
            let settlement = match rx.wait_for(|s| !s.is_pending()).await {
                Ok(state) => state.clone(),
                // The sender lives in `current`, so the channel cannot close.
                Err(_) => Settlement::Rejected(OperationError::error("promise abandoned")),
            };
            match settlement {
                Settlement::Fulfilled(HostValue::Promise(inner)) => current = inner,
                Settlement::Fulfilled(value) => return Ok(value),
                Settlement::Rejected(error) => return Err(error),
                Settlement::Pending => {}
            }
        }
    }

    pub(crate) fn address(&self) -> usize {
        Arc::as_ptr(&self.state) as *const () as usize
    }
}

impl fmt::Debug for HostPromise {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = match &*self.state.borrow() {
            Settlement::Pending => "pending",
            Settlement::Fulfilled(_) => "fulfilled",
            Settlement::Rejected(_) => "rejected",
        };
        f.debug_struct("HostPromise").field("state", &state).finish()
    }
}

/// Settles a [`HostPromise`].
///
/// Dropping an unused resolver rejects the promise so waiters never hang on
/// a value nobody will produce.
pub struct Resolver {
    state: Arc<watch::Sender<Settlement>>,
}

impl Resolver {
    pub fn resolve(self, value: impl Into<HostValue>) {
        self.settle(Settlement::Fulfilled(value.into()));
    }

    pub fn reject(self, error: OperationError) {
        self.settle(Settlement::Rejected(error));
    }

    fn settle(&self, settlement: Settlement) {
        self.state.send_if_modified(|state| {
            if state.is_pending() {
                *state = settlement;
                true
            } else {
                false
            }
        });
    }
}

impl Drop for Resolver {
    fn drop(&mut self) {
        self.settle(Settlement::Rejected(OperationError::error(
            "promise dropped without settling",
        )));
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use syncproxy_core::Value;

    #[tokio::test]
    async fn resolves_once() {
        let (promise, resolver) = HostPromise::channel();
        assert!(promise.state().is_pending());
        resolver.resolve(Value::Integer(1));
        let value = promise.settled().await.unwrap();
        assert_eq!(value.as_data(), Some(&Value::Integer(1)));
    }

    #[tokio::test]
    async fn from_future_settles_later() {
        let promise = HostPromise::from_future(async {
            tokio::time::sleep(Duration::from_millis(20)).await;
            Ok(HostValue::Data(Value::from("late")))
        });
        assert!(promise.state().is_pending());
        let value = promise.settled().await.unwrap();
        assert_eq!(value.as_data(), Some(&Value::from("late")));
    }

    #[tokio::test]
    async fn dropped_resolver_rejects() {
        let (promise, resolver) = HostPromise::channel();
        drop(resolver);
        let error = promise.settled().await.unwrap_err();
        assert_eq!(error.message, "promise dropped without settling");
    }

    #[tokio::test]
    async fn nested_promises_flatten() {
        let inner = HostPromise::resolved(Value::Integer(7));
        let outer = HostPromise::resolved(inner);
        let value = outer.settled().await.unwrap();
        assert_eq!(value.as_data(), Some(&Value::Integer(7)));
    }

    #[tokio::test]
    async fn rejection_carries_error() {
        let promise = HostPromise::rejected(OperationError::new("NotFound", "no such file"));
        let error = promise.settled().await.unwrap_err();
        assert_eq!(error.name, "NotFound");
    }
}
