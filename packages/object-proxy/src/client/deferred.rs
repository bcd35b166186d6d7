//! Lazily issued remote operations.

use std::fmt;
use std::future::{Future, IntoFuture};
use std::pin::Pin;

use syncproxy_core::{ReflectRequest, Result};

use super::{ProxyClient, RemoteValue};

/// A remote operation that has been described but not yet sent.
///
/// Await it to run the operation over the message port, or hand it to
/// [`ProxyClient::then_sync`] (or call [`then_sync`](Self::then_sync)) to
/// run it over the blocking path. Either way the operation is issued once.
#[must_use = "a Deferred does nothing until awaited or passed to then_sync"]
pub struct Deferred {
    client: ProxyClient,
    request: ReflectRequest,
}

impl Deferred {
    pub(crate) fn new(client: ProxyClient, request: ReflectRequest) -> Self {
        Self { client, request }
    }

    /// The operation this will perform.
    pub fn request(&self) -> &ReflectRequest {
        &self.request
    }

    pub fn into_request(self) -> ReflectRequest {
        self.request
    }

    /// Run over the blocking path on the client this was created from.
    pub fn then_sync(self) -> Result<RemoteValue> {
        let client = self.client.clone();
        client.then_sync(self)
    }
}

impl IntoFuture for Deferred {
    type Output = Result<RemoteValue>;
    type IntoFuture = Pin<Box<dyn Future<Output = Result<RemoteValue>> + Send>>;

    fn into_future(self) -> Self::IntoFuture {
        Box::pin(async move { self.client.reflect(self.request).await })
    }
}

impl fmt::Debug for Deferred {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Deferred").field(&self.request).finish()
    }
}
