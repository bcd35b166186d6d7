//! A local object with most members forwarded to a remote one.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use syncproxy_core::{PropertyKey, Result, Value};

use super::{ObjectProxy, RemoteValue};

/// Property keys served from the local object instead of the remote one.
///
/// Which keys belong here depends on what the embedded runtime probes
/// synchronously, so the set is configuration and starts empty.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ExclusionSet {
    keys: BTreeSet<PropertyKey>,
}

impl ExclusionSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: impl Into<PropertyKey>) -> bool {
        self.keys.insert(key.into())
    }

    pub fn contains(&self, key: &PropertyKey) -> bool {
        self.keys.contains(key)
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &PropertyKey> {
        self.keys.iter()
    }
}

impl<K: Into<PropertyKey>> FromIterator<K> for ExclusionSet {
    fn from_iter<I: IntoIterator<Item = K>>(iter: I) -> Self {
        Self {
            keys: iter.into_iter().map(Into::into).collect(),
        }
    }
}

impl<K: Into<PropertyKey>> Extend<K> for ExclusionSet {
    fn extend<I: IntoIterator<Item = K>>(&mut self, iter: I) {
        self.keys.extend(iter.into_iter().map(Into::into));
    }
}

/// Where a member lookup on a [`SelectiveProxy`] lands.
#[derive(Clone, Debug)]
pub enum Member {
    /// An excluded key, answered from the local object.
    Local(Value),
    /// Any other key, still to be fetched from the host.
    Remote(ObjectProxy),
}

/// Wraps a natural object so that excluded keys are answered locally and
/// everything else goes to the remote object.
///
/// Lookup checks the exclusion set first; an excluded key never causes a
/// round trip, even when the local object lacks it.
#[derive(Clone, Debug)]
pub struct SelectiveProxy {
    remote: ObjectProxy,
    local: Value,
    exclusions: ExclusionSet,
}

impl SelectiveProxy {
    pub fn new(remote: ObjectProxy, local: Value, exclusions: ExclusionSet) -> Self {
        Self {
            remote,
            local,
            exclusions,
        }
    }

    pub fn remote(&self) -> &ObjectProxy {
        &self.remote
    }

    pub fn local(&self) -> &Value {
        &self.local
    }

    pub fn exclusions(&self) -> &ExclusionSet {
        &self.exclusions
    }

    pub fn is_local(&self, key: &PropertyKey) -> bool {
        self.exclusions.contains(key)
    }

    /// Resolve a member without any round trip.
    pub fn member(&self, key: impl Into<PropertyKey>) -> Member {
        let key = key.into();
        if self.is_local(&key) {
            Member::Local(self.local.property(&key).unwrap_or_default())
        } else {
            Member::Remote(self.remote.prop(key))
        }
    }

    pub async fn get(&self, key: impl Into<PropertyKey>) -> Result<RemoteValue> {
        match self.member(key) {
            Member::Local(value) => Ok(RemoteValue::Data(value)),
            Member::Remote(proxy) => proxy.value().await,
        }
    }

    /// Like [`get`](Self::get) but over the blocking path.
    pub fn get_sync(&self, key: impl Into<PropertyKey>) -> Result<RemoteValue> {
        match self.member(key) {
            Member::Local(value) => Ok(RemoteValue::Data(value)),
            Member::Remote(proxy) => proxy.value().then_sync(),
        }
    }

    pub async fn has(&self, key: impl Into<PropertyKey>) -> Result<bool> {
        let key = key.into();
        if self.is_local(&key) {
            return Ok(self.local.has_property(&key));
        }
        self.remote.has(key).await?.into_bool()
    }
}

#[cfg(test)]
mod tests {
    use collection_literals::btree;

    use super::*;
    use crate::port::message_channel;
    use crate::ProxyClient;
    use syncproxy_core::{path, ObjectId};
    use syncproxy_shared_memory::{SharedChannel, SharedChannelConfig};

    fn selective() -> SelectiveProxy {
        let (tx, _rx) = message_channel();
        let client = ProxyClient::new(SharedChannel::new(SharedChannelConfig::default()), tx);
        let local = Value::Map(btree! {
            "origin".to_string() => Value::from("local"),
        });
        let exclusions: ExclusionSet = ["origin", "fetch"].into_iter().collect();
        SelectiveProxy::new(client.object_proxy(ObjectId::from_string("g")), local, exclusions)
    }

    #[test]
    fn excluded_keys_stay_local() {
        let proxy = selective();
        match proxy.member("origin") {
            Member::Local(value) => assert_eq!(value, Value::from("local")),
            other => panic!("unexpected {:?}", other),
        }
        // Excluded but absent locally: still no round trip.
        assert!(matches!(proxy.member("fetch"), Member::Local(Value::Null)));
    }

    #[test]
    fn other_keys_are_forwarded() {
        let proxy = selective();
        let Member::Remote(handle) = proxy.member("document") else {
            panic!("expected remote member");
        };
        assert_eq!(handle.path(), path!["document"].as_slice());
    }

    #[tokio::test]
    async fn local_get_needs_no_host() {
        let proxy = selective();
        let value = proxy.get("origin").await.unwrap();
        assert_eq!(value.as_data(), Some(&Value::from("local")));
        assert!(proxy.has("origin").await.unwrap());
        assert!(!proxy.has("fetch").await.unwrap());
    }

    #[test]
    fn exclusion_set_deserializes_from_keys() {
        let set: ExclusionSet =
            serde_json::from_str(r#"["then", {"symbol": "Symbol.iterator"}]"#).unwrap();
        assert!(set.contains(&PropertyKey::from("then")));
        assert!(set.contains(&PropertyKey::iterator()));
        assert_eq!(set.len(), 2);
    }
}
