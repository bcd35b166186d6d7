//! Host and client wired together over real channels.

use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use syncproxy_core::{ObjectId, OperationError, PropertyKey, ProxyError, Value};
use syncproxy_object_proxy::{
    message_channel, DynamicObject, HostObject, HostPromise, HostValue, OpResult, ProxyClient,
    ProxyHost, RemoteValue,
};
use syncproxy_shared_memory::{LockState, SharedChannel, SharedChannelConfig};

fn connect(data_capacity: usize) -> (ProxyHost, ProxyClient) {
    let channel = SharedChannel::new(SharedChannelConfig::with_data_capacity(data_capacity));
    let (to_host, host_inbox) = message_channel();
    let (to_worker, worker_inbox) = message_channel();

    let host = ProxyHost::new(channel.clone(), to_worker);
    let client = ProxyClient::new(channel, to_host);

    tokio::spawn({
        let host = host.clone();
        async move {
            let _ = host.serve(host_inbox).await;
        }
    });
    tokio::spawn({
        let client = client.clone();
        async move {
            let _ = client.listen(worker_inbox).await;
        }
    });
    (host, client)
}

fn session() -> (ProxyHost, ProxyClient) {
    connect(64 * 1024)
}

fn integer(args: &[HostValue], index: usize) -> OpResult<i64> {
    args.get(index)
        .and_then(HostValue::as_data)
        .and_then(Value::as_i64)
        .ok_or_else(|| OperationError::type_error(format!("argument {} is not an integer", index)))
}

fn adder() -> HostValue {
    HostValue::function("add", |args| Ok(Value::Integer(integer(&args, 0)? + integer(&args, 1)?).into()))
}

/// Every property resolves after a delay.
struct SlowStore {
    delay: Duration,
}

impl HostObject for SlowStore {
    fn get(&self, key: &PropertyKey) -> OpResult<HostValue> {
        let delay = self.delay;
        let key = key.to_string();
        Ok(HostPromise::from_future(async move {
            tokio::time::sleep(delay).await;
            Ok(Value::from(format!("value of {}", key)).into())
        })
        .into())
    }
}

async fn blocking<T, F>(f: F) -> T
where
    F: FnOnce() -> T + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f).await.unwrap()
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn length_of_array_root() {
    let (host, client) = session();
    let id = host.register_root(Value::from(vec!["a", "b", "c"]));
    let root = client.object_proxy(id);

    let length = root.get("length").await.unwrap();
    assert_eq!(length.as_data(), Some(&Value::Integer(3)));

    let deferred = root.get("length");
    let length = blocking(move || deferred.then_sync()).await.unwrap();
    assert_eq!(length.as_data(), Some(&Value::Integer(3)));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn apply_function_root() {
    let (host, client) = session();
    let add = client.object_proxy(host.register_root(adder()));
    let args = || vec![Value::Integer(2).into(), Value::Integer(3).into()];

    let sum = add.apply(args()).await.unwrap();
    assert_eq!(sum.as_data(), Some(&Value::Integer(5)));

    let deferred = add.apply(args());
    let sum = blocking(move || deferred.then_sync()).await.unwrap();
    assert_eq!(sum.as_data(), Some(&Value::Integer(5)));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn then_sync_waits_for_async_host_work() {
    let (host, client) = session();
    let delay = Duration::from_millis(50);
    let store = client.object_proxy(host.register_root(HostValue::object(SlowStore { delay })));

    let deferred = store.get("config");
    let started = Instant::now();
    let value = blocking(move || deferred.then_sync()).await.unwrap();
    assert!(started.elapsed() >= delay);
    assert_eq!(value.as_data(), Some(&Value::from("value of config")));
    assert_eq!(client.channel().state(), LockState::Idle);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn async_path_flattens_promises() {
    let (host, client) = session();
    let store = client.object_proxy(host.register_root(HostValue::object(SlowStore {
        delay: Duration::from_millis(10),
    })));
    let value = store.get("name").await.unwrap();
    assert_eq!(value.as_data(), Some(&Value::from("value of name")));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn rejected_promises_fail_the_call() {
    let (host, client) = session();
    let root = DynamicObject::new().with_method("open", |_| {
        Ok(HostPromise::rejected(OperationError::new("NotFound", "no such file")).into())
    });
    let root = client.object_proxy(host.register_root(root));

    let err = root.call("open", Vec::new()).await.unwrap_err();
    assert!(matches!(err, ProxyError::OperationFailed(ref e) if e.name == "NotFound"));

    let deferred = root.call("open", Vec::new());
    let err = blocking(move || deferred.then_sync()).await.unwrap_err();
    assert!(matches!(err, ProxyError::OperationFailed(ref e) if e.message == "no such file"));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn sync_and_async_paths_agree() {
    let (host, client) = session();
    let root = DynamicObject::new()
        .with("title", Value::from("notes"))
        .with("add", adder());
    let root = client.object_proxy(host.register_root(root));

    let deferreds = || {
        vec![
            root.get("title"),
            root.has("title"),
            root.has("missing"),
            root.own_keys(),
            root.call("add", vec![Value::Integer(40).into(), Value::Integer(2).into()]),
        ]
    };

    let mut asynchronous = Vec::new();
    for deferred in deferreds() {
        asynchronous.push(deferred.await.unwrap().into_data().unwrap());
    }
    let synchronous = blocking({
        let batch = deferreds();
        move || {
            batch
                .into_iter()
                .map(|d| d.then_sync().unwrap().into_data().unwrap())
                .collect::<Vec<_>>()
        }
    })
    .await;
    assert_eq!(asynchronous, synchronous);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn nested_objects_alias() {
    let (host, client) = session();
    let counter = Arc::new(AtomicI64::new(0));
    let child = DynamicObject::new().with_method("bump", {
        let counter = Arc::clone(&counter);
        move |_| Ok(Value::Integer(counter.fetch_add(1, Ordering::SeqCst) + 1).into())
    });
    let root = client.object_proxy(host.register_root(DynamicObject::new().with("child", child)));

    let first = root.get("child").await.unwrap().into_object().unwrap();
    let second = root.get("child").await.unwrap().into_object().unwrap();
    assert_eq!(first.id(), second.id());

    first.call("bump", Vec::new()).await.unwrap();
    let fresh = client.object_proxy(second.id().clone());
    let count = fresh.call("bump", Vec::new()).await.unwrap();
    assert_eq!(count.as_data(), Some(&Value::Integer(2)));
    assert_eq!(counter.load(Ordering::SeqCst), 2);
    // Methods run in place, so only the root and the child are registered.
    assert_eq!(host.registry_len(), 2);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn remote_objects_pass_back_as_arguments() {
    let (host, client) = session();
    let root = DynamicObject::new()
        .with("add", adder())
        .with_method("invoke", |args| {
            let mut args = args.into_iter();
            let target = args.next().unwrap_or_else(HostValue::null);
            let Some(function) = target.as_object() else {
                return Err(OperationError::type_error("expected a function"));
            };
            function.apply(args.collect())
        });
    let root = client.object_proxy(host.register_root(root));

    let add = root.get("add").await.unwrap().into_object().unwrap();
    let reference = add.reference().unwrap();
    let sum = root
        .call(
            "invoke",
            vec![reference.into(), Value::Integer(1).into(), Value::Integer(1).into()],
        )
        .await
        .unwrap();
    assert_eq!(sum.as_data(), Some(&Value::Integer(2)));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn writes_to_data_roots_persist() {
    let (host, client) = session();
    let id = host.register_root(Value::map());
    let root = client.object_proxy(id.clone());

    root.set("cwd", Value::from("/home")).await.unwrap();
    let deferred = root.get("cwd");
    let cwd = blocking(move || deferred.then_sync()).await.unwrap();
    assert_eq!(cwd.as_data(), Some(&Value::from("/home")));

    let HostValue::Record(record) = host.resolve(&id).unwrap() else {
        panic!("expected record root");
    };
    assert_eq!(
        record.snapshot().get(&[PropertyKey::from("cwd")]),
        Some(&Value::from("/home"))
    );

    assert!(root.delete_property("cwd").await.unwrap().into_bool().unwrap());
    assert!(!root.has("cwd").await.unwrap().into_bool().unwrap());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn interrupt_does_not_disturb_blocking_call() {
    let (host, client) = session();
    let store = client.object_proxy(host.register_root(HostValue::object(SlowStore {
        delay: Duration::from_millis(100),
    })));

    let deferred = store.get("result");
    let waiting = tokio::task::spawn_blocking(move || deferred.then_sync());
    tokio::time::sleep(Duration::from_millis(20)).await;
    host.interrupt();
    assert!(client.is_interrupted());

    let value = waiting.await.unwrap().unwrap();
    assert_eq!(value.as_data(), Some(&Value::from("value of result")));
    assert!(client.is_interrupted());
    host.clear_interrupt();
    assert!(!client.is_interrupted());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn oversized_payloads_are_rejected() {
    let (host, client) = connect(256);
    let root = DynamicObject::new()
        .with("big", Value::from("x".repeat(1000)))
        .with("small", Value::Integer(1))
        .with("echo", HostValue::function("echo", |args| {
            Ok(args.into_iter().next().unwrap_or_else(HostValue::null))
        }));
    let root = client.object_proxy(host.register_root(root));

    // Request too large: refused before anything is sent.
    let deferred = root.call("echo", vec![Value::from("y".repeat(1000)).into()]);
    let err = blocking(move || deferred.then_sync()).await.unwrap_err();
    assert!(matches!(err, ProxyError::PayloadTooLarge { .. }));
    assert!(!err.is_fatal());

    // Response too large: the host answers with a failure instead.
    let deferred = root.get("big");
    let err = blocking(move || deferred.then_sync()).await.unwrap_err();
    assert!(matches!(err, ProxyError::PayloadTooLarge { size, capacity } if size > capacity));

    // The channel is still usable afterwards, and the async path has no limit.
    let deferred = root.get("small");
    let small = blocking(move || deferred.then_sync()).await.unwrap();
    assert_eq!(small.as_data(), Some(&Value::Integer(1)));
    let big = root.get("big").await.unwrap().into_data().unwrap();
    assert_eq!(big.as_str().map(str::len), Some(1000));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn unknown_object_ids_are_fatal() {
    let (_host, client) = session();
    let stale = client.object_proxy(ObjectId::new());
    let err = stale.get("anything").await.unwrap_err();
    assert!(matches!(err, ProxyError::UnknownObjectId(_)));
    assert!(err.is_fatal());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn print_object_renders_or_falls_back() {
    let (host, client) = session();
    let add = client.object_proxy(host.register_root(adder()));
    assert_eq!(add.print().await.unwrap(), "function add() { [native code] }");

    let list = client.object_proxy(host.register_root(Value::from(vec![1i64, 2, 3])));
    assert_eq!(list.print().await.unwrap(), "[1,2,3]");

    let nothing = client.object_proxy(ObjectId::new());
    assert_eq!(nothing.print().await.unwrap(), "<unprintable object>");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn calling_data_fails_without_ending_the_session() {
    let (host, client) = session();
    let root = client.object_proxy(host.register_root(Value::map()));
    let err = root.call("missing", Vec::new()).await.unwrap_err();
    assert!(matches!(err, ProxyError::OperationFailed(_)));

    let after = root.has("missing").await.unwrap();
    assert!(matches!(after, RemoteValue::Data(Value::Bool(false))));
}
