//! Session lifecycle: bring up a worker thread wired to a host.
//!
//! The host allocates the shared buffers, registers the three roots and
//! hands the worker a [`Handshake`]. The worker builds its client from it,
//! starts listening, and reports `initialized` before any user code runs.

use std::future::Future;
use std::sync::Arc;
use std::thread;

use syncproxy_core::{ObjectId, ProxyError, Value};
use syncproxy_object_proxy::{
    message_channel, DynamicObject, ExclusionSet, HostValue, MessageReceiver, PostMessage,
    ProxyClient, ProxyHost, SelectiveProxy,
};
use syncproxy_shared_memory::{SharedBuffers, SharedChannel};
use tokio::runtime::Runtime;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

use crate::config::SessionConfig;
use crate::error::{KernelError, Result};
use crate::fs::{from_root, FileSystem, FileSystemObject, MemoryFileSystem, SanitizeOptions, SyncFs};
use crate::input::{default_input, input_root, Input, InputFn};

/// Ids of the roots every session registers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RootIds {
    pub input: ObjectId,
    pub filesystem: ObjectId,
    pub global_this: ObjectId,
}

/// Everything the worker needs to reach the host.
#[derive(Debug, Clone)]
pub struct Handshake {
    pub ids: RootIds,
    pub buffers: SharedBuffers,
    /// Workspace root relative paths resolve against.
    pub root: String,
    pub exclusions: ExclusionSet,
    /// Worker-side values for excluded globals.
    pub local_globals: Value,
}

/// Host-side objects exposed through the roots.
pub struct Environment {
    pub input: InputFn,
    pub fs: Arc<dyn FileSystem>,
    pub global: HostValue,
    pub local_globals: Value,
}

impl Environment {
    /// An environment whose filesystem lives in memory under `root`.
    pub fn new(root: &str) -> Self {
        Self {
            input: default_input(),
            fs: Arc::new(MemoryFileSystem::new(SanitizeOptions::with_root(root))),
            global: DynamicObject::new().into(),
            local_globals: Value::map(),
        }
    }

    pub fn with_input(mut self, input: InputFn) -> Self {
        self.input = input;
        self
    }

    pub fn with_fs(mut self, fs: Arc<dyn FileSystem>) -> Self {
        self.fs = fs;
        self
    }

    pub fn with_global(mut self, global: impl Into<HostValue>) -> Self {
        self.global = global.into();
        self
    }

    pub fn with_local_globals(mut self, local_globals: Value) -> Self {
        self.local_globals = local_globals;
        self
    }
}

impl Default for Environment {
    fn default() -> Self {
        Self::new(crate::config::DEFAULT_ROOT)
    }
}

/// The host's end of a running session.
///
/// Owns the proxy host, the task serving it, and the worker thread.
pub struct HostSession<T> {
    host: ProxyHost,
    ids: RootIds,
    serve: JoinHandle<std::result::Result<(), ProxyError>>,
    worker: thread::JoinHandle<Result<T>>,
}

impl<T: Send + 'static> HostSession<T> {
    /// Start a worker running `task` and wait until it is initialized.
    ///
    /// Must be called from within a tokio runtime.
    pub async fn start<W>(config: SessionConfig, env: Environment, task: W) -> Result<Self>
    where
        W: FnOnce(WorkerSession) -> T + Send + 'static,
    {
        let buffers = SharedBuffers::allocate(&config.channel);
        let (to_host, host_inbox) = message_channel();
        let (to_worker, worker_inbox) = message_channel();

        let host = ProxyHost::new(SharedChannel::from_buffers(buffers.clone()), to_worker);
        let ids = RootIds {
            input: host.register_root(input_root(env.input)),
            filesystem: host.register_root(HostValue::object(FileSystemObject::new(
                env.fs,
                config.fs_log,
            ))),
            global_this: host.register_root(env.global),
        };
        let handshake = Handshake {
            ids: ids.clone(),
            buffers,
            root: config.root,
            exclusions: config.exclusions,
            local_globals: env.local_globals,
        };
        debug!(
            capacity = config.channel.data_capacity,
            root = %handshake.root,
            "starting worker"
        );

        let (initialized, ready) = oneshot::channel();
        let worker = thread::Builder::new()
            .name("syncproxy-worker".to_string())
            .spawn(move || {
                let session = WorkerSession::connect(handshake, to_host, worker_inbox)?;
                if initialized.send(()).is_err() {
                    return Err(KernelError::WorkerLost);
                }
                Ok(task(session))
            })
            .map_err(KernelError::Spawn)?;

        let server = host.clone();
        let serve = tokio::spawn(async move { server.serve(host_inbox).await });

        if ready.await.is_err() {
            serve.abort();
            return Err(match worker.join() {
                Ok(Err(e)) => e,
                Ok(Ok(_)) => KernelError::WorkerLost,
                Err(_) => KernelError::WorkerPanicked,
            });
        }
        info!("worker initialized");

        Ok(Self {
            host,
            ids,
            serve,
            worker,
        })
    }

    pub fn host(&self) -> &ProxyHost {
        &self.host
    }

    pub fn ids(&self) -> &RootIds {
        &self.ids
    }

    /// Raise the advisory interrupt for the worker's current run.
    pub fn interrupt(&self) {
        self.host.interrupt();
    }

    pub fn clear_interrupt(&self) {
        self.host.clear_interrupt();
    }

    /// Wait for the worker to finish and the host to drain.
    ///
    /// The host stops serving once every worker-side proxy is dropped, so
    /// the worker's output must not hold on to proxies.
    pub async fn join(self) -> Result<T> {
        let worker = self.worker;
        let output = tokio::task::spawn_blocking(move || worker.join())
            .await
            .map_err(|_| KernelError::WorkerPanicked)?
            .map_err(|_| KernelError::WorkerPanicked)?;
        match self.serve.await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                error!(error = %e, "proxy session ended with an error");
                return Err(e.into());
            }
            Err(_) => return Err(KernelError::WorkerPanicked),
        }
        output
    }

    /// Stop serving the worker without waiting for it.
    ///
    /// A worker parked in a blocking call stays parked; its thread is
    /// detached.
    pub fn dispose(self) {
        debug!("disposing session");
        self.host.interrupt();
        self.serve.abort();
    }
}

/// The worker's end of a running session.
pub struct WorkerSession {
    client: ProxyClient,
    input: Input,
    fs: SyncFs,
    global: SelectiveProxy,
    root: String,
    runtime: Runtime,
}

impl WorkerSession {
    /// Build the worker's client from a handshake and start listening for
    /// the host's messages.
    pub fn connect(
        handshake: Handshake,
        to_host: impl PostMessage + 'static,
        inbox: MessageReceiver,
    ) -> Result<Self> {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(1)
            .thread_name("syncproxy-listener")
            .enable_all()
            .build()
            .map_err(KernelError::Spawn)?;

        let client = ProxyClient::new(SharedChannel::from_buffers(handshake.buffers), to_host);
        let listener = client.clone();
        runtime.spawn(async move {
            if let Err(e) = listener.listen(inbox).await {
                error!(error = %e, "worker listener stopped");
            }
        });

        let Handshake {
            ids,
            root,
            exclusions,
            local_globals,
            ..
        } = handshake;
        Ok(Self {
            input: Input::new(client.object_proxy(ids.input)),
            fs: SyncFs::new(client.object_proxy(ids.filesystem)),
            global: SelectiveProxy::new(client.object_proxy(ids.global_this), local_globals, exclusions),
            client,
            root,
            runtime,
        })
    }

    pub fn client(&self) -> &ProxyClient {
        &self.client
    }

    pub fn input(&self) -> &Input {
        &self.input
    }

    pub fn fs(&self) -> &SyncFs {
        &self.fs
    }

    /// The host's global object, with excluded names served locally.
    pub fn global(&self) -> &SelectiveProxy {
        &self.global
    }

    pub fn root(&self) -> &str {
        &self.root
    }

    /// Resolve `path` against the workspace root.
    pub fn resolve_path(&self, path: &str) -> String {
        from_root(&self.root, path)
    }

    /// Whether the host has asked the current run to stop.
    pub fn interrupted(&self) -> bool {
        self.client.is_interrupted()
    }

    /// Drive an asynchronous proxy operation to completion.
    pub fn block_on<F: Future>(&self, future: F) -> F::Output {
        self.runtime.block_on(future)
    }
}
