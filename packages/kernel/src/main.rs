use std::collections::BTreeMap;
use std::io;
use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use syncproxy_core::Value;
use syncproxy_kernel::{Environment, HostSession, KernelError, SessionConfig, WorkerSession};
use syncproxy_object_proxy::{DynamicObject, Member};
use tracing_subscriber::EnvFilter;

/// syncproxy demo - run a worker that talks to its host synchronously
#[derive(Parser, Debug)]
#[command(name = "syncproxy-demo")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// JSON session configuration
    #[arg(long)]
    config: Option<PathBuf>,

    /// Override the workspace root
    #[arg(long)]
    root: Option<String>,

    /// Override the data region capacity in bytes
    #[arg(long)]
    capacity: Option<usize>,

    /// Answer the worker's input prompt with this line
    #[arg(long, default_value = "world")]
    answer: String,

    /// Log every filesystem call
    #[arg(long)]
    fs_log: bool,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("warn,syncproxy_kernel=info")),
        )
        .init();

    if let Err(e) = run(Args::parse()).await {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

async fn run(args: Args) -> syncproxy_kernel::Result<()> {
    let mut config = match &args.config {
        Some(path) => SessionConfig::from_path(path)?,
        None => SessionConfig::default(),
    };
    if let Some(root) = args.root {
        config.root = root;
    }
    if let Some(capacity) = args.capacity {
        config.channel.data_capacity = capacity;
    }
    config.fs_log |= args.fs_log;

    let answer = args.answer;
    let global = DynamicObject::new()
        .with("navigator", Value::from("syncproxy-demo"))
        .with_method("greet", |args| {
            let name = args
                .first()
                .and_then(|arg| arg.as_data())
                .and_then(Value::as_str)
                .unwrap_or("stranger")
                .to_string();
            Ok(Value::from(format!("hello, {}", name)).into())
        });
    let local = Value::Map(BTreeMap::from([(
        "origin".to_string(),
        Value::from("worker"),
    )]));

    let env = Environment::new(&config.root)
        .with_input(Arc::new(move |_prompt: &str| answer.clone()))
        .with_global(global)
        .with_local_globals(local);

    let session = HostSession::start(config, env, worker).await?;
    session.join().await??;
    Ok(())
}

fn worker(session: WorkerSession) -> Result<(), KernelError> {
    let fs = session.fs();
    let notes = session.resolve_path("notes/todo.txt");
    fs.put(&notes, Some("write the demo"))?;
    fs.rename(&notes, &session.resolve_path("notes/done.txt"))?;
    println!("notes: {:?}", fs.list_directory(&session.resolve_path("notes"))?);
    println!(
        "done.txt: {:?}",
        fs.get(&session.resolve_path("notes/done.txt"))?
    );
    match fs.get(&notes) {
        Err(e) if e.kind() == io::ErrorKind::NotFound => println!("todo.txt: moved"),
        other => println!("todo.txt: {:?}", other),
    }

    let name = session.input().read_line("name? ")?;
    let greeting = session
        .global()
        .remote()
        .call("greet", vec![Value::from(name).into()])
        .then_sync()?
        .into_data()?;
    println!("{}", greeting.as_str().unwrap_or_default());

    let navigator = session.global().get_sync("navigator")?.into_data()?;
    println!("navigator: {:?}", navigator);
    if let Member::Local(origin) = session.global().member("origin") {
        println!("origin (local): {:?}", origin);
    }
    Ok(())
}
