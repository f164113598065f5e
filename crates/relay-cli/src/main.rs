//! relay - demo runner for relay-core
//!
//! Launches a few remote tasks on the in-process engine and prints what
//! comes back through completions, calls and bridges.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use async_trait::async_trait;
use clap::{Parser, ValueEnum};
use serde::Deserialize;
use serde_json::{Value, json};
use tokio::sync::mpsc;
use tokio::time::{Duration, timeout};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use relay_core::domain::events;
use relay_core::{
    Decoded, ExecutionContext, InProcessEngine, Relay, RelayConfig, RemoteFault, RemoteRegistry,
    RemoteScope, RemoteTask, TaskDescriptor,
};

#[derive(Parser, Debug)]
#[command(name = "relay")]
#[command(about = "Run remote tasks through the relay bridge", long_about = None)]
struct Args {
    /// TOML config file
    #[arg(short, long, env = "RELAY_CONFIG")]
    config: Option<PathBuf>,

    /// Execution context: thread_pool or blocking (overrides the config)
    #[arg(long, env = "RELAY_CONTEXT")]
    context: Option<ExecutionContext>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "RELAY_LOG_LEVEL")]
    log_level: Option<String>,

    /// Which demo to run
    #[arg(value_enum, default_value = "all")]
    scenario: Scenario,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum Scenario {
    Greet,
    Adder,
    Pair,
    All,
}

const WAIT: Duration = Duration::from_secs(5);

#[derive(Debug, Deserialize)]
struct LogLine {
    level: String,
    text: String,
}

/// 挨拶を組み立てて、途中経過を onLog ブリッジで caller に返す
struct Greet;

#[async_trait]
impl RemoteTask for Greet {
    const ENTRY: &'static str = "demo.greet.v1";

    async fn run(&self, scope: &mut RemoteScope) -> Result<Value, RemoteFault> {
        let name: String = scope.binding_as("name").unwrap_or_else(|| "world".to_string());
        scope
            .call_bridge("onLog", &json!({ "level": "info", "text": format!("greeting {name}") }))
            .await?;
        Ok(json!(format!("Hello, {name}!")))
    }
}

/// 常駐して add を公開する
struct Adder;

#[async_trait]
impl RemoteTask for Adder {
    const ENTRY: &'static str = "demo.adder.v1";
    const RESIDENT: bool = true;

    async fn run(&self, scope: &mut RemoteScope) -> Result<Value, RemoteFault> {
        scope.export("add", |args| {
            let (a, b) = args.decode_as::<(i64, i64)>()?;
            Some(json!(a + b))
        });
        Ok(json!({ "lambda": scope.lambda_id() }))
    }
}

/// 二つのブリッジを待たずに呼び、返事をそれぞれ受け取る
struct Pair;

#[async_trait]
impl RemoteTask for Pair {
    const ENTRY: &'static str = "demo.pair.v1";

    async fn run(&self, scope: &mut RemoteScope) -> Result<Value, RemoteFault> {
        let upper = scope.invoke_bridge("upper", "relay")?;
        let length = scope.invoke_bridge("length", "relay")?;
        let length = length.wait().await.map_or(Value::Null, Decoded::into_value);
        let upper = upper.wait().await.map_or(Value::Null, Decoded::into_value);
        Ok(json!({ "upper": upper, "length": length }))
    }
}

async fn run_greet(relay: &Relay) -> anyhow::Result<()> {
    let (done_tx, mut done_rx) = mpsc::unbounded_channel();

    let descriptor = TaskDescriptor::for_task::<Greet>()
        .bind("name", "relay")?
        .bridge("onLog", |args: Decoded| -> Option<Value> {
            match args.decode_as::<LogLine>() {
                Some(line) => info!(level = %line.level, "remote: {}", line.text),
                None => warn!(?args, "unreadable log line"),
            }
            None
        });

    relay.launch(descriptor, move |result, _| {
        let _ = done_tx.send(result);
    })?;

    let result = timeout(WAIT, done_rx.recv())
        .await
        .context("greet did not complete")?;
    println!("greet -> {}", result.unwrap_or_default());
    Ok(())
}

async fn run_adder(relay: &Relay) -> anyhow::Result<()> {
    let (reply_tx, mut reply_rx) = mpsc::unbounded_channel();

    let handle = relay.launch(TaskDescriptor::for_task::<Adder>(), move |result, handle| {
        info!(%result, exports = ?handle.exports(), "adder ready");
        let reply_tx = reply_tx.clone();
        if let Err(err) = handle.call_with("add", &[2, 3], move |reply: String| {
            let _ = reply_tx.send(reply);
        }) {
            warn!(%err, "add call failed");
        }
    })?;

    let reply = timeout(WAIT, reply_rx.recv())
        .await
        .context("add never answered")?;
    println!("add(2, 3) -> {}", reply.unwrap_or_default());

    // (常駐タスクは明示的に止める)
    handle.stop();
    Ok(())
}

async fn run_pair(relay: &Relay) -> anyhow::Result<()> {
    let (done_tx, mut done_rx) = mpsc::unbounded_channel();

    let descriptor = TaskDescriptor::for_task::<Pair>()
        .bridge("upper", |args: Decoded| -> Option<Value> {
            Some(json!(args.decode_as::<String>()?.to_uppercase()))
        })
        .bridge("length", |args: Decoded| -> Option<Value> {
            Some(json!(args.decode_as::<String>()?.len()))
        });

    relay.launch(descriptor, move |result, _| {
        let _ = done_tx.send(result);
    })?;

    let result = timeout(WAIT, done_rx.recv())
        .await
        .context("pair did not complete")?;
    println!("pair -> {}", result.unwrap_or_default());
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => RelayConfig::load(path)?,
        None => RelayConfig::default(),
    };
    if let Some(context) = args.context {
        config.default_context = context;
    }

    // Initialize tracing
    let filter = args
        .log_level
        .as_deref()
        .map(|level| format!("relay_core={level},relay={level}"))
        .unwrap_or_else(|| config.log_filter.clone());
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| filter.into()))
        .with(tracing_subscriber::fmt::layer())
        .init();

    // (A) リモート側で実行できるタスクを登録
    let tasks = RemoteRegistry::new().with(Greet)?.with(Adder)?.with(Pair)?;

    // (B) エンジンと Relay をつなぎ、ディスパッチループを起動
    let (events_tx, events_rx) = events::channel();
    let engine = Arc::new(InProcessEngine::new(tasks, events_tx)?);
    let relay = Relay::builder(engine).config(config).build();
    let dispatch = relay.spawn_dispatch_loop(events_rx);

    info!(context = %relay.config().default_context, scenario = ?args.scenario, "starting");

    // (C) シナリオを実行
    match args.scenario {
        Scenario::Greet => run_greet(&relay).await?,
        Scenario::Adder => run_adder(&relay).await?,
        Scenario::Pair => run_pair(&relay).await?,
        Scenario::All => {
            run_greet(&relay).await?;
            run_adder(&relay).await?;
            run_pair(&relay).await?;
        }
    }

    // (D) 後片付け
    let status = relay.status();
    info!(status = %serde_json::to_string(&status)?, "registry at exit");
    let delivered = dispatch.shutdown_and_join().await;
    info!(delivered, "dispatch loop stopped");
    Ok(())
}
