//! InProcessEngine - tokio のワーカープールで動くホストエンジン
//!
//! # 実装詳細
//! - プログラムはエントリ名で `RemoteRegistry` から引いたタスクとして実行
//! - lambda ごとに reply slot テーブルと exports を保持
//! - caller 側への配送はすべて `HostEvent` としてチャネルに流す
//!
//! Nothing is shared with the caller except the event channel and the text
//! passed through the `HostEngine` methods.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;
use serde_json::Value;
use tokio::runtime::Handle;
use tokio::task::AbortHandle;
use tracing::{debug, warn};

use crate::domain::payload;
use crate::domain::{
    CallbackId, CompletionPayload, Decoded, EngineError, EventSender, ExecutionContext, HostEvent,
    LambdaId, RemoteProgram, RemoteStatement, RemoteTarget,
};
use crate::ports::HostEngine;
use crate::typed::{DynRemoteTask, ExportFn, RemoteRegistry, RemoteScope, ReplySlots};

type LambdaTable = Arc<Mutex<HashMap<LambdaId, Arc<LambdaContext>>>>;

/// Remote-side state of one live lambda.
#[derive(Default)]
struct LambdaContext {
    slots: Arc<ReplySlots>,
    exports: Mutex<BTreeMap<String, ExportFn>>,
    abort: Mutex<Option<AbortHandle>>,
}

pub struct InProcessEngine {
    tasks: Arc<RemoteRegistry>,
    events: EventSender,
    runtime: Handle,
    next_id: AtomicU64,
    lambdas: LambdaTable,
}

impl InProcessEngine {
    /// Build an engine on the current tokio runtime.
    pub fn new(tasks: impl Into<Arc<RemoteRegistry>>, events: EventSender) -> Result<Self, EngineError> {
        let runtime = Handle::try_current().map_err(|_| EngineError::NoRuntime)?;
        Ok(Self::with_runtime(tasks, events, runtime))
    }

    pub fn with_runtime(
        tasks: impl Into<Arc<RemoteRegistry>>,
        events: EventSender,
        runtime: Handle,
    ) -> Self {
        Self {
            tasks: tasks.into(),
            events,
            runtime,
            next_id: AtomicU64::new(0),
            lambdas: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    pub fn is_alive(&self, lambda: LambdaId) -> bool {
        self.lambdas.lock().contains_key(&lambda)
    }

    pub fn live_lambdas(&self) -> usize {
        self.lambdas.lock().len()
    }

    /// Reply slots still open inside `lambda`.
    pub fn open_reply_slots(&self, lambda: LambdaId) -> usize {
        self.context(lambda).map_or(0, |ctx| ctx.slots.len())
    }

    fn context(&self, lambda: LambdaId) -> Option<Arc<LambdaContext>> {
        self.lambdas.lock().get(&lambda).cloned()
    }
}

impl HostEngine for InProcessEngine {
    fn next_lambda_id(&self) -> LambdaId {
        LambdaId::new(self.next_id.fetch_add(1, Ordering::SeqCst) + 1)
    }

    fn is_resident(&self, entry: &str) -> Result<bool, EngineError> {
        self.tasks
            .get(entry)
            .map(|task| task.resident())
            .ok_or_else(|| EngineError::UnknownEntry(entry.to_string()))
    }

    fn run_script(
        &self,
        program: &str,
        context: ExecutionContext,
        keep_alive: bool,
    ) -> Result<LambdaId, EngineError> {
        let program =
            RemoteProgram::parse(program).map_err(|e| EngineError::MalformedProgram(e.to_string()))?;
        let task = self
            .tasks
            .get(&program.entry)
            .ok_or_else(|| EngineError::UnknownEntry(program.entry.clone()))?;

        let ctx = Arc::new(LambdaContext::default());
        {
            let mut lambdas = self.lambdas.lock();
            if lambdas.contains_key(&program.lambda) {
                return Err(EngineError::LambdaInUse(program.lambda));
            }
            lambdas.insert(program.lambda, Arc::clone(&ctx));
        }
        let lambda = program.lambda;

        let run = run_lambda(
            program,
            task,
            Arc::clone(&ctx),
            keep_alive,
            self.events.clone(),
            Arc::clone(&self.lambdas),
        );
        let join = match context {
            ExecutionContext::ThreadPool => self.runtime.spawn(run),
            ExecutionContext::Blocking => {
                let runtime = self.runtime.clone();
                self.runtime.spawn_blocking(move || runtime.block_on(run))
            }
        };
        *ctx.abort.lock() = Some(join.abort_handle());

        debug!(%lambda, %context, keep_alive, "lambda started");
        Ok(lambda)
    }

    fn call_script_function(
        &self,
        lambda: LambdaId,
        target: RemoteTarget,
        args: &str,
        callback: CallbackId,
    ) {
        let Some(ctx) = self.context(lambda) else {
            debug!(%lambda, %target, "call into dead lambda dropped");
            return;
        };

        match target {
            RemoteTarget::ReplySlot(slot) => {
                if !ctx.slots.resolve(&slot, Decoded::from_text(args)) {
                    debug!(%lambda, %slot, "reply slot already gone");
                }
            }
            RemoteTarget::Export(name) => {
                let Some(function) = ctx.exports.lock().get(&name).cloned() else {
                    debug!(%lambda, export = %name, "no such export");
                    return;
                };
                let args = Decoded::from_text(args);
                let events = self.events.clone();
                self.runtime.spawn(async move {
                    let reply = function(args).unwrap_or(Value::Null);
                    if callback.is_none() {
                        return;
                    }
                    match payload::encode(&reply) {
                        Ok(message) => {
                            let event = HostEvent::Message {
                                message,
                                lambda,
                                callback,
                            };
                            if events.send(event).is_err() {
                                debug!(%lambda, %callback, "host event channel closed, export reply dropped");
                            }
                        }
                        Err(err) => warn!(%lambda, export = %name, %err, "export reply not encodable"),
                    }
                });
            }
        }
    }

    fn run_script_in_lambda(&self, lambda: LambdaId, statement: RemoteStatement) {
        let Some(ctx) = self.context(lambda) else {
            return;
        };
        match statement {
            RemoteStatement::DeleteReplySlot(slot) => {
                ctx.slots.delete(&slot);
            }
        }
    }

    /// Blocking-context lambdas that are already running cannot be
    /// interrupted; they are only forgotten.
    fn stop_lambda(&self, lambda: LambdaId) {
        let Some(ctx) = self.lambdas.lock().remove(&lambda) else {
            return;
        };
        if let Some(abort) = ctx.abort.lock().take() {
            abort.abort();
        }
        debug!(%lambda, "lambda stopped");
    }
}

async fn run_lambda(
    program: RemoteProgram,
    task: Arc<dyn DynRemoteTask>,
    ctx: Arc<LambdaContext>,
    keep_alive: bool,
    events: EventSender,
    lambdas: LambdaTable,
) {
    let lambda = program.lambda;
    let mut scope = RemoteScope::new(&program, Arc::clone(&ctx.slots), events.clone());

    let result = match task.run_dyn(&mut scope).await {
        Ok(value) => value,
        Err(fault) => {
            warn!(%lambda, entry = %program.entry, %fault, "remote task faulted");
            Value::Null
        }
    };

    let exports = scope.into_exports();
    let payload = CompletionPayload {
        result,
        exports: exports.keys().cloned().collect(),
    };

    // exports は Completion を送る前に見えるようにしておく
    if keep_alive {
        *ctx.exports.lock() = exports;
    } else {
        let mut lambdas = lambdas.lock();
        if lambdas.get(&lambda).is_some_and(|live| Arc::ptr_eq(live, &ctx)) {
            lambdas.remove(&lambda);
        }
    }

    match payload::encode(&payload) {
        Ok(result) => {
            let event = HostEvent::Completion {
                result,
                lambda,
                callback: CallbackId::NONE,
            };
            if events.send(event).is_err() {
                debug!(%lambda, "host event channel closed, completion dropped");
            }
        }
        Err(err) => warn!(%lambda, %err, "completion payload not encodable"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{SlotKey, events};
    use crate::typed::{RemoteFault, RemoteTask};
    use async_trait::async_trait;
    use serde_json::json;

    struct Adder;

    #[async_trait]
    impl RemoteTask for Adder {
        const ENTRY: &'static str = "test.adder.v1";
        const RESIDENT: bool = true;

        async fn run(&self, scope: &mut RemoteScope) -> Result<Value, RemoteFault> {
            scope.export("add", |args| {
                let (a, b) = args.decode_as::<(i64, i64)>()?;
                Some(json!(a + b))
            });
            Ok(Value::Null)
        }
    }

    struct Faulty;

    #[async_trait]
    impl RemoteTask for Faulty {
        const ENTRY: &'static str = "test.faulty.v1";

        async fn run(&self, _scope: &mut RemoteScope) -> Result<Value, RemoteFault> {
            Err(RemoteFault::new("boom"))
        }
    }

    struct Waiter;

    #[async_trait]
    impl RemoteTask for Waiter {
        const ENTRY: &'static str = "test.waiter.v1";

        async fn run(&self, scope: &mut RemoteScope) -> Result<Value, RemoteFault> {
            let reply = scope.call_bridge("ask", &()).await?;
            Ok(reply.map_or(Value::Null, Decoded::into_value))
        }
    }

    fn engine() -> (InProcessEngine, crate::domain::EventReceiver) {
        let tasks = RemoteRegistry::new()
            .with(Adder)
            .unwrap()
            .with(Faulty)
            .unwrap()
            .with(Waiter)
            .unwrap();
        let (tx, rx) = events::channel();
        (InProcessEngine::new(tasks, tx).unwrap(), rx)
    }

    fn program(engine: &InProcessEngine, entry: &str, bridges: &[&str]) -> String {
        RemoteProgram {
            lambda: engine.next_lambda_id(),
            entry: entry.to_string(),
            bridges: bridges.iter().map(|b| b.to_string()).collect(),
            bindings: BTreeMap::new(),
        }
        .to_text()
        .unwrap()
    }

    #[tokio::test]
    async fn resident_lambda_serves_exports_after_completion() {
        let (engine, mut rx) = engine();
        let lambda = engine
            .run_script(&program(&engine, Adder::ENTRY, &[]), ExecutionContext::ThreadPool, true)
            .unwrap();

        assert_eq!(
            rx.recv().await,
            Some(HostEvent::Completion {
                result: r#"{"result":null,"exports":["add"]}"#.into(),
                lambda,
                callback: CallbackId::NONE,
            })
        );
        assert!(engine.is_alive(lambda));

        engine.call_script_function(lambda, RemoteTarget::Export("add".into()), "[2,3]", CallbackId::new(1));
        assert_eq!(
            rx.recv().await,
            Some(HostEvent::Message {
                message: "5".into(),
                lambda,
                callback: CallbackId::new(1),
            })
        );
    }

    #[tokio::test]
    async fn disposable_lambda_is_forgotten_after_completion() {
        let (engine, mut rx) = engine();
        let lambda = engine
            .run_script(&program(&engine, Adder::ENTRY, &[]), ExecutionContext::ThreadPool, false)
            .unwrap();
        rx.recv().await.unwrap();
        assert!(!engine.is_alive(lambda));
    }

    #[tokio::test]
    async fn faulted_task_completes_with_null() {
        let (engine, mut rx) = engine();
        let lambda = engine
            .run_script(&program(&engine, Faulty::ENTRY, &[]), ExecutionContext::Blocking, false)
            .unwrap();
        assert_eq!(
            rx.recv().await,
            Some(HostEvent::Completion {
                result: r#"{"result":null,"exports":[]}"#.into(),
                lambda,
                callback: CallbackId::NONE,
            })
        );
    }

    #[tokio::test]
    async fn bridge_reply_resolves_the_waiting_stub() {
        let (engine, mut rx) = engine();
        let lambda = engine
            .run_script(&program(&engine, Waiter::ENTRY, &["ask"]), ExecutionContext::ThreadPool, false)
            .unwrap();

        let Some(HostEvent::BridgeCall { name, callback, .. }) = rx.recv().await else {
            panic!("expected a bridge call");
        };
        assert_eq!(engine.open_reply_slots(lambda), 1);

        let slot = SlotKey::new(name, callback);
        engine.call_script_function(lambda, RemoteTarget::ReplySlot(slot.clone()), r#""yes""#, CallbackId::NONE);
        engine.run_script_in_lambda(lambda, RemoteStatement::DeleteReplySlot(slot));

        let Some(HostEvent::Completion { result, .. }) = rx.recv().await else {
            panic!("expected completion");
        };
        assert_eq!(result, r#"{"result":"yes","exports":[]}"#);
    }

    #[tokio::test]
    async fn unknown_entry_and_bad_text_are_rejected() {
        let (engine, _rx) = engine();
        assert!(matches!(
            engine.run_script(&program(&engine, "nope.v1", &[]), ExecutionContext::ThreadPool, false),
            Err(EngineError::UnknownEntry(_))
        ));
        assert!(matches!(
            engine.run_script("not a program", ExecutionContext::ThreadPool, false),
            Err(EngineError::MalformedProgram(_))
        ));
    }

    #[tokio::test]
    async fn stop_forgets_the_lambda() {
        let (engine, mut rx) = engine();
        let lambda = engine
            .run_script(&program(&engine, Waiter::ENTRY, &["ask"]), ExecutionContext::ThreadPool, false)
            .unwrap();
        rx.recv().await.unwrap();

        engine.stop_lambda(lambda);
        assert!(!engine.is_alive(lambda));
        // everything after stop is a no-op
        engine.call_script_function(lambda, RemoteTarget::Export("x".into()), "", CallbackId::new(1));
        engine.stop_lambda(lambda);
    }

    #[tokio::test]
    async fn residency_comes_from_the_registered_task() {
        let (engine, _rx) = engine();
        assert!(engine.is_resident(Adder::ENTRY).unwrap());
        assert!(!engine.is_resident(Waiter::ENTRY).unwrap());
        assert!(matches!(
            engine.is_resident("nope.v1"),
            Err(EngineError::UnknownEntry(_))
        ));
    }

    #[tokio::test]
    async fn launching_a_live_lambda_id_twice_is_refused() {
        let (engine, mut rx) = engine();
        let text = program(&engine, Waiter::ENTRY, &["ask"]);
        let lambda = engine
            .run_script(&text, ExecutionContext::ThreadPool, false)
            .unwrap();
        rx.recv().await.unwrap();

        assert!(matches!(
            engine.run_script(&text, ExecutionContext::ThreadPool, false),
            Err(EngineError::LambdaInUse(id)) if id == lambda
        ));
        assert_eq!(engine.live_lambdas(), 1);
    }

    #[tokio::test]
    async fn closed_event_channel_does_not_stall_the_lambda() {
        let (engine, rx) = engine();
        drop(rx);
        let lambda = engine
            .run_script(&program(&engine, Faulty::ENTRY, &[]), ExecutionContext::ThreadPool, false)
            .unwrap();

        for _ in 0..200 {
            if !engine.is_alive(lambda) {
                break;
            }
            tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        }
        assert!(!engine.is_alive(lambda));
    }

    #[test]
    fn new_outside_a_runtime_fails() {
        let (tx, _rx) = events::channel();
        assert!(matches!(
            InProcessEngine::new(RemoteRegistry::new(), tx),
            Err(EngineError::NoRuntime)
        ));
    }
}
