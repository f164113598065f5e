//! Test doubles shared by the unit tests of `app`.

use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;
use serde_json::Value;

use super::bridge::BridgeFunction;
use super::handler::{TaskHandle, TaskHandler};
use crate::domain::{
    CallbackId, Decoded, EngineError, ExecutionContext, LambdaId, RemoteStatement, RemoteTarget,
};
use crate::ports::{HostEngine, SystemClock};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineCall {
    Run {
        program: String,
        context: ExecutionContext,
        keep_alive: bool,
    },
    Call {
        lambda: LambdaId,
        target: RemoteTarget,
        args: String,
        callback: CallbackId,
    },
    Statement {
        lambda: LambdaId,
        statement: RemoteStatement,
    },
    Stop(LambdaId),
}

type RunHook = Box<dyn Fn(LambdaId) + Send + Sync>;

/// HostEngine that records every request and never runs anything.
#[derive(Default)]
pub struct RecordingEngine {
    next: AtomicU64,
    calls: Mutex<Vec<EngineCall>>,
    resident: Mutex<HashSet<String>>,
    /// When set, `run_script` returns this id instead of the reserved one.
    reassign: Mutex<Option<LambdaId>>,
    refuse: Mutex<bool>,
    /// Runs inside `run_script`, before it returns.
    on_run: Mutex<Option<RunHook>>,
}

impl RecordingEngine {
    pub fn shared() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn calls(&self) -> Vec<EngineCall> {
        self.calls.lock().clone()
    }

    pub fn clear(&self) {
        self.calls.lock().clear();
    }

    pub fn reassign_next(&self, lambda: LambdaId) {
        *self.reassign.lock() = Some(lambda);
    }

    pub fn refuse_launches(&self) {
        *self.refuse.lock() = true;
    }

    /// Declare `entry` as a resident task definition.
    pub fn mark_resident(&self, entry: &str) {
        self.resident.lock().insert(entry.to_string());
    }

    pub fn on_run<F>(&self, hook: F)
    where
        F: Fn(LambdaId) + Send + Sync + 'static,
    {
        *self.on_run.lock() = Some(Box::new(hook));
    }
}

impl HostEngine for RecordingEngine {
    fn next_lambda_id(&self) -> LambdaId {
        LambdaId::new(self.next.fetch_add(1, Ordering::SeqCst) + 1)
    }

    fn is_resident(&self, entry: &str) -> Result<bool, EngineError> {
        Ok(self.resident.lock().contains(entry))
    }

    fn run_script(
        &self,
        program: &str,
        context: ExecutionContext,
        keep_alive: bool,
    ) -> Result<LambdaId, EngineError> {
        if *self.refuse.lock() {
            return Err(EngineError::Other("refused".into()));
        }
        let parsed = crate::domain::RemoteProgram::parse(program)
            .map_err(|e| EngineError::MalformedProgram(e.to_string()))?;
        self.calls.lock().push(EngineCall::Run {
            program: program.to_string(),
            context,
            keep_alive,
        });
        let lambda = self.reassign.lock().take().unwrap_or(parsed.lambda);
        if let Some(hook) = self.on_run.lock().as_ref() {
            hook(lambda);
        }
        Ok(lambda)
    }

    fn call_script_function(
        &self,
        lambda: LambdaId,
        target: RemoteTarget,
        args: &str,
        callback: CallbackId,
    ) {
        self.calls.lock().push(EngineCall::Call {
            lambda,
            target,
            args: args.to_string(),
            callback,
        });
    }

    fn run_script_in_lambda(&self, lambda: LambdaId, statement: RemoteStatement) {
        self.calls
            .lock()
            .push(EngineCall::Statement { lambda, statement });
    }

    fn stop_lambda(&self, lambda: LambdaId) {
        self.calls.lock().push(EngineCall::Stop(lambda));
    }
}

fn build(
    engine: &Arc<RecordingEngine>,
    lambda: LambdaId,
    pinned: bool,
    bridges: BTreeMap<String, BridgeFunction>,
    on_complete: Option<super::handler::CompletionCallback>,
) -> Arc<TaskHandler> {
    let engine: Arc<dyn HostEngine> = engine.clone();
    let handler = TaskHandler::new(
        lambda,
        "test.task.v1",
        pinned,
        bridges,
        on_complete,
        engine,
        Arc::new(SystemClock),
    );
    handler.mark_running(lambda);
    Arc::new(handler)
}

/// A running handler with no bridges and no completion callback.
pub fn handler_for(engine: &Arc<RecordingEngine>, lambda: LambdaId, pinned: bool) -> Arc<TaskHandler> {
    build(engine, lambda, pinned, BTreeMap::new(), None)
}

pub fn handler_with<F>(
    engine: &Arc<RecordingEngine>,
    lambda: LambdaId,
    pinned: bool,
    on_complete: F,
) -> Arc<TaskHandler>
where
    F: Fn(Value, TaskHandle) + Send + Sync + 'static,
{
    build(engine, lambda, pinned, BTreeMap::new(), Some(Arc::new(on_complete)))
}

pub fn handler_with_bridge<F>(
    engine: &Arc<RecordingEngine>,
    lambda: LambdaId,
    name: &str,
    bridge: F,
) -> Arc<TaskHandler>
where
    F: Fn(Decoded) -> Option<Value> + Send + Sync + 'static,
{
    let mut bridges = BTreeMap::new();
    bridges.insert(name.to_string(), BridgeFunction::new(name, Arc::new(bridge)));
    build(engine, lambda, false, bridges, None)
}
