//! TaskHandler - 1 タスク分の caller 側の状態
//!
//! A handler owns everything the dispatcher needs to route traffic for one
//! lambda: its bridges, the callbacks waiting for `call()` replies, the
//! completion callback and, once a pinned task completes, its export names.
//! The registry owns handlers; callers hold a [`TaskHandle`].

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::Serialize;
use serde_json::Value;
use tracing::debug;

use super::bridge::BridgeFunction;
use super::registry::TaskRegistry;
use super::status::TaskStatus;
use crate::domain::payload;
use crate::domain::{CallbackId, CodecError, LambdaId, LambdaState, RemoteTarget};
use crate::ports::{Clock, HostEngine};

/// Receives the raw reply text of one `call()`. Runs at most once.
pub type ReplyCallback = Box<dyn FnOnce(String) + Send>;

/// Receives the `result` field of every completion delivery.
pub type CompletionCallback = Arc<dyn Fn(Value, TaskHandle) + Send + Sync>;

struct HandlerInner {
    lambda_id: LambdaId,
    state: LambdaState,
    last_callback: CallbackId,
    pending: BTreeMap<CallbackId, ReplyCallback>,
    exports: Vec<String>,
    launched_at: Option<DateTime<Utc>>,
    completed_at: Option<DateTime<Utc>>,
}

pub struct TaskHandler {
    entry: String,
    pinned: bool,
    bridges: BTreeMap<String, BridgeFunction>,
    on_complete: Option<CompletionCallback>,
    engine: Arc<dyn HostEngine>,
    clock: Arc<dyn Clock>,
    inner: Mutex<HandlerInner>,
}

impl TaskHandler {
    pub(crate) fn new(
        lambda_id: LambdaId,
        entry: impl Into<String>,
        pinned: bool,
        bridges: BTreeMap<String, BridgeFunction>,
        on_complete: Option<CompletionCallback>,
        engine: Arc<dyn HostEngine>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            entry: entry.into(),
            pinned,
            bridges,
            on_complete,
            engine,
            clock,
            inner: Mutex::new(HandlerInner {
                lambda_id,
                state: LambdaState::Created,
                last_callback: CallbackId::NONE,
                pending: BTreeMap::new(),
                exports: Vec::new(),
                launched_at: None,
                completed_at: None,
            }),
        }
    }

    pub fn lambda_id(&self) -> LambdaId {
        self.inner.lock().lambda_id
    }

    pub fn entry(&self) -> &str {
        &self.entry
    }

    pub fn is_pinned(&self) -> bool {
        self.pinned
    }

    pub fn state(&self) -> LambdaState {
        self.inner.lock().state
    }

    pub fn exports(&self) -> Vec<String> {
        self.inner.lock().exports.clone()
    }

    pub fn pending_callbacks(&self) -> usize {
        self.inner.lock().pending.len()
    }

    pub fn bridge_names(&self) -> Vec<String> {
        self.bridges.keys().cloned().collect()
    }

    /// Created → Running, under the id the engine actually assigned.
    pub(crate) fn mark_running(&self, lambda: LambdaId) {
        let mut inner = self.inner.lock();
        inner.lambda_id = lambda;
        if inner.state == LambdaState::Created {
            inner.state = LambdaState::Running;
            inner.launched_at = Some(self.clock.now());
        }
    }

    /// Ask the remote context to run `exports.<function>(args)`.
    ///
    /// With a callback a fresh [`CallbackId`] is allocated and the reply is
    /// routed to it exactly once. Without one, `CallbackId::NONE` is sent and
    /// no reply is expected. Returns the id that was sent.
    pub fn call<A: Serialize + ?Sized>(
        &self,
        function: &str,
        args: &A,
        callback: Option<ReplyCallback>,
    ) -> Result<CallbackId, CodecError> {
        let args = payload::encode(args)?;

        let (lambda, callback_id) = {
            let mut inner = self.inner.lock();
            if inner.state == LambdaState::Stopped {
                debug!(lambda = %inner.lambda_id, function, "call on stopped lambda dropped");
                return Ok(CallbackId::NONE);
            }
            let callback_id = match callback {
                Some(callback) => {
                    let id = inner.last_callback.next();
                    inner.last_callback = id;
                    inner.pending.insert(id, callback);
                    id
                }
                None => CallbackId::NONE,
            };
            (inner.lambda_id, callback_id)
        };

        debug!(%lambda, function, callback = %callback_id, "call");
        self.engine.call_script_function(
            lambda,
            RemoteTarget::Export(function.to_string()),
            &args,
            callback_id,
        );
        Ok(callback_id)
    }

    /// Remove and return the callback waiting on `callback`.
    pub(crate) fn take_pending(&self, callback: CallbackId) -> Option<ReplyCallback> {
        self.inner.lock().pending.remove(&callback)
    }

    pub(crate) fn bridge(&self, name: &str) -> Option<&BridgeFunction> {
        self.bridges.get(name)
    }

    pub(crate) fn engine(&self) -> &dyn HostEngine {
        self.engine.as_ref()
    }

    /// Apply a completion delivery and hand back the completion callback.
    ///
    /// The first delivery moves the handler out of Running. Pinned handlers
    /// take the export list of every delivery.
    pub(crate) fn complete(&self, exports: Vec<String>) -> Option<CompletionCallback> {
        let mut inner = self.inner.lock();
        match inner.state {
            LambdaState::Stopped => return None,
            LambdaState::Created | LambdaState::Running => {
                inner.state = LambdaState::completed(self.pinned);
                inner.completed_at = Some(self.clock.now());
            }
            LambdaState::CompletedDisposable | LambdaState::CompletedPinned => {}
        }
        if self.pinned {
            inner.exports = exports;
        } else if !exports.is_empty() {
            debug!(lambda = %inner.lambda_id, ?exports, "exports of a disposable lambda ignored");
        }
        self.on_complete.clone()
    }

    /// Terminate the remote context and abandon pending callbacks.
    /// Returns `false` if the handler was already stopped.
    pub(crate) fn halt(&self) -> bool {
        let (lambda, abandoned) = {
            let mut inner = self.inner.lock();
            if inner.state == LambdaState::Stopped {
                return false;
            }
            inner.state = LambdaState::Stopped;
            (inner.lambda_id, std::mem::take(&mut inner.pending))
        };
        debug!(%lambda, abandoned = abandoned.len(), "stopping lambda");
        self.engine.stop_lambda(lambda);
        true
    }

    pub fn status(&self) -> TaskStatus {
        let inner = self.inner.lock();
        TaskStatus {
            lambda_id: inner.lambda_id,
            entry: self.entry.clone(),
            state: inner.state,
            pinned: self.pinned,
            bridges: self.bridges.keys().cloned().collect(),
            exports: inner.exports.clone(),
            pending_callbacks: inner.pending.len(),
            launched_at: inner.launched_at,
            completed_at: inner.completed_at,
        }
    }
}

impl fmt::Debug for TaskHandler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.inner.lock();
        f.debug_struct("TaskHandler")
            .field("lambda_id", &inner.lambda_id)
            .field("entry", &self.entry)
            .field("state", &inner.state)
            .field("pinned", &self.pinned)
            .field("pending", &inner.pending.len())
            .finish()
    }
}

/// Caller-side reference to a launched task.
#[derive(Clone)]
pub struct TaskHandle {
    handler: Arc<TaskHandler>,
    registry: Arc<TaskRegistry>,
}

impl TaskHandle {
    pub(crate) fn new(handler: Arc<TaskHandler>, registry: Arc<TaskRegistry>) -> Self {
        Self { handler, registry }
    }

    pub fn lambda_id(&self) -> LambdaId {
        self.handler.lambda_id()
    }

    pub fn state(&self) -> LambdaState {
        self.handler.state()
    }

    pub fn is_pinned(&self) -> bool {
        self.handler.is_pinned()
    }

    pub fn exports(&self) -> Vec<String> {
        self.handler.exports()
    }

    pub fn pending_callbacks(&self) -> usize {
        self.handler.pending_callbacks()
    }

    pub fn status(&self) -> TaskStatus {
        self.handler.status()
    }

    pub fn call<A: Serialize + ?Sized>(
        &self,
        function: &str,
        args: &A,
        callback: Option<ReplyCallback>,
    ) -> Result<CallbackId, CodecError> {
        self.handler.call(function, args, callback)
    }

    pub fn call_with<A, F>(&self, function: &str, args: &A, callback: F) -> Result<CallbackId, CodecError>
    where
        A: Serialize + ?Sized,
        F: FnOnce(String) + Send + 'static,
    {
        self.handler.call(function, args, Some(Box::new(callback)))
    }

    /// Shim for an exported function, present once a pinned task completed.
    pub fn export(&self, name: &str) -> Option<ExportShim> {
        self.handler
            .exports()
            .iter()
            .any(|e| e == name)
            .then(|| ExportShim {
                handler: Arc::clone(&self.handler),
                name: name.to_string(),
            })
    }

    /// Terminate the remote context and deregister. Pending callbacks are
    /// dropped without being called. A second `stop()` returns `false`.
    pub fn stop(&self) -> bool {
        if !self.handler.halt() {
            return false;
        }
        self.registry.remove_handler(&self.handler);
        true
    }
}

impl fmt::Debug for TaskHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("TaskHandle").field(&self.handler).finish()
    }
}

/// Forwards to [`TaskHandler::call`] for one exported name.
#[derive(Clone)]
pub struct ExportShim {
    handler: Arc<TaskHandler>,
    name: String,
}

impl ExportShim {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn invoke<A: Serialize + ?Sized>(
        &self,
        args: &A,
        callback: Option<ReplyCallback>,
    ) -> Result<CallbackId, CodecError> {
        self.handler.call(&self.name, args, callback)
    }
}
