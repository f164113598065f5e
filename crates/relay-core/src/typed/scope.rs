//! RemoteScope - リモート側から見たタスクの環境
//!
//! A scope carries the decoded bindings, the bridge stubs, the reply-slot
//! table and the exports a task declares while it runs.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use parking_lot::Mutex;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tokio::sync::oneshot;
use tracing::trace;

use super::task::RemoteFault;
use crate::domain::payload;
use crate::domain::{CallbackId, Decoded, EventSender, HostEvent, LambdaId, RemoteProgram, SlotKey};

/// An exported remote function. Returning `None` replies with null.
pub type ExportFn = Arc<dyn Fn(Decoded) -> Option<Value> + Send + Sync>;

struct SlotTable {
    last: CallbackId,
    slots: HashMap<SlotKey, oneshot::Sender<Decoded>>,
}

/// Per-lambda table of bridge reply slots, keyed `"<bridge>-<cb>"`.
///
/// Setting a value resolves the waiting stub; deleting a slot that was never
/// set resolves it with no value.
pub struct ReplySlots {
    table: Mutex<SlotTable>,
}

impl Default for ReplySlots {
    fn default() -> Self {
        Self {
            table: Mutex::new(SlotTable {
                last: CallbackId::NONE,
                slots: HashMap::new(),
            }),
        }
    }
}

impl ReplySlots {
    pub fn new() -> Self {
        Self::default()
    }

    fn open(&self, bridge: &str) -> (SlotKey, oneshot::Receiver<Decoded>) {
        let (tx, rx) = oneshot::channel();
        let mut table = self.table.lock();
        let callback = table.last.next();
        table.last = callback;
        let key = SlotKey::new(bridge, callback);
        table.slots.insert(key.clone(), tx);
        (key, rx)
    }

    /// Hand `value` to the stub waiting on `key`.
    pub fn resolve(&self, key: &SlotKey, value: Decoded) -> bool {
        let Some(tx) = self.table.lock().slots.remove(key) else {
            return false;
        };
        tx.send(value).is_ok()
    }

    /// Drop a slot if it is still present.
    pub fn delete(&self, key: &SlotKey) -> bool {
        self.table.lock().slots.remove(key).is_some()
    }

    pub fn contains(&self, key: &SlotKey) -> bool {
        self.table.lock().slots.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.table.lock().slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.table.lock().slots.is_empty()
    }
}

/// A bridge invocation whose reply has not arrived yet.
#[derive(Debug)]
pub struct PendingReply {
    slot: SlotKey,
    rx: oneshot::Receiver<Decoded>,
}

impl PendingReply {
    pub fn slot(&self) -> &SlotKey {
        &self.slot
    }

    /// The bridge's value, or `None` once the slot is deleted without one.
    pub async fn wait(self) -> Option<Decoded> {
        self.rx.await.ok()
    }
}

pub struct RemoteScope {
    lambda: LambdaId,
    bindings: BTreeMap<String, Decoded>,
    bridges: Vec<String>,
    slots: Arc<ReplySlots>,
    events: EventSender,
    exports: BTreeMap<String, ExportFn>,
}

impl RemoteScope {
    pub fn new(program: &RemoteProgram, slots: Arc<ReplySlots>, events: EventSender) -> Self {
        let bindings = program
            .bindings
            .iter()
            .map(|(name, text)| (name.clone(), Decoded::from_text(text)))
            .collect();
        Self {
            lambda: program.lambda,
            bindings,
            bridges: program.bridges.clone(),
            slots,
            events,
            exports: BTreeMap::new(),
        }
    }

    pub fn lambda_id(&self) -> LambdaId {
        self.lambda
    }

    pub fn binding(&self, name: &str) -> Option<&Decoded> {
        self.bindings.get(name)
    }

    pub fn binding_as<T: DeserializeOwned>(&self, name: &str) -> Option<T> {
        self.bindings.get(name)?.decode_as()
    }

    pub fn has_bridge(&self, name: &str) -> bool {
        self.bridges.iter().any(|b| b == name)
    }

    /// Fire a bridge stub without waiting for its reply.
    pub fn invoke_bridge<A: Serialize + ?Sized>(
        &self,
        name: &str,
        args: &A,
    ) -> Result<PendingReply, RemoteFault> {
        if !self.has_bridge(name) {
            return Err(RemoteFault::new(format!("{name} is not a bridge of this task")));
        }
        let args = payload::encode(args).map_err(|e| RemoteFault::new(e.to_string()))?;

        let (slot, rx) = self.slots.open(name);
        trace!(lambda = %self.lambda, %slot, "bridge stub invoked");
        let event = HostEvent::BridgeCall {
            name: name.to_string(),
            args,
            lambda: self.lambda,
            callback: slot.callback(),
        };
        if self.events.send(event).is_err() {
            self.slots.delete(&slot);
            return Err(RemoteFault::new("host event channel closed"));
        }
        Ok(PendingReply { slot, rx })
    }

    /// Invoke a bridge and wait for its value (`None` for void bridges).
    pub async fn call_bridge<A: Serialize + ?Sized>(
        &self,
        name: &str,
        args: &A,
    ) -> Result<Option<Decoded>, RemoteFault> {
        Ok(self.invoke_bridge(name, args)?.wait().await)
    }

    /// Declare an exported function, reachable through `call()` once the task
    /// completes (resident tasks only).
    pub fn export<F>(&mut self, name: impl Into<String>, function: F)
    where
        F: Fn(Decoded) -> Option<Value> + Send + Sync + 'static,
    {
        self.exports.insert(name.into(), Arc::new(function));
    }

    pub fn export_names(&self) -> Vec<String> {
        self.exports.keys().cloned().collect()
    }

    pub(crate) fn into_exports(self) -> BTreeMap<String, ExportFn> {
        self.exports
    }
}
