//! Captures and task descriptors.
//!
//! A task is described by the name of a statically registered remote entry
//! point, an explicit residency flag, and a capture: named values that become
//! remote bindings plus named caller-side functions that become bridges.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use serde::Serialize;
use serde_json::Value;

use super::errors::CodecError;
use super::payload::Decoded;
use crate::typed::RemoteTask;

/// Caller-side bridge implementation. Returning `Some` echoes a value back to
/// the remote reply slot; `None` means the bridge is fire-and-forget.
pub type BridgeFn = Arc<dyn Fn(Decoded) -> Option<Value> + Send + Sync>;

pub enum CaptureValue {
    Value(Value),
    Bridge(BridgeFn),
}

impl fmt::Debug for CaptureValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Value(value) => f.debug_tuple("Value").field(value).finish(),
            Self::Bridge(_) => f.write_str("Bridge(..)"),
        }
    }
}

/// Named captured entries, iterated in name order so composed programs are
/// deterministic.
#[derive(Debug, Default)]
pub struct Capture {
    entries: BTreeMap<String, CaptureValue>,
}

impl Capture {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_value(&mut self, name: impl Into<String>, value: Value) {
        self.entries.insert(name.into(), CaptureValue::Value(value));
    }

    pub fn insert_bridge(&mut self, name: impl Into<String>, function: BridgeFn) {
        self.entries.insert(name.into(), CaptureValue::Bridge(function));
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &CaptureValue)> {
        self.entries.iter().map(|(name, value)| (name.as_str(), value))
    }

    pub fn has_bridges(&self) -> bool {
        self.entries
            .values()
            .any(|v| matches!(v, CaptureValue::Bridge(_)))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Everything needed to launch one remote task.
///
/// # 使用例
/// ```ignore
/// let descriptor = TaskDescriptor::for_task::<GreetTask>()
///     .bind("greeting", &"hi")?
///     .bridge("onLog", |msg| { println!("{msg:?}"); None });
/// ```
#[derive(Debug)]
pub struct TaskDescriptor {
    entry: String,
    capture: Capture,
}

impl TaskDescriptor {
    /// Describe a task by entry name. Whether it stays resident is decided
    /// by the task definition the engine holds for `entry`.
    pub fn new(entry: impl Into<String>) -> Self {
        Self {
            entry: entry.into(),
            capture: Capture::new(),
        }
    }

    pub fn for_task<T: RemoteTask>() -> Self {
        Self::new(T::ENTRY)
    }

    /// Capture a serializable value as a remote binding.
    pub fn bind<V: Serialize + ?Sized>(
        mut self,
        name: impl Into<String>,
        value: &V,
    ) -> Result<Self, CodecError> {
        let value = serde_json::to_value(value)?;
        self.capture.insert_value(name, value);
        Ok(self)
    }

    /// Capture a caller-side function as a bridge.
    pub fn bridge<F>(mut self, name: impl Into<String>, function: F) -> Self
    where
        F: Fn(Decoded) -> Option<Value> + Send + Sync + 'static,
    {
        self.capture.insert_bridge(name, Arc::new(function));
        self
    }

    pub fn entry(&self) -> &str {
        &self.entry
    }

    pub fn capture(&self) -> &Capture {
        &self.capture
    }
}
