//! Wire records exchanged with the remote execution context.
//!
//! `RemoteProgram` is the text shipped to `run_script`, `CompletionPayload`
//! is the text a finished program hands back. Both are JSON and must stay
//! stable for interoperation.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::errors::CodecError;
use super::ids::{LambdaId, SlotKey};
use super::payload::Decoded;

/// Where the host engine runs a program.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionContext {
    /// The shared async worker pool.
    #[default]
    ThreadPool,
    /// The blocking pool, for entries that hold a thread for long stretches.
    Blocking,
}

impl fmt::Display for ExecutionContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ThreadPool => f.write_str("thread_pool"),
            Self::Blocking => f.write_str("blocking"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown execution context {0:?} (expected thread_pool or blocking)")]
pub struct ParseContextError(String);

impl FromStr for ExecutionContext {
    type Err = ParseContextError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().replace('-', "_").as_str() {
            "thread_pool" | "threadpool" => Ok(Self::ThreadPool),
            "blocking" => Ok(Self::Blocking),
            _ => Err(ParseContextError(s.to_string())),
        }
    }
}

/// The program a remote context executes.
///
/// Layers, in order of evaluation on the remote side:
/// 1. a fresh `exports` scope,
/// 2. one stub per name in `bridges`,
/// 3. one binding per entry in `bindings` (literal JSON text, decoded remotely),
/// 4. the `entry` invocation, whose result and export names form the
///    [`CompletionPayload`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemoteProgram {
    pub lambda: LambdaId,
    pub entry: String,
    #[serde(default)]
    pub bridges: Vec<String>,
    #[serde(default)]
    pub bindings: BTreeMap<String, String>,
}

impl RemoteProgram {
    pub fn to_text(&self) -> Result<String, CodecError> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn parse(text: &str) -> Result<Self, CodecError> {
        Ok(serde_json::from_str(text)?)
    }

    pub fn declares_bridge(&self, name: &str) -> bool {
        self.bridges.iter().any(|b| b == name)
    }
}

/// What a finished program reports back: `{"result": .., "exports": [..]}`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CompletionPayload {
    #[serde(default)]
    pub result: Value,
    #[serde(default)]
    pub exports: Vec<String>,
}

impl CompletionPayload {
    /// Interpret decoded completion text.
    ///
    /// A value that is not a `{result, exports}` record is taken as the bare
    /// result with no exports.
    pub fn from_decoded(decoded: Decoded) -> Self {
        match decoded {
            Decoded::Value(Value::Object(map))
                if map.contains_key("result") || map.contains_key("exports") =>
            {
                let value = Value::Object(map);
                serde_json::from_value(value.clone()).unwrap_or(Self {
                    result: value,
                    exports: Vec::new(),
                })
            }
            other => Self {
                result: other.into_value(),
                exports: Vec::new(),
            },
        }
    }
}

/// Remote-side callee of `call_script_function`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum RemoteTarget {
    /// `exports.<name>`
    Export(String),
    /// `_callbacks['<bridge>-<cb>']`
    ReplySlot(SlotKey),
}

impl fmt::Display for RemoteTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Export(name) => write!(f, "exports.{name}"),
            Self::ReplySlot(key) => write!(f, "_callbacks['{key}']"),
        }
    }
}

/// Statement run inside a lambda via `run_script_in_lambda`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum RemoteStatement {
    /// Drop a reply slot if it is still present.
    DeleteReplySlot(SlotKey),
}

impl fmt::Display for RemoteStatement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DeleteReplySlot(key) => write!(f, "delete _callbacks['{key}']"),
        }
    }
}
