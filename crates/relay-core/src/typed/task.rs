//! RemoteTask trait - 静的に定義されたリモートのエントリポイント
//!
//! Instead of shipping executable text, the caller names one of these and the
//! remote side looks it up in a [`RemoteRegistry`](super::RemoteRegistry).
//!
//! # 二層構造
//! - **表層（Typed）**: `RemoteTask` - associated const でエントリ名と常駐フラグを宣言
//! - **内部（Dyn）**: `DynRemoteTask` - object-safe, type erasure


use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

use super::scope::RemoteScope;

/// A failure inside a remote task body. The relay does not catch these; the
/// engine decides what a faulted lambda reports.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("remote fault: {0}")]
pub struct RemoteFault(String);

impl RemoteFault {
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }

    pub fn message(&self) -> &str {
        &self.0
    }
}

/// # 使用例
/// ```ignore
/// struct Adder;
///
/// #[async_trait]
/// impl RemoteTask for Adder {
///     const ENTRY: &'static str = "math.adder.v1";
///     const RESIDENT: bool = true;
///
///     async fn run(&self, scope: &mut RemoteScope) -> Result<Value, RemoteFault> {
///         scope.export("add", |args| {
///             let (a, b) = args.decode_as::<(i64, i64)>()?;
///             Some(json!(a + b))
///         });
///         Ok(Value::Null)
///     }
/// }
/// ```
///
/// # 命名規約
/// - `{domain}.{action}.v{major}`
#[async_trait]
pub trait RemoteTask: Send + Sync + 'static {
    const ENTRY: &'static str;

    /// Whether the lambda stays addressable after its first completion.
    const RESIDENT: bool = false;

    async fn run(&self, scope: &mut RemoteScope) -> Result<Value, RemoteFault>;
}

/// Object-safe view of a [`RemoteTask`].
#[async_trait]
pub trait DynRemoteTask: Send + Sync {
    fn entry(&self) -> &str;
    fn resident(&self) -> bool;
    async fn run_dyn(&self, scope: &mut RemoteScope) -> Result<Value, RemoteFault>;
}

pub struct TypedRemoteTask<T: RemoteTask> {
    task: T,
}

impl<T: RemoteTask> TypedRemoteTask<T> {
    pub fn new(task: T) -> Self {
        Self { task }
    }
}

#[async_trait]
impl<T: RemoteTask> DynRemoteTask for TypedRemoteTask<T> {
    fn entry(&self) -> &str {
        T::ENTRY
    }

    fn resident(&self) -> bool {
        T::RESIDENT
    }

    async fn run_dyn(&self, scope: &mut RemoteScope) -> Result<Value, RemoteFault> {
        self.task.run(scope).await
    }
}
