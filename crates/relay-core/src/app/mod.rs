//! App - caller 側のアプリケーション層
//!
//! # 主要コンポーネント
//! - **Relay / RelayBuilder**: タスクの起動とワイヤリング
//! - **TaskRegistry**: LambdaId → TaskHandler
//! - **TaskHandler / TaskHandle**: 1 タスク分の状態と公開 API
//! - **BridgeFunction**: リモートから呼ばれる caller 側の関数
//! - **ScriptComposer**: リモートに送るプログラムの組み立て
//! - **Dispatcher / DispatchLoop**: ホストイベントのルーティング

pub mod bridge;
pub mod builder;
pub mod composer;
pub mod dispatch_loop;
pub mod dispatcher;
pub mod handler;
pub mod registry;
pub mod status;

#[cfg(test)]
pub(crate) mod testing;

pub use self::bridge::BridgeFunction;
pub use self::builder::{Relay, RelayBuilder};
pub use self::composer::{ComposedTask, ScriptComposer};
pub use self::dispatch_loop::DispatchLoop;
pub use self::dispatcher::Dispatcher;
pub use self::handler::{CompletionCallback, ExportShim, ReplyCallback, TaskHandle, TaskHandler};
pub use self::registry::TaskRegistry;
pub use self::status::{RegistryStatus, TaskStatus};
