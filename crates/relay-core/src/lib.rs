//! relay-core
//!
//! Caller-side bridge for running tasks in isolated execution contexts.
//!
//! # モジュール構成
//! - **domain**: ドメインモデル（ids, payload, program, capture, state, events, errors）
//! - **ports**: 抽象化レイヤー（HostEngine, Clock）
//! - **app**: caller 側のロジック（builder, registry, handler, bridge, composer, dispatcher）
//! - **typed**: リモートで実行される型付きタスク（RemoteTask, RemoteScope, RemoteRegistry）
//! - **impls**: 実装（InProcessEngine）
//! - **config**: TOML 設定

pub mod app;
pub mod config;
pub mod domain;
pub mod impls;
pub mod ports;
pub mod typed;

pub use app::{Relay, RelayBuilder, TaskHandle};
pub use config::RelayConfig;
pub use domain::{Decoded, ExecutionContext, RelayError, TaskDescriptor};
pub use impls::InProcessEngine;
pub use typed::{RemoteFault, RemoteRegistry, RemoteScope, RemoteTask};
