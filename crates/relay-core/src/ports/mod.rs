//! Ports - 抽象化レイヤー
//!
//! 外部の協調者（ホストエンジン、時計）へのインターフェース。
//! 実装は `impls` かテスト内のダブルが提供します。

pub mod clock;
pub mod engine;

pub use self::clock::{Clock, FixedClock, SystemClock};
pub use self::engine::HostEngine;
