//! Impls - ports の実装
//!
//! # 含まれる実装
//! - **InProcessEngine**: tokio ランタイム上で動く HostEngine

pub mod inprocess;

pub use self::inprocess::InProcessEngine;
