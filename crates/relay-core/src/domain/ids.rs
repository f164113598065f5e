//! Identifiers that correlate traffic across the context boundary.
//!
//! `LambdaId` と `CallbackId` は同じ phantom-typed ラッパーを共有します。
//! 中身はどちらも `u64` ですが、型が違うので取り違えはコンパイルエラーになります。

use serde::{Deserialize, Serialize};
use std::fmt;
use std::marker::PhantomData;
use std::str::FromStr;

/// IdMarker は各 ID 型のマーカー trait
pub trait IdMarker: Send + Sync + 'static {
    /// Display で使うプレフィックス（例: "lambda-"）
    fn prefix() -> &'static str;
}

/// ジェネリック ID 型
///
/// `T` は実行時にはメモリを消費しないマーカーです。
#[repr(transparent)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Id<T: IdMarker> {
    value: u64,
    #[serde(skip)]
    _marker: PhantomData<T>,
}

impl<T: IdMarker> Id<T> {
    pub const fn new(value: u64) -> Self {
        Self {
            value,
            _marker: PhantomData,
        }
    }

    pub const fn value(&self) -> u64 {
        self.value
    }
}

impl<T: IdMarker> From<u64> for Id<T> {
    fn from(value: u64) -> Self {
        Self::new(value)
    }
}

impl<T: IdMarker> fmt::Display for Id<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", T::prefix(), self.value)
    }
}

// ========================================
// マーカー型の定義
// ========================================

/// Lambda のマーカー型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Lambda {}

impl IdMarker for Lambda {
    fn prefix() -> &'static str {
        "lambda-"
    }
}

/// Callback のマーカー型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Callback {}

impl IdMarker for Callback {
    fn prefix() -> &'static str {
        "cb-"
    }
}

/// Identifier the host engine assigns to a launched lambda.
pub type LambdaId = Id<Lambda>;

/// Per-handler correlation token for one expected reply.
pub type CallbackId = Id<Callback>;

impl Id<Callback> {
    /// Sentinel meaning "no reply expected".
    pub const NONE: Self = Self::new(0);

    pub const fn is_none(&self) -> bool {
        self.value == 0
    }

    /// The id that follows this one. Counters start at `NONE` and call this
    /// before every use, so the first allocated id is 1.
    pub const fn next(&self) -> Self {
        Self::new(self.value + 1)
    }
}

/// Key of one remote reply slot: `"<bridge>-<callbackId>"`.
///
/// Two invocations of the same bridge never share a key because the callback
/// id is fresh for every invocation.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SlotKey {
    bridge: String,
    callback: CallbackId,
}

impl SlotKey {
    pub fn new(bridge: impl Into<String>, callback: CallbackId) -> Self {
        Self {
            bridge: bridge.into(),
            callback,
        }
    }

    pub fn bridge(&self) -> &str {
        &self.bridge
    }

    pub fn callback(&self) -> CallbackId {
        self.callback
    }
}

impl fmt::Display for SlotKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.bridge, self.callback.value())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("malformed reply slot key: {0:?}")]
pub struct SlotKeyError(String);

impl FromStr for SlotKey {
    type Err = SlotKeyError;

    // bridge 名に '-' が含まれても良いように、最後の '-' で分割する
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (bridge, callback) = s
            .rsplit_once('-')
            .ok_or_else(|| SlotKeyError(s.to_string()))?;
        if bridge.is_empty() {
            return Err(SlotKeyError(s.to_string()));
        }
        let callback = callback
            .parse::<u64>()
            .map_err(|_| SlotKeyError(s.to_string()))?;
        Ok(Self::new(bridge, CallbackId::new(callback)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_display_with_prefix() {
        assert_eq!(LambdaId::new(7).to_string(), "lambda-7");
        assert_eq!(CallbackId::new(3).to_string(), "cb-3");
    }

    #[test]
    fn callback_counter_starts_after_sentinel() {
        let first = CallbackId::NONE.next();
        assert!(CallbackId::NONE.is_none());
        assert!(!first.is_none());
        assert_eq!(first.value(), 1);
        assert!(first < first.next());
    }

    #[test]
    fn ids_serialize_as_plain_numbers() {
        let id = LambdaId::new(42);
        assert_eq!(serde_json::to_string(&id).unwrap(), "42");
        let back: LambdaId = serde_json::from_str("42").unwrap();
        assert_eq!(back, id);
    }

    #[test]
    fn slot_key_renders_name_dash_callback() {
        let key = SlotKey::new("onLog", CallbackId::new(3));
        assert_eq!(key.to_string(), "onLog-3");
    }

    #[test]
    fn slot_key_parses_names_containing_dashes() {
        let key: SlotKey = "on-log-12".parse().unwrap();
        assert_eq!(key.bridge(), "on-log");
        assert_eq!(key.callback(), CallbackId::new(12));
    }

    #[test]
    fn slot_key_rejects_garbage() {
        assert!("nodash".parse::<SlotKey>().is_err());
        assert!("-4".parse::<SlotKey>().is_err());
        assert!("name-x".parse::<SlotKey>().is_err());
    }

    #[test]
    fn phantom_data_does_not_consume_memory() {
        use std::mem::size_of;
        assert_eq!(size_of::<LambdaId>(), size_of::<u64>());
        assert_eq!(size_of::<CallbackId>(), size_of::<u64>());
    }
}
