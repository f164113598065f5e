//! Host events - engine から caller 側への配送
//!
//! The host engine never calls into the caller directly; it posts one of
//! these onto a channel drained by a single dispatch loop.

use tokio::sync::mpsc;

use super::ids::{CallbackId, LambdaId};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HostEvent {
    /// A program finished; `result` is completion payload text.
    Completion {
        result: String,
        lambda: LambdaId,
        callback: CallbackId,
    },
    /// Reply to a `call()`.
    Message {
        message: String,
        lambda: LambdaId,
        callback: CallbackId,
    },
    /// A remote stub invoked a caller-side bridge.
    BridgeCall {
        name: String,
        args: String,
        lambda: LambdaId,
        callback: CallbackId,
    },
}

impl HostEvent {
    pub fn lambda(&self) -> LambdaId {
        match self {
            Self::Completion { lambda, .. }
            | Self::Message { lambda, .. }
            | Self::BridgeCall { lambda, .. } => *lambda,
        }
    }
}

pub type EventSender = mpsc::UnboundedSender<HostEvent>;
pub type EventReceiver = mpsc::UnboundedReceiver<HostEvent>;

/// Channel between a host engine and the dispatch loop.
pub fn channel() -> (EventSender, EventReceiver) {
    mpsc::unbounded_channel()
}
