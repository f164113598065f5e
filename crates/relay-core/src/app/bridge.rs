//! BridgeFunction - リモートから呼べる caller 側の関数
//!
//! Every invocation runs the caller function, optionally echoes its value
//! into the remote reply slot, and then always deletes that slot, so void
//! bridges do not leak slots on the remote side.

use std::fmt;

use tracing::{debug, warn};

use crate::domain::payload::{self, Decoded};
use crate::domain::{BridgeFn, CallbackId, LambdaId, RemoteStatement, RemoteTarget, SlotKey};
use crate::ports::HostEngine;

#[derive(Clone)]
pub struct BridgeFunction {
    name: String,
    function: BridgeFn,
}

impl BridgeFunction {
    pub fn new(name: impl Into<String>, function: BridgeFn) -> Self {
        Self {
            name: name.into(),
            function,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Handle one bridge call coming from `lambda`.
    pub fn invoke(&self, engine: &dyn HostEngine, lambda: LambdaId, args: &str, callback: CallbackId) {
        let slot = SlotKey::new(self.name.as_str(), callback);
        debug!(%lambda, bridge = %self.name, %slot, "bridge call");

        if let Some(result) = (self.function)(Decoded::from_text(args)) {
            match payload::encode(&result) {
                // リモート側からの受領確認は不要なので NONE
                Ok(text) => engine.call_script_function(
                    lambda,
                    RemoteTarget::ReplySlot(slot.clone()),
                    &text,
                    CallbackId::NONE,
                ),
                Err(err) => warn!(%lambda, bridge = %self.name, %err, "bridge result not encodable"),
            }
        }

        engine.run_script_in_lambda(lambda, RemoteStatement::DeleteReplySlot(slot));
    }
}

impl fmt::Debug for BridgeFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BridgeFunction")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}
