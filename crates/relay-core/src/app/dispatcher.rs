//! Dispatcher - ホストエンジンからの配送をルーティング
//!
//! Three entry points, one per event kind. Each one only looks things up and
//! forwards. Unknown lambdas, consumed callbacks and unknown bridges are
//! expected (late or duplicate deliveries) and are dropped silently.

use std::sync::Arc;

use tracing::{debug, trace};

use super::handler::TaskHandle;
use super::registry::TaskRegistry;
use crate::domain::{CallbackId, CompletionPayload, Decoded, HostEvent, LambdaId};

pub struct Dispatcher {
    registry: Arc<TaskRegistry>,
}

impl Dispatcher {
    pub fn new(registry: Arc<TaskRegistry>) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &Arc<TaskRegistry> {
        &self.registry
    }

    pub fn dispatch(&self, event: HostEvent) {
        match event {
            HostEvent::Completion {
                result,
                lambda,
                callback,
            } => self.on_completion(&result, lambda, callback),
            HostEvent::Message {
                message,
                lambda,
                callback,
            } => self.on_message(&message, lambda, callback),
            HostEvent::BridgeCall {
                name,
                args,
                lambda,
                callback,
            } => self.on_bridge_call(&name, &args, lambda, callback),
        }
    }

    /// A lambda finished. The callback id is unused for completions.
    pub fn on_completion(&self, result_text: &str, lambda: LambdaId, _callback: CallbackId) {
        let payload = CompletionPayload::from_decoded(Decoded::from_text(result_text));
        let Some(handler) = self.registry.lookup(lambda) else {
            debug!(%lambda, "completion for unknown lambda dropped");
            return;
        };

        let on_complete = handler.complete(payload.exports);
        if let Some(on_complete) = on_complete {
            on_complete(payload.result, TaskHandle::new(Arc::clone(&handler), Arc::clone(&self.registry)));
        }

        if !handler.is_pinned() {
            self.registry.remove_handler(&handler);
            debug!(%lambda, "disposable lambda cleaned up");
        }
    }

    /// Reply to a `call()`; delivered to its callback at most once.
    pub fn on_message(&self, message: &str, lambda: LambdaId, callback: CallbackId) {
        let Some(handler) = self.registry.lookup(lambda) else {
            debug!(%lambda, %callback, "message for unknown lambda dropped");
            return;
        };
        let Some(reply) = handler.take_pending(callback) else {
            debug!(%lambda, %callback, "message without pending callback dropped");
            return;
        };
        trace!(%lambda, %callback, "delivering message");
        reply(message.to_string());
    }

    /// A remote stub invoked a bridge.
    pub fn on_bridge_call(&self, name: &str, args: &str, lambda: LambdaId, callback: CallbackId) {
        let Some(handler) = self.registry.lookup(lambda) else {
            debug!(%lambda, bridge = name, "bridge call for unknown lambda dropped");
            return;
        };
        let Some(bridge) = handler.bridge(name) else {
            debug!(%lambda, bridge = name, "unknown bridge dropped");
            return;
        };
        bridge.invoke(handler.engine(), lambda, args, callback);
    }
}
