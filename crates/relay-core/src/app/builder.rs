//! Relay - caller 側の入口とワイヤリング
//!
//! # 使用例
//! ```ignore
//! let (events_tx, events_rx) = relay_core::domain::events::channel();
//! let engine = Arc::new(InProcessEngine::new(remote_tasks, events_tx)?);
//! let relay = Relay::builder(engine).build();
//! let dispatch = relay.spawn_dispatch_loop(events_rx);
//!
//! let handle = relay.launch(TaskDescriptor::for_task::<Adder>(), |_, handle| {
//!     handle.call_with("add", &[2, 3], |reply| println!("{reply}")).ok();
//! })?;
//! ```

use std::sync::Arc;

use serde_json::Value;
use tracing::{info, warn};

use super::composer::ScriptComposer;
use super::dispatch_loop::DispatchLoop;
use super::dispatcher::Dispatcher;
use super::handler::{CompletionCallback, TaskHandle, TaskHandler};
use super::registry::TaskRegistry;
use super::status::RegistryStatus;
use crate::config::RelayConfig;
use crate::domain::{EventReceiver, ExecutionContext, LambdaId, RelayError, TaskDescriptor};
use crate::ports::{Clock, HostEngine, SystemClock};

pub struct RelayBuilder {
    engine: Arc<dyn HostEngine>,
    registry: Option<Arc<TaskRegistry>>,
    clock: Arc<dyn Clock>,
    config: RelayConfig,
}

impl RelayBuilder {
    pub fn new(engine: Arc<dyn HostEngine>) -> Self {
        Self {
            engine,
            registry: None,
            clock: Arc::new(SystemClock),
            config: RelayConfig::default(),
        }
    }

    /// Share an existing registry instead of creating a fresh one.
    pub fn registry(mut self, registry: Arc<TaskRegistry>) -> Self {
        self.registry = Some(registry);
        self
    }

    pub fn clock(mut self, clock: impl Clock + 'static) -> Self {
        self.clock = Arc::new(clock);
        self
    }

    pub fn config(mut self, config: RelayConfig) -> Self {
        self.config = config;
        self
    }

    pub fn build(self) -> Relay {
        let registry = self.registry.unwrap_or_default();
        Relay {
            dispatcher: Arc::new(Dispatcher::new(Arc::clone(&registry))),
            registry,
            engine: self.engine,
            composer: ScriptComposer::new(),
            clock: self.clock,
            config: self.config,
        }
    }
}

/// Caller-side facade: launches tasks and owns the routing state.
pub struct Relay {
    engine: Arc<dyn HostEngine>,
    registry: Arc<TaskRegistry>,
    dispatcher: Arc<Dispatcher>,
    composer: ScriptComposer,
    clock: Arc<dyn Clock>,
    config: RelayConfig,
}

impl Relay {
    pub fn builder(engine: Arc<dyn HostEngine>) -> RelayBuilder {
        RelayBuilder::new(engine)
    }

    pub fn registry(&self) -> &Arc<TaskRegistry> {
        &self.registry
    }

    pub fn dispatcher(&self) -> &Arc<Dispatcher> {
        &self.dispatcher
    }

    pub fn config(&self) -> &RelayConfig {
        &self.config
    }

    /// Start the single consumer for events posted by the engine.
    pub fn spawn_dispatch_loop(&self, events: EventReceiver) -> DispatchLoop {
        DispatchLoop::spawn(Arc::clone(&self.dispatcher), events)
    }

    /// Launch a task in the configured default context.
    pub fn launch<F>(&self, descriptor: TaskDescriptor, on_complete: F) -> Result<TaskHandle, RelayError>
    where
        F: Fn(Value, TaskHandle) + Send + Sync + 'static,
    {
        self.launch_in(descriptor, self.config.default_context, on_complete)
    }

    pub fn launch_in<F>(
        &self,
        descriptor: TaskDescriptor,
        context: ExecutionContext,
        on_complete: F,
    ) -> Result<TaskHandle, RelayError>
    where
        F: Fn(Value, TaskHandle) + Send + Sync + 'static,
    {
        let on_complete: CompletionCallback = Arc::new(on_complete);
        self.start(descriptor, context, Some(on_complete))
    }

    fn start(
        &self,
        descriptor: TaskDescriptor,
        context: ExecutionContext,
        on_complete: Option<CompletionCallback>,
    ) -> Result<TaskHandle, RelayError> {
        let resident = self.engine.is_resident(descriptor.entry())?;
        let reserved = self.engine.next_lambda_id();
        let composed = self.composer.compose(reserved, &descriptor)?;
        let program = composed.program.to_text()?;

        let handler = Arc::new(TaskHandler::new(
            reserved,
            descriptor.entry(),
            resident,
            composed.bridges,
            on_complete,
            Arc::clone(&self.engine),
            Arc::clone(&self.clock),
        ));

        // 完了イベントが run_script より先に届いても拾えるよう、先に登録する
        self.registry.register(Arc::clone(&handler))?;

        let lambda = match self.engine.run_script(&program, context, resident) {
            Ok(lambda) => lambda,
            Err(err) => {
                self.registry.remove_handler(&handler);
                return Err(err.into());
            }
        };

        // 予約 id 以外で起動されると、その id 宛ての配送は拾えない
        if lambda != reserved {
            warn!(%reserved, assigned = %lambda, "engine ignored the reserved lambda id");
            self.registry.remove_handler(&handler);
            self.engine.stop_lambda(lambda);
            return Err(RelayError::LambdaIdMismatch {
                reserved,
                assigned: lambda,
            });
        }
        handler.mark_running(lambda);

        info!(%lambda, entry = descriptor.entry(), resident, %context, "lambda launched");
        Ok(TaskHandle::new(handler, Arc::clone(&self.registry)))
    }

    /// Run a program nobody listens to. Its completion is dropped and its
    /// bridges are never served.
    pub fn run_detached(
        &self,
        descriptor: &TaskDescriptor,
        context: ExecutionContext,
    ) -> Result<LambdaId, RelayError> {
        if descriptor.capture().has_bridges() {
            warn!(entry = descriptor.entry(), "detached task captures bridges that will not be served");
        }
        let reserved = self.engine.next_lambda_id();
        let composed = self.composer.compose(reserved, descriptor)?;
        let program = composed.program.to_text()?;
        let lambda = self.engine.run_script(&program, context, false)?;
        info!(%lambda, entry = descriptor.entry(), "detached lambda launched");
        Ok(lambda)
    }

    pub fn status(&self) -> RegistryStatus {
        RegistryStatus::from_tasks(self.registry.snapshot().iter().map(|h| h.status()).collect())
    }
}
