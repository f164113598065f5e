//! Domain model (ids, payloads, programs, captures, lifecycle, errors).

pub mod capture;
pub mod errors;
pub mod events;
pub mod ids;
pub mod payload;
pub mod program;
pub mod state;

pub use capture::{BridgeFn, Capture, CaptureValue, TaskDescriptor};
pub use errors::{CodecError, EngineError, RelayError};
pub use events::{EventReceiver, EventSender, HostEvent};
pub use ids::{CallbackId, LambdaId, SlotKey};
pub use payload::Decoded;
pub use program::{
    CompletionPayload, ExecutionContext, RemoteProgram, RemoteStatement, RemoteTarget,
};
pub use state::LambdaState;
