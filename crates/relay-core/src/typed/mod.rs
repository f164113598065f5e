//! Typed - 静的に定義されたリモートタスク
//!
//! Remote contexts execute only tasks registered here, selected by entry
//! name from the composed program.

pub mod registry;
pub mod scope;
pub mod task;

pub use self::registry::{RegistryError, RemoteRegistry};
pub use self::scope::{ExportFn, PendingReply, RemoteScope, ReplySlots};
pub use self::task::{DynRemoteTask, RemoteFault, RemoteTask, TypedRemoteTask};
