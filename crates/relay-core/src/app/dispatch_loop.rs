//! DispatchLoop - ホストイベントの単一コンシューマ
//!
//! All host events go through one channel and one task, so completion,
//! message and bridge deliveries never run concurrently with each other.

use std::sync::Arc;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::debug;

use super::dispatcher::Dispatcher;
use crate::domain::EventReceiver;

/// Handle of a running dispatch loop.
/// - `request_shutdown()` でループを止める（未配送のイベントは捨てる）
/// - `join()` はチャネルが閉じるまで待つ
pub struct DispatchLoop {
    shutdown_tx: watch::Sender<bool>,
    join: JoinHandle<usize>,
}

impl DispatchLoop {
    pub fn spawn(dispatcher: Arc<Dispatcher>, events: EventReceiver) -> Self {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let join = tokio::spawn(dispatch_loop(dispatcher, events, shutdown_rx));
        Self { shutdown_tx, join }
    }

    pub fn request_shutdown(&self) {
        // ignore send error: the loop may already be gone
        let _ = self.shutdown_tx.send(true);
    }

    /// Stop and wait. Returns the number of events dispatched.
    pub async fn shutdown_and_join(self) -> usize {
        self.request_shutdown();
        self.join.await.unwrap_or_default()
    }

    /// Wait until every event sender is dropped and the channel is drained.
    pub async fn join(self) -> usize {
        let Self { shutdown_tx, join } = self;
        let delivered = join.await.unwrap_or_default();
        drop(shutdown_tx);
        delivered
    }
}

async fn dispatch_loop(
    dispatcher: Arc<Dispatcher>,
    mut events: EventReceiver,
    mut shutdown_rx: watch::Receiver<bool>,
) -> usize {
    let mut delivered = 0;
    loop {
        if *shutdown_rx.borrow() {
            break;
        }

        let event = tokio::select! {
            changed = shutdown_rx.changed() => {
                if changed.is_err() {
                    break;
                }
                continue;
            }
            event = events.recv() => event,
        };

        let Some(event) = event else {
            debug!("host event channel closed");
            break;
        };
        dispatcher.dispatch(event);
        delivered += 1;
    }
    delivered
}
