//! Core-side dispatch loop for the boundary channel.

use std::sync::Arc;

use tokio::task::JoinHandle;
use tracing::debug;

use crate::dispatch::Dispatcher;
use plinth_ipc::BridgeServer;

/// Drain the server end of the bridge into the dispatcher.
///
/// Each envelope gets its own task, so requests interleave freely and a
/// slow store wait never blocks the queue behind it. The loop ends when
/// every client handle is gone.
pub fn serve(mut server: BridgeServer, dispatcher: Arc<Dispatcher>) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(envelope) = server.recv().await {
            let dispatcher = dispatcher.clone();
            tokio::spawn(async move {
                let reply = dispatcher.dispatch(envelope.request).await;
                // A dropped receiver just means the caller stopped waiting.
                let _ = envelope.reply.send(reply);
            });
        }
        debug!("bridge closed, dispatch loop exiting");
    })
}
