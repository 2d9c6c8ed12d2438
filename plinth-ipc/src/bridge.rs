//! The boundary channel itself: an mpsc of request envelopes, each carrying
//! a oneshot for its single reply.
//!
//! The client end lives with the UI host, the server end is drained by the
//! core's dispatch loop. There is no shared memory across the channel and a
//! closed channel degrades to failure replies, never to a hang.

use tokio::sync::{mpsc, oneshot};

use crate::{Reply, Request};

/// One in-flight request: the operation plus the slot its reply lands in.
#[derive(Debug)]
pub struct Envelope {
    pub request: Request,
    pub reply: oneshot::Sender<Reply>,
}

/// Create a connected client/server pair with the given queue capacity.
pub fn channel(capacity: usize) -> (BridgeClient, BridgeServer) {
    let (tx, rx) = mpsc::channel(capacity);
    (BridgeClient { tx }, BridgeServer { rx })
}

/// UI-side handle. Cheap to clone; every call yields exactly one reply.
#[derive(Debug, Clone)]
pub struct BridgeClient {
    tx: mpsc::Sender<Envelope>,
}

impl BridgeClient {
    /// Send a request and wait for its reply.
    ///
    /// If the core side is gone (channel closed, reply dropped) this
    /// resolves to a failure reply rather than erroring or hanging.
    pub async fn call(&self, request: Request) -> Reply {
        let (reply_tx, reply_rx) = oneshot::channel();
        let envelope = Envelope {
            request,
            reply: reply_tx,
        };
        if self.tx.send(envelope).await.is_err() {
            return Reply::fail("bridge closed");
        }
        match reply_rx.await {
            Ok(reply) => reply,
            Err(_) => Reply::fail("bridge closed"),
        }
    }
}

/// Core-side receiving end, drained by the dispatch loop.
#[derive(Debug)]
pub struct BridgeServer {
    rx: mpsc::Receiver<Envelope>,
}

impl BridgeServer {
    /// Next envelope, or `None` once every client handle is dropped.
    pub async fn recv(&mut self) -> Option<Envelope> {
        self.rx.recv().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn call_round_trips_through_the_channel() {
        let (client, mut server) = channel(8);

        let echo = tokio::spawn(async move {
            while let Some(envelope) = server.recv().await {
                let _ = envelope.reply.send(Reply::with_data(
                    serde_json::json!(envelope.request.name()),
                ));
            }
        });

        let reply = client.call(Request::AppVersion).await;
        assert!(reply.success);
        assert_eq!(reply.data, Some(serde_json::json!("app-version")));

        drop(client);
        echo.await.unwrap();
    }

    #[tokio::test]
    async fn closed_server_yields_failure_reply() {
        let (client, server) = channel(1);
        drop(server);

        let reply = client.call(Request::ServerPort).await;
        assert!(!reply.success);
        assert_eq!(reply.error.as_deref(), Some("bridge closed"));
    }

    #[tokio::test]
    async fn dropped_reply_slot_yields_failure_reply() {
        let (client, mut server) = channel(1);

        tokio::spawn(async move {
            // Consume the envelope but never answer it.
            let envelope = server.recv().await.unwrap();
            drop(envelope.reply);
        });

        let reply = client.call(Request::TreeStats).await;
        assert!(!reply.success);
    }
}
