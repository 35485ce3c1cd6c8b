use anyhow::Context;
use async_trait::async_trait;
use axum::extract::ws::{Message, WebSocket};
use futures::{stream::SplitSink, SinkExt};
use game::{HubFrame, Observer};
use tokio::sync::Mutex;

/// Write half of a leaderboard WebSocket. Snapshots go out as JSON text
/// frames and keepalives as pings.
pub(crate) struct WebSocketObserver {
    sink: Mutex<SplitSink<WebSocket, Message>>,
}

impl WebSocketObserver {
    pub(crate) fn new(sink: SplitSink<WebSocket, Message>) -> Self {
        Self {
            sink: Mutex::new(sink),
        }
    }
}

#[async_trait]
impl Observer for WebSocketObserver {
    async fn send(&self, frame: HubFrame) -> anyhow::Result<()> {
        let message = match frame {
            HubFrame::Snapshot(entries) => Message::Text(serde_json::to_string(&entries)?),
            HubFrame::Keepalive => Message::Ping(Vec::new()),
        };
        self.sink
            .lock()
            .await
            .send(message)
            .await
            .context("websocket write failed")
    }

    async fn close(&self) {
        let _ = self.sink.lock().await.close().await;
    }
}
