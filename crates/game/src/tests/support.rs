use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use shared::{domain::Username, protocol::LeaderboardEntry};
use storage::{KeyValueStore, Storage};
use tokio::sync::Mutex;

use crate::hub::{HubFrame, Observer};

pub(crate) async fn memory_store() -> Arc<dyn KeyValueStore> {
    Arc::new(Storage::new("sqlite::memory:").await.expect("db"))
}

pub(crate) fn user(name: &str) -> Username {
    Username::parse(name).expect("username")
}

pub(crate) fn entry(username: &str, wins: u64, losses: u64) -> LeaderboardEntry {
    LeaderboardEntry {
        username: username.to_string(),
        wins,
        losses,
    }
}

#[derive(Default)]
pub(crate) struct RecordingObserver {
    frames: Mutex<Vec<HubFrame>>,
    failing: AtomicBool,
    closed: AtomicBool,
}

impl RecordingObserver {
    pub(crate) fn failing() -> Self {
        let observer = Self::default();
        observer.set_failing(true);
        observer
    }

    pub(crate) fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub(crate) fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    pub(crate) async fn frames(&self) -> Vec<HubFrame> {
        self.frames.lock().await.clone()
    }

    pub(crate) async fn snapshots(&self) -> Vec<Vec<LeaderboardEntry>> {
        self.frames
            .lock()
            .await
            .iter()
            .filter_map(|frame| match frame {
                HubFrame::Snapshot(entries) => Some(entries.clone()),
                HubFrame::Keepalive => None,
            })
            .collect()
    }
}

#[async_trait]
impl Observer for RecordingObserver {
    async fn send(&self, frame: HubFrame) -> Result<()> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(anyhow!("connection reset by peer"));
        }
        self.frames.lock().await.push(frame);
        Ok(())
    }

    async fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }
}

/// Never finishes a send, like a peer that stopped reading.
#[derive(Default)]
pub(crate) struct StalledObserver {
    closed: AtomicBool,
}

impl StalledObserver {
    pub(crate) fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Observer for StalledObserver {
    async fn send(&self, _frame: HubFrame) -> Result<()> {
        futures::future::pending::<()>().await;
        Ok(())
    }

    async fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }
}

/// A store whose backend is unreachable.
pub(crate) struct UnreachableStore;

#[async_trait]
impl KeyValueStore for UnreachableStore {
    async fn list_push(&self, _key: &str, _values: &[String]) -> Result<()> {
        Err(anyhow!("connection refused"))
    }

    async fn list_remove(&self, _key: &str, _count: u32, _value: &str) -> Result<u64> {
        Err(anyhow!("connection refused"))
    }

    async fn list_range(&self, _key: &str) -> Result<Vec<String>> {
        Err(anyhow!("connection refused"))
    }

    async fn list_replace(&self, _key: &str, _values: &[String]) -> Result<()> {
        Err(anyhow!("connection refused"))
    }

    async fn list_claim(
        &self,
        _key: &str,
        _values: &[String],
        _namespace: &str,
        _field: &str,
    ) -> Result<bool> {
        Err(anyhow!("connection refused"))
    }

    async fn delete(&self, _key: &str) -> Result<()> {
        Err(anyhow!("connection refused"))
    }

    async fn hash_get(&self, _namespace: &str, _field: &str) -> Result<Option<String>> {
        Err(anyhow!("connection refused"))
    }

    async fn hash_set(&self, _namespace: &str, _field: &str, _value: &str) -> Result<()> {
        Err(anyhow!("connection refused"))
    }

    async fn hash_set_if_absent(
        &self,
        _namespace: &str,
        _field: &str,
        _value: &str,
    ) -> Result<bool> {
        Err(anyhow!("connection refused"))
    }

    async fn hash_increment(&self, _namespace: &str, _field: &str, _delta: i64) -> Result<i64> {
        Err(anyhow!("connection refused"))
    }

    async fn hash_get_all(&self, _namespace: &str) -> Result<Vec<(String, String)>> {
        Err(anyhow!("connection refused"))
    }

    async fn health_check(&self) -> Result<()> {
        Err(anyhow!("connection refused"))
    }
}
