use std::{
    collections::HashMap,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
    time::Duration,
};

use anyhow::anyhow;
use async_trait::async_trait;
use futures::future::join_all;
use shared::protocol::LeaderboardEntry;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::stats::StatsStore;

pub type ObserverId = u64;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HubFrame {
    Snapshot(Vec<LeaderboardEntry>),
    /// Carries no data; a failed delivery marks the connection as dead.
    Keepalive,
}

/// One connected leaderboard subscriber.
#[async_trait]
pub trait Observer: Send + Sync {
    async fn send(&self, frame: HubFrame) -> anyhow::Result<()>;
    async fn close(&self);
}

#[derive(Debug, Clone, Copy)]
pub struct HubConfig {
    pub keepalive_interval: Duration,
    pub send_timeout: Duration,
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            keepalive_interval: Duration::from_secs(30),
            send_timeout: Duration::from_secs(5),
        }
    }
}

/// Pushes full leaderboard snapshots to every registered observer.
///
/// The registry lock is only held to insert, remove or copy handles; sends
/// happen after it is released, concurrently, each bounded by
/// [`HubConfig::send_timeout`]. An observer whose send fails is removed and
/// closed without affecting delivery to the rest.
pub struct BroadcastHub {
    stats: StatsStore,
    config: HubConfig,
    next_id: AtomicU64,
    observers: Mutex<HashMap<ObserverId, Arc<dyn Observer>>>,
}

impl BroadcastHub {
    pub fn new(stats: StatsStore, config: HubConfig) -> Self {
        Self {
            stats,
            config,
            next_id: AtomicU64::new(1),
            observers: Mutex::new(HashMap::new()),
        }
    }

    pub fn config(&self) -> HubConfig {
        self.config
    }

    /// Adds the observer and sends it, and only it, the current snapshot.
    pub async fn register(&self, observer: Arc<dyn Observer>) -> ObserverId {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.observers.lock().await.insert(id, Arc::clone(&observer));
        info!(observer_id = id, "leaderboard observer registered");

        match self.stats.snapshot_all().await {
            Ok(snapshot) => {
                self.deliver(id, observer, HubFrame::Snapshot(snapshot)).await;
            }
            Err(error) => warn!(observer_id = id, %error, "initial leaderboard snapshot failed"),
        }
        id
    }

    /// Returns whether the observer was still registered.
    pub async fn unregister(&self, id: ObserverId) -> bool {
        let removed = self.observers.lock().await.remove(&id).is_some();
        if removed {
            info!(observer_id = id, "leaderboard observer unregistered");
        }
        removed
    }

    pub async fn observer_count(&self) -> usize {
        self.observers.lock().await.len()
    }

    /// Sends one fresh snapshot to every observer and returns how many
    /// received it.
    pub async fn publish(&self) -> usize {
        let snapshot = match self.stats.snapshot_all().await {
            Ok(snapshot) => snapshot,
            Err(error) => {
                warn!(%error, "skipping leaderboard publish");
                return 0;
            }
        };

        let targets = self.registered().await;
        let attempted = targets.len();
        let results = join_all(targets.into_iter().map(|(id, observer)| {
            self.deliver(id, observer, HubFrame::Snapshot(snapshot.clone()))
        }))
        .await;
        let delivered = results.into_iter().filter(|ok| *ok).count();
        debug!(attempted, delivered, "leaderboard published");
        delivered
    }

    /// Pings one observer on the configured interval until it disappears
    /// from the registry or a ping fails.
    pub async fn keepalive(&self, id: ObserverId) {
        let mut ticker = tokio::time::interval(self.config.keepalive_interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        // The first tick completes immediately.
        ticker.tick().await;
        loop {
            ticker.tick().await;
            let observer = self.observers.lock().await.get(&id).cloned();
            let Some(observer) = observer else {
                return;
            };
            if !self.deliver(id, observer, HubFrame::Keepalive).await {
                return;
            }
        }
    }

    async fn registered(&self) -> Vec<(ObserverId, Arc<dyn Observer>)> {
        self.observers
            .lock()
            .await
            .iter()
            .map(|(id, observer)| (*id, Arc::clone(observer)))
            .collect()
    }

    async fn deliver(&self, id: ObserverId, observer: Arc<dyn Observer>, frame: HubFrame) -> bool {
        let sent = tokio::time::timeout(self.config.send_timeout, observer.send(frame)).await;
        let error = match sent {
            Ok(Ok(())) => return true,
            Ok(Err(error)) => error,
            Err(_) => anyhow!("send timed out after {:?}", self.config.send_timeout),
        };
        warn!(observer_id = id, "dropping leaderboard observer: {error:#}");
        self.unregister(id).await;
        observer.close().await;
        false
    }
}

#[cfg(test)]
#[path = "tests/hub_tests.rs"]
mod tests;
