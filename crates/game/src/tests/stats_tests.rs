use super::*;
use crate::test_support::{entry, memory_store, user};

#[tokio::test]
async fn ensure_initialized_zeroes_once() {
    let stats = StatsStore::new(memory_store().await);
    let alice = user("alice");

    stats.ensure_initialized(&alice).await.expect("init");
    assert_eq!(stats.stats(&alice).await.expect("stats"), PlayerStats::default());

    assert_eq!(stats.defuse_charges(&alice).await.expect("charges"), 0);

    stats.record_loss(&alice).await.expect("loss");
    stats.add_defuse_charge(&alice).await.expect("defuse");
    stats.ensure_initialized(&alice).await.expect("init again");
    assert_eq!(
        stats.stats(&alice).await.expect("stats"),
        PlayerStats { wins: 0, losses: 1 }
    );
    assert_eq!(stats.defuse_charges(&alice).await.expect("charges"), 1);
}

#[tokio::test]
async fn wins_and_losses_count_independently() {
    let stats = StatsStore::new(memory_store().await);
    let alice = user("alice");
    stats.ensure_initialized(&alice).await.expect("init");

    assert_eq!(stats.record_win(&alice).await.expect("win"), 1);
    assert_eq!(stats.record_win(&alice).await.expect("win"), 2);
    assert_eq!(stats.record_loss(&alice).await.expect("loss"), 1);

    assert_eq!(
        stats.stats(&alice).await.expect("stats"),
        PlayerStats { wins: 2, losses: 1 }
    );
}

#[tokio::test]
async fn malformed_counters_read_as_zero() {
    let store = memory_store().await;
    store.hash_set("lose", "alice", "oops").await.expect("seed");
    store
        .hash_set("user:alice", "defuse", "-4")
        .await
        .expect("seed");
    let stats = StatsStore::new(store);
    let alice = user("alice");

    assert_eq!(stats.stats(&alice).await.expect("stats").losses, 0);
    assert_eq!(stats.defuse_charges(&alice).await.expect("charges"), 0);
    assert_eq!(stats.record_loss(&alice).await.expect("loss"), 1);
}

#[tokio::test]
async fn defuse_charges_never_go_negative() {
    let stats = StatsStore::new(memory_store().await);
    let alice = user("alice");

    assert_eq!(stats.defuse_charges(&alice).await.expect("charges"), 0);
    assert_eq!(stats.add_defuse_charge(&alice).await.expect("add"), 1);
    assert_eq!(stats.add_defuse_charge(&alice).await.expect("add"), 2);
    assert_eq!(stats.consume_defuse_charge(&alice).await.expect("spend"), 1);
    assert_eq!(stats.consume_defuse_charge(&alice).await.expect("spend"), 0);
    assert_eq!(stats.consume_defuse_charge(&alice).await.expect("spend"), 0);

    stats.set_defuse_charges(&alice, 3).await.expect("set");
    assert_eq!(stats.defuse_charges(&alice).await.expect("charges"), 3);
}

#[tokio::test]
async fn snapshot_joins_both_counters_and_sorts_by_name() {
    let store = memory_store().await;
    store.hash_set("win", "carol", "2").await.expect("seed");
    store.hash_set("lose", "bob", "5").await.expect("seed");
    let stats = StatsStore::new(store);
    stats.ensure_initialized(&user("alice")).await.expect("init");

    let snapshot = stats.snapshot_all().await.expect("snapshot");

    assert_eq!(
        snapshot,
        vec![entry("alice", 0, 0), entry("bob", 0, 5), entry("carol", 2, 0)]
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_losses_for_one_player_all_land() {
    let stats = StatsStore::new(memory_store().await);
    let alice = user("alice");
    stats.ensure_initialized(&alice).await.expect("init");
    stats.record_loss(&alice).await.expect("first loss");

    let mut handles = Vec::new();
    for _ in 0..20 {
        let stats = stats.clone();
        let alice = alice.clone();
        handles.push(tokio::spawn(async move {
            stats.record_loss(&alice).await.expect("loss");
        }));
    }
    for handle in handles {
        handle.await.expect("join");
    }

    assert_eq!(stats.stats(&alice).await.expect("stats").losses, 21);
}
