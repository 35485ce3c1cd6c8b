use super::*;
use crate::test_support::{memory_store, user};

fn sorted(mut cards: Vec<CardKind>) -> Vec<CardKind> {
    cards.sort_by_key(|card| card.name());
    cards
}

fn canonical() -> Vec<CardKind> {
    sorted(CANONICAL_DECK.to_vec())
}

#[tokio::test]
async fn create_deck_persists_canonical_composition() {
    let decks = DeckStore::with_seed(memory_store().await, 1);
    let alice = user("alice");
    assert!(!decks.has_deck(&alice).await.expect("has deck"));

    let dealt = decks
        .create_deck(&alice)
        .await
        .expect("create")
        .expect("new session");

    assert!(decks.has_deck(&alice).await.expect("has deck"));
    let deck = decks.read_deck(&alice).await.expect("read");
    assert_eq!(deck, dealt);
    assert_eq!(sorted(deck), canonical());
}

#[tokio::test]
async fn create_deck_leaves_existing_deck_alone() {
    let decks = DeckStore::with_seed(memory_store().await, 2);
    let alice = user("alice");
    decks
        .replace_deck(&alice, &[CardKind::Cat, CardKind::Shuffle])
        .await
        .expect("seed deck");

    assert!(decks.create_deck(&alice).await.expect("create").is_none());

    assert_eq!(
        decks.read_deck(&alice).await.expect("read"),
        vec![CardKind::Cat, CardKind::Shuffle]
    );
}

#[tokio::test]
async fn draw_random_removes_exactly_one_card() {
    let decks = DeckStore::with_seed(memory_store().await, 3);
    let alice = user("alice");
    decks.create_deck(&alice).await.expect("create");

    let drawn = decks.draw_random(&alice).await.expect("draw");
    let mut remaining = decks.read_deck(&alice).await.expect("read");
    assert_eq!(remaining.len(), 4);

    remaining.push(drawn);
    assert_eq!(sorted(remaining), canonical());
}

#[tokio::test]
async fn drawing_every_card_empties_the_deck() {
    let decks = DeckStore::with_seed(memory_store().await, 4);
    let alice = user("alice");
    decks.create_deck(&alice).await.expect("create");

    let mut drawn = Vec::new();
    for _ in 0..5 {
        drawn.push(decks.draw_random(&alice).await.expect("draw"));
    }

    assert_eq!(sorted(drawn), canonical());
    assert!(decks.read_deck(&alice).await.expect("read").is_empty());
    assert!(decks.has_deck(&alice).await.expect("has deck"));
    assert!(matches!(
        decks.draw_random(&alice).await,
        Err(GameError::EmptyDeck)
    ));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_draws_take_a_single_card_once() {
    let decks = Arc::new(DeckStore::with_seed(memory_store().await, 6));
    let alice = user("alice");

    for _ in 0..50 {
        decks
            .replace_deck(&alice, &[CardKind::Cat])
            .await
            .expect("seed deck");
        let handles: Vec<_> = (0..2)
            .map(|_| {
                let decks = Arc::clone(&decks);
                let alice = alice.clone();
                tokio::spawn(async move { decks.draw_random(&alice).await })
            })
            .collect();

        let mut drawn = 0;
        let mut empty = 0;
        for handle in handles {
            match handle.await.expect("join") {
                Ok(CardKind::Cat) => drawn += 1,
                Err(GameError::EmptyDeck) => empty += 1,
                other => panic!("unexpected draw result: {other:?}"),
            }
        }
        assert_eq!((drawn, empty), (1, 1));
        assert!(decks.read_deck(&alice).await.expect("read").is_empty());
    }
}

#[tokio::test]
async fn reshuffle_restores_a_full_deck() {
    let decks = DeckStore::with_seed(memory_store().await, 5);
    let alice = user("alice");
    decks
        .replace_deck(&alice, &[CardKind::ExplodingKitten])
        .await
        .expect("seed deck");

    decks.reshuffle(&alice).await.expect("reshuffle");

    let deck = decks.read_deck(&alice).await.expect("read");
    assert_eq!(sorted(deck), canonical());
}

#[tokio::test]
async fn same_seed_produces_the_same_shuffle() {
    let store = memory_store().await;
    let first = DeckStore::with_seed(Arc::clone(&store), 42);
    let second = DeckStore::with_seed(store, 42);

    first.create_deck(&user("alice")).await.expect("create");
    second.create_deck(&user("bob")).await.expect("create");

    assert_eq!(
        first.read_deck(&user("alice")).await.expect("read"),
        second.read_deck(&user("bob")).await.expect("read")
    );
}

#[tokio::test]
async fn unreadable_entries_are_skipped() {
    let store = memory_store().await;
    store
        .list_push("deck:alice", &["Dog".to_string(), "Cat".to_string()])
        .await
        .expect("push");
    let decks = DeckStore::with_seed(store, 6);

    assert_eq!(
        decks.read_deck(&user("alice")).await.expect("read"),
        vec![CardKind::Cat]
    );
}
