//! Chaos testing for concurrent access.
//!
//! Tests concurrent operations to find torn snapshots and deadlocks:
//! - Readers racing a stream of refreshes
//! - Concurrent refreshers
//! - Suggestions running while playbooks are created and deleted

// Chaos tests use expect/unwrap/panic for simplicity - panics are acceptable in tests
#![allow(clippy::expect_used, clippy::unwrap_used, clippy::panic)]

use playbook_signal::models::Playbook;
use playbook_signal::services::{KeywordsCache, SuggestionEngine};
use playbook_signal::storage::{InMemoryPlaybookStore, PlaybookStore};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::thread;
use std::time::Duration;

/// Adds playbooks in batches whose titles carry the batch number, so a
/// snapshot is consistent iff it holds complete batches only.
fn add_batch(store: &InMemoryPlaybookStore, batch: usize, size: usize) {
    for i in 0..size {
        store
            .create(
                &Playbook::new("T", format!("batch-{batch}-{i}"))
                    .with_keywords([format!("kw{batch}")])
                    .with_members(["U"]),
            )
            .unwrap();
    }
}

/// Test: readers never observe a partially built snapshot.
#[test]
fn test_snapshot_atomic_under_concurrent_refresh() {
    const BATCH: usize = 8;
    let store = Arc::new(InMemoryPlaybookStore::new());
    add_batch(&store, 0, BATCH);
    let cache = Arc::new(KeywordsCache::new(store.clone()));
    cache.refresh();

    let done = Arc::new(AtomicBool::new(false));
    let reads = Arc::new(AtomicUsize::new(0));

    let readers: Vec<_> = (0..4)
        .map(|_| {
            let cache = Arc::clone(&cache);
            let done = Arc::clone(&done);
            let reads = Arc::clone(&reads);
            thread::spawn(move || {
                let mut last_generation = 0;
                while !done.load(Ordering::SeqCst) {
                    let snapshot = cache.get();
                    assert_eq!(snapshot.len() % BATCH, 0, "torn snapshot");
                    assert!(snapshot.generation() >= last_generation);
                    last_generation = snapshot.generation();
                    reads.fetch_add(1, Ordering::Relaxed);
                }
            })
        })
        .collect();

    // Batches are added between refreshes; a refresh never runs mid-batch.
    for batch in 1..20 {
        add_batch(&store, batch, BATCH);
        assert!(cache.refresh());
    }
    done.store(true, Ordering::SeqCst);

    for reader in readers {
        reader.join().unwrap();
    }
    assert_eq!(cache.get().len(), 20 * BATCH);
    assert!(reads.load(Ordering::Relaxed) > 0);
}

/// Test: concurrent refreshers serialize and the last one wins.
#[test]
fn test_concurrent_refreshers_no_deadlock() {
    let store = Arc::new(InMemoryPlaybookStore::new());
    add_batch(&store, 0, 4);
    let cache = Arc::new(KeywordsCache::new(store.clone()));

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let cache = Arc::clone(&cache);
            thread::spawn(move || {
                for _ in 0..25 {
                    assert!(cache.refresh());
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    let snapshot = cache.get();
    assert_eq!(snapshot.generation(), 200);
    assert_eq!(snapshot.len(), 4);
}

/// Test: suggestions keep working while the background refresher churns.
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_suggestions_during_churn() {
    let store = Arc::new(InMemoryPlaybookStore::new());
    store
        .create(
            &Playbook::new("T", "Stable")
                .with_keywords(["outage"])
                .with_members(["U"]),
        )
        .unwrap();
    let cache = Arc::new(KeywordsCache::new(store.clone()));
    cache.refresh();
    let refresher = cache.spawn_refresher(Duration::from_millis(5));
    let engine = SuggestionEngine::new(cache.clone(), store.clone());

    let writer = {
        let store = store.clone();
        let cache = cache.clone();
        tokio::task::spawn_blocking(move || {
            for i in 0..50 {
                let id = store
                    .create(&Playbook::new("T", format!("temp-{i}")).with_keywords(["outage"]))
                    .unwrap();
                cache.invalidate();
                store.delete(&id).unwrap();
            }
        })
    };

    let mut tasks = Vec::new();
    for _ in 0..16 {
        let engine = engine.clone();
        tasks.push(tokio::spawn(async move {
            for _ in 0..20 {
                let suggestion = engine.suggest("T", "U", "an outage").await;
                // Temporary playbooks have no members, so only the stable one shows.
                assert_eq!(suggestion.playbooks.len(), 1);
                assert_eq!(suggestion.playbooks[0].title, "Stable");
            }
        }));
    }

    for task in tasks {
        task.await.unwrap();
    }
    writer.await.unwrap();
    refresher.shutdown().await;
}
