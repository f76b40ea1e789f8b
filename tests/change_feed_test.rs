//! Polling change feed against an in-memory store.
//!
//! Run with: cargo test --test change_feed_test

mod support;

use chrono::Utc;
use std::sync::atomic::Ordering;
use std::time::Duration;
use tokio::sync::mpsc::error::TryRecvError;

use coldwatch::supabase::{ChangeFeed, Collection, PollingChangeFeed};

use support::{freezer, MemoryStore};

const EVERY: Duration = Duration::from_millis(10);

#[tokio::test]
async fn new_log_is_announced() {
    let store = MemoryStore::with_sensors(vec![freezer(1, "Freezer A", -18.0)]);
    let feed = PollingChangeFeed::new(store.clone(), EVERY);
    let mut logs = feed.subscribe(Collection::TemperatureLogs).await.unwrap();

    store.add_log(1, -18.2, Utc::now());

    let notification = tokio::time::timeout(Duration::from_secs(1), logs.recv())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(notification.collection, Collection::TemperatureLogs);
}

#[tokio::test]
async fn unchanged_collection_stays_quiet() {
    let store = MemoryStore::with_sensors(vec![freezer(1, "Freezer A", -18.0)]);
    let feed = PollingChangeFeed::new(store.clone(), EVERY);
    let mut sensors = feed.subscribe(Collection::Sensors).await.unwrap();

    tokio::time::sleep(EVERY * 6).await;

    assert!(store.marker_polls.load(Ordering::SeqCst) > 1);
    assert!(matches!(sensors.try_recv(), Err(TryRecvError::Empty)));
}

#[tokio::test]
async fn failed_poll_does_not_end_the_feed() {
    let store = MemoryStore::with_sensors(vec![freezer(1, "Freezer A", -18.0)]);
    let feed = PollingChangeFeed::new(store.clone(), EVERY);
    let mut logs = feed.subscribe(Collection::TemperatureLogs).await.unwrap();

    store.set_fail_reads(true);
    let polls = store.marker_polls.load(Ordering::SeqCst);
    tokio::time::sleep(EVERY * 4).await;
    assert!(store.marker_polls.load(Ordering::SeqCst) > polls);
    store.set_fail_reads(false);

    store.add_log(1, -18.4, Utc::now());

    let notification = tokio::time::timeout(Duration::from_secs(1), logs.recv())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(notification.collection, Collection::TemperatureLogs);
}

#[tokio::test]
async fn polling_stops_once_receiver_is_dropped() {
    let store = MemoryStore::with_sensors(vec![freezer(1, "Freezer A", -18.0)]);
    let feed = PollingChangeFeed::new(store.clone(), EVERY);
    let alerts = feed.subscribe(Collection::Alerts).await.unwrap();

    tokio::time::sleep(EVERY * 3).await;
    drop(alerts);
    // allow a poll already in flight to finish
    tokio::time::sleep(EVERY * 3).await;
    let settled = store.marker_polls.load(Ordering::SeqCst);

    tokio::time::sleep(EVERY * 5).await;
    assert_eq!(store.marker_polls.load(Ordering::SeqCst), settled);
}
