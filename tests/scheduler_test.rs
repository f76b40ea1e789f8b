//! Timer behaviour of the sensor tick and polling refresh.
//!
//! Run with: cargo test --test scheduler_test

mod support;

use std::sync::Arc;
use std::time::Duration;

use coldwatch::supabase::DisabledChangeFeed;
use coldwatch::sync::scheduler::{run_sensor_tick, MAX_CONSECUTIVE_TICK_FAILURES};
use coldwatch::sync::FixedReadings;

use support::{freezer, Harness};

#[tokio::test]
async fn sensor_tick_stops_after_consecutive_failures() {
    let h = Harness::new(
        vec![freezer(1, "Freezer A", -18.0), freezer(2, "Freezer B", -18.0)],
        FixedReadings::new([(1, -18.1), (2, -18.2)]),
        Arc::new(DisabledChangeFeed),
    );
    h.store.failing_sensors.lock().unwrap().extend([1, 2]);
    h.sign_in_user().await;
    h.sync.refresh_sensors().await.unwrap();

    let handle = tokio::spawn(run_sensor_tick(h.sync.clone(), Duration::from_millis(5)));

    // the loop ends on its own; the synchronizer stays alive
    tokio::time::timeout(Duration::from_secs(2), handle)
        .await
        .expect("tick loop should stop by itself")
        .unwrap();
    assert!(h.sync.is_alive());
    assert_eq!(MAX_CONSECUTIVE_TICK_FAILURES, 3);
    assert_eq!(h.store.logs_for(1), 0);
}

#[tokio::test]
async fn sensor_tick_waits_for_sign_in_without_giving_up() {
    let h = Harness::new(
        vec![freezer(1, "Freezer A", -18.0)],
        FixedReadings::new([(1, -18.1)]),
        Arc::new(DisabledChangeFeed),
    );
    h.sync.refresh_sensors().await.unwrap();

    let handle = tokio::spawn(run_sensor_tick(h.sync.clone(), Duration::from_millis(5)));

    // several skipped ticks while signed out
    tokio::time::sleep(Duration::from_millis(40)).await;
    assert!(!handle.is_finished());
    assert_eq!(h.store.logs_for(1), 0);

    h.sign_in_user().await;
    let store = h.store.clone();
    assert!(support::eventually(|| {
        let store = store.clone();
        async move { store.logs_for(1) > 0 }
    })
    .await);

    h.sync.dispose().await;
    tokio::time::timeout(Duration::from_secs(1), handle)
        .await
        .expect("tick loop should stop on dispose")
        .unwrap();
}
