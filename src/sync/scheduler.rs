use std::sync::Arc;
use std::time::Duration;
use tokio::time::{interval, MissedTickBehavior};

use crate::error::AppError;
use crate::sync::synchronizer::Synchronizer;

/// Consecutive failed ticks after which the sensor tick stops.
pub const MAX_CONSECUTIVE_TICK_FAILURES: u32 = 3;

/// Periodically refresh sensors, alerts and logs until the synchronizer is
/// disposed. Failures are logged and the previous state is kept.
pub async fn run_polling_refresh(sync: Arc<Synchronizer>, every: Duration) {
    let alive = sync.liveness();
    tracing::info!(interval_secs = every.as_secs(), "Starting polling refresh scheduler");

    let mut ticker = interval(every);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    // the initial load already covered the first tick
    ticker.tick().await;

    loop {
        tokio::select! {
            () = alive.cancelled() => break,
            _ = ticker.tick() => {}
        }

        tracing::debug!("Running polling refresh...");
        let result = tokio::select! {
            () = alive.cancelled() => break,
            result = sync.refresh_all() => result,
        };

        match result {
            Ok(()) => tracing::debug!("Polling refresh completed successfully"),
            Err(e) => tracing::warn!(error = %e, "Polling refresh failed, keeping previous state"),
        }
    }

    tracing::info!("Polling refresh scheduler stopped");
}

/// Periodically advance every sensor by one reading.
///
/// Ticks while nobody is signed in are skipped without counting as failures.
/// After [`MAX_CONSECUTIVE_TICK_FAILURES`] failed ticks in a row the timer
/// stops for good; a restart needs a new call.
pub async fn run_sensor_tick(sync: Arc<Synchronizer>, every: Duration) {
    let alive = sync.liveness();
    tracing::info!(interval_secs = every.as_secs(), "Starting sensor tick scheduler");

    let mut ticker = interval(every);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    let mut failures = 0;

    loop {
        // first tick completes immediately
        tokio::select! {
            () = alive.cancelled() => break,
            _ = ticker.tick() => {}
        }

        let result = tokio::select! {
            () = alive.cancelled() => break,
            result = sync.apply_sensor_tick() => result,
        };

        let failed = match result {
            Ok(report) if report.is_total_failure() => {
                tracing::error!(
                    failed = report.failed.len(),
                    "Sensor tick failed for every sensor"
                );
                true
            }
            Ok(report) => {
                if !report.failed.is_empty() {
                    tracing::warn!(
                        updated = report.updated,
                        failed = report.failed.len(),
                        "Sensor tick partially failed"
                    );
                }
                false
            }
            Err(AppError::PermissionDenied(_)) => {
                tracing::debug!("Not signed in, skipping sensor tick");
                false
            }
            Err(e) => {
                tracing::error!(error = %e, "Sensor tick failed");
                true
            }
        };

        if failed {
            failures += 1;
            if failures >= MAX_CONSECUTIVE_TICK_FAILURES {
                tracing::error!(
                    failures,
                    "Too many consecutive tick failures, stopping sensor updates"
                );
                break;
            }
        } else {
            failures = 0;
        }
    }

    tracing::info!("Sensor tick scheduler stopped");
}
