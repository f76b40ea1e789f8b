//! Cache of chart points for ranges other than the session's selected one.
//!
//! The selected range lives in the dashboard session and is rebuilt on every
//! log refresh. Other ranges are built on demand and kept until the TTL
//! expires or a log change invalidates them.

use moka::future::Cache;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use crate::error::{AppError, AppResult};
use crate::services::bucketer::{ChartPoint, TimeRange};

#[derive(Clone)]
pub struct ChartCache {
    inner: Cache<TimeRange, Arc<Vec<ChartPoint>>>,
}

impl ChartCache {
    #[must_use]
    pub fn new(ttl: Duration) -> Self {
        let inner = Cache::builder()
            .max_capacity(TimeRange::ALL.len() as u64)
            .time_to_live(ttl)
            .build();
        Self { inner }
    }

    /// Return cached points for `range`, building them with `build` on a miss.
    /// Concurrent misses for the same range share one build.
    pub async fn get_or_build<F>(&self, range: TimeRange, build: F) -> AppResult<Arc<Vec<ChartPoint>>>
    where
        F: Future<Output = AppResult<Vec<ChartPoint>>>,
    {
        let hit = self.inner.contains_key(&range);
        let points = self
            .inner
            .try_get_with(range, async move { build.await.map(Arc::new) })
            .await
            .map_err(|e: Arc<AppError>| match e.as_ref() {
                AppError::FetchFailed(msg) => AppError::FetchFailed(msg.clone()),
                AppError::PermissionDenied(msg) => AppError::PermissionDenied(msg.clone()),
                other => AppError::Internal(other.to_string()),
            })?;

        tracing::debug!(range = %range, hit, points = points.len(), "chart_cache_lookup");
        Ok(points)
    }

    pub fn invalidate_all(&self) {
        self.inner.invalidate_all();
        tracing::debug!("chart_cache_invalidated");
    }
}
