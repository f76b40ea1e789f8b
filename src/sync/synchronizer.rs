use chrono::{DateTime, FixedOffset, Offset, Utc};
use futures::future::join_all;
use serde::Serialize;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::sync::{mpsc, Mutex as AsyncMutex, RwLock, RwLockWriteGuard};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use utoipa::ToSchema;

use crate::config::Config;
use crate::entity::{
    Alert, AlertKind, AlertResolution, AlertStatus, NewAlert, NewTemperatureLog, Profile, Sensor,
    Settings, TemperatureLog, TemperaturePatch, ThresholdPatch,
};
use crate::error::{AppError, AppResult};
use crate::services::bucketer::{build_chart_points, ChartPoint, TimeRange};
use crate::services::chart_cache::ChartCache;
use crate::services::notifier::{AlertNotice, Notifier};
use crate::services::retry::{retry_with_backoff, RetryPolicy};
use crate::supabase::{AuthProvider, AuthSession, ChangeFeed, RemoteStore};
use crate::sync::readings::ReadingSource;
use crate::sync::scheduler;
use crate::sync::session::{AlertView, DashboardSession};
use crate::sync::subscriptions::{ChannelStatus, RefreshTask, Subscriptions};
use crate::sync::thresholds::{ThresholdEdit, ThresholdFailure, ThresholdForm, ThresholdSaveReport};

/// Tunables for one synchronizer.
#[derive(Debug, Clone)]
pub struct SyncOptions {
    pub alert_limit: usize,
    pub display_offset: FixedOffset,
    pub default_range: TimeRange,
    pub retry: RetryPolicy,
    pub initial_load_timeout: Duration,
    pub chart_cache_ttl: Duration,
}

impl Default for SyncOptions {
    fn default() -> Self {
        Self {
            alert_limit: 50,
            display_offset: Utc.fix(),
            default_range: TimeRange::Day,
            retry: RetryPolicy::new(3, Duration::from_secs(1)),
            initial_load_timeout: Duration::from_secs(10),
            chart_cache_ttl: Duration::from_secs(60),
        }
    }
}

impl SyncOptions {
    #[must_use]
    pub fn from_config(config: &Config) -> Self {
        Self {
            alert_limit: config.alert_limit,
            display_offset: config.display_utc_offset,
            default_range: config.default_range,
            retry: RetryPolicy::new(
                config.retry_attempts,
                Duration::from_millis(config.retry_base_delay_ms),
            ),
            initial_load_timeout: Duration::from_secs(config.initial_load_timeout_seconds),
            chart_cache_ttl: Duration::from_secs(config.chart_cache_ttl_seconds),
        }
    }
}

/// Result of one sensor tick.
#[derive(Debug, Clone, Default, Serialize, ToSchema)]
pub struct TickReport {
    /// Sensors whose reading, log row and any alert were all written
    pub updated: usize,
    /// Sensors without a current reading
    pub skipped: usize,
    pub failed: Vec<TickFailure>,
    /// Alerts created during this tick
    pub alerts: Vec<Alert>,
}

impl TickReport {
    /// A tick where sensors were attempted and none succeeded.
    #[must_use]
    pub fn is_total_failure(&self) -> bool {
        self.updated == 0 && !self.failed.is_empty()
    }
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct TickFailure {
    pub sensor_id: i64,
    pub error: String,
}

/// Owns the dashboard session and keeps it in step with the remote store.
///
/// Every refresh fetches a whole collection and replaces the session's copy,
/// so refreshes started by timers, change notifications and manual requests
/// may overlap and finish in any order. Results that arrive after
/// [`Synchronizer::dispose`] are dropped.
pub struct Synchronizer {
    store: Arc<dyn RemoteStore>,
    auth: Arc<dyn AuthProvider>,
    feed: Arc<dyn ChangeFeed>,
    notifier: Arc<dyn Notifier>,
    readings: Mutex<Box<dyn ReadingSource>>,
    session: RwLock<DashboardSession>,
    options: SyncOptions,
    alive: CancellationToken,
    subscriptions: AsyncMutex<Subscriptions>,
    queue: mpsc::UnboundedSender<RefreshTask>,
    queue_rx: Mutex<Option<mpsc::UnboundedReceiver<RefreshTask>>>,
    chart_cache: ChartCache,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl Synchronizer {
    #[must_use]
    pub fn new(
        store: Arc<dyn RemoteStore>,
        auth: Arc<dyn AuthProvider>,
        feed: Arc<dyn ChangeFeed>,
        notifier: Arc<dyn Notifier>,
        readings: Box<dyn ReadingSource>,
        options: SyncOptions,
    ) -> Self {
        let (queue, queue_rx) = mpsc::unbounded_channel();
        Self {
            store,
            auth,
            feed,
            notifier,
            readings: Mutex::new(readings),
            session: RwLock::new(DashboardSession::new(options.default_range)),
            chart_cache: ChartCache::new(options.chart_cache_ttl),
            options,
            alive: CancellationToken::new(),
            subscriptions: AsyncMutex::new(Subscriptions::new()),
            queue,
            queue_rx: Mutex::new(Some(queue_rx)),
            tasks: Mutex::new(Vec::new()),
        }
    }

    #[must_use]
    pub fn is_alive(&self) -> bool {
        !self.alive.is_cancelled()
    }

    /// Token cancelled when the synchronizer is disposed.
    #[must_use]
    pub fn liveness(&self) -> CancellationToken {
        self.alive.clone()
    }

    /// Write access to the session, or `None` once disposal has started.
    /// Liveness is checked after the lock is held, so a dispose that lands
    /// while waiting for the lock still wins.
    async fn live_session(&self) -> Option<RwLockWriteGuard<'_, DashboardSession>> {
        let guard = self.session.write().await;
        self.is_alive().then_some(guard)
    }

    // ---- refreshes ----

    /// Replace the sensor collection with the store's current rows.
    ///
    /// # Errors
    ///
    /// Returns the store error; the previous collection is kept.
    pub async fn refresh_sensors(&self) -> AppResult<()> {
        let sensors = self.store.list_sensors().await.inspect_err(|e| {
            tracing::warn!(error = %e, "Sensor refresh failed, keeping previous sensors");
        })?;
        let Some(mut guard) = self.live_session().await else {
            return Ok(());
        };
        let session = &mut *guard;
        session.sensors = sensors;
        session.last_update = Some(Utc::now());
        // alert names follow renamed or newly loaded sensors
        for view in &mut session.alerts {
            view.sensor = session
                .sensors
                .iter()
                .find(|s| s.id == view.alert.sensor_id)
                .map_or_else(|| Sensor::fallback_name(view.alert.sensor_id), |s| s.name.clone());
        }

        tracing::debug!(count = session.sensors.len(), "Sensors refreshed");
        Ok(())
    }

    /// Replace the alert collection with the most recent alerts, newest first.
    ///
    /// # Errors
    ///
    /// Returns the store error; the previous collection is kept.
    pub async fn refresh_alerts(&self) -> AppResult<()> {
        let alerts = self
            .store
            .list_recent_alerts(self.options.alert_limit)
            .await
            .inspect_err(|e| {
                tracing::warn!(error = %e, "Alert refresh failed, keeping previous alerts");
            })?;
        let Some(mut session) = self.live_session().await else {
            return Ok(());
        };
        let offset = self.options.display_offset;
        let views: Vec<AlertView> = alerts
            .into_iter()
            .map(|alert| AlertView::new(alert, &session.sensors, offset))
            .collect();
        session.alerts = views;

        tracing::debug!(
            count = session.alerts.len(),
            unresolved = session.unresolved_alert_count(),
            "Alerts refreshed"
        );
        Ok(())
    }

    /// Fetch the logs inside `range` and rebuild the chart. Results for a
    /// range that is no longer selected are discarded.
    ///
    /// # Errors
    ///
    /// Returns the store error; the previous logs and chart are kept.
    pub async fn refresh_temperature_logs(&self, range: TimeRange) -> AppResult<()> {
        let logs = self.fetch_logs(range).await.inspect_err(|e| {
            tracing::warn!(range = %range, error = %e, "Log refresh failed, keeping previous chart");
        })?;
        if !self.is_alive() {
            return Ok(());
        }

        let chart = build_chart_points(&logs, range, self.options.display_offset);

        let Some(mut session) = self.live_session().await else {
            return Ok(());
        };
        if session.range != range {
            tracing::debug!(
                fetched = %range,
                selected = %session.range,
                "Discarding logs for a superseded range"
            );
            return Ok(());
        }
        tracing::debug!(range = %range, logs = logs.len(), points = chart.len(), "Logs refreshed");
        session.logs = logs;
        session.chart = chart;
        Ok(())
    }

    /// Load the settings row, falling back to defaults when none exists.
    ///
    /// # Errors
    ///
    /// Returns the store error; the previous settings are kept.
    pub async fn refresh_settings(&self) -> AppResult<()> {
        let settings = self.store.fetch_settings().await.inspect_err(|e| {
            tracing::warn!(error = %e, "Settings refresh failed");
        })?;
        let Some(mut session) = self.live_session().await else {
            return Ok(());
        };
        if settings.is_none() {
            tracing::info!("No settings row, using defaults");
        }
        session.settings = settings.unwrap_or_default();
        Ok(())
    }

    /// Reload the signed-in user's profile, or clear it when signed out.
    ///
    /// # Errors
    ///
    /// Returns the store error; the profile is cleared so role checks fail
    /// closed.
    pub async fn refresh_profile(&self) -> AppResult<()> {
        let Some(auth) = self.session.read().await.auth.clone() else {
            self.session.write().await.profile = None;
            return Ok(());
        };

        let result = self.store.fetch_profile(&auth, auth.user_id).await;
        let Some(mut session) = self.live_session().await else {
            return Ok(());
        };
        // the user may have signed out while the profile was loading
        if session.auth.as_ref().map(|a| a.user_id) != Some(auth.user_id) {
            return Ok(());
        }
        match result {
            Ok(profile) => {
                tracing::debug!(user_id = %auth.user_id, role = ?profile.as_ref().map(|p| p.role), "Profile refreshed");
                session.profile = profile;
                Ok(())
            }
            Err(e) => {
                tracing::warn!(user_id = %auth.user_id, error = %e, "Profile refresh failed");
                session.profile = None;
                Err(e)
            }
        }
    }

    /// Sensors, alerts and logs for the selected range, concurrently.
    ///
    /// # Errors
    ///
    /// The first failing refresh's error. The others still apply.
    pub async fn refresh_all(&self) -> AppResult<()> {
        let range = self.range().await;
        let (sensors, alerts, logs) = tokio::join!(
            self.refresh_sensors(),
            self.refresh_alerts(),
            self.refresh_temperature_logs(range),
        );
        sensors.and(alerts).and(logs)
    }

    /// Manual refresh: each collection goes through the retry policy
    /// independently.
    ///
    /// # Errors
    ///
    /// The first error left after every collection exhausted its attempts.
    pub async fn refresh_all_with_retry(&self) -> AppResult<()> {
        let policy = self.options.retry;
        self.session.write().await.loading = true;

        let (sensors, alerts, logs) = tokio::join!(
            retry_with_backoff(policy, "refresh_sensors", || self.refresh_sensors()),
            retry_with_backoff(policy, "refresh_alerts", || self.refresh_alerts()),
            retry_with_backoff(policy, "refresh_temperature_logs", || async {
                let range = self.range().await;
                self.refresh_temperature_logs(range).await
            }),
        );

        self.session.write().await.loading = false;
        sensors.and(alerts).and(logs)
    }

    /// Chart points for `range`. The selected range comes from the session;
    /// other ranges are built on demand and cached.
    ///
    /// # Errors
    ///
    /// Fails when the logs for an uncached range cannot be fetched.
    pub async fn chart_for(&self, range: TimeRange) -> AppResult<Vec<ChartPoint>> {
        {
            let session = self.session.read().await;
            if session.range == range {
                return Ok(session.chart.clone());
            }
        }

        let offset = self.options.display_offset;
        let points = self
            .chart_cache
            .get_or_build(range, async move {
                let logs = self.fetch_logs(range).await?;
                Ok(build_chart_points(&logs, range, offset))
            })
            .await?;
        Ok(points.as_ref().clone())
    }

    async fn fetch_logs(&self, range: TimeRange) -> AppResult<Vec<TemperatureLog>> {
        let since = Utc::now() - range.window();
        self.store.list_temperature_logs(since).await
    }

    // ---- ticks ----

    /// Advance every sensor with a current reading by one step: write the new
    /// temperature, append a log row, and raise an alert when the reading
    /// leaves the sensor's thresholds. Sensors are processed concurrently and
    /// independently; a failure on one does not affect the others.
    ///
    /// # Errors
    ///
    /// `PermissionDenied` when nobody is signed in. Per-sensor failures are
    /// reported in the [`TickReport`], not as an error.
    pub async fn apply_sensor_tick(&self) -> AppResult<TickReport> {
        let auth = self.require_session().await?;
        let sensors = self.session.read().await.sensors.clone();

        let planned: Vec<(Sensor, f64)> = {
            let mut source = self.readings.lock().unwrap_or_else(PoisonError::into_inner);
            sensors
                .iter()
                .filter_map(|s| source.next_reading(s).map(|t| (s.clone(), t)))
                .collect()
        };

        let mut report = TickReport {
            skipped: sensors.len() - planned.len(),
            ..TickReport::default()
        };

        let outcomes = join_all(
            planned
                .iter()
                .map(|(sensor, temperature)| self.tick_sensor(&auth, sensor, *temperature)),
        )
        .await;

        for ((sensor, _), outcome) in planned.iter().zip(outcomes) {
            match outcome {
                Ok(alert) => {
                    report.updated += 1;
                    report.alerts.extend(alert);
                }
                Err(e) => {
                    tracing::warn!(sensor_id = sensor.id, error = %e, "Sensor tick failed");
                    report.failed.push(TickFailure {
                        sensor_id: sensor.id,
                        error: e.to_string(),
                    });
                }
            }
        }

        tracing::debug!(
            updated = report.updated,
            skipped = report.skipped,
            failed = report.failed.len(),
            alerts = report.alerts.len(),
            "Sensor tick complete"
        );

        if report.updated > 0
            && self.is_alive()
            && let Err(e) = self.refresh_sensors().await
        {
            tracing::warn!(error = %e, "Sensor reload after tick failed");
        }
        Ok(report)
    }

    async fn tick_sensor(
        &self,
        auth: &AuthSession,
        sensor: &Sensor,
        temperature: f64,
    ) -> AppResult<Option<Alert>> {
        let now = Utc::now();

        self.store
            .update_sensor_temperature(
                auth,
                sensor.id,
                &TemperaturePatch {
                    temperature,
                    updated_at: now,
                },
            )
            .await?;

        self.store
            .insert_temperature_log(
                auth,
                &NewTemperatureLog {
                    sensor_id: sensor.id,
                    temperature,
                    logged_at: now,
                },
            )
            .await?;

        let Some(kind) = AlertKind::for_reading(temperature, sensor.min_threshold, sensor.max_threshold)
        else {
            return Ok(None);
        };

        let alert = self
            .store
            .insert_alert(
                auth,
                &NewAlert {
                    sensor_id: sensor.id,
                    kind,
                    temperature,
                    status: AlertStatus::Unresolved,
                },
            )
            .await?;

        tracing::info!(sensor_id = sensor.id, temperature, kind = ?kind, alert_id = alert.id, "Alert raised");

        if self.is_alive() {
            self.notifier.notify(&AlertNotice {
                sensor_id: sensor.id,
                sensor_name: sensor.name.clone(),
                temperature,
                kind,
            });
        }
        Ok(Some(alert))
    }

    // ---- administrator writes ----

    /// Set one sensor's thresholds and reload the sensors.
    ///
    /// # Errors
    ///
    /// `PermissionDenied` unless an administrator is signed in,
    /// `InvalidRange` unless `min < max` (both checked before any write),
    /// `NotFound` when no row was updated, or the store error.
    pub async fn update_threshold(&self, sensor_id: i64, min: f64, max: f64) -> AppResult<Sensor> {
        let auth = self.require_admin().await?;
        let edit = ThresholdEdit { min, max };
        edit.validate(sensor_id)?;

        let sensor = self.write_thresholds(&auth, sensor_id, edit).await?;
        if let Err(e) = self.refresh_sensors().await {
            tracing::warn!(sensor_id, error = %e, "Thresholds saved but sensor reload failed");
        }
        Ok(sensor)
    }

    /// Save every pair in `form`. The whole form is validated first; nothing
    /// is written when any pair is invalid. Individual write failures are
    /// collected in the report.
    ///
    /// # Errors
    ///
    /// `PermissionDenied` or `InvalidRange`, before any write.
    pub async fn save_thresholds(&self, form: &ThresholdForm) -> AppResult<ThresholdSaveReport> {
        let auth = self.require_admin().await?;
        form.validate()?;

        let outcomes = join_all(
            form.thresholds
                .iter()
                .map(|(id, edit)| self.write_thresholds(&auth, *id, *edit)),
        )
        .await;

        let mut report = ThresholdSaveReport::default();
        for (id, outcome) in form.thresholds.keys().zip(outcomes) {
            match outcome {
                Ok(_) => report.saved.push(*id),
                Err(e) => report.failed.push(ThresholdFailure {
                    sensor_id: *id,
                    error: e.to_string(),
                }),
            }
        }

        tracing::info!(saved = report.saved.len(), failed = report.failed.len(), "Thresholds saved");

        if !report.saved.is_empty()
            && let Err(e) = self.refresh_sensors().await
        {
            tracing::warn!(error = %e, "Thresholds saved but sensor reload failed");
        }
        Ok(report)
    }

    async fn write_thresholds(&self, auth: &AuthSession, sensor_id: i64, edit: ThresholdEdit) -> AppResult<Sensor> {
        let rows = self
            .store
            .update_thresholds(
                auth,
                sensor_id,
                &ThresholdPatch {
                    min_threshold: edit.min,
                    max_threshold: edit.max,
                    updated_at: Utc::now(),
                },
            )
            .await?;

        rows.into_iter()
            .next()
            .ok_or_else(|| AppError::NotFound(format!("sensor {sensor_id} was not updated")))
    }

    /// Mark an unresolved alert resolved by the signed-in administrator.
    ///
    /// # Errors
    ///
    /// `PermissionDenied` unless an administrator is signed in, `NotFound`
    /// when the alert is missing or already resolved, or the store error.
    pub async fn resolve_alert(&self, alert_id: i64) -> AppResult<Alert> {
        let auth = self.require_admin().await?;

        let rows = self
            .store
            .resolve_alert(
                &auth,
                alert_id,
                &AlertResolution {
                    status: AlertStatus::Resolved,
                    resolved_at: Utc::now(),
                    resolved_by: auth.user_id,
                },
            )
            .await?;

        let Some(alert) = rows.into_iter().next() else {
            tracing::warn!(alert_id, "No alert updated; missing, hidden or already resolved");
            return Err(AppError::NotFound(format!(
                "alert {alert_id} not found or already resolved"
            )));
        };

        tracing::info!(alert_id, resolved_by = %auth.user_id, "Alert resolved");
        if let Err(e) = self.refresh_alerts().await {
            tracing::warn!(alert_id, error = %e, "Alert resolved but alert reload failed");
        }
        Ok(alert)
    }

    /// Replace the notification settings.
    ///
    /// # Errors
    ///
    /// `PermissionDenied` unless an administrator is signed in, or the store
    /// error.
    pub async fn update_settings(&self, settings: Settings) -> AppResult<Settings> {
        let auth = self.require_admin().await?;

        let mut settings = settings.normalized();
        settings.updated_at = Some(Utc::now());
        self.store.update_settings(&auth, &settings).await?;

        if self.is_alive() {
            self.session.write().await.settings = settings.clone();
        }
        tracing::info!(
            emails = settings.notification_emails.len(),
            phones = settings.notification_phones.len(),
            "Settings updated"
        );
        Ok(settings)
    }

    // ---- session ----

    /// # Errors
    ///
    /// `AuthError` when the credentials are rejected.
    pub async fn sign_in(&self, email: &str, password: &str) -> AppResult<AuthSession> {
        let auth = self.auth.sign_in(email, password).await?;
        tracing::info!(user_id = %auth.user_id, "Signed in");

        {
            let mut session = self.session.write().await;
            session.auth = Some(auth.clone());
            session.profile = None;
        }
        if let Err(e) = self.refresh_profile().await {
            tracing::warn!(error = %e, "Signed in without a profile");
        }
        Ok(auth)
    }

    /// # Errors
    ///
    /// `BadRequest` for an empty email or password, `AuthError` when the
    /// platform refuses the registration.
    pub async fn sign_up(&self, email: &str, password: &str) -> AppResult<()> {
        if email.trim().is_empty() || password.is_empty() {
            return Err(AppError::BadRequest("email and password are required".into()));
        }
        self.auth.sign_up(email.trim(), password).await?;
        tracing::info!("Registration submitted");
        Ok(())
    }

    /// Sign out and drop the profile. Signing out while signed out is a no-op.
    ///
    /// # Errors
    ///
    /// `AuthError` when the platform rejects the sign-out; the session is
    /// kept in that case.
    pub async fn sign_out(&self) -> AppResult<()> {
        let Some(auth) = self.session.read().await.auth.clone() else {
            return Ok(());
        };
        self.auth.sign_out(&auth).await?;

        let mut session = self.session.write().await;
        session.auth = None;
        session.profile = None;
        tracing::info!(user_id = %auth.user_id, "Signed out");
        Ok(())
    }

    /// Select a chart range and load its logs.
    ///
    /// # Errors
    ///
    /// The log fetch error. The range stays selected.
    pub async fn set_range(&self, range: TimeRange) -> AppResult<()> {
        {
            let mut session = self.session.write().await;
            if session.range == range && !session.chart.is_empty() {
                return Ok(());
            }
            session.range = range;
        }
        tracing::debug!(range = %range, "Range selected");
        self.refresh_temperature_logs(range).await
    }

    async fn require_session(&self) -> AppResult<AuthSession> {
        self.session
            .read()
            .await
            .auth
            .clone()
            .ok_or_else(|| AppError::PermissionDenied("sign in required".into()))
    }

    async fn require_admin(&self) -> AppResult<AuthSession> {
        let session = self.session.read().await;
        match (&session.auth, &session.profile) {
            (Some(auth), Some(profile)) if profile.is_admin() => Ok(auth.clone()),
            (None, _) => Err(AppError::PermissionDenied("sign in required".into())),
            _ => Err(AppError::PermissionDenied("administrator role required".into())),
        }
    }

    // ---- lifecycle ----

    /// Load sensors, alerts, settings, logs and profile. Bounded by the
    /// initial-load watchdog; `loading` is cleared whatever the outcome.
    ///
    /// # Errors
    ///
    /// The first refresh error, or `FetchFailed` when the watchdog fired.
    pub async fn initial_load(&self) -> AppResult<()> {
        self.session.write().await.loading = true;
        let range = self.range().await;

        let load = async {
            let (sensors, alerts, settings, logs, profile) = tokio::join!(
                self.refresh_sensors(),
                self.refresh_alerts(),
                self.refresh_settings(),
                self.refresh_temperature_logs(range),
                self.refresh_profile(),
            );
            sensors.and(alerts).and(settings).and(logs).and(profile)
        };

        let outcome = match tokio::time::timeout(self.options.initial_load_timeout, load).await {
            Ok(result) => result,
            Err(_) => {
                tracing::warn!(
                    timeout_secs = self.options.initial_load_timeout.as_secs(),
                    "Initial load watchdog fired, continuing with partial data"
                );
                Err(AppError::FetchFailed("initial load timed out".into()))
            }
        };

        self.session.write().await.loading = false;
        match &outcome {
            Ok(()) => tracing::info!("Initial load complete"),
            Err(e) => tracing::warn!(error = %e, "Initial load incomplete"),
        }
        outcome
    }

    /// Initial load, then the change subscriptions, then the dispatcher that
    /// turns notifications into refreshes. Subscribe failures are logged and
    /// leave the channel closed.
    pub async fn start(self: &Arc<Self>) {
        if !self.is_alive() {
            return;
        }
        let _ = self.initial_load().await;
        self.subscribe().await;

        let receiver = self
            .queue_rx
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(receiver) = receiver {
            let handle = tokio::spawn(Arc::clone(self).run_dispatcher(receiver));
            self.track(handle);
        }
    }

    /// Open any change channel that is not currently subscribed.
    pub async fn subscribe(&self) {
        if !self.is_alive() {
            return;
        }
        self.subscriptions
            .lock()
            .await
            .subscribe_all(self.feed.as_ref(), &self.queue, &self.alive)
            .await;
    }

    /// Start the polling refresh and the sensor tick. A zero interval leaves
    /// that timer off. Nothing is scheduled after disposal.
    pub fn spawn_timers(self: &Arc<Self>, poll_every: Duration, tick_every: Duration) {
        if !self.is_alive() {
            return;
        }
        if !poll_every.is_zero() {
            self.track(tokio::spawn(scheduler::run_polling_refresh(Arc::clone(self), poll_every)));
        }
        if !tick_every.is_zero() {
            self.track(tokio::spawn(scheduler::run_sensor_tick(Arc::clone(self), tick_every)));
        }
    }

    fn track(&self, handle: JoinHandle<()>) {
        self.tasks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(handle);
    }

    async fn run_dispatcher(self: Arc<Self>, mut receiver: mpsc::UnboundedReceiver<RefreshTask>) {
        tracing::debug!("Refresh dispatcher started");
        loop {
            let first = tokio::select! {
                () = self.alive.cancelled() => break,
                task = receiver.recv() => task,
            };
            let Some(first) = first else { break };

            // coalesce notifications that piled up during the last refresh
            let mut pending = vec![first];
            while let Ok(task) = receiver.try_recv() {
                if !pending.contains(&task) {
                    pending.push(task);
                }
            }

            for task in pending {
                if !self.is_alive() {
                    break;
                }
                let result = match task {
                    RefreshTask::Sensors => self.refresh_sensors().await,
                    RefreshTask::Alerts => self.refresh_alerts().await,
                    RefreshTask::TemperatureLogs => {
                        self.chart_cache.invalidate_all();
                        let range = self.range().await;
                        self.refresh_temperature_logs(range).await
                    }
                };
                if let Err(e) = result {
                    tracing::debug!(task = ?task, error = %e, "Queued refresh failed");
                }
            }
        }
        tracing::debug!("Refresh dispatcher stopped");
    }

    /// Tear down: stop timers and the dispatcher, close every channel. Any
    /// refresh still in flight finishes without touching the session.
    /// Calling this more than once is harmless.
    pub async fn dispose(&self) {
        if self.alive.is_cancelled() {
            return;
        }
        tracing::info!("Disposing synchronizer");
        self.alive.cancel();

        self.subscriptions.lock().await.unsubscribe_all().await;

        let handles: Vec<JoinHandle<()>> = self
            .tasks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .drain(..)
            .collect();
        for handle in handles {
            if let Err(e) = handle.await {
                tracing::warn!(error = %e, "Background task ended abnormally");
            }
        }
        tracing::info!("Synchronizer disposed");
    }

    // ---- queries ----

    /// Copy of the whole session.
    pub async fn snapshot(&self) -> DashboardSession {
        self.session.read().await.clone()
    }

    pub async fn sensors(&self) -> Vec<Sensor> {
        self.session.read().await.sensors.clone()
    }

    pub async fn alerts(&self) -> Vec<AlertView> {
        self.session.read().await.alerts.clone()
    }

    pub async fn logs(&self) -> Vec<TemperatureLog> {
        self.session.read().await.logs.clone()
    }

    pub async fn settings(&self) -> Settings {
        self.session.read().await.settings.clone()
    }

    pub async fn range(&self) -> TimeRange {
        self.session.read().await.range
    }

    pub async fn auth_session(&self) -> Option<AuthSession> {
        self.session.read().await.auth.clone()
    }

    pub async fn profile(&self) -> Option<Profile> {
        self.session.read().await.profile.clone()
    }

    pub async fn last_update(&self) -> Option<DateTime<Utc>> {
        self.session.read().await.last_update
    }

    pub async fn unresolved_alert_count(&self) -> usize {
        self.session.read().await.unresolved_alert_count()
    }

    pub async fn channel_statuses(&self) -> Vec<ChannelStatus> {
        self.subscriptions.lock().await.statuses()
    }

    #[must_use]
    pub fn display_offset(&self) -> FixedOffset {
        self.options.display_offset
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::SensorStatus;
    use crate::services::notifier::LogNotifier;
    use crate::supabase::ManualChangeFeed;
    use crate::sync::readings::FixedReadings;
    use async_trait::async_trait;
    use uuid::Uuid;

    /// Serves one sensor; every other call is refused.
    struct OneSensorStore;

    fn refused<T>() -> AppResult<T> {
        Err(AppError::FetchFailed("not served".into()))
    }

    #[async_trait]
    impl RemoteStore for OneSensorStore {
        async fn list_sensors(&self) -> AppResult<Vec<Sensor>> {
            Ok(vec![Sensor {
                id: 1,
                name: "Freezer A".to_string(),
                temperature: Some(-18.0),
                min_threshold: -30.0,
                max_threshold: -15.0,
                status: SensorStatus::Active,
                updated_at: None,
            }])
        }
        async fn list_recent_alerts(&self, _limit: usize) -> AppResult<Vec<Alert>> {
            refused()
        }
        async fn list_temperature_logs(&self, _since: DateTime<Utc>) -> AppResult<Vec<TemperatureLog>> {
            refused()
        }
        async fn fetch_settings(&self) -> AppResult<Option<Settings>> {
            refused()
        }
        async fn update_settings(&self, _auth: &AuthSession, _settings: &Settings) -> AppResult<()> {
            refused()
        }
        async fn update_sensor_temperature(
            &self,
            _auth: &AuthSession,
            _sensor_id: i64,
            _patch: &TemperaturePatch,
        ) -> AppResult<()> {
            refused()
        }
        async fn insert_temperature_log(&self, _auth: &AuthSession, _log: &NewTemperatureLog) -> AppResult<()> {
            refused()
        }
        async fn insert_alert(&self, _auth: &AuthSession, _alert: &NewAlert) -> AppResult<Alert> {
            refused()
        }
        async fn update_thresholds(
            &self,
            _auth: &AuthSession,
            _sensor_id: i64,
            _patch: &ThresholdPatch,
        ) -> AppResult<Vec<Sensor>> {
            refused()
        }
        async fn resolve_alert(
            &self,
            _auth: &AuthSession,
            _alert_id: i64,
            _resolution: &AlertResolution,
        ) -> AppResult<Vec<Alert>> {
            refused()
        }
        async fn fetch_profile(&self, _auth: &AuthSession, _user_id: Uuid) -> AppResult<Option<Profile>> {
            refused()
        }
        async fn change_marker(&self, _collection: crate::supabase::Collection) -> AppResult<String> {
            refused()
        }
    }

    struct NoAuth;

    #[async_trait]
    impl AuthProvider for NoAuth {
        async fn sign_in(&self, _email: &str, _password: &str) -> AppResult<AuthSession> {
            Err(AppError::AuthError("no accounts".into()))
        }
        async fn sign_up(&self, _email: &str, _password: &str) -> AppResult<()> {
            Err(AppError::AuthError("no accounts".into()))
        }
        async fn sign_out(&self, _auth: &AuthSession) -> AppResult<()> {
            Ok(())
        }
    }

    fn synchronizer() -> Arc<Synchronizer> {
        Arc::new(Synchronizer::new(
            Arc::new(OneSensorStore),
            Arc::new(NoAuth),
            Arc::new(ManualChangeFeed::new()),
            Arc::new(LogNotifier::new(false)),
            Box::new(FixedReadings::new(Vec::<(i64, f64)>::new())),
            SyncOptions::default(),
        ))
    }

    #[tokio::test]
    async fn refresh_applies_when_alive() {
        let sync = synchronizer();
        sync.refresh_sensors().await.unwrap();
        assert_eq!(sync.sensors().await.len(), 1);
    }

    #[tokio::test]
    async fn dispose_while_waiting_for_session_lock_drops_result() {
        let sync = synchronizer();
        let held = sync.session.write().await;

        let pending = tokio::spawn({
            let sync = Arc::clone(&sync);
            async move { sync.refresh_sensors().await }
        });
        // let the refresh fetch and queue up behind the held lock
        tokio::time::sleep(Duration::from_millis(20)).await;
        sync.alive.cancel();
        drop(held);

        pending.await.unwrap().unwrap();
        assert!(sync.sensors().await.is_empty());
        assert!(sync.last_update().await.is_none());
    }
}
