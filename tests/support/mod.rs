//! In-memory platform used by the integration tests.

#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;
use uuid::Uuid;

use coldwatch::entity::{
    Alert, AlertKind, AlertResolution, AlertStatus, NewAlert, NewTemperatureLog, Profile, Role,
    Sensor, SensorStatus, Settings, TemperatureLog, TemperaturePatch, ThresholdPatch,
};
use coldwatch::error::{AppError, AppResult};
use coldwatch::services::notifier::{AlertNotice, Notifier};
use coldwatch::services::retry::RetryPolicy;
use coldwatch::supabase::{
    AuthProvider, AuthSession, ChangeFeed, ChangeNotification, Collection, ManualChangeFeed, RemoteStore,
};
use coldwatch::sync::{ReadingSource, SyncOptions, Synchronizer};

pub const ADMIN_EMAIL: &str = "admin@example.com";
pub const USER_EMAIL: &str = "operator@example.com";
pub const PASSWORD: &str = "correct horse";

#[derive(Default)]
pub struct Tables {
    pub sensors: Vec<Sensor>,
    pub alerts: Vec<Alert>,
    pub logs: Vec<TemperatureLog>,
    pub settings: Option<Settings>,
    pub profiles: HashMap<Uuid, Profile>,
}

/// Remote store backed by vectors, with switches for injecting failures.
#[derive(Default)]
pub struct MemoryStore {
    pub tables: Mutex<Tables>,
    /// Every read fails while set
    pub fail_reads: Mutex<bool>,
    /// The next N reads fail, then reads succeed again
    pub transient_read_failures: AtomicU32,
    /// Temperature writes for these sensors fail
    pub failing_sensors: Mutex<HashSet<i64>>,
    /// Delay applied to every sensor read
    pub read_delay: Mutex<Option<Duration>>,
    pub threshold_writes: AtomicUsize,
    pub settings_writes: AtomicUsize,
    pub resolve_calls: AtomicUsize,
    pub marker_polls: AtomicUsize,
}

impl MemoryStore {
    pub fn with_sensors(sensors: Vec<Sensor>) -> Arc<Self> {
        let store = Self::default();
        store.tables.lock().unwrap().sensors = sensors;
        Arc::new(store)
    }

    pub fn set_fail_reads(&self, fail: bool) {
        *self.fail_reads.lock().unwrap() = fail;
    }

    pub fn add_alert(&self, sensor_id: i64, kind: AlertKind, temperature: f64, status: AlertStatus) -> Alert {
        let mut tables = self.tables.lock().unwrap();
        let id = tables.alerts.iter().map(|a| a.id).max().unwrap_or(0) + 1;
        let now = Utc::now();
        let alert = Alert {
            id,
            sensor_id,
            kind,
            temperature,
            status,
            created_at: now,
            resolved_at: (status == AlertStatus::Resolved).then_some(now),
            resolved_by: None,
        };
        tables.alerts.push(alert.clone());
        alert
    }

    pub fn add_log(&self, sensor_id: i64, temperature: f64, logged_at: DateTime<Utc>) {
        let mut tables = self.tables.lock().unwrap();
        let id = tables.logs.iter().map(|l| l.id).max().unwrap_or(0) + 1;
        tables.logs.push(TemperatureLog {
            id,
            sensor_id,
            temperature,
            logged_at,
        });
    }

    pub fn alerts(&self) -> Vec<Alert> {
        self.tables.lock().unwrap().alerts.clone()
    }

    pub fn logs_for(&self, sensor_id: i64) -> usize {
        self.tables
            .lock()
            .unwrap()
            .logs
            .iter()
            .filter(|l| l.sensor_id == sensor_id)
            .count()
    }

    pub fn sensor(&self, sensor_id: i64) -> Option<Sensor> {
        self.tables
            .lock()
            .unwrap()
            .sensors
            .iter()
            .find(|s| s.id == sensor_id)
            .cloned()
    }

    fn check_read(&self) -> AppResult<()> {
        if *self.fail_reads.lock().unwrap() {
            return Err(AppError::FetchFailed("connection refused".into()));
        }
        let consumed = self
            .transient_read_failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1));
        if consumed.is_ok() {
            return Err(AppError::FetchFailed("connection reset".into()));
        }
        Ok(())
    }
}

#[async_trait]
impl RemoteStore for MemoryStore {
    async fn list_sensors(&self) -> AppResult<Vec<Sensor>> {
        let delay = *self.read_delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        self.check_read()?;
        let mut sensors = self.tables.lock().unwrap().sensors.clone();
        sensors.sort_by_key(|s| s.id);
        Ok(sensors)
    }

    async fn list_recent_alerts(&self, limit: usize) -> AppResult<Vec<Alert>> {
        self.check_read()?;
        let mut alerts = self.tables.lock().unwrap().alerts.clone();
        alerts.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        alerts.truncate(limit);
        Ok(alerts)
    }

    async fn list_temperature_logs(&self, since: DateTime<Utc>) -> AppResult<Vec<TemperatureLog>> {
        self.check_read()?;
        let mut logs: Vec<TemperatureLog> = self
            .tables
            .lock()
            .unwrap()
            .logs
            .iter()
            .filter(|l| l.logged_at >= since)
            .cloned()
            .collect();
        logs.sort_by_key(|l| l.logged_at);
        Ok(logs)
    }

    async fn fetch_settings(&self) -> AppResult<Option<Settings>> {
        self.check_read()?;
        Ok(self.tables.lock().unwrap().settings.clone())
    }

    async fn update_settings(&self, _auth: &AuthSession, settings: &Settings) -> AppResult<()> {
        self.settings_writes.fetch_add(1, Ordering::SeqCst);
        self.tables.lock().unwrap().settings = Some(settings.clone());
        Ok(())
    }

    async fn update_sensor_temperature(
        &self,
        _auth: &AuthSession,
        sensor_id: i64,
        patch: &TemperaturePatch,
    ) -> AppResult<()> {
        if self.failing_sensors.lock().unwrap().contains(&sensor_id) {
            return Err(AppError::FetchFailed(format!("sensor {sensor_id} write timed out")));
        }
        let mut tables = self.tables.lock().unwrap();
        if let Some(sensor) = tables.sensors.iter_mut().find(|s| s.id == sensor_id) {
            sensor.temperature = Some(patch.temperature);
            sensor.updated_at = Some(patch.updated_at);
        }
        Ok(())
    }

    async fn insert_temperature_log(&self, _auth: &AuthSession, log: &NewTemperatureLog) -> AppResult<()> {
        self.add_log(log.sensor_id, log.temperature, log.logged_at);
        Ok(())
    }

    async fn insert_alert(&self, _auth: &AuthSession, alert: &NewAlert) -> AppResult<Alert> {
        Ok(self.add_alert(alert.sensor_id, alert.kind, alert.temperature, alert.status))
    }

    async fn update_thresholds(
        &self,
        _auth: &AuthSession,
        sensor_id: i64,
        patch: &ThresholdPatch,
    ) -> AppResult<Vec<Sensor>> {
        self.threshold_writes.fetch_add(1, Ordering::SeqCst);
        let mut tables = self.tables.lock().unwrap();
        Ok(tables
            .sensors
            .iter_mut()
            .filter(|s| s.id == sensor_id)
            .map(|s| {
                s.min_threshold = patch.min_threshold;
                s.max_threshold = patch.max_threshold;
                s.updated_at = Some(patch.updated_at);
                s.clone()
            })
            .collect())
    }

    async fn resolve_alert(
        &self,
        _auth: &AuthSession,
        alert_id: i64,
        resolution: &AlertResolution,
    ) -> AppResult<Vec<Alert>> {
        self.resolve_calls.fetch_add(1, Ordering::SeqCst);
        let mut tables = self.tables.lock().unwrap();
        Ok(tables
            .alerts
            .iter_mut()
            .filter(|a| a.id == alert_id && a.status == AlertStatus::Unresolved)
            .map(|a| {
                a.status = resolution.status;
                a.resolved_at = Some(resolution.resolved_at);
                a.resolved_by = Some(resolution.resolved_by);
                a.clone()
            })
            .collect())
    }

    async fn fetch_profile(&self, _auth: &AuthSession, user_id: Uuid) -> AppResult<Option<Profile>> {
        Ok(self.tables.lock().unwrap().profiles.get(&user_id).cloned())
    }

    async fn change_marker(&self, collection: Collection) -> AppResult<String> {
        self.marker_polls.fetch_add(1, Ordering::SeqCst);
        self.check_read()?;
        let tables = self.tables.lock().unwrap();
        Ok(match collection {
            Collection::Sensors => format!("{:?}", tables.sensors),
            Collection::Alerts => format!("{:?}", tables.alerts),
            Collection::TemperatureLogs => tables.logs.len().to_string(),
        })
    }
}

/// Accounts keyed by email; profiles are registered in the store.
pub struct MemoryAuth {
    accounts: Mutex<HashMap<String, Uuid>>,
    pub sign_outs: AtomicUsize,
}

impl MemoryAuth {
    /// One admin and one regular account, both with [`PASSWORD`].
    pub fn with_accounts(store: &MemoryStore) -> Arc<Self> {
        let mut accounts = HashMap::new();
        let mut tables = store.tables.lock().unwrap();
        for (email, role) in [(ADMIN_EMAIL, Role::Admin), (USER_EMAIL, Role::User)] {
            let id = Uuid::new_v4();
            accounts.insert(email.to_string(), id);
            tables.profiles.insert(
                id,
                Profile {
                    id,
                    role,
                    email: Some(email.to_string()),
                },
            );
        }
        Arc::new(Self {
            accounts: Mutex::new(accounts),
            sign_outs: AtomicUsize::new(0),
        })
    }
}

#[async_trait]
impl AuthProvider for MemoryAuth {
    async fn sign_in(&self, email: &str, password: &str) -> AppResult<AuthSession> {
        let user_id = self.accounts.lock().unwrap().get(email).copied();
        match user_id {
            Some(user_id) if password == PASSWORD => Ok(AuthSession {
                access_token: format!("token-{user_id}"),
                refresh_token: None,
                user_id,
                email: Some(email.to_string()),
            }),
            _ => Err(AppError::AuthError("Invalid login credentials".into())),
        }
    }

    async fn sign_up(&self, email: &str, _password: &str) -> AppResult<()> {
        let mut accounts = self.accounts.lock().unwrap();
        if accounts.contains_key(email) {
            return Err(AppError::AuthError("User already registered".into()));
        }
        accounts.insert(email.to_string(), Uuid::new_v4());
        Ok(())
    }

    async fn sign_out(&self, _auth: &AuthSession) -> AppResult<()> {
        self.sign_outs.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Collects notices instead of showing them.
#[derive(Default)]
pub struct RecordingNotifier {
    pub notices: Mutex<Vec<AlertNotice>>,
}

impl Notifier for RecordingNotifier {
    fn notify(&self, notice: &AlertNotice) {
        self.notices.lock().unwrap().push(notice.clone());
    }
}

/// Freezer probe with the usual thresholds.
pub fn freezer(id: i64, name: &str, temperature: f64) -> Sensor {
    Sensor {
        id,
        name: name.to_string(),
        temperature: Some(temperature),
        min_threshold: -30.0,
        max_threshold: -15.0,
        status: SensorStatus::Active,
        updated_at: None,
    }
}

pub fn fast_options() -> SyncOptions {
    SyncOptions {
        retry: RetryPolicy::new(3, Duration::from_millis(1)),
        initial_load_timeout: Duration::from_secs(2),
        ..SyncOptions::default()
    }
}

/// Hands out already-closed channels for the first `closed` subscriptions,
/// then delegates to `inner`.
pub struct ClosingFeed {
    pub closed: AtomicUsize,
    pub inner: ManualChangeFeed,
}

impl ClosingFeed {
    pub fn new(closed: usize) -> Arc<Self> {
        Arc::new(Self {
            closed: AtomicUsize::new(closed),
            inner: ManualChangeFeed::new(),
        })
    }
}

#[async_trait]
impl ChangeFeed for ClosingFeed {
    async fn subscribe(&self, collection: Collection) -> AppResult<mpsc::Receiver<ChangeNotification>> {
        let take_closed = self
            .closed
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if take_closed {
            let (_tx, rx) = mpsc::channel(1);
            return Ok(rx);
        }
        self.inner.subscribe(collection).await
    }
}

pub struct Harness {
    pub store: Arc<MemoryStore>,
    pub auth: Arc<MemoryAuth>,
    pub notifier: Arc<RecordingNotifier>,
    pub sync: Arc<Synchronizer>,
}

impl Harness {
    pub fn new(
        sensors: Vec<Sensor>,
        readings: impl ReadingSource + 'static,
        feed: Arc<dyn ChangeFeed>,
    ) -> Self {
        Self::with_options(sensors, readings, feed, fast_options())
    }

    pub fn with_options(
        sensors: Vec<Sensor>,
        readings: impl ReadingSource + 'static,
        feed: Arc<dyn ChangeFeed>,
        options: SyncOptions,
    ) -> Self {
        let store = MemoryStore::with_sensors(sensors);
        let auth = MemoryAuth::with_accounts(&store);
        let notifier = Arc::new(RecordingNotifier::default());
        let sync = Arc::new(Synchronizer::new(
            store.clone(),
            auth.clone(),
            feed,
            notifier.clone(),
            Box::new(readings),
            options,
        ));
        Self {
            store,
            auth,
            notifier,
            sync,
        }
    }

    pub async fn sign_in_admin(&self) {
        self.sync.sign_in(ADMIN_EMAIL, PASSWORD).await.unwrap();
    }

    pub async fn sign_in_user(&self) {
        self.sync.sign_in(USER_EMAIL, PASSWORD).await.unwrap();
    }
}

/// Poll `check` until it holds or a second has passed.
pub async fn eventually<F, Fut>(mut check: F) -> bool
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = bool>,
{
    for _ in 0..100 {
        if check().await {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    false
}
