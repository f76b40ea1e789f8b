use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::entity::{
    Alert, AlertResolution, NewAlert, NewTemperatureLog, Profile, Sensor, Settings,
    TemperatureLog, TemperaturePatch, ThresholdPatch,
};
use crate::error::AppResult;
use crate::supabase::models::AuthSession;

/// Collections the dashboard watches for changes.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum Collection {
    Sensors,
    Alerts,
    TemperatureLogs,
}

impl Collection {
    pub const ALL: [Self; 3] = [Self::Sensors, Self::Alerts, Self::TemperatureLogs];

    #[must_use]
    pub fn table(self) -> &'static str {
        match self {
            Self::Sensors => "sensors",
            Self::Alerts => "alerts",
            Self::TemperatureLogs => "temperature_logs",
        }
    }

    #[must_use]
    pub fn channel_name(self) -> &'static str {
        match self {
            Self::Sensors => "sensors-channel",
            Self::Alerts => "alerts-channel",
            Self::TemperatureLogs => "logs-channel",
        }
    }
}

/// Row access to the hosted collections.
///
/// Reads go out with the anonymous key; writes carry the signed-in user's
/// token so row-level policies apply.
#[async_trait]
pub trait RemoteStore: Send + Sync {
    /// All sensors ordered by id.
    async fn list_sensors(&self) -> AppResult<Vec<Sensor>>;

    /// The `limit` most recent alerts, newest first.
    async fn list_recent_alerts(&self, limit: usize) -> AppResult<Vec<Alert>>;

    /// Log rows captured at or after `since`, oldest first.
    async fn list_temperature_logs(&self, since: DateTime<Utc>) -> AppResult<Vec<TemperatureLog>>;

    /// The singleton settings row, if it exists.
    async fn fetch_settings(&self) -> AppResult<Option<Settings>>;

    async fn update_settings(&self, auth: &AuthSession, settings: &Settings) -> AppResult<()>;

    async fn update_sensor_temperature(
        &self,
        auth: &AuthSession,
        sensor_id: i64,
        patch: &TemperaturePatch,
    ) -> AppResult<()>;

    async fn insert_temperature_log(&self, auth: &AuthSession, log: &NewTemperatureLog) -> AppResult<()>;

    async fn insert_alert(&self, auth: &AuthSession, alert: &NewAlert) -> AppResult<Alert>;

    /// Returns the updated rows; empty when the sensor does not exist or the
    /// policy hid it.
    async fn update_thresholds(
        &self,
        auth: &AuthSession,
        sensor_id: i64,
        patch: &ThresholdPatch,
    ) -> AppResult<Vec<Sensor>>;

    /// Resolve an alert that is still unresolved. Returns the updated rows;
    /// empty when the alert is missing or already resolved.
    async fn resolve_alert(
        &self,
        auth: &AuthSession,
        alert_id: i64,
        resolution: &AlertResolution,
    ) -> AppResult<Vec<Alert>>;

    async fn fetch_profile(&self, auth: &AuthSession, user_id: Uuid) -> AppResult<Option<Profile>>;

    /// Opaque marker that changes whenever `collection` changes. Only
    /// meaningful when compared with an earlier marker of the same collection.
    async fn change_marker(&self, collection: Collection) -> AppResult<String>;
}

/// Email and password authentication.
#[async_trait]
pub trait AuthProvider: Send + Sync {
    async fn sign_in(&self, email: &str, password: &str) -> AppResult<AuthSession>;

    async fn sign_up(&self, email: &str, password: &str) -> AppResult<()>;

    async fn sign_out(&self, auth: &AuthSession) -> AppResult<()>;
}
