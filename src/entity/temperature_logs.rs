use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Row of the append-only `temperature_logs` table.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct TemperatureLog {
    pub id: i64,
    pub sensor_id: i64,
    pub temperature: f64,
    pub logged_at: DateTime<Utc>,
}

#[derive(Clone, Debug, Serialize)]
pub struct NewTemperatureLog {
    pub sensor_id: i64,
    pub temperature: f64,
    pub logged_at: DateTime<Utc>,
}
