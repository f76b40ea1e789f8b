use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Stored status of a probe. `Warning` is also derived at read time from the
/// current temperature, see [`Sensor::display_status`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum SensorStatus {
    #[default]
    Active,
    Warning,
    Error,
}

/// Row of the `sensors` table.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Sensor {
    pub id: i64,
    pub name: String,
    /// Current reading in °C, null until the probe reports.
    pub temperature: Option<f64>,
    pub min_threshold: f64,
    pub max_threshold: f64,
    #[serde(default)]
    pub status: SensorStatus,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

impl Sensor {
    /// Whether the current reading lies outside `[min_threshold, max_threshold]`.
    /// A sensor without a reading is never out of range.
    #[must_use]
    pub fn is_out_of_range(&self) -> bool {
        self.temperature
            .is_some_and(|t| t > self.max_threshold || t < self.min_threshold)
    }

    /// Status shown on the dashboard. Recomputed from the reading and thresholds
    /// on every call, never persisted.
    #[must_use]
    pub fn display_status(&self) -> SensorStatus {
        match self.status {
            SensorStatus::Error => SensorStatus::Error,
            SensorStatus::Warning => SensorStatus::Warning,
            SensorStatus::Active if self.is_out_of_range() => SensorStatus::Warning,
            SensorStatus::Active => SensorStatus::Active,
        }
    }

    /// Name used wherever a sensor is referenced by id only.
    #[must_use]
    pub fn fallback_name(id: i64) -> String {
        format!("Sensor {id}")
    }
}

/// Patch body for a simulated or measured reading.
#[derive(Debug, Serialize)]
pub struct TemperaturePatch {
    pub temperature: f64,
    pub updated_at: DateTime<Utc>,
}

/// Patch body for a threshold edit.
#[derive(Debug, Serialize)]
pub struct ThresholdPatch {
    pub min_threshold: f64,
    pub max_threshold: f64,
    pub updated_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sensor(temperature: Option<f64>, status: SensorStatus) -> Sensor {
        Sensor {
            id: 1,
            name: "Freezer A".to_string(),
            temperature,
            min_threshold: -30.0,
            max_threshold: -15.0,
            status,
            updated_at: None,
        }
    }

    #[test]
    fn display_status_follows_thresholds() {
        assert_eq!(sensor(Some(-20.0), SensorStatus::Active).display_status(), SensorStatus::Active);
        assert_eq!(sensor(Some(-14.0), SensorStatus::Active).display_status(), SensorStatus::Warning);
        assert_eq!(sensor(Some(-31.0), SensorStatus::Active).display_status(), SensorStatus::Warning);
        // bounds are inclusive
        assert_eq!(sensor(Some(-15.0), SensorStatus::Active).display_status(), SensorStatus::Active);
    }

    #[test]
    fn stored_error_wins_and_missing_reading_is_in_range() {
        assert_eq!(sensor(Some(-20.0), SensorStatus::Error).display_status(), SensorStatus::Error);
        assert_eq!(sensor(None, SensorStatus::Active).display_status(), SensorStatus::Active);
    }

    #[test]
    fn deserializes_platform_row() {
        let row = serde_json::json!({
            "id": 3,
            "name": "Chiller 3",
            "temperature": null,
            "min_threshold": 0.0,
            "max_threshold": 4.0,
            "status": "warning",
            "updated_at": "2026-10-17T08:00:00+00:00"
        });
        let sensor: Sensor = serde_json::from_value(row).unwrap();
        assert_eq!(sensor.status, SensorStatus::Warning);
        assert!(sensor.temperature.is_none());
    }
}
