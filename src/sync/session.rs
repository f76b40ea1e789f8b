use chrono::{DateTime, FixedOffset, Utc};
use serde::Serialize;
use utoipa::ToSchema;

use crate::entity::{Alert, AlertStatus, Profile, Sensor, Settings, TemperatureLog};
use crate::services::bucketer::{ChartPoint, TimeRange};
use crate::supabase::AuthSession;

/// Day-first local timestamp as shown on the dashboard, e.g. `14:05:09 17/10/2026`.
#[must_use]
pub fn display_timestamp(at: DateTime<Utc>, offset: FixedOffset) -> String {
    at.with_timezone(&offset)
        .format("%H:%M:%S %-d/%-m/%Y")
        .to_string()
}

/// Alert joined with its sensor's display name and a formatted timestamp.
#[derive(Clone, Debug, PartialEq, Serialize, ToSchema)]
pub struct AlertView {
    #[serde(flatten)]
    pub alert: Alert,
    /// Sensor display name, `Sensor {id}` when the sensor is unknown
    pub sensor: String,
    /// Creation time in the display timezone
    pub time: String,
}

impl AlertView {
    #[must_use]
    pub fn new(alert: Alert, sensors: &[Sensor], offset: FixedOffset) -> Self {
        let sensor = sensors
            .iter()
            .find(|s| s.id == alert.sensor_id)
            .map_or_else(|| Sensor::fallback_name(alert.sensor_id), |s| s.name.clone());
        let time = display_timestamp(alert.created_at, offset);
        Self { alert, sensor, time }
    }
}

/// Everything one dashboard session shows. Each refresh replaces its
/// collection wholesale so overlapping refreshes never interleave rows.
#[derive(Clone, Debug, Default)]
pub struct DashboardSession {
    pub sensors: Vec<Sensor>,
    pub alerts: Vec<AlertView>,
    pub logs: Vec<TemperatureLog>,
    pub chart: Vec<ChartPoint>,
    pub settings: Settings,
    pub range: TimeRange,
    pub last_update: Option<DateTime<Utc>>,
    pub loading: bool,
    pub auth: Option<AuthSession>,
    pub profile: Option<Profile>,
}

impl DashboardSession {
    #[must_use]
    pub fn new(range: TimeRange) -> Self {
        Self {
            range,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn is_admin(&self) -> bool {
        self.auth.is_some() && self.profile.as_ref().is_some_and(Profile::is_admin)
    }

    #[must_use]
    pub fn unresolved_alert_count(&self) -> usize {
        self.alerts
            .iter()
            .filter(|a| a.alert.status == AlertStatus::Unresolved)
            .count()
    }

    #[must_use]
    pub fn sensor_name(&self, sensor_id: i64) -> String {
        self.sensors
            .iter()
            .find(|s| s.id == sensor_id)
            .map_or_else(|| Sensor::fallback_name(sensor_id), |s| s.name.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::{AlertKind, Role, SensorStatus};
    use chrono::TimeZone;
    use uuid::Uuid;

    fn alert(id: i64, sensor_id: i64, status: AlertStatus) -> Alert {
        Alert {
            id,
            sensor_id,
            kind: AlertKind::High,
            temperature: -14.0,
            status,
            created_at: Utc.with_ymd_and_hms(2026, 10, 17, 7, 5, 9).unwrap(),
            resolved_at: None,
            resolved_by: None,
        }
    }

    fn sensor(id: i64, name: &str) -> Sensor {
        Sensor {
            id,
            name: name.to_string(),
            temperature: Some(-18.0),
            min_threshold: -30.0,
            max_threshold: -15.0,
            status: SensorStatus::Active,
            updated_at: None,
        }
    }

    #[test]
    fn alert_view_joins_sensor_name_with_fallback() {
        let offset = FixedOffset::east_opt(7 * 3600).unwrap();
        let sensors = vec![sensor(1, "Freezer A")];

        let known = AlertView::new(alert(1, 1, AlertStatus::Unresolved), &sensors, offset);
        assert_eq!(known.sensor, "Freezer A");
        assert_eq!(known.time, "14:05:09 17/10/2026");

        let orphan = AlertView::new(alert(2, 9, AlertStatus::Unresolved), &sensors, offset);
        assert_eq!(orphan.sensor, "Sensor 9");
    }

    #[test]
    fn counts_unresolved_alerts() {
        let offset = FixedOffset::east_opt(0).unwrap();
        let mut session = DashboardSession::new(TimeRange::Day);
        session.alerts = vec![
            AlertView::new(alert(1, 1, AlertStatus::Unresolved), &[], offset),
            AlertView::new(alert(2, 1, AlertStatus::Resolved), &[], offset),
            AlertView::new(alert(3, 2, AlertStatus::Unresolved), &[], offset),
        ];
        assert_eq!(session.unresolved_alert_count(), 2);
    }

    #[test]
    fn admin_requires_session_and_role() {
        let mut session = DashboardSession::default();
        session.profile = Some(Profile {
            id: Uuid::nil(),
            role: Role::Admin,
            email: None,
        });
        assert!(!session.is_admin());

        session.auth = Some(AuthSession {
            access_token: "jwt".into(),
            refresh_token: None,
            user_id: Uuid::nil(),
            email: None,
        });
        assert!(session.is_admin());
    }
}
