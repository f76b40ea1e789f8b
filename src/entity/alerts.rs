use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum AlertKind {
    High,
    Low,
}

impl AlertKind {
    /// Classify a reading against a threshold pair. `None` when the reading is
    /// inside `[min, max]`.
    #[must_use]
    pub fn for_reading(temperature: f64, min: f64, max: f64) -> Option<Self> {
        if temperature > max {
            Some(Self::High)
        } else if temperature < min {
            Some(Self::Low)
        } else {
            None
        }
    }

    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            Self::High => "Above maximum threshold",
            Self::Low => "Below minimum threshold",
        }
    }
}

/// Lifecycle is one-way: `Unresolved` -> `Resolved`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum AlertStatus {
    #[default]
    Unresolved,
    Resolved,
}

impl AlertStatus {
    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            Self::Unresolved => "Unresolved",
            Self::Resolved => "Resolved",
        }
    }
}

/// Row of the `alerts` table.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Alert {
    pub id: i64,
    pub sensor_id: i64,
    #[serde(rename = "type")]
    pub kind: AlertKind,
    pub temperature: f64,
    #[serde(default)]
    pub status: AlertStatus,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub resolved_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub resolved_by: Option<Uuid>,
}

/// Insert body for a threshold crossing.
#[derive(Clone, Debug, Serialize)]
pub struct NewAlert {
    pub sensor_id: i64,
    #[serde(rename = "type")]
    pub kind: AlertKind,
    pub temperature: f64,
    pub status: AlertStatus,
}

/// Patch body for the resolve transition.
#[derive(Clone, Debug, Serialize)]
pub struct AlertResolution {
    pub status: AlertStatus,
    pub resolved_at: DateTime<Utc>,
    pub resolved_by: Uuid,
}
