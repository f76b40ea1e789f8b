use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use crate::entity::AlertStatus;

#[derive(Debug, Deserialize, IntoParams)]
pub struct AlertsQuery {
    /// Only alerts with this status
    pub status: Option<AlertStatus>,
    /// Only alerts for this sensor
    pub sensor_id: Option<i64>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct UnresolvedCountResponse {
    pub unresolved: usize,
}
