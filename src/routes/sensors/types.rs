use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::entity::{Sensor, SensorStatus};

#[derive(Debug, Serialize, ToSchema)]
pub struct SensorResponse {
    #[serde(flatten)]
    pub sensor: Sensor,
    /// Status derived from the stored status and the current reading
    pub display_status: SensorStatus,
    /// Whether the current reading lies outside the thresholds
    pub out_of_range: bool,
}

impl From<Sensor> for SensorResponse {
    fn from(sensor: Sensor) -> Self {
        Self {
            display_status: sensor.display_status(),
            out_of_range: sensor.is_out_of_range(),
            sensor,
        }
    }
}

/// New threshold pair for one sensor, in °C.
#[derive(Debug, Deserialize, ToSchema)]
pub struct ThresholdUpdate {
    pub min_threshold: f64,
    pub max_threshold: f64,
}
