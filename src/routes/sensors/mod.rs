mod handlers;
mod types;

pub use handlers::{list_sensors, save_thresholds, update_sensor_thresholds};
pub use types::{SensorResponse, ThresholdUpdate};

// Re-export utoipa path structs for OpenAPI documentation
pub use handlers::{__path_list_sensors, __path_save_thresholds, __path_update_sensor_thresholds};
