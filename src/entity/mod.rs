//! Row types of the hosted collections.

pub mod alerts;
pub mod profiles;
pub mod sensors;
pub mod settings;
pub mod temperature_logs;

pub use alerts::{Alert, AlertKind, AlertResolution, AlertStatus, NewAlert};
pub use profiles::{Profile, Role};
pub use sensors::{Sensor, SensorStatus, TemperaturePatch, ThresholdPatch};
pub use settings::{Settings, SETTINGS_ROW_ID};
pub use temperature_logs::{NewTemperatureLog, TemperatureLog};
