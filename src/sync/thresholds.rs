use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use utoipa::ToSchema;

use crate::error::{AppError, AppResult};

/// Edited threshold pair for one sensor, in °C.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct ThresholdEdit {
    pub min: f64,
    pub max: f64,
}

impl ThresholdEdit {
    /// # Errors
    ///
    /// `AppError::InvalidRange` when either bound is not finite or `min >= max`.
    pub fn validate(&self, sensor_id: i64) -> AppResult<()> {
        if !self.min.is_finite() || !self.max.is_finite() {
            return Err(AppError::InvalidRange(format!(
                "sensor {sensor_id}: thresholds must be numbers"
            )));
        }
        if self.min >= self.max {
            return Err(AppError::InvalidRange(format!(
                "sensor {sensor_id}: minimum {} must be below maximum {}",
                self.min, self.max
            )));
        }
        Ok(())
    }
}

/// Bulk threshold form: sensor id to edited pair. Validated as a whole before
/// anything is written.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct ThresholdForm {
    pub thresholds: BTreeMap<i64, ThresholdEdit>,
}

impl ThresholdForm {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with(mut self, sensor_id: i64, min: f64, max: f64) -> Self {
        self.thresholds.insert(sensor_id, ThresholdEdit { min, max });
        self
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.thresholds.is_empty()
    }

    /// # Errors
    ///
    /// `AppError::InvalidRange` listing every offending sensor.
    pub fn validate(&self) -> AppResult<()> {
        let problems: Vec<String> = self
            .thresholds
            .iter()
            .filter_map(|(id, edit)| match edit.validate(*id) {
                Err(AppError::InvalidRange(msg)) => Some(msg),
                _ => None,
            })
            .collect();

        if problems.is_empty() {
            Ok(())
        } else {
            Err(AppError::InvalidRange(problems.join("; ")))
        }
    }
}

/// Outcome of a bulk threshold save.
#[derive(Clone, Debug, Default, PartialEq, Serialize, ToSchema)]
pub struct ThresholdSaveReport {
    pub saved: Vec<i64>,
    pub failed: Vec<ThresholdFailure>,
}

impl ThresholdSaveReport {
    #[must_use]
    pub fn all_saved(&self) -> bool {
        self.failed.is_empty()
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, ToSchema)]
pub struct ThresholdFailure {
    pub sensor_id: i64,
    pub error: String,
}
