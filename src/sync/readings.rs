use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::HashMap;

use crate::entity::Sensor;

/// Supplies the next temperature for a sensor during a tick. `None` skips the
/// sensor for this tick.
pub trait ReadingSource: Send {
    fn next_reading(&mut self, sensor: &Sensor) -> Option<f64>;
}

/// Simulated probe: the current reading plus a uniform step in
/// `[-max_step, max_step)`, rounded to one decimal.
pub struct RandomWalk {
    rng: StdRng,
    max_step: f64,
}

impl RandomWalk {
    pub const DEFAULT_MAX_STEP: f64 = 0.25;

    #[must_use]
    pub fn new() -> Self {
        Self {
            rng: StdRng::from_entropy(),
            max_step: Self::DEFAULT_MAX_STEP,
        }
    }

    #[must_use]
    pub fn seeded(seed: u64, max_step: f64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
            max_step,
        }
    }
}

impl Default for RandomWalk {
    fn default() -> Self {
        Self::new()
    }
}

impl ReadingSource for RandomWalk {
    fn next_reading(&mut self, sensor: &Sensor) -> Option<f64> {
        let current = sensor.temperature?;
        let step = if self.max_step > 0.0 {
            self.rng.gen_range(-self.max_step..self.max_step)
        } else {
            0.0
        };
        Some(((current + step) * 10.0).round() / 10.0)
    }
}

/// Fixed readings per sensor id, for replaying recorded values.
#[derive(Debug, Default, Clone)]
pub struct FixedReadings {
    readings: HashMap<i64, f64>,
}

impl FixedReadings {
    #[must_use]
    pub fn new(readings: impl IntoIterator<Item = (i64, f64)>) -> Self {
        Self {
            readings: readings.into_iter().collect(),
        }
    }
}

impl ReadingSource for FixedReadings {
    fn next_reading(&mut self, sensor: &Sensor) -> Option<f64> {
        self.readings.get(&sensor.id).copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::SensorStatus;

    fn sensor(temperature: Option<f64>) -> Sensor {
        Sensor {
            id: 1,
            name: "Freezer A".to_string(),
            temperature,
            min_threshold: -30.0,
            max_threshold: -15.0,
            status: SensorStatus::Active,
            updated_at: None,
        }
    }

    #[test]
    fn random_walk_stays_within_step_and_one_decimal() {
        let mut walk = RandomWalk::seeded(7, 0.25);
        for _ in 0..200 {
            let next = walk.next_reading(&sensor(Some(-18.0))).unwrap();
            assert!((next + 18.0).abs() <= 0.3, "stepped too far: {next}");
            assert!(((next * 10.0).round() - next * 10.0).abs() < 1e-9);
        }
    }

    #[test]
    fn random_walk_skips_sensors_without_reading() {
        let mut walk = RandomWalk::seeded(7, 0.25);
        assert!(walk.next_reading(&sensor(None)).is_none());
    }

    #[test]
    fn fixed_readings_by_id() {
        let mut fixed = FixedReadings::new([(1, -14.0)]);
        assert_eq!(fixed.next_reading(&sensor(Some(-18.0))), Some(-14.0));
        let mut other = sensor(Some(-18.0));
        other.id = 2;
        assert_eq!(fixed.next_reading(&other), None);
    }
}
