//! Time-series bucketing for the temperature chart.
//!
//! Raw log rows are grouped into fixed-width buckets per selected range:
//!
//! | Range | Bucket width | Bucket key |
//! |-------|--------------|------------|
//! | 1h    | 5 min        | time of day |
//! | 6h    | 15 min       | time of day |
//! | 24h   | 60 min       | time of day |
//! | 7d    | 6 h          | calendar day + time of day |
//! | 30d   | 1 day        | calendar day + time of day |
//!
//! For ranges up to 24h the key ignores the date, so samples taken at the same
//! time of day on different days share a bucket. Each emitted point carries one
//! `sensor{id}` field per sensor that has a sample in the bucket; a missing
//! field means "no data", never zero.

use chrono::{DateTime, Datelike, Duration, FixedOffset, NaiveDate, Timelike, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::str::FromStr;
use utoipa::ToSchema;

use crate::entity::TemperatureLog;

/// Chart window selectable on the dashboard.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
pub enum TimeRange {
    #[serde(rename = "1h")]
    OneHour,
    #[serde(rename = "6h")]
    SixHours,
    #[default]
    #[serde(rename = "24h")]
    Day,
    #[serde(rename = "7d")]
    Week,
    #[serde(rename = "30d")]
    Month,
}

impl TimeRange {
    pub const ALL: [Self; 5] = [
        Self::OneHour,
        Self::SixHours,
        Self::Day,
        Self::Week,
        Self::Month,
    ];

    /// Fixed bucket width in minutes.
    #[must_use]
    pub fn bucket_width_minutes(self) -> u32 {
        match self {
            Self::OneHour => 5,
            Self::SixHours => 15,
            Self::Day => 60,
            Self::Week => 360,
            Self::Month => 1440,
        }
    }

    /// How far back log rows are fetched for this range.
    #[must_use]
    pub fn window(self) -> Duration {
        match self {
            Self::OneHour => Duration::hours(1),
            Self::SixHours => Duration::hours(6),
            Self::Day => Duration::hours(24),
            Self::Week => Duration::days(7),
            Self::Month => Duration::days(30),
        }
    }

    /// Multi-day ranges keep buckets from different days apart.
    #[must_use]
    pub fn keys_by_day(self) -> bool {
        matches!(self, Self::Week | Self::Month)
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::OneHour => "1h",
            Self::SixHours => "6h",
            Self::Day => "24h",
            Self::Week => "7d",
            Self::Month => "30d",
        }
    }
}

impl fmt::Display for TimeRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, thiserror::Error)]
#[error("unknown time range '{0}', expected one of 1h, 6h, 24h, 7d, 30d")]
pub struct UnknownRange(pub String);

impl FromStr for TimeRange {
    type Err = UnknownRange;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|r| r.as_str() == s.trim())
            .ok_or_else(|| UnknownRange(s.to_string()))
    }
}

/// Field name under which a sensor's value appears in a chart point.
#[must_use]
pub fn sensor_field(sensor_id: i64) -> String {
    format!("sensor{sensor_id}")
}

/// One chart-ready bucket. Serializes flat: `{"time": "14:00", "sensor1": -18.2}`.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ChartPoint {
    pub time: String,
    #[serde(flatten)]
    pub values: BTreeMap<String, f64>,
}

impl ChartPoint {
    #[must_use]
    pub fn value(&self, sensor_id: i64) -> Option<f64> {
        self.values.get(&sensor_field(sensor_id)).copied()
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
struct BucketKey {
    day: Option<NaiveDate>,
    start_minute: u32,
}

struct Bucket {
    label: String,
    earliest: DateTime<Utc>,
    latest_per_field: BTreeMap<String, (DateTime<Utc>, f64)>,
}

/// Group log rows into chart points for `range`, with time of day and calendar
/// day taken in `offset`.
///
/// Points come out ordered by the earliest sample in each bucket, ties kept in
/// first-seen order. When a sensor has several samples in one bucket the most
/// recent one wins. Pure: the same rows and range always give the same points.
#[must_use]
pub fn build_chart_points(
    logs: &[TemperatureLog],
    range: TimeRange,
    offset: FixedOffset,
) -> Vec<ChartPoint> {
    let width = range.bucket_width_minutes();
    let mut index: HashMap<BucketKey, usize> = HashMap::new();
    let mut buckets: Vec<Bucket> = Vec::new();

    for log in logs {
        let local = log.logged_at.with_timezone(&offset);
        let minute_of_day = local.hour() * 60 + local.minute();
        let start_minute = minute_of_day / width * width;
        let clock = format!("{:02}:{:02}", start_minute / 60, start_minute % 60);

        let key = BucketKey {
            day: range.keys_by_day().then(|| local.date_naive()),
            start_minute,
        };

        let slot = *index.entry(key).or_insert_with(|| {
            let label = if range.keys_by_day() {
                format!("{}/{} {clock}", local.day(), local.month())
            } else {
                clock
            };
            buckets.push(Bucket {
                label,
                earliest: log.logged_at,
                latest_per_field: BTreeMap::new(),
            });
            buckets.len() - 1
        });

        let bucket = &mut buckets[slot];
        if log.logged_at < bucket.earliest {
            bucket.earliest = log.logged_at;
        }

        let field = sensor_field(log.sensor_id);
        let newer = bucket
            .latest_per_field
            .get(&field)
            .is_none_or(|(seen_at, _)| log.logged_at >= *seen_at);
        if newer {
            bucket
                .latest_per_field
                .insert(field, (log.logged_at, log.temperature));
        }
    }

    // stable: equal timestamps keep insertion order
    buckets.sort_by_key(|b| b.earliest);

    buckets
        .into_iter()
        .map(|b| ChartPoint {
            time: b.label,
            values: b
                .latest_per_field
                .into_iter()
                .map(|(field, (_, temperature))| (field, temperature))
                .collect(),
        })
        .collect()
}
