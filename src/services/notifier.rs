use crate::entity::AlertKind;

/// What operators are told when a reading crosses a threshold.
#[derive(Clone, Debug, PartialEq)]
pub struct AlertNotice {
    pub sensor_id: i64,
    pub sensor_name: String,
    pub temperature: f64,
    pub kind: AlertKind,
}

impl AlertNotice {
    #[must_use]
    pub fn title(&self) -> &'static str {
        "Temperature alert!"
    }

    #[must_use]
    pub fn body(&self) -> String {
        format!(
            "{}: {}°C - {}",
            self.sensor_name,
            self.temperature,
            self.kind.label()
        )
    }
}

/// Best-effort delivery of alert notices. Implementations must not fail the
/// caller; a notice that cannot be shown is dropped.
pub trait Notifier: Send + Sync {
    fn notify(&self, notice: &AlertNotice);
}

/// Writes notices to the log when notifications were granted.
#[derive(Debug, Clone, Copy)]
pub struct LogNotifier {
    permitted: bool,
}

impl LogNotifier {
    #[must_use]
    pub fn new(permitted: bool) -> Self {
        Self { permitted }
    }
}

impl Notifier for LogNotifier {
    fn notify(&self, notice: &AlertNotice) {
        if !self.permitted {
            tracing::debug!(sensor_id = notice.sensor_id, "Notification permission not granted, skipping");
            return;
        }
        tracing::warn!(
            sensor_id = notice.sensor_id,
            sensor = %notice.sensor_name,
            temperature = notice.temperature,
            kind = ?notice.kind,
            title = notice.title(),
            "{}",
            notice.body()
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn body_names_sensor_and_direction() {
        let notice = AlertNotice {
            sensor_id: 2,
            sensor_name: "Freezer B".to_string(),
            temperature: -14.0,
            kind: AlertKind::High,
        };
        assert_eq!(notice.body(), "Freezer B: -14°C - Above maximum threshold");
    }
}
