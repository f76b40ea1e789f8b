use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Primary key of the singleton `settings` row.
pub const SETTINGS_ROW_ID: i64 = 1;

/// Notification settings, a single row edited by administrators.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Settings {
    pub email_notifications: bool,
    pub sms_notifications: bool,
    /// Minutes
    pub alert_delay: i32,
    #[serde(default)]
    pub notification_emails: Vec<String>,
    #[serde(default)]
    pub notification_phones: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            email_notifications: true,
            sms_notifications: true,
            alert_delay: 5,
            notification_emails: vec!["admin@abfoods.vn".to_string()],
            notification_phones: vec!["+84123456789".to_string()],
            updated_at: None,
        }
    }
}

impl Settings {
    /// Drop blank contact entries and surrounding whitespace.
    #[must_use]
    pub fn normalized(mut self) -> Self {
        self.notification_emails = clean(self.notification_emails);
        self.notification_phones = clean(self.notification_phones);
        self
    }
}

fn clean(entries: Vec<String>) -> Vec<String> {
    entries
        .into_iter()
        .map(|e| e.trim().to_string())
        .filter(|e| !e.is_empty())
        .collect()
}
