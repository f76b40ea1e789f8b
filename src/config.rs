use chrono::{FixedOffset, Offset, Utc};
use std::env;

use crate::services::bucketer::TimeRange;

#[derive(Debug, Clone)]
pub enum Deployment {
    Local,
    Dev,
    Stage,
    Prod,
}

impl Deployment {
    #[must_use]
    pub fn from_str(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "dev" | "development" => Self::Dev,
            "stage" | "staging" => Self::Stage,
            "prod" | "production" => Self::Prod,
            _ => Self::Local,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    // Supabase platform
    pub supabase_url: String,
    pub supabase_anon_key: String,
    pub request_timeout_seconds: u64,

    // Dashboard session
    pub dashboard_email: Option<String>,
    pub dashboard_password: Option<String>,
    pub default_range: TimeRange,
    pub alert_limit: usize,
    pub display_utc_offset: FixedOffset,
    pub desktop_notifications: bool,

    // Sync settings
    pub poll_interval_seconds: u64,
    pub tick_interval_seconds: u64,
    pub change_feed_interval_seconds: u64,
    pub initial_load_timeout_seconds: u64,
    pub retry_attempts: u32,
    pub retry_base_delay_ms: u64,

    // API settings
    pub api_host: String,
    pub api_port: u16,

    // Caching
    pub chart_cache_ttl_seconds: u64,

    // Application metadata
    pub deployment: Deployment,
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Missing` if the platform URL or API key is not set,
    /// and `ConfigError::Invalid` if a value cannot be interpreted.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let supabase_url = required("SUPABASE_URL")?;
        let supabase_anon_key = required("SUPABASE_ANON_KEY")?;

        let default_range = env::var("DEFAULT_RANGE")
            .unwrap_or_else(|_| "24h".to_string())
            .parse::<TimeRange>()
            .map_err(|_| ConfigError::Invalid("DEFAULT_RANGE"))?;

        let display_utc_offset = parse_display_offset(
            &env::var("DISPLAY_UTC_OFFSET_MINUTES").unwrap_or_else(|_| "420".to_string()),
        )?;

        Ok(Self {
            supabase_url: supabase_url.trim_end_matches('/').to_string(),
            supabase_anon_key,
            request_timeout_seconds: env::var("REQUEST_TIMEOUT_SECONDS")
                .unwrap_or_else(|_| "30".to_string())
                .parse()
                .unwrap_or(30),

            dashboard_email: env::var("DASHBOARD_EMAIL").ok().filter(|s| !s.is_empty()),
            dashboard_password: env::var("DASHBOARD_PASSWORD").ok().filter(|s| !s.is_empty()),
            default_range,
            alert_limit: env::var("ALERT_LIMIT")
                .unwrap_or_else(|_| "50".to_string())
                .parse()
                .unwrap_or(50),
            display_utc_offset,
            desktop_notifications: env::var("DESKTOP_NOTIFICATIONS")
                .unwrap_or_else(|_| "true".to_string())
                .parse()
                .unwrap_or(true),

            poll_interval_seconds: env::var("POLL_INTERVAL_SECONDS")
                .unwrap_or_else(|_| "10".to_string())
                .parse()
                .unwrap_or(10),
            tick_interval_seconds: env::var("TICK_INTERVAL_SECONDS")
                .unwrap_or_else(|_| "30".to_string())
                .parse()
                .unwrap_or(30),
            change_feed_interval_seconds: env::var("CHANGE_FEED_INTERVAL_SECONDS")
                .unwrap_or_else(|_| "2".to_string())
                .parse()
                .unwrap_or(2),
            initial_load_timeout_seconds: env::var("INITIAL_LOAD_TIMEOUT_SECONDS")
                .unwrap_or_else(|_| "10".to_string())
                .parse()
                .unwrap_or(10),
            retry_attempts: env::var("RETRY_ATTEMPTS")
                .unwrap_or_else(|_| "3".to_string())
                .parse()
                .unwrap_or(3),
            retry_base_delay_ms: env::var("RETRY_BASE_DELAY_MS")
                .unwrap_or_else(|_| "1000".to_string())
                .parse()
                .unwrap_or(1000),

            api_host: env::var("API_HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            api_port: env::var("API_PORT")
                .unwrap_or_else(|_| "3000".to_string())
                .parse()
                .unwrap_or(3000),

            chart_cache_ttl_seconds: env::var("CHART_CACHE_TTL_SECONDS")
                .unwrap_or_else(|_| "60".to_string())
                .parse()
                .unwrap_or(60),

            deployment: Deployment::from_str(
                &env::var("DEPLOYMENT").unwrap_or_else(|_| "local".to_string()),
            ),
        })
    }

    #[must_use]
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.api_host, self.api_port)
    }

    /// Both dashboard credentials, when configured for automatic sign-in.
    #[must_use]
    pub fn dashboard_credentials(&self) -> Option<(&str, &str)> {
        match (&self.dashboard_email, &self.dashboard_password) {
            (Some(email), Some(password)) => Some((email.as_str(), password.as_str())),
            _ => None,
        }
    }

    /// Configuration suitable for tests and embedding: local platform URL,
    /// defaults everywhere else.
    #[must_use]
    pub fn with_platform(url: &str, anon_key: &str) -> Self {
        Self {
            supabase_url: url.trim_end_matches('/').to_string(),
            supabase_anon_key: anon_key.to_string(),
            request_timeout_seconds: 30,
            dashboard_email: None,
            dashboard_password: None,
            default_range: TimeRange::Day,
            alert_limit: 50,
            display_utc_offset: Utc.fix(),
            desktop_notifications: false,
            poll_interval_seconds: 10,
            tick_interval_seconds: 30,
            change_feed_interval_seconds: 2,
            initial_load_timeout_seconds: 10,
            retry_attempts: 3,
            retry_base_delay_ms: 1000,
            api_host: "127.0.0.1".to_string(),
            api_port: 3000,
            chart_cache_ttl_seconds: 60,
            deployment: Deployment::Local,
        }
    }
}

fn required(name: &'static str) -> Result<String, ConfigError> {
    match env::var(name) {
        Ok(value) if !value.trim().is_empty() => Ok(value),
        _ => {
            tracing::error!(variable = name, "Missing Supabase environment variable");
            Err(ConfigError::Missing(name))
        }
    }
}

/// Minutes east of UTC, e.g. `420` for +07:00 or `-300` for -05:00.
fn parse_display_offset(raw: &str) -> Result<FixedOffset, ConfigError> {
    raw.trim()
        .parse::<i32>()
        .ok()
        .and_then(|minutes| minutes.checked_mul(60))
        .and_then(FixedOffset::east_opt)
        .ok_or(ConfigError::Invalid("DISPLAY_UTC_OFFSET_MINUTES"))
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    Missing(&'static str),

    #[error("Invalid value for environment variable: {0}")]
    Invalid(&'static str),
}
