use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use reqwest::{header, Client, Method, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use std::time::Duration;
use uuid::Uuid;

use crate::config::Config;
use crate::entity::{
    Alert, AlertResolution, NewAlert, NewTemperatureLog, Profile, Sensor, Settings,
    TemperatureLog, TemperaturePatch, ThresholdPatch, SETTINGS_ROW_ID,
};
use crate::error::{AppError, AppResult};
use crate::supabase::models::{AuthErrorBody, AuthSession, PasswordGrant, SignUpRequest, TokenResponse};
use crate::supabase::store::{AuthProvider, Collection, RemoteStore};

const RETURN_REPRESENTATION: &str = "return=representation";
const RETURN_MINIMAL: &str = "return=minimal";

/// REST and auth client for the hosted Supabase project.
pub struct SupabaseClient {
    http_client: Client,
    base_url: String,
    anon_key: String,
}

impl SupabaseClient {
    /// # Errors
    ///
    /// Returns `AppError::Internal` if the HTTP client cannot be built.
    pub fn new(config: &Config) -> AppResult<Self> {
        let http_client = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_seconds))
            .build()
            .map_err(|e| AppError::Internal(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            http_client,
            base_url: config.supabase_url.clone(),
            anon_key: config.supabase_anon_key.clone(),
        })
    }

    fn rest_url(&self, table: &str) -> String {
        format!("{}/rest/v1/{table}", self.base_url)
    }

    fn auth_url(&self, path: &str) -> String {
        format!("{}/auth/v1/{path}", self.base_url)
    }

    /// Request against a table, authorized as the anonymous role or as `auth`.
    fn request(&self, method: Method, table: &str, auth: Option<&AuthSession>) -> RequestBuilder {
        let token = auth.map_or(self.anon_key.as_str(), |a| a.access_token.as_str());
        self.http_client
            .request(method, self.rest_url(table))
            .header("apikey", &self.anon_key)
            .bearer_auth(token)
    }

    async fn send(builder: RequestBuilder, what: &str) -> AppResult<Response> {
        let response = builder
            .send()
            .await
            .map_err(|e| AppError::FetchFailed(format!("{what}: request failed: {e}")))?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        tracing::warn!(status = %status, operation = what, body = %body, "Supabase request rejected");

        match status {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Err(AppError::PermissionDenied(
                format!("{what}: HTTP {status}"),
            )),
            _ => Err(AppError::FetchFailed(format!("{what}: HTTP {status}: {body}"))),
        }
    }

    async fn rows<T: DeserializeOwned>(builder: RequestBuilder, what: &str) -> AppResult<Vec<T>> {
        let response = Self::send(builder, what).await?;
        let text = response
            .text()
            .await
            .map_err(|e| AppError::FetchFailed(format!("{what}: failed to read body: {e}")))?;

        serde_json::from_str(&text).map_err(|e| {
            tracing::error!(
                error = %e,
                operation = what,
                body_preview = %text.chars().take(500).collect::<String>(),
                "Failed to parse Supabase response"
            );
            AppError::FetchFailed(format!("{what}: failed to parse response: {e}"))
        })
    }

    /// First row of `table` under `order` together with the exact row count.
    async fn head(&self, table: &str, select: &str, order: &str) -> AppResult<String> {
        let builder = self
            .request(Method::GET, table, None)
            .header("Prefer", "count=exact")
            .query(&[("select", select), ("order", order), ("limit", "1")]);
        let response = Self::send(builder, "change marker").await?;
        let range = response
            .headers()
            .get(header::CONTENT_RANGE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_string();
        let body = response
            .text()
            .await
            .map_err(|e| AppError::FetchFailed(format!("change marker: failed to read body: {e}")))?;
        Ok(format!("{range}|{body}"))
    }

    async fn auth_failure(response: Response, what: &str) -> AppError {
        let status = response.status();
        let message = response
            .json::<AuthErrorBody>()
            .await
            .ok()
            .and_then(AuthErrorBody::into_message)
            .unwrap_or_else(|| format!("HTTP {status}"));
        tracing::warn!(status = %status, operation = what, message = %message, "Auth request rejected");
        AppError::AuthError(message)
    }
}

fn timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Millis, true)
}

#[async_trait]
impl RemoteStore for SupabaseClient {
    async fn list_sensors(&self) -> AppResult<Vec<Sensor>> {
        let builder = self
            .request(Method::GET, "sensors", None)
            .query(&[("select", "*"), ("order", "id.asc")]);
        Self::rows(builder, "list sensors").await
    }

    async fn list_recent_alerts(&self, limit: usize) -> AppResult<Vec<Alert>> {
        let limit = limit.to_string();
        let builder = self.request(Method::GET, "alerts", None).query(&[
            ("select", "*"),
            ("order", "created_at.desc"),
            ("limit", limit.as_str()),
        ]);
        Self::rows(builder, "list alerts").await
    }

    async fn list_temperature_logs(&self, since: DateTime<Utc>) -> AppResult<Vec<TemperatureLog>> {
        let since = format!("gte.{}", timestamp(since));
        let builder = self.request(Method::GET, "temperature_logs", None).query(&[
            ("select", "*"),
            ("logged_at", since.as_str()),
            ("order", "logged_at.asc"),
        ]);
        Self::rows(builder, "list temperature logs").await
    }

    async fn fetch_settings(&self) -> AppResult<Option<Settings>> {
        let builder = self
            .request(Method::GET, "settings", None)
            .query(&[("select", "*"), ("limit", "1")]);
        let rows: Vec<Settings> = Self::rows(builder, "fetch settings").await?;
        Ok(rows.into_iter().next())
    }

    async fn update_settings(&self, auth: &AuthSession, settings: &Settings) -> AppResult<()> {
        let builder = self
            .request(Method::PATCH, "settings", Some(auth))
            .query(&[("id", format!("eq.{SETTINGS_ROW_ID}"))])
            .header("Prefer", RETURN_MINIMAL)
            .json(settings);
        Self::send(builder, "update settings").await?;
        Ok(())
    }

    async fn update_sensor_temperature(
        &self,
        auth: &AuthSession,
        sensor_id: i64,
        patch: &TemperaturePatch,
    ) -> AppResult<()> {
        let builder = self
            .request(Method::PATCH, "sensors", Some(auth))
            .query(&[("id", format!("eq.{sensor_id}"))])
            .header("Prefer", RETURN_MINIMAL)
            .json(patch);
        Self::send(builder, "update sensor temperature").await?;
        Ok(())
    }

    async fn insert_temperature_log(&self, auth: &AuthSession, log: &NewTemperatureLog) -> AppResult<()> {
        let builder = self
            .request(Method::POST, "temperature_logs", Some(auth))
            .header("Prefer", RETURN_MINIMAL)
            .json(&[log]);
        Self::send(builder, "insert temperature log").await?;
        Ok(())
    }

    async fn insert_alert(&self, auth: &AuthSession, alert: &NewAlert) -> AppResult<Alert> {
        let builder = self
            .request(Method::POST, "alerts", Some(auth))
            .header("Prefer", RETURN_REPRESENTATION)
            .json(&[alert]);
        let rows: Vec<Alert> = Self::rows(builder, "insert alert").await?;
        rows.into_iter()
            .next()
            .ok_or_else(|| AppError::FetchFailed("insert alert: no row returned".to_string()))
    }

    async fn update_thresholds(
        &self,
        auth: &AuthSession,
        sensor_id: i64,
        patch: &ThresholdPatch,
    ) -> AppResult<Vec<Sensor>> {
        let builder = self
            .request(Method::PATCH, "sensors", Some(auth))
            .query(&[("id", format!("eq.{sensor_id}"))])
            .header("Prefer", RETURN_REPRESENTATION)
            .json(patch);
        Self::rows(builder, "update thresholds").await
    }

    async fn resolve_alert(
        &self,
        auth: &AuthSession,
        alert_id: i64,
        resolution: &AlertResolution,
    ) -> AppResult<Vec<Alert>> {
        let builder = self
            .request(Method::PATCH, "alerts", Some(auth))
            .query(&[
                ("id", format!("eq.{alert_id}")),
                ("status", "eq.unresolved".to_string()),
            ])
            .header("Prefer", RETURN_REPRESENTATION)
            .json(resolution);
        Self::rows(builder, "resolve alert").await
    }

    async fn fetch_profile(&self, auth: &AuthSession, user_id: Uuid) -> AppResult<Option<Profile>> {
        let builder = self
            .request(Method::GET, "profiles", Some(auth))
            .query(&[("select", "*".to_string()), ("id", format!("eq.{user_id}"))]);
        let rows: Vec<Profile> = Self::rows(builder, "fetch profile").await?;
        Ok(rows.into_iter().next())
    }

    async fn change_marker(&self, collection: Collection) -> AppResult<String> {
        match collection {
            Collection::Sensors => {
                self.head("sensors", "id,updated_at", "updated_at.desc.nullslast")
                    .await
            }
            Collection::Alerts => {
                // new rows and resolutions of old rows both count
                let created = self.head("alerts", "id", "id.desc").await?;
                let resolved = self
                    .head("alerts", "id,resolved_at", "resolved_at.desc.nullslast")
                    .await?;
                Ok(format!("{created}#{resolved}"))
            }
            Collection::TemperatureLogs => self.head("temperature_logs", "id", "id.desc").await,
        }
    }
}

#[async_trait]
impl AuthProvider for SupabaseClient {
    async fn sign_in(&self, email: &str, password: &str) -> AppResult<AuthSession> {
        let response = self
            .http_client
            .post(self.auth_url("token"))
            .query(&[("grant_type", "password")])
            .header("apikey", &self.anon_key)
            .json(&PasswordGrant { email, password })
            .send()
            .await
            .map_err(|e| AppError::FetchFailed(format!("sign in: request failed: {e}")))?;

        if !response.status().is_success() {
            return Err(Self::auth_failure(response, "sign in").await);
        }

        let token: TokenResponse = response
            .json()
            .await
            .map_err(|e| AppError::AuthError(format!("Failed to parse sign-in response: {e}")))?;
        Ok(token.into())
    }

    async fn sign_up(&self, email: &str, password: &str) -> AppResult<()> {
        let response = self
            .http_client
            .post(self.auth_url("signup"))
            .header("apikey", &self.anon_key)
            .json(&SignUpRequest::new(email, password))
            .send()
            .await
            .map_err(|e| AppError::FetchFailed(format!("sign up: request failed: {e}")))?;

        if !response.status().is_success() {
            return Err(Self::auth_failure(response, "sign up").await);
        }
        Ok(())
    }

    async fn sign_out(&self, auth: &AuthSession) -> AppResult<()> {
        let response = self
            .http_client
            .post(self.auth_url("logout"))
            .header("apikey", &self.anon_key)
            .bearer_auth(&auth.access_token)
            .send()
            .await
            .map_err(|e| AppError::FetchFailed(format!("sign out: request failed: {e}")))?;

        if !response.status().is_success() {
            return Err(Self::auth_failure(response, "sign out").await);
        }
        Ok(())
    }
}
