use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Signed-in user as seen by the platform's auth service.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AuthSession {
    #[serde(skip_serializing)]
    pub access_token: String,
    #[serde(default, skip_serializing)]
    pub refresh_token: Option<String>,
    pub user_id: Uuid,
    pub email: Option<String>,
}

/// Body of `POST /auth/v1/token?grant_type=password`.
#[derive(Debug, Serialize)]
pub struct PasswordGrant<'a> {
    pub email: &'a str,
    pub password: &'a str,
}

/// Body of `POST /auth/v1/signup`.
#[derive(Debug, Serialize)]
pub struct SignUpRequest<'a> {
    pub email: &'a str,
    pub password: &'a str,
    pub data: SignUpMetadata,
}

#[derive(Debug, Serialize)]
pub struct SignUpMetadata {
    pub full_name: String,
}

impl<'a> SignUpRequest<'a> {
    /// Full name defaults to the local part of the address.
    #[must_use]
    pub fn new(email: &'a str, password: &'a str) -> Self {
        let full_name = email.split('@').next().unwrap_or_default().to_string();
        Self {
            email,
            password,
            data: SignUpMetadata { full_name },
        }
    }
}

/// Response of the password grant.
#[derive(Debug, Clone, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub expires_in: Option<i64>,
    pub user: AuthUser,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AuthUser {
    pub id: Uuid,
    #[serde(default)]
    pub email: Option<String>,
}

impl From<TokenResponse> for AuthSession {
    fn from(token: TokenResponse) -> Self {
        Self {
            access_token: token.access_token,
            refresh_token: token.refresh_token,
            user_id: token.user.id,
            email: token.user.email,
        }
    }
}

/// Error body returned by the auth service. Field names differ between
/// versions, so every known variant is optional.
#[derive(Debug, Default, Deserialize)]
pub struct AuthErrorBody {
    #[serde(default)]
    pub error_description: Option<String>,
    #[serde(default)]
    pub msg: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
}

impl AuthErrorBody {
    #[must_use]
    pub fn into_message(self) -> Option<String> {
        self.error_description
            .or(self.msg)
            .or(self.message)
            .or(self.error)
    }
}
