//! Sessions and users as returned by the hosted auth service.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// Auth-service user record.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AuthUserRecord {
    pub id: Uuid,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub email_confirmed_at: Option<String>,
    #[serde(default)]
    pub user_metadata: Value,
    #[serde(default)]
    pub app_metadata: Value,
}

impl AuthUserRecord {
    pub fn email_confirmed(&self) -> bool {
        self.email_confirmed_at
            .as_deref()
            .map(|at| !at.trim().is_empty())
            .unwrap_or(false)
    }

    /// `user_metadata.role` or `app_metadata.role` equal to `admin`.
    pub fn metadata_says_admin(&self) -> bool {
        [&self.user_metadata, &self.app_metadata]
            .iter()
            .any(|meta| meta.get("role").and_then(Value::as_str) == Some("admin"))
    }

    pub fn metadata_str(&self, key: &str) -> Option<String> {
        self.user_metadata
            .get(key)
            .and_then(Value::as_str)
            .map(str::to_string)
    }
}

/// Token grant response.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AuthSession {
    pub access_token: String,
    pub refresh_token: String,
    #[serde(default)]
    pub expires_in: Option<i64>,
    /// Unix seconds.
    #[serde(default)]
    pub expires_at: Option<i64>,
    #[serde(default)]
    pub token_type: Option<String>,
    pub user: AuthUserRecord,
}

impl AuthSession {
    pub fn user_id(&self) -> Uuid {
        self.user.id
    }
}

/// Metadata attached to a sign-up request.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct SignUpMetadata {
    pub full_name: String,
    pub username: String,
    pub phone: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub birthday: Option<String>,
}
