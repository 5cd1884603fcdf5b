use crate::domain::authz::Viewer;
use crate::models::auth::AuthSession;
use crate::utils::jwt::decode_jwt_claims;
use crate::AppState;
use axum::{
    async_trait,
    extract::{FromRef, FromRequestParts},
    http::{request::Parts, StatusCode},
    response::{IntoResponse, Redirect, Response},
};
use serde::{Deserialize, Serialize};
use tower_sessions::Session;
use uuid::Uuid;

/// Session key holding the serialized [`AuthUser`].
pub const SESSION_KEY: &str = "auth_user";

/// Tokens are refreshed when they expire within this many seconds.
const REFRESH_MARGIN_SECS: i64 = 60;

/// Authenticated user context kept in the browser session.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AuthUser {
    pub user_id: Uuid,
    pub email: Option<String>,
    pub name: String,
    pub is_admin: bool,
    pub access_token: String,
    pub refresh_token: String,
    /// Unix seconds.
    pub expires_at: i64,
}

impl AuthUser {
    pub fn from_session(session: &AuthSession, name: String, is_admin: bool) -> Self {
        Self {
            user_id: session.user_id(),
            email: session.user.email.clone(),
            name,
            is_admin,
            access_token: session.access_token.clone(),
            refresh_token: session.refresh_token.clone(),
            expires_at: session_expiry(session, chrono::Utc::now().timestamp()),
        }
    }

    pub fn viewer(&self) -> Viewer {
        Viewer::new(self.user_id, self.is_admin)
    }

    pub fn token(&self) -> &str {
        &self.access_token
    }

    pub fn needs_refresh(&self, now: i64) -> bool {
        self.expires_at - now <= REFRESH_MARGIN_SECS
    }

    /// Take over the tokens of a refreshed session.
    pub fn refreshed(mut self, session: &AuthSession, now: i64) -> Self {
        self.access_token = session.access_token.clone();
        self.refresh_token = session.refresh_token.clone();
        self.expires_at = session_expiry(session, now);
        self
    }

    pub fn initials(&self) -> String {
        let initials: String = self
            .name
            .split_whitespace()
            .filter_map(|word| word.chars().next())
            .take(2)
            .collect::<String>()
            .to_uppercase();
        if initials.is_empty() {
            "U".to_string()
        } else {
            initials
        }
    }
}

/// `expires_at`, else `now + expires_in`, else the token's own `exp`.
fn session_expiry(session: &AuthSession, now: i64) -> i64 {
    session
        .expires_at
        .or_else(|| session.expires_in.map(|secs| now + secs))
        .or_else(|| {
            decode_jwt_claims(&session.access_token)
                .ok()
                .map(|claims| claims.exp)
        })
        .unwrap_or(now)
}

#[async_trait]
impl<S> FromRequestParts<S> for AuthUser
where
    AppState: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = Response;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let session = Session::from_request_parts(parts, state)
            .await
            .map_err(|_| {
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Failed to extract session",
                )
                    .into_response()
            })?;

        let user: AuthUser = match session.get(SESSION_KEY).await {
            Ok(Some(user)) => user,
            Ok(None) => return Err(Redirect::to("/login").into_response()),
            Err(e) => {
                tracing::warn!(error = %e, "Unreadable session");
                return Err(Redirect::to("/login").into_response());
            }
        };

        let now = chrono::Utc::now().timestamp();
        let user = if user.needs_refresh(now) {
            let app = AppState::from_ref(state);
            match app.backend.refresh_session(&user.refresh_token).await {
                Ok(refreshed) => {
                    let user = user.refreshed(&refreshed, now);
                    if let Err(e) = session.insert(SESSION_KEY, &user).await {
                        tracing::error!(error = %e, "Failed to store refreshed session");
                    }
                    app.sessions.token_refreshed(refreshed);
                    user
                }
                Err(e) => {
                    tracing::info!(user_id = %user.user_id, error = %e, "Session refresh failed");
                    let _ = session.flush().await;
                    app.sessions.signed_out(user.user_id);
                    return Err(Redirect::to("/login").into_response());
                }
            }
        } else {
            user
        };

        tracing::Span::current().record("user_id", tracing::field::display(user.user_id));
        Ok(user)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn auth_session(expires_at: Option<i64>, expires_in: Option<i64>) -> AuthSession {
        serde_json::from_value(json!({
            "access_token": "a.b.c",
            "refresh_token": "r1",
            "expires_at": expires_at,
            "expires_in": expires_in,
            "user": { "id": Uuid::nil(), "email": "ana@loja.com" }
        }))
        .unwrap()
    }

    #[test]
    fn expiry_prefers_absolute_timestamp() {
        assert_eq!(session_expiry(&auth_session(Some(500), Some(3600)), 100), 500);
        assert_eq!(session_expiry(&auth_session(None, Some(3600)), 100), 3700);
    }

    #[test]
    fn refresh_window() {
        let user = AuthUser::from_session(&auth_session(Some(1_000), None), "Ana Souza".into(), false);
        assert!(!user.needs_refresh(900));
        assert!(user.needs_refresh(950));
        assert_eq!(user.initials(), "AS");
        assert!(!user.viewer().is_admin());
    }
}
