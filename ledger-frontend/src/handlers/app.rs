use crate::models::user::SESSION_KEY;
use axum::response::{IntoResponse, Redirect};
use tower_sessions::Session;

/// Signed-in users land on the dashboard, everyone else on the login page.
pub async fn index(session: Session) -> impl IntoResponse {
    let signed_in = session
        .get::<serde_json::Value>(SESSION_KEY)
        .await
        .ok()
        .flatten()
        .is_some();
    if signed_in {
        Redirect::to("/dashboard")
    } else {
        Redirect::to("/login")
    }
}

pub async fn health_check() -> &'static str {
    "OK"
}
