use crate::domain::authz::{authorize, Action};
use crate::models::user::AuthUser;
use axum::{extract::Request, middleware::Next, response::Response};
use service_core::error::AppError;

/// Gate for the admin routes. Unauthenticated requests are redirected to
/// `/login` by the `AuthUser` extractor; signed-in members get 403.
pub async fn require_admin(user: AuthUser, request: Request, next: Next) -> Result<Response, AppError> {
    if !authorize(&user.viewer(), Action::AdminOnly, None).is_allowed() {
        tracing::warn!(user_id = %user.user_id, path = %request.uri().path(), "Admin route refused");
        return Err(AppError::Forbidden(anyhow::anyhow!(
            "Acesso restrito a administradores"
        )));
    }

    Ok(next.run(request).await)
}
