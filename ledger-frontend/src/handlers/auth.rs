use crate::forms::password::{ForgotPasswordForm, PasswordForm, ResetPasswordForm};
use crate::forms::signup::SignUpForm;
use crate::models::auth::AuthSession;
use crate::models::profile::AppUser;
use crate::models::user::{AuthUser, SESSION_KEY};
use crate::utils::jwt::decode_jwt_claims;
use crate::AppState;
use askama::Template;
use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Redirect, Response},
    Form, Json,
};
use serde::Deserialize;
use serde_json::json;
use service_core::error::AppError;
use tower_sessions::Session;

#[derive(Template, Default)]
#[template(path = "login.html")]
pub struct LoginTemplate {
    pub error: Option<String>,
    pub notice: Option<String>,
    pub email: String,
}

#[derive(Template, Default, Clone)]
#[template(path = "request_access.html")]
pub struct RequestAccessTemplate {
    pub error: Option<String>,
    pub notice: Option<String>,
    pub full_name: String,
    pub username: String,
    pub email: String,
    pub phone: String,
}

#[derive(Deserialize)]
pub struct LoginForm {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
}

#[derive(Deserialize, Default)]
pub struct LoginParams {
    #[serde(default)]
    pub notice: Option<String>,
}

pub async fn login_page(Query(params): Query<LoginParams>) -> impl IntoResponse {
    LoginTemplate {
        notice: params.notice,
        ..Default::default()
    }
}

fn login_error(status: StatusCode, email: &str, message: &str) -> Response {
    (
        status,
        LoginTemplate {
            error: Some(message.to_string()),
            email: email.to_string(),
            ..Default::default()
        },
    )
        .into_response()
}

pub async fn login_handler(
    State(state): State<AppState>,
    session: Session,
    Form(form): Form<LoginForm>,
) -> Response {
    let email = form.email.trim().to_lowercase();
    if email.is_empty() || form.password.is_empty() {
        return login_error(StatusCode::BAD_REQUEST, &email, "Informe email e senha.");
    }

    let auth_session = match state.backend.sign_in_with_password(&email, &form.password).await {
        Ok(auth_session) => auth_session,
        Err(AppError::AuthError(e)) => {
            tracing::info!(error = %e, "Sign-in rejected");
            return login_error(StatusCode::UNAUTHORIZED, &email, "Email ou senha inválidos.");
        }
        Err(e) => {
            tracing::error!(error = %e, "Sign-in failed");
            return login_error(
                e.status_code(),
                &email,
                "Não foi possível entrar agora. Tente novamente.",
            );
        }
    };

    let app_user = match state
        .repository
        .app_user(&auth_session.access_token, auth_session.user_id())
        .await
    {
        Ok(app_user) => app_user,
        Err(e) => {
            tracing::warn!(user_id = %auth_session.user_id(), error = %e, "Profile unavailable at sign-in");
            None
        }
    };
    let is_admin = resolve_admin(&auth_session, app_user.as_ref());

    if let Err(message) = admission(&auth_session, app_user.as_ref(), is_admin) {
        tracing::info!(user_id = %auth_session.user_id(), reason = message, "Sign-in refused");
        if let Err(e) = state.backend.sign_out(&auth_session.access_token).await {
            tracing::warn!(error = %e, "Failed to revoke refused session");
        }
        return login_error(StatusCode::FORBIDDEN, &email, message);
    }

    let name = app_user
        .as_ref()
        .and_then(|user| user.full_name.clone())
        .filter(|name| !name.trim().is_empty())
        .or_else(|| auth_session.user.metadata_str("full_name"))
        .unwrap_or_else(|| email.clone());
    let user = AuthUser::from_session(&auth_session, name, is_admin);

    if let Err(e) = session.cycle_id().await {
        tracing::warn!(error = %e, "Failed to rotate session id");
    }
    if let Err(e) = session.insert(SESSION_KEY, &user).await {
        tracing::error!(error = %e, "Failed to store session");
        return login_error(
            StatusCode::INTERNAL_SERVER_ERROR,
            &email,
            "Não foi possível iniciar a sessão.",
        );
    }
    state.sessions.signed_in(auth_session);

    tracing::info!(user_id = %user.user_id, is_admin, "User signed in");
    Redirect::to("/dashboard").into_response()
}

/// Admin when the profile role, the token metadata or the auth record says so.
fn resolve_admin(auth_session: &AuthSession, app_user: Option<&AppUser>) -> bool {
    let from_token = decode_jwt_claims(&auth_session.access_token)
        .map(|claims| claims.says_admin())
        .unwrap_or_else(|e| {
            tracing::warn!(error = %e, "Undecodable access token");
            false
        });
    app_user.map(AppUser::has_admin_role).unwrap_or(false)
        || from_token
        || auth_session.user.metadata_says_admin()
}

/// Unconfirmed emails never get in; unapproved members wait for an admin.
fn admission(
    auth_session: &AuthSession,
    app_user: Option<&AppUser>,
    is_admin: bool,
) -> Result<(), &'static str> {
    if !auth_session.user.email_confirmed() {
        return Err("Confirme seu email antes de acessar.");
    }
    let approved = app_user.map(AppUser::approved).unwrap_or(false);
    if !approved && !is_admin {
        return Err("Seu acesso ainda não foi aprovado por um administrador.");
    }
    Ok(())
}

pub async fn logout_handler(
    State(state): State<AppState>,
    session: Session,
) -> impl IntoResponse {
    if let Ok(Some(user)) = session.get::<AuthUser>(SESSION_KEY).await {
        if let Err(e) = state.backend.sign_out(user.token()).await {
            tracing::warn!(user_id = %user.user_id, error = %e, "Failed to revoke token during logout");
        }
        state.sessions.signed_out(user.user_id);
        tracing::info!(user_id = %user.user_id, "User signed out");
    }

    if let Err(e) = session.flush().await {
        tracing::error!(error = %e, "Failed to clear session");
    }
    Redirect::to("/login")
}

pub async fn request_access_page() -> impl IntoResponse {
    RequestAccessTemplate::default()
}

pub async fn request_access_handler(
    State(state): State<AppState>,
    Form(form): Form<SignUpForm>,
) -> Response {
    let echo = RequestAccessTemplate {
        full_name: form.full_name.trim().to_string(),
        username: form.username.trim().to_string(),
        email: form.email.trim().to_string(),
        phone: form.phone.trim().to_string(),
        ..Default::default()
    };
    let fail = |status: StatusCode, message: String| {
        (
            status,
            RequestAccessTemplate {
                error: Some(message),
                ..echo.clone()
            },
        )
            .into_response()
    };

    let sign_up = match form.into_sign_up() {
        Ok(sign_up) => sign_up,
        Err(e) => return fail(e.status_code(), validation_text(&e)),
    };

    match state
        .repository
        .username_taken(state.backend.anon_token(), &sign_up.metadata.username, None)
        .await
    {
        Ok(true) => {
            return fail(
                StatusCode::CONFLICT,
                "Este username já está em uso. Escolha outro.".to_string(),
            )
        }
        Ok(false) => {}
        Err(e) => tracing::warn!(error = %e, "Username check unavailable"),
    }

    if let Err(e) = state
        .backend
        .sign_up(&sign_up.email, &sign_up.password, &sign_up.metadata)
        .await
    {
        tracing::warn!(error = %e, "Sign-up rejected");
        return fail(e.status_code(), e.user_message());
    }

    tracing::info!(username = %sign_up.metadata.username, "Access requested");
    RequestAccessTemplate {
        notice: Some("Conta criada. Verifique seu email e confirme para acessar.".to_string()),
        ..Default::default()
    }
    .into_response()
}

/// First field message of a validation failure, else the error's own text.
fn validation_text(err: &AppError) -> String {
    match err {
        AppError::ValidationError(errors) => errors
            .field_errors()
            .values()
            .flat_map(|errors| errors.iter())
            .find_map(|error| error.message.as_ref().map(|m| m.to_string()))
            .unwrap_or_else(|| err.user_message()),
        _ => err.user_message(),
    }
}

pub async fn forgot_password_handler(
    State(state): State<AppState>,
    Form(form): Form<ForgotPasswordForm>,
) -> Response {
    let email = match form.email() {
        Ok(email) => email,
        Err(e) => return login_error(e.status_code(), "", &e.user_message()),
    };
    if let Err(e) = state.backend.send_password_recovery(&email).await {
        tracing::warn!(error = %e, "Password recovery request failed");
    }
    // Same answer whether or not the address exists.
    LoginTemplate {
        notice: Some("Se o email estiver cadastrado, enviaremos um link de redefinição.".to_string()),
        email,
        ..Default::default()
    }
    .into_response()
}

pub async fn reset_password_handler(
    State(state): State<AppState>,
    Json(form): Json<ResetPasswordForm>,
) -> Result<impl IntoResponse, AppError> {
    let (token, password) = form.checked()?;
    let user = state.backend.update_password(token, password).await?;
    tracing::info!(user_id = %user.id, "Password reset");
    state.sessions.user_updated(user);
    Ok(Json(json!({ "message": "Senha redefinida. Entre com a nova senha." })))
}

pub async fn change_password_handler(
    State(state): State<AppState>,
    user: AuthUser,
    Json(form): Json<PasswordForm>,
) -> Result<impl IntoResponse, AppError> {
    let password = form.checked()?;
    let record = state.backend.update_password(user.token(), password).await?;
    tracing::info!(user_id = %user.user_id, "Password changed");
    state.sessions.user_updated(record);
    Ok(Json(json!({ "message": "Senha atualizada." })))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use uuid::Uuid;

    fn auth_session(confirmed: bool, metadata: serde_json::Value) -> AuthSession {
        serde_json::from_value(json!({
            "access_token": "not-a-jwt",
            "refresh_token": "r",
            "user": {
                "id": Uuid::new_v4(),
                "email": "ana@loja.com",
                "email_confirmed_at": if confirmed { json!("2024-01-01T00:00:00Z") } else { json!(null) },
                "user_metadata": metadata
            }
        }))
        .unwrap()
    }

    fn app_user(approved: bool, role: &str) -> AppUser {
        AppUser {
            id: Uuid::new_v4(),
            role: Some(role.to_string()),
            is_approved: Some(approved),
            ..Default::default()
        }
    }

    #[test]
    fn unconfirmed_email_is_refused_even_for_admins() {
        let session = auth_session(false, json!({}));
        assert!(admission(&session, Some(&app_user(true, "admin")), true).is_err());
    }

    #[test]
    fn unapproved_members_wait_but_admins_pass() {
        let session = auth_session(true, json!({}));
        let pending = app_user(false, "seller");
        assert_eq!(
            admission(&session, Some(&pending), false),
            Err("Seu acesso ainda não foi aprovado por um administrador.")
        );
        assert!(admission(&session, Some(&pending), true).is_ok());
        assert!(admission(&session, Some(&app_user(true, "seller")), false).is_ok());
    }

    #[test]
    fn admin_from_profile_or_metadata() {
        let session = auth_session(true, json!({}));
        assert!(resolve_admin(&session, Some(&app_user(true, "admin"))));
        assert!(!resolve_admin(&session, Some(&app_user(true, "seller"))));
        assert!(!resolve_admin(&session, None));

        let session = auth_session(true, json!({ "role": "admin" }));
        assert!(resolve_admin(&session, None));
    }
}
