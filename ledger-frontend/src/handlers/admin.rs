use crate::domain::format::{display_date, MISSING};
use crate::forms::profile::ProfileForm;
use crate::handlers::{found, Nav};
use crate::models::profile::AppUser;
use crate::models::user::AuthUser;
use crate::services::repository::ProfileFlag;
use crate::AppState;
use askama::Template;
use axum::{
    extract::{Path, Query, State},
    response::IntoResponse,
    Json,
};
use serde::Deserialize;
use serde_json::json;
use service_core::error::AppError;
use uuid::Uuid;

pub struct UserRow {
    pub id: String,
    pub name: String,
    pub username: String,
    pub email: String,
    pub phone: String,
    pub birthday: String,
    pub notes: String,
    pub role: String,
    pub approved: bool,
    pub active: bool,
    pub created_at: String,
    pub is_self: bool,
}

impl UserRow {
    fn new(user: &AppUser, viewer_id: Uuid) -> Self {
        let text = |value: &Option<String>| value.clone().unwrap_or_default();
        Self {
            id: user.id.to_string(),
            name: user.display_name(),
            username: text(&user.username),
            email: user.email.clone().unwrap_or_else(|| MISSING.to_string()),
            phone: text(&user.phone),
            birthday: text(&user.birthday),
            notes: text(&user.notes),
            role: if user.has_admin_role() {
                "admin".to_string()
            } else {
                user.role.clone().unwrap_or_else(|| "usuário".to_string())
            },
            approved: user.approved(),
            active: user.active(),
            created_at: display_date(user.created_at.as_deref()),
            is_self: user.id == viewer_id,
        }
    }
}

#[derive(Template)]
#[template(path = "admin_users.html")]
pub struct AdminUsersTemplate {
    pub nav: Nav,
    pub search: String,
    pub users: Vec<UserRow>,
    pub pending_approval: usize,
}

#[derive(Debug, Default, Deserialize)]
pub struct SearchParams {
    #[serde(default)]
    pub q: Option<String>,
}

pub async fn list_users(
    State(state): State<AppState>,
    user: AuthUser,
    Query(params): Query<SearchParams>,
) -> Result<impl IntoResponse, AppError> {
    let search = params.q.unwrap_or_default().trim().to_string();
    let users = state.repository.list_app_users(user.token()).await?;
    let pending_approval = users.iter().filter(|u| !u.approved()).count();

    Ok(AdminUsersTemplate {
        nav: Nav::from_user(&user),
        users: users
            .iter()
            .filter(|u| u.matches_search(&search))
            .map(|u| UserRow::new(u, user.user_id))
            .collect(),
        search,
        pending_approval,
    })
}

#[derive(Debug, Deserialize)]
pub struct FlagChange {
    pub value: bool,
}

pub async fn set_approval(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
    Json(change): Json<FlagChange>,
) -> Result<impl IntoResponse, AppError> {
    set_flag(&state, &user, id, ProfileFlag::Approved, change.value).await
}

pub async fn set_active(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
    Json(change): Json<FlagChange>,
) -> Result<impl IntoResponse, AppError> {
    set_flag(&state, &user, id, ProfileFlag::Active, change.value).await
}

async fn set_flag(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
    flag: ProfileFlag,
    value: bool,
) -> Result<Json<serde_json::Value>, AppError> {
    state
        .repository
        .set_profile_flag(user.token(), id, flag, value)
        .await?;
    tracing::info!(admin_id = %user.user_id, target = %id, flag = flag.column(), value, "Admin changed user flag");
    Ok(Json(json!({ "id": id, flag.column(): value })))
}

pub async fn send_reset(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let target = found(state.repository.app_user(user.token(), id).await?, "Usuário")?;
    let email = target
        .email
        .filter(|email| !email.trim().is_empty())
        .ok_or_else(|| AppError::BadRequest(anyhow::anyhow!("Usuário sem email cadastrado")))?;

    state.backend.send_password_recovery(&email).await?;
    tracing::info!(admin_id = %user.user_id, target = %id, "Password reset email sent");
    Ok(Json(json!({
        "message": format!("Email de redefinição enviado para {}", email)
    })))
}

pub async fn update_user(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
    Json(form): Json<ProfileForm>,
) -> Result<impl IntoResponse, AppError> {
    let username = form.username();
    if !username.is_empty()
        && state
            .repository
            .username_taken(user.token(), &username, Some(id))
            .await?
    {
        return Err(AppError::Conflict(anyhow::anyhow!(
            "Este username já está em uso."
        )));
    }

    let write = form.into_write()?;
    state.repository.update_profile(user.token(), id, &write).await?;
    tracing::info!(admin_id = %user.user_id, target = %id, "Profile updated");
    Ok(Json(write))
}
