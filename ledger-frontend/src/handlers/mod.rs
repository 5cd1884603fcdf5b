//! HTTP handlers. Pages render askama templates; write endpoints take JSON
//! and answer with the stored row.

pub mod admin;
pub mod app;
pub mod auth;
pub mod customers;
pub mod dashboard;
pub mod export;
pub mod metrics;
pub mod payments;
pub mod sales;

use crate::domain::authz::{authorize, owner_scope, Action, OwnerScope, Viewer};
use crate::domain::format::is_valid_iso_date;
use crate::domain::settlement::StatusFilter;
use crate::models::user::AuthUser;
use crate::services::repository::LedgerFilter;
use serde::Deserialize;
use service_core::error::AppError;
use std::str::FromStr;
use uuid::Uuid;

/// Signed-in user as shown in the page header.
#[derive(Debug, Clone)]
pub struct Nav {
    pub name: String,
    pub initials: String,
    pub is_admin: bool,
}

impl Nav {
    pub fn from_user(user: &AuthUser) -> Self {
        Self {
            name: user.name.clone(),
            initials: user.initials(),
            is_admin: user.is_admin,
        }
    }
}

/// Refuse `action` on a row owned by `owner`.
pub(crate) fn ensure(viewer: &Viewer, action: Action, owner: Option<Uuid>) -> Result<(), AppError> {
    if authorize(viewer, action, owner).is_allowed() {
        Ok(())
    } else {
        tracing::warn!(user_id = %viewer.user_id, ?action, "Access denied");
        Err(AppError::Forbidden(anyhow::anyhow!(
            "Você não tem permissão para acessar este registro"
        )))
    }
}

pub(crate) fn found<T>(row: Option<T>, what: &str) -> Result<T, AppError> {
    row.ok_or_else(|| AppError::NotFound(anyhow::anyhow!("{} não encontrado", what)))
}

/// Filters shared by the list pages, the dashboard and the exports. Every
/// field arrives as text; blank means unset.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct FilterParams {
    #[serde(default)]
    pub q: Option<String>,
    /// Comma-separated creator ids; admins only.
    #[serde(default)]
    pub users: Option<String>,
    #[serde(default)]
    pub customer_id: Option<String>,
    #[serde(default)]
    pub start: Option<String>,
    #[serde(default)]
    pub end: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
}

impl FilterParams {
    pub fn search(&self) -> String {
        self.q.as_deref().unwrap_or_default().trim().to_string()
    }

    pub fn users(&self) -> Vec<Uuid> {
        self.users
            .as_deref()
            .unwrap_or_default()
            .split(',')
            .filter_map(|raw| Uuid::parse_str(raw.trim()).ok())
            .collect()
    }

    pub fn scope(&self, viewer: &Viewer) -> OwnerScope {
        owner_scope(viewer, &self.users())
    }

    pub fn status(&self) -> StatusFilter {
        match self.status.as_deref().map(str::trim) {
            Some("quitado") => StatusFilter::Settled,
            Some("nao_quitado") => StatusFilter::NotSettled,
            _ => StatusFilter::All,
        }
    }

    pub fn ledger(&self) -> Result<LedgerFilter, AppError> {
        Ok(LedgerFilter {
            customer_id: parse_param(self.customer_id.as_deref())?,
            start: date_param(self.start.as_deref())?,
            end: date_param(self.end.as_deref())?,
        })
    }
}

pub(crate) fn parse_param<T: FromStr>(raw: Option<&str>) -> Result<Option<T>, AppError> {
    match raw.map(str::trim).filter(|value| !value.is_empty()) {
        None => Ok(None),
        Some(value) => value
            .parse()
            .map(Some)
            .map_err(|_| AppError::BadRequest(anyhow::anyhow!("Parâmetro inválido: {}", value))),
    }
}

fn date_param(raw: Option<&str>) -> Result<Option<String>, AppError> {
    match raw.map(str::trim).filter(|value| !value.is_empty()) {
        None => Ok(None),
        Some(date) if is_valid_iso_date(date) => Ok(Some(date.to_string())),
        Some(date) => Err(AppError::BadRequest(anyhow::anyhow!("Data inválida: {}", date))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_params_are_unset() {
        let params = FilterParams {
            customer_id: Some(" ".into()),
            start: Some(String::new()),
            end: Some("2024-03-31".into()),
            status: Some("nao_quitado".into()),
            ..Default::default()
        };
        let ledger = params.ledger().unwrap();
        assert_eq!(ledger.customer_id, None);
        assert_eq!(ledger.start, None);
        assert_eq!(ledger.end.as_deref(), Some("2024-03-31"));
        assert_eq!(params.status(), StatusFilter::NotSettled);
    }

    #[test]
    fn rejects_malformed_params() {
        let params = FilterParams {
            customer_id: Some("abc".into()),
            ..Default::default()
        };
        assert!(params.ledger().is_err());

        let params = FilterParams {
            start: Some("2024-02-30".into()),
            ..Default::default()
        };
        assert!(params.ledger().is_err());
    }

    #[test]
    fn users_list_skips_garbage() {
        let id = Uuid::new_v4();
        let params = FilterParams {
            users: Some(format!("{}, nope,", id)),
            ..Default::default()
        };
        assert_eq!(params.users(), vec![id]);

        let member = Viewer::new(Uuid::new_v4(), false);
        assert_eq!(params.scope(&member), OwnerScope::Only(member.user_id));
    }

    #[test]
    fn members_cannot_touch_foreign_rows() {
        let viewer = Viewer::new(Uuid::new_v4(), false);
        assert!(ensure(&viewer, Action::Update, Some(viewer.user_id)).is_ok());
        let err = ensure(&viewer, Action::Delete, Some(Uuid::new_v4())).unwrap_err();
        assert!(matches!(err, AppError::Forbidden(_)));
    }
}
