//! CSV downloads of the raw backend rows.

use crate::domain::csv_export::{filename, to_csv, ExportError, Row};
use crate::domain::settlement::{is_settled, StatusFilter};
use crate::handlers::FilterParams;
use crate::models::user::AuthUser;
use crate::services::repository::LedgerFilter;
use crate::AppState;
use axum::{
    extract::{Query, State},
    http::header,
    response::{IntoResponse, Response},
};
use service_core::error::AppError;

pub async fn export_customers(
    State(state): State<AppState>,
    user: AuthUser,
    Query(params): Query<FilterParams>,
) -> Result<Response, AppError> {
    // Customers carry no sale date; only the customer filter applies.
    let filter = LedgerFilter {
        customer_id: params.ledger()?.customer_id,
        ..Default::default()
    };
    let rows = state
        .repository
        .export_rows(user.token(), "customers", &params.scope(&user.viewer()), &filter)
        .await?;
    csv_response("customers", &rows)
}

pub async fn export_sales(
    State(state): State<AppState>,
    user: AuthUser,
    Query(params): Query<FilterParams>,
) -> Result<Response, AppError> {
    let status = params.status();
    let rows = state
        .repository
        .export_rows(
            user.token(),
            "sales",
            &params.scope(&user.viewer()),
            &params.ledger()?,
        )
        .await?;
    csv_response("sales", &filter_status(rows, status))
}

pub async fn export_sale_items(
    State(state): State<AppState>,
    user: AuthUser,
    Query(params): Query<FilterParams>,
) -> Result<Response, AppError> {
    let rows = state
        .repository
        .export_sale_items(
            user.token(),
            &params.scope(&user.viewer()),
            &params.ledger()?,
            params.status(),
        )
        .await?;
    csv_response("sale_items", &rows)
}

pub async fn export_payments(
    State(state): State<AppState>,
    user: AuthUser,
    Query(params): Query<FilterParams>,
) -> Result<Response, AppError> {
    let rows = state
        .repository
        .export_rows(
            user.token(),
            "payments",
            &params.scope(&user.viewer()),
            &params.ledger()?,
        )
        .await?;
    csv_response("payments", &rows)
}

/// Admin only; guarded at the router.
pub async fn export_profiles(
    State(state): State<AppState>,
    user: AuthUser,
) -> Result<Response, AppError> {
    let rows = state.repository.export_profiles(user.token()).await?;
    csv_response("profiles", &rows)
}

fn filter_status(rows: Vec<Row>, status: StatusFilter) -> Vec<Row> {
    if status.is_all() {
        return rows;
    }
    rows.into_iter()
        .filter(|row| status.accepts(is_settled(row.get("pago"), row.get("controle_vendas"))))
        .collect()
}

fn csv_response(table: &str, rows: &[Row]) -> Result<Response, AppError> {
    let body = to_csv(rows).map_err(|e| match e {
        ExportError::Empty => {
            AppError::NotFound(anyhow::anyhow!("Nenhum registro para exportar"))
        }
        other => AppError::InternalError(anyhow::Error::new(other)),
    })?;
    let name = filename(table, chrono::Utc::now().timestamp_millis());
    tracing::info!(table = %table, rows = rows.len(), "CSV exported");

    Ok((
        [
            (header::CONTENT_TYPE, "text/csv; charset=utf-8".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}\"", name),
            ),
        ],
        body,
    )
        .into_response())
}
