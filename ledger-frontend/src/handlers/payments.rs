use crate::domain::authz::{Action, Viewer};
use crate::domain::format::{display_date, format_brl, MISSING};
use crate::domain::payment_method;
use crate::forms::payment::{PaymentForm, PAYMENT_METHODS};
use crate::handlers::customers::customer_options;
use crate::handlers::sales::{customer_choices, CustomerOption};
use crate::handlers::{ensure, found, FilterParams, Nav};
use crate::models::payment::Payment;
use crate::models::user::AuthUser;
use crate::services::repository::LIST_LIMIT;
use crate::AppState;
use askama::Template;
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use rust_decimal::Decimal;
use service_core::error::AppError;

pub struct PaymentRow {
    pub id: i64,
    pub number: i64,
    pub date: String,
    pub customer: String,
    pub amount: String,
    pub method: String,
    pub notes: String,
    pub can_edit: bool,
}

impl PaymentRow {
    fn new(payment: &Payment, viewer: &Viewer) -> Self {
        Self {
            id: payment.payment_id,
            number: payment.display_number(),
            date: display_date(payment.date.as_deref()),
            customer: payment.customer_name(),
            amount: format_brl(payment.amount()),
            method: payment_method::normalize(payment.method.as_deref()),
            notes: payment.notes.clone().unwrap_or_else(|| MISSING.to_string()),
            can_edit: ensure(viewer, Action::Update, payment.created_by).is_ok(),
        }
    }
}

#[derive(Template)]
#[template(path = "payments.html")]
pub struct PaymentsTemplate {
    pub nav: Nav,
    pub search: String,
    pub start: String,
    pub end: String,
    pub customers: Vec<CustomerOption>,
    pub methods: Vec<&'static str>,
    pub payments: Vec<PaymentRow>,
    pub total: String,
    pub capped: bool,
}

pub async fn list_payments(
    State(state): State<AppState>,
    user: AuthUser,
    Query(params): Query<FilterParams>,
) -> Result<impl IntoResponse, AppError> {
    let viewer = user.viewer();
    let filter = params.ledger()?;
    let search = params.search().to_lowercase();

    let scope = params.scope(&viewer);
    let (payments, customers) = tokio::try_join!(
        state.repository.list_payments(user.token(), &scope, &filter),
        customer_options(&state, &user),
    )?;
    let capped = payments.len() >= LIST_LIMIT;

    let visible: Vec<&Payment> = payments
        .iter()
        .filter(|payment| matches_search(payment, &search))
        .collect();
    let total: Decimal = visible.iter().map(|payment| payment.amount()).sum();

    Ok(PaymentsTemplate {
        nav: Nav::from_user(&user),
        search: params.search(),
        start: filter.start.clone().unwrap_or_default(),
        end: filter.end.clone().unwrap_or_default(),
        customers: customer_choices(&customers, filter.customer_id),
        methods: PAYMENT_METHODS.to_vec(),
        payments: visible
            .into_iter()
            .map(|payment| PaymentRow::new(payment, &viewer))
            .collect(),
        total: format_brl(total),
        capped,
    })
}

/// Match on customer name or payment method.
fn matches_search(payment: &Payment, term: &str) -> bool {
    term.is_empty()
        || payment.customer_name().to_lowercase().contains(term)
        || payment
            .method
            .as_deref()
            .map(|method| method.to_lowercase().contains(term))
            .unwrap_or(false)
}

/// The paying customer must be visible to the viewer.
async fn check_customer(
    state: &AppState,
    user: &AuthUser,
    customer_id: i64,
) -> Result<(), AppError> {
    let customer = found(
        state.repository.get_customer(user.token(), customer_id).await?,
        "Cliente",
    )?;
    ensure(&user.viewer(), Action::Read, customer.created_by)
}

pub async fn create_payment(
    State(state): State<AppState>,
    user: AuthUser,
    Json(form): Json<PaymentForm>,
) -> Result<impl IntoResponse, AppError> {
    check_customer(&state, &user, form.customer_id()?).await?;
    let write = form.into_write(Some(user.user_id))?;
    let payment = state.repository.create_payment(user.token(), &write).await?;
    tracing::info!(payment_id = payment.payment_id, "Payment recorded");
    Ok((StatusCode::CREATED, Json(payment)))
}

/// Payment row for the edit form.
pub async fn get_payment(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let payment = found(
        state.repository.get_payment(user.token(), id).await?,
        "Pagamento",
    )?;
    ensure(&user.viewer(), Action::Read, payment.created_by)?;
    Ok(Json(payment))
}

pub async fn update_payment(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<i64>,
    Json(form): Json<PaymentForm>,
) -> Result<impl IntoResponse, AppError> {
    let existing = found(
        state.repository.get_payment(user.token(), id).await?,
        "Pagamento",
    )?;
    ensure(&user.viewer(), Action::Update, existing.created_by)?;
    let customer_id = form.customer_id()?;
    if existing.customer_id != Some(customer_id) {
        check_customer(&state, &user, customer_id).await?;
    }

    let write = form.into_write(None)?;
    let payment = state
        .repository
        .update_payment(user.token(), id, &write)
        .await?;
    Ok(Json(payment))
}

pub async fn delete_payment(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let existing = found(
        state.repository.get_payment(user.token(), id).await?,
        "Pagamento",
    )?;
    ensure(&user.viewer(), Action::Delete, existing.created_by)?;

    state.repository.delete_payment(user.token(), id).await?;
    tracing::info!(payment_id = id, "Payment deleted");
    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use uuid::Uuid;

    #[test]
    fn row_normalizes_method() {
        let viewer = Viewer::new(Uuid::new_v4(), true);
        let payment = Payment {
            payment_id: 5,
            amount: Some(dec!(1234.5)),
            method: Some("cartão de crédito".into()),
            ..Default::default()
        };
        let row = PaymentRow::new(&payment, &viewer);
        assert_eq!(row.method, "Cartão de Crédito");
        assert_eq!(row.amount, "R$ 1.234,50");
        assert_eq!(row.customer, "—");
        assert!(row.can_edit);
    }

    #[test]
    fn search_by_method() {
        let payment = Payment {
            payment_id: 1,
            method: Some("PIX".into()),
            ..Default::default()
        };
        assert!(matches_search(&payment, "pix"));
        assert!(!matches_search(&payment, "boleto"));
    }
}
