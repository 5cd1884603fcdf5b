use crate::domain::authz::{owner_scope, Action};
use crate::domain::format::{display_date, format_brl, MISSING};
use crate::forms::customer::CustomerForm;
use crate::handlers::{ensure, found, FilterParams, Nav};
use crate::models::customer::Customer;
use crate::models::sale::SaleWithItems;
use crate::models::user::AuthUser;
use crate::AppState;
use askama::Template;
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use chrono::{Datelike, NaiveDate};
use rust_decimal::Decimal;
use serde::Deserialize;
use service_core::error::AppError;

pub struct CustomerRow {
    pub id: i64,
    pub control: i64,
    pub name: String,
    pub phone: String,
    pub email: String,
    pub city: String,
    pub birthday: String,
    pub can_edit: bool,
}

impl CustomerRow {
    fn new(customer: &Customer, can_edit: bool) -> Self {
        let text = |value: &Option<String>| {
            value
                .as_deref()
                .filter(|v| !v.trim().is_empty())
                .unwrap_or(MISSING)
                .to_string()
        };
        Self {
            id: customer.customer_id,
            control: customer.control_number(),
            name: customer.display_name(),
            phone: text(&customer.phone),
            email: text(&customer.email),
            city: text(&customer.city),
            birthday: display_date(customer.birthday.as_deref()),
            can_edit,
        }
    }
}

#[derive(Template)]
#[template(path = "customers.html")]
pub struct CustomersTemplate {
    pub nav: Nav,
    pub search: String,
    pub customers: Vec<CustomerRow>,
}

pub async fn list_customers(
    State(state): State<AppState>,
    user: AuthUser,
    Query(params): Query<FilterParams>,
) -> Result<impl IntoResponse, AppError> {
    let viewer = user.viewer();
    let search = params.search();
    let customers = state
        .repository
        .list_customers(user.token(), &params.scope(&viewer))
        .await?;

    let rows = customers
        .iter()
        .filter(|customer| customer.matches_search(&search))
        .map(|customer| {
            let can_edit = ensure(&viewer, Action::Update, customer.created_by).is_ok();
            CustomerRow::new(customer, can_edit)
        })
        .collect();

    Ok(CustomersTemplate {
        nav: Nav::from_user(&user),
        search,
        customers: rows,
    })
}

pub async fn create_customer(
    State(state): State<AppState>,
    user: AuthUser,
    Json(form): Json<CustomerForm>,
) -> Result<impl IntoResponse, AppError> {
    let write = form.into_write(Some(user.user_id))?;
    let customer = state.repository.create_customer(user.token(), &write).await?;
    tracing::info!(customer_id = customer.customer_id, "Customer created");
    Ok((StatusCode::CREATED, Json(customer)))
}

pub struct CustomerSaleRow {
    pub id: i64,
    pub date: String,
    pub amount: String,
    pub settled: bool,
    pub items: usize,
}

#[derive(Template)]
#[template(path = "customer_detail.html")]
pub struct CustomerDetailTemplate {
    pub nav: Nav,
    pub customer: CustomerRow,
    pub edit: CustomerForm,
    pub notes: String,
    pub month: String,
    pub sales: Vec<CustomerSaleRow>,
    pub total: String,
    pub unpaid: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct DetailParams {
    /// `YYYY-MM`.
    #[serde(default)]
    pub month: Option<String>,
}

pub async fn customer_detail(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<i64>,
    Query(params): Query<DetailParams>,
) -> Result<impl IntoResponse, AppError> {
    let viewer = user.viewer();
    let customer = found(
        state.repository.get_customer(user.token(), id).await?,
        "Cliente",
    )?;
    ensure(&viewer, Action::Read, customer.created_by)?;

    let month = params
        .month
        .as_deref()
        .map(str::trim)
        .filter(|m| !m.is_empty())
        .map(str::to_string);
    let range = month.as_deref().map(month_range).transpose()?;
    let sales = state
        .repository
        .customer_sales(user.token(), id, range)
        .await?;

    let total: Decimal = sales.iter().map(SaleWithItems::amount).sum();
    let unpaid: Decimal = sales
        .iter()
        .filter(|sale| !sale.is_settled())
        .map(SaleWithItems::amount)
        .sum();
    let can_edit = ensure(&viewer, Action::Update, customer.created_by).is_ok();

    Ok(CustomerDetailTemplate {
        nav: Nav::from_user(&user),
        notes: customer.notes.clone().unwrap_or_default(),
        edit: CustomerForm::from(&customer),
        customer: CustomerRow::new(&customer, can_edit),
        month: month.unwrap_or_default(),
        sales: sales
            .iter()
            .map(|sale| CustomerSaleRow {
                id: sale.sale_id,
                date: display_date(sale.date.as_deref()),
                amount: format_brl(sale.amount()),
                settled: sale.is_settled(),
                items: sale.item_count(),
            })
            .collect(),
        total: format_brl(total),
        unpaid: format_brl(unpaid),
    })
}

pub async fn update_customer(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<i64>,
    Json(form): Json<CustomerForm>,
) -> Result<impl IntoResponse, AppError> {
    let existing = found(
        state.repository.get_customer(user.token(), id).await?,
        "Cliente",
    )?;
    ensure(&user.viewer(), Action::Update, existing.created_by)?;

    let write = form.into_write(None)?;
    let customer = state
        .repository
        .update_customer(user.token(), id, &write)
        .await?;
    Ok(Json(customer))
}

pub async fn delete_customer(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let existing = found(
        state.repository.get_customer(user.token(), id).await?,
        "Cliente",
    )?;
    ensure(&user.viewer(), Action::Delete, existing.created_by)?;

    state.repository.delete_customer(user.token(), id).await?;
    tracing::info!(customer_id = id, "Customer deleted");
    Ok(StatusCode::NO_CONTENT)
}

/// Customers the viewer may sell to or take payments from, by name.
pub async fn customer_options(
    state: &AppState,
    user: &AuthUser,
) -> Result<Vec<Customer>, AppError> {
    state
        .repository
        .list_customers(user.token(), &owner_scope(&user.viewer(), &[]))
        .await
}

/// `YYYY-MM` -> first day of that month and of the next one.
pub(crate) fn month_range(month: &str) -> Result<(String, String), AppError> {
    let invalid = || AppError::BadRequest(anyhow::anyhow!("Mês inválido: {}", month));
    let (year, month_number) = month.split_once('-').ok_or_else(invalid)?;
    let start = NaiveDate::from_ymd_opt(
        year.parse().map_err(|_| invalid())?,
        month_number.parse().map_err(|_| invalid())?,
        1,
    )
    .ok_or_else(invalid)?;
    let end = if start.month() == 12 {
        NaiveDate::from_ymd_opt(start.year() + 1, 1, 1)
    } else {
        NaiveDate::from_ymd_opt(start.year(), start.month() + 1, 1)
    }
    .ok_or_else(invalid)?;
    Ok((
        start.format("%Y-%m-%d").to_string(),
        end.format("%Y-%m-%d").to_string(),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn month_range_rolls_over_the_year() {
        assert_eq!(
            month_range("2024-12").unwrap(),
            ("2024-12-01".to_string(), "2025-01-01".to_string())
        );
        assert_eq!(
            month_range("2024-02").unwrap(),
            ("2024-02-01".to_string(), "2024-03-01".to_string())
        );
        assert!(month_range("2024-13").is_err());
        assert!(month_range("março").is_err());
    }

    #[test]
    fn rows_fill_missing_fields() {
        let customer = Customer {
            customer_id: 9,
            customer_name: Some("Lia".into()),
            phone: Some(" ".into()),
            birthday: Some("1990-05-04".into()),
            ..Default::default()
        };
        let row = CustomerRow::new(&customer, true);
        assert_eq!(row.phone, MISSING);
        assert_eq!(row.birthday, "04/05/1990");
        assert_eq!(row.control, 9);
    }
}
