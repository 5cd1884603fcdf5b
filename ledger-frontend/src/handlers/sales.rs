use crate::domain::authz::{Action, Viewer};
use crate::domain::format::{display_date, format_brl, MISSING};
use crate::domain::pricing::{stored_item_breakdown, ItemBreakdown};
use crate::forms::sale::SaleForm;
use crate::handlers::customers::customer_options;
use crate::handlers::{ensure, found, FilterParams, Nav};
use crate::models::customer::Customer;
use crate::models::sale::{Sale, SaleItem};
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
use serde::Serialize;
use service_core::error::AppError;

pub struct SaleRow {
    pub id: i64,
    pub number: i64,
    pub date: String,
    pub customer: String,
    pub amount: String,
    pub settled: bool,
    pub can_edit: bool,
}

impl SaleRow {
    fn new(sale: &Sale, viewer: &Viewer) -> Self {
        Self {
            id: sale.sale_id,
            number: sale.display_number(),
            date: display_date(sale.date.as_deref()),
            customer: sale.customer_name(),
            amount: format_brl(sale.amount()),
            settled: sale.is_settled(),
            can_edit: ensure(viewer, Action::Update, sale.created_by).is_ok(),
        }
    }
}

pub struct CustomerOption {
    pub id: i64,
    pub name: String,
    pub selected: bool,
}

pub(crate) fn customer_choices(customers: &[Customer], selected: Option<i64>) -> Vec<CustomerOption> {
    customers
        .iter()
        .map(|customer| CustomerOption {
            id: customer.customer_id,
            name: customer.display_name(),
            selected: Some(customer.customer_id) == selected,
        })
        .collect()
}

#[derive(Template)]
#[template(path = "sales.html")]
pub struct SalesTemplate {
    pub nav: Nav,
    pub search: String,
    pub start: String,
    pub end: String,
    pub status: String,
    pub customers: Vec<CustomerOption>,
    pub sales: Vec<SaleRow>,
    pub total: String,
    pub capped: bool,
}

pub async fn list_sales(
    State(state): State<AppState>,
    user: AuthUser,
    Query(params): Query<FilterParams>,
) -> Result<impl IntoResponse, AppError> {
    let viewer = user.viewer();
    let filter = params.ledger()?;
    let status = params.status();
    let search = params.search().to_lowercase();

    let scope = params.scope(&viewer);
    let (sales, customers) = tokio::try_join!(
        state.repository.list_sales(user.token(), &scope, &filter),
        customer_options(&state, &user),
    )?;
    let capped = sales.len() >= LIST_LIMIT;

    let visible: Vec<&Sale> = sales
        .iter()
        .filter(|sale| status.accepts(sale.is_settled()))
        .filter(|sale| matches_search(sale, &search))
        .collect();
    let total: Decimal = visible.iter().map(|sale| sale.amount()).sum();

    Ok(SalesTemplate {
        nav: Nav::from_user(&user),
        search: params.search(),
        start: filter.start.clone().unwrap_or_default(),
        end: filter.end.clone().unwrap_or_default(),
        status: status.as_str().to_string(),
        customers: customer_choices(&customers, filter.customer_id),
        sales: visible
            .into_iter()
            .map(|sale| SaleRow::new(sale, &viewer))
            .collect(),
        total: format_brl(total),
        capped,
    })
}

/// Match on customer name or sale number.
fn matches_search(sale: &Sale, term: &str) -> bool {
    term.is_empty()
        || sale.customer_name().to_lowercase().contains(term)
        || sale.display_number().to_string() == term
}

/// Members may only sell to customers they registered.
async fn check_customer(
    state: &AppState,
    user: &AuthUser,
    customer_id: i64,
) -> Result<(), AppError> {
    let customer = found(
        state.repository.get_customer(user.token(), customer_id).await?,
        "Cliente",
    )?;
    if ensure(&user.viewer(), Action::Create, customer.created_by).is_err() {
        return Err(AppError::Forbidden(anyhow::anyhow!(
            "Você só pode registrar vendas para clientes que você mesmo cadastrou."
        )));
    }
    Ok(())
}

pub async fn create_sale(
    State(state): State<AppState>,
    user: AuthUser,
    Json(form): Json<SaleForm>,
) -> Result<impl IntoResponse, AppError> {
    check_customer(&state, &user, form.customer_id()?).await?;
    let draft = form.into_draft(user.user_id, true)?;
    let sale = state.repository.create_sale(user.token(), &draft).await?;
    Ok((StatusCode::CREATED, Json(sale)))
}

pub async fn update_sale(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<i64>,
    Json(form): Json<SaleForm>,
) -> Result<impl IntoResponse, AppError> {
    let existing = found(state.repository.get_sale(user.token(), id).await?, "Venda")?;
    ensure(&user.viewer(), Action::Update, existing.created_by)?;
    let customer_id = form.customer_id()?;
    if existing.customer_id != Some(customer_id) {
        check_customer(&state, &user, customer_id).await?;
    }

    let draft = form.into_draft(user.user_id, false)?;
    let sale = state.repository.update_sale(user.token(), id, &draft).await?;
    tracing::info!(sale_id = id, items = draft.lines.len(), "Sale updated");
    Ok(Json(sale))
}

pub async fn delete_sale(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let existing = found(state.repository.get_sale(user.token(), id).await?, "Venda")?;
    ensure(&user.viewer(), Action::Delete, existing.created_by)?;

    state.repository.delete_sale(user.token(), id).await?;
    tracing::info!(sale_id = id, "Sale deleted");
    Ok(StatusCode::NO_CONTENT)
}

/// Flip the settled flag; legacy encodings are normalized to `pago`.
pub async fn toggle_settled(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let existing = found(state.repository.get_sale(user.token(), id).await?, "Venda")?;
    ensure(&user.viewer(), Action::Update, existing.created_by)?;

    let settled = !existing.is_settled();
    let sale = state
        .repository
        .set_settled(user.token(), id, settled)
        .await?;
    tracing::info!(sale_id = id, settled, "Sale settlement toggled");
    Ok(Json(sale))
}

/// A stored item line with its discount breakdown.
#[derive(Debug, Serialize)]
pub struct ItemView {
    #[serde(flatten)]
    pub item: SaleItem,
    pub breakdown: ItemBreakdown,
}

impl ItemView {
    fn new(item: SaleItem) -> Self {
        let zero = Decimal::ZERO;
        let breakdown = stored_item_breakdown(
            item.quantity.unwrap_or(zero),
            item.unit_price.unwrap_or(zero),
            item.discount_real_i.unwrap_or(zero),
            item.discount_percent_i.unwrap_or(zero),
        );
        Self { item, breakdown }
    }
}

async fn readable_items(
    state: &AppState,
    user: &AuthUser,
    id: i64,
) -> Result<(Sale, Vec<ItemView>), AppError> {
    let sale = found(state.repository.get_sale(user.token(), id).await?, "Venda")?;
    ensure(&user.viewer(), Action::Read, sale.created_by)?;
    let items = state.repository.sale_items(user.token(), id).await?;
    Ok((sale, items.into_iter().map(ItemView::new).collect()))
}

pub async fn sale_items(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let (_, items) = readable_items(&state, &user, id).await?;
    Ok(Json(items))
}

pub struct ItemRow {
    pub codigo: String,
    pub description: String,
    pub quantity: String,
    pub unit_price: String,
    pub gross: String,
    pub discount: String,
    pub total: String,
    pub note: String,
}

/// Stored values of one line, for the edit form.
pub struct EditItem {
    pub codigo: String,
    pub description: String,
    pub quantity: String,
    pub unit_price: String,
    pub discount: String,
    pub note: String,
}

#[derive(Template)]
#[template(path = "sale_detail.html")]
pub struct SaleDetailTemplate {
    pub nav: Nav,
    pub sale: SaleRow,
    pub customer_id: i64,
    pub subtotal: String,
    pub discount: String,
    pub notes: String,
    pub items: Vec<ItemRow>,
    pub customers: Vec<CustomerOption>,
    pub iso_date: String,
    pub sale_discount: String,
    pub edit_items: Vec<EditItem>,
}

pub async fn sale_detail(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let (sale, items) = readable_items(&state, &user, id).await?;
    let row = SaleRow::new(&sale, &user.viewer());
    let customers = if row.can_edit {
        customer_choices(&customer_options(&state, &user).await?, sale.customer_id)
    } else {
        Vec::new()
    };
    let subtotal = sale.total_amount.unwrap_or(Decimal::ZERO);
    let raw = |value: Decimal| value.normalize().to_string();

    Ok(SaleDetailTemplate {
        nav: Nav::from_user(&user),
        sale: row,
        customer_id: sale.customer_id.unwrap_or_default(),
        subtotal: format_brl(subtotal),
        discount: format_brl((subtotal - sale.amount()).max(Decimal::ZERO)),
        notes: sale.notes.clone().unwrap_or_default(),
        customers,
        iso_date: sale.date.as_deref().unwrap_or_default().chars().take(10).collect(),
        sale_discount: raw(sale.discount_real.unwrap_or(Decimal::ZERO)),
        edit_items: items
            .iter()
            .map(|view| EditItem {
                codigo: view.item.codigo.clone().unwrap_or_default(),
                description: view.item.item.clone().unwrap_or_default(),
                quantity: raw(view.item.quantity.unwrap_or(Decimal::ONE)),
                unit_price: raw(view.item.unit_price.unwrap_or(Decimal::ZERO)),
                discount: raw(view.breakdown.discount),
                note: view.item.note_i.clone().unwrap_or_default(),
            })
            .collect(),
        items: items
            .into_iter()
            .map(|view| ItemRow {
                codigo: view.item.codigo.clone().unwrap_or_else(|| MISSING.to_string()),
                description: view.item.item.clone().unwrap_or_default(),
                quantity: view.item.quantity.unwrap_or(Decimal::ZERO).normalize().to_string(),
                unit_price: format_brl(view.item.unit_price.unwrap_or(Decimal::ZERO)),
                gross: format_brl(view.breakdown.gross),
                discount: format_brl(view.breakdown.discount),
                total: format_brl(view.item.line_total.unwrap_or(view.breakdown.final_value)),
                note: view.item.note_i.clone().unwrap_or_default(),
            })
            .collect(),
    })
}
