//! Table access for the ledger: customers, sales with items, payments and
//! user profiles. Every call runs with the signed-in user's access token so
//! the backend's row-level security still applies on top of the owner
//! scope applied here.

use crate::domain::authz::{OwnerScope, Viewer};
use crate::domain::csv_export::Row;
use crate::domain::settlement::StatusFilter;
use crate::models::customer::{Customer, CustomerWrite};
use crate::models::payment::{Payment, PaymentWrite};
use crate::models::profile::{AppUser, Creator, ProfileMeta, ProfileName, ProfileWrite};
use crate::models::sale::{Sale, SaleDraft, SaleItem, SaleWithItems};
use crate::services::backend_client::{BackendClient, Query};
use serde::{Deserialize, Serialize};
use serde_json::json;
use service_core::error::AppError;
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use uuid::Uuid;

const CUSTOMER_COLUMNS: &str =
    "customer_id, controle_customer, customer_name, phone, email, birthday, city, notes, created_by";
const SALE_COLUMNS: &str = "sale_id, controle_vendas, customer_id, date, total_amount, \
     discount_real, discount_percent, final_total, pago, notes, created_by, customers(customer_name)";
const PAYMENT_COLUMNS: &str = "payment_id, controle_pagamentos, customer_id, amount, date, \
     method, notes, created_by, customers(customer_name)";
const ITEM_COLUMNS: &str = "id, sale_id, codigo, item, quantity, unit_price, discount_real_i, \
     discount_percent_i, line_total, note_i";

/// Row cap on the sales and payments list pages.
pub const LIST_LIMIT: usize = 500;
const CREATOR_SCAN_LIMIT: usize = 2000;
const ADMIN_USER_LIMIT: usize = 1000;
const PROFILE_SCAN_LIMIT: usize = 5000;
// Ids per `in.(...)` filter, keeping request URLs short.
const IN_LIST_CHUNK: usize = 300;

/// Customer and date-range filters shared by the list pages, the dashboard
/// and the exports. Dates are ISO `YYYY-MM-DD`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LedgerFilter {
    #[serde(default)]
    pub customer_id: Option<i64>,
    #[serde(default)]
    pub start: Option<String>,
    #[serde(default)]
    pub end: Option<String>,
}

impl LedgerFilter {
    pub fn dates_only(&self) -> Self {
        Self {
            customer_id: None,
            ..self.clone()
        }
    }

    pub fn is_active(&self) -> bool {
        self.customer_id.is_some() || self.start.is_some() || self.end.is_some()
    }

    fn apply(&self, mut query: Query) -> Query {
        if let Some(customer_id) = self.customer_id {
            query = query.eq("customer_id", customer_id);
        }
        if let Some(start) = &self.start {
            query = query.gte("date", start);
        }
        if let Some(end) = &self.end {
            query = query.lte("date", end);
        }
        query
    }
}

#[derive(Clone)]
pub struct LedgerRepository {
    backend: Arc<BackendClient>,
}

impl LedgerRepository {
    pub fn new(backend: Arc<BackendClient>) -> Self {
        Self { backend }
    }

    pub fn backend(&self) -> &BackendClient {
        &self.backend
    }

    // ---- Customers ----

    pub async fn list_customers(
        &self,
        token: &str,
        scope: &OwnerScope,
    ) -> Result<Vec<Customer>, AppError> {
        let query = Query::new()
            .select(CUSTOMER_COLUMNS)
            .owned_by(scope)
            .order("customer_name", true);
        self.backend.fetch_all(token, "customers", &query).await
    }

    pub async fn get_customer(&self, token: &str, id: i64) -> Result<Option<Customer>, AppError> {
        let query = Query::new().select(CUSTOMER_COLUMNS).eq("customer_id", id);
        self.backend.select_one(token, "customers", &query).await
    }

    pub async fn create_customer(
        &self,
        token: &str,
        customer: &CustomerWrite,
    ) -> Result<Customer, AppError> {
        let rows: Vec<Customer> = self
            .backend
            .insert(token, "customers", std::slice::from_ref(customer))
            .await?;
        first_row(rows, "customer")
    }

    pub async fn update_customer(
        &self,
        token: &str,
        id: i64,
        customer: &CustomerWrite,
    ) -> Result<Customer, AppError> {
        let query = Query::new().eq("customer_id", id);
        let rows: Vec<Customer> = self
            .backend
            .update(token, "customers", &query, customer)
            .await?;
        first_row(rows, "customer")
    }

    pub async fn delete_customer(&self, token: &str, id: i64) -> Result<(), AppError> {
        self.backend
            .delete(token, "customers", &Query::new().eq("customer_id", id))
            .await
    }

    /// Sales of one customer with their items, newest first. `month` is an
    /// inclusive start and exclusive end date.
    pub async fn customer_sales(
        &self,
        token: &str,
        customer_id: i64,
        month: Option<(String, String)>,
    ) -> Result<Vec<SaleWithItems>, AppError> {
        let mut query = Query::new()
            .select("*")
            .eq("customer_id", customer_id)
            .order("date", false);
        if let Some((start, end)) = month {
            query = query.gte("date", start).lt("date", end);
        }
        self.backend
            .select(token, "v_sales_with_items", &query)
            .await
    }

    // ---- Sales ----

    pub async fn list_sales(
        &self,
        token: &str,
        scope: &OwnerScope,
        filter: &LedgerFilter,
    ) -> Result<Vec<Sale>, AppError> {
        let query = filter
            .apply(Query::new().select(SALE_COLUMNS).owned_by(scope))
            .order("sale_id", false)
            .limit(LIST_LIMIT);
        self.backend.select(token, "sales", &query).await
    }

    /// Every sale matching the owner scope and filter, without the list cap.
    pub async fn all_sales(
        &self,
        token: &str,
        scope: &OwnerScope,
        filter: &LedgerFilter,
    ) -> Result<Vec<Sale>, AppError> {
        let query = filter
            .apply(Query::new().select(SALE_COLUMNS).owned_by(scope))
            .order("sale_id", true);
        self.backend.fetch_all(token, "sales", &query).await
    }

    /// Sales of the given customers within the filter's dates, fetched in
    /// id chunks and returned in `sale_id` order.
    pub async fn sales_for_customers(
        &self,
        token: &str,
        customer_ids: &[i64],
        filter: &LedgerFilter,
    ) -> Result<Vec<Sale>, AppError> {
        let dates = filter.dates_only();
        let mut sales: Vec<Sale> = Vec::new();
        for chunk in customer_ids.chunks(IN_LIST_CHUNK) {
            let query = dates
                .apply(
                    Query::new()
                        .select(SALE_COLUMNS)
                        .in_list("customer_id", chunk),
                )
                .order("sale_id", true);
            sales.extend(self.backend.fetch_all::<Sale>(token, "sales", &query).await?);
        }
        sales.sort_by_key(|sale| sale.sale_id);
        Ok(sales)
    }

    pub async fn get_sale(&self, token: &str, id: i64) -> Result<Option<Sale>, AppError> {
        let query = Query::new().select(SALE_COLUMNS).eq("sale_id", id);
        self.backend.select_one(token, "sales", &query).await
    }

    pub async fn sale_items(&self, token: &str, sale_id: i64) -> Result<Vec<SaleItem>, AppError> {
        let query = Query::new()
            .select(ITEM_COLUMNS)
            .eq("sale_id", sale_id)
            .order("id", true);
        self.backend.select(token, "sale_items", &query).await
    }

    /// Insert the header, then its items stamped with the new sale id.
    pub async fn create_sale(&self, token: &str, draft: &SaleDraft) -> Result<Sale, AppError> {
        let rows: Vec<Sale> = self
            .backend
            .insert(token, "sales", std::slice::from_ref(&draft.header))
            .await?;
        let created = first_row(rows, "sale")?;
        self.insert_items(token, draft.items_for(created.sale_id, created.display_number()))
            .await?;
        tracing::info!(sale_id = created.sale_id, "Sale created");
        Ok(created)
    }

    /// Update the header and replace the item set.
    pub async fn update_sale(
        &self,
        token: &str,
        id: i64,
        draft: &SaleDraft,
    ) -> Result<Sale, AppError> {
        let query = Query::new().select(SALE_COLUMNS).eq("sale_id", id);
        let rows: Vec<Sale> = self
            .backend
            .update(token, "sales", &query, &draft.header)
            .await?;
        let updated = first_row(rows, "sale")?;
        self.backend
            .delete(token, "sale_items", &Query::new().eq("sale_id", id))
            .await?;
        self.insert_items(token, draft.items_for(id, updated.display_number()))
            .await?;
        Ok(updated)
    }

    async fn insert_items(&self, token: &str, items: Vec<SaleItem>) -> Result<(), AppError> {
        if items.is_empty() {
            return Ok(());
        }
        let _: Vec<SaleItem> = self.backend.insert(token, "sale_items", &items).await?;
        Ok(())
    }

    /// Items first, then the sale.
    pub async fn delete_sale(&self, token: &str, id: i64) -> Result<(), AppError> {
        self.backend
            .delete(token, "sale_items", &Query::new().eq("sale_id", id))
            .await?;
        self.backend
            .delete(token, "sales", &Query::new().eq("sale_id", id))
            .await
    }

    pub async fn set_settled(&self, token: &str, id: i64, settled: bool) -> Result<Sale, AppError> {
        let query = Query::new().select(SALE_COLUMNS).eq("sale_id", id);
        let rows: Vec<Sale> = self
            .backend
            .update(token, "sales", &query, &json!({ "pago": settled }))
            .await?;
        first_row(rows, "sale")
    }

    // ---- Payments ----

    pub async fn list_payments(
        &self,
        token: &str,
        scope: &OwnerScope,
        filter: &LedgerFilter,
    ) -> Result<Vec<Payment>, AppError> {
        let query = filter
            .apply(Query::new().select(PAYMENT_COLUMNS).owned_by(scope))
            .order("date", false)
            .limit(LIST_LIMIT);
        self.backend.select(token, "payments", &query).await
    }

    pub async fn all_payments(
        &self,
        token: &str,
        scope: &OwnerScope,
        filter: &LedgerFilter,
    ) -> Result<Vec<Payment>, AppError> {
        let query = filter
            .apply(Query::new().select(PAYMENT_COLUMNS).owned_by(scope))
            .order("payment_id", true);
        self.backend.fetch_all(token, "payments", &query).await
    }

    /// Payments of the given customers within the filter's dates.
    pub async fn payments_for_customers(
        &self,
        token: &str,
        customer_ids: &[i64],
        filter: &LedgerFilter,
    ) -> Result<Vec<Payment>, AppError> {
        let dates = filter.dates_only();
        let mut payments: Vec<Payment> = Vec::new();
        for chunk in customer_ids.chunks(IN_LIST_CHUNK) {
            let query = dates
                .apply(
                    Query::new()
                        .select(PAYMENT_COLUMNS)
                        .in_list("customer_id", chunk),
                )
                .order("payment_id", true);
            payments.extend(
                self.backend
                    .fetch_all::<Payment>(token, "payments", &query)
                    .await?,
            );
        }
        payments.sort_by_key(|payment| payment.payment_id);
        Ok(payments)
    }

    pub async fn get_payment(&self, token: &str, id: i64) -> Result<Option<Payment>, AppError> {
        let query = Query::new().select(PAYMENT_COLUMNS).eq("payment_id", id);
        self.backend.select_one(token, "payments", &query).await
    }

    pub async fn create_payment(
        &self,
        token: &str,
        payment: &PaymentWrite,
    ) -> Result<Payment, AppError> {
        let rows: Vec<Payment> = self
            .backend
            .insert(token, "payments", std::slice::from_ref(payment))
            .await?;
        first_row(rows, "payment")
    }

    pub async fn update_payment(
        &self,
        token: &str,
        id: i64,
        payment: &PaymentWrite,
    ) -> Result<Payment, AppError> {
        let query = Query::new().eq("payment_id", id);
        let rows: Vec<Payment> = self
            .backend
            .update(token, "payments", &query, payment)
            .await?;
        first_row(rows, "payment")
    }

    pub async fn delete_payment(&self, token: &str, id: i64) -> Result<(), AppError> {
        self.backend
            .delete(token, "payments", &Query::new().eq("payment_id", id))
            .await
    }

    // ---- Exports ----

    /// Sale-item rows belonging to the sales that pass `scope`, `filter` and
    /// `status`.
    pub async fn export_sale_items(
        &self,
        token: &str,
        scope: &OwnerScope,
        filter: &LedgerFilter,
        status: StatusFilter,
    ) -> Result<Vec<Row>, AppError> {
        let sale_ids: Vec<i64> = self
            .all_sales(token, scope, filter)
            .await?
            .into_iter()
            .filter(|sale| status.accepts(sale.is_settled()))
            .map(|sale| sale.sale_id)
            .collect();
        if sale_ids.is_empty() {
            return Err(AppError::NotFound(anyhow::anyhow!("Nenhuma venda encontrada")));
        }

        let mut rows = Vec::new();
        for chunk in sale_ids.chunks(IN_LIST_CHUNK) {
            let query = Query::new()
                .select("*")
                .in_list("sale_id", chunk)
                .order("sale_id", true);
            rows.extend(
                self.backend
                    .fetch_all::<Row>(token, "sale_items", &query)
                    .await?,
            );
        }
        Ok(rows)
    }

    /// Raw rows of `table` for CSV export, ordered by the table's key so
    /// offset paging neither skips nor repeats rows.
    pub async fn export_rows(
        &self,
        token: &str,
        table: &str,
        scope: &OwnerScope,
        filter: &LedgerFilter,
    ) -> Result<Vec<Row>, AppError> {
        let query = filter
            .apply(Query::new().select("*").owned_by(scope))
            .order(key_column(table), true);
        self.backend.fetch_all(token, table, &query).await
    }

    pub async fn export_profiles(&self, token: &str) -> Result<Vec<Row>, AppError> {
        let query = Query::new()
            .select("*")
            .order("created_at", false)
            .order("id", true);
        self.backend.fetch_all(token, "v_app_users", &query).await
    }

    // ---- Profiles ----

    pub async fn app_user(&self, token: &str, id: Uuid) -> Result<Option<AppUser>, AppError> {
        let query = Query::new().select("*").eq("id", id);
        self.backend.select_one(token, "v_app_users", &query).await
    }

    pub async fn list_app_users(&self, token: &str) -> Result<Vec<AppUser>, AppError> {
        let query = Query::new()
            .select("*")
            .order("created_at", false)
            .limit(ADMIN_USER_LIMIT);
        self.backend.select(token, "v_app_users", &query).await
    }

    pub async fn set_profile_flag(
        &self,
        token: &str,
        id: Uuid,
        flag: ProfileFlag,
        value: bool,
    ) -> Result<(), AppError> {
        let changes = json!({ flag.column(): value });
        let rows: Vec<serde_json::Value> = self
            .backend
            .update(token, "profiles", &Query::new().eq("id", id), &changes)
            .await?;
        first_row(rows, "profile")?;
        tracing::info!(user_id = %id, flag = flag.column(), value, "Profile flag updated");
        Ok(())
    }

    /// Whether another profile already uses `username`.
    pub async fn username_taken(
        &self,
        token: &str,
        username: &str,
        except: Option<Uuid>,
    ) -> Result<bool, AppError> {
        let mut query = Query::new().select("id").eq("username", username);
        if let Some(id) = except {
            query = query.neq("id", id);
        }
        let clash: Option<ProfileName> = self.backend.select_one(token, "profiles", &query).await?;
        Ok(clash.is_some())
    }

    pub async fn update_profile(
        &self,
        token: &str,
        id: Uuid,
        profile: &ProfileWrite,
    ) -> Result<(), AppError> {
        let rows: Vec<serde_json::Value> = self
            .backend
            .update(token, "profiles", &Query::new().eq("id", id), profile)
            .await?;
        first_row(rows, "profile").map(|_| ())
    }

    pub async fn profile_birthdays(&self, token: &str) -> Result<Vec<ProfileMeta>, AppError> {
        let query = Query::new()
            .select("id, full_name, email, raw_user_meta_data")
            .limit(PROFILE_SCAN_LIMIT);
        self.backend.select(token, "profiles", &query).await
    }

    /// Users who created sales or customers, for the admin owner filter.
    /// The viewer is always listed, named "Eu".
    pub async fn creators(&self, token: &str, viewer: &Viewer) -> Result<Vec<Creator>, AppError> {
        #[derive(Deserialize)]
        struct CreatedBy {
            created_by: Option<Uuid>,
        }

        let mut ids = BTreeSet::new();
        for table in ["sales", "customers"] {
            let query = Query::new()
                .select("created_by")
                .not_null("created_by")
                .limit(CREATOR_SCAN_LIMIT);
            let rows: Vec<CreatedBy> = self.backend.select(token, table, &query).await?;
            ids.extend(rows.into_iter().filter_map(|row| row.created_by));
        }
        ids.remove(&viewer.user_id);

        let names = self.creator_names(token, &ids).await?;
        let mut creators = vec![Creator {
            id: viewer.user_id,
            name: "Eu".to_string(),
        }];
        creators.extend(ids.into_iter().map(|id| Creator {
            id,
            name: names.get(&id).cloned().unwrap_or_else(|| id.to_string()),
        }));
        Ok(creators)
    }

    /// Names from `v_app_users`, falling back to `profiles` for the rest.
    async fn creator_names(
        &self,
        token: &str,
        ids: &BTreeSet<Uuid>,
    ) -> Result<HashMap<Uuid, String>, AppError> {
        let mut names = HashMap::new();
        if ids.is_empty() {
            return Ok(names);
        }

        for table in ["v_app_users", "profiles"] {
            let missing: Vec<Uuid> = ids
                .iter()
                .filter(|id| !names.contains_key(*id))
                .copied()
                .collect();
            if missing.is_empty() {
                break;
            }
            let query = Query::new().select("id, full_name").in_list("id", &missing);
            match self.backend.select::<ProfileName>(token, table, &query).await {
                Ok(rows) => names.extend(
                    rows.into_iter()
                        .filter_map(|row| row.full_name.map(|name| (row.id, name))),
                ),
                Err(e) => tracing::warn!(table = %table, error = %e, "Creator names unavailable"),
            }
        }
        Ok(names)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProfileFlag {
    Approved,
    Active,
}

impl ProfileFlag {
    pub fn column(&self) -> &'static str {
        match self {
            ProfileFlag::Approved => "is_approved",
            ProfileFlag::Active => "is_active",
        }
    }
}

/// Unique key of an exported table.
fn key_column(table: &str) -> &'static str {
    match table {
        "customers" => "customer_id",
        "sales" => "sale_id",
        "payments" => "payment_id",
        _ => "id",
    }
}

fn first_row<T>(rows: Vec<T>, what: &str) -> Result<T, AppError> {
    rows.into_iter().next().ok_or_else(|| {
        AppError::NotFound(anyhow::anyhow!("{} not found or not permitted", what))
    })
}
