//! Dashboard composition: fetches the rows for the selected owners,
//! customer and date range, then runs the pure aggregations over them.

use crate::domain::authz::{owner_scope, Viewer};
use crate::domain::balances::{self, BalanceReport};
use crate::domain::chart;
use crate::domain::format::{birthday_month, parse_date};
use crate::domain::monthly::{self, HeadlineStats, MonthlySeries};
use crate::domain::payment_method::{self, MethodShare};
use crate::domain::rankings::{self, Rankings};
use crate::domain::settlement::StatusFilter;
use crate::models::customer::Customer;
use crate::models::profile::{Creator, ProfileMeta};
use crate::services::repository::{LedgerFilter, LedgerRepository};
use chrono::{Datelike, NaiveDate};
use serde::Serialize;
use service_core::error::AppError;
use uuid::Uuid;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct DashboardFilter {
    /// Admin-selected creators; ignored for members.
    pub users: Vec<Uuid>,
    pub ledger: LedgerFilter,
    pub status: StatusFilter,
}

impl DashboardFilter {
    /// Neutral balances are listed only while some filter narrows the view.
    pub fn is_narrowed(&self) -> bool {
        self.ledger.is_active() || !self.status.is_all() || !self.users.is_empty()
    }
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct Birthday {
    pub name: String,
    pub day: u32,
    pub date: String,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct Dashboard {
    /// Owner-scoped customers, for the customer picker.
    pub customers: Vec<Customer>,
    /// Owner filter options; empty for members.
    pub creators: Vec<Creator>,
    pub balances: BalanceReport,
    pub show_neutral: bool,
    pub series: MonthlySeries,
    pub stats: HeadlineStats,
    pub chart_svg: Option<String>,
    pub methods: Vec<MethodShare>,
    pub rankings: Rankings,
    pub customer_birthdays: Vec<Birthday>,
    pub user_birthdays: Vec<Birthday>,
}

pub async fn load(
    repository: &LedgerRepository,
    token: &str,
    viewer: &Viewer,
    filter: &DashboardFilter,
    today: NaiveDate,
) -> Result<Dashboard, AppError> {
    let scope = owner_scope(viewer, &filter.users);
    let dates = filter.ledger.dates_only();

    let customers = repository.list_customers(token, &scope).await?;
    let in_scope = balances::customers_in_scope(&customers, filter.ledger.customer_id);
    let ids: Vec<i64> = in_scope.iter().map(|c| c.customer_id).collect();

    let (sales, payments, scoped_sales, scoped_payments) = tokio::try_join!(
        repository.sales_for_customers(token, &ids, &filter.ledger),
        repository.payments_for_customers(token, &ids, &filter.ledger),
        repository.all_sales(token, &scope, &dates),
        repository.all_payments(token, &scope, &dates),
    )?;

    let (creators, profiles) = if viewer.is_admin() {
        let creators = repository
            .creators(token, viewer)
            .await
            .unwrap_or_else(|e| {
                tracing::warn!(error = %e, "Creator list unavailable");
                Vec::new()
            });
        let profiles = repository
            .profile_birthdays(token)
            .await
            .unwrap_or_else(|e| {
                tracing::warn!(error = %e, "Profile birthdays unavailable");
                Vec::new()
            });
        (creators, profiles)
    } else {
        (Vec::new(), Vec::new())
    };

    let mut report = balances::aggregate(&in_scope, &sales, &payments, filter.status);
    let show_neutral = filter.is_narrowed();
    if !show_neutral {
        report.hide_neutral();
    }

    let series = monthly::build(today, &sales, &payments, &scoped_sales);
    let stats = series.stats();
    let chart_svg = chart::render(&series);

    tracing::debug!(
        customers = in_scope.len(),
        sales = sales.len(),
        payments = payments.len(),
        "Dashboard aggregated"
    );

    Ok(Dashboard {
        methods: payment_method::breakdown(&payments),
        rankings: rankings::build(&customers, &scoped_sales, &scoped_payments),
        customer_birthdays: customer_birthdays(&customers, today.month()),
        user_birthdays: user_birthdays(&profiles, today.month()),
        customers,
        creators,
        balances: report,
        show_neutral,
        series,
        stats,
        chart_svg,
    })
}

/// Customers whose birthday falls in `month`, by day.
pub fn customer_birthdays(customers: &[Customer], month: u32) -> Vec<Birthday> {
    collect_birthdays(
        customers
            .iter()
            .filter_map(|c| c.birthday.as_deref().map(|b| (c.display_name(), b))),
        month,
    )
}

pub fn user_birthdays(profiles: &[ProfileMeta], month: u32) -> Vec<Birthday> {
    collect_birthdays(
        profiles
            .iter()
            .filter_map(|p| p.birthday().map(|b| (p.display_name(), b))),
        month,
    )
}

fn collect_birthdays<'a>(
    people: impl Iterator<Item = (String, &'a str)>,
    month: u32,
) -> Vec<Birthday> {
    let mut birthdays: Vec<Birthday> = people
        .filter(|(_, raw)| birthday_month(raw) == Some(month))
        .filter_map(|(name, raw)| {
            parse_date(raw).map(|date| Birthday {
                name,
                day: date.day(),
                date: date.format("%d/%m").to_string(),
            })
        })
        .collect();
    birthdays.sort_by_key(|b| b.day);
    birthdays
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn customer(id: i64, name: &str, birthday: Option<&str>) -> Customer {
        Customer {
            customer_id: id,
            customer_name: Some(name.to_string()),
            birthday: birthday.map(str::to_string),
            ..Default::default()
        }
    }

    #[test]
    fn customer_birthdays_in_month_sorted_by_day() {
        let customers = vec![
            customer(1, "Ana", Some("1990-03-21")),
            customer(2, "Bia", Some("12/03/1985")),
            customer(3, "Caio", Some("1992-04-02")),
            customer(4, "Duda", None),
        ];
        let birthdays = customer_birthdays(&customers, 3);
        let names: Vec<&str> = birthdays.iter().map(|b| b.name.as_str()).collect();
        assert_eq!(names, vec!["Bia", "Ana"]);
        assert_eq!(birthdays[0].date, "12/03");
    }

    #[test]
    fn user_birthdays_read_signup_metadata() {
        let profiles: Vec<ProfileMeta> = serde_json::from_value(json!([
            { "id": Uuid::new_v4(), "full_name": "Eva", "raw_user_meta_data": { "birthday": "1988-07-09" } },
            { "id": Uuid::new_v4(), "full_name": "Fabi", "raw_user_meta_data": {} },
            { "id": Uuid::new_v4(), "email": "gil@loja.com", "raw_user_meta_data": { "birthday": "2000-07-01" } }
        ]))
        .unwrap();
        let birthdays = user_birthdays(&profiles, 7);
        let names: Vec<&str> = birthdays.iter().map(|b| b.name.as_str()).collect();
        assert_eq!(names, vec!["gil@loja.com", "Eva"]);
    }

    #[test]
    fn narrowed_when_any_filter_is_set() {
        assert!(!DashboardFilter::default().is_narrowed());
        assert!(DashboardFilter {
            status: StatusFilter::Settled,
            ..Default::default()
        }
        .is_narrowed());
        assert!(DashboardFilter {
            users: vec![Uuid::new_v4()],
            ..Default::default()
        }
        .is_narrowed());
    }
}
