use crate::domain::balances::CustomerBalance;
use crate::domain::chart::LEGEND;
use crate::domain::format::format_brl;
use crate::domain::monthly::month_label;
use crate::domain::rankings::RankingEntry;
use crate::handlers::sales::{customer_choices, CustomerOption};
use crate::handlers::{FilterParams, Nav};
use crate::models::user::AuthUser;
use crate::services::dashboard::{self, Birthday, Dashboard, DashboardFilter};
use crate::AppState;
use askama::Template;
use axum::{
    extract::{Query, State},
    response::IntoResponse,
};
use rust_decimal::Decimal;
use service_core::error::AppError;

pub struct BalanceRow {
    pub customer_id: i64,
    pub name: String,
    pub control: i64,
    pub sales: String,
    pub payments: String,
    pub pending: String,
    pub unpaid_count: usize,
}

impl BalanceRow {
    fn new(balance: &CustomerBalance) -> Self {
        Self {
            customer_id: balance.customer.customer_id,
            name: balance.customer.display_name(),
            control: balance.customer.control_number(),
            sales: format_brl(balance.sales_sum),
            payments: format_brl(balance.payments_sum),
            pending: format_brl(balance.pending.abs()),
            unpaid_count: balance.unpaid_count,
        }
    }
}

pub struct MonthRow {
    pub label: String,
    pub sales: String,
    pub payments: String,
    pub unpaid_count: usize,
    pub unpaid: String,
    pub paid: String,
    pub cumulative: String,
}

pub struct MethodRow {
    pub method: String,
    pub total: String,
    pub percentage: String,
}

pub struct RankRow {
    pub position: usize,
    pub customer_id: i64,
    pub name: String,
    pub control: i64,
    pub value: String,
}

pub struct CreatorOption {
    pub id: String,
    pub name: String,
    pub selected: bool,
}

pub struct StatCards {
    pub total_sales: String,
    pub total_payments: String,
    pub total_pending: String,
    pub unpaid_count: usize,
    pub settled_amount: String,
    pub unpaid_amount: String,
}

#[derive(Template)]
#[template(path = "dashboard.html")]
pub struct DashboardTemplate {
    pub nav: Nav,
    pub start: String,
    pub end: String,
    pub status: String,
    pub customers: Vec<CustomerOption>,
    pub creators: Vec<CreatorOption>,
    pub stats: StatCards,
    pub pending: Vec<BalanceRow>,
    pub credit: Vec<BalanceRow>,
    pub neutral: Vec<BalanceRow>,
    pub show_neutral: bool,
    pub months: Vec<MonthRow>,
    pub chart_svg: Option<String>,
    pub legend: Vec<(&'static str, &'static str)>,
    pub methods: Vec<MethodRow>,
    pub top_buyers: Vec<RankRow>,
    pub top_debtors: Vec<RankRow>,
    pub customer_birthdays: Vec<Birthday>,
    pub user_birthdays: Vec<Birthday>,
}

pub async fn dashboard_handler(
    State(state): State<AppState>,
    user: AuthUser,
    Query(params): Query<FilterParams>,
) -> Result<impl IntoResponse, AppError> {
    let viewer = user.viewer();
    let filter = DashboardFilter {
        users: if viewer.is_admin() {
            params.users()
        } else {
            Vec::new()
        },
        ledger: params.ledger()?,
        status: params.status(),
    };
    let today = chrono::Local::now().date_naive();

    let data = dashboard::load(&state.repository, user.token(), &viewer, &filter, today).await?;
    Ok(render(Nav::from_user(&user), &filter, data))
}

fn render(nav: Nav, filter: &DashboardFilter, data: Dashboard) -> DashboardTemplate {
    let series = &data.series;
    let months = (0..series.len())
        .map(|i| MonthRow {
            label: month_label(&series.months[i]),
            sales: format_brl(series.sales[i]),
            payments: format_brl(series.payments[i]),
            unpaid_count: series.unpaid_counts[i],
            unpaid: format_brl(series.unpaid_amounts[i]),
            paid: format_brl(series.paid_amounts[i]),
            cumulative: format_brl(series.cumulative_pending[i]),
        })
        .collect();

    DashboardTemplate {
        nav,
        start: filter.ledger.start.clone().unwrap_or_default(),
        end: filter.ledger.end.clone().unwrap_or_default(),
        status: filter.status.as_str().to_string(),
        customers: customer_choices(&data.customers, filter.ledger.customer_id),
        creators: data
            .creators
            .iter()
            .map(|creator| CreatorOption {
                id: creator.id.to_string(),
                name: creator.name.clone(),
                selected: filter.users.contains(&creator.id),
            })
            .collect(),
        stats: StatCards {
            total_sales: format_brl(data.stats.total_sales),
            total_payments: format_brl(data.stats.total_payments),
            total_pending: format_brl(data.balances.total_pending),
            unpaid_count: data.stats.unpaid_count,
            settled_amount: format_brl(data.stats.settled_amount),
            unpaid_amount: format_brl(data.stats.unpaid_amount),
        },
        pending: data.balances.pending.iter().map(BalanceRow::new).collect(),
        credit: data.balances.credit.iter().map(BalanceRow::new).collect(),
        neutral: data.balances.neutral.iter().map(BalanceRow::new).collect(),
        show_neutral: data.show_neutral,
        months,
        legend: LEGEND.to_vec(),
        methods: data
            .methods
            .iter()
            .map(|share| MethodRow {
                method: share.method.clone(),
                total: format_brl(share.total),
                percentage: format!("{}%", share.percentage.round_dp(1).normalize()),
            })
            .collect(),
        top_buyers: rank_rows(&data.rankings.top_buyers),
        top_debtors: rank_rows(&data.rankings.top_debtors),
        chart_svg: data.chart_svg,
        customer_birthdays: data.customer_birthdays,
        user_birthdays: data.user_birthdays,
    }
}

fn rank_rows(entries: &[RankingEntry]) -> Vec<RankRow> {
    entries
        .iter()
        .enumerate()
        .map(|(i, entry)| RankRow {
            position: i + 1,
            customer_id: entry.customer_id,
            name: entry.name.clone(),
            control: entry.control_number,
            value: format_brl(entry.value.max(Decimal::ZERO)),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::monthly::MonthlySeries;
    use rust_decimal_macros::dec;

    #[test]
    fn month_rows_follow_the_series() {
        let data = Dashboard {
            series: MonthlySeries {
                months: vec!["2024-01".into(), "2024-02".into()],
                sales: vec![dec!(100), dec!(50)],
                payments: vec![dec!(20), dec!(0)],
                unpaid_counts: vec![1, 0],
                unpaid_amounts: vec![dec!(100), dec!(0)],
                paid_amounts: vec![dec!(0), dec!(50)],
                cumulative_pending: vec![dec!(100), dec!(100)],
            },
            ..Default::default()
        };
        let nav = Nav {
            name: "Ana".into(),
            initials: "A".into(),
            is_admin: false,
        };
        let page = render(nav, &DashboardFilter::default(), data);
        assert_eq!(page.months.len(), 2);
        assert_eq!(page.months[0].sales, "R$ 100,00");
        assert_eq!(page.months[1].cumulative, "R$ 100,00");
        assert_eq!(page.status, "all");
        assert!(page.creators.is_empty());
    }

    #[test]
    fn ranks_are_numbered_from_one() {
        let rows = rank_rows(&[
            RankingEntry {
                customer_id: 3,
                name: "Lia".into(),
                control_number: 30,
                value: dec!(80),
            },
            RankingEntry {
                customer_id: 4,
                name: "Rui".into(),
                control_number: 4,
                value: dec!(20),
            },
        ]);
        assert_eq!(rows[0].position, 1);
        assert_eq!(rows[1].position, 2);
        assert_eq!(rows[0].value, "R$ 80,00");
    }
}
