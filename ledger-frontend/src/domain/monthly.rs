//! Monthly chart series.
//!
//! Buckets cover January of the current year through the current month,
//! preceded by any earlier month holding a not-settled sale from a previous
//! year. Every series is index-aligned to `months`.

use crate::domain::format::parse_date;
use crate::models::{payment::Payment, sale::Sale};
use chrono::{Datelike, NaiveDate};
use rust_decimal::Decimal;
use serde::Serialize;
use std::collections::{BTreeSet, HashMap};

/// `YYYY-MM` for any date form `parse_date` understands.
pub fn month_key(date: &str) -> Option<String> {
    parse_date(date).map(|d| format!("{:04}-{:02}", d.year(), d.month()))
}

/// Short label for a month key: `2024-03` -> `mar/24`.
pub fn month_label(key: &str) -> String {
    const NAMES: [&str; 12] = [
        "jan", "fev", "mar", "abr", "mai", "jun", "jul", "ago", "set", "out", "nov", "dez",
    ];
    match key.split_once('-') {
        Some((year, month)) => {
            let name = month
                .parse::<usize>()
                .ok()
                .and_then(|m| NAMES.get(m.wrapping_sub(1)))
                .copied()
                .unwrap_or(month);
            let short_year = year.get(year.len().saturating_sub(2)..).unwrap_or(year);
            format!("{}/{}", name, short_year)
        }
        None => key.to_string(),
    }
}

/// Bucket keys: carried-over months (sorted) then this year's months.
pub fn bucket_months(today: NaiveDate, carry_over: &[Sale]) -> Vec<String> {
    let current_year = today.year();

    let earlier: BTreeSet<String> = carry_over
        .iter()
        .filter(|sale| !sale.is_settled())
        .filter_map(|sale| sale.date.as_deref().and_then(parse_date))
        .filter(|date| date.year() < current_year)
        .map(|date| format!("{:04}-{:02}", date.year(), date.month()))
        .collect();

    earlier
        .into_iter()
        .chain((1..=today.month()).map(|m| format!("{:04}-{:02}", current_year, m)))
        .collect()
}

#[derive(Debug, Clone, Default, Serialize, PartialEq)]
pub struct MonthlySeries {
    pub months: Vec<String>,
    pub sales: Vec<Decimal>,
    pub payments: Vec<Decimal>,
    pub unpaid_counts: Vec<usize>,
    pub unpaid_amounts: Vec<Decimal>,
    pub paid_amounts: Vec<Decimal>,
    /// Running sum of `unpaid_amounts`.
    pub cumulative_pending: Vec<Decimal>,
}

#[derive(Debug, Clone, Default, Serialize, PartialEq)]
pub struct HeadlineStats {
    pub total_sales: Decimal,
    pub total_payments: Decimal,
    pub unpaid_count: usize,
    pub settled_amount: Decimal,
    pub unpaid_amount: Decimal,
}

impl MonthlySeries {
    pub fn len(&self) -> usize {
        self.months.len()
    }

    pub fn is_empty(&self) -> bool {
        self.months.is_empty()
    }

    pub fn stats(&self) -> HeadlineStats {
        HeadlineStats {
            total_sales: self.sales.iter().sum(),
            total_payments: self.payments.iter().sum(),
            unpaid_count: self.unpaid_counts.iter().sum(),
            settled_amount: self.paid_amounts.iter().sum(),
            unpaid_amount: self.unpaid_amounts.iter().sum(),
        }
    }
}

/// Accumulate `sales` and `payments` into the buckets; rows dated outside
/// the bucket set are dropped.
pub fn build(
    today: NaiveDate,
    sales: &[Sale],
    payments: &[Payment],
    carry_over: &[Sale],
) -> MonthlySeries {
    let months = bucket_months(today, carry_over);
    let index: HashMap<&str, usize> = months
        .iter()
        .enumerate()
        .map(|(i, key)| (key.as_str(), i))
        .collect();
    let n = months.len();

    let mut series = MonthlySeries {
        sales: vec![Decimal::ZERO; n],
        payments: vec![Decimal::ZERO; n],
        unpaid_counts: vec![0; n],
        unpaid_amounts: vec![Decimal::ZERO; n],
        paid_amounts: vec![Decimal::ZERO; n],
        cumulative_pending: Vec::with_capacity(n),
        months: Vec::new(),
    };

    for sale in sales {
        let Some(i) = sale
            .date
            .as_deref()
            .and_then(month_key)
            .and_then(|key| index.get(key.as_str()).copied())
        else {
            continue;
        };
        let amount = sale.amount();
        series.sales[i] += amount;
        if sale.is_settled() {
            series.paid_amounts[i] += amount;
        } else {
            series.unpaid_counts[i] += 1;
            series.unpaid_amounts[i] += amount;
        }
    }

    for payment in payments {
        if let Some(i) = payment
            .date
            .as_deref()
            .and_then(month_key)
            .and_then(|key| index.get(key.as_str()).copied())
        {
            series.payments[i] += payment.amount();
        }
    }

    let mut running = Decimal::ZERO;
    for amount in &series.unpaid_amounts {
        running += *amount;
        series.cumulative_pending.push(running);
    }

    series.months = months;
    series
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use serde_json::json;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 4, 18).unwrap()
    }

    fn sale(date: &str, amount: Decimal, pago: bool) -> Sale {
        Sale {
            sale_id: 1,
            customer_id: Some(1),
            date: Some(date.to_string()),
            final_total: Some(amount),
            pago: Some(json!(pago)),
            ..Default::default()
        }
    }

    fn payment(date: &str, amount: Decimal) -> Payment {
        Payment {
            payment_id: 1,
            customer_id: Some(1),
            date: Some(date.to_string()),
            amount: Some(amount),
            ..Default::default()
        }
    }

    #[test]
    fn current_year_through_current_month() {
        let months = bucket_months(today(), &[]);
        assert_eq!(months, vec!["2025-01", "2025-02", "2025-03", "2025-04"]);
    }

    #[test]
    fn unpaid_sales_from_previous_years_prepend_months() {
        let carry = vec![
            sale("2024-11-03", dec!(10), false),
            sale("2023-06-01", dec!(10), false),
            sale("2024-11-20", dec!(10), false),
            sale("2024-08-01", dec!(10), true),
            sale("2025-02-01", dec!(10), false),
        ];
        let months = bucket_months(today(), &carry);
        assert_eq!(
            months,
            vec!["2023-06", "2024-11", "2025-01", "2025-02", "2025-03", "2025-04"]
        );
    }

    #[test]
    fn accumulates_and_aligns_series() {
        let sales = vec![
            sale("2025-01-10", dec!(100), false),
            sale("2025-01-20", dec!(50), true),
            sale("2025-03-05T10:00:00Z", dec!(30), false),
            sale("2022-01-01", dec!(999), true),
        ];
        let payments = vec![payment("2025-01-15", dec!(40)), payment("2030-01-01", dec!(5))];

        let series = build(today(), &sales, &payments, &[]);

        assert_eq!(series.len(), 4);
        for len in [
            series.sales.len(),
            series.payments.len(),
            series.unpaid_counts.len(),
            series.unpaid_amounts.len(),
            series.paid_amounts.len(),
            series.cumulative_pending.len(),
        ] {
            assert_eq!(len, series.months.len());
        }
        assert_eq!(series.sales, vec![dec!(150), dec!(0), dec!(30), dec!(0)]);
        assert_eq!(series.payments, vec![dec!(40), dec!(0), dec!(0), dec!(0)]);
        assert_eq!(series.unpaid_counts, vec![1, 0, 1, 0]);
        assert_eq!(series.paid_amounts[0], dec!(50));
        assert_eq!(
            series.cumulative_pending,
            vec![dec!(100), dec!(100), dec!(130), dec!(130)]
        );

        let stats = series.stats();
        assert_eq!(stats.total_sales, dec!(180));
        assert_eq!(stats.total_payments, dec!(40));
        assert_eq!(stats.unpaid_count, 2);
        assert_eq!(stats.settled_amount, dec!(50));
        assert_eq!(stats.unpaid_amount, dec!(130));
    }

    #[test]
    fn month_labels() {
        assert_eq!(month_label("2024-03"), "mar/24");
        assert_eq!(month_label("2025-12"), "dez/25");
        assert_eq!(month_key("05/03/2024").as_deref(), Some("2024-03"));
        assert_eq!(month_key("nope"), None);
    }
}
