//! Top buyers and top debtors.

use crate::models::{customer::Customer, payment::Payment, sale::Sale};
use rust_decimal::Decimal;
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};

pub const RANKING_SIZE: usize = 10;

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct RankingEntry {
    pub customer_id: i64,
    pub name: String,
    pub control_number: i64,
    pub value: Decimal,
}

#[derive(Debug, Clone, Default, Serialize, PartialEq)]
pub struct Rankings {
    pub top_buyers: Vec<RankingEntry>,
    pub top_debtors: Vec<RankingEntry>,
}

/// Rank customers over owner/date-scoped rows. Ties are broken by ascending
/// customer id.
pub fn build(customers: &[Customer], sales: &[Sale], payments: &[Payment]) -> Rankings {
    let mut totals: BTreeMap<i64, Decimal> = BTreeMap::new();
    for sale in sales {
        if let Some(customer_id) = sale.customer_id {
            *totals.entry(customer_id).or_default() += sale.amount();
        }
    }

    let mut paid: HashMap<i64, Decimal> = HashMap::new();
    for payment in payments {
        if let Some(customer_id) = payment.customer_id {
            *paid.entry(customer_id).or_default() += payment.amount();
        }
    }

    let mut buyers: Vec<(i64, Decimal)> = totals.iter().map(|(id, sum)| (*id, *sum)).collect();
    buyers.sort_by(|a, b| b.1.cmp(&a.1));

    let mut debtors: Vec<(i64, Decimal)> = totals
        .iter()
        .map(|(id, sales_sum)| {
            let settled = paid.get(id).copied().unwrap_or_default();
            (*id, (*sales_sum - settled).max(Decimal::ZERO))
        })
        .filter(|(_, pending)| *pending > Decimal::ZERO)
        .collect();
    debtors.sort_by(|a, b| b.1.cmp(&a.1));

    let by_id: HashMap<i64, &Customer> = customers.iter().map(|c| (c.customer_id, c)).collect();
    let entry = |(customer_id, value): (i64, Decimal)| {
        let known = by_id.get(&customer_id).copied();
        RankingEntry {
            customer_id,
            name: known
                .map(Customer::display_name)
                .unwrap_or_else(|| format!("#{}", customer_id)),
            control_number: known
                .map(Customer::control_number)
                .unwrap_or(customer_id),
            value,
        }
    };

    Rankings {
        top_buyers: buyers.into_iter().take(RANKING_SIZE).map(&entry).collect(),
        top_debtors: debtors.into_iter().take(RANKING_SIZE).map(&entry).collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn customer(id: i64, control: Option<i64>) -> Customer {
        Customer {
            customer_id: id,
            controle_customer: control,
            customer_name: Some(format!("C{}", id)),
            phone: None,
            email: None,
            birthday: None,
            city: None,
            notes: None,
            created_by: None,
        }
    }

    fn sale(customer_id: i64, amount: Decimal) -> Sale {
        Sale {
            sale_id: 1,
            customer_id: Some(customer_id),
            total_amount: Some(amount),
            ..Default::default()
        }
    }

    fn payment(customer_id: i64, amount: Decimal) -> Payment {
        Payment {
            payment_id: 1,
            customer_id: Some(customer_id),
            amount: Some(amount),
            ..Default::default()
        }
    }

    #[test]
    fn buyers_sorted_by_sales_with_ties_by_customer_id() {
        let customers = vec![customer(1, Some(501)), customer(2, None)];
        let sales = vec![sale(2, dec!(50)), sale(1, dec!(50)), sale(3, dec!(80))];

        let rankings = build(&customers, &sales, &[]);

        let ids: Vec<i64> = rankings.top_buyers.iter().map(|e| e.customer_id).collect();
        assert_eq!(ids, vec![3, 1, 2]);
        assert_eq!(rankings.top_buyers[0].name, "#3");
        assert_eq!(rankings.top_buyers[0].control_number, 3);
        assert_eq!(rankings.top_buyers[1].control_number, 501);
    }

    #[test]
    fn tied_debtors_follow_customer_id_not_row_order() {
        let sales = vec![sale(7, dec!(50)), sale(3, dec!(50))];

        let rankings = build(&[], &sales, &[]);

        let buyers: Vec<i64> = rankings.top_buyers.iter().map(|e| e.customer_id).collect();
        let debtors: Vec<i64> = rankings.top_debtors.iter().map(|e| e.customer_id).collect();
        assert_eq!(buyers, vec![3, 7]);
        assert_eq!(debtors, vec![3, 7]);
    }

    #[test]
    fn sums_many_rows_per_customer() {
        let sales: Vec<Sale> = (0..2_000).map(|i| sale(i % 4, dec!(1))).collect();
        let payments: Vec<Payment> = (0..1_000).map(|i| payment(i % 2, dec!(1))).collect();

        let rankings = build(&[], &sales, &payments);

        assert_eq!(rankings.top_buyers.len(), 4);
        assert!(rankings.top_buyers.iter().all(|e| e.value == dec!(500)));
        let debtors: Vec<i64> = rankings.top_debtors.iter().map(|e| e.customer_id).collect();
        assert_eq!(debtors, vec![2, 3]);
    }

    #[test]
    fn debtors_exclude_non_positive_pending() {
        let customers = vec![customer(1, None), customer(2, None), customer(3, None)];
        let sales = vec![sale(1, dec!(100)), sale(2, dec!(40)), sale(3, dec!(70))];
        let payments = vec![payment(1, dec!(30)), payment(2, dec!(60)), payment(3, dec!(70))];

        let rankings = build(&customers, &sales, &payments);

        assert_eq!(rankings.top_debtors.len(), 1);
        assert_eq!(rankings.top_debtors[0].customer_id, 1);
        assert_eq!(rankings.top_debtors[0].value, dec!(70));
        assert!(rankings.top_debtors.iter().all(|e| e.value > Decimal::ZERO));
    }

    #[test]
    fn rankings_hold_at_most_ten() {
        let sales: Vec<Sale> = (1..=15).map(|id| sale(id, Decimal::from(id))).collect();

        let rankings = build(&[], &sales, &[]);

        assert_eq!(rankings.top_buyers.len(), RANKING_SIZE);
        assert_eq!(rankings.top_debtors.len(), RANKING_SIZE);
        assert_eq!(rankings.top_buyers[0].customer_id, 15);
    }
}
