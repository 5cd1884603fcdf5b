//! Per-customer balances: sales minus payments, split by sign.

use crate::domain::settlement::StatusFilter;
use crate::models::{customer::Customer, payment::Payment, sale::Sale};
use rust_decimal::Decimal;
use serde::Serialize;
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum BalanceClass {
    Pending,
    Credit,
    Neutral,
}

#[derive(Debug, Clone, Serialize)]
pub struct CustomerBalance {
    pub customer: Customer,
    pub sales_sum: Decimal,
    pub payments_sum: Decimal,
    pub unpaid_count: usize,
    /// `sales_sum - payments_sum`.
    pub pending: Decimal,
    /// Sale rows passing the status filter; the sums above ignore it.
    pub sales: Vec<Sale>,
    pub payments: Vec<Payment>,
}

impl CustomerBalance {
    pub fn class(&self) -> BalanceClass {
        if self.pending > Decimal::ZERO {
            BalanceClass::Pending
        } else if self.pending < Decimal::ZERO {
            BalanceClass::Credit
        } else {
            BalanceClass::Neutral
        }
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct BalanceReport {
    pub pending: Vec<CustomerBalance>,
    pub credit: Vec<CustomerBalance>,
    pub neutral: Vec<CustomerBalance>,
    /// Sum of the positive pendings.
    pub total_pending: Decimal,
}

impl BalanceReport {
    pub fn hide_neutral(&mut self) {
        self.neutral.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty() && self.credit.is_empty() && self.neutral.is_empty()
    }
}

/// Restrict the owner-scoped customers to the selected one, if any. A
/// selection outside the scoped list yields nothing.
pub fn customers_in_scope(customers: &[Customer], selected: Option<i64>) -> Vec<Customer> {
    match selected {
        Some(id) => customers
            .iter()
            .filter(|c| c.customer_id == id)
            .cloned()
            .collect(),
        None => customers.to_vec(),
    }
}

#[derive(Default)]
struct Accumulator {
    sales_sum: Decimal,
    unpaid_count: usize,
    sales: Vec<Sale>,
    payments_sum: Decimal,
    payments: Vec<Payment>,
}

/// Build the pending/credit/neutral partitions for the customers in scope.
/// Rows of other customers are ignored.
pub fn aggregate(
    customers: &[Customer],
    sales: &[Sale],
    payments: &[Payment],
    status: StatusFilter,
) -> BalanceReport {
    let mut by_customer: HashMap<i64, Accumulator> = HashMap::new();

    for sale in sales {
        let Some(customer_id) = sale.customer_id else {
            continue;
        };
        let acc = by_customer.entry(customer_id).or_default();
        let settled = sale.is_settled();
        acc.sales_sum += sale.amount();
        if !settled {
            acc.unpaid_count += 1;
        }
        if status.accepts(settled) {
            acc.sales.push(sale.clone());
        }
    }

    for payment in payments {
        let Some(customer_id) = payment.customer_id else {
            continue;
        };
        let acc = by_customer.entry(customer_id).or_default();
        acc.payments_sum += payment.amount();
        acc.payments.push(payment.clone());
    }

    let mut report = BalanceReport::default();
    for customer in customers {
        let acc = by_customer.remove(&customer.customer_id).unwrap_or_default();
        let balance = CustomerBalance {
            customer: customer.clone(),
            sales_sum: acc.sales_sum,
            payments_sum: acc.payments_sum,
            unpaid_count: acc.unpaid_count,
            pending: acc.sales_sum - acc.payments_sum,
            sales: acc.sales,
            payments: acc.payments,
        };
        match balance.class() {
            BalanceClass::Pending => {
                report.total_pending += balance.pending;
                report.pending.push(balance);
            }
            BalanceClass::Credit => report.credit.push(balance),
            BalanceClass::Neutral => report.neutral.push(balance),
        }
    }

    report
}
