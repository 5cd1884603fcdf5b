//! Payments received from customers.

use crate::models::customer::CustomerRef;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Payment {
    pub payment_id: i64,
    #[serde(default)]
    pub controle_pagamentos: Option<i64>,
    #[serde(default)]
    pub customer_id: Option<i64>,
    #[serde(default)]
    pub amount: Option<Decimal>,
    #[serde(default)]
    pub date: Option<String>,
    #[serde(default)]
    pub method: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub created_by: Option<Uuid>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub customers: Option<CustomerRef>,
}

impl Payment {
    pub fn amount(&self) -> Decimal {
        self.amount.unwrap_or(Decimal::ZERO)
    }

    pub fn display_number(&self) -> i64 {
        self.controle_pagamentos.unwrap_or(self.payment_id)
    }

    pub fn customer_name(&self) -> String {
        self.customers
            .as_ref()
            .and_then(|c| c.customer_name.clone())
            .unwrap_or_else(|| match self.customer_id {
                Some(id) => format!("#{}", id),
                None => "—".to_string(),
            })
    }
}

/// Payment write payload.
#[derive(Debug, Clone, Serialize)]
pub struct PaymentWrite {
    pub customer_id: i64,
    pub amount: Decimal,
    pub date: String,
    pub method: Option<String>,
    pub notes: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_by: Option<Uuid>,
}
