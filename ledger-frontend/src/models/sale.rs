//! Sales and their line items.

use crate::domain::settlement;
use crate::models::customer::CustomerRef;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// Sale header row. `pago` and `controle_vendas` keep whatever legacy
/// encoding the row was written with.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Sale {
    pub sale_id: i64,
    #[serde(default)]
    pub controle_vendas: Option<Value>,
    #[serde(default)]
    pub customer_id: Option<i64>,
    #[serde(default)]
    pub date: Option<String>,
    #[serde(default)]
    pub total_amount: Option<Decimal>,
    #[serde(default)]
    pub discount_real: Option<Decimal>,
    #[serde(default)]
    pub discount_percent: Option<Decimal>,
    #[serde(default)]
    pub final_total: Option<Decimal>,
    #[serde(default)]
    pub pago: Option<Value>,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub created_by: Option<Uuid>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub customers: Option<CustomerRef>,
}

impl Sale {
    /// Effective amount: `final_total`, then `total_amount`, then zero.
    pub fn amount(&self) -> Decimal {
        self.final_total
            .or(self.total_amount)
            .unwrap_or(Decimal::ZERO)
    }

    pub fn is_settled(&self) -> bool {
        settlement::is_settled(self.pago.as_ref(), self.controle_vendas.as_ref())
    }

    /// Number shown to users: a numeric `controle_vendas`, else the id.
    pub fn display_number(&self) -> i64 {
        self.controle_vendas
            .as_ref()
            .and_then(|value| match value {
                Value::Number(n) => n.as_i64(),
                Value::String(s) => s.trim().parse().ok(),
                _ => None,
            })
            .unwrap_or(self.sale_id)
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

/// Line item row in `sale_items`.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct SaleItem {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
    #[serde(default)]
    pub sale_id: Option<i64>,
    #[serde(default)]
    pub codigo: Option<String>,
    #[serde(default)]
    pub item: Option<String>,
    #[serde(default)]
    pub quantity: Option<Decimal>,
    #[serde(default)]
    pub unit_price: Option<Decimal>,
    #[serde(default)]
    pub discount_real_i: Option<Decimal>,
    #[serde(default)]
    pub discount_percent_i: Option<Decimal>,
    #[serde(default)]
    pub line_total: Option<Decimal>,
    #[serde(default)]
    pub note_i: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub customer_id: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_item: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_by: Option<Uuid>,
}

/// Sale header write payload.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SaleWrite {
    pub customer_id: i64,
    pub date: String,
    pub total_amount: Decimal,
    pub discount_real: Decimal,
    pub discount_percent: Decimal,
    pub final_total: Decimal,
    pub notes: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_by: Option<Uuid>,
}

/// Everything a sale form writes: the header, its item lines and the
/// sale-level discount amount, booked as an extra negative line.
#[derive(Debug, Clone, PartialEq)]
pub struct SaleDraft {
    pub header: SaleWrite,
    pub lines: Vec<SaleItem>,
    pub sale_discount: Decimal,
    pub author: Uuid,
}

impl SaleDraft {
    /// Item rows to insert for sale `sale_id`, shown to users as
    /// `sale_number`.
    pub fn items_for(&self, sale_id: i64, sale_number: i64) -> Vec<SaleItem> {
        let stamp = |item: SaleItem| SaleItem {
            sale_id: Some(sale_id),
            customer_id: Some(self.header.customer_id),
            data_item: Some(self.header.date.clone()),
            created_by: Some(self.author),
            ..item
        };

        let mut items: Vec<SaleItem> = self.lines.iter().cloned().map(stamp).collect();
        if self.sale_discount > Decimal::ZERO {
            items.push(stamp(SaleItem {
                codigo: Some("DESCONTO".to_string()),
                item: Some("Desconto da venda".to_string()),
                quantity: Some(Decimal::ONE),
                unit_price: Some(-self.sale_discount),
                discount_real_i: Some(Decimal::ZERO),
                discount_percent_i: Some(Decimal::ZERO),
                line_total: Some(-self.sale_discount),
                note_i: Some(format!("Desconto aplicado na venda #{}", sale_number)),
                ..Default::default()
            }));
        }
        items
    }
}

/// Row of the `v_sales_with_items` view used on the customer detail page.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct SaleWithItems {
    pub sale_id: i64,
    #[serde(default)]
    pub controle_vendas: Option<Value>,
    #[serde(default)]
    pub date: Option<String>,
    #[serde(default)]
    pub total_amount: Option<Decimal>,
    #[serde(default)]
    pub final_total: Option<Decimal>,
    #[serde(default)]
    pub pago: Option<Value>,
    #[serde(default)]
    pub items: Option<Value>,
}

impl SaleWithItems {
    pub fn amount(&self) -> Decimal {
        self.final_total
            .or(self.total_amount)
            .unwrap_or(Decimal::ZERO)
    }

    pub fn is_settled(&self) -> bool {
        settlement::is_settled(self.pago.as_ref(), self.controle_vendas.as_ref())
    }

    /// Item count when the view returns a JSON array.
    pub fn item_count(&self) -> usize {
        match &self.items {
            Some(Value::Array(items)) => items.len(),
            _ => 0,
        }
    }
}
