use crate::domain::format::{br_to_iso, is_valid_iso_date};
use crate::domain::pricing::{line_total, price_sale, Discount, PricedLine, SaleTotals};
use crate::forms::{invalid, non_blank};
use crate::models::sale::{SaleDraft, SaleItem, SaleWrite};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use service_core::error::AppError;
use uuid::Uuid;
use validator::Validate;

/// Largest quantity accepted on a single line.
const MAX_QUANTITY: Decimal = Decimal::from_parts(1_000_000, 0, 0, false, 0);

/// Largest price or discount value accepted, in reais or percent.
const MAX_AMOUNT: Decimal = Decimal::from_parts(1_000_000_000, 0, 0, false, 0);

fn within_limit(value: Decimal, limit: Decimal) -> Result<(), AppError> {
    if value > limit {
        return Err(invalid("Valor inválido"));
    }
    Ok(())
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SaleItemForm {
    #[serde(default)]
    pub codigo: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub quantity: Decimal,
    #[serde(default)]
    pub unit_price: Decimal,
    #[serde(default)]
    pub discount: Discount,
    #[serde(default)]
    pub note: Option<String>,
}

impl SaleItemForm {
    fn priced(&self) -> PricedLine {
        PricedLine {
            quantity: self.quantity,
            unit_price: self.unit_price,
            discount: self.discount,
        }
    }

    fn check(&self) -> Result<(), AppError> {
        if self.unit_price < Decimal::ZERO {
            return Err(invalid("Valor unitário inválido."));
        }
        if self.quantity <= Decimal::ZERO {
            return Err(invalid("Cada item precisa ter quantidade mínima 1."));
        }
        if self.discount.value < Decimal::ZERO {
            return Err(invalid("Desconto inválido em um dos itens."));
        }
        within_limit(self.quantity, MAX_QUANTITY)?;
        within_limit(self.unit_price, MAX_AMOUNT)?;
        within_limit(self.discount.value, MAX_AMOUNT)
    }

    fn into_item(self) -> SaleItem {
        let (discount_real, discount_percent) = self.discount.as_columns();
        SaleItem {
            line_total: Some(line_total(self.quantity, self.unit_price, &self.discount)),
            codigo: non_blank(self.codigo),
            item: non_blank(self.description),
            quantity: Some(self.quantity),
            unit_price: Some(self.unit_price),
            discount_real_i: Some(discount_real),
            discount_percent_i: Some(discount_percent),
            note_i: non_blank(self.note),
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct SaleForm {
    #[serde(default)]
    pub customer_id: Option<i64>,
    /// ISO, or `dd/mm/yyyy`.
    #[serde(default)]
    pub date: String,
    #[serde(default)]
    #[validate(length(min = 1, message = "Adicione ao menos um item"))]
    pub items: Vec<SaleItemForm>,
    /// Sale-level discount over the subtotal.
    #[serde(default)]
    pub discount: Discount,
    #[serde(default)]
    pub notes: Option<String>,
}

impl SaleForm {
    pub fn customer_id(&self) -> Result<i64, AppError> {
        self.customer_id.ok_or_else(|| invalid("Selecione um cliente"))
    }

    pub fn totals(&self) -> SaleTotals {
        let lines: Vec<PricedLine> = self.items.iter().map(SaleItemForm::priced).collect();
        price_sale(&lines, &self.discount)
    }

    /// Validate and price the sale. `created_by` is only written on insert;
    /// items always carry the author.
    pub fn into_draft(self, author: Uuid, creating: bool) -> Result<SaleDraft, AppError> {
        let customer_id = self.customer_id()?;
        let date = self.iso_date()?;
        self.validate()?;
        for item in &self.items {
            item.check()?;
        }
        if self.discount.value < Decimal::ZERO {
            return Err(invalid("Desconto da venda inválido."));
        }
        within_limit(self.discount.value, MAX_AMOUNT)?;

        let totals = self.totals();
        let (discount_real, discount_percent) = self.discount.as_columns();
        Ok(SaleDraft {
            header: SaleWrite {
                customer_id,
                date,
                total_amount: totals.subtotal,
                discount_real,
                discount_percent,
                final_total: totals.final_total,
                notes: non_blank(self.notes),
                created_by: creating.then_some(author),
            },
            lines: self.items.into_iter().map(SaleItemForm::into_item).collect(),
            sale_discount: totals.discount,
            author,
        })
    }

    fn iso_date(&self) -> Result<String, AppError> {
        let raw = self.date.trim();
        if raw.is_empty() {
            return Err(invalid("Selecione a data"));
        }
        let iso = if is_valid_iso_date(raw) {
            raw.to_string()
        } else {
            br_to_iso(raw).unwrap_or_default()
        };
        if !is_valid_iso_date(&iso) {
            return Err(invalid("Data inválida"));
        }
        Ok(iso)
    }
}
