//! Sale pricing: item lines, subtotal, sale-level discount and final total.

use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DiscountKind {
    /// Fixed amount in reais.
    #[default]
    Reais,
    Percent,
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Discount {
    #[serde(default)]
    pub kind: DiscountKind,
    #[serde(default)]
    pub value: Decimal,
}

impl Discount {
    pub fn reais(value: Decimal) -> Self {
        Self {
            kind: DiscountKind::Reais,
            value,
        }
    }

    pub fn percent(value: Decimal) -> Self {
        Self {
            kind: DiscountKind::Percent,
            value,
        }
    }

    /// Discount amount applied over `base`.
    pub fn amount_on(&self, base: Decimal) -> Decimal {
        match self.kind {
            DiscountKind::Reais => self.value,
            DiscountKind::Percent => base.saturating_mul(self.value) / Decimal::ONE_HUNDRED,
        }
    }

    /// Split into the stored `(discount_real, discount_percent)` columns.
    pub fn as_columns(&self) -> (Decimal, Decimal) {
        match self.kind {
            DiscountKind::Reais => (self.value, Decimal::ZERO),
            DiscountKind::Percent => (Decimal::ZERO, self.value),
        }
    }
}

pub fn round_money(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

/// `max(0, qty * unit_price - discount)`, rounded to cents.
pub fn line_total(quantity: Decimal, unit_price: Decimal, discount: &Discount) -> Decimal {
    let gross = quantity.saturating_mul(unit_price);
    round_money(gross.saturating_sub(discount.amount_on(gross)).max(Decimal::ZERO))
}

/// Sale-level discount amount; nothing is discounted from an empty subtotal.
pub fn sale_discount_amount(subtotal: Decimal, discount: &Discount) -> Decimal {
    if subtotal <= Decimal::ZERO {
        return Decimal::ZERO;
    }
    discount.amount_on(subtotal)
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PricedLine {
    pub quantity: Decimal,
    pub unit_price: Decimal,
    pub discount: Discount,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SaleTotals {
    pub subtotal: Decimal,
    pub discount: Decimal,
    pub final_total: Decimal,
}

pub fn price_sale(lines: &[PricedLine], sale_discount: &Discount) -> SaleTotals {
    let subtotal: Decimal = lines
        .iter()
        .map(|line| line_total(line.quantity, line.unit_price, &line.discount))
        .sum();
    let discount = round_money(sale_discount_amount(subtotal, sale_discount));
    SaleTotals {
        subtotal: round_money(subtotal),
        discount,
        final_total: round_money((subtotal - discount).max(Decimal::ZERO)),
    }
}

/// Detail of a stored item line. The real discount wins over the
/// percentage, which only applies when the real discount is zero.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ItemBreakdown {
    pub gross: Decimal,
    pub discount: Decimal,
    pub final_value: Decimal,
}

pub fn stored_item_breakdown(
    quantity: Decimal,
    unit_price: Decimal,
    discount_real: Decimal,
    discount_percent: Decimal,
) -> ItemBreakdown {
    let gross = quantity * unit_price;
    let discount = if !discount_real.is_zero() {
        discount_real
    } else if discount_percent > Decimal::ZERO {
        gross * discount_percent / Decimal::ONE_HUNDRED
    } else {
        Decimal::ZERO
    };
    ItemBreakdown {
        gross,
        discount,
        final_value: gross - discount,
    }
}
