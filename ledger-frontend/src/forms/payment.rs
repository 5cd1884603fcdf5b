use crate::domain::format::{br_to_iso, is_valid_iso_date};
use crate::forms::{invalid, non_blank};
use crate::models::payment::PaymentWrite;
use rust_decimal::Decimal;
use serde::Deserialize;
use service_core::error::AppError;
use uuid::Uuid;

/// Options offered by the payment method picker.
pub const PAYMENT_METHODS: [&str; 5] = [
    "dinheiro",
    "cartão débito",
    "cartão crédito",
    "PIX",
    "boleto",
];

#[derive(Debug, Clone, Deserialize)]
pub struct PaymentForm {
    #[serde(default)]
    pub customer_id: Option<i64>,
    #[serde(default)]
    pub amount: Option<Decimal>,
    #[serde(default)]
    pub date: String,
    #[serde(default)]
    pub method: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
}

impl PaymentForm {
    pub fn customer_id(&self) -> Result<i64, AppError> {
        self.customer_id.ok_or_else(|| invalid("Cliente é obrigatório"))
    }

    /// `created_by` is set on insert only.
    pub fn into_write(self, created_by: Option<Uuid>) -> Result<PaymentWrite, AppError> {
        let customer_id = self.customer_id()?;
        let amount = self.amount.ok_or_else(|| invalid("Valor inválido"))?;
        if amount <= Decimal::ZERO {
            return Err(invalid("Valor deve ser maior que zero"));
        }

        let raw = self.date.trim();
        if raw.is_empty() {
            return Err(invalid("Data é obrigatória"));
        }
        let date = if is_valid_iso_date(raw) {
            raw.to_string()
        } else {
            br_to_iso(raw)
                .filter(|iso| is_valid_iso_date(iso))
                .ok_or_else(|| invalid("Data inválida"))?
        };

        Ok(PaymentWrite {
            customer_id,
            amount,
            date,
            method: non_blank(self.method),
            notes: non_blank(self.notes),
            created_by,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use serde_json::json;

    #[test]
    fn builds_payment_payload() {
        let form: PaymentForm = serde_json::from_value(json!({
            "customer_id": 4,
            "amount": "50.00",
            "date": "10/04/2024",
            "method": " PIX ",
            "notes": ""
        }))
        .unwrap();
        let author = Uuid::new_v4();
        let write = form.into_write(Some(author)).unwrap();
        assert_eq!(write.amount, dec!(50.00));
        assert_eq!(write.date, "2024-04-10");
        assert_eq!(write.method.as_deref(), Some("PIX"));
        assert_eq!(write.notes, None);
        assert_eq!(write.created_by, Some(author));
    }

    #[test]
    fn rejects_non_positive_amount() {
        let form: PaymentForm = serde_json::from_value(json!({
            "customer_id": 4,
            "amount": 0,
            "date": "2024-04-10"
        }))
        .unwrap();
        assert_eq!(
            form.into_write(None).unwrap_err().user_message(),
            "Valor deve ser maior que zero"
        );
    }
}
