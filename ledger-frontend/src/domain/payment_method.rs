//! Payment method normalization and the per-method breakdown.

use crate::models::payment::Payment;
use rust_decimal::Decimal;
use serde::Serialize;

pub const NOT_INFORMED: &str = "Não Informado";

/// Map free-text methods onto canonical labels; first matching rule wins.
pub fn normalize(method: Option<&str>) -> String {
    let raw = match method.map(str::trim) {
        Some(raw) if !raw.is_empty() => raw,
        _ => return NOT_INFORMED.to_string(),
    };
    let lower = raw.to_lowercase();

    if lower.contains("pix") {
        "PIX".to_string()
    } else if lower.contains("dinheiro") || lower == "cash" {
        "Dinheiro".to_string()
    } else if lower.contains("boleto") {
        "Boleto".to_string()
    } else if lower.contains("credito") || lower.contains("crédito") {
        "Cartão de Crédito".to_string()
    } else if lower.contains("debito") || lower.contains("débito") {
        "Cartão de Débito".to_string()
    } else {
        raw.split_whitespace()
            .map(capitalize_first)
            .collect::<Vec<_>>()
            .join(" ")
    }
}

fn capitalize_first(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct MethodShare {
    pub method: String,
    pub total: Decimal,
    /// Share of all payments, 0-100.
    pub percentage: Decimal,
}

/// Group payments by normalized method, largest total first.
pub fn breakdown(payments: &[Payment]) -> Vec<MethodShare> {
    let mut groups: Vec<(String, Decimal)> = Vec::new();
    for payment in payments {
        let method = normalize(payment.method.as_deref());
        match groups.iter_mut().find(|(name, _)| *name == method) {
            Some((_, total)) => *total += payment.amount(),
            None => groups.push((method, payment.amount())),
        }
    }

    let grand_total: Decimal = groups.iter().map(|(_, total)| *total).sum();
    let mut shares: Vec<MethodShare> = groups
        .into_iter()
        .map(|(method, total)| MethodShare {
            percentage: if grand_total.is_zero() {
                Decimal::ZERO
            } else {
                (Decimal::ONE_HUNDRED * total / grand_total).round_dp(2)
            },
            method,
            total,
        })
        .collect();

    shares.sort_by(|a, b| b.total.cmp(&a.total));
    shares
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn payment(method: Option<&str>, amount: Decimal) -> Payment {
        Payment {
            payment_id: 1,
            method: method.map(str::to_string),
            amount: Some(amount),
            ..Default::default()
        }
    }

    #[test]
    fn canonical_labels() {
        assert_eq!(normalize(Some("Pix")), "PIX");
        assert_eq!(normalize(Some("pagamento via PIX")), "PIX");
        assert_eq!(normalize(Some("dinheiro")), "Dinheiro");
        assert_eq!(normalize(Some("CASH")), "Dinheiro");
        assert_eq!(normalize(Some("boleto bancário")), "Boleto");
        assert_eq!(normalize(Some("cartão de crédito")), "Cartão de Crédito");
        assert_eq!(normalize(Some("cartão crédito")), "Cartão de Crédito");
        assert_eq!(normalize(Some("cartao debito")), "Cartão de Débito");
        assert_eq!(normalize(Some("cartão débito")), "Cartão de Débito");
    }

    #[test]
    fn missing_method_is_not_informed() {
        assert_eq!(normalize(None), NOT_INFORMED);
        assert_eq!(normalize(Some("")), NOT_INFORMED);
        assert_eq!(normalize(Some("   ")), NOT_INFORMED);
    }

    #[test]
    fn unknown_methods_are_title_cased() {
        assert_eq!(normalize(Some("transferência  bancária")), "Transferência Bancária");
        assert_eq!(normalize(Some("cheque")), "Cheque");
    }

    #[test]
    fn breakdown_groups_and_sorts() {
        let payments = vec![
            payment(Some("pix"), dec!(30)),
            payment(Some("dinheiro"), dec!(50)),
            payment(Some("PIX"), dec!(20)),
            payment(None, dec!(0)),
        ];
        let shares = breakdown(&payments);

        assert_eq!(shares.len(), 3);
        assert_eq!(shares[0].method, "PIX");
        assert_eq!(shares[0].total, dec!(50));
        assert_eq!(shares[0].percentage, dec!(50));
        assert_eq!(shares[1].method, "Dinheiro");
        assert_eq!(shares[2].method, NOT_INFORMED);
        assert_eq!(shares[2].percentage, dec!(0));
    }

    #[test]
    fn breakdown_of_nothing_is_empty() {
        assert!(breakdown(&[]).is_empty());
    }
}
