//! Settlement status of a sale.
//!
//! Rows carry the status in two legacy columns, `pago` and `controle_vendas`,
//! holding booleans, numbers or free text. Both are normalized to exactly two
//! states; anything ambiguous counts as not settled.

use serde::{Deserialize, Serialize};
use serde_json::Value;

const SETTLED_TOKENS: &[&str] = &["quitado", "q", "s", "sim", "yes", "true", "1"];

const NOT_SETTLED_TOKENS: &[&str] = &[
    "não quitado",
    "nao_quitado",
    "nao quitado",
    "nao",
    "n",
    "0",
    "false",
    "no",
    "não",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Settlement {
    Settled,
    NotSettled,
}

/// Classify one status field. `None` means the value says nothing.
pub fn classify(value: Option<&Value>) -> Option<Settlement> {
    match value? {
        Value::Bool(true) => Some(Settlement::Settled),
        Value::Bool(false) => Some(Settlement::NotSettled),
        Value::String(text) => classify_text(text),
        Value::Number(n) => match n.as_f64() {
            Some(v) if v == 1.0 => Some(Settlement::Settled),
            Some(v) if v == 0.0 => Some(Settlement::NotSettled),
            _ => None,
        },
        _ => None,
    }
}

fn classify_text(text: &str) -> Option<Settlement> {
    let token = text.trim().to_lowercase();
    if token.is_empty() {
        None
    } else if SETTLED_TOKENS.contains(&token.as_str()) {
        Some(Settlement::Settled)
    } else if NOT_SETTLED_TOKENS.contains(&token.as_str()) {
        Some(Settlement::NotSettled)
    } else {
        None
    }
}

/// `pago` decides first, `controle_vendas` second, otherwise not settled.
pub fn is_settled(pago: Option<&Value>, controle_vendas: Option<&Value>) -> bool {
    classify(pago)
        .or_else(|| classify(controle_vendas))
        .map(|status| status == Settlement::Settled)
        .unwrap_or(false)
}

/// Display-only filter on sale rows; never changes any sum.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum StatusFilter {
    #[default]
    #[serde(rename = "all")]
    All,
    #[serde(rename = "quitado")]
    Settled,
    #[serde(rename = "nao_quitado")]
    NotSettled,
}

impl StatusFilter {
    pub fn accepts(&self, settled: bool) -> bool {
        match self {
            StatusFilter::All => true,
            StatusFilter::Settled => settled,
            StatusFilter::NotSettled => !settled,
        }
    }

    pub fn is_all(&self) -> bool {
        matches!(self, StatusFilter::All)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            StatusFilter::All => "all",
            StatusFilter::Settled => "quitado",
            StatusFilter::NotSettled => "nao_quitado",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn settled_vocabulary() {
        for token in ["quitado", "Q", " s ", "SIM", "yes", "true", "1"] {
            assert_eq!(
                classify(Some(&json!(token))),
                Some(Settlement::Settled),
                "{token}"
            );
        }
    }

    #[test]
    fn not_settled_vocabulary() {
        for token in [
            "não quitado",
            "NAO_QUITADO",
            "nao quitado",
            "nao",
            "n",
            "0",
            "false",
            "no",
            "NÃO",
        ] {
            assert_eq!(
                classify(Some(&json!(token))),
                Some(Settlement::NotSettled),
                "{token}"
            );
        }
    }

    #[test]
    fn booleans_and_numbers() {
        assert_eq!(classify(Some(&json!(true))), Some(Settlement::Settled));
        assert_eq!(classify(Some(&json!(false))), Some(Settlement::NotSettled));
        assert_eq!(classify(Some(&json!(1))), Some(Settlement::Settled));
        assert_eq!(classify(Some(&json!(0))), Some(Settlement::NotSettled));
        assert_eq!(classify(Some(&json!(1503))), None);
    }

    #[test]
    fn unknown_values_say_nothing() {
        assert_eq!(classify(None), None);
        assert_eq!(classify(Some(&Value::Null)), None);
        assert_eq!(classify(Some(&json!("   "))), None);
        assert_eq!(classify(Some(&json!("talvez"))), None);
        assert_eq!(classify(Some(&json!({"a": 1}))), None);
    }

    #[test]
    fn primary_field_wins() {
        assert!(!is_settled(Some(&json!(false)), Some(&json!("quitado"))));
        assert!(is_settled(Some(&json!("sim")), Some(&json!("nao"))));
    }

    #[test]
    fn falls_back_to_secondary_then_not_settled() {
        assert!(is_settled(Some(&json!("")), Some(&json!("Quitado"))));
        assert!(is_settled(None, Some(&json!(1))));
        assert!(!is_settled(Some(&json!("???")), Some(&json!(1503))));
        assert!(!is_settled(None, None));
    }

    #[test]
    fn status_filter_parses_query_values() {
        let filter: StatusFilter = serde_json::from_value(json!("nao_quitado")).unwrap();
        assert_eq!(filter, StatusFilter::NotSettled);
        assert!(filter.accepts(false));
        assert!(!filter.accepts(true));
        assert!(StatusFilter::default().is_all());
    }
}
