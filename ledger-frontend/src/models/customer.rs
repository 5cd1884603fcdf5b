//! Customer rows as stored in the `customers` table.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Single customer.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Customer {
    pub customer_id: i64,
    #[serde(default)]
    pub controle_customer: Option<i64>,
    #[serde(default)]
    pub customer_name: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub birthday: Option<String>,
    #[serde(default)]
    pub city: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub created_by: Option<Uuid>,
}

impl Customer {
    /// Name shown in lists, `#<id>` when the row has none.
    pub fn display_name(&self) -> String {
        match self.customer_name.as_deref().map(str::trim) {
            Some(name) if !name.is_empty() => name.to_string(),
            _ => format!("#{}", self.customer_id),
        }
    }

    /// Human-facing control number, falling back to the id.
    pub fn control_number(&self) -> i64 {
        self.controle_customer.unwrap_or(self.customer_id)
    }

    /// Case-insensitive substring match over name, phone, email and city.
    pub fn matches_search(&self, term: &str) -> bool {
        let term = term.trim().to_lowercase();
        if term.is_empty() {
            return true;
        }
        [&self.customer_name, &self.phone, &self.email, &self.city]
            .iter()
            .filter_map(|field| field.as_deref())
            .any(|value| value.to_lowercase().contains(&term))
    }
}

/// Embedded `customers(customer_name)` resource on sales and payments.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct CustomerRef {
    #[serde(default)]
    pub customer_name: Option<String>,
}

/// Write payload for insert and update.
#[derive(Debug, Clone, Serialize)]
pub struct CustomerWrite {
    pub customer_name: String,
    pub phone: String,
    pub email: Option<String>,
    pub birthday: String,
    pub city: Option<String>,
    pub notes: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_by: Option<Uuid>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn customer(name: Option<&str>) -> Customer {
        Customer {
            customer_id: 42,
            controle_customer: None,
            customer_name: name.map(str::to_string),
            phone: Some("(11) 98765-4321".to_string()),
            email: Some("Ana@Example.com".to_string()),
            birthday: None,
            city: Some("Campinas".to_string()),
            notes: None,
            created_by: None,
        }
    }

    #[test]
    fn display_name_falls_back_to_id() {
        assert_eq!(customer(None).display_name(), "#42");
        assert_eq!(customer(Some("  ")).display_name(), "#42");
        assert_eq!(customer(Some("Ana")).display_name(), "Ana");
        assert_eq!(customer(None).control_number(), 42);
    }

    #[test]
    fn search_covers_contact_fields() {
        let c = customer(Some("Ana Souza"));
        assert!(c.matches_search("souza"));
        assert!(c.matches_search("98765"));
        assert!(c.matches_search("ana@example"));
        assert!(c.matches_search("CAMP"));
        assert!(!c.matches_search("recife"));
        assert!(c.matches_search(""));
    }
}
