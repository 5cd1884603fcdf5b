use crate::domain::format::{br_to_iso, format_phone, is_valid_iso_date};
use crate::forms::{invalid, non_blank};
use crate::models::customer::{Customer, CustomerWrite};
use serde::Deserialize;
use service_core::error::AppError;
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CustomerForm {
    #[serde(default)]
    #[validate(length(min = 1, message = "Nome é obrigatório"))]
    pub customer_name: String,
    #[serde(default)]
    pub phone: String,
    #[serde(default)]
    #[validate(email(message = "Email inválido"))]
    pub email: Option<String>,
    /// `dd/mm/yyyy` as typed, or ISO.
    #[serde(default)]
    pub birthday: String,
    #[serde(default)]
    pub city: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
}

/// Prefill for the edit form, stored values as they are.
impl From<&Customer> for CustomerForm {
    fn from(customer: &Customer) -> Self {
        Self {
            customer_name: customer.customer_name.clone().unwrap_or_default(),
            phone: customer.phone.clone().unwrap_or_default(),
            email: customer.email.clone(),
            birthday: customer.birthday.clone().unwrap_or_default(),
            city: customer.city.clone(),
            notes: customer.notes.clone(),
        }
    }
}

impl CustomerForm {
    /// Validate and build the write payload. `created_by` is set on
    /// insert only.
    pub fn into_write(self, created_by: Option<Uuid>) -> Result<CustomerWrite, AppError> {
        let form = CustomerForm {
            customer_name: self.customer_name.trim().to_string(),
            email: non_blank(self.email),
            city: non_blank(self.city),
            notes: non_blank(self.notes),
            ..self
        };
        form.validate()?;

        let digit_count = form.phone.chars().filter(char::is_ascii_digit).count();
        match digit_count {
            0 => return Err(invalid("Telefone é obrigatório")),
            1..=9 => {
                return Err(invalid(
                    "Telefone inválido: mínimo 10 dígitos (DDD + número)",
                ))
            }
            10 | 11 => {}
            _ => return Err(invalid("Telefone inválido: máximo 11 dígitos")),
        }

        let birthday = form.birthday.trim();
        if birthday.is_empty() {
            return Err(invalid("Data de aniversário é obrigatória"));
        }
        let iso = if is_valid_iso_date(birthday) {
            birthday.to_string()
        } else {
            br_to_iso(birthday)
                .ok_or_else(|| invalid("Data de aniversário inválida. Digite dd/mm/aaaa"))?
        };
        if !is_valid_iso_date(&iso) {
            return Err(invalid(
                "Data de aniversário inválida (dia/mês/ano incorretos)",
            ));
        }

        Ok(CustomerWrite {
            phone: format_phone(&form.phone),
            customer_name: form.customer_name,
            email: form.email,
            birthday: iso,
            city: form.city,
            notes: form.notes,
            created_by,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn form(name: &str, phone: &str, birthday: &str) -> CustomerForm {
        CustomerForm {
            customer_name: name.to_string(),
            phone: phone.to_string(),
            email: Some(String::new()),
            birthday: birthday.to_string(),
            city: None,
            notes: Some("  ".to_string()),
        }
    }

    #[test]
    fn formats_phone_and_converts_birthday() {
        let write = form(" Ana ", "11987654321", "31/12/1990")
            .into_write(None)
            .unwrap();
        assert_eq!(write.customer_name, "Ana");
        assert_eq!(write.phone, "(11) 98765-4321");
        assert_eq!(write.birthday, "1990-12-31");
        assert_eq!(write.email, None);
        assert_eq!(write.notes, None);
    }

    #[test]
    fn rejects_short_phone() {
        let err = form("Ana", "119876", "31/12/1990").into_write(None).unwrap_err();
        assert!(err.user_message().contains("mínimo 10 dígitos"));
    }

    #[test]
    fn rejects_impossible_birthday() {
        let err = form("Ana", "1198765432", "30/02/1990").into_write(None).unwrap_err();
        assert!(err.user_message().contains("dia/mês/ano"));
    }

    #[test]
    fn requires_name() {
        let err = form("   ", "11987654321", "01/01/1990").into_write(None).unwrap_err();
        assert!(matches!(err, AppError::ValidationError(_)));
    }
}
