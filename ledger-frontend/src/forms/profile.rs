use crate::domain::format::{br_to_iso, format_phone, is_valid_iso_date, is_valid_phone};
use crate::forms::{invalid, non_blank, USERNAME_RE};
use crate::models::profile::ProfileWrite;
use serde::Deserialize;
use service_core::error::AppError;
use validator::Validate;

/// Admin edit of another user's profile.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct ProfileForm {
    #[serde(default)]
    pub full_name: Option<String>,
    #[serde(default)]
    #[validate(regex(
        path = *USERNAME_RE,
        message = "Username inválido. Use ao menos 3 caracteres: letras, números, ponto, hífen ou sublinhado."
    ))]
    pub username: String,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub birthday: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
}

impl ProfileForm {
    /// Normalized username, for the uniqueness check.
    pub fn username(&self) -> String {
        self.username.trim().to_string()
    }

    pub fn into_write(self) -> Result<ProfileWrite, AppError> {
        let form = ProfileForm {
            username: self.username.trim().to_string(),
            ..self
        };
        form.validate()?;

        let phone = non_blank(form.phone).map(|p| format_phone(&p));
        if let Some(phone) = &phone {
            if !is_valid_phone(phone) {
                return Err(invalid(
                    "Telefone inválido. Use (xx) xxxx-xxxx ou (xx) xxxxx-xxxx.",
                ));
            }
        }

        let birthday = match non_blank(form.birthday) {
            None => None,
            Some(raw) if is_valid_iso_date(&raw) => Some(raw),
            Some(raw) => Some(
                br_to_iso(&raw)
                    .filter(|iso| is_valid_iso_date(iso))
                    .ok_or_else(|| invalid("Data de aniversário inválida"))?,
            ),
        };

        Ok(ProfileWrite {
            full_name: non_blank(form.full_name),
            username: Some(form.username),
            phone,
            birthday,
            notes: non_blank(form.notes),
        })
    }
}
