use crate::domain::format::{br_to_iso, format_phone, is_valid_iso_date, is_valid_phone};
use crate::forms::{invalid, non_blank, SIGNUP_USERNAME_RE};
use crate::models::auth::SignUpMetadata;
use serde::Deserialize;
use service_core::error::AppError;
use validator::Validate;

pub const MIN_PASSWORD_LEN: u64 = 6;

/// Access request submitted from the public sign-up page.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct SignUpForm {
    #[serde(default)]
    #[validate(length(min = 1, message = "Informe o nome completo."))]
    pub full_name: String,
    #[serde(default)]
    #[validate(regex(
        path = *SIGNUP_USERNAME_RE,
        message = "Username inválido. Use letras, números, ponto, hífen ou sublinhado."
    ))]
    pub username: String,
    #[serde(default)]
    #[validate(email(message = "Email inválido."))]
    pub email: String,
    #[serde(default)]
    pub email_confirmation: String,
    #[serde(default)]
    #[validate(length(min = 6, message = "A senha deve ter ao menos 6 caracteres."))]
    pub password: String,
    #[serde(default)]
    pub password_confirmation: String,
    #[serde(default)]
    pub phone: String,
    #[serde(default)]
    pub birthday: Option<String>,
}

/// A checked sign-up request, ready for the auth service.
#[derive(Debug, Clone, PartialEq)]
pub struct SignUp {
    pub email: String,
    pub password: String,
    pub metadata: SignUpMetadata,
}

impl SignUpForm {
    pub fn username(&self) -> String {
        self.username.trim().to_string()
    }

    pub fn into_sign_up(self) -> Result<SignUp, AppError> {
        let form = SignUpForm {
            full_name: self.full_name.trim().to_string(),
            username: self.username.trim().to_string(),
            email: self.email.trim().to_lowercase(),
            email_confirmation: self.email_confirmation.trim().to_lowercase(),
            phone: format_phone(&self.phone),
            ..self
        };
        if form.username.is_empty() {
            return Err(invalid("Informe o username."));
        }
        if form.email.is_empty() {
            return Err(invalid("Informe o email."));
        }
        form.validate()?;

        if form.email != form.email_confirmation {
            return Err(invalid("Os emails não conferem."));
        }
        if form.password != form.password_confirmation {
            return Err(invalid("As senhas não conferem."));
        }
        if !is_valid_phone(&form.phone) {
            return Err(invalid(
                "Telefone inválido. Use (xx) xxxx-xxxx ou (xx) xxxxx-xxxx.",
            ));
        }

        let birthday = match non_blank(form.birthday) {
            None => None,
            Some(raw) if is_valid_iso_date(&raw) => Some(raw),
            Some(raw) => Some(
                br_to_iso(&raw)
                    .filter(|iso| is_valid_iso_date(iso))
                    .ok_or_else(|| invalid("Data de aniversário inválida."))?,
            ),
        };

        Ok(SignUp {
            email: form.email,
            password: form.password,
            metadata: SignUpMetadata {
                full_name: form.full_name,
                username: form.username,
                phone: form.phone,
                birthday,
            },
        })
    }
}
