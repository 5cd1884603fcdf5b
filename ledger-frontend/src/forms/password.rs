use crate::forms::invalid;
use serde::Deserialize;
use service_core::error::AppError;

/// New password for the signed-in user.
#[derive(Debug, Clone, Deserialize)]
pub struct PasswordForm {
    #[serde(default)]
    pub new_password: String,
    #[serde(default)]
    pub confirm_password: String,
}

impl PasswordForm {
    pub fn checked(&self) -> Result<&str, AppError> {
        check_new_password(&self.new_password, &self.confirm_password)
    }
}

/// Completion of the emailed recovery flow; `access_token` is the recovery
/// token carried by the email link.
#[derive(Debug, Clone, Deserialize)]
pub struct ResetPasswordForm {
    #[serde(default)]
    pub access_token: String,
    #[serde(default)]
    pub new_password: String,
    #[serde(default)]
    pub confirm_password: String,
}

impl ResetPasswordForm {
    pub fn checked(&self) -> Result<(&str, &str), AppError> {
        let token = self.access_token.trim();
        if token.is_empty() {
            return Err(invalid("Link de recuperação inválido ou expirado."));
        }
        let password = check_new_password(&self.new_password, &self.confirm_password)?;
        Ok((token, password))
    }
}

/// Email for the "forgot password" link.
#[derive(Debug, Clone, Deserialize)]
pub struct ForgotPasswordForm {
    #[serde(default)]
    pub email: String,
}

impl ForgotPasswordForm {
    pub fn email(&self) -> Result<String, AppError> {
        let email = self.email.trim().to_lowercase();
        if email.is_empty() {
            return Err(invalid("Informe o email."));
        }
        Ok(email)
    }
}

fn check_new_password<'a>(password: &'a str, confirmation: &str) -> Result<&'a str, AppError> {
    if password.is_empty() {
        return Err(invalid("Informe a nova senha."));
    }
    if password != confirmation {
        return Err(invalid("Senhas não conferem."));
    }
    Ok(password)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn requires_matching_new_password() {
        let form = PasswordForm {
            new_password: String::new(),
            confirm_password: String::new(),
        };
        assert_eq!(form.checked().unwrap_err().user_message(), "Informe a nova senha.");

        let form = PasswordForm {
            new_password: "abc123".into(),
            confirm_password: "abc124".into(),
        };
        assert_eq!(form.checked().unwrap_err().user_message(), "Senhas não conferem.");
    }

    #[test]
    fn reset_needs_recovery_token() {
        let form = ResetPasswordForm {
            access_token: " ".into(),
            new_password: "abc123".into(),
            confirm_password: "abc123".into(),
        };
        assert!(form.checked().is_err());

        let form = ResetPasswordForm {
            access_token: "tok".into(),
            ..form
        };
        assert_eq!(form.checked().unwrap(), ("tok", "abc123"));
    }
}
