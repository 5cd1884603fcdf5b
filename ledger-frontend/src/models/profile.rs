//! User profiles (`profiles` table, `v_app_users` view).

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Row of the `v_app_users` view joining auth users and profiles.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct AppUser {
    pub id: Uuid,
    #[serde(default)]
    pub full_name: Option<String>,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub birthday: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub role: Option<String>,
    #[serde(default)]
    pub is_approved: Option<bool>,
    #[serde(default)]
    pub is_active: Option<bool>,
    #[serde(default)]
    pub is_admin: Option<bool>,
    #[serde(default)]
    pub created_at: Option<String>,
}

impl AppUser {
    pub fn has_admin_role(&self) -> bool {
        self.is_admin.unwrap_or(false)
            || self
                .role
                .as_deref()
                .map(|role| role.to_lowercase().contains("admin"))
                .unwrap_or(false)
    }

    pub fn approved(&self) -> bool {
        self.is_approved.unwrap_or(false)
    }

    pub fn active(&self) -> bool {
        self.is_active.unwrap_or(false)
    }

    /// Name for lists: full name, then email, then the id.
    pub fn display_name(&self) -> String {
        self.full_name
            .as_deref()
            .filter(|name| !name.trim().is_empty())
            .or(self.email.as_deref())
            .map(str::to_string)
            .unwrap_or_else(|| self.id.to_string())
    }

    /// Case-insensitive substring match over full name, email and username.
    pub fn matches_search(&self, term: &str) -> bool {
        let term = term.trim().to_lowercase();
        if term.is_empty() {
            return true;
        }
        [&self.full_name, &self.email, &self.username]
            .iter()
            .filter_map(|field| field.as_deref())
            .any(|value| value.to_lowercase().contains(&term))
    }
}

/// Minimal `{id, full_name}` projection used to name creators.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct ProfileName {
    pub id: Uuid,
    #[serde(default)]
    pub full_name: Option<String>,
}

/// Admin edit payload for `profiles`.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ProfileWrite {
    pub full_name: Option<String>,
    pub username: Option<String>,
    pub phone: Option<String>,
    pub birthday: Option<String>,
    pub notes: Option<String>,
}

/// A user who created rows, offered in the admin "users" filter.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct Creator {
    pub id: Uuid,
    pub name: String,
}

/// `profiles` row carrying the sign-up metadata, read for user birthdays.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct ProfileMeta {
    pub id: Uuid,
    #[serde(default)]
    pub full_name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub raw_user_meta_data: Option<serde_json::Value>,
}

impl ProfileMeta {
    pub fn birthday(&self) -> Option<&str> {
        self.raw_user_meta_data
            .as_ref()?
            .get("birthday")?
            .as_str()
            .filter(|b| !b.trim().is_empty())
    }

    pub fn display_name(&self) -> String {
        self.full_name
            .as_deref()
            .filter(|name| !name.trim().is_empty())
            .or(self.email.as_deref())
            .map(str::to_string)
            .unwrap_or_else(|| self.id.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn admin_role_is_substring_match() {
        let mut user = AppUser {
            id: Uuid::new_v4(),
            role: Some("super_admin".to_string()),
            ..Default::default()
        };
        assert!(user.has_admin_role());

        user.role = Some("seller".to_string());
        assert!(!user.has_admin_role());

        user.is_admin = Some(true);
        assert!(user.has_admin_role());
    }

    #[test]
    fn search_matches_username_case_insensitively() {
        let user = AppUser {
            id: Uuid::new_v4(),
            full_name: Some("Carla Dias".to_string()),
            username: Some("carla.d".to_string()),
            email: Some("carla@loja.com".to_string()),
            ..Default::default()
        };
        assert!(user.matches_search("CARLA.D"));
        assert!(user.matches_search("loja"));
        assert!(!user.matches_search("bruno"));
    }
}
