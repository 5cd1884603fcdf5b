//! Ownership and role rules shared by every list, detail and write path.

use serde::Serialize;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Role {
    Admin,
    Member,
}

/// The signed-in user as seen by authorization.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Viewer {
    pub user_id: Uuid,
    pub role: Role,
}

impl Viewer {
    pub fn new(user_id: Uuid, is_admin: bool) -> Self {
        Self {
            user_id,
            role: if is_admin { Role::Admin } else { Role::Member },
        }
    }

    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }
}

/// Which creators' rows a query may return.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OwnerScope {
    All,
    Only(Uuid),
    Creators(Vec<Uuid>),
}

impl OwnerScope {
    pub fn permits(&self, owner: Option<Uuid>) -> bool {
        match self {
            OwnerScope::All => true,
            OwnerScope::Only(id) => owner == Some(*id),
            OwnerScope::Creators(ids) => owner.map(|o| ids.contains(&o)).unwrap_or(false),
        }
    }
}

/// Members always see their own rows; admins see everything unless they
/// picked specific creators.
pub fn owner_scope(viewer: &Viewer, selected_creators: &[Uuid]) -> OwnerScope {
    if !viewer.is_admin() {
        OwnerScope::Only(viewer.user_id)
    } else if selected_creators.is_empty() {
        OwnerScope::All
    } else {
        OwnerScope::Creators(selected_creators.to_vec())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Read,
    Create,
    Update,
    Delete,
    /// User management and profile export.
    AdminOnly,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Allow,
    Deny,
}

impl Decision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Decision::Allow)
    }
}

/// Admins may do anything; members only act on rows they own.
pub fn authorize(viewer: &Viewer, action: Action, owner: Option<Uuid>) -> Decision {
    if viewer.is_admin() {
        return Decision::Allow;
    }
    match action {
        Action::AdminOnly => Decision::Deny,
        Action::Read | Action::Create | Action::Update | Action::Delete => {
            if owner == Some(viewer.user_id) {
                Decision::Allow
            } else {
                Decision::Deny
            }
        }
    }
}
