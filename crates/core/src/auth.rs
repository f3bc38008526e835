use serde::{Deserialize, Serialize};

use crate::AdminId;

/// Administrator on whose behalf an operation runs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdminPrincipal {
    admin_id: AdminId,
    username: String,
}

impl AdminPrincipal {
    /// Creates a principal from an authenticated admin account.
    #[must_use]
    pub fn new(admin_id: AdminId, username: impl Into<String>) -> Self {
        Self {
            admin_id,
            username: username.into(),
        }
    }

    /// Returns the reserved principal used by maintenance tasks.
    #[must_use]
    pub fn system() -> Self {
        Self::new(AdminId::SYSTEM, "system")
    }

    /// Returns the admin identifier.
    #[must_use]
    pub fn admin_id(&self) -> AdminId {
        self.admin_id
    }

    /// Returns the login name of the admin.
    #[must_use]
    pub fn username(&self) -> &str {
        self.username.as_str()
    }

    /// Returns whether this principal bypasses permission checks.
    #[must_use]
    pub fn is_system(&self) -> bool {
        self.admin_id.is_system()
    }
}
