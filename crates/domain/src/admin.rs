use serde::{Deserialize, Serialize};
use vitrine_core::AdminId;

/// Administrator account that can hold roles.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdminAccount {
    /// Stable admin identifier.
    pub id: AdminId,
    /// Login name.
    pub username: String,
    /// Disabled accounts keep their assignments but cannot sign in.
    pub is_active: bool,
}
