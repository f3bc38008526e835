use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use vitrine_core::{AppError, AppResult, NonEmptyString, PermissionId};

use crate::security::{EntityStatus, PermissionCode};

/// Named capability that roles grant to admins.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Permission {
    /// Stable permission identifier.
    pub id: PermissionId,
    /// Unique machine code checked by services.
    pub code: PermissionCode,
    /// Human-readable name.
    pub name: NonEmptyString,
    /// Optional free-form description.
    pub description: Option<String>,
    /// Lifecycle status.
    pub status: EntityStatus,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Last mutation timestamp.
    pub updated_at: DateTime<Utc>,
}

impl Permission {
    /// Returns whether the permission is granted through roles.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.status == EntityStatus::Active
    }

    /// Fails when the permission is already active.
    pub fn ensure_activatable(&self) -> AppResult<()> {
        if self.is_active() {
            return Err(AppError::Constraint(format!(
                "permission '{}' is already active",
                self.code
            )));
        }

        Ok(())
    }

    /// Fails when the permission is already inactive.
    pub fn ensure_deactivatable(&self) -> AppResult<()> {
        if !self.is_active() {
            return Err(AppError::Constraint(format!(
                "permission '{}' is already inactive",
                self.code
            )));
        }

        Ok(())
    }

    /// Applies validated changes and returns whether anything differed.
    pub fn apply_changes(&mut self, changes: &PermissionChanges, now: DateTime<Utc>) -> bool {
        let mut changed = false;

        if let Some(code) = changes.code.as_ref().filter(|code| *code != &self.code) {
            self.code = code.clone();
            changed = true;
        }
        if let Some(name) = changes.name.as_ref().filter(|name| *name != &self.name) {
            self.name = name.clone();
            changed = true;
        }
        if let Some(description) = &changes.description {
            let description = description.clone().filter(|value| !value.trim().is_empty());
            if description != self.description {
                self.description = description;
                changed = true;
            }
        }

        if changed {
            self.updated_at = now;
        }

        changed
    }

    /// Returns the audit snapshot of the permission.
    #[must_use]
    pub fn audit_value(&self) -> Value {
        json!({
            "id": self.id,
            "code": self.code.as_str(),
            "name": self.name.as_str(),
            "description": self.description,
            "status": self.status.as_str(),
        })
    }
}

/// Validated payload for inserting a permission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewPermission {
    /// Unique machine code.
    pub code: PermissionCode,
    /// Human-readable name.
    pub name: NonEmptyString,
    /// Optional description.
    pub description: Option<String>,
}

impl NewPermission {
    /// Validates raw permission fields.
    pub fn new(
        code: impl Into<String>,
        name: impl Into<String>,
        description: Option<String>,
    ) -> AppResult<Self> {
        Ok(Self {
            code: PermissionCode::new(code)?,
            name: NonEmptyString::new("name", name)?,
            description: description.filter(|value| !value.trim().is_empty()),
        })
    }
}

/// Validated partial update of a permission.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PermissionChanges {
    /// New machine code.
    pub code: Option<PermissionCode>,
    /// New human-readable name.
    pub name: Option<NonEmptyString>,
    /// New description; `Some(None)` clears it.
    pub description: Option<Option<String>>,
}

impl PermissionChanges {
    /// Validates raw update fields.
    pub fn new(
        code: Option<String>,
        name: Option<String>,
        description: Option<Option<String>>,
    ) -> AppResult<Self> {
        Ok(Self {
            code: code.map(PermissionCode::new).transpose()?,
            name: name
                .map(|value| NonEmptyString::new("name", value))
                .transpose()?,
            description,
        })
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use vitrine_core::{NonEmptyString, PermissionId};

    use super::{Permission, PermissionChanges};
    use crate::security::{EntityStatus, PermissionCode};

    fn permission() -> Option<Permission> {
        let now = Utc::now();
        Some(Permission {
            id: PermissionId::new(7),
            code: PermissionCode::new("product.edit").ok()?,
            name: NonEmptyString::new("name", "Edit products").ok()?,
            description: None,
            status: EntityStatus::Active,
            created_at: now,
            updated_at: now,
        })
    }

    #[test]
    fn code_change_is_applied() {
        let Some(mut permission) = permission() else {
            panic!("fixture should build");
        };
        let Ok(changes) = PermissionChanges::new(Some("product.update".to_owned()), None, None)
        else {
            panic!("changes should validate");
        };

        assert!(permission.apply_changes(&changes, Utc::now()));
        assert_eq!(permission.code.as_str(), "product.update");
        assert!(!permission.apply_changes(&changes, Utc::now()));
    }

    #[test]
    fn deactivation_requires_active_state() {
        let Some(mut permission) = permission() else {
            panic!("fixture should build");
        };
        assert!(permission.ensure_deactivatable().is_ok());
        permission.status = EntityStatus::Inactive;
        assert!(permission.ensure_deactivatable().is_err());
        assert!(permission.ensure_activatable().is_ok());
    }
}
