use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use vitrine_core::{AppError, AppResult, NonEmptyString, RoleId};

use crate::security::{EntityStatus, RoleCode, SUPER_ADMIN_ROLE_CODE};

const ROLE_NAME_MAX_LENGTH: usize = 100;

/// Role grouping permissions that can be assigned to admins.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Role {
    /// Stable role identifier.
    pub id: RoleId,
    /// Unique display name.
    pub name: NonEmptyString,
    /// Unique machine code.
    pub code: RoleCode,
    /// Optional free-form description.
    pub description: Option<String>,
    /// System roles cannot be updated, deleted or deactivated.
    pub is_system: bool,
    /// Lifecycle status.
    pub status: EntityStatus,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Last mutation timestamp.
    pub updated_at: DateTime<Utc>,
}

impl Role {
    /// Returns whether the role currently grants its permissions.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.status == EntityStatus::Active
    }

    /// Returns whether the role short-circuits permission checks.
    #[must_use]
    pub fn is_super_admin(&self) -> bool {
        self.code.is_super_admin()
    }

    /// Fails when the role may not be deleted regardless of assignments.
    pub fn ensure_deletable(&self) -> AppResult<()> {
        if self.is_system {
            return Err(AppError::Constraint(format!(
                "system role '{}' cannot be deleted",
                self.code
            )));
        }

        Ok(())
    }

    /// Fails when the role may not be deactivated.
    pub fn ensure_deactivatable(&self) -> AppResult<()> {
        if self.is_system {
            return Err(AppError::Constraint(format!(
                "system role '{}' cannot be deactivated",
                self.code
            )));
        }

        if !self.is_active() {
            return Err(AppError::Constraint(format!(
                "role '{}' is already inactive",
                self.code
            )));
        }

        Ok(())
    }

    /// Fails when the role is a system role, whatever the update.
    pub fn ensure_updatable(&self) -> AppResult<()> {
        if self.is_system {
            return Err(AppError::Constraint(format!(
                "system role '{}' cannot be updated",
                self.code
            )));
        }

        Ok(())
    }

    /// Fails when the role is already active.
    pub fn ensure_activatable(&self) -> AppResult<()> {
        if self.is_active() {
            return Err(AppError::Constraint(format!(
                "role '{}' is already active",
                self.code
            )));
        }

        Ok(())
    }

    /// Applies validated changes to a non-system role.
    ///
    /// Returns `false` when nothing differs from the stored values.
    pub fn apply_changes(&mut self, changes: &RoleChanges, now: DateTime<Utc>) -> AppResult<bool> {
        self.ensure_updatable()?;
        if changes.code.as_ref().is_some_and(RoleCode::is_super_admin) {
            return Err(AppError::Constraint(format!(
                "role code '{SUPER_ADMIN_ROLE_CODE}' is reserved for the system role"
            )));
        }

        let mut changed = changes.name.as_ref().is_some_and(|name| name != &self.name)
            || changes.code.as_ref().is_some_and(|code| code != &self.code);
        if let Some(name) = &changes.name {
            self.name = name.clone();
        }
        if let Some(code) = &changes.code {
            self.code = code.clone();
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

        Ok(changed)
    }

    /// Returns the audit snapshot of the role.
    #[must_use]
    pub fn audit_value(&self) -> Value {
        json!({
            "id": self.id,
            "name": self.name.as_str(),
            "code": self.code.as_str(),
            "description": self.description,
            "is_system": self.is_system,
            "status": self.status.as_str(),
        })
    }
}

/// Validated payload for inserting a role.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewRole {
    /// Unique display name.
    pub name: NonEmptyString,
    /// Unique machine code.
    pub code: RoleCode,
    /// Optional description.
    pub description: Option<String>,
    /// Marks a built-in role.
    pub is_system: bool,
}

impl NewRole {
    /// Validates raw role fields.
    pub fn new(
        name: impl Into<String>,
        code: impl Into<String>,
        description: Option<String>,
        is_system: bool,
    ) -> AppResult<Self> {
        let code = RoleCode::new(code)?;
        if code.is_super_admin() && !is_system {
            return Err(AppError::validation(
                "code",
                format!("role code '{code}' is reserved for the system role"),
            ));
        }

        Ok(Self {
            name: validate_role_name(name)?,
            code,
            description: description.filter(|value| !value.trim().is_empty()),
            is_system,
        })
    }
}

/// Validated partial update of a role.
///
/// `description: Some(None)` clears the description.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RoleChanges {
    /// New display name.
    pub name: Option<NonEmptyString>,
    /// New machine code.
    pub code: Option<RoleCode>,
    /// New description.
    pub description: Option<Option<String>>,
}

impl RoleChanges {
    /// Validates raw update fields.
    pub fn new(
        name: Option<String>,
        code: Option<String>,
        description: Option<Option<String>>,
    ) -> AppResult<Self> {
        Ok(Self {
            name: name.map(validate_role_name).transpose()?,
            code: code.map(RoleCode::new).transpose()?,
            description,
        })
    }

    /// Returns whether no field is requested to change.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.name.is_none() && self.code.is_none() && self.description.is_none()
    }
}

fn validate_role_name(name: impl Into<String>) -> AppResult<NonEmptyString> {
    let name = NonEmptyString::new("name", name)?;
    if name.as_str().chars().count() > ROLE_NAME_MAX_LENGTH {
        return Err(AppError::validation(
            "name",
            format!("role name must be at most {ROLE_NAME_MAX_LENGTH} characters"),
        ));
    }

    Ok(name)
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use vitrine_core::{AppError, NonEmptyString, RoleId};

    use super::{NewRole, Role, RoleChanges};
    use crate::security::{EntityStatus, RoleCode};

    fn role(code: &str, is_system: bool) -> Role {
        let now = Utc::now();
        Role {
            id: RoleId::new(1),
            name: NonEmptyString::new("name", code).unwrap_or_else(|_| unreachable!()),
            code: RoleCode::new(code).unwrap_or_else(|_| unreachable!()),
            description: None,
            is_system,
            status: EntityStatus::Active,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn system_role_rejects_rename_delete_and_deactivate() {
        let mut role = role("super_admin", true);
        let changes = RoleChanges::new(Some("Root".to_owned()), None, None);
        let Ok(changes) = changes else {
            panic!("changes should validate");
        };

        assert!(matches!(
            role.apply_changes(&changes, Utc::now()),
            Err(AppError::Constraint(_))
        ));
        assert_eq!(role.name.as_str(), "super_admin");
        assert!(matches!(role.ensure_deletable(), Err(AppError::Constraint(_))));
        assert!(matches!(
            role.ensure_deactivatable(),
            Err(AppError::Constraint(_))
        ));
    }

    #[test]
    fn system_role_rejects_every_update() {
        let mut role = role("super_admin", true);
        let original = role.clone();
        let Ok(description) = RoleChanges::new(None, None, Some(Some("Built-in".to_owned())))
        else {
            panic!("changes should validate");
        };
        let Ok(unchanged) = RoleChanges::new(Some("super_admin".to_owned()), None, None) else {
            panic!("changes should validate");
        };

        assert!(matches!(
            role.apply_changes(&description, Utc::now()),
            Err(AppError::Constraint(_))
        ));
        assert!(matches!(
            role.apply_changes(&unchanged, Utc::now()),
            Err(AppError::Constraint(_))
        ));
        assert_eq!(role, original);
    }

    #[test]
    fn super_admin_code_is_reserved_for_system_roles() {
        assert!(matches!(
            NewRole::new("Root", "super_admin", None, false),
            Err(AppError::Validation { ref field, .. }) if field == "code"
        ));
        assert!(NewRole::new("Root", "super_admin", None, true).is_ok());

        let mut role = role("editor", false);
        let Ok(changes) = RoleChanges::new(None, Some("super_admin".to_owned()), None) else {
            panic!("changes should validate");
        };
        assert!(matches!(
            role.apply_changes(&changes, Utc::now()),
            Err(AppError::Constraint(_))
        ));
        assert_eq!(role.code.as_str(), "editor");
    }

    #[test]
    fn unchanged_values_report_no_change() {
        let mut role = role("editor", false);
        let Ok(changes) = RoleChanges::new(Some("editor".to_owned()), None, None) else {
            panic!("changes should validate");
        };

        assert!(matches!(role.apply_changes(&changes, Utc::now()), Ok(false)));
    }

    #[test]
    fn activation_requires_opposite_state() {
        let mut role = role("editor", false);
        assert!(role.ensure_activatable().is_err());
        assert!(role.ensure_deactivatable().is_ok());

        role.status = EntityStatus::Inactive;
        assert!(role.ensure_activatable().is_ok());
        assert!(role.ensure_deactivatable().is_err());
    }

    #[test]
    fn new_role_validates_fields() {
        assert!(NewRole::new("", "editor", None, false).is_err());
        assert!(NewRole::new("Editor", "Editor", None, false).is_err());
        assert!(NewRole::new("x".repeat(101), "editor", None, false).is_err());

        let Ok(role) = NewRole::new(" Editor ", "editor", Some("  ".to_owned()), false) else {
            panic!("role should validate");
        };
        assert_eq!(role.name.as_str(), "Editor");
        assert_eq!(role.description, None);
    }
}
