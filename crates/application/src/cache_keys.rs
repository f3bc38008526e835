//! Cache key layout for roles, permissions and admin grants.

use vitrine_core::{AdminId, PermissionId, RoleId};
use vitrine_domain::PermissionCode;

/// Key holding the list of every role.
pub const ROLE_LIST_KEY: &str = "roles:list";

/// Key holding the list of every permission.
pub const PERMISSION_LIST_KEY: &str = "permissions:list";

/// Pattern matching every admin effective-permission and point-check key.
pub const ALL_ADMIN_PERMISSIONS_PATTERN: &str = "admin:*:permissions*";

/// Pattern matching every admin role-list key.
pub const ALL_ADMIN_ROLES_PATTERN: &str = "admin:*:roles";

/// Pattern matching every role permission-list key.
pub const ALL_ROLE_PERMISSIONS_PATTERN: &str = "role:*:permissions";

/// Key of one role entity.
#[must_use]
pub fn role_key(role_id: RoleId) -> String {
    format!("role:{role_id}")
}

/// Key of the permissions granted by one role.
#[must_use]
pub fn role_permissions_key(role_id: RoleId) -> String {
    format!("role:{role_id}:permissions")
}

/// Key of one permission entity.
#[must_use]
pub fn permission_key(permission_id: PermissionId) -> String {
    format!("permission:{permission_id}")
}

/// Key of the roles held by one admin.
#[must_use]
pub fn admin_roles_key(admin_id: AdminId) -> String {
    format!("admin:{admin_id}:roles")
}

/// Key of the effective permission set of one admin.
#[must_use]
pub fn admin_permissions_key(admin_id: AdminId) -> String {
    format!("admin:{admin_id}:permissions")
}

/// Key of one cached point check.
#[must_use]
pub fn admin_permission_check_key(admin_id: AdminId, code: &PermissionCode) -> String {
    format!("admin:{admin_id}:permissions:{code}")
}

/// Pattern matching the effective set and every point check of one admin.
#[must_use]
pub fn admin_permissions_pattern(admin_id: AdminId) -> String {
    format!("admin:{admin_id}:permissions*")
}

/// Matches `key` against a glob where `*` spans any run and `?` one character.
#[must_use]
pub fn glob_matches(pattern: &str, key: &str) -> bool {
    let pattern: Vec<char> = pattern.chars().collect();
    let key: Vec<char> = key.chars().collect();

    let (mut pattern_index, mut key_index) = (0, 0);
    let mut backtrack: Option<(usize, usize)> = None;

    while key_index < key.len() {
        match pattern.get(pattern_index) {
            Some('*') => {
                backtrack = Some((pattern_index, key_index));
                pattern_index += 1;
            }
            Some(&expected) if expected == '?' || expected == key[key_index] => {
                pattern_index += 1;
                key_index += 1;
            }
            _ => match backtrack {
                Some((star_index, star_key_index)) => {
                    pattern_index = star_index + 1;
                    key_index = star_key_index + 1;
                    backtrack = Some((star_index, key_index));
                }
                None => return false,
            },
        }
    }

    pattern[pattern_index..]
        .iter()
        .all(|character| *character == '*')
}
