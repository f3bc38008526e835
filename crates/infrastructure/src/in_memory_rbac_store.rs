use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::{Mutex, OwnedMutexGuard, RwLock};

use vitrine_application::{
    DataStoreTransaction, RbacReader, TransactionStatus, TransactionalDataStore,
};
use vitrine_core::{AdminId, AppError, AppResult, PermissionId, RoleId};
use vitrine_domain::{
    AdminAccount, EntityStatus, NewPermission, NewRole, Permission, PermissionCode, Role, RoleCode,
};

#[derive(Debug, Clone, Default)]
struct RbacTables {
    admins: BTreeMap<AdminId, AdminAccount>,
    roles: BTreeMap<RoleId, Role>,
    permissions: BTreeMap<PermissionId, Permission>,
    admin_roles: BTreeSet<(AdminId, RoleId)>,
    role_permissions: BTreeSet<(RoleId, PermissionId)>,
    last_role_id: i64,
    last_permission_id: i64,
}

impl RbacTables {
    fn roles_of(&self, admin_id: AdminId) -> Vec<Role> {
        let mut roles: Vec<Role> = self
            .admin_roles
            .iter()
            .filter(|(assigned_admin, _)| *assigned_admin == admin_id)
            .filter_map(|(_, role_id)| self.roles.get(role_id).cloned())
            .collect();
        roles.sort_by(|left, right| left.name.as_str().cmp(right.name.as_str()));
        roles
    }

    fn permissions_of(&self, role_id: RoleId) -> Vec<Permission> {
        let mut permissions: Vec<Permission> = self
            .role_permissions
            .iter()
            .filter(|(granting_role, _)| *granting_role == role_id)
            .filter_map(|(_, permission_id)| self.permissions.get(permission_id).cloned())
            .collect();
        permissions.sort_by(|left, right| left.code.cmp(&right.code));
        permissions
    }

    fn role_conflict(&self, role: &Role) -> Option<String> {
        self.roles
            .values()
            .filter(|existing| existing.id != role.id)
            .find_map(|existing| {
                if existing.code == role.code {
                    Some(format!("role code '{}' already exists", role.code))
                } else if existing.name == role.name {
                    Some(format!("role name '{}' already exists", role.name.as_str()))
                } else {
                    None
                }
            })
    }

    fn permission_conflict(&self, permission: &Permission) -> Option<String> {
        self.permissions
            .values()
            .any(|existing| existing.id != permission.id && existing.code == permission.code)
            .then(|| format!("permission code '{}' already exists", permission.code))
    }
}

/// In-memory role store with serialized transactions.
///
/// A transaction works on a private copy of the tables and publishes it on
/// commit. Only one transaction is open at a time.
#[derive(Debug, Default)]
pub struct InMemoryRbacStore {
    tables: Arc<RwLock<RbacTables>>,
    writer: Arc<Mutex<()>>,
}

impl InMemoryRbacStore {
    /// Creates an empty in-memory store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts or replaces an admin account.
    ///
    /// Waits for an open transaction to finish so its commit cannot
    /// overwrite the new row.
    pub async fn upsert_admin(&self, admin: AdminAccount) {
        let _writer = self.writer.lock().await;
        self.tables.write().await.admins.insert(admin.id, admin);
    }
}

#[async_trait]
impl TransactionalDataStore for InMemoryRbacStore {
    async fn begin(&self) -> AppResult<Box<dyn DataStoreTransaction>> {
        let writer = Arc::clone(&self.writer).lock_owned().await;
        let working = self.tables.read().await.clone();

        Ok(Box::new(InMemoryRbacTransaction {
            tables: Arc::clone(&self.tables),
            working,
            status: TransactionStatus::Active,
            _writer: writer,
        }))
    }
}

#[async_trait]
impl RbacReader for InMemoryRbacStore {
    async fn find_role(&self, role_id: RoleId) -> AppResult<Option<Role>> {
        Ok(self.tables.read().await.roles.get(&role_id).cloned())
    }

    async fn list_roles(&self) -> AppResult<Vec<Role>> {
        let mut roles: Vec<Role> = self.tables.read().await.roles.values().cloned().collect();
        roles.sort_by(|left, right| left.name.as_str().cmp(right.name.as_str()));
        Ok(roles)
    }

    async fn find_permission(&self, permission_id: PermissionId) -> AppResult<Option<Permission>> {
        Ok(self
            .tables
            .read()
            .await
            .permissions
            .get(&permission_id)
            .cloned())
    }

    async fn list_permissions(&self) -> AppResult<Vec<Permission>> {
        let mut permissions: Vec<Permission> = self
            .tables
            .read()
            .await
            .permissions
            .values()
            .cloned()
            .collect();
        permissions.sort_by(|left, right| left.code.cmp(&right.code));
        Ok(permissions)
    }

    async fn list_role_permissions(&self, role_id: RoleId) -> AppResult<Vec<Permission>> {
        Ok(self.tables.read().await.permissions_of(role_id))
    }

    async fn list_admin_roles(&self, admin_id: AdminId) -> AppResult<Vec<Role>> {
        Ok(self.tables.read().await.roles_of(admin_id))
    }
}

struct InMemoryRbacTransaction {
    tables: Arc<RwLock<RbacTables>>,
    working: RbacTables,
    status: TransactionStatus,
    _writer: OwnedMutexGuard<()>,
}

impl InMemoryRbacTransaction {
    fn ensure_active(&self) -> AppResult<()> {
        match self.status {
            TransactionStatus::Active => Ok(()),
            TransactionStatus::Failed => Err(AppError::Internal(
                "current transaction is aborted, commands ignored until rollback".to_owned(),
            )),
        }
    }

    fn fail(&mut self, error: AppError) -> AppError {
        self.status = TransactionStatus::Failed;
        error
    }
}

#[async_trait]
impl DataStoreTransaction for InMemoryRbacTransaction {
    fn status(&self) -> TransactionStatus {
        self.status
    }

    async fn commit(self: Box<Self>) -> AppResult<()> {
        self.ensure_active()?;
        let InMemoryRbacTransaction {
            tables, working, ..
        } = *self;
        *tables.write().await = working;
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> AppResult<()> {
        Ok(())
    }

    async fn find_admin(&mut self, admin_id: AdminId) -> AppResult<Option<AdminAccount>> {
        self.ensure_active()?;
        Ok(self.working.admins.get(&admin_id).cloned())
    }

    async fn find_role(&mut self, role_id: RoleId) -> AppResult<Option<Role>> {
        self.ensure_active()?;
        Ok(self.working.roles.get(&role_id).cloned())
    }

    async fn find_role_by_name(&mut self, name: &str) -> AppResult<Option<Role>> {
        self.ensure_active()?;
        Ok(self
            .working
            .roles
            .values()
            .find(|role| role.name.as_str() == name)
            .cloned())
    }

    async fn find_role_by_code(&mut self, code: &RoleCode) -> AppResult<Option<Role>> {
        self.ensure_active()?;
        Ok(self
            .working
            .roles
            .values()
            .find(|role| &role.code == code)
            .cloned())
    }

    async fn find_permission(
        &mut self,
        permission_id: PermissionId,
    ) -> AppResult<Option<Permission>> {
        self.ensure_active()?;
        Ok(self.working.permissions.get(&permission_id).cloned())
    }

    async fn find_permission_by_code(
        &mut self,
        code: &PermissionCode,
    ) -> AppResult<Option<Permission>> {
        self.ensure_active()?;
        Ok(self
            .working
            .permissions
            .values()
            .find(|permission| &permission.code == code)
            .cloned())
    }

    async fn list_admin_roles(&mut self, admin_id: AdminId) -> AppResult<Vec<Role>> {
        self.ensure_active()?;
        Ok(self.working.roles_of(admin_id))
    }

    async fn admin_has_role(&mut self, admin_id: AdminId, role_id: RoleId) -> AppResult<bool> {
        self.ensure_active()?;
        Ok(self.working.admin_roles.contains(&(admin_id, role_id)))
    }

    async fn role_has_permission(
        &mut self,
        role_id: RoleId,
        permission_id: PermissionId,
    ) -> AppResult<bool> {
        self.ensure_active()?;
        Ok(self
            .working
            .role_permissions
            .contains(&(role_id, permission_id)))
    }

    async fn count_role_admins(&mut self, role_id: RoleId) -> AppResult<u64> {
        self.ensure_active()?;
        let count = self
            .working
            .admin_roles
            .iter()
            .filter(|(_, assigned_role)| *assigned_role == role_id)
            .count();
        Ok(u64::try_from(count).unwrap_or(u64::MAX))
    }

    async fn count_permission_roles(&mut self, permission_id: PermissionId) -> AppResult<u64> {
        self.ensure_active()?;
        let count = self
            .working
            .role_permissions
            .iter()
            .filter(|(_, granted)| *granted == permission_id)
            .count();
        Ok(u64::try_from(count).unwrap_or(u64::MAX))
    }

    async fn insert_role(&mut self, role: NewRole) -> AppResult<Role> {
        self.ensure_active()?;
        let now = Utc::now();
        let role = Role {
            id: RoleId::new(self.working.last_role_id + 1),
            name: role.name,
            code: role.code,
            description: role.description,
            is_system: role.is_system,
            status: EntityStatus::Active,
            created_at: now,
            updated_at: now,
        };
        if let Some(conflict) = self.working.role_conflict(&role) {
            return Err(self.fail(AppError::Constraint(conflict)));
        }

        self.working.last_role_id = role.id.value();
        self.working.roles.insert(role.id, role.clone());
        Ok(role)
    }

    async fn update_role(&mut self, role: &Role) -> AppResult<()> {
        self.ensure_active()?;
        if !self.working.roles.contains_key(&role.id) {
            return Err(AppError::NotFound(format!("role {} does not exist", role.id)));
        }
        if let Some(conflict) = self.working.role_conflict(role) {
            return Err(self.fail(AppError::Constraint(conflict)));
        }

        self.working.roles.insert(role.id, role.clone());
        Ok(())
    }

    async fn delete_role(&mut self, role_id: RoleId) -> AppResult<()> {
        self.ensure_active()?;
        if self
            .working
            .admin_roles
            .iter()
            .any(|(_, assigned_role)| *assigned_role == role_id)
        {
            return Err(self.fail(AppError::Constraint(format!(
                "role {role_id} is still assigned to admins"
            ))));
        }

        self.working.roles.remove(&role_id);
        self.working
            .role_permissions
            .retain(|(granting_role, _)| *granting_role != role_id);
        Ok(())
    }

    async fn insert_permission(&mut self, permission: NewPermission) -> AppResult<Permission> {
        self.ensure_active()?;
        let now = Utc::now();
        let permission = Permission {
            id: PermissionId::new(self.working.last_permission_id + 1),
            code: permission.code,
            name: permission.name,
            description: permission.description,
            status: EntityStatus::Active,
            created_at: now,
            updated_at: now,
        };
        if let Some(conflict) = self.working.permission_conflict(&permission) {
            return Err(self.fail(AppError::Constraint(conflict)));
        }

        self.working.last_permission_id = permission.id.value();
        self.working
            .permissions
            .insert(permission.id, permission.clone());
        Ok(permission)
    }

    async fn update_permission(&mut self, permission: &Permission) -> AppResult<()> {
        self.ensure_active()?;
        if !self.working.permissions.contains_key(&permission.id) {
            return Err(AppError::NotFound(format!(
                "permission {} does not exist",
                permission.id
            )));
        }
        if let Some(conflict) = self.working.permission_conflict(permission) {
            return Err(self.fail(AppError::Constraint(conflict)));
        }

        self.working
            .permissions
            .insert(permission.id, permission.clone());
        Ok(())
    }

    async fn delete_permission(&mut self, permission_id: PermissionId) -> AppResult<()> {
        self.ensure_active()?;
        if self
            .working
            .role_permissions
            .iter()
            .any(|(_, granted)| *granted == permission_id)
        {
            return Err(self.fail(AppError::Constraint(format!(
                "permission {permission_id} is still granted to roles"
            ))));
        }

        self.working.permissions.remove(&permission_id);
        Ok(())
    }

    async fn insert_admin_role(&mut self, admin_id: AdminId, role_id: RoleId) -> AppResult<()> {
        self.ensure_active()?;
        if !self.working.admins.contains_key(&admin_id) || !self.working.roles.contains_key(&role_id)
        {
            return Err(self.fail(AppError::Constraint(format!(
                "cannot link admin {admin_id} to role {role_id}: missing reference"
            ))));
        }

        self.working.admin_roles.insert((admin_id, role_id));
        Ok(())
    }

    async fn delete_admin_role(&mut self, admin_id: AdminId, role_id: RoleId) -> AppResult<()> {
        self.ensure_active()?;
        self.working.admin_roles.remove(&(admin_id, role_id));
        Ok(())
    }

    async fn insert_role_permission(
        &mut self,
        role_id: RoleId,
        permission_id: PermissionId,
    ) -> AppResult<()> {
        self.ensure_active()?;
        if !self.working.roles.contains_key(&role_id)
            || !self.working.permissions.contains_key(&permission_id)
        {
            return Err(self.fail(AppError::Constraint(format!(
                "cannot link role {role_id} to permission {permission_id}: missing reference"
            ))));
        }

        self.working
            .role_permissions
            .insert((role_id, permission_id));
        Ok(())
    }

    async fn delete_role_permission(
        &mut self,
        role_id: RoleId,
        permission_id: PermissionId,
    ) -> AppResult<()> {
        self.ensure_active()?;
        self.working
            .role_permissions
            .remove(&(role_id, permission_id));
        Ok(())
    }
}
