use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::Mutex;

use vitrine_core::{AdminId, AppError, AppResult, PermissionId, RoleId};
use vitrine_domain::{
    AdminAccount, EntityStatus, NewPermission, NewRole, Permission, PermissionCode, Role, RoleCode,
};

use crate::access_ports::{
    AuditRecord, AuditSink, CacheStats, CacheStore, DataStoreTransaction, RbacReader,
    TransactionStatus, TransactionalDataStore,
};
use crate::cache_keys::glob_matches;
use crate::config::CoordinatorConfig;
use crate::transaction_coordinator::TransactionCoordinator;

/// Ordered log shared by fakes so tests can assert cross-port ordering.
pub(crate) type EventLog = Arc<Mutex<Vec<String>>>;

#[derive(Debug, Clone, Default)]
pub(crate) struct RbacState {
    pub admins: BTreeMap<AdminId, AdminAccount>,
    pub roles: BTreeMap<RoleId, Role>,
    pub permissions: BTreeMap<PermissionId, Permission>,
    pub admin_roles: BTreeSet<(AdminId, RoleId)>,
    pub role_permissions: BTreeSet<(RoleId, PermissionId)>,
    next_role_id: i64,
    next_permission_id: i64,
}

impl RbacState {
    pub fn add_admin(&mut self, admin_id: i64, username: &str) -> AdminId {
        let admin_id = AdminId::new(admin_id);
        self.admins.insert(
            admin_id,
            AdminAccount {
                id: admin_id,
                username: username.to_owned(),
                is_active: true,
            },
        );
        admin_id
    }

    pub fn add_role(&mut self, code: &str, is_system: bool) -> RoleId {
        let Ok(new_role) = NewRole::new(code, code, None, is_system) else {
            panic!("fixture role '{code}' should validate");
        };
        self.insert_role(new_role).id
    }

    pub fn add_permission(&mut self, code: &str) -> PermissionId {
        let Ok(new_permission) = NewPermission::new(code, code, None) else {
            panic!("fixture permission '{code}' should validate");
        };
        self.insert_permission(new_permission).id
    }

    pub fn grant(&mut self, role_id: RoleId, permission_id: PermissionId) {
        self.role_permissions.insert((role_id, permission_id));
    }

    pub fn assign(&mut self, admin_id: AdminId, role_id: RoleId) {
        self.admin_roles.insert((admin_id, role_id));
    }

    fn insert_role(&mut self, role: NewRole) -> Role {
        self.next_role_id += 1;
        let now = Utc::now();
        let role = Role {
            id: RoleId::new(self.next_role_id),
            name: role.name,
            code: role.code,
            description: role.description,
            is_system: role.is_system,
            status: EntityStatus::Active,
            created_at: now,
            updated_at: now,
        };
        self.roles.insert(role.id, role.clone());
        role
    }

    fn insert_permission(&mut self, permission: NewPermission) -> Permission {
        self.next_permission_id += 1;
        let now = Utc::now();
        let permission = Permission {
            id: PermissionId::new(self.next_permission_id),
            code: permission.code,
            name: permission.name,
            description: permission.description,
            status: EntityStatus::Active,
            created_at: now,
            updated_at: now,
        };
        self.permissions.insert(permission.id, permission.clone());
        permission
    }

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
}

/// Snapshot-isolated store: each transaction works on a copy that replaces
/// the shared state on commit.
#[derive(Default)]
pub(crate) struct FakeRbacStore {
    pub state: Arc<Mutex<RbacState>>,
    pub events: EventLog,
    pub reader_calls: AtomicUsize,
    pub begin_calls: AtomicUsize,
}

impl FakeRbacStore {
    pub fn with_events(events: EventLog) -> Self {
        Self {
            events,
            ..Self::default()
        }
    }

    pub async fn snapshot(&self) -> RbacState {
        self.state.lock().await.clone()
    }
}

#[async_trait]
impl TransactionalDataStore for FakeRbacStore {
    async fn begin(&self) -> AppResult<Box<dyn DataStoreTransaction>> {
        self.begin_calls.fetch_add(1, Ordering::SeqCst);
        self.events.lock().await.push("begin".to_owned());
        let working = self.state.lock().await.clone();

        Ok(Box::new(FakeTransaction {
            shared: Arc::clone(&self.state),
            events: Arc::clone(&self.events),
            working,
            status: TransactionStatus::Active,
        }))
    }
}

#[async_trait]
impl RbacReader for FakeRbacStore {
    async fn find_role(&self, role_id: RoleId) -> AppResult<Option<Role>> {
        self.reader_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.state.lock().await.roles.get(&role_id).cloned())
    }

    async fn list_roles(&self) -> AppResult<Vec<Role>> {
        self.reader_calls.fetch_add(1, Ordering::SeqCst);
        let mut roles: Vec<Role> = self.state.lock().await.roles.values().cloned().collect();
        roles.sort_by(|left, right| left.name.as_str().cmp(right.name.as_str()));
        Ok(roles)
    }

    async fn find_permission(&self, permission_id: PermissionId) -> AppResult<Option<Permission>> {
        self.reader_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.state.lock().await.permissions.get(&permission_id).cloned())
    }

    async fn list_permissions(&self) -> AppResult<Vec<Permission>> {
        self.reader_calls.fetch_add(1, Ordering::SeqCst);
        let mut permissions: Vec<Permission> = self
            .state
            .lock()
            .await
            .permissions
            .values()
            .cloned()
            .collect();
        permissions.sort_by(|left, right| left.code.cmp(&right.code));
        Ok(permissions)
    }

    async fn list_role_permissions(&self, role_id: RoleId) -> AppResult<Vec<Permission>> {
        self.reader_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.state.lock().await.permissions_of(role_id))
    }

    async fn list_admin_roles(&self, admin_id: AdminId) -> AppResult<Vec<Role>> {
        self.reader_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.state.lock().await.roles_of(admin_id))
    }
}

struct FakeTransaction {
    shared: Arc<Mutex<RbacState>>,
    events: EventLog,
    working: RbacState,
    status: TransactionStatus,
}

impl FakeTransaction {
    fn fail(&mut self, error: AppError) -> AppError {
        self.status = TransactionStatus::Failed;
        error
    }
}

#[async_trait]
impl DataStoreTransaction for FakeTransaction {
    fn status(&self) -> TransactionStatus {
        self.status
    }

    async fn commit(self: Box<Self>) -> AppResult<()> {
        let FakeTransaction {
            shared,
            events,
            working,
            ..
        } = *self;
        events.lock().await.push("commit".to_owned());
        *shared.lock().await = working;
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> AppResult<()> {
        self.events.lock().await.push("rollback".to_owned());
        Ok(())
    }

    async fn find_admin(&mut self, admin_id: AdminId) -> AppResult<Option<AdminAccount>> {
        Ok(self.working.admins.get(&admin_id).cloned())
    }

    async fn find_role(&mut self, role_id: RoleId) -> AppResult<Option<Role>> {
        Ok(self.working.roles.get(&role_id).cloned())
    }

    async fn find_role_by_name(&mut self, name: &str) -> AppResult<Option<Role>> {
        Ok(self
            .working
            .roles
            .values()
            .find(|role| role.name.as_str() == name)
            .cloned())
    }

    async fn find_role_by_code(&mut self, code: &RoleCode) -> AppResult<Option<Role>> {
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
        Ok(self.working.permissions.get(&permission_id).cloned())
    }

    async fn find_permission_by_code(
        &mut self,
        code: &PermissionCode,
    ) -> AppResult<Option<Permission>> {
        Ok(self
            .working
            .permissions
            .values()
            .find(|permission| &permission.code == code)
            .cloned())
    }

    async fn list_admin_roles(&mut self, admin_id: AdminId) -> AppResult<Vec<Role>> {
        Ok(self.working.roles_of(admin_id))
    }

    async fn admin_has_role(&mut self, admin_id: AdminId, role_id: RoleId) -> AppResult<bool> {
        Ok(self.working.admin_roles.contains(&(admin_id, role_id)))
    }

    async fn role_has_permission(
        &mut self,
        role_id: RoleId,
        permission_id: PermissionId,
    ) -> AppResult<bool> {
        Ok(self
            .working
            .role_permissions
            .contains(&(role_id, permission_id)))
    }

    async fn count_role_admins(&mut self, role_id: RoleId) -> AppResult<u64> {
        Ok(self
            .working
            .admin_roles
            .iter()
            .filter(|(_, assigned_role)| *assigned_role == role_id)
            .count() as u64)
    }

    async fn count_permission_roles(&mut self, permission_id: PermissionId) -> AppResult<u64> {
        Ok(self
            .working
            .role_permissions
            .iter()
            .filter(|(_, granted)| *granted == permission_id)
            .count() as u64)
    }

    async fn insert_role(&mut self, role: NewRole) -> AppResult<Role> {
        let duplicate = self
            .working
            .roles
            .values()
            .any(|existing| existing.code == role.code || existing.name == role.name);
        if duplicate {
            return Err(self.fail(AppError::Constraint(format!(
                "role '{}' already exists",
                role.code
            ))));
        }

        Ok(self.working.insert_role(role))
    }

    async fn update_role(&mut self, role: &Role) -> AppResult<()> {
        self.working.roles.insert(role.id, role.clone());
        Ok(())
    }

    async fn delete_role(&mut self, role_id: RoleId) -> AppResult<()> {
        self.working.roles.remove(&role_id);
        self.working
            .role_permissions
            .retain(|(granting_role, _)| *granting_role != role_id);
        Ok(())
    }

    async fn insert_permission(&mut self, permission: NewPermission) -> AppResult<Permission> {
        Ok(self.working.insert_permission(permission))
    }

    async fn update_permission(&mut self, permission: &Permission) -> AppResult<()> {
        self.working
            .permissions
            .insert(permission.id, permission.clone());
        Ok(())
    }

    async fn delete_permission(&mut self, permission_id: PermissionId) -> AppResult<()> {
        self.working.permissions.remove(&permission_id);
        Ok(())
    }

    async fn insert_admin_role(&mut self, admin_id: AdminId, role_id: RoleId) -> AppResult<()> {
        if !self.working.admins.contains_key(&admin_id) {
            return Err(self.fail(AppError::Internal(format!(
                "foreign key violation for admin {admin_id}"
            ))));
        }
        self.working.admin_roles.insert((admin_id, role_id));
        Ok(())
    }

    async fn delete_admin_role(&mut self, admin_id: AdminId, role_id: RoleId) -> AppResult<()> {
        self.working.admin_roles.remove(&(admin_id, role_id));
        Ok(())
    }

    async fn insert_role_permission(
        &mut self,
        role_id: RoleId,
        permission_id: PermissionId,
    ) -> AppResult<()> {
        self.working.role_permissions.insert((role_id, permission_id));
        Ok(())
    }

    async fn delete_role_permission(
        &mut self,
        role_id: RoleId,
        permission_id: PermissionId,
    ) -> AppResult<()> {
        self.working
            .role_permissions
            .remove(&(role_id, permission_id));
        Ok(())
    }
}

/// Cache fake recording every mutation into the shared event log.
#[derive(Default)]
pub(crate) struct FakeCache {
    pub entries: Mutex<HashMap<String, String>>,
    pub events: EventLog,
    pub failing_keys: Mutex<Vec<String>>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl FakeCache {
    pub fn with_events(events: EventLog) -> Self {
        Self {
            events,
            ..Self::default()
        }
    }

    pub async fn contains(&self, key: &str) -> bool {
        self.entries.lock().await.contains_key(key)
    }
}

#[async_trait]
impl CacheStore for FakeCache {
    async fn get(&self, key: &str) -> AppResult<Option<String>> {
        let value = self.entries.lock().await.get(key).cloned();
        if value.is_some() {
            self.hits.fetch_add(1, Ordering::SeqCst);
        } else {
            self.misses.fetch_add(1, Ordering::SeqCst);
        }
        Ok(value)
    }

    async fn set(&self, key: &str, value: String, ttl_seconds: u64) -> AppResult<()> {
        if ttl_seconds > 0 {
            self.entries.lock().await.insert(key.to_owned(), value);
        }
        Ok(())
    }

    async fn delete(&self, key: &str) -> AppResult<bool> {
        if self.failing_keys.lock().await.iter().any(|failing| failing == key) {
            return Err(AppError::Internal(format!("cache rejected delete of '{key}'")));
        }
        self.events.lock().await.push(format!("delete {key}"));
        Ok(self.entries.lock().await.remove(key).is_some())
    }

    async fn delete_matching(&self, pattern: &str) -> AppResult<bool> {
        self.events
            .lock()
            .await
            .push(format!("delete_matching {pattern}"));
        let mut entries = self.entries.lock().await;
        let before = entries.len();
        entries.retain(|key, _| !glob_matches(pattern, key));
        Ok(entries.len() != before)
    }

    fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::SeqCst),
            misses: self.misses.load(Ordering::SeqCst),
        }
    }
}

#[derive(Default)]
pub(crate) struct FakeAuditSink {
    pub records: Mutex<Vec<AuditRecord>>,
    pub fail: bool,
}

#[async_trait]
impl AuditSink for FakeAuditSink {
    async fn record(&self, record: AuditRecord) -> AppResult<()> {
        if self.fail {
            return Err(AppError::Internal("audit table unavailable".to_owned()));
        }
        self.records.lock().await.push(record);
        Ok(())
    }
}

/// Fully wired coordinator over fakes sharing one event log.
pub(crate) struct Harness {
    pub store: Arc<FakeRbacStore>,
    pub cache: Arc<FakeCache>,
    pub audit: Arc<FakeAuditSink>,
    pub events: EventLog,
    pub coordinator: TransactionCoordinator,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_audit(FakeAuditSink::default())
    }

    pub fn with_audit(audit: FakeAuditSink) -> Self {
        let events: EventLog = Arc::default();
        let store = Arc::new(FakeRbacStore::with_events(Arc::clone(&events)));
        let cache = Arc::new(FakeCache::with_events(Arc::clone(&events)));
        let audit = Arc::new(audit);
        let coordinator = TransactionCoordinator::new(
            store.clone(),
            cache.clone(),
            audit.clone(),
            CoordinatorConfig {
                retry_delay: std::time::Duration::ZERO,
                ..CoordinatorConfig::default()
            },
        );

        Self {
            store,
            cache,
            audit,
            events,
            coordinator,
        }
    }

    pub async fn events(&self) -> Vec<String> {
        self.events.lock().await.clone()
    }
}
