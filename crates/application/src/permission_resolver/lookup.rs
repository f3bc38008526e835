use super::*;

impl PermissionResolver {
    /// Returns whether the admin holds `code`.
    ///
    /// An active `super_admin` role grants every code without consulting the
    /// permission caches.
    pub async fn has_permission(&self, admin_id: AdminId, code: &str) -> AppResult<bool> {
        let code = PermissionCode::new(code)?;

        let roles = self.admin_roles(admin_id).await?;
        if roles
            .iter()
            .any(|role| role.is_active() && role.is_super_admin())
        {
            return Ok(true);
        }

        let key = admin_permission_check_key(admin_id, &code);
        self.coordinator
            .cached_read(&key, self.cache_ttl.permission_check, || async move {
                let permissions = self.effective_permissions(admin_id).await?;
                Ok(permissions.contains(&code))
            })
            .await
    }

    /// Returns the admin's effective permission codes, sorted and de-duplicated.
    ///
    /// Only active permissions of active roles contribute.
    pub async fn effective_permissions(&self, admin_id: AdminId) -> AppResult<Vec<PermissionCode>> {
        let key = admin_permissions_key(admin_id);
        self.coordinator
            .cached_read(&key, self.cache_ttl.admin_permissions, || async move {
                let mut codes = BTreeSet::new();
                for role in self.reader.list_admin_roles(admin_id).await? {
                    if !role.is_active() {
                        continue;
                    }
                    for permission in self.reader.list_role_permissions(role.id).await? {
                        if permission.is_active() {
                            codes.insert(permission.code);
                        }
                    }
                }

                Ok(codes.into_iter().collect())
            })
            .await
    }

    /// Fails with [`AppError::Unauthorized`] unless the principal holds `code`.
    ///
    /// A missing principal is rejected; the system principal always passes.
    pub async fn authorize(
        &self,
        principal: Option<&AdminPrincipal>,
        code: &str,
        resource: Option<&str>,
    ) -> AppResult<()> {
        let Some(principal) = principal else {
            return Err(AppError::Unauthorized(format!(
                "no authenticated admin for permission '{code}'"
            )));
        };

        if principal.is_system() {
            return Ok(());
        }

        if self.has_permission(principal.admin_id(), code).await? {
            return Ok(());
        }

        warn!(
            admin_id = %principal.admin_id(),
            permission = %code,
            resource = resource.unwrap_or("-"),
            "permission denied"
        );
        Err(AppError::Unauthorized(match resource {
            Some(resource) => format!(
                "admin '{}' is missing permission '{code}' on '{resource}'",
                principal.username()
            ),
            None => format!(
                "admin '{}' is missing permission '{code}'",
                principal.username()
            ),
        }))
    }

    /// Returns one role.
    pub async fn role(&self, role_id: RoleId) -> AppResult<Role> {
        self.coordinator
            .cached_read(&role_key(role_id), self.cache_ttl.role_entity, || async move {
                self.reader
                    .find_role(role_id)
                    .await?
                    .ok_or_else(|| role_not_found(role_id))
            })
            .await
    }

    /// Returns every role ordered by name.
    pub async fn roles(&self) -> AppResult<Vec<Role>> {
        self.coordinator
            .cached_read(ROLE_LIST_KEY, self.cache_ttl.role_list, || async move {
                self.reader.list_roles().await
            })
            .await
    }

    /// Returns one permission.
    pub async fn permission(&self, permission_id: PermissionId) -> AppResult<Permission> {
        self.coordinator
            .cached_read(
                &permission_key(permission_id),
                self.cache_ttl.permission_entity,
                || async move {
                    self.reader
                        .find_permission(permission_id)
                        .await?
                        .ok_or_else(|| permission_not_found(permission_id))
                },
            )
            .await
    }

    /// Returns every permission ordered by code.
    pub async fn permissions(&self) -> AppResult<Vec<Permission>> {
        self.coordinator
            .cached_read(
                PERMISSION_LIST_KEY,
                self.cache_ttl.permission_list,
                || async move { self.reader.list_permissions().await },
            )
            .await
    }

    /// Returns the permissions attached to one role, whatever their status.
    pub async fn role_permissions(&self, role_id: RoleId) -> AppResult<Vec<Permission>> {
        self.coordinator
            .cached_read(
                &role_permissions_key(role_id),
                self.cache_ttl.role_permissions,
                || async move { self.reader.list_role_permissions(role_id).await },
            )
            .await
    }

    /// Returns the roles assigned to one admin, whatever their status.
    pub async fn admin_roles(&self, admin_id: AdminId) -> AppResult<Vec<Role>> {
        self.coordinator
            .cached_read(
                &admin_roles_key(admin_id),
                self.cache_ttl.admin_roles,
                || async move { self.reader.list_admin_roles(admin_id).await },
            )
            .await
    }
}
