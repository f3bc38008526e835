//! Tunables for the coordinator and permission caches.
//!
//! Values are read through a lookup function so the binary can pass
//! `std::env::var` while tests pass a map.

use std::time::Duration;

use vitrine_core::{AppError, AppResult};

/// Retry and batching settings for the transaction coordinator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CoordinatorConfig {
    /// Attempts made by `run_with_default_retry`, including the first one.
    pub max_retry_attempts: u32,
    /// Fixed delay between attempts.
    pub retry_delay: Duration,
    /// Items per transaction in `batch`.
    pub batch_size: usize,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            max_retry_attempts: 3,
            retry_delay: Duration::from_millis(100),
            batch_size: 100,
        }
    }
}

impl CoordinatorConfig {
    /// Loads settings, falling back to defaults for unset variables.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> AppResult<Self> {
        let defaults = Self::default();
        let max_retry_attempts = parse_positive(
            &lookup,
            "VITRINE_RETRY_MAX_ATTEMPTS",
            u64::from(defaults.max_retry_attempts),
        )?;
        let retry_delay_ms = parse_u64(
            &lookup,
            "VITRINE_RETRY_DELAY_MS",
            u64::try_from(defaults.retry_delay.as_millis()).unwrap_or(u64::MAX),
        )?;
        let batch_size =
            parse_positive(&lookup, "VITRINE_BATCH_SIZE", defaults.batch_size as u64)?;

        Ok(Self {
            max_retry_attempts: u32::try_from(max_retry_attempts).map_err(|_| {
                AppError::validation("VITRINE_RETRY_MAX_ATTEMPTS", "value is too large")
            })?,
            retry_delay: Duration::from_millis(retry_delay_ms),
            batch_size: usize::try_from(batch_size)
                .map_err(|_| AppError::validation("VITRINE_BATCH_SIZE", "value is too large"))?,
        })
    }
}

/// Time-to-live, in seconds, of each permission cache family.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheTtlConfig {
    /// Single role entity.
    pub role_entity: u64,
    /// List of every role.
    pub role_list: u64,
    /// Single permission entity.
    pub permission_entity: u64,
    /// List of every permission.
    pub permission_list: u64,
    /// Permissions granted by one role.
    pub role_permissions: u64,
    /// Roles held by one admin.
    pub admin_roles: u64,
    /// Effective permission set of one admin.
    pub admin_permissions: u64,
    /// Point check of one admin and permission code.
    pub permission_check: u64,
}

impl Default for CacheTtlConfig {
    fn default() -> Self {
        Self {
            role_entity: 3600,
            role_list: 1800,
            permission_entity: 3600,
            permission_list: 1800,
            role_permissions: 1800,
            admin_roles: 1800,
            admin_permissions: 1800,
            permission_check: 900,
        }
    }
}

impl CacheTtlConfig {
    /// Loads TTLs, falling back to defaults for unset variables.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> AppResult<Self> {
        let defaults = Self::default();

        Ok(Self {
            role_entity: parse_u64(
                &lookup,
                "VITRINE_CACHE_TTL_ROLE_SECONDS",
                defaults.role_entity,
            )?,
            role_list: parse_u64(
                &lookup,
                "VITRINE_CACHE_TTL_ROLE_LIST_SECONDS",
                defaults.role_list,
            )?,
            permission_entity: parse_u64(
                &lookup,
                "VITRINE_CACHE_TTL_PERMISSION_SECONDS",
                defaults.permission_entity,
            )?,
            permission_list: parse_u64(
                &lookup,
                "VITRINE_CACHE_TTL_PERMISSION_LIST_SECONDS",
                defaults.permission_list,
            )?,
            role_permissions: parse_u64(
                &lookup,
                "VITRINE_CACHE_TTL_ROLE_PERMISSIONS_SECONDS",
                defaults.role_permissions,
            )?,
            admin_roles: parse_u64(
                &lookup,
                "VITRINE_CACHE_TTL_ADMIN_ROLES_SECONDS",
                defaults.admin_roles,
            )?,
            admin_permissions: parse_u64(
                &lookup,
                "VITRINE_CACHE_TTL_ADMIN_PERMISSIONS_SECONDS",
                defaults.admin_permissions,
            )?,
            permission_check: parse_u64(
                &lookup,
                "VITRINE_CACHE_TTL_PERMISSION_CHECK_SECONDS",
                defaults.permission_check,
            )?,
        })
    }
}

fn parse_u64(
    lookup: &impl Fn(&str) -> Option<String>,
    name: &str,
    default: u64,
) -> AppResult<u64> {
    match lookup(name) {
        Some(value) => value.trim().parse::<u64>().map_err(|error| {
            AppError::validation(name, format!("invalid value '{value}': {error}"))
        }),
        None => Ok(default),
    }
}

fn parse_positive(
    lookup: &impl Fn(&str) -> Option<String>,
    name: &str,
    default: u64,
) -> AppResult<u64> {
    let value = parse_u64(lookup, name, default)?;
    if value == 0 {
        return Err(AppError::validation(name, "value must be greater than zero"));
    }

    Ok(value)
}
