//! Vitrine access-control maintenance binary.

#![forbid(unsafe_code)]

mod command;
mod config;

use std::collections::BTreeSet;
use std::sync::Arc;

use clap::Parser;
use sqlx::PgPool;
use sqlx::migrate::Migrator;
use sqlx::postgres::PgPoolOptions;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;
use vitrine_application::{
    CacheStore, CreatePermissionInput, CreateRoleInput, PermissionResolver, TransactionCoordinator,
};
use vitrine_core::{AdminId, AdminPrincipal, AppError, AppResult};
use vitrine_domain::{BuiltinPermission, RoleCode, SUPER_ADMIN_ROLE_CODE};
use vitrine_infrastructure::{
    InMemoryCacheStore, PostgresAuditSink, PostgresRbacStore, RedisCacheStore,
};

use crate::command::{Cli, Command};
use crate::config::AdminConfig;

static MIGRATOR: Migrator = sqlx::migrate!("../../crates/infrastructure/migrations");

#[tokio::main]
async fn main() -> Result<(), AppError> {
    let cli = Cli::parse();
    dotenvy::dotenv().ok();
    init_tracing();

    let config = AdminConfig::load()?;
    let pool = connect_pool(config.database_url.as_str()).await?;

    match cli.command {
        Command::Migrate => {
            MIGRATOR.run(&pool).await.map_err(|error| {
                AppError::Internal(format!("failed to run migrations: {error}"))
            })?;
            info!("migrations applied");
        }
        Command::Seed => seed(&build_resolver(&config, pool)?).await?,
        Command::Check {
            admin_id,
            permission,
        } => {
            let resolver = build_resolver(&config, pool)?;
            let granted = resolver
                .has_permission(admin_id, permission.as_str())
                .await?;
            info!(admin_id = %admin_id, permission = %permission, granted, "permission check");
        }
        Command::Grant {
            role_code,
            admin_id,
        } => grant(&build_resolver(&config, pool)?, role_code.as_str(), admin_id).await?,
    }

    Ok(())
}

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .compact()
        .init();
}

async fn connect_pool(database_url: &str) -> AppResult<PgPool> {
    PgPoolOptions::new()
        .max_connections(5)
        .connect(database_url)
        .await
        .map_err(|error| AppError::Internal(format!("failed to connect to database: {error}")))
}

fn build_cache(config: &AdminConfig) -> AppResult<Arc<dyn CacheStore>> {
    match config.redis_url.as_deref() {
        Some(redis_url) => {
            let client = redis::Client::open(redis_url).map_err(|error| {
                AppError::Internal(format!("failed to create redis client: {error}"))
            })?;
            Ok(Arc::new(RedisCacheStore::new(
                client,
                config.cache_namespace.as_str(),
            )))
        }
        None => {
            warn!("REDIS_URL is not set, falling back to a process-local cache");
            Ok(Arc::new(InMemoryCacheStore::new(
                config.cache_namespace.as_str(),
            )))
        }
    }
}

fn build_resolver(config: &AdminConfig, pool: PgPool) -> AppResult<PermissionResolver> {
    let store = Arc::new(PostgresRbacStore::new(pool.clone()));
    let coordinator = TransactionCoordinator::new(
        store.clone(),
        build_cache(config)?,
        Arc::new(PostgresAuditSink::new(pool)),
        config.coordinator,
    );

    Ok(PermissionResolver::new(coordinator, store).with_cache_ttl(config.cache_ttl))
}

/// Creates the super-admin role and every built-in permission that is missing.
async fn seed(resolver: &PermissionResolver) -> AppResult<()> {
    let actor = AdminPrincipal::system();

    let role_codes: BTreeSet<String> = resolver
        .roles()
        .await?
        .into_iter()
        .map(|role| role.code.as_str().to_owned())
        .collect();
    if !role_codes.contains(SUPER_ADMIN_ROLE_CODE) {
        let role = resolver
            .create_role(
                &actor,
                CreateRoleInput {
                    name: "Super admin".to_owned(),
                    code: SUPER_ADMIN_ROLE_CODE.to_owned(),
                    description: Some("Bypasses every permission check".to_owned()),
                    is_system: true,
                },
            )
            .await?;
        info!(role_id = %role.id, "seeded super admin role");
    }

    let permission_codes: BTreeSet<String> = resolver
        .permissions()
        .await?
        .into_iter()
        .map(|permission| permission.code.as_str().to_owned())
        .collect();
    for builtin in BuiltinPermission::all() {
        if permission_codes.contains(builtin.as_str()) {
            continue;
        }

        let permission = resolver
            .create_permission(
                &actor,
                CreatePermissionInput {
                    code: builtin.as_str().to_owned(),
                    name: builtin.display_name().to_owned(),
                    description: None,
                },
            )
            .await?;
        info!(permission = %permission.code, "seeded permission");
    }

    let metrics = resolver.coordinator().metrics();
    info!(
        succeeded = metrics.succeeded,
        failed = metrics.failed,
        "seed finished"
    );
    Ok(())
}

async fn grant(
    resolver: &PermissionResolver,
    role_code: &str,
    admin_id: AdminId,
) -> AppResult<()> {
    let role_code = RoleCode::new(role_code)?;
    let role = resolver
        .roles()
        .await?
        .into_iter()
        .find(|role| role.code == role_code)
        .ok_or_else(|| AppError::NotFound(format!("role '{role_code}' does not exist")))?;

    let assigned = resolver
        .assign_role_to_admin(&AdminPrincipal::system(), admin_id, role.id)
        .await?;
    if assigned {
        info!(admin_id = %admin_id, role = %role.code, "role assigned");
    } else {
        info!(admin_id = %admin_id, role = %role.code, "role already assigned");
    }

    Ok(())
}
