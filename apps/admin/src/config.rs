use vitrine_application::{CacheTtlConfig, CoordinatorConfig};
use vitrine_core::{AppError, AppResult};

const DEFAULT_CACHE_NAMESPACE: &str = "vitrine";

/// Runtime settings of the admin binary.
#[derive(Debug, Clone)]
pub struct AdminConfig {
    pub database_url: String,
    pub redis_url: Option<String>,
    pub cache_namespace: String,
    pub coordinator: CoordinatorConfig,
    pub cache_ttl: CacheTtlConfig,
}

impl AdminConfig {
    pub fn load() -> AppResult<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> AppResult<Self> {
        let database_url = non_empty(&lookup, "DATABASE_URL")
            .ok_or_else(|| AppError::validation("DATABASE_URL", "DATABASE_URL is required"))?;
        let redis_url = non_empty(&lookup, "REDIS_URL");
        let cache_namespace = non_empty(&lookup, "VITRINE_CACHE_NAMESPACE")
            .unwrap_or_else(|| DEFAULT_CACHE_NAMESPACE.to_owned());

        Ok(Self {
            database_url,
            redis_url,
            cache_namespace,
            coordinator: CoordinatorConfig::from_lookup(&lookup)?,
            cache_ttl: CacheTtlConfig::from_lookup(&lookup)?,
        })
    }
}

fn non_empty(lookup: &impl Fn(&str) -> Option<String>, name: &str) -> Option<String> {
    lookup(name)
        .map(|value| value.trim().to_owned())
        .filter(|value| !value.is_empty())
}
