use clap::{Parser, Subcommand};
use vitrine_core::{AdminId, AppError, AppResult};

/// Command line of the admin binary.
#[derive(Debug, Parser)]
#[command(
    name = "vitrine-admin",
    version,
    about = "Maintenance tasks for the Vitrine access-control store"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

/// Maintenance command selected on the command line.
#[derive(Debug, Clone, PartialEq, Eq, Subcommand)]
pub enum Command {
    /// Apply pending database migrations
    Migrate,
    /// Create the super-admin role and missing built-in permissions
    Seed,
    /// Check whether an admin holds a permission
    Check {
        /// Admin account id
        #[arg(value_parser = parse_admin_id)]
        admin_id: AdminId,
        /// Permission code (e.g. product.edit)
        permission: String,
    },
    /// Assign a role to an admin
    Grant {
        /// Role code (e.g. editor)
        role_code: String,
        /// Admin account id
        #[arg(value_parser = parse_admin_id)]
        admin_id: AdminId,
    },
}

fn parse_admin_id(value: &str) -> AppResult<AdminId> {
    value.parse::<i64>().map(AdminId::new).map_err(|error| {
        AppError::validation("admin_id", format!("invalid value '{value}': {error}"))
    })
}
