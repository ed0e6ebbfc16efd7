//! Validate config command implementation

use super::{EXIT_CONFIGURATION, EXIT_OK};
use crate::config::load_config;
use crate::config::schema::DatabaseTarget;
use clap::Args;

/// Arguments for the validate-config command
#[derive(Args, Debug)]
pub struct ValidateArgs {}

impl ValidateArgs {
    /// Execute the validate-config command
    pub async fn execute(&self, config_path: &str) -> anyhow::Result<i32> {
        tracing::info!(config_path = %config_path, "Validating configuration");

        println!("🔍 Validating configuration file: {config_path}");
        println!();

        // load_config validates before returning
        let config = match load_config(config_path) {
            Ok(c) => c,
            Err(e) => {
                println!("❌ Configuration is invalid");
                println!("   Error: {e}");
                return Ok(EXIT_CONFIGURATION);
            }
        };

        println!("✅ Configuration is valid");
        println!();
        println!("Configuration Summary:");
        println!("  Log Level: {}", config.application.log_level);
        println!("  System Actor: {}", config.application.system_actor);

        match config.database_target {
            DatabaseTarget::Memory => println!("  Database Target: memory (not persisted)"),
            DatabaseTarget::PostgreSQL => {
                if let Some(ref pg_config) = config.postgresql {
                    use secrecy::ExposeSecret;
                    println!("  Database Target: PostgreSQL");
                    println!(
                        "  PostgreSQL Connection: {}",
                        crate::adapters::postgresql::client::connection_string_safe(
                            pg_config.connection_string.expose_secret().as_ref()
                        )
                    );
                    println!("  Max Connections: {}", pg_config.max_connections);
                }
            }
        }

        match config.state_catalog {
            Some(ref catalog) => println!("  State Catalog: {}", catalog.base_url),
            None => println!("  State Catalog: none (descriptors unresolved)"),
        }

        let describe = |id: Option<i64>| id.map_or("disabled".to_string(), |id| id.to_string());
        println!(
            "  All-Exported State: {}",
            describe(config.working_state.all_exported_state_id)
        );
        println!(
            "  All-Actually-Exported State: {}",
            describe(config.working_state.all_actually_exported_state_id)
        );
        println!(
            "  Evaluate After Sync: {}",
            config.working_state.evaluate_after_sync
        );
        println!("  Bulk Concurrency: {}", config.sync.bulk_concurrency);
        println!();

        Ok(EXIT_OK)
    }
}
