//! Init command implementation
//!
//! Writes a sample `medsync.toml`.

use super::{EXIT_CONFIGURATION, EXIT_FATAL, EXIT_OK};
use clap::Args;
use std::fs;
use std::path::Path;

/// Arguments for the init command
#[derive(Args, Debug)]
pub struct InitArgs {
    /// Path where to create the configuration file
    #[arg(short, long, default_value = "medsync.toml")]
    pub output: String,

    /// Write the PostgreSQL variant with every section commented
    #[arg(long)]
    pub with_examples: bool,

    /// Overwrite existing file
    #[arg(long)]
    pub force: bool,
}

impl InitArgs {
    /// Execute the init command
    pub async fn execute(&self) -> anyhow::Result<i32> {
        tracing::info!(output = %self.output, "Initializing configuration file");

        if Path::new(&self.output).exists() && !self.force {
            println!("❌ Configuration file already exists: {}", self.output);
            println!("   Use --force to overwrite");
            return Ok(EXIT_CONFIGURATION);
        }

        let config_content = if self.with_examples {
            Self::generate_config_with_examples()
        } else {
            Self::generate_minimal_config()
        };

        match fs::write(&self.output, config_content) {
            Ok(_) => {
                println!("✅ Configuration file created: {}", self.output);
                println!();
                println!("Next steps:");
                println!("  1. Set the working-state ids in [working_state]");
                println!("  2. For PostgreSQL: export MEDSYNC_PG_URL");
                println!("  3. Validate configuration: medsync validate-config");
                println!();
                Ok(EXIT_OK)
            }
            Err(e) => {
                println!("❌ Failed to write configuration file");
                println!("   Error: {}", e);
                Ok(EXIT_FATAL)
            }
        }
    }

    fn generate_minimal_config() -> String {
        r#"# MedSync configuration
database_target = "memory"

[application]
log_level = "info"
system_actor = "system"

[working_state]
all_exported_state_id = 20
all_actually_exported_state_id = 30
evaluate_after_sync = true

[logging]
local_enabled = false
"#
        .to_string()
    }

    fn generate_config_with_examples() -> String {
        r#"# MedSync configuration
#
# ${VAR} placeholders are replaced from the environment on load, and any
# MEDSYNC_<SECTION>_<KEY> variable overrides the value in this file.

# postgresql | memory (memory is lost on exit)
database_target = "postgresql"

[application]
# trace, debug, info, warn, error
log_level = "info"
# Actor stamped on working-state transitions
system_actor = "system"

[postgresql]
connection_string = "${MEDSYNC_PG_URL}"
max_connections = 10
connection_timeout_seconds = 30
statement_timeout_seconds = 60
# disable, allow, prefer, require, verify-ca, verify-full
ssl_mode = "prefer"
# Ids bound into one lookup statement
max_bind_params = 900

# Remote working-state catalog; omit to leave descriptors unresolved
# [state_catalog]
# base_url = "https://his.example.org/api"
# api_token = "${MEDSYNC_CATALOG_TOKEN}"
# timeout_seconds = 10
# tls_verify = true

[working_state]
# Target once every line item is logically exported; omit to disable
all_exported_state_id = 20
# Target once every line item is actually exported; omit to disable
all_actually_exported_state_id = 30
# Evaluate the parent right after each sync
evaluate_after_sync = true

[notifier]
channel_capacity = 1024
# Topics are {prefix}.{hierarchy}.working_state_changed
topic_prefix = "medsync"

[sync]
# Line items upserted concurrently by sync-items
bulk_concurrency = 8

[logging]
local_enabled = true
local_path = "/var/log/medsync"
# daily, hourly, never
local_rotation = "daily"
local_max_size_mb = 100
"#
        .to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::load_config_str;
    use tempfile::TempDir;

    #[test]
    fn test_minimal_config_loads() {
        let config = load_config_str(&InitArgs::generate_minimal_config()).unwrap();
        assert_eq!(config.working_state.all_exported_state_id, Some(20));
    }

    #[test]
    fn test_generate_config_with_examples() {
        let config = InitArgs::generate_config_with_examples();
        assert!(config.contains("[postgresql]"));
        assert!(config.contains("max_bind_params"));
        assert!(config.contains("topic_prefix"));
    }

    #[tokio::test]
    async fn test_init_refuses_to_overwrite() {
        let dir = TempDir::new().unwrap();
        let output = dir.path().join("medsync.toml");
        fs::write(&output, "existing").unwrap();

        let args = InitArgs {
            output: output.to_string_lossy().to_string(),
            with_examples: false,
            force: false,
        };
        assert_eq!(args.execute().await.unwrap(), EXIT_CONFIGURATION);
        assert_eq!(fs::read_to_string(&output).unwrap(), "existing");
    }
}
