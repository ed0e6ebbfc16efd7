//! CLI command implementations
//!
//! Commands return an exit code: 0 ok, 1 partial failure, 2 configuration
//! error, 4 connection error, 5 fatal.

pub mod evaluate;
pub mod init;
pub mod summarize;
pub mod sync;
pub mod sync_items;
pub mod validate;

use crate::adapters::catalog::create_state_catalog;
use crate::adapters::database::create_record_backend;
use crate::config::load_config;
use crate::core::notify::BroadcastNotifier;
use crate::core::service::{ReconciliationService, ServiceSettings};
use crate::domain::{Hierarchy, HisPayload, MedSyncError};
use serde::Serialize;
use std::path::Path;
use std::sync::Arc;

pub const EXIT_OK: i32 = 0;
pub const EXIT_PARTIAL_FAILURE: i32 = 1;
pub const EXIT_CONFIGURATION: i32 = 2;
pub const EXIT_CONNECTION: i32 = 4;
pub const EXIT_FATAL: i32 = 5;

/// Exit code for a failed operation
pub fn exit_code_for(error: &MedSyncError) -> i32 {
    match error {
        MedSyncError::Configuration(_) => EXIT_CONFIGURATION,
        MedSyncError::Database(_) | MedSyncError::UpstreamUnavailable(_) => EXIT_CONNECTION,
        _ => EXIT_FATAL,
    }
}

/// clap value parser for `--hierarchy`
pub(crate) fn parse_hierarchy(value: &str) -> Result<Hierarchy, String> {
    value.parse()
}

/// Service wired from a configuration file
pub(crate) struct Wiring {
    pub service: ReconciliationService,
    pub notifier: Arc<BroadcastNotifier>,
}

/// Load configuration and connect; `Err` carries the exit code
///
/// The schema migration is idempotent and runs on every connect.
pub(crate) async fn connect(config_path: &str) -> Result<Wiring, i32> {
    let config = match load_config(config_path) {
        Ok(c) => c,
        Err(e) => {
            println!("❌ Failed to load configuration file");
            println!("   Error: {e}");
            return Err(EXIT_CONFIGURATION);
        }
    };

    let backend = match create_record_backend(&config).await {
        Ok(b) => b,
        Err(e) => {
            println!("❌ Failed to create record backend");
            println!("   Error: {e}");
            return Err(exit_code_for(&e));
        }
    };

    if let Err(e) = backend.test_connection().await {
        crate::log_error_with_context!(e, "connection test");
        println!("❌ Failed to connect to {}", backend.backend_name());
        println!("   Error: {e}");
        return Err(EXIT_CONNECTION);
    }

    if let Err(e) = backend.ensure_schema().await {
        crate::log_error_with_context!(e, "schema setup");
        println!("❌ Failed to initialize schema");
        println!("   Error: {e}");
        return Err(EXIT_FATAL);
    }

    let catalog = create_state_catalog(&config).map_err(|e| {
        println!("❌ Invalid state catalog configuration");
        println!("   Error: {e}");
        EXIT_CONFIGURATION
    })?;

    let settings = ServiceSettings::from_config(&config).map_err(|e| {
        println!("❌ Invalid configuration");
        println!("   Error: {e}");
        EXIT_CONFIGURATION
    })?;

    let notifier = Arc::new(BroadcastNotifier::new(config.notifier.channel_capacity));
    let service = ReconciliationService::new(backend, catalog, notifier.clone(), settings);

    Ok(Wiring { service, notifier })
}

/// Read a JSON file into a value of type `T`
pub(crate) fn read_json<T: serde::de::DeserializeOwned>(path: &str) -> anyhow::Result<T> {
    let contents = std::fs::read_to_string(Path::new(path))
        .map_err(|e| anyhow::anyhow!("Failed to read {}: {}", path, e))?;
    serde_json::from_str(&contents).map_err(|e| anyhow::anyhow!("Invalid JSON in {}: {}", path, e))
}

/// Convert raw JSON objects into payloads
pub(crate) fn to_payloads(values: Vec<serde_json::Value>) -> anyhow::Result<Vec<HisPayload>> {
    values
        .into_iter()
        .enumerate()
        .map(|(index, value)| {
            HisPayload::from_value(value)
                .map_err(|e| anyhow::anyhow!("Item {} is not a valid payload: {}", index, e))
        })
        .collect()
}

/// Print a value as pretty JSON on stdout
pub(crate) fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
