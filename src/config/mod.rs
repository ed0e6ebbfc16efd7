//! Configuration management for MedSync.
//!
//! TOML configuration with:
//! - Environment variable substitution (`${VAR_NAME}`)
//! - `MEDSYNC_<SECTION>_<KEY>` environment overrides
//! - Default values for optional settings
//! - Validation on load
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use medsync::config::load_config;
//!
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = load_config("medsync.toml")?;
//! println!("Target: {:?}", config.database_target);
//! println!("Exported state: {:?}", config.working_state.all_exported_state_id);
//! # Ok(())
//! # }
//! ```
//!
//! # Example Configuration
//!
//! ```toml
//! database_target = "postgresql"
//!
//! [application]
//! log_level = "info"
//! system_actor = "system"
//!
//! [postgresql]
//! connection_string = "${MEDSYNC_PG_URL}"
//!
//! [state_catalog]
//! base_url = "https://catalog.example.org/api"
//! api_token = "${MEDSYNC_CATALOG_TOKEN}"
//!
//! [working_state]
//! all_exported_state_id = 20
//! all_actually_exported_state_id = 30
//! evaluate_after_sync = true
//! ```

pub mod loader;
pub mod schema;
pub mod secret;

pub use loader::{load_config, load_config_str};
pub use schema::{
    ApplicationConfig, DatabaseTarget, LoggingConfig, MedSyncConfig, NotifierConfig,
    PostgreSQLConfig, StateCatalogConfig, SyncConfig, WorkingStateConfig,
};
pub use secret::{secret_string, secret_string_opt, SecretString, SecretValue};
