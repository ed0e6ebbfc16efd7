//! Configuration loader with TOML parsing and environment variable overrides

use super::schema::{DatabaseTarget, MedSyncConfig};
use super::secret::secret_string;
use crate::domain::errors::MedSyncError;
use crate::domain::result::Result;
use regex::Regex;
use std::fs;
use std::path::Path;
use std::str::FromStr;

/// Loads configuration from a TOML file
///
/// This function:
/// 1. Reads the TOML file
/// 2. Substitutes `${VAR}` placeholders outside comment lines
/// 3. Parses the TOML into [`MedSyncConfig`]
/// 4. Applies `MEDSYNC_*` environment overrides
/// 5. Validates the result
///
/// # Errors
///
/// Every failure is reported as `MedSyncError::Configuration`.
///
/// # Examples
///
/// ```no_run
/// use medsync::config::loader::load_config;
///
/// let config = load_config("medsync.toml").expect("Failed to load config");
/// ```
pub fn load_config(path: impl AsRef<Path>) -> Result<MedSyncConfig> {
    let path = path.as_ref();

    if !path.exists() {
        return Err(MedSyncError::Configuration(format!(
            "Configuration file not found: {}",
            path.display()
        )));
    }

    let contents = fs::read_to_string(path).map_err(|e| {
        MedSyncError::Configuration(format!(
            "Failed to read configuration file {}: {}",
            path.display(),
            e
        ))
    })?;

    load_config_str(&contents)
}

/// Same as [`load_config`] for in-memory TOML
pub fn load_config_str(contents: &str) -> Result<MedSyncConfig> {
    let contents = substitute_env_vars(contents)?;

    let mut config: MedSyncConfig = toml::from_str(&contents)
        .map_err(|e| MedSyncError::Configuration(format!("Failed to parse TOML: {}", e)))?;

    apply_env_overrides(&mut config)?;

    config.validate().map_err(|e| {
        MedSyncError::Configuration(format!("Configuration validation failed: {}", e))
    })?;

    Ok(config)
}

/// Substitutes environment variables in the format ${VAR_NAME}
///
/// # Errors
///
/// Returns an error naming every referenced variable that is not set
fn substitute_env_vars(input: &str) -> Result<String> {
    let re = Regex::new(r"\$\{([A-Z_][A-Z0-9_]*)\}")
        .map_err(|e| MedSyncError::Other(format!("invalid substitution pattern: {}", e)))?;
    let mut lines = Vec::new();
    let mut missing_vars: Vec<String> = Vec::new();

    for line in input.lines() {
        // Placeholders in comments are left alone
        if line.trim_start().starts_with('#') {
            lines.push(line.to_string());
            continue;
        }

        let mut processed_line = line.to_string();
        for cap in re.captures_iter(line) {
            let var_name = &cap[1];
            match std::env::var(var_name) {
                Ok(value) => {
                    let placeholder = format!("${{{}}}", var_name);
                    processed_line = processed_line.replace(&placeholder, &value);
                }
                Err(_) => {
                    if !missing_vars.iter().any(|v| v == var_name) {
                        missing_vars.push(var_name.to_string());
                    }
                }
            }
        }
        lines.push(processed_line);
    }

    if !missing_vars.is_empty() {
        return Err(MedSyncError::Configuration(format!(
            "Missing required environment variables: {}",
            missing_vars.join(", ")
        )));
    }

    Ok(lines.join("\n"))
}

fn parse_env<T: FromStr>(name: &str, value: &str) -> Result<T> {
    value.trim().parse().map_err(|_| {
        MedSyncError::Configuration(format!("{} has an invalid value: '{}'", name, value))
    })
}

fn parse_optional_id(name: &str, value: &str) -> Result<Option<i64>> {
    if value.trim().is_empty() {
        Ok(None)
    } else {
        parse_env(name, value).map(Some)
    }
}

/// Applies environment variable overrides using the MEDSYNC_* prefix
///
/// Variables follow the pattern `MEDSYNC_<SECTION>_<KEY>`, for example
/// `MEDSYNC_WORKING_STATE_ALL_EXPORTED_STATE_ID`. An empty value for an
/// optional state id disables that transition.
fn apply_env_overrides(config: &mut MedSyncConfig) -> Result<()> {
    let var = |name: &str| std::env::var(name).ok();

    // Application overrides
    if let Some(val) = var("MEDSYNC_APPLICATION_LOG_LEVEL") {
        config.application.log_level = val;
    }
    if let Some(val) = var("MEDSYNC_APPLICATION_SYSTEM_ACTOR") {
        config.application.system_actor = val;
    }

    if let Some(val) = var("MEDSYNC_DATABASE_TARGET") {
        config.database_target = match val.to_lowercase().as_str() {
            "postgresql" => DatabaseTarget::PostgreSQL,
            "memory" => DatabaseTarget::Memory,
            other => {
                return Err(MedSyncError::Configuration(format!(
                    "MEDSYNC_DATABASE_TARGET must be postgresql or memory, got '{}'",
                    other
                )))
            }
        };
    }

    // PostgreSQL overrides (only if PostgreSQL is configured)
    if let Some(ref mut pg) = config.postgresql {
        if let Some(val) = var("MEDSYNC_POSTGRESQL_CONNECTION_STRING") {
            pg.connection_string = secret_string(val);
        }
        if let Some(val) = var("MEDSYNC_POSTGRESQL_MAX_CONNECTIONS") {
            pg.max_connections = parse_env("MEDSYNC_POSTGRESQL_MAX_CONNECTIONS", &val)?;
        }
        if let Some(val) = var("MEDSYNC_POSTGRESQL_SSL_MODE") {
            pg.ssl_mode = val;
        }
        if let Some(val) = var("MEDSYNC_POSTGRESQL_STATEMENT_TIMEOUT_SECONDS") {
            pg.statement_timeout_seconds =
                parse_env("MEDSYNC_POSTGRESQL_STATEMENT_TIMEOUT_SECONDS", &val)?;
        }
    }

    // Catalog overrides (only if a catalog is configured)
    if let Some(ref mut catalog) = config.state_catalog {
        if let Some(val) = var("MEDSYNC_STATE_CATALOG_BASE_URL") {
            catalog.base_url = val;
        }
        if let Some(val) = var("MEDSYNC_STATE_CATALOG_API_TOKEN") {
            catalog.api_token = Some(secret_string(val));
        }
        if let Some(val) = var("MEDSYNC_STATE_CATALOG_TLS_VERIFY") {
            catalog.tls_verify = parse_env("MEDSYNC_STATE_CATALOG_TLS_VERIFY", &val)?;
        }
    }

    // Working-state overrides
    if let Some(val) = var("MEDSYNC_WORKING_STATE_ALL_EXPORTED_STATE_ID") {
        config.working_state.all_exported_state_id =
            parse_optional_id("MEDSYNC_WORKING_STATE_ALL_EXPORTED_STATE_ID", &val)?;
    }
    if let Some(val) = var("MEDSYNC_WORKING_STATE_ALL_ACTUALLY_EXPORTED_STATE_ID") {
        config.working_state.all_actually_exported_state_id =
            parse_optional_id("MEDSYNC_WORKING_STATE_ALL_ACTUALLY_EXPORTED_STATE_ID", &val)?;
    }
    if let Some(val) = var("MEDSYNC_WORKING_STATE_EVALUATE_AFTER_SYNC") {
        config.working_state.evaluate_after_sync =
            parse_env("MEDSYNC_WORKING_STATE_EVALUATE_AFTER_SYNC", &val)?;
    }

    if let Some(val) = var("MEDSYNC_NOTIFIER_TOPIC_PREFIX") {
        config.notifier.topic_prefix = val;
    }
    if let Some(val) = var("MEDSYNC_SYNC_BULK_CONCURRENCY") {
        config.sync.bulk_concurrency = parse_env("MEDSYNC_SYNC_BULK_CONCURRENCY", &val)?;
    }

    // Logging overrides
    if let Some(val) = var("MEDSYNC_LOGGING_LOCAL_ENABLED") {
        config.logging.local_enabled = parse_env("MEDSYNC_LOGGING_LOCAL_ENABLED", &val)?;
    }
    if let Some(val) = var("MEDSYNC_LOGGING_LOCAL_PATH") {
        config.logging.local_path = val;
    }

    Ok(())
}
