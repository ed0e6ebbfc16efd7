//! Configuration loading from disk

use medsync::config::{load_config, DatabaseTarget};
use medsync::core::service::ServiceSettings;
use medsync::domain::MedSyncError;
use secrecy::ExposeSecret;
use std::io::Write;
use tempfile::NamedTempFile;

fn write_config(contents: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(contents.as_bytes()).unwrap();
    file.flush().unwrap();
    file
}

#[test]
fn test_full_config_round_trip() {
    std::env::set_var("MEDSYNC_IT_PG_URL", "postgresql://medsync:pw@db:5432/medsync");
    std::env::set_var("MEDSYNC_IT_CATALOG_TOKEN", "token-123");

    let file = write_config(
        r#"
database_target = "postgresql"

[application]
log_level = "warn"
system_actor = "engine"

[postgresql]
connection_string = "${MEDSYNC_IT_PG_URL}"
max_bind_params = 500
ssl_mode = "require"

[state_catalog]
base_url = "https://his.example.org/api"
api_token = "${MEDSYNC_IT_CATALOG_TOKEN}"

[working_state]
all_exported_state_id = 20
evaluate_after_sync = true

[notifier]
topic_prefix = "his"

[sync]
bulk_concurrency = 16

[logging]
local_enabled = false
"#,
    );

    let config = load_config(file.path()).unwrap();
    assert_eq!(config.database_target, DatabaseTarget::PostgreSQL);

    let pg = config.postgresql.as_ref().unwrap();
    assert_eq!(
        pg.connection_string.expose_secret().as_ref(),
        "postgresql://medsync:pw@db:5432/medsync"
    );
    assert_eq!(pg.max_bind_params, 500);
    assert_eq!(pg.max_connections, 10);

    let catalog = config.state_catalog.as_ref().unwrap();
    assert_eq!(
        catalog.api_token.as_ref().unwrap().expose_secret().as_ref(),
        "token-123"
    );
    assert_eq!(catalog.timeout_seconds, 10);

    let settings = ServiceSettings::from_config(&config).unwrap();
    assert_eq!(settings.engine.system_actor.as_str(), "engine");
    assert_eq!(settings.engine.thresholds.all_exported, Some(20));
    assert_eq!(settings.engine.thresholds.all_actually_exported, None);
    assert_eq!(settings.engine.topic_prefix, "his");
    assert_eq!(settings.bulk_concurrency, 16);
    assert!(settings.evaluate_after_sync);

    std::env::remove_var("MEDSYNC_IT_PG_URL");
    std::env::remove_var("MEDSYNC_IT_CATALOG_TOKEN");
}

#[test]
fn test_missing_substitution_variable_fails() {
    std::env::remove_var("MEDSYNC_IT_UNSET");
    let file = write_config(
        r#"
database_target = "postgresql"

[postgresql]
connection_string = "${MEDSYNC_IT_UNSET}"
"#,
    );

    let err = load_config(file.path()).unwrap_err();
    assert!(matches!(err, MedSyncError::Configuration(_)));
    assert!(err.to_string().contains("MEDSYNC_IT_UNSET"));
}

#[test]
fn test_unknown_database_target_fails() {
    let file = write_config("database_target = \"sqlite\"\n");
    assert!(matches!(
        load_config(file.path()),
        Err(MedSyncError::Configuration(_))
    ));
}

#[test]
fn test_invalid_catalog_url_fails_validation() {
    let file = write_config(
        r#"
database_target = "memory"

[state_catalog]
base_url = "catalog.local"
"#,
    );
    let err = load_config(file.path()).unwrap_err();
    assert!(err.to_string().contains("state_catalog.base_url"));
}
