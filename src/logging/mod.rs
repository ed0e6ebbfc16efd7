//! Logging and observability
//!
//! Structured logging for the reconciliation engine:
//! - human-readable console output
//! - JSON lines to a rolling local file
//! - level filtering via `application.log_level` or `RUST_LOG`
//!
//! # Example
//!
//! ```no_run
//! use medsync::logging::init_logging;
//! use medsync::config::LoggingConfig;
//!
//! let config = LoggingConfig::default();
//! let _guard = init_logging("info", &config).expect("Failed to initialize logging");
//!
//! tracing::info!("Application started");
//! ```

pub mod structured;

pub use structured::{init_logging, LoggingGuard};

/// Log a persisted working-state transition
///
/// # Example
///
/// ```no_run
/// use medsync::log_state_transition;
/// use medsync::domain::Hierarchy;
///
/// log_state_transition!(Hierarchy::Cabinet, 1001_i64, None::<i64>, 20_i64, "all_exported");
/// ```
#[macro_export]
macro_rules! log_state_transition {
    ($hierarchy:expr, $external_id:expr, $old_state:expr, $new_state:expr, $reason:expr) => {
        tracing::info!(
            hierarchy = %$hierarchy,
            external_id = $external_id,
            old_state = ?$old_state,
            new_state = $new_state,
            reason = %$reason,
            "Working state changed"
        );
    };
}

/// Log one failed item of a bulk sync
///
/// # Example
///
/// ```no_run
/// use medsync::log_bulk_failure;
/// use medsync::domain::{Hierarchy, MedSyncError};
///
/// let error = MedSyncError::field_invalid("ID", "missing");
/// log_bulk_failure!(Hierarchy::Other, 3_usize, None::<i64>, &error);
/// ```
#[macro_export]
macro_rules! log_bulk_failure {
    ($hierarchy:expr, $index:expr, $external_id:expr, $error:expr) => {
        tracing::warn!(
            hierarchy = %$hierarchy,
            index = $index,
            external_id = ?$external_id,
            error = %$error,
            error_code = $error.code(),
            "Line item sync failed"
        );
    };
}

/// Log a [`MedSyncError`](crate::domain::MedSyncError) with the operation it broke
#[macro_export]
macro_rules! log_error_with_context {
    ($error:expr, $context:expr) => {
        tracing::error!(
            error = %$error,
            error_code = $error.code(),
            context = $context,
            "Error occurred"
        );
    };
}

#[cfg(test)]
mod tests {
    use crate::domain::{Hierarchy, MedSyncError};

    #[test]
    fn test_macros_expand_without_subscriber() {
        let error = MedSyncError::field_invalid("ID", "missing");
        crate::log_state_transition!(
            Hierarchy::Inpatient,
            7_i64,
            Some(20_i64),
            30_i64,
            "all_actually_exported"
        );
        crate::log_bulk_failure!(Hierarchy::Cabinet, 0_usize, Some(5_i64), &error);
        crate::log_error_with_context!(&error, "bulk sync");
    }
}
