//! Domain error types
//!
//! This module defines the error hierarchy for MedSync.
//! All errors are domain-specific and don't expose third-party types.

use thiserror::Error;

/// Main MedSync error type
///
/// This is the primary error type used throughout the engine. The first four
/// variants are the reconciliation taxonomy; the rest cover the ambient
/// concerns (configuration, storage plumbing, serialization, I/O).
#[derive(Debug, Error)]
pub enum MedSyncError {
    /// A required field failed decoding
    #[error("Invalid field '{field}': {reason}")]
    FieldInvalid { field: String, reason: String },

    /// Parent, child or working state absent
    #[error("Not found: {0}")]
    NotFound(String),

    /// Remote lookup failed
    #[error("Upstream unavailable: {0}")]
    UpstreamUnavailable(String),

    /// Unique-constraint violation on an external id
    #[error("Storage conflict: {0}")]
    StorageConflict(String),

    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Database-related errors (generic)
    #[error("Database error: {0}")]
    Database(String),

    /// Validation errors
    #[error("Validation error: {0}")]
    Validation(String),

    /// Serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(String),

    /// Generic errors with context
    #[error("{0}")]
    Other(String),
}

impl MedSyncError {
    /// Creates a `FieldInvalid` error
    pub fn field_invalid(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::FieldInvalid {
            field: field.into(),
            reason: reason.into(),
        }
    }

    /// Short machine-readable code, used in bulk failure reports and logs
    pub fn code(&self) -> &'static str {
        match self {
            Self::FieldInvalid { .. } => "field_invalid",
            Self::NotFound(_) => "not_found",
            Self::UpstreamUnavailable(_) => "upstream_unavailable",
            Self::StorageConflict(_) => "storage_conflict",
            Self::Configuration(_) => "configuration",
            Self::Database(_) => "database",
            Self::Validation(_) => "validation",
            Self::Serialization(_) => "serialization",
            Self::Io(_) => "io",
            Self::Other(_) => "other",
        }
    }

    /// Whether a higher layer may reasonably retry the operation
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::StorageConflict(_) | Self::UpstreamUnavailable(_)
        )
    }
}

/// Working-state catalog errors
///
/// Errors that occur when resolving state descriptors over HTTP.
/// These errors don't expose the HTTP client's types.
#[derive(Debug, Error)]
pub enum CatalogError {
    /// Failed to reach the catalog
    #[error("Failed to connect to state catalog: {0}")]
    ConnectionFailed(String),

    /// Descriptor does not exist
    #[error("Working state not found: {0}")]
    StateNotFound(i64),

    /// Invalid response body
    #[error("Invalid response from state catalog: {0}")]
    InvalidResponse(String),

    /// Server error (5xx)
    #[error("Server error: {status} - {message}")]
    ServerError { status: u16, message: String },

    /// Client error (4xx other than 404)
    #[error("Client error: {status} - {message}")]
    ClientError { status: u16, message: String },

    /// Timeout
    #[error("Request timeout: {0}")]
    Timeout(String),
}

// A missing descriptor is NotFound; every other catalog failure means the
// catalog could not answer
impl From<CatalogError> for MedSyncError {
    fn from(err: CatalogError) -> Self {
        match err {
            CatalogError::StateNotFound(id) => {
                MedSyncError::NotFound(format!("working state {id}"))
            }
            other => MedSyncError::UpstreamUnavailable(other.to_string()),
        }
    }
}

// Conversion from std::io::Error
impl From<std::io::Error> for MedSyncError {
    fn from(err: std::io::Error) -> Self {
        MedSyncError::Io(err.to_string())
    }
}

// Conversion from serde_json::Error
impl From<serde_json::Error> for MedSyncError {
    fn from(err: serde_json::Error) -> Self {
        MedSyncError::Serialization(err.to_string())
    }
}

// Conversion from toml parse errors
impl From<toml::de::Error> for MedSyncError {
    fn from(err: toml::de::Error) -> Self {
        MedSyncError::Configuration(format!("TOML parse error: {err}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_field_invalid_display() {
        let err = MedSyncError::field_invalid("ID", "value is missing");
        assert_eq!(err.to_string(), "Invalid field 'ID': value is missing");
        assert_eq!(err.code(), "field_invalid");
    }

    #[test]
    fn test_catalog_error_conversion() {
        let catalog_err = CatalogError::ConnectionFailed("refused".to_string());
        let err: MedSyncError = catalog_err.into();
        assert!(matches!(err, MedSyncError::UpstreamUnavailable(_)));
        assert!(err.to_string().contains("refused"));
        assert_eq!(err.code(), "upstream_unavailable");
        assert!(err.is_retryable());
    }

    #[test]
    fn test_catalog_not_found_is_not_retryable() {
        let err: MedSyncError = CatalogError::StateNotFound(7).into();
        assert_eq!(err.code(), "not_found");
        assert!(!err.is_retryable());
    }

    #[test]
    fn test_storage_conflict_is_retryable() {
        let err = MedSyncError::StorageConflict("external_id 42".to_string());
        assert!(err.is_retryable());
        assert!(!MedSyncError::NotFound("x".to_string()).is_retryable());
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "File not found");
        let err: MedSyncError = io_err.into();
        assert!(matches!(err, MedSyncError::Io(_)));
    }

    #[test]
    fn test_serde_json_error_conversion() {
        let json_err = serde_json::from_str::<serde_json::Value>("invalid json").unwrap_err();
        let err: MedSyncError = json_err.into();
        assert!(matches!(err, MedSyncError::Serialization(_)));
    }

    #[test]
    fn test_toml_error_conversion() {
        let toml_err = toml::from_str::<toml::Value>("invalid = toml = syntax").unwrap_err();
        let err: MedSyncError = toml_err.into();
        assert!(matches!(err, MedSyncError::Configuration(_)));
        assert!(err.to_string().contains("TOML parse error"));
    }

    #[test]
    fn test_error_implements_std_error() {
        let err = MedSyncError::Validation("Test error".to_string());
        let _: &dyn std::error::Error = &err;
        let err = CatalogError::Timeout("5s".to_string());
        let _: &dyn std::error::Error = &err;
    }
}
