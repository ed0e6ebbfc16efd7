//! Result type alias for MedSync

use super::errors::MedSyncError;

/// Result type alias for MedSync operations
///
/// # Examples
///
/// ```
/// use medsync::domain::result::Result;
/// use medsync::domain::errors::MedSyncError;
///
/// fn failing_function() -> Result<()> {
///     Err(MedSyncError::Validation("Invalid input".to_string()))
/// }
/// ```
pub type Result<T> = std::result::Result<T, MedSyncError>;
