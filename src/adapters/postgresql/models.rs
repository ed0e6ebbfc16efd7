//! PostgreSQL row models
//!
//! Column lists and row conversion shared by every record table.

use crate::adapters::database::traits::StoredRow;
use crate::domain::{MedSyncError, Record, RecordMeta, Result};
use tokio_postgres::Row;

/// Columns selected and inserted for every record table, in bind order
pub const RECORD_COLUMNS: &str = "local_id, external_id, parent_external_id, parent_local_id, \
     working_state_id, version, created_at, updated_at, created_by, updated_by, is_deleted, body";

/// Convert a result row into a stored record
///
/// # Errors
///
/// Returns a database error if a column is missing or has an unexpected type.
pub fn row_to_record(row: &Row) -> Result<StoredRow> {
    let column_error =
        |e: tokio_postgres::Error| MedSyncError::Database(format!("Invalid record row: {}", e));

    Ok(Record {
        local_id: row.try_get("local_id").map_err(column_error)?,
        external_id: row.try_get("external_id").map_err(column_error)?,
        parent_external_id: row.try_get("parent_external_id").map_err(column_error)?,
        parent_local_id: row.try_get("parent_local_id").map_err(column_error)?,
        working_state_id: row.try_get("working_state_id").map_err(column_error)?,
        meta: RecordMeta {
            version: row.try_get("version").map_err(column_error)?,
            created_at: row.try_get("created_at").map_err(column_error)?,
            updated_at: row.try_get("updated_at").map_err(column_error)?,
            created_by: row.try_get("created_by").map_err(column_error)?,
            updated_by: row.try_get("updated_by").map_err(column_error)?,
            is_deleted: row.try_get("is_deleted").map_err(column_error)?,
        },
        body: row.try_get("body").map_err(column_error)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_columns_cover_every_field() {
        let columns: Vec<&str> = RECORD_COLUMNS.split(',').map(str::trim).collect();
        assert_eq!(columns.len(), 12);
        assert_eq!(columns.first(), Some(&"local_id"));
        assert_eq!(columns.last(), Some(&"body"));
    }
}
