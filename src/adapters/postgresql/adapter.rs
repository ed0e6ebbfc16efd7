//! PostgreSQL adapter implementation
//!
//! Implements the record traits on top of the pooled client. Every entity
//! kind maps to one table with identical columns, so the statements below
//! differ only in table name.

use crate::adapters::database::traits::{
    RecordBackend, RecordSession, RecordTransaction, StoredRow,
};
use crate::adapters::postgresql::client::{map_pg_error, PostgreSQLClient};
use crate::adapters::postgresql::models::{row_to_record, RECORD_COLUMNS};
use crate::domain::ids::EntityKind;
use crate::domain::{MedSyncError, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::any::Any;
use std::sync::Arc;
use tokio_postgres::Client;
use uuid::Uuid;

/// PostgreSQL adapter for record storage
pub struct PostgreSQLAdapter {
    client: Arc<PostgreSQLClient>,
}

impl PostgreSQLAdapter {
    /// Create a new PostgreSQL adapter
    pub fn new(client: PostgreSQLClient) -> Self {
        Self {
            client: Arc::new(client),
        }
    }

    /// Get a reference to the underlying client
    pub fn client(&self) -> &Arc<PostgreSQLClient> {
        &self.client
    }
}

async fn select_where(
    client: &Client,
    kind: EntityKind,
    column: &str,
    ids: &[i64],
) -> Result<Vec<StoredRow>> {
    if ids.is_empty() {
        return Ok(Vec::new());
    }

    let query = format!(
        "SELECT {} FROM {} WHERE {} = ANY($1)",
        RECORD_COLUMNS,
        kind.table_name(),
        column
    );
    let ids = ids.to_vec();
    let rows = client
        .query(query.as_str(), &[&ids])
        .await
        .map_err(|e| map_pg_error("Lookup failed", e))?;

    rows.iter().map(row_to_record).collect()
}

async fn insert_row(client: &Client, kind: EntityKind, row: &StoredRow) -> Result<()> {
    let statement = format!(
        "INSERT INTO {} ({}) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)",
        kind.table_name(),
        RECORD_COLUMNS
    );

    client
        .execute(
            statement.as_str(),
            &[
                &row.local_id,
                &row.external_id,
                &row.parent_external_id,
                &row.parent_local_id,
                &row.working_state_id,
                &row.meta.version,
                &row.meta.created_at,
                &row.meta.updated_at,
                &row.meta.created_by,
                &row.meta.updated_by,
                &row.meta.is_deleted,
                &row.body,
            ],
        )
        .await
        .map_err(|e| map_pg_error(&format!("Insert into {} failed", kind.table_name()), e))?;

    Ok(())
}

fn missing_row(kind: EntityKind, local_id: Uuid) -> MedSyncError {
    MedSyncError::NotFound(format!("{} row {}", kind.table_name(), local_id))
}

async fn update_row(client: &Client, kind: EntityKind, row: &StoredRow) -> Result<StoredRow> {
    let statement = format!(
        "UPDATE {} SET parent_external_id = $2, parent_local_id = $3, body = $4, \
         updated_at = $5, updated_by = $6, is_deleted = $7, version = version + 1 \
         WHERE local_id = $1 RETURNING {}",
        kind.table_name(),
        RECORD_COLUMNS
    );

    let rows = client
        .query(
            statement.as_str(),
            &[
                &row.local_id,
                &row.parent_external_id,
                &row.parent_local_id,
                &row.body,
                &row.meta.updated_at,
                &row.meta.updated_by,
                &row.meta.is_deleted,
            ],
        )
        .await
        .map_err(|e| map_pg_error(&format!("Update of {} failed", kind.table_name()), e))?;

    rows.first()
        .map(row_to_record)
        .unwrap_or_else(|| Err(missing_row(kind, row.local_id)))
}

async fn update_working_state(
    client: &Client,
    kind: EntityKind,
    local_id: Uuid,
    working_state_id: Option<i64>,
    actor: &str,
    now: DateTime<Utc>,
) -> Result<StoredRow> {
    let statement = format!(
        "UPDATE {} SET working_state_id = $2, updated_at = $3, updated_by = $4, \
         version = version + 1 WHERE local_id = $1 RETURNING {}",
        kind.table_name(),
        RECORD_COLUMNS
    );

    let rows = client
        .query(
            statement.as_str(),
            &[&local_id, &working_state_id, &now, &actor],
        )
        .await
        .map_err(|e| map_pg_error("Working-state update failed", e))?;

    rows.first()
        .map(row_to_record)
        .unwrap_or_else(|| Err(missing_row(kind, local_id)))
}

async fn delete_by_parent_id(
    client: &Client,
    kind: EntityKind,
    parent_external_id: i64,
) -> Result<u64> {
    let statement = format!(
        "DELETE FROM {} WHERE parent_external_id = $1",
        kind.table_name()
    );

    client
        .execute(statement.as_str(), &[&parent_external_id])
        .await
        .map_err(|e| map_pg_error(&format!("Delete from {} failed", kind.table_name()), e))
}

async fn backfill_parent_local_id(
    client: &Client,
    kind: EntityKind,
    parent_external_id: i64,
    parent_local_id: Uuid,
    actor: &str,
    now: DateTime<Utc>,
) -> Result<u64> {
    let statement = format!(
        "UPDATE {} SET parent_local_id = $2, updated_at = $3, updated_by = $4, \
         version = version + 1 \
         WHERE parent_external_id = $1 AND parent_local_id IS DISTINCT FROM $2",
        kind.table_name()
    );

    client
        .execute(
            statement.as_str(),
            &[&parent_external_id, &parent_local_id, &now, &actor],
        )
        .await
        .map_err(|e| map_pg_error("Parent backfill failed", e))
}

#[async_trait]
impl RecordSession for PostgreSQLAdapter {
    async fn find_by_external_ids(
        &self,
        kind: EntityKind,
        external_ids: &[i64],
    ) -> Result<Vec<StoredRow>> {
        let conn = self.client.get_connection().await?;
        select_where(&conn, kind, "external_id", external_ids).await
    }

    async fn find_by_parent_ids(
        &self,
        kind: EntityKind,
        parent_external_ids: &[i64],
    ) -> Result<Vec<StoredRow>> {
        let conn = self.client.get_connection().await?;
        select_where(&conn, kind, "parent_external_id", parent_external_ids).await
    }

    async fn insert_row(&self, kind: EntityKind, row: &StoredRow) -> Result<()> {
        let conn = self.client.get_connection().await?;
        insert_row(&conn, kind, row).await
    }

    async fn update_row(&self, kind: EntityKind, row: &StoredRow) -> Result<StoredRow> {
        let conn = self.client.get_connection().await?;
        update_row(&conn, kind, row).await
    }

    async fn update_working_state(
        &self,
        kind: EntityKind,
        local_id: Uuid,
        working_state_id: Option<i64>,
        actor: &str,
        now: DateTime<Utc>,
    ) -> Result<StoredRow> {
        let conn = self.client.get_connection().await?;
        update_working_state(&conn, kind, local_id, working_state_id, actor, now).await
    }

    async fn delete_by_parent_id(&self, kind: EntityKind, parent_external_id: i64) -> Result<u64> {
        let conn = self.client.get_connection().await?;
        delete_by_parent_id(&conn, kind, parent_external_id).await
    }

    async fn backfill_parent_local_id(
        &self,
        kind: EntityKind,
        parent_external_id: i64,
        parent_local_id: Uuid,
        actor: &str,
        now: DateTime<Utc>,
    ) -> Result<u64> {
        let conn = self.client.get_connection().await?;
        backfill_parent_local_id(&conn, kind, parent_external_id, parent_local_id, actor, now)
            .await
    }

    fn max_bind_params(&self) -> usize {
        self.client.max_bind_params()
    }
}

#[async_trait]
impl RecordBackend for PostgreSQLAdapter {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_session(&self) -> &dyn RecordSession {
        self
    }

    async fn test_connection(&self) -> Result<()> {
        self.client.test_connection().await
    }

    async fn ensure_schema(&self) -> Result<()> {
        self.client.ensure_schema().await
    }

    async fn begin(&self) -> Result<Box<dyn RecordTransaction>> {
        let conn = self.client.get_connection().await?;
        conn.batch_execute("BEGIN")
            .await
            .map_err(|e| map_pg_error("Failed to begin transaction", e))?;

        Ok(Box::new(PgTransaction {
            conn: Some(conn),
            max_bind_params: self.client.max_bind_params(),
        }))
    }

    fn backend_name(&self) -> &str {
        "postgresql"
    }
}

/// A transaction pinned to one pooled connection
///
/// If dropped before commit or rollback the connection is detached from the
/// pool and closed, which makes the server abort the transaction.
pub struct PgTransaction {
    conn: Option<deadpool_postgres::Object>,
    max_bind_params: usize,
}

impl PgTransaction {
    fn conn(&self) -> Result<&deadpool_postgres::Object> {
        self.conn
            .as_ref()
            .ok_or_else(|| MedSyncError::Database("Transaction already finished".to_string()))
    }

    async fn finish(mut self: Box<Self>, statement: &str) -> Result<()> {
        let conn = self
            .conn
            .take()
            .ok_or_else(|| MedSyncError::Database("Transaction already finished".to_string()))?;

        match conn.batch_execute(statement).await {
            Ok(()) => Ok(()),
            Err(e) => {
                // Connection state is unknown; keep it out of the pool
                drop(deadpool_postgres::Object::take(conn));
                Err(map_pg_error(&format!("{} failed", statement), e))
            }
        }
    }
}

impl Drop for PgTransaction {
    fn drop(&mut self) {
        if let Some(conn) = self.conn.take() {
            tracing::warn!("PostgreSQL transaction dropped without commit; discarding connection");
            drop(deadpool_postgres::Object::take(conn));
        }
    }
}

#[async_trait]
impl RecordSession for PgTransaction {
    async fn find_by_external_ids(
        &self,
        kind: EntityKind,
        external_ids: &[i64],
    ) -> Result<Vec<StoredRow>> {
        select_where(self.conn()?, kind, "external_id", external_ids).await
    }

    async fn find_by_parent_ids(
        &self,
        kind: EntityKind,
        parent_external_ids: &[i64],
    ) -> Result<Vec<StoredRow>> {
        select_where(self.conn()?, kind, "parent_external_id", parent_external_ids).await
    }

    async fn insert_row(&self, kind: EntityKind, row: &StoredRow) -> Result<()> {
        insert_row(self.conn()?, kind, row).await
    }

    async fn update_row(&self, kind: EntityKind, row: &StoredRow) -> Result<StoredRow> {
        update_row(self.conn()?, kind, row).await
    }

    async fn update_working_state(
        &self,
        kind: EntityKind,
        local_id: Uuid,
        working_state_id: Option<i64>,
        actor: &str,
        now: DateTime<Utc>,
    ) -> Result<StoredRow> {
        update_working_state(self.conn()?, kind, local_id, working_state_id, actor, now).await
    }

    async fn delete_by_parent_id(&self, kind: EntityKind, parent_external_id: i64) -> Result<u64> {
        delete_by_parent_id(self.conn()?, kind, parent_external_id).await
    }

    async fn backfill_parent_local_id(
        &self,
        kind: EntityKind,
        parent_external_id: i64,
        parent_local_id: Uuid,
        actor: &str,
        now: DateTime<Utc>,
    ) -> Result<u64> {
        backfill_parent_local_id(
            self.conn()?,
            kind,
            parent_external_id,
            parent_local_id,
            actor,
            now,
        )
        .await
    }

    fn max_bind_params(&self) -> usize {
        self.max_bind_params
    }
}

#[async_trait]
impl RecordTransaction for PgTransaction {
    fn as_session(&self) -> &dyn RecordSession {
        self
    }

    async fn commit(self: Box<Self>) -> Result<()> {
        self.finish("COMMIT").await
    }

    async fn rollback(self: Box<Self>) -> Result<()> {
        self.finish("ROLLBACK").await
    }
}
