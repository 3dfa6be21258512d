use async_trait::async_trait;
use chrono::{DateTime, Utc};

use super::Database;
use crate::registry::{NewProcessRecord, ProcessRecord, ProcessRegistry, RegistryError, Result};

#[derive(sqlx::FromRow)]
struct ProcessRow {
    id: i64,
    instance_id: i64,
    process_id: i64,
    command: String,
    created_at: DateTime<Utc>,
}

impl TryFrom<ProcessRow> for ProcessRecord {
    type Error = RegistryError;

    fn try_from(row: ProcessRow) -> Result<Self> {
        let process_id =
            u32::try_from(row.process_id).map_err(|_| RegistryError::InvalidRecord {
                id: row.id,
                reason: format!("process id {} is out of range", row.process_id),
            })?;

        Ok(ProcessRecord {
            id: row.id,
            instance_id: row.instance_id,
            process_id,
            command: row.command,
            created_at: row.created_at,
        })
    }
}

#[async_trait]
impl ProcessRegistry for Database {
    async fn create(&self, record: NewProcessRecord) -> Result<ProcessRecord> {
        let now = Utc::now();

        let result = sqlx::query(
            r#"
            INSERT INTO instance_processes (instance_id, process_id, command, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?)
            "#,
        )
        .bind(record.instance_id)
        .bind(i64::from(record.process_id))
        .bind(&record.command)
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await?;

        Ok(ProcessRecord {
            id: result.last_insert_rowid(),
            instance_id: record.instance_id,
            process_id: record.process_id,
            command: record.command,
            created_at: now,
        })
    }

    async fn delete(&self, record: &ProcessRecord) -> Result<bool> {
        let result = sqlx::query("DELETE FROM instance_processes WHERE id = ?")
            .bind(record.id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn list_for_instance(&self, instance_id: i64) -> Result<Vec<ProcessRecord>> {
        let rows: Vec<ProcessRow> = sqlx::query_as(
            r#"
            SELECT id, instance_id, process_id, command, created_at
            FROM instance_processes WHERE instance_id = ?
            ORDER BY created_at ASC, id ASC
            "#,
        )
        .bind(instance_id)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(ProcessRecord::try_from).collect()
    }

    async fn list_all(&self) -> Result<Vec<ProcessRecord>> {
        let rows: Vec<ProcessRow> = sqlx::query_as(
            r#"
            SELECT id, instance_id, process_id, command, created_at
            FROM instance_processes
            ORDER BY created_at ASC, id ASC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(ProcessRecord::try_from).collect()
    }
}
