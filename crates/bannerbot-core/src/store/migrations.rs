use super::Database;

impl Database {
    /// Create the tables if they do not exist yet
    pub(super) async fn migrate(&self) -> Result<(), sqlx::Error> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS instances (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                virtualserver_name TEXT NOT NULL,
                host TEXT NOT NULL,
                voice_port INTEGER NOT NULL,
                serverquery_port INTEGER NOT NULL DEFAULT 10011,
                serverquery_username TEXT NOT NULL,
                serverquery_password TEXT NOT NULL,
                client_nickname TEXT,
                created_at TIMESTAMP,
                updated_at TIMESTAMP
            )
            "#,
        )
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS instance_processes (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                instance_id INTEGER NOT NULL,
                process_id INTEGER NOT NULL,
                command TEXT NOT NULL,
                created_at TIMESTAMP NOT NULL,
                updated_at TIMESTAMP NOT NULL,
                FOREIGN KEY (instance_id) REFERENCES instances(id) ON DELETE CASCADE
            )
            "#,
        )
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_processes_instance ON instance_processes(instance_id)",
        )
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok(())
    }
}
