use async_trait::async_trait;
use secrecy::SecretString;

use super::Database;
use crate::instance::{InstanceConfig, InstanceError, InstanceLoader};

#[derive(sqlx::FromRow)]
struct InstanceRow {
    id: i64,
    virtualserver_name: String,
    host: String,
    voice_port: i64,
    serverquery_port: i64,
    serverquery_username: String,
    serverquery_password: String,
    client_nickname: Option<String>,
}

fn port(id: i64, field: &str, value: i64) -> Result<u16, InstanceError> {
    u16::try_from(value).map_err(|_| InstanceError::InvalidRecord {
        id,
        reason: format!("{} {} is out of range", field, value),
    })
}

impl TryFrom<InstanceRow> for InstanceConfig {
    type Error = InstanceError;

    fn try_from(row: InstanceRow) -> Result<Self, Self::Error> {
        Ok(InstanceConfig {
            id: row.id,
            voice_port: port(row.id, "voice_port", row.voice_port)?,
            serverquery_port: port(row.id, "serverquery_port", row.serverquery_port)?,
            virtualserver_name: row.virtualserver_name,
            host: row.host,
            serverquery_username: row.serverquery_username,
            serverquery_password: SecretString::from(row.serverquery_password),
            client_nickname: row.client_nickname.filter(|n| !n.trim().is_empty()),
        })
    }
}

#[async_trait]
impl InstanceLoader for Database {
    async fn load(&self, instance_id: i64) -> Result<InstanceConfig, InstanceError> {
        let row: InstanceRow = sqlx::query_as(
            r#"
            SELECT id, virtualserver_name, host, voice_port, serverquery_port,
                   serverquery_username, serverquery_password, client_nickname
            FROM instances WHERE id = ?
            "#,
        )
        .bind(instance_id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or(InstanceError::NotFound(instance_id))?;

        row.try_into()
    }
}
