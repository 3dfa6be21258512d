use async_trait::async_trait;
use chrono::{DateTime, Local, Utc};
use std::collections::BTreeMap;

use super::{ViewBuilder, ViewData};
use crate::instance::InstanceConfig;
use crate::session::{self, QuerySession, Record, Reply};

const CLIENT_LIST_COMMAND: &str = "clientlist -groups -country";
const SERVERGROUP_LIST_COMMAND: &str = "servergrouplist";
const SERVER_INFO_COMMAND: &str = "serverinfo";

/// Regular clients; query clients have type 1
const CLIENT_TYPE_REGULAR: &str = "0";

/// Regular server groups; templates and query groups have other types
const SERVERGROUP_TYPE_REGULAR: &str = "1";

/// Builds views from ServerQuery replies
#[derive(Debug, Clone, Copy, Default)]
pub struct ServerQueryViews;

impl ServerQueryViews {
    /// Create the builder
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl ViewBuilder for ServerQueryViews {
    async fn datetime(
        &self,
        _session: &mut dyn QuerySession,
        _instance: &InstanceConfig,
    ) -> session::Result<ViewData> {
        Ok(datetime_data(Utc::now()))
    }

    async fn client_list(
        &self,
        session: &mut dyn QuerySession,
        _instance: &InstanceConfig,
    ) -> session::Result<ViewData> {
        let clients = session.request(CLIENT_LIST_COMMAND).await?;
        Ok(client_list_data(&clients))
    }

    async fn servergroup_list(
        &self,
        session: &mut dyn QuerySession,
        _instance: &InstanceConfig,
    ) -> session::Result<ViewData> {
        let groups = session.request(SERVERGROUP_LIST_COMMAND).await?;
        let clients = session.request(CLIENT_LIST_COMMAND).await?;
        Ok(servergroup_data(&groups, &clients))
    }

    async fn virtualserver_info(
        &self,
        session: &mut dyn QuerySession,
        _instance: &InstanceConfig,
    ) -> session::Result<ViewData> {
        let info = session.request(SERVER_INFO_COMMAND).await?;
        Ok(virtualserver_data(&info))
    }
}

fn datetime_data(now: DateTime<Utc>) -> ViewData {
    let local = now.with_timezone(&Local);
    let mut data = ViewData::new();
    data.insert("current_time_utc".to_string(), now.format("%H:%M:%S").to_string());
    data.insert("current_date_utc".to_string(), now.format("%Y-%m-%d").to_string());
    data.insert("current_time_hi".to_string(), local.format("%H:%M").to_string());
    data.insert("current_time_his".to_string(), local.format("%H:%M:%S").to_string());
    data.insert("current_date_dmy".to_string(), local.format("%d.%m.%Y").to_string());
    data.insert("current_date_ymd".to_string(), local.format("%Y-%m-%d").to_string());
    data.insert("current_weekday".to_string(), local.format("%A").to_string());
    data.insert("current_timestamp".to_string(), now.timestamp().to_string());
    data
}

fn regular_clients(clients: &Reply) -> impl Iterator<Item = &Record> {
    clients
        .records()
        .iter()
        .filter(|c| c.get("client_type").map(String::as_str) == Some(CLIENT_TYPE_REGULAR))
}

fn client_list_data(clients: &Reply) -> ViewData {
    let mut data = ViewData::new();
    let mut count = 0usize;

    for client in regular_clients(clients) {
        let Some(clid) = client.get("clid") else {
            continue;
        };
        count += 1;
        for (field, key) in [
            ("client_nickname", "nickname"),
            ("client_servergroups", "servergroups"),
            ("client_country", "country"),
        ] {
            data.insert(
                format!("client_{}_{}", clid, key),
                client.get(field).cloned().unwrap_or_default(),
            );
        }
    }

    data.insert("client_count".to_string(), count.to_string());
    data
}

fn servergroup_data(groups: &Reply, clients: &Reply) -> ViewData {
    let mut online: BTreeMap<&str, usize> = BTreeMap::new();
    for client in regular_clients(clients) {
        if let Some(group_ids) = client.get("client_servergroups") {
            for sgid in group_ids.split(',').filter(|id| !id.is_empty()) {
                *online.entry(sgid).or_default() += 1;
            }
        }
    }

    let mut data = ViewData::new();
    for group in groups.records() {
        if group.get("type").map(String::as_str) != Some(SERVERGROUP_TYPE_REGULAR) {
            continue;
        }
        let Some(sgid) = group.get("sgid") else {
            continue;
        };
        data.insert(
            format!("servergroup_{}_name", sgid),
            group.get("name").cloned().unwrap_or_default(),
        );
        data.insert(
            format!("servergroup_{}_online_clients", sgid),
            online.get(sgid.as_str()).copied().unwrap_or(0).to_string(),
        );
    }
    data
}

fn virtualserver_data(info: &Reply) -> ViewData {
    let Some(record) = info.first() else {
        return ViewData::new();
    };
    let mut data: ViewData = record.clone();

    let count = |key: &str| {
        record
            .get(key)
            .and_then(|v| v.parse::<i64>().ok())
            .unwrap_or(0)
    };
    let real_clients =
        (count("virtualserver_clientsonline") - count("virtualserver_queryclientsonline")).max(0);
    data.insert(
        "virtualserver_clientsonline_without_queryclients".to_string(),
        real_clients.to_string(),
    );
    data
}
