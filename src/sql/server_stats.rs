//! Server-wide (low resolution) stats from `sys.resource_stats` in `master`.

use chrono::{DateTime, Utc};
use std::sync::Arc;
use tracing::{error, warn};

use super::connection::{ConnectionSpec, SqlConnectionFactory, SqlRow, SqlValue, Statement};
use crate::counters::{CounterName, SqlStatsNamespace};
use crate::error::Result;
use crate::metrics;
use crate::models::UsageObject;

/// Columns that are not counters, plus the three counters the per-database
/// client already delivers at a higher resolution. Keeping them here would
/// chart the same dimension twice.
const NOT_COUNTER_COLUMNS: &[&str] = &[
    "start_time",
    "end_time",
    "sku",
    "database_name",
    "avg_cpu_percent",
    "avg_data_io_percent",
    "avg_log_write_percent",
];

pub struct ServerStatsClient {
    factory: Arc<dyn SqlConnectionFactory>,
    spec: ConnectionSpec,
}

impl ServerStatsClient {
    /// Server-wide stats live in the `master` database.
    pub fn new(factory: Arc<dyn SqlConnectionFactory>, spec: ConnectionSpec) -> Self {
        Self { factory, spec }
    }

    pub async fn get_usages(&self, from: DateTime<Utc>) -> Result<Vec<UsageObject>> {
        let mut connection = self
            .factory
            .connect(&self.spec.server, &self.spec.database, &self.spec.credentials)
            .await?;

        let statement = Statement::new("select * from sys.resource_stats where start_time > @from")
            .bind("from", SqlValue::DateTime(from));
        let result = connection.query(&statement).await?;

        if let Some(fault) = &result.interrupted {
            // The engine sometimes faults mid-stream but has already
            // delivered usable rows; keep them.
            error!(server = %self.spec.server, fault = %fault, "reading resource stats failed");
            metrics::record_source_failure("sys.resource_stats");
        }

        let mut usages = Vec::new();
        for row in &result.rows {
            self.collect_row(row, &mut usages);
        }
        Ok(usages)
    }

    fn collect_row(&self, row: &SqlRow, usages: &mut Vec<UsageObject>) {
        let database = match row.get("database_name").and_then(|v| v.as_text()) {
            Some(name) => name.to_string(),
            None => {
                warn!(server = %self.spec.server, "resource stats row without database_name, skipped");
                return;
            }
        };
        let timestamp = match row.get("start_time").and_then(|v| v.as_utc()) {
            Some(ts) => ts,
            None => {
                warn!(server = %self.spec.server, "resource stats row without start_time, skipped");
                return;
            }
        };

        for (name, value) in row.columns() {
            if NOT_COUNTER_COLUMNS.contains(&name) {
                continue;
            }
            let Some(value) = value.as_f64() else {
                continue;
            };
            usages.push(UsageObject::new(
                CounterName::sql(SqlStatsNamespace::Archive, &self.spec.server, &database, name),
                timestamp,
                value,
            ));
        }
    }

    /// User databases on the server, `master` excluded.
    pub async fn list_databases(&self) -> Result<Vec<String>> {
        let mut connection = self
            .factory
            .connect(&self.spec.server, &self.spec.database, &self.spec.credentials)
            .await?;

        let result = connection
            .query(&Statement::new("select * from sys.databases"))
            .await?;

        Ok(result
            .rows
            .iter()
            .filter_map(|row| row.get("name").and_then(|v| v.as_text()))
            .filter(|name| *name != "master")
            .map(|name| name.to_string())
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::credentials::SqlCredentials;
    use crate::sql::connection::QueryRows;
    use crate::sql::testing::MockSqlFactory;
    use chrono::TimeZone;
    use pretty_assertions::assert_eq;

    fn spec() -> ConnectionSpec {
        ConnectionSpec::new(
            "myserver",
            "master",
            SqlCredentials {
                username: "reader".to_string(),
                password: "pw".to_string(),
            },
        )
    }

    fn stats_row(database: &str, hour: u32) -> SqlRow {
        SqlRow::new(vec![
            (
                "start_time".to_string(),
                SqlValue::DateTime(Utc.with_ymd_and_hms(2014, 7, 1, hour, 0, 0).unwrap()),
            ),
            (
                "end_time".to_string(),
                SqlValue::DateTime(Utc.with_ymd_and_hms(2014, 7, 1, hour, 5, 0).unwrap()),
            ),
            ("database_name".to_string(), SqlValue::Text(database.to_string())),
            ("sku".to_string(), SqlValue::Text("Standard".to_string())),
            ("storage_in_megabytes".to_string(), SqlValue::Decimal(912.5)),
            ("avg_cpu_percent".to_string(), SqlValue::Decimal(44.0)),
            ("active_session_count".to_string(), SqlValue::Int(7)),
            ("usage_in_seconds".to_string(), SqlValue::BigInt(120)),
        ])
    }

    #[tokio::test]
    async fn emits_counters_for_numeric_columns_only() {
        let mock = MockSqlFactory::new().on_query(
            "master",
            "sys.resource_stats",
            QueryRows::complete(vec![stats_row("wadgraphes", 10)]),
        );
        let client = ServerStatsClient::new(Arc::new(Arc::clone(&mock)), spec());

        let usages = client
            .get_usages(Utc.with_ymd_and_hms(2014, 7, 1, 0, 0, 0).unwrap())
            .await
            .unwrap();

        let counters: Vec<String> = usages.iter().map(|u| u.counter.encode()).collect();
        assert_eq!(
            counters,
            vec![
                "Azure.SQLDatabase.myserver.wadgraphes.storage_in_megabytes",
                "Azure.SQLDatabase.myserver.wadgraphes.active_session_count",
                "Azure.SQLDatabase.myserver.wadgraphes.usage_in_seconds",
            ]
        );
    }

    #[tokio::test]
    async fn excludes_counters_superseded_by_high_resolution_source() {
        let mock = MockSqlFactory::new().on_query(
            "master",
            "sys.resource_stats",
            QueryRows::complete(vec![stats_row("db1", 10)]),
        );
        let client = ServerStatsClient::new(Arc::new(Arc::clone(&mock)), spec());

        let usages = client
            .get_usages(Utc.with_ymd_and_hms(2014, 7, 1, 0, 0, 0).unwrap())
            .await
            .unwrap();

        assert!(usages.iter().all(|u| {
            let wire = u.counter.encode();
            !wire.contains("avg_cpu_percent") && !wire.contains("sku")
        }));
    }

    #[tokio::test]
    async fn keeps_partial_rows_on_interrupted_stream() {
        let mock = MockSqlFactory::new().on_query(
            "master",
            "sys.resource_stats",
            QueryRows::interrupted(
                vec![stats_row("db1", 10), stats_row("db1", 11)],
                "Unable to retrieve Azure SQL Database telemetry data (25745)",
            ),
        );
        let client = ServerStatsClient::new(Arc::new(Arc::clone(&mock)), spec());

        let usages = client
            .get_usages(Utc.with_ymd_and_hms(2014, 7, 1, 0, 0, 0).unwrap())
            .await
            .unwrap();

        // Two rows, three counters each.
        assert_eq!(usages.len(), 6);
    }

    #[tokio::test]
    async fn lists_user_databases_without_master() {
        let rows = ["master", "wadgraphes", "inventory"]
            .iter()
            .map(|name| SqlRow::new(vec![("name".to_string(), SqlValue::Text(name.to_string()))]))
            .collect();
        let mock = MockSqlFactory::new().on_query(
            "master",
            "sys.databases",
            QueryRows::complete(rows),
        );
        let client = ServerStatsClient::new(Arc::new(Arc::clone(&mock)), spec());

        assert_eq!(
            client.list_databases().await.unwrap(),
            vec!["wadgraphes".to_string(), "inventory".to_string()]
        );
    }
}
