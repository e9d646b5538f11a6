//! Usage client for one SQL Database server: resolves the engine version,
//! picks the matching query dialect and fans out over the server-wide stats
//! view plus one high-resolution client per user database.

use chrono::{DateTime, Utc};
use futures::future::join_all;
use std::sync::Arc;
use tracing::error;

use super::connection::{
    test_open_connection, ConnectionSpec, SqlConnectionFactory, TestConnectionResult,
};
use super::database_stats::DatabaseStatsClient;
use super::server_stats::ServerStatsClient;
use super::version::{resolve_version, SqlServerVersion, StatsCaches, VersionInfo};
use crate::aggregate;
use crate::credentials::SqlCredentials;
use crate::error::{ChartError, Result};
use crate::metrics;
use crate::models::UsageObject;

pub struct SqlServerUsageClient {
    factory: Arc<dyn SqlConnectionFactory>,
    server: String,
    credentials: SqlCredentials,
    caches: Arc<StatsCaches>,
}

impl SqlServerUsageClient {
    pub fn new(
        factory: Arc<dyn SqlConnectionFactory>,
        server: impl Into<String>,
        credentials: SqlCredentials,
        caches: Arc<StatsCaches>,
    ) -> Self {
        Self {
            factory,
            server: server.into(),
            credentials,
            caches,
        }
    }

    fn master_spec(&self) -> ConnectionSpec {
        ConnectionSpec::new(&self.server, "master", self.credentials.clone())
    }

    fn database_spec(&self, database: &str) -> ConnectionSpec {
        ConnectionSpec::new(&self.server, database, self.credentials.clone())
    }

    pub async fn version(&self) -> Result<VersionInfo> {
        resolve_version(self.factory.as_ref(), &self.master_spec(), &self.caches).await
    }

    /// Connectivity plus version support check, for validating a server
    /// before charts are configured against it.
    pub async fn test_connection(&self) -> TestConnectionResult {
        let result = test_open_connection(self.factory.as_ref(), &self.master_spec()).await;
        if !result.is_success() {
            return result;
        }

        match self.version().await {
            Ok(info) if info.version == SqlServerVersion::Unknown => TestConnectionResult::failed(
                ChartError::UnsupportedVersion(info.detailed).to_string(),
                None,
            ),
            Ok(_) => TestConnectionResult::Success,
            Err(e) => TestConnectionResult::failed("could not determine engine version", Some(e.to_string())),
        }
    }

    fn server_stats_client(&self, version: &VersionInfo) -> ServerStatsClient {
        // V11 and V12 share the sys.resource_stats dialect today; engines
        // that report an unparseable version get the same treatment, which
        // matches what the dashboards historically did.
        match version.version {
            SqlServerVersion::V11 | SqlServerVersion::V12 | SqlServerVersion::Unknown => {
                ServerStatsClient::new(Arc::clone(&self.factory), self.master_spec())
            }
        }
    }

    pub async fn list_databases(&self) -> Result<Vec<String>> {
        let version = self.version().await?;
        self.server_stats_client(&version).list_databases().await
    }

    /// All usages for the server since `from`: the server-wide archive
    /// stats concatenated with per-database realtime stats, fetched
    /// concurrently. A failing source is logged and dropped; it never takes
    /// the other sources down with it.
    pub async fn get_usages(&self, from: DateTime<Utc>) -> Result<Vec<UsageObject>> {
        let version = self.version().await?;
        let server_client = self.server_stats_client(&version);

        let databases = match server_client.list_databases().await {
            Ok(databases) => databases,
            Err(e) => {
                error!(server = %self.server, error = %e, "listing databases failed, skipping per-database stats");
                metrics::record_source_failure("sys.databases");
                Vec::new()
            }
        };

        let master_fetch = server_client.get_usages(from);
        let database_fetches = databases.iter().map(|database| {
            let client = DatabaseStatsClient::new(
                Arc::clone(&self.factory),
                self.database_spec(database),
                Arc::clone(&self.caches),
            );
            async move { (database.clone(), client.get_usages(from).await) }
        });

        let (master_result, database_results) =
            futures::join!(master_fetch, join_all(database_fetches));

        let master = match master_result {
            Ok(usages) => usages,
            Err(e) => {
                error!(server = %self.server, error = %e, "server-wide stats fetch failed");
                metrics::record_source_failure("sys.resource_stats");
                Vec::new()
            }
        };

        let per_database = database_results
            .into_iter()
            .filter_map(|(database, result)| match result {
                Ok(usages) => Some(usages),
                Err(e) => {
                    error!(server = %self.server, database = %database, error = %e, "per-database stats fetch failed");
                    metrics::record_source_failure("sys.dm_db_resource_stats");
                    None
                }
            });

        Ok(aggregate::merge_usages(master, per_database))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::counters::{CounterName, SqlStatsNamespace};
    use crate::sql::connection::{QueryRows, SqlRow, SqlValue};
    use crate::sql::testing::MockSqlFactory;
    use chrono::TimeZone;
    use pretty_assertions::assert_eq;

    fn credentials() -> SqlCredentials {
        SqlCredentials {
            username: "reader".to_string(),
            password: "pw".to_string(),
        }
    }

    fn version_row(detailed: &str) -> QueryRows {
        QueryRows::complete(vec![SqlRow::new(vec![(
            "".to_string(),
            SqlValue::Text(detailed.to_string()),
        )])])
    }

    fn database_list(names: &[&str]) -> QueryRows {
        QueryRows::complete(
            names
                .iter()
                .map(|name| {
                    SqlRow::new(vec![("name".to_string(), SqlValue::Text(name.to_string()))])
                })
                .collect(),
        )
    }

    fn permission(count: i32) -> QueryRows {
        QueryRows::complete(vec![SqlRow::new(vec![(
            "".to_string(),
            SqlValue::Int(count),
        )])])
    }

    fn archive_row() -> QueryRows {
        QueryRows::complete(vec![SqlRow::new(vec![
            (
                "start_time".to_string(),
                SqlValue::DateTime(Utc.with_ymd_and_hms(2014, 7, 1, 10, 0, 0).unwrap()),
            ),
            ("database_name".to_string(), SqlValue::Text("mydb".to_string())),
            ("storage_in_megabytes".to_string(), SqlValue::Decimal(100.0)),
            ("avg_cpu_percent".to_string(), SqlValue::Decimal(99.0)),
        ])])
    }

    fn realtime_row() -> QueryRows {
        QueryRows::complete(vec![SqlRow::new(vec![
            (
                "end_time".to_string(),
                SqlValue::DateTime(Utc.with_ymd_and_hms(2014, 7, 1, 10, 1, 0).unwrap()),
            ),
            ("avg_cpu_percent".to_string(), SqlValue::Decimal(41.0)),
        ])])
    }

    fn client(mock: &std::sync::Arc<MockSqlFactory>) -> SqlServerUsageClient {
        SqlServerUsageClient::new(
            Arc::new(Arc::clone(mock)),
            "myserver",
            credentials(),
            Arc::new(StatsCaches::new()),
        )
    }

    #[tokio::test]
    async fn unsupported_version_fails_test_connection_with_detail() {
        let mock = MockSqlFactory::new().on_query(
            "master",
            "@@VERSION",
            version_row("Microsoft SQL Server 2008 - 10.0.1600.22"),
        );

        let result = client(&mock).test_connection().await;
        match result {
            TestConnectionResult::Failed { message, .. } => {
                assert_eq!(
                    message,
                    ChartError::UnsupportedVersion(
                        "Microsoft SQL Server 2008 - 10.0.1600.22".to_string()
                    )
                    .to_string()
                );
                assert!(message.contains("10.0.1600.22"), "message: {}", message);
            }
            other => panic!("expected failure, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn supported_version_passes_test_connection() {
        let mock = MockSqlFactory::new().on_query(
            "master",
            "@@VERSION",
            version_row("Microsoft SQL Azure (RTM) - 12.0.2000.8"),
        );

        assert!(client(&mock).test_connection().await.is_success());
    }

    #[test_log::test(tokio::test)]
    async fn overlapping_counter_appears_once_from_the_realtime_source() {
        let mock = MockSqlFactory::new()
            .on_query(
                "master",
                "@@VERSION",
                version_row("Microsoft SQL Azure (RTM) - 12.0.2000.8"),
            )
            .on_query("master", "sys.databases", database_list(&["master", "mydb"]))
            .on_query("master", "sys.resource_stats", archive_row())
            .on_query("mydb", "VIEW DATABASE STATE", permission(1))
            .on_query("mydb", "sys.dm_db_resource_stats", realtime_row());

        let usages = client(&mock)
            .get_usages(Utc.with_ymd_and_hms(2014, 7, 1, 9, 0, 0).unwrap())
            .await
            .unwrap();

        let cpu: Vec<&UsageObject> = usages
            .iter()
            .filter(|u| matches!(&u.counter, CounterName::Sql(c) if c.metric == "avg_cpu_percent"))
            .collect();
        assert_eq!(cpu.len(), 1);
        match &cpu[0].counter {
            CounterName::Sql(c) => assert_eq!(c.namespace, SqlStatsNamespace::RealTime),
            other => panic!("unexpected counter {:?}", other),
        }
        assert_eq!(cpu[0].value, 41.0);

        // The archive source still contributes its non-superseded counter.
        assert!(usages
            .iter()
            .any(|u| matches!(&u.counter, CounterName::Sql(c) if c.metric == "storage_in_megabytes")));
    }

    #[test_log::test(tokio::test)]
    async fn failing_per_database_source_does_not_fail_the_request() {
        let mock = MockSqlFactory::new()
            .on_query(
                "master",
                "@@VERSION",
                version_row("Microsoft SQL Azure (RTM) - 12.0.2000.8"),
            )
            .on_query("master", "sys.databases", database_list(&["mydb", "broken"]))
            .on_query("master", "sys.resource_stats", archive_row())
            .on_query("mydb", "VIEW DATABASE STATE", permission(1))
            .on_query("mydb", "sys.dm_db_resource_stats", realtime_row())
            .fail_connect_to("broken");

        let usages = client(&mock)
            .get_usages(Utc.with_ymd_and_hms(2014, 7, 1, 9, 0, 0).unwrap())
            .await
            .unwrap();

        // master + mydb data both present despite the broken database.
        assert!(usages
            .iter()
            .any(|u| matches!(&u.counter, CounterName::Sql(c) if c.namespace == SqlStatsNamespace::Archive)));
        assert!(usages
            .iter()
            .any(|u| matches!(&u.counter, CounterName::Sql(c) if c.namespace == SqlStatsNamespace::RealTime)));
    }

    #[tokio::test]
    async fn lists_databases_through_the_dialect_client() {
        let mock = MockSqlFactory::new()
            .on_query(
                "master",
                "@@VERSION",
                version_row("Microsoft SQL Azure (RTM) - 11.0.9231.65"),
            )
            .on_query("master", "sys.databases", database_list(&["master", "mydb"]));

        assert_eq!(
            client(&mock).list_databases().await.unwrap(),
            vec!["mydb".to_string()]
        );
    }

    #[tokio::test]
    async fn version_probe_failure_is_fatal() {
        let mock = MockSqlFactory::new().fail_connect_to("master");

        let result = client(&mock)
            .get_usages(Utc.with_ymd_and_hms(2014, 7, 1, 9, 0, 0).unwrap())
            .await;
        assert!(result.is_err());
    }
}
