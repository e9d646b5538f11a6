//! Per-database (high resolution) stats from `sys.dm_db_resource_stats`.
//!
//! Reading the view needs `VIEW DATABASE STATE`; the (cached) permission
//! probe gates every fetch, and a missing grant degrades to an empty result
//! rather than an error so the rest of the chart still renders.

use chrono::{DateTime, Utc};
use std::sync::Arc;
use tracing::error;

use super::connection::{ConnectionSpec, SqlConnectionFactory, SqlRow, SqlValue, Statement};
use super::version::{can_read_stats, StatsCaches};
use crate::counters::{CounterName, SqlStatsNamespace};
use crate::error::Result;
use crate::metrics;
use crate::models::UsageObject;

const NOT_COUNTER_COLUMNS: &[&str] = &["end_time"];

pub struct DatabaseStatsClient {
    factory: Arc<dyn SqlConnectionFactory>,
    spec: ConnectionSpec,
    caches: Arc<StatsCaches>,
}

impl DatabaseStatsClient {
    pub fn new(
        factory: Arc<dyn SqlConnectionFactory>,
        spec: ConnectionSpec,
        caches: Arc<StatsCaches>,
    ) -> Self {
        Self {
            factory,
            spec,
            caches,
        }
    }

    pub async fn get_usages(&self, from: DateTime<Utc>) -> Result<Vec<UsageObject>> {
        if !can_read_stats(self.factory.as_ref(), &self.spec, &self.caches).await {
            return Ok(Vec::new());
        }

        let mut connection = self
            .factory
            .connect(&self.spec.server, &self.spec.database, &self.spec.credentials)
            .await?;

        let statement =
            Statement::new("select * from sys.dm_db_resource_stats where end_time > @from")
                .bind("from", SqlValue::DateTime(from));
        let result = connection.query(&statement).await?;

        if let Some(fault) = &result.interrupted {
            error!(
                server = %self.spec.server,
                database = %self.spec.database,
                fault = %fault,
                "reading resource stats failed"
            );
            metrics::record_source_failure("sys.dm_db_resource_stats");
        }

        let mut usages = Vec::new();
        for row in &result.rows {
            self.collect_row(row, &mut usages);
        }
        Ok(usages)
    }

    fn collect_row(&self, row: &SqlRow, usages: &mut Vec<UsageObject>) {
        let Some(timestamp) = row.get("end_time").and_then(|v| v.as_utc()) else {
            return;
        };

        for (name, value) in row.columns() {
            if NOT_COUNTER_COLUMNS.contains(&name) {
                continue;
            }
            let Some(value) = value.as_f64() else {
                continue;
            };
            usages.push(UsageObject::new(
                CounterName::sql(
                    SqlStatsNamespace::RealTime,
                    &self.spec.server,
                    &self.spec.database,
                    name,
                ),
                timestamp,
                value,
            ));
        }
    }
}
