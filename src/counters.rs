//! Graphite-style dotted counter names.
//!
//! Counter identity is carried as a typed key per namespace; the dotted wire
//! string only exists at the encode/decode boundary. Segments must not
//! contain `.` themselves, the wire form has no escaping.

use crate::error::{ChartError, Result};

const SQL_ARCHIVE_PREFIX: &str = "Azure.SQLDatabase";
const SQL_REALTIME_PREFIX: &str = "Azure.SQLRealTime";
const CLOUD_SERVICE_PREFIX: &str = "Azure.CloudServices.MetricsApi";

/// Which of the two SQL stats sources produced a counter. The realtime
/// (per-database) source samples the same dimensions at a higher resolution
/// than the archive (server-wide) source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SqlStatsNamespace {
    Archive,
    RealTime,
}

impl SqlStatsNamespace {
    fn prefix(&self) -> &'static str {
        match self {
            SqlStatsNamespace::Archive => SQL_ARCHIVE_PREFIX,
            SqlStatsNamespace::RealTime => SQL_REALTIME_PREFIX,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SqlCounterName {
    pub namespace: SqlStatsNamespace,
    pub server: String,
    pub database: String,
    pub metric: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CloudServiceCounterName {
    pub service: String,
    pub slot: String,
    pub role: String,
    pub metric: String,
    pub unit: String,
    pub aggregation: String,
    pub instance: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct WebsiteCounterName {
    pub metric: String,
    pub unit: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum CounterName {
    Sql(SqlCounterName),
    CloudService(CloudServiceCounterName),
    Website(WebsiteCounterName),
}

impl CounterName {
    pub fn sql(
        namespace: SqlStatsNamespace,
        server: impl Into<String>,
        database: impl Into<String>,
        metric: impl Into<String>,
    ) -> Self {
        CounterName::Sql(SqlCounterName {
            namespace,
            server: server.into(),
            database: database.into(),
            metric: metric.into(),
        })
    }

    pub fn website(metric: impl Into<String>, unit: impl Into<String>) -> Self {
        CounterName::Website(WebsiteCounterName {
            metric: metric.into(),
            unit: unit.into(),
        })
    }

    pub fn encode(&self) -> String {
        match self {
            CounterName::Sql(c) => format!(
                "{}.{}.{}.{}",
                c.namespace.prefix(),
                c.server,
                c.database,
                c.metric
            ),
            CounterName::CloudService(c) => format!(
                "{}.{}.{}.{}.{}.{}.{}.{}",
                CLOUD_SERVICE_PREFIX,
                c.service,
                c.slot,
                c.role,
                c.metric,
                c.unit,
                c.aggregation,
                c.instance
            ),
            CounterName::Website(c) => format!("{}.{}", c.metric, c.unit),
        }
    }

    /// Positional decode of a wire counter name. The namespace prefix picks
    /// the layout; a wrong segment count is an error rather than a silently
    /// misaligned key.
    pub fn decode(raw: &str) -> Result<Self> {
        let segments: Vec<&str> = raw.split('.').collect();

        match segments.as_slice() {
            ["Azure", "SQLDatabase", server, database, metric] => Ok(CounterName::sql(
                SqlStatsNamespace::Archive,
                *server,
                *database,
                *metric,
            )),
            ["Azure", "SQLRealTime", server, database, metric] => Ok(CounterName::sql(
                SqlStatsNamespace::RealTime,
                *server,
                *database,
                *metric,
            )),
            ["Azure", "CloudServices", "MetricsApi", service, slot, role, metric, unit, aggregation, instance] => {
                Ok(CounterName::CloudService(CloudServiceCounterName {
                    service: service.to_string(),
                    slot: slot.to_string(),
                    role: role.to_string(),
                    metric: metric.to_string(),
                    unit: unit.to_string(),
                    aggregation: aggregation.to_string(),
                    instance: instance.to_string(),
                }))
            }
            [metric, unit] => Ok(CounterName::website(*metric, *unit)),
            _ => Err(malformed(raw)),
        }
    }
}

fn malformed(raw: &str) -> ChartError {
    ChartError::Internal(format!("malformed counter name: {}", raw))
}
