//! Opaque database-connection collaborator.
//!
//! The core never talks to a SQL driver directly; it is handed a factory
//! that yields connections supporting parameterized queries and tabular row
//! iteration. A known Azure SQL driver fault can abort a result stream after
//! some rows were already delivered, so query results carry the rows read so
//! far together with an optional interruption instead of being all-or-nothing.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::credentials::SqlCredentials;
use crate::error::{ChartError, Result};

#[derive(Debug, Clone, PartialEq)]
pub enum SqlValue {
    Decimal(f64),
    Int(i32),
    BigInt(i64),
    Float(f64),
    Text(String),
    DateTime(DateTime<Utc>),
    Null,
}

impl SqlValue {
    /// Numeric coercion applied to every counter cell. Non-numeric values
    /// have no f64 rendition and the cell is skipped by callers.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            SqlValue::Decimal(v) | SqlValue::Float(v) => Some(*v),
            SqlValue::Int(v) => Some(*v as f64),
            SqlValue::BigInt(v) => Some(*v as f64),
            SqlValue::Text(_) | SqlValue::DateTime(_) | SqlValue::Null => None,
        }
    }

    pub fn as_utc(&self) -> Option<DateTime<Utc>> {
        match self {
            SqlValue::DateTime(ts) => Some(*ts),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            SqlValue::Text(s) => Some(s),
            _ => None,
        }
    }
}

/// One result row, columns in select order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SqlRow {
    columns: Vec<(String, SqlValue)>,
}

impl SqlRow {
    pub fn new(columns: Vec<(String, SqlValue)>) -> Self {
        Self { columns }
    }

    pub fn get(&self, name: &str) -> Option<&SqlValue> {
        self.columns
            .iter()
            .find(|(col, _)| col == name)
            .map(|(_, value)| value)
    }

    pub fn columns(&self) -> impl Iterator<Item = (&str, &SqlValue)> {
        self.columns.iter().map(|(name, value)| (name.as_str(), value))
    }

    pub fn first_value(&self) -> Option<&SqlValue> {
        self.columns.first().map(|(_, value)| value)
    }
}

/// Rows read from a query, plus the fault that cut the stream short if one
/// occurred. `interrupted` with a non-empty `rows` is a valid, degraded
/// outcome.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryRows {
    pub rows: Vec<SqlRow>,
    pub interrupted: Option<String>,
}

impl QueryRows {
    pub fn complete(rows: Vec<SqlRow>) -> Self {
        Self {
            rows,
            interrupted: None,
        }
    }

    pub fn interrupted(rows: Vec<SqlRow>, fault: impl Into<String>) -> Self {
        Self {
            rows,
            interrupted: Some(fault.into()),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Statement {
    pub sql: String,
    pub params: Vec<(String, SqlValue)>,
}

impl Statement {
    pub fn new(sql: impl Into<String>) -> Self {
        Self {
            sql: sql.into(),
            params: Vec::new(),
        }
    }

    pub fn bind(mut self, name: impl Into<String>, value: SqlValue) -> Self {
        self.params.push((name.into(), value));
        self
    }
}

#[async_trait]
pub trait SqlConnection: Send {
    async fn query(&mut self, statement: &Statement) -> Result<QueryRows>;
}

#[async_trait]
pub trait SqlConnectionFactory: Send + Sync {
    async fn connect(
        &self,
        server: &str,
        database: &str,
        credentials: &SqlCredentials,
    ) -> Result<Box<dyn SqlConnection>>;
}

/// Everything needed to open (and cache-key) one backend connection.
#[derive(Debug, Clone)]
pub struct ConnectionSpec {
    pub server: String,
    pub database: String,
    pub credentials: SqlCredentials,
}

impl ConnectionSpec {
    pub fn new(server: impl Into<String>, database: impl Into<String>, credentials: SqlCredentials) -> Self {
        Self {
            server: server.into(),
            database: database.into(),
            credentials,
        }
    }

    pub fn cache_key(&self) -> String {
        format!(
            "{}:{}:{}",
            self.server, self.database, self.credentials.username
        )
    }
}

/// Outcome of probing a connection, kept separate from the error channel so
/// a failed probe can be reported without aborting the caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TestConnectionResult {
    Success,
    Failed {
        message: String,
        underlying: Option<String>,
    },
}

impl TestConnectionResult {
    pub fn failed(message: impl Into<String>, underlying: Option<String>) -> Self {
        TestConnectionResult::Failed {
            message: message.into(),
            underlying,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, TestConnectionResult::Success)
    }
}

/// Probe that a connection can actually be opened.
pub async fn test_open_connection(
    factory: &dyn SqlConnectionFactory,
    spec: &ConnectionSpec,
) -> TestConnectionResult {
    match factory
        .connect(&spec.server, &spec.database, &spec.credentials)
        .await
    {
        Ok(_) => TestConnectionResult::Success,
        Err(e) => TestConnectionResult::failed(
            format!("could not connect to {}/{}", spec.server, spec.database),
            Some(e.to_string()),
        ),
    }
}

/// Placeholder factory for deployments without any SQL backend configured;
/// every connection attempt fails with a descriptive error.
pub struct UnconfiguredSqlFactory;

#[async_trait]
impl SqlConnectionFactory for UnconfiguredSqlFactory {
    async fn connect(
        &self,
        server: &str,
        _database: &str,
        _credentials: &SqlCredentials,
    ) -> Result<Box<dyn SqlConnection>> {
        Err(ChartError::Connection(format!(
            "no SQL connection factory configured (requested server {})",
            server
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn numeric_coercion_covers_driver_types() {
        assert_eq!(SqlValue::Decimal(1.5).as_f64(), Some(1.5));
        assert_eq!(SqlValue::Int(3).as_f64(), Some(3.0));
        assert_eq!(SqlValue::BigInt(1 << 40).as_f64(), Some((1u64 << 40) as f64));
        assert_eq!(SqlValue::Float(0.25).as_f64(), Some(0.25));
        assert_eq!(SqlValue::Text("4".to_string()).as_f64(), None);
        assert_eq!(SqlValue::Null.as_f64(), None);
    }

    #[test]
    fn cache_key_is_server_database_user() {
        let spec = ConnectionSpec::new(
            "myserver",
            "mydb",
            crate::credentials::SqlCredentials {
                username: "reader".to_string(),
                password: "secret".to_string(),
            },
        );
        assert_eq!(spec.cache_key(), "myserver:mydb:reader");
    }
}
