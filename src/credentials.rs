//! Credential lookup for the backends. Storage of credentials is the
//! caller's concern; the core only asks for them by account / server key.

use std::collections::HashMap;

use crate::error::{ChartError, Result};

#[derive(Debug, Clone)]
pub struct SqlCredentials {
    pub username: String,
    pub password: String,
}

/// Material for the subscription-scoped metrics APIs (cloud services,
/// websites): the endpoint to talk to and an opaque access key.
#[derive(Debug, Clone)]
pub struct SubscriptionCredentials {
    pub subscription_id: String,
    pub api_key: String,
}

pub trait CredentialsProvider: Send + Sync {
    fn sql_credentials(&self, server: &str) -> Result<SqlCredentials>;
    fn subscription(&self, account: &str) -> Result<SubscriptionCredentials>;
}

/// In-memory provider, used by tests and the demo binary.
#[derive(Debug, Default)]
pub struct StaticCredentials {
    sql: HashMap<String, SqlCredentials>,
    subscriptions: HashMap<String, SubscriptionCredentials>,
}

impl StaticCredentials {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_sql(mut self, server: impl Into<String>, credentials: SqlCredentials) -> Self {
        self.sql.insert(server.into(), credentials);
        self
    }

    pub fn with_subscription(
        mut self,
        account: impl Into<String>,
        credentials: SubscriptionCredentials,
    ) -> Self {
        self.subscriptions.insert(account.into(), credentials);
        self
    }
}

impl CredentialsProvider for StaticCredentials {
    fn sql_credentials(&self, server: &str) -> Result<SqlCredentials> {
        self.sql
            .get(server)
            .cloned()
            .ok_or_else(|| ChartError::Credentials(format!("no SQL credentials for {}", server)))
    }

    fn subscription(&self, account: &str) -> Result<SubscriptionCredentials> {
        self.subscriptions.get(account).cloned().ok_or_else(|| {
            ChartError::Credentials(format!("no subscription configured for {}", account))
        })
    }
}
