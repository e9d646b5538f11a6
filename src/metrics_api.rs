//! Opaque collaborators for the subscription-scoped metrics APIs, and the
//! raw value-set shape they return.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::credentials::SubscriptionCredentials;
use crate::error::Result;
use crate::filter::MetricsFilter;
use crate::target::{CloudServiceRoleId, WebsiteId};
use crate::window::QueryWindow;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricValue {
    pub timestamp: DateTime<Utc>,
    pub average: Option<f64>,
}

/// All values the metrics API reports for one metric over the window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricValueSet {
    pub name: String,
    pub unit: String,
    #[serde(default)]
    pub aggregation: String,
    pub values: Vec<MetricValue>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CloudServiceInstanceId {
    pub role: CloudServiceRoleId,
    pub instance: String,
}

#[async_trait]
pub trait CloudMetricsApi: Send + Sync {
    /// Live instances currently running the role.
    async fn list_instances(
        &self,
        credentials: &SubscriptionCredentials,
        role: &CloudServiceRoleId,
    ) -> Result<Vec<CloudServiceInstanceId>>;

    async fn metric_values(
        &self,
        credentials: &SubscriptionCredentials,
        instance: &CloudServiceInstanceId,
        window: &QueryWindow,
        filter: &MetricsFilter,
    ) -> Result<Vec<MetricValueSet>>;
}

#[async_trait]
pub trait WebsiteMetricsApi: Send + Sync {
    async fn metric_values(
        &self,
        credentials: &SubscriptionCredentials,
        site: &WebsiteId,
        window: &QueryWindow,
        filter: &MetricsFilter,
    ) -> Result<Vec<MetricValueSet>>;
}
