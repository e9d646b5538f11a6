//! Usage client for cloud service roles: lists live instances, then fetches
//! matching metrics for every instance concurrently.

use futures::future::join_all;
use std::sync::Arc;
use tracing::error;

use crate::counters::{CloudServiceCounterName, CounterName};
use crate::credentials::SubscriptionCredentials;
use crate::error::Result;
use crate::filter::MetricsFilter;
use crate::metrics;
use crate::metrics_api::{CloudMetricsApi, CloudServiceInstanceId, MetricValueSet};
use crate::models::UsageObject;
use crate::target::CloudServiceRoleId;
use crate::window::QueryWindow;

pub struct CloudServiceUsageClient {
    api: Arc<dyn CloudMetricsApi>,
    credentials: SubscriptionCredentials,
}

impl CloudServiceUsageClient {
    pub fn new(api: Arc<dyn CloudMetricsApi>, credentials: SubscriptionCredentials) -> Self {
        Self { api, credentials }
    }

    /// Samples for every (instance, metric) pair matching `filter`. An
    /// instance whose fetch fails is logged and dropped; the other
    /// instances still chart.
    pub async fn get_usages(
        &self,
        role: &CloudServiceRoleId,
        window: &QueryWindow,
        filter: &MetricsFilter,
    ) -> Result<Vec<UsageObject>> {
        let instances = self.api.list_instances(&self.credentials, role).await?;

        let fetches = instances.iter().map(|instance| async move {
            let result = self
                .api
                .metric_values(&self.credentials, instance, window, filter)
                .await;
            (instance, result)
        });

        let mut usages = Vec::new();
        for (instance, result) in join_all(fetches).await {
            match result {
                Ok(value_sets) => collect_instance_usages(instance, &value_sets, &mut usages),
                Err(e) => {
                    error!(
                        instance = %instance.instance,
                        role = %instance.role.display_name(),
                        error = %e,
                        "metrics fetch for instance failed"
                    );
                    metrics::record_source_failure("cloud-service-metrics");
                }
            }
        }
        Ok(usages)
    }
}

fn collect_instance_usages(
    instance: &CloudServiceInstanceId,
    value_sets: &[MetricValueSet],
    usages: &mut Vec<UsageObject>,
) {
    for set in value_sets {
        for value in &set.values {
            let Some(average) = value.average else {
                continue;
            };
            usages.push(UsageObject::new(
                CounterName::CloudService(CloudServiceCounterName {
                    service: instance.role.service.clone(),
                    slot: instance.role.slot.clone(),
                    role: instance.role.role.clone(),
                    metric: set.name.clone(),
                    unit: set.unit.clone(),
                    aggregation: set.aggregation.clone(),
                    instance: instance.instance.clone(),
                }),
                value.timestamp,
                average,
            ));
        }
    }
}
