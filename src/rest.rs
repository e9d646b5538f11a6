//! `reqwest` implementation of the metrics API collaborators, talking to a
//! JSON metrics endpoint (the companion service that fronts the Azure
//! management APIs).

use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;
use url::Url;

use crate::credentials::SubscriptionCredentials;
use crate::error::{ChartError, Result};
use crate::filter::MetricsFilter;
use crate::metrics_api::{
    CloudMetricsApi, CloudServiceInstanceId, MetricValueSet, WebsiteMetricsApi,
};
use crate::target::{CloudServiceRoleId, WebsiteId};
use crate::window::QueryWindow;

pub struct RestMetricsClient {
    http: Client,
    base: Url,
}

impl RestMetricsClient {
    pub fn new(base: Url) -> Result<Self> {
        let http = Client::builder()
            .timeout(Duration::from_secs(60))
            .build()?;
        Ok(Self { http, base })
    }

    fn endpoint(&self, segments: &[&str]) -> Result<Url> {
        let mut url = self.base.clone();
        url.path_segments_mut()
            .map_err(|_| ChartError::Internal(format!("metrics endpoint {} cannot be a base", self.base)))?
            .extend(segments);
        Ok(url)
    }

    async fn fetch_value_sets(
        &self,
        credentials: &SubscriptionCredentials,
        url: Url,
        window: &QueryWindow,
        filter: &MetricsFilter,
    ) -> Result<Vec<MetricValueSet>> {
        let from = window.from.to_rfc3339();
        let to = window.to.to_rfc3339();
        let value_sets: Vec<MetricValueSet> = self
            .http
            .get(url)
            .bearer_auth(&credentials.api_key)
            .query(&[
                ("subscription", credentials.subscription_id.as_str()),
                ("from", from.as_str()),
                ("to", to.as_str()),
            ])
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        Ok(value_sets
            .into_iter()
            .filter(|set| filter.matches(&set.name))
            .collect())
    }
}

#[async_trait]
impl CloudMetricsApi for RestMetricsClient {
    async fn list_instances(
        &self,
        credentials: &SubscriptionCredentials,
        role: &CloudServiceRoleId,
    ) -> Result<Vec<CloudServiceInstanceId>> {
        let url = self.endpoint(&[
            "cloud-services",
            &role.service,
            &role.slot,
            &role.role,
            "instances",
        ])?;

        let instances: Vec<String> = self
            .http
            .get(url)
            .bearer_auth(&credentials.api_key)
            .query(&[("subscription", credentials.subscription_id.as_str())])
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        Ok(instances
            .into_iter()
            .map(|instance| CloudServiceInstanceId {
                role: role.clone(),
                instance,
            })
            .collect())
    }

    async fn metric_values(
        &self,
        credentials: &SubscriptionCredentials,
        instance: &CloudServiceInstanceId,
        window: &QueryWindow,
        filter: &MetricsFilter,
    ) -> Result<Vec<MetricValueSet>> {
        let url = self.endpoint(&[
            "cloud-services",
            &instance.role.service,
            &instance.role.slot,
            &instance.role.role,
            "instances",
            &instance.instance,
            "metrics",
        ])?;
        self.fetch_value_sets(credentials, url, window, filter).await
    }
}

#[async_trait]
impl WebsiteMetricsApi for RestMetricsClient {
    async fn metric_values(
        &self,
        credentials: &SubscriptionCredentials,
        site: &WebsiteId,
        window: &QueryWindow,
        filter: &MetricsFilter,
    ) -> Result<Vec<MetricValueSet>> {
        let url = self.endpoint(&["webspaces", &site.webspace, "sites", &site.site, "metrics"])?;
        self.fetch_value_sets(credentials, url, window, filter).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn builds_instance_metrics_url_with_encoded_segments() {
        let client = RestMetricsClient::new(Url::parse("https://metrics.example.com/api").unwrap())
            .unwrap();
        let url = client
            .endpoint(&["cloud-services", "my svc", "production", "WebRole", "instances"])
            .unwrap();
        assert_eq!(
            url.as_str(),
            "https://metrics.example.com/api/cloud-services/my%20svc/production/WebRole/instances"
        );
    }
}
