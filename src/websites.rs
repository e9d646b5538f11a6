//! Usage client for websites: metric values for one webspace/site pair,
//! keyed `{metric}.{unit}`.

use std::sync::Arc;

use crate::counters::CounterName;
use crate::credentials::SubscriptionCredentials;
use crate::error::Result;
use crate::filter::MetricsFilter;
use crate::metrics_api::WebsiteMetricsApi;
use crate::models::UsageObject;
use crate::target::WebsiteId;
use crate::window::QueryWindow;

pub struct WebsiteUsageClient {
    api: Arc<dyn WebsiteMetricsApi>,
    credentials: SubscriptionCredentials,
}

impl WebsiteUsageClient {
    pub fn new(api: Arc<dyn WebsiteMetricsApi>, credentials: SubscriptionCredentials) -> Self {
        Self { api, credentials }
    }

    pub async fn get_usages(
        &self,
        site: &WebsiteId,
        window: &QueryWindow,
        filter: &MetricsFilter,
    ) -> Result<Vec<UsageObject>> {
        let value_sets = self
            .api
            .metric_values(&self.credentials, site, window, filter)
            .await?;

        let mut usages = Vec::new();
        for set in &value_sets {
            let mut values = set.values.clone();
            values.sort_by_key(|v| v.timestamp);
            for value in values {
                let Some(average) = value.average else {
                    continue;
                };
                usages.push(UsageObject::new(
                    CounterName::website(&set.name, &set.unit),
                    value.timestamp,
                    average,
                ));
            }
        }
        Ok(usages)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics_api::{MetricValue, MetricValueSet};
    use async_trait::async_trait;
    use chrono::{TimeZone, Utc};
    use pretty_assertions::assert_eq;

    struct FakeApi;

    #[async_trait]
    impl WebsiteMetricsApi for FakeApi {
        async fn metric_values(
            &self,
            _credentials: &SubscriptionCredentials,
            _site: &WebsiteId,
            _window: &QueryWindow,
            filter: &MetricsFilter,
        ) -> Result<Vec<MetricValueSet>> {
            let all = vec![
                MetricValueSet {
                    name: "CpuTime".to_string(),
                    unit: "Milliseconds".to_string(),
                    aggregation: String::new(),
                    values: vec![
                        MetricValue {
                            timestamp: Utc.with_ymd_and_hms(2014, 7, 1, 10, 30, 0).unwrap(),
                            average: Some(220.0),
                        },
                        MetricValue {
                            timestamp: Utc.with_ymd_and_hms(2014, 7, 1, 10, 0, 0).unwrap(),
                            average: Some(180.0),
                        },
                    ],
                },
                MetricValueSet {
                    name: "Http2xx".to_string(),
                    unit: "Count".to_string(),
                    aggregation: String::new(),
                    values: vec![MetricValue {
                        timestamp: Utc.with_ymd_and_hms(2014, 7, 1, 10, 0, 0).unwrap(),
                        average: Some(41.0),
                    }],
                },
            ];
            Ok(all
                .into_iter()
                .filter(|set| filter.matches(&set.name))
                .collect())
        }
    }

    fn site() -> WebsiteId {
        WebsiteId {
            account: "acct".to_string(),
            webspace: "westeurope".to_string(),
            site: "mysite".to_string(),
        }
    }

    #[tokio::test]
    async fn filters_and_orders_metric_values() {
        let client = WebsiteUsageClient::new(
            Arc::new(FakeApi),
            SubscriptionCredentials {
                subscription_id: "sub".to_string(),
                api_key: "key".to_string(),
            },
        );
        let window = QueryWindow::ending_now(std::time::Duration::from_secs(3600));
        let filter = MetricsFilter::from_regexes(["^CpuTime"]).unwrap();

        let usages = client.get_usages(&site(), &window, &filter).await.unwrap();

        assert_eq!(usages.len(), 2);
        assert_eq!(usages[0].counter.encode(), "CpuTime.Milliseconds");
        assert!(usages[0].timestamp < usages[1].timestamp);
        assert_eq!(usages[0].value, 180.0);
    }
}
