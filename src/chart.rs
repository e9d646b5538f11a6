//! Chart resolver: routes a parsed chart target to the right client chain
//! and assembles the final `ChartData` payload.

use chrono::Duration as ChronoDuration;
use rand::Rng;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

use crate::aggregate;
use crate::counters::CounterName;
use crate::cloud::CloudServiceUsageClient;
use crate::credentials::CredentialsProvider;
use crate::error::Result;
use crate::filter::MetricsFilter;
use crate::metrics::RequestTimer;
use crate::metrics_api::{CloudMetricsApi, WebsiteMetricsApi};
use crate::models::{ChartData, DataPoint, SeriesData};
use crate::partition::partition_by_instance_and_metric;
use crate::sql::{SqlConnectionFactory, SqlServerUsageClient, StatsCaches};
use crate::target::{
    ChartRequest, ChartTarget, CloudServiceCounterKind, CloudServiceRoleId, SqlCounterKind,
    WebsiteCounterKind, WebsiteId,
};
use crate::websites::WebsiteUsageClient;
use crate::window::QueryWindow;

pub struct ChartDataFetcher {
    credentials: Arc<dyn CredentialsProvider>,
    sql_factory: Arc<dyn SqlConnectionFactory>,
    cloud_api: Arc<dyn CloudMetricsApi>,
    website_api: Arc<dyn WebsiteMetricsApi>,
    caches: Arc<StatsCaches>,
}

impl ChartDataFetcher {
    pub fn new(
        credentials: Arc<dyn CredentialsProvider>,
        sql_factory: Arc<dyn SqlConnectionFactory>,
        cloud_api: Arc<dyn CloudMetricsApi>,
        website_api: Arc<dyn WebsiteMetricsApi>,
    ) -> Self {
        Self {
            credentials,
            sql_factory,
            cloud_api,
            website_api,
            caches: Arc::new(StatsCaches::new()),
        }
    }

    /// The version/permission caches, exposed so tests can invalidate them.
    pub fn caches(&self) -> &StatsCaches {
        &self.caches
    }

    pub async fn fetch_chart_data(&self, uri: &str) -> Result<ChartData> {
        let _timer = RequestTimer::new();

        let request = ChartRequest::parse(uri)?;
        let window = QueryWindow::ending_now(request.duration);
        info!(uri, from = %window.from, to = %window.to, "fetching chart data");

        match &request.target {
            ChartTarget::Dummy => Ok(dummy_chart(request.duration)),
            ChartTarget::SqlDatabase {
                server,
                database,
                counter,
            } => {
                self.sql_chart(server, database, *counter, &window, request.duration)
                    .await
            }
            ChartTarget::CloudService { role, counter } => {
                self.cloud_service_chart(role, *counter, &window, request.duration)
                    .await
            }
            ChartTarget::Website { site, counter } => {
                self.website_chart(site, *counter, &window, request.duration)
                    .await
            }
        }
    }

    async fn sql_chart(
        &self,
        server: &str,
        database: &str,
        counter: SqlCounterKind,
        window: &QueryWindow,
        interval: Duration,
    ) -> Result<ChartData> {
        let credentials = self.credentials.sql_credentials(server)?;
        let client = SqlServerUsageClient::new(
            Arc::clone(&self.sql_factory),
            server,
            credentials,
            Arc::clone(&self.caches),
        );

        let usages = client.get_usages(window.from).await?;

        let mut series = Vec::new();
        for metric in counter.metrics() {
            let mut data_points: Vec<DataPoint> = usages
                .iter()
                .filter(|u| match &u.counter {
                    CounterName::Sql(c) => c.database == database && c.metric == *metric,
                    _ => false,
                })
                .map(|u| DataPoint {
                    timestamp: u.timestamp,
                    value: u.value,
                })
                .collect();
            if data_points.is_empty() {
                continue;
            }
            data_points.sort_by_key(|p| p.timestamp);
            series.push(SeriesData {
                name: metric.to_string(),
                data_points,
            });
        }

        Ok(ChartData {
            name: format!("{}.{} {} (SQL Database)", server, database, counter.label()),
            interval,
            series,
        })
    }

    async fn cloud_service_chart(
        &self,
        role: &CloudServiceRoleId,
        counter: CloudServiceCounterKind,
        window: &QueryWindow,
        interval: Duration,
    ) -> Result<ChartData> {
        let (label, pattern, format_series_label) = match counter {
            CloudServiceCounterKind::Cpu => (
                "CPU",
                "CPU",
                (|instance: &str, _metric: &str| instance.to_string()) as fn(&str, &str) -> String,
            ),
            CloudServiceCounterKind::Disk => (
                "Disk performance",
                "Disk",
                (|instance: &str, metric: &str| format!("{} {}", instance, metric))
                    as fn(&str, &str) -> String,
            ),
            CloudServiceCounterKind::Network => (
                "Network traffic",
                "Network",
                (|instance: &str, metric: &str| format!("{} {} bytes", instance, metric))
                    as fn(&str, &str) -> String,
            ),
        };

        let credentials = self.credentials.subscription(&role.account)?;
        let client = CloudServiceUsageClient::new(Arc::clone(&self.cloud_api), credentials);
        let filter = MetricsFilter::from_regexes([pattern])?;

        let usages = client.get_usages(role, window, &filter).await?;
        let partitioned = partition_by_instance_and_metric(&usages);

        let mut series = Vec::new();
        for (instance, metrics) in &partitioned {
            for (metric, usages) in metrics {
                let mut data_points: Vec<DataPoint> = usages
                    .iter()
                    .map(|u| DataPoint {
                        timestamp: u.timestamp,
                        value: u.value,
                    })
                    .collect();
                data_points.sort_by_key(|p| p.timestamp);
                series.push(SeriesData {
                    name: format_series_label(instance, metric),
                    data_points,
                });
            }
        }

        Ok(ChartData {
            name: format!("{} {} (Cloud Service)", role.display_name(), label),
            interval,
            series,
        })
    }

    async fn website_chart(
        &self,
        site: &WebsiteId,
        counter: WebsiteCounterKind,
        window: &QueryWindow,
        interval: Duration,
    ) -> Result<ChartData> {
        let (what, patterns, strip_suffix): (&str, &[&str], Option<&str>) = match counter {
            WebsiteCounterKind::Requests => ("requests", &["^Http", "^Requests"], Some(".Count")),
            WebsiteCounterKind::Cpu => ("CPU", &["^CpuTime"], None),
            WebsiteCounterKind::Memory => {
                ("memory usage (bytes)", &["MemoryWorkingSet"], Some(".Bytes"))
            }
            WebsiteCounterKind::Traffic => (
                "traffic (bytes)",
                &["(^BytesSent|^BytesReceived)"],
                Some(".Bytes"),
            ),
            WebsiteCounterKind::ResponseTimes => (
                "response times (ms)",
                &["^AverageResponseTime"],
                Some(".Milliseconds"),
            ),
        };

        let credentials = self.credentials.subscription(&site.account)?;
        let client = WebsiteUsageClient::new(Arc::clone(&self.website_api), credentials);
        let filter = MetricsFilter::from_regexes(patterns.iter().copied())?;

        let usages = client.get_usages(site, window, &filter).await?;

        let series = aggregate::group_into_series(
            &usages,
            |u| Some(u.counter.encode()),
            |key| match strip_suffix {
                Some(suffix) => key.replace(suffix, ""),
                None => key.to_string(),
            },
        );

        Ok(ChartData {
            name: format!("{} {} (website)", site.site, what),
            interval,
            series,
        })
    }
}

/// Synthetic sine-plus-noise chart for demos and tests; never reachable for
/// real resource kinds.
fn dummy_chart(interval: Duration) -> ChartData {
    ChartData {
        name: "Dummy".to_string(),
        interval,
        series: vec![
            SeriesData {
                name: "200".to_string(),
                data_points: generate_dummy_points(interval, 40.0),
            },
            SeriesData {
                name: "all".to_string(),
                data_points: generate_dummy_points(interval, 50.0),
            },
        ],
    }
}

fn generate_dummy_points(period: Duration, magnitude: f64) -> Vec<DataPoint> {
    let window = QueryWindow::ending_now(period);
    let period_minutes = period.as_secs_f64() / 60.0;
    let mut rng = rand::rng();

    let mut points = Vec::new();
    let mut current = window.from;
    while current <= window.to {
        let elapsed_minutes = (current - window.from).num_seconds() as f64 / 60.0;
        let phase = 2.0 * std::f64::consts::PI * elapsed_minutes / period_minutes;
        points.push(DataPoint {
            timestamp: current,
            value: magnitude * (1.0 + rng.random::<f64>() + phase.sin()),
        });
        current += ChronoDuration::minutes(5);
    }
    points
}
