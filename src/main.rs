use std::env;
use std::sync::Arc;
use url::Url;

use azure_usage_charts::{
    chart::ChartDataFetcher,
    credentials::{StaticCredentials, SubscriptionCredentials},
    logging, metrics,
    rest::RestMetricsClient,
    sql::connection::UnconfiguredSqlFactory,
};

#[tokio::main]
async fn main() {
    logging::init_logger();
    metrics::init_metrics();

    let uri = match env::args().nth(1).or_else(|| env::var("CHART_URI").ok()) {
        Some(uri) => uri,
        None => {
            eprintln!("usage: chart-fetch <chart-uri>  (e.g. dummy://demo?interval=1&unit=hours)");
            std::process::exit(1);
        }
    };

    // SQL charts need a live driver wired in as the connection factory; the
    // demo binary only serves the dummy and subscription chart kinds.
    let mut credentials = StaticCredentials::new();
    if let (Ok(account), Ok(subscription_id), Ok(api_key)) = (
        env::var("SUBSCRIPTION_ACCOUNT"),
        env::var("SUBSCRIPTION_ID"),
        env::var("METRICS_API_KEY"),
    ) {
        credentials = credentials.with_subscription(
            account,
            SubscriptionCredentials {
                subscription_id,
                api_key,
            },
        );
    }

    let endpoint = env::var("METRICS_ENDPOINT")
        .unwrap_or_else(|_| "http://localhost:8080/api".to_string());
    let endpoint = Url::parse(&endpoint).expect("METRICS_ENDPOINT must be a valid url");
    let metrics_client =
        Arc::new(RestMetricsClient::new(endpoint).expect("failed to build metrics client"));

    let fetcher = ChartDataFetcher::new(
        Arc::new(credentials),
        Arc::new(UnconfiguredSqlFactory),
        metrics_client.clone(),
        metrics_client,
    );

    match fetcher.fetch_chart_data(&uri).await {
        Ok(chart) => {
            let json = serde_json::to_string_pretty(&chart).expect("chart serializes");
            println!("{}", json);
        }
        Err(e) => {
            eprintln!("{}", e);
            std::process::exit(if e.is_input_error() { 2 } else { 1 });
        }
    }
}
