pub mod aggregate;
pub mod chart;
pub mod cloud;
pub mod counters;
pub mod credentials;
pub mod error;
pub mod filter;
pub mod logging;
pub mod metrics;
pub mod metrics_api;
pub mod models;
pub mod partition;
pub mod rest;
pub mod sql;
pub mod target;
pub mod websites;
pub mod window;

pub use chart::ChartDataFetcher;
pub use error::{ChartError, Result};
pub use models::{ChartData, DataPoint, SeriesData, UsageObject};
