use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::counters::CounterName;

/// One raw observation produced by a usage client. Immutable once built.
#[derive(Debug, Clone, PartialEq)]
pub struct UsageObject {
    pub counter: CounterName,
    pub timestamp: DateTime<Utc>,
    pub value: f64,
}

impl UsageObject {
    pub fn new(counter: CounterName, timestamp: DateTime<Utc>, value: f64) -> Self {
        Self {
            counter,
            timestamp,
            value,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataPoint {
    pub timestamp: DateTime<Utc>,
    pub value: f64,
}

/// One named line on a chart, points ordered by timestamp ascending.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeriesData {
    pub name: String,
    pub data_points: Vec<DataPoint>,
}

/// Top-level chart payload, constructed once per request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChartData {
    pub name: String,
    pub interval: Duration,
    pub series: Vec<SeriesData>,
}
