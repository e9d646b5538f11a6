use regex::Regex;

use crate::error::{ChartError, Result};

/// Name filter over metric display names. A metric passes if any of the
/// patterns matches; patterns are plain regexes, anchor them explicitly
/// (`^CpuTime`) where prefix matching is intended.
#[derive(Debug, Clone)]
pub struct MetricsFilter {
    patterns: Vec<Regex>,
}

impl MetricsFilter {
    pub fn from_regexes<I, S>(patterns: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let patterns = patterns
            .into_iter()
            .map(|p| {
                Regex::new(p.as_ref())
                    .map_err(|e| ChartError::Internal(format!("bad metrics filter: {}", e)))
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(MetricsFilter { patterns })
    }

    pub fn matches(&self, metric_name: &str) -> bool {
        self.patterns.iter().any(|p| p.is_match(metric_name))
    }
}
