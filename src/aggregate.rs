//! Merging and series-shaping of flat usage samples.

use std::collections::BTreeMap;

use crate::models::{DataPoint, SeriesData, UsageObject};

/// Concatenates the server-wide stats with each per-database source. The
/// only overlap policy is the static column-exclusion list applied by the
/// server-wide client; no value-level dedup happens here.
pub fn merge_usages(
    master: Vec<UsageObject>,
    per_database: impl IntoIterator<Item = Vec<UsageObject>>,
) -> Vec<UsageObject> {
    let mut merged = master;
    for usages in per_database {
        merged.extend(usages);
    }
    merged
}

/// Groups samples into one series per key, points sorted by timestamp
/// ascending regardless of arrival order. `key_fn` returning `None` drops
/// the sample; `display_fn` turns the key into the series name.
pub fn group_into_series(
    usages: &[UsageObject],
    key_fn: impl Fn(&UsageObject) -> Option<String>,
    display_fn: impl Fn(&str) -> String,
) -> Vec<SeriesData> {
    let mut groups: BTreeMap<String, Vec<DataPoint>> = BTreeMap::new();
    for usage in usages {
        let Some(key) = key_fn(usage) else {
            continue;
        };
        groups.entry(key).or_default().push(DataPoint {
            timestamp: usage.timestamp,
            value: usage.value,
        });
    }

    groups
        .into_iter()
        .map(|(key, mut data_points)| {
            data_points.sort_by_key(|p| p.timestamp);
            SeriesData {
                name: display_fn(&key),
                data_points,
            }
        })
        .collect()
}
