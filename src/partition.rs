//! Nested partitioning of multi-instance samples, instance first then
//! metric. Consumed by the chart resolver to build one series per
//! (instance, metric) pair.

use std::collections::BTreeMap;

use crate::counters::CounterName;
use crate::models::UsageObject;

pub type InstanceMetricPartition<'a> = BTreeMap<String, BTreeMap<String, Vec<&'a UsageObject>>>;

/// Groups cloud-service samples by instance identity, then metric identity.
/// Samples whose counter is not a cloud-service counter are ignored; the
/// maps keep key order deterministic.
pub fn partition_by_instance_and_metric(usages: &[UsageObject]) -> InstanceMetricPartition<'_> {
    let mut partition: InstanceMetricPartition = BTreeMap::new();
    for usage in usages {
        let CounterName::CloudService(counter) = &usage.counter else {
            continue;
        };
        partition
            .entry(counter.instance.clone())
            .or_default()
            .entry(counter.metric.clone())
            .or_default()
            .push(usage);
    }
    partition
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::counters::CloudServiceCounterName;
    use chrono::{TimeZone, Utc};
    use pretty_assertions::assert_eq;

    fn usage(instance: &str, metric: &str, value: f64) -> UsageObject {
        UsageObject::new(
            CounterName::CloudService(CloudServiceCounterName {
                service: "mysvc".to_string(),
                slot: "production".to_string(),
                role: "WebRole".to_string(),
                metric: metric.to_string(),
                unit: "Bytes".to_string(),
                aggregation: "Average".to_string(),
                instance: instance.to_string(),
            }),
            Utc.with_ymd_and_hms(2014, 7, 1, 10, 0, 0).unwrap(),
            value,
        )
    }

    #[test]
    fn partitions_instance_then_metric() {
        let usages = vec![
            usage("IN_0", "Network Out", 1.0),
            usage("IN_1", "Network Out", 2.0),
            usage("IN_0", "Network In", 3.0),
            usage("IN_0", "Network Out", 4.0),
        ];

        let partition = partition_by_instance_and_metric(&usages);

        assert_eq!(partition.len(), 2);
        assert_eq!(partition["IN_0"].len(), 2);
        assert_eq!(partition["IN_0"]["Network Out"].len(), 2);
        assert_eq!(partition["IN_1"]["Network Out"].len(), 1);
    }

    #[test]
    fn ignores_non_cloud_counters() {
        let usages = vec![UsageObject::new(
            CounterName::website("CpuTime", "Milliseconds"),
            Utc.with_ymd_and_hms(2014, 7, 1, 10, 0, 0).unwrap(),
            1.0,
        )];
        assert!(partition_by_instance_and_metric(&usages).is_empty());
    }
}
