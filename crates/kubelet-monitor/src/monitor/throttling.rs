//! CPU throttling correlation
//!
//! The node agent reports CFS periods and throttled periods as two
//! separate counter families. Each point carries container identity in
//! its labels; joining the two on that identity yields per-container
//! throttling counters.

use super::stats::{CounterFamily, CounterKind};
use std::collections::HashMap;
use tracing::warn;

/// Family counting every CFS enforcement period
pub const CONTAINER_CPU_TOTAL: &str = "container_cpu_cfs_periods_total";
/// Family counting throttled CFS enforcement periods
pub const CONTAINER_CPU_THROTTLED_TOTAL: &str = "container_cpu_cfs_throttled_periods_total";

/// Counters joined for one container
///
/// Either side may be missing when only one family reported the
/// container.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ThrottlingMetric {
    pub cpu_throttled: Option<f64>,
    pub cpu_total: Option<f64>,
}

impl ThrottlingMetric {
    /// Both counters, when both families reported the container
    pub fn complete(&self) -> Option<(f64, f64)> {
        Some((self.cpu_throttled?, self.cpu_total?))
    }
}

/// Container identity `namespace/pod/container` from a label set
///
/// Returns `None` for pod-scoped points, which carry no container label.
pub fn container_identity(labels: &HashMap<String, String>) -> Option<String> {
    let lookup = |names: &[&str]| {
        names
            .iter()
            .filter_map(|n| labels.get(*n))
            .map(String::as_str)
            .find(|v| !v.is_empty())
            .unwrap_or_default()
    };

    let name = lookup(&["container", "container_name"]);
    if name.is_empty() {
        return None;
    }
    let namespace = lookup(&["namespace"]);
    let pod = lookup(&["pod", "pod_name"]);

    Some(format!("{}/{}/{}", namespace, pod, name))
}

/// Join the periods and throttled-periods families by container identity
///
/// Families other than the two throttling families are ignored. A family
/// that is not a counter stops the correlation and whatever was joined so
/// far is returned.
pub fn correlate(families: &HashMap<String, CounterFamily>) -> HashMap<String, ThrottlingMetric> {
    let mut parsed: HashMap<String, ThrottlingMetric> = HashMap::new();

    for (family_name, family) in families {
        if family.kind != CounterKind::Counter {
            warn!(
                family = %family_name,
                kind = ?family.kind,
                "Expected counter metrics while parsing throttling metrics"
            );
            return parsed;
        }

        let is_total = match family_name.as_str() {
            CONTAINER_CPU_TOTAL => true,
            CONTAINER_CPU_THROTTLED_TOTAL => false,
            _ => continue,
        };

        for point in &family.points {
            let Some(identity) = container_identity(&point.labels) else {
                continue;
            };
            let metric = parsed.entry(identity).or_default();
            if is_total {
                metric.cpu_total = Some(point.value);
            } else {
                metric.cpu_throttled = Some(point.value);
            }
        }
    }

    parsed
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::monitor::stats::CounterPoint;

    fn families(entries: Vec<(&str, CounterFamily)>) -> HashMap<String, CounterFamily> {
        entries
            .into_iter()
            .map(|(name, family)| (name.to_string(), family))
            .collect()
    }

    #[test]
    fn test_correlate_joins_families() {
        let labels = [("container", "c"), ("namespace", "ns"), ("pod", "p")];
        let input = families(vec![
            (
                CONTAINER_CPU_TOTAL,
                CounterFamily::counter(vec![CounterPoint::new(labels, 10.0)]),
            ),
            (
                CONTAINER_CPU_THROTTLED_TOTAL,
                CounterFamily::counter(vec![CounterPoint::new(labels, 5.0)]),
            ),
        ]);

        let parsed = correlate(&input);
        assert_eq!(parsed.len(), 1);
        let metric = parsed["ns/p/c"];
        assert_eq!(metric.cpu_throttled, Some(5.0));
        assert_eq!(metric.cpu_total, Some(10.0));
        assert_eq!(metric.complete(), Some((5.0, 10.0)));
    }

    #[test]
    fn test_pod_scoped_points_skipped() {
        let input = families(vec![(
            CONTAINER_CPU_TOTAL,
            CounterFamily::counter(vec![
                CounterPoint::new([("namespace", "ns"), ("pod", "p")], 40.0),
                CounterPoint::new([("container", ""), ("namespace", "ns"), ("pod", "p")], 40.0),
            ]),
        )]);

        assert!(correlate(&input).is_empty());
    }

    #[test]
    fn test_legacy_label_names() {
        let input = families(vec![(
            CONTAINER_CPU_THROTTLED_TOTAL,
            CounterFamily::counter(vec![CounterPoint::new(
                [
                    ("container_name", "app"),
                    ("namespace", "default"),
                    ("pod_name", "api-1"),
                ],
                3.0,
            )]),
        )]);

        let parsed = correlate(&input);
        let metric = parsed["default/api-1/app"];
        assert_eq!(metric.cpu_throttled, Some(3.0));
        assert_eq!(metric.cpu_total, None);
        assert_eq!(metric.complete(), None);
    }

    #[test]
    fn test_empty_container_label_falls_back_to_legacy_name() {
        let labels: HashMap<String, String> = [
            ("container", ""),
            ("container_name", "app"),
            ("namespace", "ns"),
            ("pod", "p"),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();

        assert_eq!(container_identity(&labels).as_deref(), Some("ns/p/app"));
    }

    #[test]
    fn test_unknown_family_ignored() {
        let input = families(vec![(
            "container_cpu_usage_seconds_total",
            CounterFamily::counter(vec![CounterPoint::new(
                [("container", "c"), ("namespace", "ns"), ("pod", "p")],
                99.0,
            )]),
        )]);

        assert!(correlate(&input).is_empty());
    }

    #[test]
    fn test_non_counter_family_stops_correlation() {
        let input = families(vec![(
            CONTAINER_CPU_TOTAL,
            CounterFamily {
                kind: CounterKind::Gauge,
                points: vec![CounterPoint::new(
                    [("container", "c"), ("namespace", "ns"), ("pod", "p")],
                    10.0,
                )],
            },
        )]);

        assert!(correlate(&input).is_empty());
    }

    #[test]
    fn test_container_identity_precedence() {
        let labels: HashMap<String, String> = [
            ("container", "primary"),
            ("container_name", "legacy"),
            ("namespace", "ns"),
            ("pod", "p"),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();

        assert_eq!(container_identity(&labels).as_deref(), Some("ns/p/primary"));
    }
}
