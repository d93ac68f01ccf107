//! Output records produced by the aggregation pass

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeMap;

use crate::extractor::ExtractedResources;
use crate::models::{PodKey, Taint};
use crate::quantity::{Accumulate, Limit, PerKind, ResourceKind, Usage};

/// Request-minus-usage for one resource kind
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct WasteMetric {
    /// `requested - usage`, negative when usage exceeds the request;
    /// `None` when usage is unknown
    pub amount: Option<i64>,
    /// Waste as a percentage of the request; `None` when not applicable
    pub percent: Option<f64>,
}

impl WasteMetric {
    pub fn compute(requested: u64, usage: Usage) -> Self {
        let Usage::Known(used) = usage else {
            return Self::not_applicable();
        };

        let difference = i128::from(requested) - i128::from(used);
        let amount = i64::try_from(difference)
            .unwrap_or(if difference.is_negative() { i64::MIN } else { i64::MAX });

        let percent = (requested > 0).then(|| difference as f64 / requested as f64 * 100.0);

        Self {
            amount: Some(amount),
            percent,
        }
    }

    pub fn not_applicable() -> Self {
        Self {
            amount: None,
            percent: None,
        }
    }

    /// Usage above the request
    pub fn is_under_provisioned(&self) -> bool {
        self.amount.is_some_and(|amount| amount < 0)
    }
}

/// `requested / allocatable` as a percentage; `None` when capacity is zero or unknown
pub fn utilization(requested: u64, allocatable: Option<u64>) -> Option<f64> {
    match allocatable {
        Some(capacity) if capacity > 0 => Some(requested as f64 / capacity as f64 * 100.0),
        _ => None,
    }
}

/// Running per-kind sums over a set of pods
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResourceTally {
    pub pod_count: usize,
    pub requests: PerKind<u64>,
    pub limits: PerKind<Limit>,
    pub usage: PerKind<Usage>,
}

impl ResourceTally {
    /// An empty tally; usage starts unknown when no metrics source exists
    pub fn empty(metrics_available: bool) -> Self {
        let usage = if metrics_available {
            Usage::zero()
        } else {
            Usage::Unknown
        };
        Self {
            pod_count: 0,
            requests: PerKind::zero(),
            limits: PerKind::zero(),
            usage: PerKind::new(usage, usage),
        }
    }

    pub fn add(&mut self, pod: &PodResourceRecord) {
        self.pod_count += 1;
        self.requests = self.requests.accumulate(pod.requests);
        self.limits = self.limits.accumulate(pod.limits);
        self.usage = self.usage.accumulate(pod.usage);
    }

    pub fn waste(&self) -> PerKind<WasteMetric> {
        PerKind::from_fn(|kind| {
            WasteMetric::compute(*self.requests.get(kind), *self.usage.get(kind))
        })
    }
}

/// Per-pod resource summary
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PodResourceRecord {
    pub namespace: String,
    pub name: String,
    pub node: String,
    pub daemonset: bool,
    pub requests: PerKind<u64>,
    pub limits: PerKind<Limit>,
    pub usage: PerKind<Usage>,
    pub waste: PerKind<WasteMetric>,
}

impl PodResourceRecord {
    pub fn new(
        key: PodKey,
        node: &str,
        daemonset: bool,
        resources: ExtractedResources,
        usage: PerKind<Usage>,
    ) -> Self {
        let waste = PerKind::from_fn(|kind| {
            WasteMetric::compute(*resources.requests.get(kind), *usage.get(kind))
        });
        Self {
            namespace: key.namespace,
            name: key.name,
            node: node.to_string(),
            daemonset,
            requests: resources.requests,
            limits: resources.limits,
            usage,
            waste,
        }
    }

    pub fn key(&self) -> PodKey {
        PodKey::new(self.namespace.clone(), self.name.clone())
    }
}

/// Per-node resource summary over non-DaemonSet pods
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NodeResourceRecord {
    pub name: String,
    pub labels: BTreeMap<String, String>,
    pub taints: Vec<Taint>,
    pub is_spot: bool,
    /// Allocatable capacity; `None` when the node does not declare it
    pub allocatable: PerKind<Option<u64>>,
    pub pod_count: usize,
    pub requests: PerKind<u64>,
    pub limits: PerKind<Limit>,
    /// Sum of pod usage; unknown if any counted pod lacks a sample
    pub usage: PerKind<Usage>,
    /// Whole-node usage reported by metrics-server, system pods included
    pub observed: PerKind<Usage>,
    /// Requests as a percentage of allocatable
    pub utilization: PerKind<Option<f64>>,
    pub waste: PerKind<WasteMetric>,
}

impl NodeResourceRecord {
    pub fn label(&self, key: &str) -> Option<&str> {
        self.labels.get(key).map(String::as_str)
    }

    pub fn request(&self, kind: ResourceKind) -> u64 {
        *self.requests.get(kind)
    }
}

/// Cluster-wide tallies
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClusterTotals {
    /// Non-DaemonSet pods on known nodes
    pub workload: ResourceTally,
    /// Sum of declared allocatable capacity across reported nodes
    pub allocatable: PerKind<u64>,
    pub utilization: PerKind<Option<f64>>,
    pub waste: PerKind<WasteMetric>,
    /// DaemonSet pods, only when DaemonSet visibility was requested
    pub daemonsets: Option<ResourceTally>,
}

/// Informational conditions found while aggregating
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Diagnostic {
    /// Pod bound to a node missing from the node list
    OrphanPod { pod: PodKey, node: String },
    /// Pod without a node assignment
    UnscheduledPod { pod: PodKey },
    /// Usage samples missing for the whole run
    MetricsUnavailable { reason: String },
    /// Node name listed more than once; only the first entry is analyzed
    DuplicateNode { node: String },
}

/// Everything one analysis pass produces
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnalysisReport {
    pub nodes: Vec<NodeResourceRecord>,
    /// Present when a per-pod breakdown was requested
    pub pods: Option<Vec<PodResourceRecord>>,
    pub diagnostics: Vec<Diagnostic>,
    pub totals: ClusterTotals,
    pub metrics_available: bool,
    pub captured_at: DateTime<Utc>,
}

impl AnalysisReport {
    pub fn node(&self, name: &str) -> Option<&NodeResourceRecord> {
        self.nodes.iter().find(|node| node.name == name)
    }

    pub fn pods_on<'a>(
        &'a self,
        node: &'a str,
    ) -> impl Iterator<Item = &'a PodResourceRecord> + 'a {
        self.pods
            .iter()
            .flatten()
            .filter(move |pod| pod.node == node)
    }

    pub fn orphans(&self) -> impl Iterator<Item = &Diagnostic> {
        self.diagnostics
            .iter()
            .filter(|d| matches!(d, Diagnostic::OrphanPod { .. }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_waste_over_provisioned() {
        let waste = WasteMetric::compute(1000, Usage::Known(250));
        assert_eq!(waste.amount, Some(750));
        assert_eq!(waste.percent, Some(75.0));
        assert!(!waste.is_under_provisioned());
    }

    #[test]
    fn test_negative_waste_is_under_provisioning() {
        let waste = WasteMetric::compute(100, Usage::Known(150));
        assert_eq!(waste.amount, Some(-50));
        assert_eq!(waste.percent, Some(-50.0));
        assert!(waste.is_under_provisioned());
    }

    #[test]
    fn test_zero_request_percent_not_applicable() {
        let waste = WasteMetric::compute(0, Usage::Known(10));
        assert_eq!(waste.amount, Some(-10));
        assert_eq!(waste.percent, None);

        let waste = WasteMetric::compute(0, Usage::Known(0));
        assert_eq!(waste.percent, None);
    }

    #[test]
    fn test_unknown_usage_is_not_applicable() {
        assert_eq!(
            WasteMetric::compute(500, Usage::Unknown),
            WasteMetric::not_applicable()
        );
    }

    #[test]
    fn test_utilization() {
        assert_eq!(utilization(2000, Some(4000)), Some(50.0));
        assert_eq!(utilization(2000, Some(0)), None);
        assert_eq!(utilization(2000, None), None);
    }

    #[test]
    fn test_empty_tally_usage_depends_on_metrics() {
        assert_eq!(ResourceTally::empty(true).usage.cpu, Usage::Known(0));
        assert_eq!(ResourceTally::empty(false).usage.cpu, Usage::Unknown);
    }
}
