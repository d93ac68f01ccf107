//! Aggregation engine
//!
//! Joins pod specs, node capacity and usage samples into per-node and
//! per-pod summaries. A single pass over the snapshot; records are built
//! from private accumulators and never modified afterwards.

mod records;


pub use records::{
    utilization, AnalysisReport, ClusterTotals, Diagnostic, NodeResourceRecord,
    PodResourceRecord, ResourceTally, WasteMetric,
};

use std::collections::{BTreeSet, HashMap};

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::{AnalysisError, Result};
use crate::extractor::{
    extract_resources, extract_usage, parse_field, sample_usage, InitContainerPolicy,
};
use crate::models::{ClusterSnapshot, MetricsState, NodeSnapshot, PodSnapshot, UsageIndex};
use crate::ownership::is_daemonset_pod;
use crate::quantity::{PerKind, Usage};

/// Label and value that mark a node as spot capacity
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpotSelector {
    pub label: String,
    pub value: String,
}

impl Default for SpotSelector {
    fn default() -> Self {
        Self {
            label: "eks.amazonaws.com/capacityType".to_string(),
            value: "SPOT".to_string(),
        }
    }
}

impl SpotSelector {
    pub fn matches(&self, node: &NodeSnapshot) -> bool {
        node.labels.get(&self.label) == Some(&self.value)
    }
}

/// Knobs for one analysis pass
#[derive(Debug, Clone, Default)]
pub struct AnalysisOptions {
    /// Restrict the pass to one node; pods elsewhere are never extracted
    pub node: Option<String>,
    pub init_containers: InitContainerPolicy,
    /// Emit per-pod records alongside node summaries
    pub pod_breakdown: bool,
    /// Tally DaemonSet pods separately and list them in the breakdown
    pub include_daemonsets: bool,
    /// Emit a diagnostic for every pod without a node
    pub report_unscheduled: bool,
    /// Only analyze pods whose phase is in this set
    pub phases: Option<BTreeSet<String>>,
    pub spot: Option<SpotSelector>,
}

impl AnalysisOptions {
    pub fn for_node(mut self, node: impl Into<String>) -> Self {
        self.node = Some(node.into());
        self
    }

    pub fn with_pod_breakdown(mut self) -> Self {
        self.pod_breakdown = true;
        self
    }

    pub fn with_daemonsets(mut self) -> Self {
        self.include_daemonsets = true;
        self
    }

    pub fn with_unscheduled(mut self) -> Self {
        self.report_unscheduled = true;
        self
    }

    pub fn with_init_containers(mut self, policy: InitContainerPolicy) -> Self {
        self.init_containers = policy;
        self
    }

    pub fn with_phases<I, S>(mut self, phases: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.phases = Some(phases.into_iter().map(Into::into).collect());
        self
    }

    pub fn with_spot(mut self, selector: SpotSelector) -> Self {
        self.spot = Some(selector);
        self
    }

    fn admits_phase(&self, pod: &PodSnapshot) -> bool {
        match &self.phases {
            Some(phases) => pod.phase().is_some_and(|phase| phases.contains(phase)),
            None => true,
        }
    }
}

/// Node state while pods are being folded in
struct NodeAccumulator<'a> {
    node: &'a NodeSnapshot,
    allocatable: PerKind<Option<u64>>,
    observed: PerKind<Usage>,
    tally: ResourceTally,
}

impl<'a> NodeAccumulator<'a> {
    fn new(node: &'a NodeSnapshot, usage: Option<&UsageIndex>) -> Result<Self> {
        let allocatable = PerKind::try_from_fn(|kind| {
            node.allocatable
                .get(kind.as_str())
                .map(|raw| parse_field(&node.name, None, "allocatable", kind, raw))
                .transpose()
        })?;

        let observed = match usage.and_then(|index| index.nodes.get(&node.name)) {
            Some(sample) => sample_usage(&node.name, None, sample)?,
            None => PerKind::new(Usage::Unknown, Usage::Unknown),
        };

        Ok(Self {
            node,
            allocatable,
            observed,
            tally: ResourceTally::empty(usage.is_some()),
        })
    }

    fn finish(self, spot: Option<&SpotSelector>) -> NodeResourceRecord {
        let tally = self.tally;
        let allocatable = self.allocatable;
        NodeResourceRecord {
            name: self.node.name.clone(),
            labels: self.node.labels.clone(),
            taints: self.node.taints.clone(),
            is_spot: spot.is_some_and(|selector| selector.matches(self.node)),
            allocatable,
            pod_count: tally.pod_count,
            requests: tally.requests,
            limits: tally.limits,
            usage: tally.usage,
            observed: self.observed,
            utilization: PerKind::from_fn(|kind| {
                utilization(*tally.requests.get(kind), *allocatable.get(kind))
            }),
            waste: tally.waste(),
        }
    }
}

/// Run one aggregation pass over a snapshot
pub fn analyze(snapshot: &ClusterSnapshot, options: &AnalysisOptions) -> Result<AnalysisReport> {
    let usage = snapshot.metrics.index();
    let mut diagnostics = Vec::new();
    if let MetricsState::Unavailable { reason } = &snapshot.metrics {
        diagnostics.push(Diagnostic::MetricsUnavailable {
            reason: reason.clone(),
        });
    }

    let target = options.node.as_deref();
    let mut accumulators = Vec::new();
    let mut slots: HashMap<&str, usize> = HashMap::new();
    for node in &snapshot.nodes {
        if target.is_some_and(|name| name != node.name) {
            continue;
        }
        if slots.contains_key(node.name.as_str()) {
            warn!(node = %node.name, "Node listed twice, keeping the first entry");
            diagnostics.push(Diagnostic::DuplicateNode {
                node: node.name.clone(),
            });
            continue;
        }
        slots.insert(node.name.as_str(), accumulators.len());
        accumulators.push(NodeAccumulator::new(node, usage)?);
    }
    if let Some(name) = target {
        if accumulators.is_empty() {
            return Err(AnalysisError::NodeNotFound(name.to_string()));
        }
    }

    let mut workload = ResourceTally::empty(usage.is_some());
    let mut daemonsets = options
        .include_daemonsets
        .then(|| ResourceTally::empty(usage.is_some()));
    let mut pods = Vec::new();

    for pod in &snapshot.pods {
        if !options.admits_phase(pod) {
            continue;
        }

        let Some(node_name) = pod.node_name.as_deref() else {
            if target.is_none() && options.report_unscheduled {
                diagnostics.push(Diagnostic::UnscheduledPod { pod: pod.key() });
            }
            continue;
        };

        if target.is_some_and(|name| name != node_name) {
            continue;
        }

        let Some(&slot) = slots.get(node_name) else {
            warn!(pod = %pod.key(), node = %node_name, "Pod bound to unknown node");
            diagnostics.push(Diagnostic::OrphanPod {
                pod: pod.key(),
                node: node_name.to_string(),
            });
            continue;
        };

        let daemonset = is_daemonset_pod(pod);
        if daemonset && !options.include_daemonsets {
            debug!(pod = %pod.key(), "Skipping DaemonSet pod");
            continue;
        }

        let key = pod.key();
        let resources = extract_resources(pod, options.init_containers)?;
        let pod_usage = match usage {
            Some(index) => match index.pods.get(&key) {
                Some(samples) => extract_usage(&key.to_string(), samples)?,
                None => PerKind::new(Usage::Unknown, Usage::Unknown),
            },
            None => PerKind::new(Usage::Unknown, Usage::Unknown),
        };

        let record = PodResourceRecord::new(key, node_name, daemonset, resources, pod_usage);
        match daemonsets.as_mut() {
            Some(tally) if daemonset => tally.add(&record),
            _ => {
                accumulators[slot].tally.add(&record);
                workload.add(&record);
            }
        }

        if options.pod_breakdown {
            pods.push(record);
        }
    }

    let nodes: Vec<NodeResourceRecord> = accumulators
        .into_iter()
        .map(|acc| acc.finish(options.spot.as_ref()))
        .collect();

    let allocatable = PerKind::from_fn(|kind| {
        nodes
            .iter()
            .filter_map(|node| *node.allocatable.get(kind))
            .fold(0u64, u64::saturating_add)
    });
    let totals = ClusterTotals {
        utilization: PerKind::from_fn(|kind| {
            utilization(*workload.requests.get(kind), Some(*allocatable.get(kind)))
        }),
        waste: workload.waste(),
        allocatable,
        workload,
        daemonsets,
    };

    debug!(
        nodes = nodes.len(),
        pods = totals.workload.pod_count,
        diagnostics = diagnostics.len(),
        "Aggregation pass complete"
    );

    Ok(AnalysisReport {
        nodes,
        pods: options.pod_breakdown.then_some(pods),
        diagnostics,
        totals,
        metrics_available: usage.is_some(),
        captured_at: snapshot.captured_at,
    })
}
