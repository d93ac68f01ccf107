//! Snapshot input models
//!
//! Plain data handed to the engine by a [`crate::source::SnapshotSource`].
//! Quantities stay as raw strings here; they are parsed during extraction so
//! that pods excluded from an analysis are never touched.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fmt;

/// Owner reference kind that marks a pod as DaemonSet-managed
pub const DAEMONSET_KIND: &str = "DaemonSet";

/// Namespace-qualified pod identity
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PodKey {
    pub namespace: String,
    pub name: String,
}

impl PodKey {
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            name: name.into(),
        }
    }
}

impl fmt::Display for PodKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.namespace, self.name)
    }
}

/// Controller reference on a pod
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OwnerReference {
    pub kind: String,
    pub name: String,
}

/// Declared resources of one container, quantities unparsed
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContainerSpec {
    pub name: String,
    pub requests: BTreeMap<String, String>,
    pub limits: BTreeMap<String, String>,
}

impl ContainerSpec {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn with_request(mut self, resource: &str, quantity: &str) -> Self {
        self.requests.insert(resource.to_string(), quantity.to_string());
        self
    }

    pub fn with_limit(mut self, resource: &str, quantity: &str) -> Self {
        self.limits.insert(resource.to_string(), quantity.to_string());
        self
    }
}

/// Status fields consumed by the status filter
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PodStatusSummary {
    /// Pod phase (Running, Pending, Failed, ...)
    pub phase: Option<String>,
    /// Waiting/terminated reasons of init containers, in status order
    pub init_container_reasons: Vec<String>,
    /// Waiting/terminated reasons of regular containers, in status order
    pub container_reasons: Vec<String>,
    /// Restart count summed over regular containers
    pub restarts: u32,
}

/// A pod as seen in the snapshot
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PodSnapshot {
    pub namespace: String,
    pub name: String,
    /// Assigned node; `None` while the pod is unscheduled
    pub node_name: Option<String>,
    pub owners: Vec<OwnerReference>,
    pub containers: Vec<ContainerSpec>,
    pub init_containers: Vec<ContainerSpec>,
    pub status: PodStatusSummary,
}

impl PodSnapshot {
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            name: name.into(),
            node_name: None,
            owners: Vec::new(),
            containers: Vec::new(),
            init_containers: Vec::new(),
            status: PodStatusSummary::default(),
        }
    }

    pub fn key(&self) -> PodKey {
        PodKey::new(self.namespace.clone(), self.name.clone())
    }

    pub fn on_node(mut self, node: impl Into<String>) -> Self {
        self.node_name = Some(node.into());
        self
    }

    pub fn owned_by(mut self, kind: impl Into<String>, name: impl Into<String>) -> Self {
        self.owners.push(OwnerReference {
            kind: kind.into(),
            name: name.into(),
        });
        self
    }

    pub fn with_container(mut self, container: ContainerSpec) -> Self {
        self.containers.push(container);
        self
    }

    pub fn with_init_container(mut self, container: ContainerSpec) -> Self {
        self.init_containers.push(container);
        self
    }

    pub fn with_phase(mut self, phase: impl Into<String>) -> Self {
        self.status.phase = Some(phase.into());
        self
    }

    pub fn phase(&self) -> Option<&str> {
        self.status.phase.as_deref()
    }
}

/// Node taint, kept for display
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Taint {
    pub key: String,
    pub value: Option<String>,
    pub effect: String,
}

impl fmt::Display for Taint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.value {
            Some(value) => write!(f, "{}={}:{}", self.key, value, self.effect),
            None => write!(f, "{}:{}", self.key, self.effect),
        }
    }
}

/// A node as seen in the snapshot
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeSnapshot {
    pub name: String,
    pub labels: BTreeMap<String, String>,
    pub taints: Vec<Taint>,
    /// Allocatable capacity keyed by resource name, quantities unparsed
    pub allocatable: BTreeMap<String, String>,
}

impl NodeSnapshot {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn with_allocatable(mut self, resource: &str, quantity: &str) -> Self {
        self.allocatable
            .insert(resource.to_string(), quantity.to_string());
        self
    }

    pub fn with_label(mut self, key: &str, value: &str) -> Self {
        self.labels.insert(key.to_string(), value.to_string());
        self
    }
}

/// Usage of one container (or a whole node) from metrics-server
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContainerUsage {
    pub name: String,
    pub cpu: String,
    pub memory: String,
}

impl ContainerUsage {
    pub fn new(name: impl Into<String>, cpu: impl Into<String>, memory: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            cpu: cpu.into(),
            memory: memory.into(),
        }
    }
}

/// Usage samples keyed by pod and by node
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UsageIndex {
    pub pods: HashMap<PodKey, Vec<ContainerUsage>>,
    pub nodes: HashMap<String, ContainerUsage>,
}

impl UsageIndex {
    pub fn insert_pod(&mut self, key: PodKey, containers: Vec<ContainerUsage>) {
        self.pods.insert(key, containers);
    }

    pub fn insert_node(&mut self, node: impl Into<String>, usage: ContainerUsage) {
        self.nodes.insert(node.into(), usage);
    }
}

/// Whether usage samples could be obtained for this snapshot
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MetricsState {
    Available(UsageIndex),
    Unavailable { reason: String },
    /// The caller did not ask for usage; nothing is reported as degraded
    NotRequested,
}

impl MetricsState {
    pub fn is_available(&self) -> bool {
        matches!(self, MetricsState::Available(_))
    }

    pub fn index(&self) -> Option<&UsageIndex> {
        match self {
            MetricsState::Available(index) => Some(index),
            MetricsState::Unavailable { .. } | MetricsState::NotRequested => None,
        }
    }
}

/// Point-in-time view of the cluster
#[derive(Debug, Clone)]
pub struct ClusterSnapshot {
    pub pods: Vec<PodSnapshot>,
    pub nodes: Vec<NodeSnapshot>,
    pub metrics: MetricsState,
    pub captured_at: DateTime<Utc>,
}

impl ClusterSnapshot {
    pub fn new(pods: Vec<PodSnapshot>, nodes: Vec<NodeSnapshot>, metrics: MetricsState) -> Self {
        Self {
            pods,
            nodes,
            metrics,
            captured_at: Utc::now(),
        }
    }
}
