//! Kubernetes client for fetching cluster snapshots
//!
//! Lists pods and nodes through the core API and usage samples through the
//! metrics-server API, converting everything into engine snapshot types.

use std::collections::BTreeMap;
use std::path::Path;

use anyhow::{Context, Result};
use async_trait::async_trait;
use k8s_openapi::api::core::v1::{Container, ContainerStatus, Node, Pod, PodStatus};
use k8s_openapi::apimachinery::pkg::api::resource::Quantity;
use kube::api::{Api, ListParams, ObjectMeta};
use kube::config::{KubeConfigOptions, Kubeconfig};
use kube::{Client, Config};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use inspect_lib::{
    ContainerSpec, ContainerUsage, NodeSnapshot, OwnerReference, PodKey, PodSnapshot,
    PodStatusSummary, SnapshotSource, Taint, UsageIndex,
};

// metrics-server types; kube-rs ships no definitions for metrics.k8s.io

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsUsage {
    pub cpu: Quantity,
    pub memory: Quantity,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContainerMetrics {
    pub name: String,
    pub usage: MetricsUsage,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PodMetrics {
    pub metadata: ObjectMeta,
    #[serde(default)]
    pub containers: Vec<ContainerMetrics>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeMetrics {
    pub metadata: ObjectMeta,
    pub usage: MetricsUsage,
}

impl k8s_openapi::Resource for PodMetrics {
    const GROUP: &'static str = "metrics.k8s.io";
    const KIND: &'static str = "PodMetrics";
    const VERSION: &'static str = "v1beta1";
    const API_VERSION: &'static str = "metrics.k8s.io/v1beta1";
    const URL_PATH_SEGMENT: &'static str = "pods";
    type Scope = k8s_openapi::NamespaceResourceScope;
}

impl k8s_openapi::Metadata for PodMetrics {
    type Ty = ObjectMeta;

    fn metadata(&self) -> &Self::Ty {
        &self.metadata
    }

    fn metadata_mut(&mut self) -> &mut Self::Ty {
        &mut self.metadata
    }
}

impl k8s_openapi::Resource for NodeMetrics {
    const GROUP: &'static str = "metrics.k8s.io";
    const KIND: &'static str = "NodeMetrics";
    const VERSION: &'static str = "v1beta1";
    const API_VERSION: &'static str = "metrics.k8s.io/v1beta1";
    const URL_PATH_SEGMENT: &'static str = "nodes";
    type Scope = k8s_openapi::ClusterResourceScope;
}

impl k8s_openapi::Metadata for NodeMetrics {
    type Ty = ObjectMeta;

    fn metadata(&self) -> &Self::Ty {
        &self.metadata
    }

    fn metadata_mut(&mut self) -> &mut Self::Ty {
        &mut self.metadata
    }
}

/// Cluster access for one invocation
pub struct ClusterClient {
    client: Client,
    context: String,
    /// Restricts pod listings; `None` lists every namespace
    namespace: Option<String>,
}

impl ClusterClient {
    /// Connect using a kubeconfig, falling back to in-cluster config
    pub async fn connect(kubeconfig: Option<&Path>, context: Option<&str>) -> Result<Self> {
        let kubeconfig = match kubeconfig {
            Some(path) => Some(
                Kubeconfig::read_from(path)
                    .with_context(|| format!("Failed to read kubeconfig {}", path.display()))?,
            ),
            None => Kubeconfig::read().ok(),
        };

        let (config, context_name) = match kubeconfig {
            Some(kubeconfig) => {
                let context_name = context
                    .map(str::to_string)
                    .or_else(|| kubeconfig.current_context.clone())
                    .unwrap_or_else(|| "default".to_string());
                let options = KubeConfigOptions {
                    context: context.map(str::to_string),
                    ..Default::default()
                };
                let config = Config::from_custom_kubeconfig(kubeconfig, &options)
                    .await
                    .with_context(|| format!("Failed to load context '{}'", context_name))?;
                (config, context_name)
            }
            None => {
                if let Some(context) = context {
                    anyhow::bail!("Context '{}' requested but no kubeconfig was found", context);
                }
                let config = Config::infer()
                    .await
                    .context("Failed to infer Kubernetes configuration")?;
                (config, "in-cluster".to_string())
            }
        };

        let client = Client::try_from(config).context("Failed to create Kubernetes client")?;
        debug!(context = %context_name, "Connected to cluster");

        Ok(Self {
            client,
            context: context_name,
            namespace: None,
        })
    }

    /// Scope pod listings to one namespace
    pub fn with_namespace(mut self, namespace: Option<String>) -> Self {
        self.namespace = namespace;
        self
    }

    pub fn context(&self) -> &str {
        &self.context
    }

    /// Namespace of the active kubeconfig context
    pub fn default_namespace(&self) -> &str {
        self.client.default_namespace()
    }

    fn pod_api(&self) -> Api<Pod> {
        match &self.namespace {
            Some(namespace) => Api::namespaced(self.client.clone(), namespace),
            None => Api::all(self.client.clone()),
        }
    }

    fn pod_metrics_api(&self) -> Api<PodMetrics> {
        match &self.namespace {
            Some(namespace) => Api::namespaced(self.client.clone(), namespace),
            None => Api::all(self.client.clone()),
        }
    }
}

#[async_trait]
impl SnapshotSource for ClusterClient {
    async fn list_pods(&self, node: Option<&str>) -> Result<Vec<PodSnapshot>> {
        let mut params = ListParams::default();
        if let Some(node) = node {
            params = params.fields(&format!("spec.nodeName={}", node));
        }
        let pods = self
            .pod_api()
            .list(&params)
            .await
            .context("Failed to list pods")?;
        Ok(pods.items.iter().map(pod_snapshot).collect())
    }

    async fn list_nodes(&self) -> Result<Vec<NodeSnapshot>> {
        let nodes = Api::<Node>::all(self.client.clone())
            .list(&ListParams::default())
            .await
            .context("Failed to list nodes")?;
        Ok(nodes.items.iter().map(node_snapshot).collect())
    }

    async fn fetch_usage(&self) -> Result<UsageIndex> {
        let pod_metrics = self
            .pod_metrics_api()
            .list(&ListParams::default())
            .await
            .context("Failed to query metrics.k8s.io pod metrics")?;

        let mut index = UsageIndex::default();
        for metrics in pod_metrics.items {
            let key = PodKey::new(
                metrics.metadata.namespace.unwrap_or_default(),
                metrics.metadata.name.unwrap_or_default(),
            );
            let containers = metrics
                .containers
                .into_iter()
                .map(|c| ContainerUsage::new(c.name, c.usage.cpu.0, c.usage.memory.0))
                .collect();
            index.insert_pod(key, containers);
        }

        // node samples only enrich the output; their absence is not degraded mode
        match Api::<NodeMetrics>::all(self.client.clone())
            .list(&ListParams::default())
            .await
        {
            Ok(node_metrics) => {
                for metrics in node_metrics.items {
                    let name = metrics.metadata.name.unwrap_or_default();
                    let usage = ContainerUsage::new(
                        name.clone(),
                        metrics.usage.cpu.0,
                        metrics.usage.memory.0,
                    );
                    index.insert_node(name, usage);
                }
            }
            Err(e) => warn!(error = %e, "Node metrics unavailable"),
        }

        Ok(index)
    }
}

/// Convert an API pod into an engine snapshot
pub fn pod_snapshot(pod: &Pod) -> PodSnapshot {
    let meta = &pod.metadata;
    let spec = pod.spec.as_ref();

    PodSnapshot {
        namespace: meta.namespace.clone().unwrap_or_default(),
        name: meta.name.clone().unwrap_or_default(),
        node_name: spec.and_then(|s| s.node_name.clone()),
        owners: meta
            .owner_references
            .iter()
            .flatten()
            .map(|owner| OwnerReference {
                kind: owner.kind.clone(),
                name: owner.name.clone(),
            })
            .collect(),
        containers: spec
            .map(|s| s.containers.iter().map(container_spec).collect())
            .unwrap_or_default(),
        init_containers: spec
            .and_then(|s| s.init_containers.as_ref())
            .map(|containers| containers.iter().map(container_spec).collect())
            .unwrap_or_default(),
        status: pod.status.as_ref().map(status_summary).unwrap_or_default(),
    }
}

fn container_spec(container: &Container) -> ContainerSpec {
    let resources = container.resources.as_ref();
    ContainerSpec {
        name: container.name.clone(),
        requests: quantities(resources.and_then(|r| r.requests.as_ref())),
        limits: quantities(resources.and_then(|r| r.limits.as_ref())),
    }
}

fn quantities(map: Option<&BTreeMap<String, Quantity>>) -> BTreeMap<String, String> {
    map.map(|m| m.iter().map(|(k, v)| (k.clone(), v.0.clone())).collect())
        .unwrap_or_default()
}

fn status_summary(status: &PodStatus) -> PodStatusSummary {
    let reasons = |statuses: &Option<Vec<ContainerStatus>>| -> Vec<String> {
        statuses
            .iter()
            .flatten()
            .filter_map(container_reason)
            .collect()
    };

    PodStatusSummary {
        phase: status.phase.clone(),
        init_container_reasons: reasons(&status.init_container_statuses),
        container_reasons: reasons(&status.container_statuses),
        restarts: status
            .container_statuses
            .iter()
            .flatten()
            .map(|cs| u32::try_from(cs.restart_count).unwrap_or(0))
            .fold(0u32, u32::saturating_add),
    }
}

/// Waiting reason, else terminated reason
fn container_reason(status: &ContainerStatus) -> Option<String> {
    let state = status.state.as_ref()?;
    match (&state.waiting, &state.terminated) {
        (Some(waiting), _) => waiting.reason.clone(),
        (None, Some(terminated)) => terminated.reason.clone(),
        (None, None) => None,
    }
}

/// Convert an API node into an engine snapshot
pub fn node_snapshot(node: &Node) -> NodeSnapshot {
    NodeSnapshot {
        name: node.metadata.name.clone().unwrap_or_default(),
        labels: node.metadata.labels.clone().unwrap_or_default(),
        taints: node
            .spec
            .as_ref()
            .and_then(|s| s.taints.as_ref())
            .iter()
            .flat_map(|taints| taints.iter())
            .map(|t| Taint {
                key: t.key.clone(),
                value: t.value.clone(),
                effect: t.effect.clone(),
            })
            .collect(),
        allocatable: quantities(node.status.as_ref().and_then(|s| s.allocatable.as_ref())),
    }
}
