//! Cluster snapshot sources
//!
//! The engine never talks to a cluster itself. A [`SnapshotSource`] lists
//! pods, nodes and usage samples; [`collect_snapshot`] turns those into one
//! [`ClusterSnapshot`], failing hard when pods or nodes cannot be listed and
//! degrading when only the metrics could not be read.

use anyhow::Result;
use async_trait::async_trait;
use chrono::Utc;
use tracing::{debug, warn};

use crate::error::AnalysisError;
use crate::models::{ClusterSnapshot, MetricsState, NodeSnapshot, PodSnapshot, UsageIndex};

/// Trait for cluster data providers
#[async_trait]
pub trait SnapshotSource: Send + Sync {
    /// List pods in scope; `node` narrows the listing when the provider can
    async fn list_pods(&self, node: Option<&str>) -> Result<Vec<PodSnapshot>>;

    /// List all nodes
    async fn list_nodes(&self) -> Result<Vec<NodeSnapshot>>;

    /// Fetch pod and node usage samples from the metrics API
    async fn fetch_usage(&self) -> Result<UsageIndex>;
}

/// What to fetch for one run
#[derive(Debug, Clone, Copy, Default)]
pub struct CollectOptions<'a> {
    pub node: Option<&'a str>,
    /// Skip the metrics API entirely
    pub skip_metrics: bool,
}

/// Fetch a complete snapshot
///
/// Pod and node listing failures abort with
/// [`AnalysisError::SnapshotUnavailable`]; no partial snapshot is returned.
pub async fn collect_snapshot(
    source: &dyn SnapshotSource,
    options: CollectOptions<'_>,
) -> std::result::Result<ClusterSnapshot, AnalysisError> {
    let nodes = source
        .list_nodes()
        .await
        .map_err(|e| AnalysisError::SnapshotUnavailable {
            resource: "nodes".to_string(),
            reason: format!("{:#}", e),
        })?;

    let pods = source
        .list_pods(options.node)
        .await
        .map_err(|e| AnalysisError::SnapshotUnavailable {
            resource: "pods".to_string(),
            reason: format!("{:#}", e),
        })?;

    let metrics = if options.skip_metrics {
        MetricsState::NotRequested
    } else {
        match source.fetch_usage().await {
            Ok(index) => MetricsState::Available(index),
            Err(e) => {
                warn!(error = %e, "Usage metrics unavailable");
                MetricsState::Unavailable {
                    reason: format!("{:#}", e),
                }
            }
        }
    };

    debug!(
        pods = pods.len(),
        nodes = nodes.len(),
        metrics = metrics.is_available(),
        "Snapshot collected"
    );

    Ok(ClusterSnapshot {
        pods,
        nodes,
        metrics,
        captured_at: Utc::now(),
    })
}

/// In-memory source, for replaying a saved snapshot or for tests
#[derive(Debug, Clone, Default)]
pub struct StaticSource {
    pub pods: Vec<PodSnapshot>,
    pub nodes: Vec<NodeSnapshot>,
    /// `None` behaves like a cluster without metrics-server
    pub usage: Option<UsageIndex>,
}

impl StaticSource {
    pub fn new(pods: Vec<PodSnapshot>, nodes: Vec<NodeSnapshot>) -> Self {
        Self {
            pods,
            nodes,
            usage: None,
        }
    }

    pub fn with_usage(mut self, usage: UsageIndex) -> Self {
        self.usage = Some(usage);
        self
    }
}

#[async_trait]
impl SnapshotSource for StaticSource {
    async fn list_pods(&self, node: Option<&str>) -> Result<Vec<PodSnapshot>> {
        Ok(self
            .pods
            .iter()
            .filter(|pod| node.is_none() || pod.node_name.as_deref() == node)
            .cloned()
            .collect())
    }

    async fn list_nodes(&self) -> Result<Vec<NodeSnapshot>> {
        Ok(self.nodes.clone())
    }

    async fn fetch_usage(&self) -> Result<UsageIndex> {
        self.usage
            .clone()
            .ok_or_else(|| anyhow::anyhow!("metrics.k8s.io is not served by this cluster"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregate::{analyze, AnalysisOptions, Diagnostic};
    use crate::models::{ContainerUsage, PodKey};
    use crate::quantity::Usage;

    struct FailingSource {
        fail_nodes: bool,
    }

    #[async_trait]
    impl SnapshotSource for FailingSource {
        async fn list_pods(&self, _node: Option<&str>) -> Result<Vec<PodSnapshot>> {
            anyhow::bail!("connection refused")
        }

        async fn list_nodes(&self) -> Result<Vec<NodeSnapshot>> {
            if self.fail_nodes {
                anyhow::bail!("forbidden")
            }
            Ok(vec![NodeSnapshot::new("n1")])
        }

        async fn fetch_usage(&self) -> Result<UsageIndex> {
            Ok(UsageIndex::default())
        }
    }

    fn source() -> StaticSource {
        StaticSource::new(
            vec![
                PodSnapshot::new("default", "a").on_node("n1"),
                PodSnapshot::new("default", "b").on_node("n2"),
            ],
            vec![NodeSnapshot::new("n1"), NodeSnapshot::new("n2")],
        )
    }

    #[test]
    fn test_static_source_filters_by_node() {
        let pods = tokio_test::block_on(source().list_pods(Some("n1"))).unwrap();
        assert_eq!(pods.len(), 1);
        assert_eq!(pods[0].name, "a");
        assert!(tokio_test::block_on(source().fetch_usage()).is_err());
    }

    #[tokio::test]
    async fn test_collect_without_metrics_degrades() {
        let snapshot = collect_snapshot(&source(), CollectOptions::default())
            .await
            .unwrap();
        assert_eq!(snapshot.pods.len(), 2);
        assert!(matches!(snapshot.metrics, MetricsState::Unavailable { .. }));
    }

    #[tokio::test]
    async fn test_collect_with_metrics() {
        let mut usage = UsageIndex::default();
        usage.insert_pod(
            PodKey::new("default", "a"),
            vec![ContainerUsage::new("app", "10m", "1Mi")],
        );
        let snapshot = collect_snapshot(&source().with_usage(usage), CollectOptions::default())
            .await
            .unwrap();
        assert!(snapshot.metrics.is_available());
    }

    #[tokio::test]
    async fn test_skipped_metrics_are_not_degraded() {
        let options = CollectOptions {
            node: None,
            skip_metrics: true,
        };
        let snapshot = collect_snapshot(&source(), options).await.unwrap();
        assert_eq!(snapshot.metrics, MetricsState::NotRequested);

        let report = analyze(&snapshot, &AnalysisOptions::default()).unwrap();
        assert!(!report.metrics_available);
        assert!(!report
            .diagnostics
            .iter()
            .any(|d| matches!(d, Diagnostic::MetricsUnavailable { .. })));
        // usage is still unknown, not zero
        assert_eq!(report.nodes[0].usage.cpu, Usage::Unknown);
    }

    #[tokio::test]
    async fn test_collect_narrows_to_node() {
        let options = CollectOptions {
            node: Some("n2"),
            skip_metrics: true,
        };
        let snapshot = collect_snapshot(&source(), options).await.unwrap();
        assert_eq!(snapshot.pods.len(), 1);
        assert_eq!(snapshot.pods[0].name, "b");
        // nodes are always listed in full so orphan detection still works
        assert_eq!(snapshot.nodes.len(), 2);
    }

    #[tokio::test]
    async fn test_pod_listing_failure_is_fatal() {
        let err = collect_snapshot(&FailingSource { fail_nodes: false }, CollectOptions::default())
            .await
            .unwrap_err();
        match err {
            AnalysisError::SnapshotUnavailable { resource, reason } => {
                assert_eq!(resource, "pods");
                assert!(reason.contains("connection refused"));
            }
            other => panic!("expected SnapshotUnavailable, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_node_listing_failure_is_fatal() {
        let err = collect_snapshot(&FailingSource { fail_nodes: true }, CollectOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            AnalysisError::SnapshotUnavailable { ref resource, .. } if resource == "nodes"
        ));
    }
}
