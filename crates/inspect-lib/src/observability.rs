//! Observability for inspection runs
//!
//! Provides:
//! - Tracing subscriber setup (human or JSON, always on stderr)
//! - Structured events for each analysis milestone

use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use crate::aggregate::{AnalysisReport, Diagnostic};
use crate::models::ClusterSnapshot;

/// Log line layout
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

/// Install the global subscriber
///
/// `RUST_LOG` wins when set; otherwise `warn`, or `debug` when verbose.
/// Output goes to stderr so rendered tables on stdout stay clean. Calling
/// this twice is harmless; the second install is ignored.
pub fn init_tracing(verbose: bool, format: LogFormat) {
    let default_level = if verbose { "debug" } else { "warn" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    let registry = tracing_subscriber::registry().with(filter);
    let result = match format {
        LogFormat::Json => registry
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .try_init(),
        LogFormat::Text => registry
            .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
            .try_init(),
    };
    if result.is_err() {
        tracing::debug!("Tracing subscriber already installed");
    }
}

/// Structured logger for inspection events
///
/// Every event carries the cluster context it was run against.
#[derive(Debug, Clone)]
pub struct StructuredLogger {
    context: String,
}

impl StructuredLogger {
    pub fn new(context: impl Into<String>) -> Self {
        Self {
            context: context.into(),
        }
    }

    pub fn context(&self) -> &str {
        &self.context
    }

    /// Log a completed snapshot fetch
    pub fn log_snapshot_collected(&self, snapshot: &ClusterSnapshot) {
        let (pod_samples, node_samples) = snapshot
            .metrics
            .index()
            .map(|index| (index.pods.len(), index.nodes.len()))
            .unwrap_or((0, 0));

        info!(
            event = "snapshot_collected",
            context = %self.context,
            pods = snapshot.pods.len(),
            nodes = snapshot.nodes.len(),
            pod_samples = pod_samples,
            node_samples = node_samples,
            captured_at = %snapshot.captured_at,
            "Cluster snapshot collected"
        );
    }

    /// Log that usage figures will be reported as n/a
    pub fn log_metrics_degraded(&self, reason: &str) {
        warn!(
            event = "metrics_degraded",
            context = %self.context,
            reason = %reason,
            "Usage metrics unavailable, usage and waste will show n/a"
        );
    }

    /// Log the outcome of one aggregation pass
    pub fn log_analysis_completed(&self, report: &AnalysisReport) {
        info!(
            event = "analysis_completed",
            context = %self.context,
            nodes = report.nodes.len(),
            workload_pods = report.totals.workload.pod_count,
            diagnostics = report.diagnostics.len(),
            metrics_available = report.metrics_available,
            "Analysis completed"
        );
        for diagnostic in &report.diagnostics {
            self.log_diagnostic(diagnostic);
        }
    }

    pub fn log_diagnostic(&self, diagnostic: &Diagnostic) {
        match diagnostic {
            Diagnostic::OrphanPod { pod, node } => {
                warn!(
                    event = "diagnostic_raised",
                    context = %self.context,
                    kind = "orphan_pod",
                    pod = %pod,
                    node = %node,
                    "Pod bound to a node missing from the node list"
                );
            }
            Diagnostic::UnscheduledPod { pod } => {
                info!(
                    event = "diagnostic_raised",
                    context = %self.context,
                    kind = "unscheduled_pod",
                    pod = %pod,
                    "Pod has no node assignment"
                );
            }
            Diagnostic::MetricsUnavailable { reason } => self.log_metrics_degraded(reason),
            Diagnostic::DuplicateNode { node } => {
                warn!(
                    event = "diagnostic_raised",
                    context = %self.context,
                    kind = "duplicate_node",
                    node = %node,
                    "Node listed more than once"
                );
            }
        }
    }
}
