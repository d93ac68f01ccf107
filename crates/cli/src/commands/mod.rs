//! CLI views over the analysis engine

pub mod node;
pub mod podcount;
pub mod pods;
pub mod resources;

use anyhow::Result;

use inspect_lib::{
    analyze, collect_snapshot, AnalysisOptions, AnalysisReport, CollectOptions, Diagnostic,
    StructuredLogger,
};

use crate::client::ClusterClient;
use crate::output::{print_info, print_warning};

/// Phases the resource views analyze; finished pods hold no capacity
pub const ACTIVE_PHASES: [&str; 2] = ["Running", "Pending"];

/// Fetch a snapshot and run one analysis pass over it
///
/// Any fetch or extraction failure aborts here, before anything is printed.
pub async fn run_analysis(
    client: &ClusterClient,
    options: &AnalysisOptions,
    with_metrics: bool,
) -> Result<AnalysisReport> {
    let logger = StructuredLogger::new(client.context());
    let collect = CollectOptions {
        node: options.node.as_deref(),
        skip_metrics: !with_metrics,
    };

    let snapshot = collect_snapshot(client, collect).await?;
    logger.log_snapshot_collected(&snapshot);

    let report = analyze(&snapshot, options)?;
    logger.log_analysis_completed(&report);
    Ok(report)
}

/// Print diagnostics below a table
pub fn print_diagnostics(report: &AnalysisReport) {
    print_info(&format!(
        "Snapshot taken at {}",
        report
            .captured_at
            .to_rfc3339_opts(chrono::SecondsFormat::Secs, true)
    ));

    let mut unscheduled = 0usize;
    for diagnostic in &report.diagnostics {
        match diagnostic {
            Diagnostic::OrphanPod { pod, node } => print_warning(&format!(
                "Pod {} is bound to node {}, which is not in the node list",
                pod, node
            )),
            Diagnostic::UnscheduledPod { pod } => {
                unscheduled += 1;
                print_info(&format!("Pod {} is not scheduled to any node", pod));
            }
            Diagnostic::MetricsUnavailable { reason } => print_warning(&format!(
                "Metrics API not available ({}); usage and waste show n/a",
                reason
            )),
            Diagnostic::DuplicateNode { node } => print_warning(&format!(
                "Node {} appears more than once in the node list; only the first entry is shown",
                node
            )),
        }
    }
    if unscheduled > 0 {
        print_info(&format!("{} unscheduled pod(s)", unscheduled));
    }
}
