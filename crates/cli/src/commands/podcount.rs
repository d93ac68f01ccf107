//! Non-DaemonSet pod count per node

use anyhow::Result;
use serde::Serialize;
use std::collections::BTreeMap;

use inspect_lib::{rank, AnalysisOptions, NodeResourceRecord, SortKey, SpotSelector};

use crate::client::ClusterClient;
use crate::commands::{print_diagnostics, run_analysis};
use crate::output::{bold, highlight_node, print_json, print_title, render_records, OutputFormat};

/// JSON shape of one row
#[derive(Serialize)]
struct PodCountEntry<'a> {
    node: &'a str,
    labels: BTreeMap<&'a str, Option<&'a str>>,
    pod_count: usize,
    is_spot: bool,
}

#[derive(Serialize)]
struct PodCountReport<'a> {
    nodes: Vec<PodCountEntry<'a>>,
    total: usize,
}

/// Resolve `--sort`; a bare label name selects that label column
pub fn sort_key(sort: &str, labels: &[String]) -> Result<SortKey> {
    if labels.iter().any(|label| label == sort) {
        return Ok(SortKey::Label(sort.to_string()));
    }
    Ok(sort.parse()?)
}

/// Count non-DaemonSet pods on every node
pub async fn show_pod_count(
    client: &ClusterClient,
    labels: Vec<String>,
    sort: &str,
    spot: SpotSelector,
    format: OutputFormat,
) -> Result<()> {
    let key = sort_key(sort, &labels)?;
    let options = AnalysisOptions::default().with_spot(spot);
    let report = run_analysis(client, &options, false).await?;

    let mut nodes = report.nodes.clone();
    rank(&mut nodes, &key, None);
    let total = report.totals.workload.pod_count;

    match format {
        OutputFormat::Json => {
            let entries = nodes.iter().map(|node| entry(node, &labels)).collect();
            print_json(&PodCountReport {
                nodes: entries,
                total,
            })?;
        }
        OutputFormat::Table => {
            let mut header = vec!["Node".to_string()];
            header.extend(labels.iter().cloned());
            header.push("Pod Count".to_string());

            let records = nodes
                .iter()
                .map(|node| {
                    let mut record = vec![highlight_node(&node.name, node.is_spot)];
                    record.extend(
                        labels
                            .iter()
                            .map(|label| node.label(label).unwrap_or_default().to_string()),
                    );
                    record.push(node.pod_count.to_string());
                    record
                })
                .collect();

            print_title("Non-DaemonSet Pod Count Per Node");
            println!("{}", render_records(header, records));
            println!();
            println!("{}", bold(format!("Total non-DaemonSet pods: {}", total)));
            print_diagnostics(&report);
        }
    }

    Ok(())
}

fn entry<'a>(node: &'a NodeResourceRecord, labels: &'a [String]) -> PodCountEntry<'a> {
    PodCountEntry {
        node: &node.name,
        labels: labels
            .iter()
            .map(|label| (label.as_str(), node.label(label)))
            .collect(),
        pod_count: node.pod_count,
        is_spot: node.is_spot,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sort_by_label_name() {
        let labels = vec!["topology.kubernetes.io/zone".to_string()];
        assert_eq!(
            sort_key("topology.kubernetes.io/zone", &labels).unwrap(),
            SortKey::Label("topology.kubernetes.io/zone".to_string())
        );
        assert_eq!(sort_key("pod-count", &labels).unwrap(), SortKey::PodCount);
        assert_eq!(sort_key("Node", &labels).unwrap(), SortKey::Name);
        assert!(sort_key("zone", &labels).is_err());
    }
}
