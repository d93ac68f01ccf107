//! Read-only listing of pods matching a set of statuses

use anyhow::{Context, Result};
use tabled::Tabled;

use inspect_lib::{MatchedPod, SnapshotSource, StatusFilter};

use crate::client::ClusterClient;
use crate::output::{print_json, print_title, print_warning, render_table, OutputFormat};

/// Row for matching pods table
#[derive(Tabled)]
struct MatchedPodRow {
    #[tabled(rename = "Namespace")]
    namespace: String,
    #[tabled(rename = "Pod Name")]
    name: String,
    #[tabled(rename = "Node")]
    node: String,
    #[tabled(rename = "Status")]
    status: String,
    #[tabled(rename = "Restarts")]
    restarts: u32,
}

impl From<&MatchedPod> for MatchedPodRow {
    fn from(matched: &MatchedPod) -> Self {
        Self {
            namespace: matched.pod.namespace.clone(),
            name: matched.pod.name.clone(),
            node: matched.node.clone().unwrap_or_else(|| "<none>".to_string()),
            status: color_pod_status(&matched.status),
            restarts: matched.restarts,
        }
    }
}

/// Color a pod status by how healthy it is
pub fn color_pod_status(status: &str) -> String {
    use colored::Colorize;
    match status {
        "Running" | "Succeeded" | "Completed" => status.green().to_string(),
        "Pending" | "ContainerCreating" | "PodInitializing" => status.yellow().to_string(),
        _ => status.red().to_string(),
    }
}

/// List pods whose phase or container reason is in `statuses`
pub async fn list_matching_pods(
    client: &ClusterClient,
    statuses: Vec<String>,
    format: OutputFormat,
) -> Result<()> {
    let filter = StatusFilter::new(statuses);
    if filter.is_empty() {
        anyhow::bail!("At least one --status must be specified");
    }

    let pods = client
        .list_pods(None)
        .await
        .context("Failed to list pods")?;
    let matched: Vec<MatchedPod> = filter.select(&pods).collect();
    let statuses: Vec<&str> = filter.statuses().collect();

    match format {
        OutputFormat::Json => print_json(&matched)?,
        OutputFormat::Table => {
            if matched.is_empty() {
                print_warning(&format!(
                    "No pods found matching statuses: {}",
                    statuses.join(", ")
                ));
                return Ok(());
            }

            print_title(&format!("Pods Matching Status: {}", statuses.join(", ")));
            let rows: Vec<MatchedPodRow> = matched.iter().map(MatchedPodRow::from).collect();
            println!("{}", render_table(rows));
            println!("\nTotal: {} pods", matched.len());
        }
    }

    Ok(())
}
