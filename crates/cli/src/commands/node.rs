//! Waste analysis for the pods on one node

use anyhow::{Context, Result};
use colored::Colorize;
use serde::Serialize;
use tabled::Tabled;

use inspect_lib::{
    rank, AnalysisOptions, NodeResourceRecord, PodResourceRecord, ResourceKind, SortKey,
};

use crate::client::ClusterClient;
use crate::commands::{print_diagnostics, run_analysis, ACTIVE_PHASES};
use crate::output::{
    bold, format_allocatable, format_amount, format_signed, format_usage, format_waste,
    highlight_node, print_json, print_success, print_title, print_warning, render_table,
    OutputFormat,
};

/// How many pods the top-wasters summary lists
const TOP_WASTERS: usize = 3;

/// Row for pod waste table
#[derive(Tabled)]
struct WasteRow {
    #[tabled(rename = "Pod")]
    pod: String,
    #[tabled(rename = "CPU Use")]
    cpu_usage: String,
    #[tabled(rename = "CPU Req")]
    cpu_request: String,
    #[tabled(rename = "CPU Waste")]
    cpu_waste: String,
    #[tabled(rename = "Mem Use")]
    memory_usage: String,
    #[tabled(rename = "Mem Req")]
    memory_request: String,
    #[tabled(rename = "Mem Waste")]
    memory_waste: String,
}

impl WasteRow {
    fn from_pod(pod: &PodResourceRecord) -> Self {
        use ResourceKind::{Cpu, Memory};
        Self {
            pod: format!("{}/{}", pod.namespace, pod.name),
            cpu_usage: format_usage(Cpu, pod.usage.cpu),
            cpu_request: format_amount(Cpu, pod.requests.cpu),
            cpu_waste: format_waste(pod.waste.cpu),
            memory_usage: format_usage(Memory, pod.usage.memory),
            memory_request: format_amount(Memory, pod.requests.memory),
            memory_waste: format_waste(pod.waste.memory),
        }
    }

    fn total(node: &NodeResourceRecord) -> Self {
        use ResourceKind::{Cpu, Memory};
        Self {
            pod: bold("TOTAL".to_string()),
            cpu_usage: bold(format_usage(Cpu, node.usage.cpu)),
            cpu_request: bold(format_amount(Cpu, node.requests.cpu)),
            cpu_waste: bold(format_waste(node.waste.cpu)),
            memory_usage: bold(format_usage(Memory, node.usage.memory)),
            memory_request: bold(format_amount(Memory, node.requests.memory)),
            memory_waste: bold(format_waste(node.waste.memory)),
        }
    }
}

#[derive(Serialize)]
struct NodeWasteReport<'a> {
    node: &'a NodeResourceRecord,
    pods: &'a [PodResourceRecord],
    top_memory_wasters: Vec<&'a PodResourceRecord>,
}

/// Pods with the largest positive memory waste, largest first
pub fn top_memory_wasters(pods: &[PodResourceRecord], limit: usize) -> Vec<&PodResourceRecord> {
    let mut wasters: Vec<&PodResourceRecord> = pods
        .iter()
        .filter(|pod| pod.waste.memory.amount.is_some_and(|amount| amount > 0))
        .collect();
    wasters.sort_by_key(|pod| std::cmp::Reverse(pod.waste.memory.amount));
    wasters.truncate(limit);
    wasters
}

/// Analyze resource waste for pods on a specific node
pub async fn show_node(
    client: &ClusterClient,
    node_name: &str,
    sort: &str,
    base: AnalysisOptions,
    format: OutputFormat,
) -> Result<()> {
    let key: SortKey = sort.parse()?;
    let options = base
        .for_node(node_name)
        .with_pod_breakdown()
        .with_phases(ACTIVE_PHASES);

    let report = run_analysis(client, &options, true).await?;
    let node = report
        .node(node_name)
        .with_context(|| format!("Node '{}' not found", node_name))?;
    let mut pods = report.pods.clone().unwrap_or_default();
    rank(&mut pods, &key, None);
    let wasters = top_memory_wasters(&pods, TOP_WASTERS);

    if format == OutputFormat::Json {
        return print_json(&NodeWasteReport {
            node,
            pods: &pods,
            top_memory_wasters: wasters,
        });
    }

    print_header(node);
    print_diagnostics(&report);

    if pods.is_empty() {
        print_warning("No non-DaemonSet pods found on this node.");
        return Ok(());
    }

    let mut rows: Vec<WasteRow> = pods.iter().map(WasteRow::from_pod).collect();
    rows.push(WasteRow::total(node));
    print_title("Pod Resource Analysis");
    println!("{}", render_table(rows));

    if !report.metrics_available {
        return Ok(());
    }

    println!();
    println!("{}", bold("Waste Summary:".to_string()));
    for kind in ResourceKind::ALL {
        let label = match kind {
            ResourceKind::Cpu => "CPU",
            ResourceKind::Memory => "Memory",
        };
        let waste = node.waste.get(kind);
        match waste.amount {
            Some(amount) => println!(
                "  {}: {} wasted ({} of requests)",
                label,
                format_signed(kind, amount),
                format_waste(*waste)
            ),
            None => println!("  {}: n/a", label),
        }
    }

    println!();
    if wasters.is_empty() {
        print_success("No pod uses less memory than it requests.");
    } else {
        println!("{}", bold("Top memory wasters:".to_string()));
        for pod in wasters {
            let amount = pod.waste.memory.amount.unwrap_or_default();
            println!(
                "  {}/{}: {} ({})",
                pod.namespace,
                pod.name,
                format_signed(ResourceKind::Memory, amount),
                format_waste(pod.waste.memory)
            );
        }
    }

    Ok(())
}

fn print_header(node: &NodeResourceRecord) {
    use ResourceKind::{Cpu, Memory};
    let spot = if node.is_spot {
        format!(" {}", "(SPOT)".red())
    } else {
        String::new()
    };
    println!();
    println!("{}{}", bold(format!("Node: {}", highlight_node(&node.name, node.is_spot))), spot);
    println!(
        "Allocatable: CPU {}, Memory {}",
        format_allocatable(Cpu, node.allocatable.cpu),
        format_allocatable(Memory, node.allocatable.memory)
    );
    if node.observed.cpu.known().is_some() || node.observed.memory.known().is_some() {
        println!(
            "Observed:    CPU {}, Memory {} (whole node, all pods)",
            format_usage(Cpu, node.observed.cpu),
            format_usage(Memory, node.observed.memory)
        );
    }
    if !node.taints.is_empty() {
        let taints: Vec<String> = node.taints.iter().map(ToString::to_string).collect();
        println!("Taints:      {}", taints.join(", "));
    }
}
