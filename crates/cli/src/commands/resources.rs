//! Per-node requests, limits, usage and allocatable capacity

use anyhow::Result;
use tabled::Tabled;

use inspect_lib::{
    rank, AnalysisOptions, AnalysisReport, NodeResourceRecord, PodResourceRecord, ResourceKind,
    ResourceTally, SortKey,
};

use crate::client::ClusterClient;
use crate::commands::{print_diagnostics, run_analysis, ACTIVE_PHASES};
use crate::output::{
    bold, format_allocatable, format_amount, format_limit, format_percent, format_usage,
    highlight_node, print_info, print_json, print_title, render_table, OutputFormat,
};

/// Flags of the resources view
#[derive(Debug, Clone)]
pub struct ResourcesArgs {
    pub sort: String,
    pub show_pods: bool,
    pub daemonsets: bool,
    pub unscheduled: bool,
}

/// Row for the node summary table
#[derive(Tabled)]
struct NodeRow {
    #[tabled(rename = "Node")]
    node: String,
    #[tabled(rename = "Pods")]
    pods: String,
    #[tabled(rename = "CPU Use")]
    cpu_usage: String,
    #[tabled(rename = "CPU Req")]
    cpu_request: String,
    #[tabled(rename = "CPU Lim")]
    cpu_limit: String,
    #[tabled(rename = "CPU Alloc")]
    cpu_allocatable: String,
    #[tabled(rename = "CPU Req %")]
    cpu_utilization: String,
    #[tabled(rename = "Mem Use")]
    memory_usage: String,
    #[tabled(rename = "Mem Req")]
    memory_request: String,
    #[tabled(rename = "Mem Lim")]
    memory_limit: String,
    #[tabled(rename = "Mem Alloc")]
    memory_allocatable: String,
    #[tabled(rename = "Mem Req %")]
    memory_utilization: String,
}

/// Row for the per-node pod breakdown
#[derive(Tabled)]
struct PodRow {
    #[tabled(rename = "Pod")]
    pod: String,
    #[tabled(rename = "CPU Use")]
    cpu_usage: String,
    #[tabled(rename = "CPU Req")]
    cpu_request: String,
    #[tabled(rename = "CPU Lim")]
    cpu_limit: String,
    #[tabled(rename = "Mem Use")]
    memory_usage: String,
    #[tabled(rename = "Mem Req")]
    memory_request: String,
    #[tabled(rename = "Mem Lim")]
    memory_limit: String,
}

impl NodeRow {
    fn from_record(node: &NodeResourceRecord) -> Self {
        use ResourceKind::{Cpu, Memory};
        Self {
            node: highlight_node(&node.name, node.is_spot),
            pods: node.pod_count.to_string(),
            cpu_usage: format_usage(Cpu, node.usage.cpu),
            cpu_request: format_amount(Cpu, node.requests.cpu),
            cpu_limit: format_limit(Cpu, node.limits.cpu),
            cpu_allocatable: format_allocatable(Cpu, node.allocatable.cpu),
            cpu_utilization: format_percent(node.utilization.cpu),
            memory_usage: format_usage(Memory, node.usage.memory),
            memory_request: format_amount(Memory, node.requests.memory),
            memory_limit: format_limit(Memory, node.limits.memory),
            memory_allocatable: format_allocatable(Memory, node.allocatable.memory),
            memory_utilization: format_percent(node.utilization.memory),
        }
    }

    fn totals(report: &AnalysisReport) -> Self {
        use ResourceKind::{Cpu, Memory};
        let totals = &report.totals;
        let workload = &totals.workload;
        Self {
            node: bold("TOTAL".to_string()),
            pods: bold(workload.pod_count.to_string()),
            cpu_usage: bold(format_usage(Cpu, workload.usage.cpu)),
            cpu_request: bold(format_amount(Cpu, workload.requests.cpu)),
            cpu_limit: bold(format_limit(Cpu, workload.limits.cpu)),
            cpu_allocatable: bold(format_amount(Cpu, totals.allocatable.cpu)),
            cpu_utilization: bold(format_percent(totals.utilization.cpu)),
            memory_usage: bold(format_usage(Memory, workload.usage.memory)),
            memory_request: bold(format_amount(Memory, workload.requests.memory)),
            memory_limit: bold(format_limit(Memory, workload.limits.memory)),
            memory_allocatable: bold(format_amount(Memory, totals.allocatable.memory)),
            memory_utilization: bold(format_percent(totals.utilization.memory)),
        }
    }
}

impl PodRow {
    fn from_record(pod: &PodResourceRecord) -> Self {
        use ResourceKind::{Cpu, Memory};
        let name = if pod.daemonset {
            format!("{}/{} (ds)", pod.namespace, pod.name)
        } else {
            format!("{}/{}", pod.namespace, pod.name)
        };
        Self {
            pod: name,
            cpu_usage: format_usage(Cpu, pod.usage.cpu),
            cpu_request: format_amount(Cpu, pod.requests.cpu),
            cpu_limit: format_limit(Cpu, pod.limits.cpu),
            memory_usage: format_usage(Memory, pod.usage.memory),
            memory_request: format_amount(Memory, pod.requests.memory),
            memory_limit: format_limit(Memory, pod.limits.memory),
        }
    }
}

/// Analyze resource consumption per node, excluding DaemonSet pods
pub async fn show_resources(
    client: &ClusterClient,
    args: ResourcesArgs,
    base: AnalysisOptions,
    format: OutputFormat,
) -> Result<()> {
    let key: SortKey = args.sort.parse()?;

    let mut options = base.with_phases(ACTIVE_PHASES);
    if args.show_pods {
        options = options.with_pod_breakdown();
    }
    if args.daemonsets {
        options = options.with_daemonsets();
    }
    if args.unscheduled {
        options = options.with_unscheduled();
    }

    let mut report = run_analysis(client, &options, true).await?;
    rank(&mut report.nodes, &key, None);

    match format {
        OutputFormat::Json => print_json(&report)?,
        OutputFormat::Table => {
            let mut rows: Vec<NodeRow> = report.nodes.iter().map(NodeRow::from_record).collect();
            rows.push(NodeRow::totals(&report));

            print_title("Resource Analysis Per Node (excluding DaemonSets)");
            println!("{}", render_table(rows));

            if args.show_pods {
                print_pod_breakdown(&report);
            }
            if let Some(daemonsets) = &report.totals.daemonsets {
                print_daemonset_tally(daemonsets);
            }

            println!();
            print_utilization(&report);
            print_diagnostics(&report);
        }
    }

    Ok(())
}

fn print_pod_breakdown(report: &AnalysisReport) {
    for node in &report.nodes {
        let mut pods: Vec<PodResourceRecord> = report.pods_on(&node.name).cloned().collect();
        if pods.is_empty() {
            continue;
        }
        rank(&mut pods, &SortKey::MemRequest, None);

        print_title(&format!(
            "{} - Pod Details",
            highlight_node(&node.name, node.is_spot)
        ));
        println!(
            "{}",
            render_table(pods.iter().map(PodRow::from_record).collect())
        );
    }
}

fn print_daemonset_tally(tally: &ResourceTally) {
    use ResourceKind::{Cpu, Memory};
    println!();
    print_info(&format!(
        "DaemonSet pods: {} (CPU req {}, Mem req {}, CPU use {}, Mem use {})",
        tally.pod_count,
        format_amount(Cpu, tally.requests.cpu),
        format_amount(Memory, tally.requests.memory),
        format_usage(Cpu, tally.usage.cpu),
        format_usage(Memory, tally.usage.memory),
    ));
}

fn print_utilization(report: &AnalysisReport) {
    let utilization = &report.totals.utilization;
    if let Some(cpu) = utilization.cpu {
        println!(
            "{} {:.1}% of allocatable",
            bold("CPU Requests utilization:".to_string()),
            cpu
        );
    }
    if let Some(memory) = utilization.memory {
        println!(
            "{} {:.1}% of allocatable",
            bold("Memory Requests utilization:".to_string()),
            memory
        );
    }
}
