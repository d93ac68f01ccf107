//! Kubernetes cluster inspection CLI
//!
//! A command-line tool for seeing how pods are spread across nodes, how
//! requests compare with live usage, and where requested capacity is wasted.

mod client;
mod commands;
mod config;
mod output;

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand, ValueEnum};
use commands::{node, podcount, pods, resources};

use inspect_lib::{init_tracing, AnalysisOptions, LogFormat};

/// Kubernetes cluster inspection tools
#[derive(Parser)]
#[command(name = "k8stools")]
#[command(author, version, about = "Collection of Kubernetes cluster inspection utilities", long_about = None)]
pub struct Cli {
    /// Kubernetes context to use (defaults to the kubeconfig's current context)
    #[arg(long, short = 'c', global = true)]
    pub context: Option<String>,

    /// Path to kubeconfig file (defaults to $KUBECONFIG or ~/.kube/config)
    #[arg(long, global = true)]
    pub kubeconfig: Option<PathBuf>,

    /// Output format
    #[arg(long, short, default_value = "table", global = true)]
    pub format: output::OutputFormat,

    /// Enable debug logging on stderr
    #[arg(long, short, global = true)]
    pub verbose: bool,

    /// Log line format
    #[arg(long, default_value = "text", global = true)]
    pub log_format: LogFormatArg,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum LogFormatArg {
    Text,
    Json,
}

impl From<LogFormatArg> for LogFormat {
    fn from(format: LogFormatArg) -> Self {
        match format {
            LogFormatArg::Text => LogFormat::Text,
            LogFormatArg::Json => LogFormat::Json,
        }
    }
}

#[derive(Subcommand)]
pub enum Commands {
    /// Count non-DaemonSet pods per node
    Podcount {
        /// Node label to show as a column (repeatable)
        #[arg(long = "label", short = 'l')]
        labels: Vec<String>,

        /// Sort by: node, pod-count, or one of the --label names
        #[arg(long, short)]
        sort: Option<String>,
    },

    /// Show per-node requests, limits and usage (excluding DaemonSets)
    Resources {
        /// Show individual pod breakdown per node
        #[arg(long, short = 'p')]
        show_pods: bool,

        /// Sort by: node, pod-count, cpu-req, cpu-lim, cpu-usage, mem-req, mem-lim, mem-usage
        #[arg(long, short)]
        sort: Option<String>,

        /// Also tally DaemonSet pods separately
        #[arg(long)]
        daemonsets: bool,

        /// List pods that are not scheduled to any node
        #[arg(long)]
        unscheduled: bool,

        /// Count init containers in requests and limits
        #[arg(long)]
        include_init: bool,
    },

    /// Analyze resource waste for pods on a specific node
    Node {
        /// Node name to analyze
        node: String,

        /// Sort by: name, cpu-waste, mem-waste, cpu-req, mem-req
        #[arg(long, short, default_value = "mem-waste")]
        sort: String,

        /// Count init containers in requests and limits
        #[arg(long)]
        include_init: bool,
    },

    /// List pods matching certain statuses (read-only)
    Pods {
        /// Pod status to match (repeatable), e.g. Evicted, CrashLoopBackOff
        #[arg(long = "status", short = 's', required = true)]
        statuses: Vec<String>,

        /// Namespace to search (defaults to the context's namespace)
        #[arg(long, short)]
        namespace: Option<String>,

        /// Search pods in all namespaces
        #[arg(long, short = 'A')]
        all_namespaces: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose, cli.log_format.into());

    let settings = config::Config::load()?;
    let context = cli.context.clone().or_else(|| settings.context.clone());

    // Initialize client
    let client =
        client::ClusterClient::connect(cli.kubeconfig.as_deref(), context.as_deref()).await?;

    let default_sort = settings.default_sort.as_deref().unwrap_or("node");
    let base = |include_init: bool| {
        let options = AnalysisOptions::default().with_spot(settings.spot_selector());
        if include_init {
            options.with_init_containers(inspect_lib::InitContainerPolicy::Include)
        } else {
            options.with_init_containers(settings.init_policy())
        }
    };

    // Execute command
    match cli.command {
        Commands::Podcount { labels, sort } => {
            let mut columns = settings.node_labels.clone();
            columns.extend(labels.into_iter().filter(|l| !settings.node_labels.contains(l)));
            let sort = sort.as_deref().unwrap_or(default_sort);
            podcount::show_pod_count(&client, columns, sort, settings.spot_selector(), cli.format)
                .await?;
        }
        Commands::Resources {
            show_pods,
            sort,
            daemonsets,
            unscheduled,
            include_init,
        } => {
            let args = resources::ResourcesArgs {
                sort: sort.unwrap_or_else(|| default_sort.to_string()),
                show_pods,
                daemonsets,
                unscheduled,
            };
            resources::show_resources(&client, args, base(include_init), cli.format).await?;
        }
        Commands::Node {
            node: node_name,
            sort,
            include_init,
        } => {
            node::show_node(&client, &node_name, &sort, base(include_init), cli.format).await?;
        }
        Commands::Pods {
            statuses,
            namespace,
            all_namespaces,
        } => {
            let scope = if all_namespaces {
                None
            } else {
                Some(namespace.unwrap_or_else(|| client.default_namespace().to_string()))
            };
            let client = client.with_namespace(scope);
            pods::list_matching_pods(&client, statuses, cli.format).await?;
        }
    }

    Ok(())
}
