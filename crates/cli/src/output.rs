//! Output formatting utilities

use anyhow::{Context, Result};
use clap::ValueEnum;
use colored::Colorize;
use serde::Serialize;
use tabled::{builder::Builder, settings::Style, Table, Tabled};

use inspect_lib::{Limit, ResourceKind, Usage, WasteMetric};

/// Marker for values that cannot be computed
pub const NOT_AVAILABLE: &str = "n/a";

/// Output format for CLI commands
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Table format (default)
    #[default]
    Table,
    /// JSON format
    Json,
}

/// Print any serializable value as pretty JSON
pub fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(value).context("Failed to serialize output")?;
    println!("{}", json);
    Ok(())
}

/// Render rows with the shared table style
pub fn render_table<T: Tabled>(rows: Vec<T>) -> String {
    Table::new(rows).with(Style::rounded()).to_string()
}

/// Render a table whose columns are only known at runtime
pub fn render_records(header: Vec<String>, records: Vec<Vec<String>>) -> String {
    let mut builder = Builder::default();
    builder.push_record(header);
    for record in records {
        builder.push_record(record);
    }
    builder.build().with(Style::rounded()).to_string()
}

/// Print a section title above a table
pub fn print_title(title: &str) {
    println!();
    println!("{}", title.bold());
}

/// Print a success message
pub fn print_success(message: &str) {
    println!("{} {}", "✓".green().bold(), message);
}

/// Print a warning message
pub fn print_warning(message: &str) {
    println!("{} {}", "⚠".yellow().bold(), message);
}

/// Print an info message
pub fn print_info(message: &str) {
    println!("{} {}", "ℹ".blue().bold(), message);
}

/// Format bytes as human-readable string
pub fn format_bytes(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;
    const TB: u64 = GB * 1024;

    if bytes >= TB {
        format!("{:.2}Ti", bytes as f64 / TB as f64)
    } else if bytes >= GB {
        format!("{:.2}Gi", bytes as f64 / GB as f64)
    } else if bytes >= MB {
        format!("{:.0}Mi", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.0}Ki", bytes as f64 / KB as f64)
    } else {
        format!("{}B", bytes)
    }
}

/// Format millicores as human-readable string
pub fn format_cpu(millicores: u64) -> String {
    if millicores >= 1000 {
        format!("{:.1}", millicores as f64 / 1000.0)
    } else {
        format!("{}m", millicores)
    }
}

pub fn format_amount(kind: ResourceKind, amount: u64) -> String {
    match kind {
        ResourceKind::Cpu => format_cpu(amount),
        ResourceKind::Memory => format_bytes(amount),
    }
}

/// Format a signed amount such as waste; negative means usage above request
pub fn format_signed(kind: ResourceKind, amount: i64) -> String {
    let formatted = format_amount(kind, amount.unsigned_abs());
    if amount < 0 {
        format!("-{}", formatted)
    } else {
        formatted
    }
}

pub fn format_limit(kind: ResourceKind, limit: Limit) -> String {
    match limit {
        Limit::Known(amount) => format_amount(kind, amount),
        Limit::Unbounded => "none".to_string(),
    }
}

pub fn format_usage(kind: ResourceKind, usage: Usage) -> String {
    match usage {
        Usage::Known(amount) => format_amount(kind, amount),
        Usage::Unknown => NOT_AVAILABLE.dimmed().to_string(),
    }
}

pub fn format_allocatable(kind: ResourceKind, allocatable: Option<u64>) -> String {
    allocatable
        .map(|amount| format_amount(kind, amount))
        .unwrap_or_else(|| NOT_AVAILABLE.dimmed().to_string())
}

pub fn format_percent(percent: Option<f64>) -> String {
    match percent {
        Some(percent) => format!("{:.1}%", percent),
        None => NOT_AVAILABLE.dimmed().to_string(),
    }
}

/// Waste percentage, coloured by severity
pub fn format_waste(waste: WasteMetric) -> String {
    match waste.percent {
        Some(percent) => color_waste(percent),
        None => NOT_AVAILABLE.dimmed().to_string(),
    }
}

/// Color waste based on value
pub fn color_waste(percent: f64) -> String {
    let formatted = format!("{:.0}%", percent);
    if percent >= 80.0 {
        formatted.red().bold().to_string()
    } else if percent >= 60.0 {
        formatted.red().to_string()
    } else if percent >= 40.0 {
        formatted.yellow().to_string()
    } else if percent >= 20.0 {
        formatted.dimmed().to_string()
    } else if percent < 0.0 {
        // under-provisioned
        formatted.cyan().to_string()
    } else {
        formatted.green().to_string()
    }
}

/// Node name, red when the node is spot capacity
pub fn highlight_node(name: &str, is_spot: bool) -> String {
    if is_spot {
        name.red().bold().to_string()
    } else {
        name.cyan().to_string()
    }
}

pub fn bold(value: String) -> String {
    value.bold().to_string()
}
