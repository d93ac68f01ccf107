//! Cluster inspection engine
//!
//! This crate provides the core functionality for:
//! - Normalizing Kubernetes resource quantities to integer units
//! - Classifying DaemonSet-owned pods
//! - Aggregating requests, limits and usage per node and per pod
//! - Waste and utilization figures, and ranking for presentation
//! - Matching pods by status
//!
//! It performs no I/O of its own; cluster data arrives through a
//! [`source::SnapshotSource`].

pub mod aggregate;
pub mod error;
pub mod extractor;
pub mod models;
pub mod observability;
pub mod ownership;
pub mod quantity;
pub mod ranking;
pub mod source;
pub mod status_filter;

pub use aggregate::{
    analyze, AnalysisOptions, AnalysisReport, ClusterTotals, Diagnostic, NodeResourceRecord,
    PodResourceRecord, ResourceTally, SpotSelector, WasteMetric,
};
pub use error::{AnalysisError, Result};
pub use extractor::InitContainerPolicy;
pub use models::*;
pub use observability::{init_tracing, LogFormat, StructuredLogger};
pub use quantity::{Limit, PerKind, ResourceKind, Usage};
pub use ranking::{rank, SortDirection, SortKey};
pub use source::{collect_snapshot, CollectOptions, SnapshotSource, StaticSource};
pub use status_filter::{MatchedPod, StatusFilter};
