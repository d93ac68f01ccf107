//! Ordering of node and pod records for presentation
//!
//! Sorting is stable. Name and label keys ascend, numeric keys descend by
//! default, and records whose value is not applicable for the chosen key
//! always sort after every record that has one.

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use thiserror::Error;

use crate::aggregate::{NodeResourceRecord, PodResourceRecord, WasteMetric};
use crate::quantity::{Limit, PerKind, ResourceKind, Usage};

/// Keys records can be ordered by
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SortKey {
    Name,
    PodCount,
    CpuRequest,
    CpuLimit,
    CpuUsage,
    CpuWaste,
    MemRequest,
    MemLimit,
    MemUsage,
    MemWaste,
    /// Value of a node label
    Label(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDirection {
    Ascending,
    Descending,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown sort key '{0}' (expected name, pod-count, cpu-request, cpu-limit, cpu-usage, cpu-waste, mem-request, mem-limit, mem-usage, mem-waste or label:<key>)")]
pub struct UnknownSortKey(pub String);

impl SortKey {
    pub fn default_direction(&self) -> SortDirection {
        match self {
            SortKey::Name | SortKey::Label(_) => SortDirection::Ascending,
            _ => SortDirection::Descending,
        }
    }
}

impl FromStr for SortKey {
    type Err = UnknownSortKey;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if let Some(label) = s.strip_prefix("label:") {
            return Ok(SortKey::Label(label.to_string()));
        }
        let key = match s.to_ascii_lowercase().as_str() {
            "name" | "node" | "pod" => SortKey::Name,
            "pod-count" | "pods" => SortKey::PodCount,
            "cpu-request" | "cpu-req" => SortKey::CpuRequest,
            "cpu-limit" | "cpu-lim" => SortKey::CpuLimit,
            "cpu-usage" | "cpu-use" => SortKey::CpuUsage,
            "cpu-waste" => SortKey::CpuWaste,
            "mem-request" | "mem-req" => SortKey::MemRequest,
            "mem-limit" | "mem-lim" => SortKey::MemLimit,
            "mem-usage" | "mem-use" => SortKey::MemUsage,
            "mem-waste" => SortKey::MemWaste,
            _ => return Err(UnknownSortKey(s.to_string())),
        };
        Ok(key)
    }
}

impl fmt::Display for SortKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SortKey::Name => f.write_str("name"),
            SortKey::PodCount => f.write_str("pod-count"),
            SortKey::CpuRequest => f.write_str("cpu-request"),
            SortKey::CpuLimit => f.write_str("cpu-limit"),
            SortKey::CpuUsage => f.write_str("cpu-usage"),
            SortKey::CpuWaste => f.write_str("cpu-waste"),
            SortKey::MemRequest => f.write_str("mem-request"),
            SortKey::MemLimit => f.write_str("mem-limit"),
            SortKey::MemUsage => f.write_str("mem-usage"),
            SortKey::MemWaste => f.write_str("mem-waste"),
            SortKey::Label(label) => write!(f, "label:{}", label),
        }
    }
}

/// A record's value for one sort key
#[derive(Debug, Clone, PartialEq)]
pub enum SortValue {
    Text(String),
    Number(f64),
    /// Larger than every number
    Unbounded,
    NotApplicable,
}

impl SortValue {
    fn from_limit(limit: Limit) -> Self {
        match limit {
            Limit::Known(amount) => SortValue::Number(amount as f64),
            Limit::Unbounded => SortValue::Unbounded,
        }
    }

    fn from_usage(usage: Usage) -> Self {
        match usage {
            Usage::Known(amount) => SortValue::Number(amount as f64),
            Usage::Unknown => SortValue::NotApplicable,
        }
    }

    fn from_waste(waste: WasteMetric) -> Self {
        waste
            .percent
            .map(SortValue::Number)
            .unwrap_or(SortValue::NotApplicable)
    }

    fn is_applicable(&self) -> bool {
        !matches!(self, SortValue::NotApplicable)
    }
}

/// Records that can be ordered by a [`SortKey`]
pub trait Rankable {
    fn sort_value(&self, key: &SortKey) -> SortValue;
}

/// Per-kind figure a numeric key reads
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Measure {
    Request,
    Limit,
    Usage,
    Waste,
}

impl SortKey {
    /// Resource kind and figure for the per-kind keys
    fn measure(&self) -> Option<(ResourceKind, Measure)> {
        match self {
            SortKey::CpuRequest => Some((ResourceKind::Cpu, Measure::Request)),
            SortKey::CpuLimit => Some((ResourceKind::Cpu, Measure::Limit)),
            SortKey::CpuUsage => Some((ResourceKind::Cpu, Measure::Usage)),
            SortKey::CpuWaste => Some((ResourceKind::Cpu, Measure::Waste)),
            SortKey::MemRequest => Some((ResourceKind::Memory, Measure::Request)),
            SortKey::MemLimit => Some((ResourceKind::Memory, Measure::Limit)),
            SortKey::MemUsage => Some((ResourceKind::Memory, Measure::Usage)),
            SortKey::MemWaste => Some((ResourceKind::Memory, Measure::Waste)),
            SortKey::Name | SortKey::PodCount | SortKey::Label(_) => None,
        }
    }
}

/// Shared handling of the per-kind numeric keys
fn resource_value(
    key: &SortKey,
    requests: &PerKind<u64>,
    limits: &PerKind<Limit>,
    usage: &PerKind<Usage>,
    waste: &PerKind<WasteMetric>,
) -> SortValue {
    let Some((kind, measure)) = key.measure() else {
        return SortValue::NotApplicable;
    };
    match measure {
        Measure::Request => SortValue::Number(*requests.get(kind) as f64),
        Measure::Limit => SortValue::from_limit(*limits.get(kind)),
        Measure::Usage => SortValue::from_usage(*usage.get(kind)),
        Measure::Waste => SortValue::from_waste(*waste.get(kind)),
    }
}

impl Rankable for NodeResourceRecord {
    fn sort_value(&self, key: &SortKey) -> SortValue {
        match key {
            SortKey::Name => SortValue::Text(self.name.clone()),
            SortKey::PodCount => SortValue::Number(self.pod_count as f64),
            SortKey::Label(label) => self
                .label(label)
                .map(|value| SortValue::Text(value.to_string()))
                .unwrap_or(SortValue::NotApplicable),
            _ => resource_value(key, &self.requests, &self.limits, &self.usage, &self.waste),
        }
    }
}

impl Rankable for PodResourceRecord {
    fn sort_value(&self, key: &SortKey) -> SortValue {
        match key {
            SortKey::Name => SortValue::Text(format!("{}/{}", self.namespace, self.name)),
            SortKey::PodCount | SortKey::Label(_) => SortValue::NotApplicable,
            _ => resource_value(key, &self.requests, &self.limits, &self.usage, &self.waste),
        }
    }
}

fn compare_values(a: &SortValue, b: &SortValue) -> Ordering {
    match (a, b) {
        (SortValue::Text(a), SortValue::Text(b)) => a.cmp(b),
        (SortValue::Number(a), SortValue::Number(b)) => a.total_cmp(b),
        (SortValue::Unbounded, SortValue::Number(_)) => Ordering::Greater,
        (SortValue::Number(_), SortValue::Unbounded) => Ordering::Less,
        _ => Ordering::Equal,
    }
}

/// Stable in-place sort; `direction` overrides the key's default
pub fn rank<T: Rankable>(records: &mut [T], key: &SortKey, direction: Option<SortDirection>) {
    let direction = direction.unwrap_or_else(|| key.default_direction());
    records.sort_by_cached_key(|record| RankEntry {
        value: record.sort_value(key),
        direction,
    });
}

/// Sort key wrapper carrying the requested direction
struct RankEntry {
    value: SortValue,
    direction: SortDirection,
}

impl PartialEq for RankEntry {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for RankEntry {}

impl PartialOrd for RankEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for RankEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self.value.is_applicable(), other.value.is_applicable()) {
            (false, false) => Ordering::Equal,
            (false, true) => Ordering::Greater,
            (true, false) => Ordering::Less,
            (true, true) => {
                let ordering = compare_values(&self.value, &other.value);
                match self.direction {
                    SortDirection::Ascending => ordering,
                    SortDirection::Descending => ordering.reverse(),
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregate::{analyze, AnalysisOptions};
    use crate::models::{
        ClusterSnapshot, ContainerSpec, ContainerUsage, MetricsState, NodeSnapshot, PodKey,
        PodSnapshot, UsageIndex,
    };

    /// Three nodes: one with measured waste, one without samples, one idle
    fn nodes() -> Vec<NodeResourceRecord> {
        let pod = |name: &str, node: &str, cpu: &str| {
            PodSnapshot::new("default", name)
                .on_node(node)
                .with_container(ContainerSpec::new("app").with_request("cpu", cpu))
        };
        let mut index = UsageIndex::default();
        index.insert_pod(
            PodKey::new("default", "a"),
            vec![ContainerUsage::new("app", "100m", "1Mi")],
        );
        index.insert_pod(
            PodKey::new("default", "c"),
            vec![ContainerUsage::new("app", "900m", "1Mi")],
        );
        let snapshot = ClusterSnapshot::new(
            vec![
                pod("a", "alpha", "1"),
                pod("b", "bravo", "2"),
                pod("c", "charlie", "1"),
            ],
            vec![
                NodeSnapshot::new("charlie").with_label("zone", "b"),
                NodeSnapshot::new("alpha").with_label("zone", "a"),
                NodeSnapshot::new("bravo"),
                NodeSnapshot::new("delta"),
            ],
            MetricsState::Available(index),
        );
        analyze(&snapshot, &AnalysisOptions::default()).unwrap().nodes
    }

    fn names(records: &[NodeResourceRecord]) -> Vec<&str> {
        records.iter().map(|r| r.name.as_str()).collect()
    }

    #[test]
    fn test_parse_sort_keys() {
        assert_eq!("cpu-waste".parse::<SortKey>().unwrap(), SortKey::CpuWaste);
        assert_eq!("mem-req".parse::<SortKey>().unwrap(), SortKey::MemRequest);
        assert_eq!("Node".parse::<SortKey>().unwrap(), SortKey::Name);
        assert_eq!(
            "label:topology.kubernetes.io/zone".parse::<SortKey>().unwrap(),
            SortKey::Label("topology.kubernetes.io/zone".to_string())
        );
        assert!("bogus".parse::<SortKey>().is_err());
    }

    #[test]
    fn test_name_ascending() {
        let mut records = nodes();
        rank(&mut records, &SortKey::Name, None);
        assert_eq!(names(&records), vec!["alpha", "bravo", "charlie", "delta"]);
    }

    #[test]
    fn test_waste_not_applicable_last_both_directions() {
        // alpha 90%, charlie 10%, bravo unknown usage, delta zero request
        let mut records = nodes();
        rank(&mut records, &SortKey::CpuWaste, None);
        assert_eq!(&names(&records)[..2], &["alpha", "charlie"]);
        assert!(records[2..].iter().all(|r| r.waste.cpu.percent.is_none()));

        let mut records = nodes();
        rank(&mut records, &SortKey::CpuWaste, Some(SortDirection::Ascending));
        assert_eq!(&names(&records)[..2], &["charlie", "alpha"]);
        assert!(records[2..].iter().all(|r| r.waste.cpu.percent.is_none()));
    }

    #[test]
    fn test_not_applicable_keeps_input_order() {
        let mut records = nodes();
        rank(&mut records, &SortKey::CpuWaste, None);
        // bravo precedes delta in the input and both are n/a
        assert_eq!(&names(&records)[2..], &["bravo", "delta"]);
    }

    #[test]
    fn test_request_descending_is_stable() {
        let mut records = nodes();
        rank(&mut records, &SortKey::CpuRequest, None);
        // charlie and alpha tie at 1000m and keep input order
        assert_eq!(names(&records), vec!["bravo", "charlie", "alpha", "delta"]);
    }

    #[test]
    fn test_unbounded_limit_sorts_as_largest() {
        let mut records = nodes();
        rank(&mut records, &SortKey::CpuLimit, None);
        // every node with pods has an unbounded limit; delta's is zero
        assert_eq!(records.last().unwrap().name, "delta");
    }

    #[test]
    fn test_label_missing_sorts_last() {
        let mut records = nodes();
        rank(&mut records, &SortKey::Label("zone".to_string()), None);
        assert_eq!(&names(&records)[..2], &["alpha", "charlie"]);

        rank(
            &mut records,
            &SortKey::Label("zone".to_string()),
            Some(SortDirection::Descending),
        );
        assert_eq!(&names(&records)[..2], &["charlie", "alpha"]);
    }

    #[test]
    fn test_each_numeric_key_reads_its_own_figure() {
        let snapshot = ClusterSnapshot::new(
            vec![PodSnapshot::new("default", "app").on_node("n1").with_container(
                ContainerSpec::new("app")
                    .with_request("cpu", "400m")
                    .with_limit("cpu", "2")
                    .with_request("memory", "256Mi")
                    .with_limit("memory", "1Gi"),
            )],
            vec![NodeSnapshot::new("n1")],
            MetricsState::Available({
                let mut index = UsageIndex::default();
                index.insert_pod(
                    PodKey::new("default", "app"),
                    vec![ContainerUsage::new("app", "100m", "64Mi")],
                );
                index
            }),
        );
        let report = analyze(&snapshot, &AnalysisOptions::default().with_pod_breakdown()).unwrap();
        let pod = &report.pods.unwrap()[0];
        let mi = 1024.0 * 1024.0;

        let expected = [
            (SortKey::CpuRequest, 400.0),
            (SortKey::CpuLimit, 2000.0),
            (SortKey::CpuUsage, 100.0),
            (SortKey::CpuWaste, 75.0),
            (SortKey::MemRequest, 256.0 * mi),
            (SortKey::MemLimit, 1024.0 * mi),
            (SortKey::MemUsage, 64.0 * mi),
            (SortKey::MemWaste, 75.0),
        ];
        for (key, value) in expected {
            assert_eq!(pod.sort_value(&key), SortValue::Number(value), "{}", key);
        }
    }

    #[test]
    fn test_pod_records_rank_by_usage() {
        let snapshot = ClusterSnapshot::new(
            vec![
                PodSnapshot::new("default", "small").on_node("n1"),
                PodSnapshot::new("default", "big").on_node("n1"),
                PodSnapshot::new("default", "unsampled").on_node("n1"),
            ],
            vec![NodeSnapshot::new("n1")],
            MetricsState::Available({
                let mut index = UsageIndex::default();
                index.insert_pod(
                    PodKey::new("default", "small"),
                    vec![ContainerUsage::new("app", "1m", "1Mi")],
                );
                index.insert_pod(
                    PodKey::new("default", "big"),
                    vec![ContainerUsage::new("app", "1m", "1Gi")],
                );
                index
            }),
        );
        let mut pods = analyze(&snapshot, &AnalysisOptions::default().with_pod_breakdown())
            .unwrap()
            .pods
            .unwrap();

        rank(&mut pods, &SortKey::MemUsage, None);
        let order: Vec<_> = pods.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(order, vec!["big", "small", "unsampled"]);

        rank(&mut pods, &SortKey::PodCount, None);
        assert_eq!(pods.len(), 3);
    }
}
