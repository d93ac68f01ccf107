//! Kubernetes resource quantities
//!
//! Quantity strings ("250m", "1.5Gi", "118930n") are parsed with
//! `kube_quantity` and normalized at the edge into exact integer amounts,
//! which the tagged sums below fold over. CPU is carried in millicores and
//! memory in bytes; both round up to the next whole unit the way the API
//! server's `MilliValue`/`Value` do.

use kube_quantity::ParsedQuantity;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Relative distance from a whole unit still treated as that unit
const SNAP_TOLERANCE: f64 = 1e-12;

/// Reasons a quantity string could not be parsed
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum QuantityError {
    #[error("quantity is empty")]
    Empty,

    #[error("invalid quantity: {0}")]
    Invalid(String),

    #[error("negative quantities are not valid resource amounts")]
    Negative,

    #[error("quantity is out of range")]
    Overflow,
}

fn parse_quantity(raw: &str) -> Result<ParsedQuantity, QuantityError> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Err(QuantityError::Empty);
    }
    ParsedQuantity::try_from(raw).map_err(|e| QuantityError::Invalid(e.to_string()))
}

/// Whole units of `raw * scale`, rounded up
///
/// Any positive amount, however small, is at least one unit.
fn scaled_ceil(raw: &str, scale: f64) -> Result<u64, QuantityError> {
    let value = parse_quantity(raw)?
        .to_bytes_f64()
        .ok_or(QuantityError::Overflow)?;
    if value < 0.0 {
        return Err(QuantityError::Negative);
    }

    let scaled = value * scale;
    let nearest = scaled.round();
    let units = if (scaled - nearest).abs() <= nearest * SNAP_TOLERANCE {
        nearest
    } else {
        scaled.ceil()
    };
    if !units.is_finite() || units >= u64::MAX as f64 {
        return Err(QuantityError::Overflow);
    }
    Ok(units as u64)
}

/// Resource kinds tracked by the engine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResourceKind {
    Cpu,
    Memory,
}

impl ResourceKind {
    pub const ALL: [ResourceKind; 2] = [ResourceKind::Cpu, ResourceKind::Memory];

    /// Key used in resource maps (`requests.cpu`, `limits.memory`, ...)
    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceKind::Cpu => "cpu",
            ResourceKind::Memory => "memory",
        }
    }

    /// Parse a raw quantity into this kind's normalized unit
    pub fn parse_amount(&self, raw: &str) -> Result<u64, QuantityError> {
        match self {
            ResourceKind::Cpu => scaled_ceil(raw, 1000.0),
            ResourceKind::Memory => scaled_ceil(raw, 1.0),
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One value per resource kind
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PerKind<T> {
    pub cpu: T,
    pub memory: T,
}

impl<T> PerKind<T> {
    pub fn new(cpu: T, memory: T) -> Self {
        Self { cpu, memory }
    }

    pub fn get(&self, kind: ResourceKind) -> &T {
        match kind {
            ResourceKind::Cpu => &self.cpu,
            ResourceKind::Memory => &self.memory,
        }
    }

    pub fn get_mut(&mut self, kind: ResourceKind) -> &mut T {
        match kind {
            ResourceKind::Cpu => &mut self.cpu,
            ResourceKind::Memory => &mut self.memory,
        }
    }

    /// Build both values from a per-kind closure
    pub fn try_from_fn<E>(mut f: impl FnMut(ResourceKind) -> Result<T, E>) -> Result<Self, E> {
        Ok(Self {
            cpu: f(ResourceKind::Cpu)?,
            memory: f(ResourceKind::Memory)?,
        })
    }

    pub fn from_fn(mut f: impl FnMut(ResourceKind) -> T) -> Self {
        Self {
            cpu: f(ResourceKind::Cpu),
            memory: f(ResourceKind::Memory),
        }
    }
}

/// Declared limit: a finite amount or no limit at all
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Limit {
    Known(u64),
    Unbounded,
}

impl Limit {
    pub fn known(&self) -> Option<u64> {
        match self {
            Limit::Known(amount) => Some(*amount),
            Limit::Unbounded => None,
        }
    }

    pub fn is_unbounded(&self) -> bool {
        matches!(self, Limit::Unbounded)
    }
}

/// Observed usage: a sampled amount or no sample
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Usage {
    Known(u64),
    Unknown,
}

impl Usage {
    pub fn known(&self) -> Option<u64> {
        match self {
            Usage::Known(amount) => Some(*amount),
            Usage::Unknown => None,
        }
    }

    pub fn is_unknown(&self) -> bool {
        matches!(self, Usage::Unknown)
    }
}

/// Additive combination with an absorbing non-numeric state
pub trait Accumulate: Sized {
    fn zero() -> Self;
    fn accumulate(self, other: Self) -> Self;
}

impl Accumulate for u64 {
    fn zero() -> Self {
        0
    }

    fn accumulate(self, other: Self) -> Self {
        self.saturating_add(other)
    }
}

impl Accumulate for Limit {
    fn zero() -> Self {
        Limit::Known(0)
    }

    fn accumulate(self, other: Self) -> Self {
        match (self, other) {
            (Limit::Known(a), Limit::Known(b)) => Limit::Known(a.saturating_add(b)),
            _ => Limit::Unbounded,
        }
    }
}

impl Accumulate for Usage {
    fn zero() -> Self {
        Usage::Known(0)
    }

    fn accumulate(self, other: Self) -> Self {
        match (self, other) {
            (Usage::Known(a), Usage::Known(b)) => Usage::Known(a.saturating_add(b)),
            _ => Usage::Unknown,
        }
    }
}

impl<T: Accumulate> Accumulate for PerKind<T> {
    fn zero() -> Self {
        PerKind::new(T::zero(), T::zero())
    }

    fn accumulate(self, other: Self) -> Self {
        PerKind::new(
            self.cpu.accumulate(other.cpu),
            self.memory.accumulate(other.memory),
        )
    }
}

/// Fold a sequence with the accumulate rules
pub fn fold_sum<T: Accumulate>(items: impl IntoIterator<Item = T>) -> T {
    items.into_iter().fold(T::zero(), T::accumulate)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_cpu_forms() {
        assert_eq!(ResourceKind::Cpu.parse_amount("250m").unwrap(), 250);
        assert_eq!(ResourceKind::Cpu.parse_amount("2").unwrap(), 2000);
        assert_eq!(ResourceKind::Cpu.parse_amount("1.5").unwrap(), 1500);
        assert_eq!(ResourceKind::Cpu.parse_amount("0.1").unwrap(), 100);
        assert_eq!(ResourceKind::Cpu.parse_amount(" 500m ").unwrap(), 500);
    }

    #[test]
    fn test_parse_cpu_nanocores_rounds_up() {
        // metrics-server reports nanocores
        assert_eq!(ResourceKind::Cpu.parse_amount("118930n").unwrap(), 1);
        assert_eq!(ResourceKind::Cpu.parse_amount("2000000n").unwrap(), 2);
        assert_eq!(ResourceKind::Cpu.parse_amount("2000001n").unwrap(), 3);
        assert_eq!(ResourceKind::Cpu.parse_amount("0n").unwrap(), 0);
        assert_eq!(ResourceKind::Cpu.parse_amount("1500u").unwrap(), 2);
    }

    #[test]
    fn test_tiny_amounts_round_up_to_one_unit() {
        assert_eq!(ResourceKind::Cpu.parse_amount("1n").unwrap(), 1);
        assert_eq!(
            ResourceKind::Cpu.parse_amount("0.000000000000000000001").unwrap(),
            1
        );
        assert_eq!(ResourceKind::Memory.parse_amount("1m").unwrap(), 1);
        assert_eq!(ResourceKind::Memory.parse_amount("1n").unwrap(), 1);
    }

    #[test]
    fn test_parse_memory_binary_and_decimal() {
        assert_eq!(ResourceKind::Memory.parse_amount("128Mi").unwrap(), 134_217_728);
        assert_eq!(ResourceKind::Memory.parse_amount("1Gi").unwrap(), 1_073_741_824);
        assert_eq!(ResourceKind::Memory.parse_amount("1.5Gi").unwrap(), 1_610_612_736);
        assert_eq!(ResourceKind::Memory.parse_amount("1024Ki").unwrap(), 1_048_576);
        assert_eq!(ResourceKind::Memory.parse_amount("1G").unwrap(), 1_000_000_000);
        assert_eq!(ResourceKind::Memory.parse_amount("500k").unwrap(), 500_000);
        assert_eq!(ResourceKind::Memory.parse_amount("1000000").unwrap(), 1_000_000);
        assert_eq!(ResourceKind::Memory.parse_amount("4Ti").unwrap(), 4_398_046_511_104);
    }

    #[test]
    fn test_parse_memory_millibytes_round_up() {
        assert_eq!(ResourceKind::Memory.parse_amount("1500m").unwrap(), 2);
        assert_eq!(ResourceKind::Memory.parse_amount("2000m").unwrap(), 2);
    }

    #[test]
    fn test_parse_rejects_malformed() {
        assert_eq!(ResourceKind::Cpu.parse_amount(""), Err(QuantityError::Empty));
        assert_eq!(ResourceKind::Cpu.parse_amount("   "), Err(QuantityError::Empty));
        assert!(matches!(
            ResourceKind::Cpu.parse_amount("abc"),
            Err(QuantityError::Invalid(_))
        ));
        assert_eq!(
            ResourceKind::Memory.parse_amount("-1Gi"),
            Err(QuantityError::Negative)
        );
    }

    #[test]
    fn test_parse_out_of_u64_range() {
        assert_eq!(
            ResourceKind::Memory.parse_amount("100Ei"),
            Err(QuantityError::Overflow)
        );
    }

    #[test]
    fn test_limit_unbounded_absorbs() {
        let total = fold_sum([Limit::Known(100), Limit::Unbounded, Limit::Known(50)]);
        assert_eq!(total, Limit::Unbounded);

        let total = fold_sum([Limit::Known(100), Limit::Known(50)]);
        assert_eq!(total, Limit::Known(150));
    }

    #[test]
    fn test_usage_unknown_absorbs() {
        let total = fold_sum([Usage::Known(500), Usage::Unknown]);
        assert_eq!(total, Usage::Unknown);
        assert_eq!(fold_sum(Vec::<Usage>::new()), Usage::Known(0));
    }

    #[test]
    fn test_request_sum_saturates() {
        assert_eq!(fold_sum([u64::MAX, 1]), u64::MAX);
    }

    #[test]
    fn test_per_kind_accumulate() {
        let a = PerKind::new(Limit::Known(1000), Limit::Known(64));
        let b = PerKind::new(Limit::Unbounded, Limit::Known(64));
        let total = fold_sum([a, b]);
        assert_eq!(total.cpu, Limit::Unbounded);
        assert_eq!(total.memory, Limit::Known(128));
    }
}
