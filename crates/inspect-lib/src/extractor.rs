//! Resource extraction
//!
//! Sums declared requests and limits over a pod's containers and parses
//! usage samples, all normalized to millicores and bytes.

use serde::{Deserialize, Serialize};

use crate::error::{AnalysisError, Result};
use crate::models::{ContainerSpec, ContainerUsage, PodSnapshot};
use crate::quantity::{fold_sum, Limit, PerKind, ResourceKind, Usage};

/// Whether init containers contribute to a pod's totals
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InitContainerPolicy {
    /// Regular containers only; init containers never run alongside the workload
    #[default]
    Exclude,
    /// Add init containers to the sums as if they ran concurrently
    Include,
}

/// Declared totals for one pod
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractedResources {
    pub requests: PerKind<u64>,
    pub limits: PerKind<Limit>,
}

/// Sum requests and limits over the pod's containers
///
/// A missing request adds zero; a missing limit makes the pod's limit for
/// that kind unbounded.
pub fn extract_resources(
    pod: &PodSnapshot,
    policy: InitContainerPolicy,
) -> Result<ExtractedResources> {
    let object = pod.key().to_string();
    let init: &[ContainerSpec] = match policy {
        InitContainerPolicy::Include => pod.init_containers.as_slice(),
        InitContainerPolicy::Exclude => &[],
    };

    let per_container = pod
        .containers
        .iter()
        .chain(init)
        .map(|container| container_resources(&object, container))
        .collect::<Result<Vec<_>>>()?;

    Ok(ExtractedResources {
        requests: fold_sum(per_container.iter().map(|c| c.requests)),
        limits: fold_sum(per_container.iter().map(|c| c.limits)),
    })
}

fn container_resources(object: &str, container: &ContainerSpec) -> Result<ExtractedResources> {
    let name = Some(container.name.as_str());

    let requests = PerKind::try_from_fn(|kind| {
        container
            .requests
            .get(kind.as_str())
            .map(|raw| parse_field(object, name, "requests", kind, raw))
            .unwrap_or(Ok(0))
    })?;

    let limits = PerKind::try_from_fn(|kind| match container.limits.get(kind.as_str()) {
        Some(raw) => parse_field(object, name, "limits", kind, raw).map(Limit::Known),
        None => Ok(Limit::Unbounded),
    })?;

    Ok(ExtractedResources { requests, limits })
}

/// Sum a pod's container usage samples
pub fn extract_usage(object: &str, samples: &[ContainerUsage]) -> Result<PerKind<Usage>> {
    let per_container = samples
        .iter()
        .map(|sample| sample_usage(object, Some(sample.name.as_str()), sample))
        .collect::<Result<Vec<_>>>()?;
    Ok(fold_sum(per_container))
}

/// Parse a single usage sample (a container or a whole node)
pub fn sample_usage(
    object: &str,
    container: Option<&str>,
    sample: &ContainerUsage,
) -> Result<PerKind<Usage>> {
    PerKind::try_from_fn(|kind| {
        let raw = match kind {
            ResourceKind::Cpu => &sample.cpu,
            ResourceKind::Memory => &sample.memory,
        };
        parse_field(object, container, "usage", kind, raw).map(Usage::Known)
    })
}

pub(crate) fn parse_field(
    object: &str,
    container: Option<&str>,
    section: &str,
    kind: ResourceKind,
    raw: &str,
) -> Result<u64> {
    kind.parse_amount(raw)
        .map_err(|reason| AnalysisError::MalformedQuantity {
            object: object.to_string(),
            container: container.map(str::to_string),
            field: format!("{}.{}", section, kind),
            value: raw.to_string(),
            reason,
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pod_with(containers: Vec<ContainerSpec>) -> PodSnapshot {
        containers
            .into_iter()
            .fold(PodSnapshot::new("default", "web-0"), PodSnapshot::with_container)
    }

    #[test]
    fn test_sums_requests_and_limits() {
        let pod = pod_with(vec![
            ContainerSpec::new("app")
                .with_request("cpu", "250m")
                .with_request("memory", "256Mi")
                .with_limit("cpu", "500m")
                .with_limit("memory", "512Mi"),
            ContainerSpec::new("sidecar")
                .with_request("cpu", "50m")
                .with_request("memory", "64Mi")
                .with_limit("cpu", "100m")
                .with_limit("memory", "128Mi"),
        ]);

        let extracted = extract_resources(&pod, InitContainerPolicy::Exclude).unwrap();
        assert_eq!(extracted.requests.cpu, 300);
        assert_eq!(extracted.requests.memory, 320 * 1024 * 1024);
        assert_eq!(extracted.limits.cpu, Limit::Known(600));
        assert_eq!(extracted.limits.memory, Limit::Known(640 * 1024 * 1024));
    }

    #[test]
    fn test_missing_request_contributes_zero() {
        let pod = pod_with(vec![
            ContainerSpec::new("app").with_request("cpu", "1"),
            ContainerSpec::new("no-requests"),
        ]);
        let extracted = extract_resources(&pod, InitContainerPolicy::Exclude).unwrap();
        assert_eq!(extracted.requests.cpu, 1000);
        assert_eq!(extracted.requests.memory, 0);
    }

    #[test]
    fn test_single_unbounded_container_makes_pod_unbounded() {
        let pod = pod_with(vec![
            ContainerSpec::new("app").with_limit("cpu", "2").with_limit("memory", "1Gi"),
            ContainerSpec::new("sidecar").with_limit("memory", "128Mi"),
        ]);
        let extracted = extract_resources(&pod, InitContainerPolicy::Exclude).unwrap();
        assert_eq!(extracted.limits.cpu, Limit::Unbounded);
        assert_eq!(
            extracted.limits.memory,
            Limit::Known(1024 * 1024 * 1024 + 128 * 1024 * 1024)
        );
    }

    #[test]
    fn test_init_container_policy() {
        let pod = pod_with(vec![ContainerSpec::new("app")
            .with_request("cpu", "100m")
            .with_limit("cpu", "200m")])
        .with_init_container(ContainerSpec::new("migrate").with_request("cpu", "1"));

        let excluded = extract_resources(&pod, InitContainerPolicy::Exclude).unwrap();
        assert_eq!(excluded.requests.cpu, 100);
        assert_eq!(excluded.limits.cpu, Limit::Known(200));

        let included = extract_resources(&pod, InitContainerPolicy::Include).unwrap();
        assert_eq!(included.requests.cpu, 1100);
        // the init container declares no cpu limit
        assert_eq!(included.limits.cpu, Limit::Unbounded);
    }

    #[test]
    fn test_malformed_quantity_fails_whole_pod() {
        let pod = pod_with(vec![
            ContainerSpec::new("app").with_request("cpu", "100m"),
            ContainerSpec::new("broken").with_limit("memory", "parsecs"),
        ]);

        match extract_resources(&pod, InitContainerPolicy::Exclude) {
            Err(AnalysisError::MalformedQuantity {
                object,
                container,
                field,
                value,
                ..
            }) => {
                assert_eq!(object, "default/web-0");
                assert_eq!(container.as_deref(), Some("broken"));
                assert_eq!(field, "limits.memory");
                assert_eq!(value, "parsecs");
            }
            other => panic!("expected MalformedQuantity, got {:?}", other),
        }
    }

    #[test]
    fn test_extract_is_idempotent() {
        let pod = pod_with(vec![ContainerSpec::new("app").with_request("memory", "1Gi")]);
        let first = extract_resources(&pod, InitContainerPolicy::Exclude).unwrap();
        let second = extract_resources(&pod, InitContainerPolicy::Exclude).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_usage_sums_containers() {
        let samples = vec![
            ContainerUsage::new("app", "250000000n", "100Mi"),
            ContainerUsage::new("sidecar", "5m", "20Mi"),
        ];
        let usage = extract_usage("default/web-0", &samples).unwrap();
        assert_eq!(usage.cpu, Usage::Known(255));
        assert_eq!(usage.memory, Usage::Known(120 * 1024 * 1024));
    }

    #[test]
    fn test_malformed_usage_is_reported() {
        let samples = vec![ContainerUsage::new("app", "fast", "1Mi")];
        let err = extract_usage("default/web-0", &samples).unwrap_err();
        assert!(err.to_string().contains("usage.cpu"));
    }
}
