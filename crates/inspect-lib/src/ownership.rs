//! Pod ownership classification

use crate::models::{OwnerReference, PodSnapshot, DAEMONSET_KIND};

/// Controller kinds the engine distinguishes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControllerKind {
    DaemonSet,
    Other,
}

impl ControllerKind {
    pub fn of(owner: &OwnerReference) -> Self {
        match owner.kind.as_str() {
            DAEMONSET_KIND => ControllerKind::DaemonSet,
            _ => ControllerKind::Other,
        }
    }
}

/// True iff any owner reference is a DaemonSet
pub fn is_daemonset_owned(owners: &[OwnerReference]) -> bool {
    owners
        .iter()
        .any(|owner| ControllerKind::of(owner) == ControllerKind::DaemonSet)
}

/// Convenience wrapper over a whole pod
pub fn is_daemonset_pod(pod: &PodSnapshot) -> bool {
    is_daemonset_owned(&pod.owners)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn owner(kind: &str) -> OwnerReference {
        OwnerReference {
            kind: kind.to_string(),
            name: "owner".to_string(),
        }
    }

    #[test]
    fn test_no_owners_is_not_daemonset() {
        assert!(!is_daemonset_owned(&[]));
    }

    #[test]
    fn test_daemonset_owner_detected_among_others() {
        assert!(is_daemonset_owned(&[owner("ReplicaSet"), owner("DaemonSet")]));
        assert!(!is_daemonset_owned(&[owner("ReplicaSet"), owner("StatefulSet")]));
    }

    #[test]
    fn test_kind_match_is_exact() {
        assert!(!is_daemonset_owned(&[owner("daemonset")]));
        assert!(!is_daemonset_owned(&[owner("DaemonSets")]));
    }

    #[test]
    fn test_pod_wrapper() {
        let pod =
            PodSnapshot::new("kube-system", "fluentbit-x1").owned_by("DaemonSet", "fluentbit");
        assert!(is_daemonset_pod(&pod));
    }
}
