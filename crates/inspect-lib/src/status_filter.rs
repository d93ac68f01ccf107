//! Pod status matching
//!
//! Selects pods whose phase or container waiting/terminated reasons match a
//! user-supplied set, e.g. `Evicted`, `Completed`, `CrashLoopBackOff`.

use std::collections::BTreeSet;

use serde::Serialize;

use crate::models::{PodKey, PodSnapshot};

/// Set of statuses a pod may match
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StatusFilter {
    statuses: BTreeSet<String>,
}

impl StatusFilter {
    pub fn new<I, S>(statuses: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            statuses: statuses
                .into_iter()
                .map(Into::into)
                .filter(|s: &String| !s.is_empty())
                .collect(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.statuses.is_empty()
    }

    pub fn statuses(&self) -> impl Iterator<Item = &str> {
        self.statuses.iter().map(String::as_str)
    }

    /// True when any of the pod's observed statuses is in the set
    pub fn matches(&self, pod: &PodSnapshot) -> bool {
        observed_statuses(pod).any(|status| self.statuses.contains(status))
    }

    /// Matching pods, in input order, as display entries
    pub fn select<'a>(&'a self, pods: &'a [PodSnapshot]) -> impl Iterator<Item = MatchedPod> + 'a {
        pods.iter()
            .filter(move |pod| self.matches(pod))
            .map(MatchedPod::from)
    }
}

/// Every status a pod exhibits: init reasons, container reasons, then phase
fn observed_statuses(pod: &PodSnapshot) -> impl Iterator<Item = &str> {
    pod.status
        .init_container_reasons
        .iter()
        .chain(pod.status.container_reasons.iter())
        .map(String::as_str)
        .chain(pod.phase())
}

/// The status shown for a pod: first container reason, else the phase
pub fn primary_status(pod: &PodSnapshot) -> &str {
    pod.status
        .container_reasons
        .first()
        .map(String::as_str)
        .or_else(|| pod.phase())
        .unwrap_or("Unknown")
}

/// A pod selected by a [`StatusFilter`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MatchedPod {
    pub pod: PodKey,
    pub node: Option<String>,
    pub status: String,
    pub restarts: u32,
}

impl From<&PodSnapshot> for MatchedPod {
    fn from(pod: &PodSnapshot) -> Self {
        Self {
            pod: pod.key(),
            node: pod.node_name.clone(),
            status: primary_status(pod).to_string(),
            restarts: pod.status.restarts,
        }
    }
}
