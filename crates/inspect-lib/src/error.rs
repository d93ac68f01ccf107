//! Error taxonomy for snapshot collection and analysis

use crate::quantity::QuantityError;
use thiserror::Error;

/// Errors that stop an analysis run
#[derive(Debug, Error)]
pub enum AnalysisError {
    /// Pods or nodes could not be listed; nothing is analyzed
    #[error("cluster snapshot unavailable: failed to list {resource}: {reason}")]
    SnapshotUnavailable { resource: String, reason: String },

    /// Usage samples could not be obtained
    #[error("metrics unavailable: {reason}")]
    MetricsUnavailable { reason: String },

    /// A declared quantity could not be parsed
    #[error("malformed quantity {value:?} for {field} on {}: {reason}", location(.object, .container))]
    MalformedQuantity {
        object: String,
        container: Option<String>,
        field: String,
        value: String,
        reason: QuantityError,
    },

    /// Single-node analysis named a node missing from the snapshot
    #[error("node '{0}' not found")]
    NodeNotFound(String),
}

fn location(object: &str, container: &Option<String>) -> String {
    match container {
        Some(container) => format!("{} (container {})", object, container),
        None => object.to_string(),
    }
}

pub type Result<T> = std::result::Result<T, AnalysisError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_malformed_quantity_message_names_container_and_field() {
        let err = AnalysisError::MalformedQuantity {
            object: "default/web-0".to_string(),
            container: Some("app".to_string()),
            field: "requests.cpu".to_string(),
            value: "lots".to_string(),
            reason: QuantityError::Invalid("expected a number".to_string()),
        };
        let message = err.to_string();
        assert!(message.contains("default/web-0 (container app)"));
        assert!(message.contains("requests.cpu"));
        assert!(message.contains("\"lots\""));
    }

    #[test]
    fn test_node_level_malformed_quantity_has_no_container() {
        let err = AnalysisError::MalformedQuantity {
            object: "node-a".to_string(),
            container: None,
            field: "allocatable.memory".to_string(),
            value: "12Qi".to_string(),
            reason: QuantityError::Invalid("unknown suffix".to_string()),
        };
        assert!(err.to_string().contains("on node-a:"));
    }
}
