//! Transport boundary error types

use crate::core::NodeId;
use crate::processing::ParseError;
use thiserror::Error;

/// Topic addressing errors
#[derive(Debug, Clone, PartialEq, Error)]
pub enum TopicError {
    #[error("Topic '{topic}' is not under '{root}'")]
    ForeignTopic { topic: String, root: String },
    #[error("Topic '{topic}' does not match <root>/<node>/<kind>")]
    Malformed { topic: String },
    #[error("Unknown message kind '{kind}'")]
    UnknownKind { kind: String },
}

/// Why an inbound message was dropped
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RouteError {
    #[error(transparent)]
    Topic(#[from] TopicError),
    #[error("Undecodable payload from {node_id}: {error}")]
    Payload { node_id: NodeId, error: ParseError },
}

/// Result publication errors
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SinkError {
    #[error("Failed to encode {record} record: {details}")]
    Encode { record: &'static str, details: String },
    #[error("Publish to '{topic}' failed: {details}")]
    Publish { topic: String, details: String },
}

impl SinkError {
    /// Transient errors may succeed on the next cycle; the rest will not
    pub fn is_transient(&self) -> bool {
        !matches!(self, SinkError::Encode { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_classification() {
        assert!(SinkError::Publish { topic: "t".into(), details: "full".into() }.is_transient());
        assert!(!SinkError::Encode { record: "position", details: "nan".into() }.is_transient());
    }

    #[test]
    fn test_display() {
        let err = RouteError::Payload {
            node_id: NodeId::new("aa"),
            error: ParseError::InvalidEncoding,
        };
        assert_eq!(err.to_string(), "Undecodable payload from aa: Payload is not valid UTF-8");
    }
}
