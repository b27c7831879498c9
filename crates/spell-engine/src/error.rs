//! Error types for the spell engine.

use thiserror::Error;

use crate::socket::SocketType;

/// Result type used by component workers and the engine.
pub type Result<T> = std::result::Result<T, EngineError>;

/// Result type used by component builders and shape construction.
pub type BuildResult<T> = std::result::Result<T, StructuralError>;

/// Runtime errors raised while executing a pass.
#[derive(Debug, Error)]
pub enum EngineError {
    /// A non-multi data input had no connection and no seeded value.
    #[error("Missing required input '{port}' on node '{node}'")]
    MissingInput { node: String, port: String },

    /// A worker received a value it cannot interpret.
    #[error("Invalid input on port '{port}': expected {expected}")]
    InvalidInputType { port: String, expected: String },

    /// A worker asked for an extension that was never installed.
    #[error("Extension '{0}' not found in the worker context")]
    ExtensionNotFound(String),

    /// A component worker returned an error.
    #[error("Worker failed: {0}")]
    WorkerFailed(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl EngineError {
    /// Convenience constructor for worker failures.
    pub fn failed(msg: impl Into<String>) -> Self {
        Self::WorkerFailed(msg.into())
    }
}

/// Structural problems found while building shapes or compiling a spell.
///
/// Compilation collects every structural error it can find rather than
/// stopping at the first one, so authors see the full list in one round.
#[derive(Debug, Clone, Error)]
pub enum StructuralError {
    /// A node names a component the registry does not know.
    #[error("Node '{node}' references unknown component '{component}'")]
    UnknownComponent { node: String, component: String },

    /// A connection names a node that is not in the spell.
    #[error("Connection on node '{referenced_by}' references unknown node '{node}'")]
    UnknownNode { node: String, referenced_by: String },

    /// A connection targets an input port the node's shape does not declare.
    #[error("Node '{node}' has no input port '{port}'")]
    UnknownInputPort { node: String, port: String },

    /// A connection reads an output port the node's shape does not declare.
    #[error("Node '{node}' has no output port '{port}'")]
    UnknownOutputPort { node: String, port: String },

    /// The source and destination sockets of a connection do not match.
    #[error(
        "Incompatible sockets on {source_node}:{source_port} ({source_socket}) -> {target}:{target_port} ({target_socket})"
    )]
    IncompatibleSockets {
        // Named `source_node` rather than `source`: thiserror treats a field
        // named `source` as the error's source, which must implement Error.
        source_node: String,
        source_port: String,
        source_socket: SocketType,
        target: String,
        target_port: String,
        target_socket: SocketType,
    },

    /// A single-connection input port received more than one connection.
    #[error("Input '{port}' on node '{node}' accepts a single connection, got {count}")]
    TooManyConnections {
        node: String,
        port: String,
        count: usize,
    },

    /// A builder declared the same port name twice for one direction.
    #[error("Duplicate port '{port}'")]
    DuplicatePort { port: String },

    /// A builder declared the same control key twice.
    #[error("Duplicate control '{key}'")]
    DuplicateControl { key: String },

    /// A component builder returned an error while declaring its shape.
    #[error("Builder for component '{component}' on node '{node}' failed: {message}")]
    BuilderFailed {
        node: String,
        component: String,
        message: String,
    },

    /// The spell contains a connection cycle.
    #[error("Cycle detected in spell graph")]
    CycleDetected,
}

/// Aggregate of every structural error found while compiling one spell.
#[derive(Debug, Error)]
#[error("Spell failed to compile with {} structural error(s)", .errors.len())]
pub struct CompileError {
    pub errors: Vec<StructuralError>,
}

impl CompileError {
    /// True if any collected error matches the given predicate.
    pub fn any(&self, predicate: impl Fn(&StructuralError) -> bool) -> bool {
        self.errors.iter().any(predicate)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = EngineError::MissingInput {
            node: "recall-1".to_string(),
            port: "event".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Missing required input 'event' on node 'recall-1'"
        );

        let err = EngineError::failed("store unreachable");
        assert_eq!(err.to_string(), "Worker failed: store unreachable");
    }

    #[test]
    fn test_serde_error_converts() {
        let result: Result<serde_json::Value> =
            serde_json::from_str("not json").map_err(EngineError::from);
        assert!(matches!(result, Err(EngineError::Serialization(_))));
    }

    #[test]
    fn test_compile_error_counts() {
        let err = CompileError {
            errors: vec![
                StructuralError::CycleDetected,
                StructuralError::DuplicatePort {
                    port: "trigger".to_string(),
                },
            ],
        };
        assert_eq!(
            err.to_string(),
            "Spell failed to compile with 2 structural error(s)"
        );
        assert!(err.any(|e| matches!(e, StructuralError::CycleDetected)));
        assert!(!err.any(|e| matches!(e, StructuralError::UnknownNode { .. })));
    }
}
