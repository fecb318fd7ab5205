//! Core error types for rlogic-core.
//!
//! Two layers: [`CoreError`] / [`LinkError`] are the `thiserror` enums returned
//! by fallible engine calls, and [`ErrorData`] is the flattened record kept in
//! the engine's error list so callers can inspect everything that went wrong
//! during the last call.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::feature::FeatureLevel;
use crate::id::ObjectId;

/// Severity of a recorded problem.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Severity {
    Warning,
    Error,
}

/// Category of a recorded problem.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorKind {
    Construction,
    IllegalArgument,
    Link,
    Scheduling,
    Serialization,
    Runtime,
    Validation,
    ContentState,
}

/// One entry of the engine's error list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorData {
    pub message: String,
    pub object: Option<ObjectId>,
    pub severity: Severity,
    pub kind: ErrorKind,
}

impl ErrorData {
    pub fn error(kind: ErrorKind, message: impl Into<String>, object: Option<ObjectId>) -> Self {
        ErrorData {
            message: message.into(),
            object,
            severity: Severity::Error,
            kind,
        }
    }

    pub fn warning(kind: ErrorKind, message: impl Into<String>, object: Option<ObjectId>) -> Self {
        ErrorData {
            message: message.into(),
            object,
            severity: Severity::Warning,
            kind,
        }
    }
}

/// Reasons a link or unlink request is refused.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LinkError {
    #[error("Can't link properties of complex types directly, currently only primitive properties can be linked")]
    NotPrimitive,

    #[error("Failed to link {from_semantics} property '{from}' to {to_semantics} property '{to}'. Only outputs can be linked to inputs")]
    WrongDirection {
        from: String,
        from_semantics: &'static str,
        to: String,
        to_semantics: &'static str,
    },

    #[error("Types of source property '{from}:{from_type}' does not match target property '{to}:{to_type}'")]
    TypeMismatch {
        from: String,
        from_type: String,
        to: String,
        to_type: String,
    },

    #[error("Link source and target can't belong to the same node! ('{node}')")]
    SameNode { node: String },

    #[error("The property '{to}' of LogicNode '{to_node}' is already linked (to property '{from}' of LogicNode '{from_node}')")]
    AlreadyLinked {
        to: String,
        to_node: String,
        from: String,
        from_node: String,
    },

    #[error("Failed to link output property '{from}' of LogicNode '{from_node}' to input property '{to}' of LogicNode '{to_node}': the link would create a loop")]
    WouldCreateCycle {
        from: String,
        from_node: String,
        to: String,
        to_node: String,
    },

    #[error("Input property '{to}' is not currently linked!")]
    NotLinked { to: String },
}

/// Core errors produced by the rlogic-core crate.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CoreError {
    /// A factory call could not build the requested object.
    #[error("{reason}")]
    Construction { reason: String },

    /// A link or unlink request was refused.
    #[error(transparent)]
    Link(#[from] LinkError),

    /// The strong-link graph could not be ordered.
    #[error("Failed to sort logic nodes based on links between their properties. Create a loop-free link graph before calling {operation}!")]
    Scheduling { operation: &'static str },

    /// A node's behavior failed during `update()`.
    #[error("{message}")]
    Runtime { node: ObjectId, message: String },

    /// A handle created by a different engine instance was passed in.
    #[error("{kind} '{name}' is not an instance of this LogicEngine")]
    ForeignObject { kind: &'static str, name: String },

    /// An object id no longer resolves in this engine.
    #[error("object not found: ObjectId({id})", id = id.0)]
    NotFound { id: ObjectId },

    /// The requested capability is above the engine's feature level.
    #[error("{what} requires feature level {required} or higher, feature level in this runtime set to {actual}")]
    FeatureLevel {
        what: &'static str,
        required: FeatureLevel,
        actual: FeatureLevel,
    },

    /// The object is still referenced by another object.
    #[error("{reason}")]
    InUse { reason: String },

    #[error("{reason}")]
    IllegalArgument { reason: String },
}

impl CoreError {
    /// The [`ErrorKind`] this error is recorded under.
    pub fn kind(&self) -> ErrorKind {
        match self {
            CoreError::Construction { .. } | CoreError::FeatureLevel { .. } => {
                ErrorKind::Construction
            }
            CoreError::Link(_) => ErrorKind::Link,
            CoreError::Scheduling { .. } => ErrorKind::Scheduling,
            CoreError::Runtime { .. } => ErrorKind::Runtime,
            CoreError::ForeignObject { .. }
            | CoreError::NotFound { .. }
            | CoreError::InUse { .. }
            | CoreError::IllegalArgument { .. } => ErrorKind::IllegalArgument,
        }
    }
}

/// Flattened report of everything recorded during the last fallible call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ErrorReport {
    pub entries: Vec<ErrorData>,
}

impl ErrorReport {
    pub fn push(&mut self, data: ErrorData) {
        self.entries.push(data);
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn has_errors(&self) -> bool {
        self.entries.iter().any(|e| e.severity == Severity::Error)
    }

    /// All messages joined with newlines.
    pub fn joined(&self) -> String {
        self.entries
            .iter()
            .map(|e| e.message.as_str())
            .collect::<Vec<_>>()
            .join("\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scheduling_message_names_operation() {
        let err = CoreError::Scheduling {
            operation: "update()",
        };
        insta::assert_snapshot!(err.to_string(), @"Failed to sort logic nodes based on links between their properties. Create a loop-free link graph before calling update()!");
        assert_eq!(err.kind(), ErrorKind::Scheduling);
    }

    #[test]
    fn link_error_converts_into_core_error() {
        let err: CoreError = LinkError::SameNode {
            node: "script".into(),
        }
        .into();
        assert_eq!(err.kind(), ErrorKind::Link);
        assert_eq!(
            err.to_string(),
            "Link source and target can't belong to the same node! ('script')"
        );
    }

    #[test]
    fn feature_level_message() {
        let err = CoreError::FeatureLevel {
            what: "Creating render group binding",
            required: FeatureLevel::Level03,
            actual: FeatureLevel::Level01,
        };
        assert_eq!(
            err.to_string(),
            "Creating render group binding requires feature level 03 or higher, feature level in this runtime set to 01"
        );
    }

    #[test]
    fn report_joins_messages() {
        let mut report = ErrorReport::default();
        assert!(report.is_empty());
        report.push(ErrorData::warning(ErrorKind::Validation, "first", None));
        assert!(!report.has_errors());
        report.push(ErrorData::error(ErrorKind::Runtime, "second", Some(ObjectId(3))));
        assert!(report.has_errors());
        assert_eq!(report.joined(), "first\nsecond");
    }
}
