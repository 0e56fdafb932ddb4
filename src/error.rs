//! Error taxonomy.
//!
//! [`MatchError`] is recoverable and never escapes rule evaluation: the
//! evaluator turns it into a failed rule. [`ProtocolError`] is raised when a
//! protocol document is structurally invalid, and [`EngineError`] covers the
//! orchestrator's own operations.

use thiserror::Error;

use crate::attribute::TargetKind;

/// Failure while resolving an attribute or applying a constraint.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MatchError {
    #[error("attribute `{name}` is not registered and not present on the target")]
    AttributeNotFound { name: String },

    #[error("attribute `{name}` cannot be read from a {kind} target")]
    UnsupportedTarget { name: String, kind: TargetKind },

    #[error("malformed `{constraint}` constraint: {reason}")]
    MalformedConstraint {
        constraint: &'static str,
        reason: String,
    },
}

/// A protocol document that cannot be used for matching.
#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("protocol id must not be empty")]
    EmptyId,

    #[error("protocol `{id}` has no stages")]
    EmptyStages { id: String },

    #[error("protocol id `{id}` appears more than once in the library")]
    DuplicateId { id: String },

    #[error("stage {stage} of protocol `{id}` has a viewport structure with no slots")]
    EmptyViewportStructure { id: String, stage: usize },

    #[error("stage {stage} of protocol `{id}` declares no viewports for {slots} slot(s)")]
    NoViewports {
        id: String,
        stage: usize,
        slots: usize,
    },

    #[error("stage {stage} of protocol `{id}` declares {viewports} viewports for {slots} slot(s)")]
    TooManyViewports {
        id: String,
        stage: usize,
        viewports: usize,
        slots: usize,
    },

    #[error("invalid rule on `{attribute}` in protocol `{id}`: {reason}")]
    InvalidRule {
        id: String,
        attribute: String,
        reason: String,
    },

    #[error("failed to parse protocol document: {0}")]
    Json(#[from] serde_json::Error),
}

/// Errors returned by [`ProtocolEngine`](crate::engine::ProtocolEngine) operations.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    #[error("no protocol with id `{id}` in the library")]
    UnknownProtocol { id: String },

    #[error("viewport index {index} is out of range for a stage with {count} viewport(s)")]
    ViewportOutOfRange { index: usize, count: usize },

    #[error("protocol `{id}` is locked and cannot be customized")]
    ProtocolLocked { id: String },

    #[error("invalid engine configuration: {0}")]
    InvalidConfig(String),
}
