// Central Error Types for the Unit of Work

use crate::domain::{ConnectionKey, ContextType, EntityType};
use std::fmt;
use thiserror::Error;

/// Failure reported by a collaborator (resolver, context or transaction handle).
///
/// The coordinator never retries; these are surfaced verbatim inside a
/// [`UnitOfWorkError`] that adds the context type and connection identity.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Invalid state: {0}")]
    InvalidState(String),

    #[error("Incompatible connection: {0}")]
    IncompatibleConnection(String),

    #[error("Unsupported: {0}")]
    Unsupported(String),
}

/// Result type alias for collaborator operations
pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// Step of a resolve call that failed after the locator and config lookups succeeded
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolveStep {
    Resolve,
    BeginTransaction,
    EnlistTransaction,
}

impl fmt::Display for ResolveStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResolveStep::Resolve => write!(f, "resolve context"),
            ResolveStep::BeginTransaction => write!(f, "begin transaction"),
            ResolveStep::EnlistTransaction => write!(f, "enlist in shared transaction"),
        }
    }
}

/// Kind of resource a release (rollback or dispose) was attempted on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceKind {
    /// The primary transaction of a record, opened by its starter
    Transaction,
    /// The independent transaction of a non-relational attendee
    IndependentTransaction,
    Context,
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResourceKind::Transaction => write!(f, "transaction"),
            ResourceKind::IndependentTransaction => write!(f, "independent transaction"),
            ResourceKind::Context => write!(f, "context"),
        }
    }
}

/// One failed release, kept so that disposal can continue with the remaining resources
#[derive(Error, Debug)]
#[error("{resource} of `{context}` on connection `{key}`: {error}")]
pub struct ReleaseFailure {
    pub key: ConnectionKey,
    pub context: ContextType,
    pub resource: ResourceKind,
    #[source]
    pub error: StoreError,
}

/// Unit-of-work error type
#[derive(Error, Debug)]
pub enum UnitOfWorkError {
    #[error("No persistence context claims entity `{entity}`")]
    UnknownEntityContext { entity: EntityType },

    #[error("No connection configuration registered for context `{context}`")]
    MissingContextConfiguration { context: ContextType },

    #[error("{count} connection configurations match context `{context}`")]
    AmbiguousContextConfiguration { context: ContextType, count: usize },

    #[error("A transaction is already active for connection `{key}`")]
    DuplicateTransaction { key: ConnectionKey },

    #[error("Failed to {step} for context `{context}` on connection `{key}`: {source}")]
    ResolveFailed {
        step: ResolveStep,
        context: ContextType,
        key: ConnectionKey,
        #[source]
        source: StoreError,
    },

    #[error("Commit failed for context `{context}` on connection `{key}`: {source}")]
    CommitFailed {
        key: ConnectionKey,
        context: ContextType,
        #[source]
        source: StoreError,
    },

    #[error("Rollback failed for {} resource(s): {}", .failures.len(), summarize(.failures))]
    RollbackFailed { failures: Vec<ReleaseFailure> },

    #[error("Dispose failed for {} resource(s): {}", .failures.len(), summarize(.failures))]
    DisposeFailed { failures: Vec<ReleaseFailure> },

    #[error("Context `{context}` is not a `{expected}`")]
    ContextTypeMismatch {
        context: ContextType,
        expected: &'static str,
    },

    #[error("Mapping error: {0}")]
    Mapping(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

/// Result type alias using UnitOfWorkError
pub type Result<T> = std::result::Result<T, UnitOfWorkError>;

impl From<::config::ConfigError> for UnitOfWorkError {
    fn from(err: ::config::ConfigError) -> Self {
        UnitOfWorkError::Config(err.to_string())
    }
}

fn summarize(failures: &[ReleaseFailure]) -> String {
    failures
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}
