//! Error types for stack declaration and provisioning

use thiserror::Error;

use crate::domain::{NetworkError, ResourceNameError, ValidationError};

/// Errors that can occur while planning, declaring or applying a stack
///
/// `Clone` because a single deferred value may be awaited by many
/// consumers, and each of them receives the same failure.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum StackError {
    /// Requested subnets do not fit in the base block at the chosen prefix
    #[error("Address space exhausted: {cidr} holds {capacity} /{prefix_len} subnets, {requested} requested")]
    AddressSpaceExhausted {
        cidr: String,
        prefix_len: u8,
        requested: usize,
        capacity: usize,
    },

    /// Malformed or unusable CIDR block
    #[error("Invalid CIDR block: {0}")]
    InvalidCidr(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// A required upstream value was never produced
    #[error("Dependency unresolved for {resource}: {dependency}")]
    DependencyUnresolved { resource: String, dependency: String },

    /// The provisioning engine rejected a resource body
    #[error("Provision error for {resource}: {reason}")]
    Provision { resource: String, reason: String },

    /// An external lookup failed
    #[error("Lookup failed for {query}: {reason}")]
    Lookup { query: String, reason: String },

    /// A topology invariant does not hold
    #[error("Invariant violated: {0}")]
    InvariantViolation(#[from] ValidationError),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Journal sink error
    #[error("Journal error: {0}")]
    Journal(String),
}

/// Result type for stack operations
pub type StackResult<T> = Result<T, StackError>;

impl StackError {
    /// Shorthand for a provisioning failure on a named resource
    pub fn provision(resource: impl ToString, reason: impl ToString) -> Self {
        StackError::Provision {
            resource: resource.to_string(),
            reason: reason.to_string(),
        }
    }

    /// Shorthand for a missing upstream value
    pub fn unresolved(resource: impl ToString, dependency: impl ToString) -> Self {
        StackError::DependencyUnresolved {
            resource: resource.to_string(),
            dependency: dependency.to_string(),
        }
    }
}

impl From<serde_json::Error> for StackError {
    fn from(err: serde_json::Error) -> Self {
        StackError::Serialization(err.to_string())
    }
}

impl From<NetworkError> for StackError {
    fn from(err: NetworkError) -> Self {
        StackError::InvalidCidr(err.to_string())
    }
}

impl From<ResourceNameError> for StackError {
    fn from(err: ResourceNameError) -> Self {
        StackError::Configuration(err.to_string())
    }
}

