//! Provisioning backend abstraction
//!
//! The [`Backend`] trait is the external system that actually creates and
//! destroys resources. The engine never talks to a provider directly, which
//! keeps real SDK clients, local simulations and test mocks interchangeable.

use crate::resource::ResourceKind;
use crate::value::Attributes;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Categories of backend errors for retry logic
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Eventual-consistency or connectivity issue, worth retrying
    Transient,
    /// Rejected request, retrying will not help
    Permanent,
}

impl ErrorKind {
    /// Whether this error category is worth retrying.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Transient)
    }
}

/// Error returned by a backend operation
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct BackendError {
    pub kind: ErrorKind,
    pub message: String,
}

impl BackendError {
    pub fn transient(message: impl Into<String>) -> Self {
        Self {
            kind: ErrorKind::Transient,
            message: message.into(),
        }
    }

    pub fn permanent(message: impl Into<String>) -> Self {
        Self {
            kind: ErrorKind::Permanent,
            message: message.into(),
        }
    }

    pub fn is_retryable(&self) -> bool {
        self.kind.is_retryable()
    }
}

impl From<std::io::Error> for BackendError {
    fn from(err: std::io::Error) -> Self {
        use std::io::ErrorKind as Io;

        match err.kind() {
            Io::Interrupted | Io::TimedOut | Io::WouldBlock => Self::transient(err.to_string()),
            _ => Self::permanent(err.to_string()),
        }
    }
}

/// Backend trait for provisioning operations
pub trait Backend: Send + Sync {
    /// Create or update a resource.
    ///
    /// `attributes` are fully resolved. Returns provider-assigned
    /// attributes (generated identifiers, ARNs, versions, ...), which are
    /// merged over the inputs in the state store.
    fn apply(&self, kind: ResourceKind, attributes: &Attributes) -> Result<Attributes, BackendError>;

    /// Tear down a resource, given its last recorded attributes.
    fn destroy(&self, kind: ResourceKind, attributes: &Attributes) -> Result<(), BackendError>;
}
