//! Error types for the declarative engine.
//!
//! Graph errors (`UnresolvedReference`, `DuplicateResource`,
//! `CyclicDependency`) are raised before anything is provisioned.
//! Everything else is reported per resource by the executor.

use crate::backend::BackendError;
use crate::resource::ResourceKind;
use thiserror::Error;

/// Errors that can occur while building, planning or executing a graph
#[derive(Debug, Error)]
pub enum Error {
    /// A reference or explicit dependency names an undeclared resource
    #[error("resource `{resource}` depends on undeclared resource `{target}`")]
    UnresolvedReference {
        /// Resource holding the dangling reference
        resource: String,
        /// Identifier that could not be found
        target: String,
    },

    /// Two declarations share an identifier
    #[error("resource `{0}` is declared more than once")]
    DuplicateResource(String),

    /// The dependency graph contains a cycle
    #[error("dependency cycle: {}", .path.join(" -> "))]
    CyclicDependency {
        /// Identifiers along the cycle; first and last entries are the same
        path: Vec<String>,
    },

    /// An unknown resource kind tag
    #[error("unknown resource kind `{0}`")]
    UnknownKind(String),

    /// A plan target matched nothing
    #[error("target `{0}` matches no declared resource")]
    UnknownTarget(String),

    /// A reference points at an attribute the target never produced
    #[error("attribute `{reference}` is not known")]
    MissingAttribute {
        /// The reference in `resource.attribute` form
        reference: String,
    },

    /// A recorded resource is now declared with a different kind
    #[error(
        "resource `{resource}` is recorded as {recorded} but declared as {declared}; destroy it first"
    )]
    KindChanged {
        resource: String,
        /// Kind in state
        recorded: ResourceKind,
        /// Kind in the declaration
        declared: ResourceKind,
    },

    /// A create, update or destroy operation was required without a declaration
    #[error("no declaration available for `{0}`")]
    MissingDeclaration(String),

    /// Provisioning backend failure
    #[error(transparent)]
    Backend(#[from] BackendError),

    /// State store read or write failure
    #[error("state store error: {0}")]
    State(String),

    /// Worker pool could not be created
    #[error("failed to create worker pool: {0}")]
    ThreadPool(String),
}

impl Error {
    /// Whether this error is raised before any side effect happens
    pub fn is_pre_execution(&self) -> bool {
        matches!(
            self,
            Self::UnresolvedReference { .. }
                | Self::DuplicateResource(_)
                | Self::CyclicDependency { .. }
                | Self::UnknownKind(_)
                | Self::UnknownTarget(_)
                | Self::KindChanged { .. }
        )
    }
}

/// Result type for engine operations
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cycle_message_lists_path() {
        let err = Error::CyclicDependency {
            path: vec!["a".into(), "b".into(), "a".into()],
        };
        assert_eq!(err.to_string(), "dependency cycle: a -> b -> a");
        assert!(err.is_pre_execution());
    }

    #[test]
    fn test_backend_error_is_not_pre_execution() {
        let err = Error::from(BackendError::permanent("boom"));
        assert!(!err.is_pre_execution());
        assert_eq!(err.to_string(), "boom");
    }
}
