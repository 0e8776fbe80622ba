//! # Declarative
//!
//! A dependency-ordered engine for declarative infrastructure.
//!
//! Declarations go in; a plan comes out; the plan is applied against a
//! provisioning backend while a state store records what exists.
//!
//! ## Core Concepts
//!
//! - **Declaration**: a resource identifier, kind tag, attributes and
//!   explicit dependencies
//! - **Value / Reference**: attributes are a tagged tree; a reference
//!   points at another resource's output attribute
//! - **ResourceGraph**: declarations plus dependency edges, validated for
//!   dangling references
//! - **check**: cycle detection and a deterministic topological order
//! - **ExecutionPlan**: create / update / destroy / no-op per resource,
//!   diffed against recorded state
//! - **Executor**: applies the plan, blocking dependents of failures while
//!   independent branches continue
//! - **StateStore**: last-known attributes per resource, written after
//!   every operation
//!
//! ## Example
//!
//! ```ignore
//! use declarative::{
//!     Declaration, ExecuteOptions, ExecutionPlan, Executor, MemoryStateStore,
//!     NoProgress, ResourceGraph, ResourceKind, Value, check,
//! };
//!
//! let graph = ResourceGraph::build(vec![
//!     Declaration::new("bucket", ResourceKind::Bucket).with_attribute("name", "records"),
//!     Declaration::new("role", ResourceKind::Role),
//!     Declaration::new("function", ResourceKind::Function)
//!         .with_attribute("role", Value::reference("role", "arn"))
//!         .with_dependency("bucket"),
//! ])?;
//! let order = check(&graph)?;
//!
//! let state = MemoryStateStore::new();
//! let plan = ExecutionPlan::build(&graph, &order, &state)?;
//! let report = Executor::new(&my_backend, &state, ExecuteOptions::default())
//!     .execute(&plan, &mut NoProgress)?;
//! assert!(report.is_success());
//! ```
//!
//! ## Provider Traits
//!
//! - [`Backend`]: creates and destroys resources
//! - [`StateStore`]: persists per-resource records
//! - [`ProgressCallback`]: receives progress updates
//! - [`ConfirmCallback`]: handles user confirmations

pub mod backend;
pub mod context;
pub mod cycle;
pub mod diff;
pub mod error;
pub mod executor;
pub mod graph;
pub mod planner;
pub mod resource;
pub mod retry;
pub mod state;
pub mod types;
pub mod value;

// Re-export main types at crate root
pub use backend::{Backend, BackendError, ErrorKind};
pub use context::{
    AutoConfirm, AutoDecline, CancelToken, ConfirmCallback, NoProgress, ProgressCallback,
};
pub use cycle::check;
pub use diff::{DiffSummary, group_by_kind};
pub use error::{Error, Result};
pub use executor::{Executor, execute};
pub use graph::ResourceGraph;
pub use planner::{ExecutionPlan, PlannedOperation};
pub use resource::{Declaration, ResourceKind};
pub use retry::{RetryCallback, RetryConfig, with_retry};
pub use state::{MemoryStateStore, StateRecord, StateStore};
pub use types::{
    Action, ExecuteOptions, ExecuteSummary, ExecutionReport, ReportEntry, ResourceStatus,
};
pub use value::{Attributes, Literal, Reference, Value, resolve_attributes};
