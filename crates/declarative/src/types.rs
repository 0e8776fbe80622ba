//! Core types for plans, statuses and execution reports

use crate::context::CancelToken;
use crate::resource::ResourceKind;
use crate::retry::RetryConfig;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle status of a resource
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceStatus {
    /// Present in the declarations, not yet planned
    Declared,
    /// Scheduled in a plan, not yet started
    Planned,
    /// Backend operation in flight
    Applying,
    /// Created, updated or already up to date
    Applied,
    /// Backend operation failed
    Failed,
    /// Never attempted because a dependency failed
    Blocked,
    /// Never attempted because the run was cancelled
    Cancelled,
    /// Torn down
    Destroyed,
}

impl ResourceStatus {
    /// Whether the status is final for a run
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::Applied | Self::Failed | Self::Blocked | Self::Cancelled | Self::Destroyed
        )
    }

    /// Whether dependents may proceed after this status
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Applied | Self::Destroyed)
    }

    /// Whether dependents must be blocked after this status
    pub fn is_failure(&self) -> bool {
        matches!(self, Self::Failed | Self::Blocked)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Declared => "declared",
            Self::Planned => "planned",
            Self::Applying => "applying",
            Self::Applied => "applied",
            Self::Failed => "failed",
            Self::Blocked => "blocked",
            Self::Cancelled => "cancelled",
            Self::Destroyed => "destroyed",
        }
    }
}

impl fmt::Display for ResourceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Operation planned for a resource
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    Create,
    Update,
    Destroy,
    NoOp,
}

impl Action {
    /// Whether the action issues a backend call
    pub fn is_change(&self) -> bool {
        !matches!(self, Self::NoOp)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Create => "create",
            Self::Update => "update",
            Self::Destroy => "destroy",
            Self::NoOp => "no-op",
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Terminal outcome of one planned operation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportEntry {
    pub resource_id: String,
    pub kind: ResourceKind,
    pub action: Action,
    pub status: ResourceStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Per-resource outcomes of a run, in plan order
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionReport {
    pub entries: Vec<ReportEntry>,
}

impl ExecutionReport {
    /// Look up the entry for a resource
    pub fn get(&self, resource_id: &str) -> Option<&ReportEntry> {
        self.entries.iter().find(|e| e.resource_id == resource_id)
    }

    /// Status of a resource, if it was part of the plan
    pub fn status(&self, resource_id: &str) -> Option<ResourceStatus> {
        self.get(resource_id).map(|e| e.status)
    }

    /// A run fails if any resource failed, was blocked or was never started
    pub fn is_success(&self) -> bool {
        self.entries.iter().all(|e| e.status.is_success())
    }

    pub fn summary(&self) -> ExecuteSummary {
        let mut summary = ExecuteSummary::default();
        for entry in &self.entries {
            summary.add_entry(entry);
        }
        summary
    }
}

/// Summary of execution results
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecuteSummary {
    pub created: usize,
    pub updated: usize,
    pub destroyed: usize,
    pub unchanged: usize,
    pub failed: usize,
    pub blocked: usize,
    pub cancelled: usize,
}

impl ExecuteSummary {
    /// Total number of actual changes made
    pub fn total_changes(&self) -> usize {
        self.created + self.updated + self.destroyed
    }

    /// Check if execution was fully successful
    pub fn is_success(&self) -> bool {
        self.failed == 0 && self.blocked == 0 && self.cancelled == 0
    }

    /// Total number of resources processed
    pub fn total(&self) -> usize {
        self.total_changes() + self.unchanged + self.failed + self.blocked + self.cancelled
    }

    /// Add a report entry to the summary
    pub fn add_entry(&mut self, entry: &ReportEntry) {
        match (entry.status, entry.action) {
            (ResourceStatus::Applied, Action::Create) => self.created += 1,
            (ResourceStatus::Applied, Action::Update) => self.updated += 1,
            (ResourceStatus::Applied, _) => self.unchanged += 1,
            (ResourceStatus::Destroyed, _) => self.destroyed += 1,
            (ResourceStatus::Failed, _) => self.failed += 1,
            (ResourceStatus::Blocked, _) => self.blocked += 1,
            _ => self.cancelled += 1,
        }
    }
}

/// Options for execution
#[derive(Debug, Clone)]
pub struct ExecuteOptions {
    /// Number of parallel workers; 1 runs operations inline in plan order
    pub jobs: usize,
    /// Retry policy for backend calls
    pub retry: RetryConfig,
    /// Stops scheduling of operations that have not started yet
    pub cancel: CancelToken,
}

impl Default for ExecuteOptions {
    fn default() -> Self {
        Self {
            jobs: 4,
            retry: RetryConfig::no_retry(),
            cancel: CancelToken::default(),
        }
    }
}
