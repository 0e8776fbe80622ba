//! Diff summaries over execution plans

use crate::planner::{ExecutionPlan, PlannedOperation};
use crate::resource::ResourceKind;
use crate::types::Action;
use std::collections::BTreeMap;

/// Diff summary statistics
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DiffSummary {
    /// Number of resources to create
    pub additions: usize,
    /// Number of resources to update in place
    pub updates: usize,
    /// Number of resources to destroy
    pub removals: usize,
    /// Number of resources already up to date
    pub unchanged: usize,
}

impl DiffSummary {
    /// Create a summary from a plan
    pub fn from_plan(plan: &ExecutionPlan) -> Self {
        let mut summary = Self::default();
        for op in plan.operations() {
            match op.action {
                Action::Create => summary.additions += 1,
                Action::Update => summary.updates += 1,
                Action::Destroy => summary.removals += 1,
                Action::NoOp => summary.unchanged += 1,
            }
        }
        summary
    }

    /// Total number of changes
    pub fn total(&self) -> usize {
        self.additions + self.updates + self.removals
    }

    /// Check if there are any changes
    pub fn has_changes(&self) -> bool {
        self.total() > 0
    }
}

/// Group the plan's changing operations by resource kind, keeping plan order
/// within each group
pub fn group_by_kind(plan: &ExecutionPlan) -> BTreeMap<ResourceKind, Vec<&PlannedOperation>> {
    let mut groups: BTreeMap<ResourceKind, Vec<&PlannedOperation>> = BTreeMap::new();
    for op in plan.operations().iter().filter(|op| op.action.is_change()) {
        groups.entry(op.kind).or_default().push(op);
    }
    groups
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cycle::check;
    use crate::graph::ResourceGraph;
    use crate::resource::Declaration;
    use crate::state::{MemoryStateStore, StateRecord, StateStore};
    use crate::types::ResourceStatus;

    #[test]
    fn test_summary_and_grouping() {
        let state = MemoryStateStore::new();
        let mut kept = StateRecord::new("bucket", ResourceKind::Bucket, ResourceStatus::Applied);
        kept.config.insert("name".into(), "records".into());
        state.put("bucket", kept).unwrap();
        state
            .put("old", StateRecord::new("old", ResourceKind::Role, ResourceStatus::Applied))
            .unwrap();

        let graph = ResourceGraph::build(vec![
            Declaration::new("bucket", ResourceKind::Bucket).with_attribute("name", "records"),
            Declaration::new("role", ResourceKind::Role),
            Declaration::new("function", ResourceKind::Function).with_dependency("role"),
        ])
        .unwrap();
        let order = check(&graph).unwrap();
        let plan = ExecutionPlan::build(&graph, &order, &state).unwrap();

        let summary = DiffSummary::from_plan(&plan);
        assert_eq!(summary.additions, 2);
        assert_eq!(summary.removals, 1);
        assert_eq!(summary.unchanged, 1);
        assert_eq!(summary.total(), 3);
        assert!(summary.has_changes());

        let groups = group_by_kind(&plan);
        let roles: Vec<&str> = groups[&ResourceKind::Role]
            .iter()
            .map(|op| op.resource_id.as_str())
            .collect();
        assert_eq!(roles, vec!["old", "role"]);
        assert!(!groups.contains_key(&ResourceKind::Bucket));
    }
}
