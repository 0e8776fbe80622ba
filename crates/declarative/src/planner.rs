//! Execution planner - diffs declared resources against recorded state
//!
//! The plan is an ordered list of operations, one per resource:
//! destroys first (dependents before their dependencies), then creates,
//! updates and no-ops in topological order. Each operation lists the
//! operations it has to wait for, which is what the executor schedules on.

use crate::cycle::topological_order;
use crate::error::{Error, Result};
use crate::graph::ResourceGraph;
use crate::resource::{Declaration, ResourceKind};
use crate::state::{StateRecord, StateStore};
use crate::types::{Action, ResourceStatus};
use std::collections::{BTreeMap, BTreeSet};

/// One operation of an execution plan
#[derive(Debug, Clone, PartialEq)]
pub struct PlannedOperation {
    pub resource_id: String,
    pub kind: ResourceKind,
    pub action: Action,
    /// Desired declaration; `None` for destroys
    pub declaration: Option<Declaration>,
    /// Identifiers this resource depends on
    pub depends_on: Vec<String>,
    /// Indices of plan operations that must succeed first
    pub waits_on: Vec<usize>,
}

/// An ordered, immutable execution plan
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExecutionPlan {
    operations: Vec<PlannedOperation>,
}

impl ExecutionPlan {
    /// Build a plan for a checked graph against the current state.
    ///
    /// `order` must be a topological order of `graph`, as returned by
    /// [`crate::cycle::check`].
    pub fn build(graph: &ResourceGraph, order: &[usize], state: &dyn StateStore) -> Result<Self> {
        let snapshot = state.snapshot()?;

        let orphans: BTreeMap<&str, &StateRecord> = snapshot
            .iter()
            .filter(|(id, _)| !graph.contains(id.as_str()))
            .map(|(id, record)| (id.as_str(), record))
            .collect();
        let mut operations = destroy_operations(&orphans)?;

        let offset = operations.len();
        let mut slot = vec![0; graph.len()];
        for (position, &node) in order.iter().enumerate() {
            slot[node] = offset + position;
        }

        for &node in order {
            let declaration = graph.node(node);
            let recorded = snapshot.get(&declaration.id);
            if let Some(record) = recorded
                && record.kind != declaration.kind
            {
                return Err(Error::KindChanged {
                    resource: declaration.id.clone(),
                    recorded: record.kind,
                    declared: declaration.kind,
                });
            }
            let action = diff_action(declaration, recorded);
            let deps = graph.dependencies(node);

            operations.push(PlannedOperation {
                resource_id: declaration.id.clone(),
                kind: declaration.kind,
                action,
                declaration: Some(declaration.clone()),
                depends_on: deps.iter().map(|&d| graph.node(d).id.clone()).collect(),
                waits_on: deps.iter().map(|&d| slot[d]).collect(),
            });
        }

        // A removed resource outlives whatever was recorded as using it
        for (node, declaration) in graph.declarations().iter().enumerate() {
            let Some(record) = snapshot.get(&declaration.id) else {
                continue;
            };
            for op in operations[..offset].iter_mut() {
                if record.depends_on.contains(&op.resource_id) {
                    op.waits_on.push(slot[node]);
                }
            }
        }

        let plan = Self { operations };
        log::debug!("Planned {} operations", plan.len());
        Ok(plan)
    }

    /// Plan a full teardown of everything in state
    pub fn destroy_all(state: &dyn StateStore) -> Result<Self> {
        let snapshot = state.snapshot()?;
        let records: BTreeMap<&str, &StateRecord> =
            snapshot.iter().map(|(id, r)| (id.as_str(), r)).collect();
        Ok(Self {
            operations: destroy_operations(&records)?,
        })
    }

    /// Plan a teardown of targeted recorded resources and everything that
    /// depends on them.
    ///
    /// Target format: "id", "kind" or "kind.id".
    pub fn destroy_targets(state: &dyn StateStore, targets: &[String]) -> Result<Self> {
        let plan = Self::destroy_all(state)?;
        if targets.is_empty() {
            return Ok(plan);
        }

        let snapshot = state.snapshot()?;
        let mut doomed: BTreeSet<&str> = BTreeSet::new();
        for target in targets {
            let matched: Vec<&str> = snapshot
                .values()
                .filter(|r| record_matches(r, target))
                .map(|r| r.id.as_str())
                .collect();
            if matched.is_empty() {
                return Err(Error::UnknownTarget(target.clone()));
            }
            doomed.extend(matched);
        }

        // Dependents have to go before the things they depend on
        loop {
            let dependents: Vec<&str> = snapshot
                .values()
                .filter(|r| !doomed.contains(r.id.as_str()))
                .filter(|r| r.depends_on.iter().any(|d| doomed.contains(d.as_str())))
                .map(|r| r.id.as_str())
                .collect();
            if dependents.is_empty() {
                break;
            }
            doomed.extend(dependents);
        }

        Ok(plan.filter(|op| doomed.contains(op.resource_id.as_str())))
    }

    /// Restrict the plan to targeted resources and their dependencies.
    ///
    /// Target format: "id", "kind" or "kind.id". Destroys are dropped.
    pub fn targeted(self, graph: &ResourceGraph, targets: &[String]) -> Result<Self> {
        if targets.is_empty() {
            return Ok(self);
        }

        let mut roots = Vec::new();
        for target in targets {
            let matched: Vec<usize> = (0..graph.len())
                .filter(|&i| graph.node(i).matches_target(target))
                .collect();
            if matched.is_empty() {
                return Err(Error::UnknownTarget(target.clone()));
            }
            roots.extend(matched);
        }

        let keep: BTreeSet<&str> = graph
            .with_dependencies(&roots)
            .into_iter()
            .map(|i| graph.node(i).id.as_str())
            .collect();

        Ok(self.filter(|op| op.action != Action::Destroy && keep.contains(op.resource_id.as_str())))
    }

    /// Keep only operations matching a predicate, re-indexing waits
    pub fn filter<F>(self, predicate: F) -> Self
    where
        F: Fn(&PlannedOperation) -> bool,
    {
        let mut remap = vec![None; self.operations.len()];
        let mut kept = Vec::new();
        for (i, op) in self.operations.into_iter().enumerate() {
            if predicate(&op) {
                remap[i] = Some(kept.len());
                kept.push(op);
            }
        }
        for op in &mut kept {
            op.waits_on = op.waits_on.iter().filter_map(|&w| remap[w]).collect();
        }
        Self { operations: kept }
    }

    pub fn operations(&self) -> &[PlannedOperation] {
        &self.operations
    }

    pub fn get(&self, resource_id: &str) -> Option<&PlannedOperation> {
        self.operations.iter().find(|op| op.resource_id == resource_id)
    }

    /// Position of a resource's operation in the plan
    pub fn position(&self, resource_id: &str) -> Option<usize> {
        self.operations
            .iter()
            .position(|op| op.resource_id == resource_id)
    }

    pub fn len(&self) -> usize {
        self.operations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.operations.is_empty()
    }

    /// Whether any operation will call the backend
    pub fn has_changes(&self) -> bool {
        self.operations.iter().any(|op| op.action.is_change())
    }
}

/// Decide what to do with a declared resource given its recorded state
fn diff_action(declaration: &Declaration, recorded: Option<&StateRecord>) -> Action {
    match recorded {
        None => Action::Create,
        Some(record) if record.status != ResourceStatus::Applied => Action::Update,
        Some(record) if record.config != declaration.attributes => Action::Update,
        Some(_) => Action::NoOp,
    }
}

fn record_matches(record: &StateRecord, target: &str) -> bool {
    if record.id == target || record.kind.as_str() == target {
        return true;
    }
    match target.split_once('.') {
        Some((kind, id)) => kind == record.kind.as_str() && id == record.id,
        None => false,
    }
}

/// Destroy operations for recorded resources, dependents first
fn destroy_operations(records: &BTreeMap<&str, &StateRecord>) -> Result<Vec<PlannedOperation>> {
    let ids: Vec<&str> = records.keys().copied().collect();
    let index = |id: &str| ids.iter().position(|&i| i == id);

    let edges: Vec<Vec<usize>> = ids
        .iter()
        .map(|id| {
            let mut deps: Vec<usize> = records[id]
                .depends_on
                .iter()
                .filter_map(|d| index(d.as_str()))
                .collect();
            deps.sort_unstable();
            deps.dedup();
            deps
        })
        .collect();

    let mut order = topological_order(&edges).map_err(|cycle| Error::CyclicDependency {
        path: cycle.into_iter().map(|i| ids[i].to_string()).collect(),
    })?;
    order.reverse();

    let mut slot = vec![0; ids.len()];
    for (position, &node) in order.iter().enumerate() {
        slot[node] = position;
    }

    Ok(order
        .iter()
        .map(|&node| {
            let record = records[ids[node]];
            // A dependency can only go once everything depending on it is gone
            let waits_on = (0..ids.len())
                .filter(|&other| edges[other].contains(&node))
                .map(|other| slot[other])
                .collect();
            PlannedOperation {
                resource_id: record.id.clone(),
                kind: record.kind,
                action: Action::Destroy,
                declaration: None,
                depends_on: record.depends_on.clone(),
                waits_on,
            }
        })
        .collect())
}
