//! Execution engine - applies a plan in dependency order
//!
//! The coordinating thread owns all scheduling state. An operation becomes
//! ready once everything it waits on has succeeded; if any of those failed
//! or were blocked, it is marked blocked without calling the backend.
//! Independent branches keep going either way.
//!
//! With `jobs > 1` ready operations run on a rayon pool and report back
//! over a channel; the state store is written by the worker right after
//! its backend call returns, never at the end of the run.

use crate::backend::Backend;
use crate::context::{ConfirmCallback, ProgressCallback};
use crate::error::{Error, Result};
use crate::planner::{ExecutionPlan, PlannedOperation};
use crate::retry::{LogRetry, with_retry};
use crate::state::{StateRecord, StateStore};
use crate::types::{Action, ExecuteOptions, ExecutionReport, ReportEntry, ResourceStatus};
use crate::value::{Attributes, Reference, resolve_attributes};
use chrono::Utc;
use std::collections::BTreeSet;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::mpsc;

/// Result of running one operation
#[derive(Debug, Clone, PartialEq, Eq)]
struct Outcome {
    status: ResourceStatus,
    error: Option<String>,
}

impl Outcome {
    fn success(status: ResourceStatus) -> Self {
        Self {
            status,
            error: None,
        }
    }

    fn failed(error: impl ToString) -> Self {
        Self {
            status: ResourceStatus::Failed,
            error: Some(error.to_string()),
        }
    }
}

/// Applies execution plans against a backend and a state store
pub struct Executor<'a> {
    backend: &'a dyn Backend,
    state: &'a dyn StateStore,
    options: ExecuteOptions,
}

impl<'a> Executor<'a> {
    pub fn new(backend: &'a dyn Backend, state: &'a dyn StateStore, options: ExecuteOptions) -> Self {
        Self {
            backend,
            state,
            options,
        }
    }

    /// Run every operation of the plan and report one terminal status per
    /// operation, in plan order.
    ///
    /// Backend failures are recorded in the report rather than returned;
    /// only worker pool setup can fail the call itself.
    pub fn execute<P>(&self, plan: &ExecutionPlan, progress: &mut P) -> Result<ExecutionReport>
    where
        P: ProgressCallback + ?Sized,
    {
        progress.on_plan_start(plan.len());
        let mut scheduler = Scheduler::new(plan);

        if self.options.jobs <= 1 || plan.len() <= 1 {
            self.run_sequential(&mut scheduler, progress);
        } else {
            self.run_parallel(&mut scheduler, progress)?;
        }

        for entry in scheduler.cancel_remaining() {
            progress.on_operation_complete(&entry);
        }
        progress.on_plan_complete();

        let report = scheduler.into_report();
        let summary = report.summary();
        log::info!(
            "Run finished: {} created, {} updated, {} destroyed, {} unchanged, {} failed, {} blocked, {} cancelled",
            summary.created,
            summary.updated,
            summary.destroyed,
            summary.unchanged,
            summary.failed,
            summary.blocked,
            summary.cancelled
        );
        Ok(report)
    }

    fn run_sequential<P>(&self, scheduler: &mut Scheduler<'_>, progress: &mut P)
    where
        P: ProgressCallback + ?Sized,
    {
        while !self.options.cancel.is_cancelled() {
            let Some(idx) = scheduler.next_ready() else {
                break;
            };
            let op = scheduler.operation(idx);
            progress.on_operation_start(&op.resource_id, op.action);

            let outcome = self.run_operation(op);
            for entry in scheduler.complete(idx, outcome) {
                progress.on_operation_complete(&entry);
            }
        }
    }

    fn run_parallel<P>(&self, scheduler: &mut Scheduler<'_>, progress: &mut P) -> Result<()>
    where
        P: ProgressCallback + ?Sized,
    {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.options.jobs)
            .build()
            .map_err(|e| Error::ThreadPool(e.to_string()))?;

        let plan = scheduler.plan;
        let (tx, rx) = mpsc::channel::<(usize, Outcome)>();
        let mut in_flight = 0usize;

        pool.in_place_scope(|scope| {
            loop {
                while !self.options.cancel.is_cancelled() {
                    let Some(idx) = scheduler.next_ready() else {
                        break;
                    };
                    let op = &plan.operations()[idx];
                    progress.on_operation_start(&op.resource_id, op.action);

                    let tx = tx.clone();
                    scope.spawn(move |_| {
                        let outcome = catch_unwind(AssertUnwindSafe(|| self.run_operation(op)))
                            .unwrap_or_else(|_| Outcome::failed("operation panicked"));
                        // The receiver outlives the scope
                        let _ = tx.send((idx, outcome));
                    });
                    in_flight += 1;
                }

                if in_flight == 0 {
                    break;
                }

                let Ok((idx, outcome)) = rx.recv() else {
                    break;
                };
                in_flight -= 1;
                for entry in scheduler.complete(idx, outcome) {
                    progress.on_operation_complete(&entry);
                }
            }
        });

        Ok(())
    }

    fn run_operation(&self, op: &PlannedOperation) -> Outcome {
        let outcome = match op.action {
            Action::NoOp => Outcome::success(ResourceStatus::Applied),
            Action::Create | Action::Update => self.apply_operation(op),
            Action::Destroy => self.destroy_operation(op),
        };

        match &outcome.error {
            None => log::info!("{} {}: {}", op.action, op.resource_id, outcome.status),
            Some(error) => log::warn!("{} {} failed: {}", op.action, op.resource_id, error),
        }
        outcome
    }

    fn apply_operation(&self, op: &PlannedOperation) -> Outcome {
        let Some(declaration) = &op.declaration else {
            return Outcome::failed(Error::MissingDeclaration(op.resource_id.clone()));
        };

        let previous = match self.state.get(&op.resource_id) {
            Ok(previous) => previous,
            Err(e) => return Outcome::failed(e),
        };

        let lookup = |r: &Reference| self.state.lookup(r).ok().flatten();
        let inputs = match resolve_attributes(&declaration.attributes, &lookup) {
            Ok(inputs) => inputs,
            Err(e) => return Outcome::failed(e),
        };

        let request = match (&previous, op.action) {
            (Some(prev), Action::Update) => update_request(prev, &declaration.attributes, &inputs),
            _ => inputs,
        };

        let callback = LogRetry {
            resource_id: &op.resource_id,
        };
        let result = with_retry(&self.options.retry, Some(&callback), || {
            self.backend.apply(declaration.kind, &request)
        });

        match result {
            Ok(outputs) => {
                let mut attributes = request;
                attributes.extend(outputs);

                let record = StateRecord {
                    id: op.resource_id.clone(),
                    kind: declaration.kind,
                    config: declaration.attributes.clone(),
                    attributes,
                    depends_on: op.depends_on.clone(),
                    status: ResourceStatus::Applied,
                    error: None,
                    updated_at: Utc::now(),
                };
                match self.state.put(&op.resource_id, record) {
                    Ok(()) => Outcome::success(ResourceStatus::Applied),
                    Err(e) => Outcome::failed(format!("applied but not recorded: {e}")),
                }
            }
            Err(e) => {
                // A failed create leaves nothing behind; a failed update keeps
                // what was there so dependents can still resolve against it
                if let Some(mut prev) = previous {
                    prev.status = ResourceStatus::Failed;
                    prev.error = Some(e.to_string());
                    prev.updated_at = Utc::now();
                    if let Err(store_err) = self.state.put(&op.resource_id, prev) {
                        log::error!("{}: failed to record failure: {}", op.resource_id, store_err);
                    }
                }
                Outcome::failed(e)
            }
        }
    }

    fn destroy_operation(&self, op: &PlannedOperation) -> Outcome {
        let record = match self.state.get(&op.resource_id) {
            Ok(Some(record)) => record,
            Ok(None) => {
                log::debug!("{} is already gone from state", op.resource_id);
                return Outcome::success(ResourceStatus::Destroyed);
            }
            Err(e) => return Outcome::failed(e),
        };

        let callback = LogRetry {
            resource_id: &op.resource_id,
        };
        let result = with_retry(&self.options.retry, Some(&callback), || {
            self.backend.destroy(record.kind, &record.attributes)
        });

        match result {
            Ok(()) => match self.state.remove(&op.resource_id) {
                Ok(()) => Outcome::success(ResourceStatus::Destroyed),
                Err(e) => Outcome::failed(format!("destroyed but not recorded: {e}")),
            },
            Err(e) => {
                let mut failed = record;
                failed.status = ResourceStatus::Failed;
                failed.error = Some(e.to_string());
                failed.updated_at = Utc::now();
                if let Err(store_err) = self.state.put(&op.resource_id, failed) {
                    log::error!("{}: failed to record failure: {}", op.resource_id, store_err);
                }
                Outcome::failed(e)
            }
        }
    }
}

/// Attributes sent to the backend for an update: the previous attributes
/// without inputs that are no longer declared, overlaid with the new inputs
fn update_request(previous: &StateRecord, declared: &Attributes, inputs: &Attributes) -> Attributes {
    let mut request: Attributes = previous
        .attributes
        .iter()
        .filter(|(key, _)| !previous.config.contains_key(*key) || declared.contains_key(*key))
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect();
    request.extend(inputs.iter().map(|(k, v)| (k.clone(), v.clone())));
    request
}

/// Readiness bookkeeping for one run
struct Scheduler<'p> {
    plan: &'p ExecutionPlan,
    statuses: Vec<ResourceStatus>,
    errors: Vec<Option<String>>,
    dependents: Vec<Vec<usize>>,
    /// Number of unfinished operations each operation still waits on
    pending: Vec<usize>,
    /// Ready operations, lowest plan index first
    ready: BTreeSet<usize>,
}

impl<'p> Scheduler<'p> {
    fn new(plan: &'p ExecutionPlan) -> Self {
        let ops = plan.operations();
        let mut dependents = vec![Vec::new(); ops.len()];
        for (i, op) in ops.iter().enumerate() {
            for &w in &op.waits_on {
                dependents[w].push(i);
            }
        }
        let pending: Vec<usize> = ops.iter().map(|op| op.waits_on.len()).collect();
        let ready = (0..ops.len()).filter(|&i| pending[i] == 0).collect();

        Self {
            plan,
            statuses: vec![ResourceStatus::Planned; ops.len()],
            errors: vec![None; ops.len()],
            dependents,
            pending,
            ready,
        }
    }

    fn operation(&self, idx: usize) -> &'p PlannedOperation {
        &self.plan.operations()[idx]
    }

    /// Take the next ready operation and mark it in flight
    fn next_ready(&mut self) -> Option<usize> {
        let idx = self.ready.pop_first()?;
        self.statuses[idx] = ResourceStatus::Applying;
        Some(idx)
    }

    /// Record an outcome; returns the report entries that became final,
    /// the completed operation first, then anything it blocked
    fn complete(&mut self, idx: usize, outcome: Outcome) -> Vec<ReportEntry> {
        self.statuses[idx] = outcome.status;
        self.errors[idx] = outcome.error;
        let mut finished = vec![self.entry(idx)];

        if outcome.status.is_success() {
            for d in self.dependents[idx].clone() {
                self.pending[d] -= 1;
                if self.pending[d] == 0 && self.statuses[d] == ResourceStatus::Planned {
                    self.ready.insert(d);
                }
            }
        } else {
            let failed = self.operation(idx).resource_id.clone();
            let mut stack = self.dependents[idx].clone();
            while let Some(d) = stack.pop() {
                if self.statuses[d] != ResourceStatus::Planned {
                    continue;
                }
                self.statuses[d] = ResourceStatus::Blocked;
                self.errors[d] = Some(format!("blocked by failure of `{failed}`"));
                self.ready.remove(&d);
                log::warn!("{} blocked by failure of {}", self.operation(d).resource_id, failed);
                finished.push(self.entry(d));
                stack.extend(self.dependents[d].iter().copied());
            }
        }

        finished
    }

    /// Mark every operation that never started as cancelled
    fn cancel_remaining(&mut self) -> Vec<ReportEntry> {
        let mut cancelled = Vec::new();
        for idx in 0..self.statuses.len() {
            if matches!(
                self.statuses[idx],
                ResourceStatus::Planned | ResourceStatus::Applying
            ) {
                self.statuses[idx] = ResourceStatus::Cancelled;
                self.errors[idx] = Some("run cancelled before this operation started".into());
                cancelled.push(self.entry(idx));
            }
        }
        self.ready.clear();
        cancelled
    }

    fn entry(&self, idx: usize) -> ReportEntry {
        let op = self.operation(idx);
        ReportEntry {
            resource_id: op.resource_id.clone(),
            kind: op.kind,
            action: op.action,
            status: self.statuses[idx],
            error: self.errors[idx].clone(),
        }
    }

    fn into_report(self) -> ExecutionReport {
        ExecutionReport {
            entries: (0..self.statuses.len()).map(|i| self.entry(i)).collect(),
        }
    }
}

/// Execute a plan after asking for confirmation.
///
/// Returns `None` when the user declines. Plans without changes run
/// without asking, so the report still lists every resource.
pub fn execute<P, C>(
    executor: &Executor<'_>,
    plan: &ExecutionPlan,
    progress: &mut P,
    confirm: &mut C,
) -> Result<Option<ExecutionReport>>
where
    P: ProgressCallback + ?Sized,
    C: ConfirmCallback + ?Sized,
{
    if plan.has_changes() {
        let confirmed = confirm
            .confirm("Apply these changes?")
            .map_err(|e| Error::State(format!("confirmation failed: {e}")))?;
        if !confirmed {
            return Ok(None);
        }
    }
    executor.execute(plan, progress).map(Some)
}
