//! Execution engine: drives the wave iterator over the scoped dependency
//! graph and invokes ready tree functions.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;

use crate::document::Document;
use crate::error::Error;
use crate::function::{ExecutionMode, ExecutionStatus, FuncGuid, UserData};
use crate::graph::DependencyGraph;
use crate::id::ParameterId;
use crate::iterator::SequentialFuncIterator;
use crate::logbook::LogBook;
use crate::registry::FunctionRegistry;
use crate::tracer::{FuncOutcome, Tracer};
use crate::transaction::TransactionEngine;

/// Cooperative cancellation flag, polled between whole function
/// executions (never mid-`execute`; function bodies are opaque).
#[derive(Clone, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
}

impl CancelToken {
    /// Creates a token in the not-cancelled state.
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests cancellation.
    pub fn cancel(&self) {
        self.flag.store(true, Ordering::Relaxed);
    }

    /// Whether cancellation was requested.
    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::Relaxed)
    }
}

/// Per-pass outcome summary.
///
/// `deferred` lists heavy functions handed to the host together with the
/// mode the engine chose for them; everything in it stays pending until the
/// host executes it and commits the results.
#[derive(Debug, Default)]
pub struct PassReport {
    /// Functions whose `execute` ran and succeeded.
    pub executed: Vec<FuncGuid>,
    /// Functions recognized as up to date and not invoked.
    pub skipped: Vec<FuncGuid>,
    /// Failures, one [`Error::FunctionExecutionFailure`] each.
    pub failures: Vec<Error>,
    /// Functions never reached because a predecessor failed or was
    /// deferred.
    pub blocked: Vec<FuncGuid>,
    /// Heavy functions flagged for out-of-band execution by the host.
    pub deferred: Vec<(FuncGuid, ExecutionMode)>,
}

impl PassReport {
    /// Whether every scoped function settled cleanly.
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty() && self.blocked.is_empty() && self.deferred.is_empty()
    }
}

/// Shared execution context: per-function-type user data, persisted
/// execution statuses, and the graph freeze switch.
///
/// User data binding takes `&self` so a host can attach service objects
/// (progress collectors and the like) while the model is shared.
#[derive(Default)]
pub struct ExecutionCtx {
    user_data: RwLock<HashMap<FuncGuid, UserData>>,
    /// Statuses per binding index, surviving across passes so an
    /// interrupted pass resumes instead of re-running finished work.
    statuses: HashMap<usize, ExecutionStatus>,
    frozen: bool,
}

impl ExecutionCtx {
    /// Creates an empty context.
    pub fn new() -> Self {
        Self::default()
    }

    /// Binds custom shared data to a tree-function type.
    pub fn bind_user_data(&self, guid: FuncGuid, data: UserData) {
        self.user_data.write().insert(guid, data);
    }

    /// Removes the data bound to a tree-function type.
    pub fn unbind_user_data(&self, guid: FuncGuid) {
        self.user_data.write().remove(&guid);
    }

    /// Data bound to a tree-function type, if any.
    pub fn user_data(&self, guid: FuncGuid) -> Option<UserData> {
        self.user_data.read().get(&guid).cloned()
    }

    /// Drops all bound user data.
    pub fn release_user_data(&self) {
        self.user_data.write().clear();
    }

    /// Suspends dependency execution: passes become no-ops until unfrozen.
    pub fn freeze_graph(&mut self) {
        self.frozen = true;
    }

    /// Resumes dependency execution.
    pub fn unfreeze_graph(&mut self) {
        self.frozen = false;
    }

    /// Whether the execution graph is frozen.
    pub fn is_graph_frozen(&self) -> bool {
        self.frozen
    }

    /// Forgets persisted execution statuses (e.g. after structural edits
    /// that renumber bindings).
    pub fn reset_statuses(&mut self) {
        self.statuses.clear();
    }
}

/// Runs one execution pass over the functions reachable from the logged
/// locations.
///
/// Output writes go through the transaction engine so the pass stays part
/// of the open transaction's invertible delta. On cancellation the
/// document is left at a whole-function boundary and [`Error::Cancelled`]
/// is returned with the transaction still open.
#[allow(clippy::too_many_arguments)]
pub fn execute_pass(
    doc: &mut Document,
    registry: &FunctionRegistry,
    logbook: &mut LogBook,
    txn: &mut TransactionEngine,
    ctx: &mut ExecutionCtx,
    tracer: &dyn Tracer,
    cancel: Option<&CancelToken>,
) -> Result<PassReport, Error> {
    if ctx.is_graph_frozen() {
        return Ok(PassReport::default());
    }

    let mut changed: HashSet<ParameterId> = logbook.touched().cloned().collect();
    let forced: HashSet<ParameterId> = logbook.forced().cloned().collect();
    tracer.on_pass_begin(changed.len());

    let graph = DependencyGraph::build(doc, registry)?;
    let scope_set = graph.reachable_from(&changed, &forced);
    // Discovery order: binding declaration order.
    let scope: Vec<usize> = (0..graph.funcs().len())
        .filter(|i| scope_set.contains(i))
        .collect();

    // Scoped functions start the pass dirty; the rest keep their history.
    let mut seed = ctx.statuses.clone();
    for &i in &scope {
        seed.insert(i, ExecutionStatus::NotExecuted);
    }

    let mut it = SequentialFuncIterator::init(&graph, scope.clone(), seed);
    let mut report = PassReport::default();
    let mut wave_index = 0usize;

    while it.more() {
        let wave = it.current().to_vec();
        let guids: Vec<FuncGuid> = wave.iter().map(|&f| graph.funcs()[f].guid).collect();
        tracer.on_wave(wave_index, &guids);
        wave_index += 1;

        for &fi in &wave {
            if cancel.map(CancelToken::is_cancelled).unwrap_or(false) {
                ctx.statuses = it.into_statuses();
                return Err(Error::Cancelled);
            }

            let node = graph.funcs()[fi].clone();
            let is_forced = node
                .inputs
                .iter()
                .chain(&node.outputs)
                .any(|p| forced.contains(p));
            let inputs_changed = node.inputs.iter().any(|p| changed.contains(p));

            if !inputs_changed && !is_forced {
                // Reachable but not actually invalidated; up to date.
                it.set_status(fi, ExecutionStatus::Executed);
                report.skipped.push(node.guid);
                tracer.on_function(node.guid, FuncOutcome::Skipped);
                continue;
            }

            if node.heavy && !node.outputs.iter().any(|p| logbook.is_heavy_deployed(p)) {
                // Flag for the host; outputs stay pending, dependents stay
                // blocked until the next commit boundary.
                for output in &node.outputs {
                    txn.mark_pending(doc, output)?;
                }
                report.deferred.push((node.guid, ExecutionMode::Deferred));
                tracer.on_function(node.guid, FuncOutcome::Deferred);
                continue;
            }

            let func = registry.resolve(node.guid)?;
            let user_data = ctx.user_data(node.guid);

            let mut inputs = Vec::with_capacity(node.inputs.len());
            for pid in &node.inputs {
                inputs.push(doc.value(pid)?.clone());
            }

            if !is_forced && func.must_execute_intact(&inputs, user_data.as_ref()) {
                it.set_status(fi, ExecutionStatus::Executed);
                report.skipped.push(node.guid);
                tracer.on_function(node.guid, FuncOutcome::Skipped);
                continue;
            }

            let mut outputs = Vec::with_capacity(node.outputs.len());
            for pid in &node.outputs {
                outputs.push(doc.value(pid)?.clone());
            }

            match func.execute(&inputs, &mut outputs, user_data.as_ref()) {
                Ok(()) => {
                    for (pid, value) in node.outputs.iter().zip(outputs) {
                        txn.set_value(doc, pid, value)?;
                        logbook.impact(pid.clone());
                        changed.insert(pid.clone());
                    }
                    it.set_status(fi, ExecutionStatus::Executed);
                    report.executed.push(node.guid);
                    tracer.on_function(node.guid, FuncOutcome::Executed);
                }
                Err(source) => {
                    for pid in &node.outputs {
                        txn.mark_pending(doc, pid)?;
                    }
                    it.set_status(fi, ExecutionStatus::Failed);
                    report.failures.push(Error::FunctionExecutionFailure {
                        guid: node.guid,
                        name: node.name.clone(),
                        source,
                    });
                    tracer.on_function(node.guid, FuncOutcome::Failed);
                }
            }
        }
        it.next_wave();
    }

    // Scoped functions never reached a wave: blocked behind a failure or a
    // deferred heavy function.
    let deferred_guids: HashSet<FuncGuid> = report.deferred.iter().map(|(g, _)| *g).collect();
    for &i in &scope {
        let node = &graph.funcs()[i];
        if it.status(i) == ExecutionStatus::NotExecuted && !deferred_guids.contains(&node.guid) {
            report.blocked.push(node.guid);
        }
    }

    ctx.statuses = it.into_statuses();
    tracer.on_pass_end(report.executed.len(), report.failures.len());
    Ok(report)
}
