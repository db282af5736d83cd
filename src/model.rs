//! Model facade: the commit loop over document, registry, logbook,
//! execution engine and transaction engine.
//!
//! A mutation opens (or extends) a transaction and logs the touched
//! location; `commit` walks the dependency graph scoped to the logged
//! locations, runs the ready tree functions wave by wave, then finalizes
//! the modification delta together with the caller payload onto the undo
//! stack.

use std::sync::Arc;

use crate::document::Document;
use crate::engine::{execute_pass, CancelToken, ExecutionCtx, PassReport};
use crate::error::Error;
use crate::function::FuncGuid;
use crate::graph::DependencyGraph;
use crate::id::ParameterId;
use crate::logbook::LogBook;
use crate::registry::FunctionRegistry;
use crate::tracer::{NoopTracer, Tracer};
use crate::transaction::{TransactionEngine, TxData, TxRes};
use crate::value::ParamValue;

/// Default bound of the undo/redo stacks.
pub const DEFAULT_UNDO_LIMIT: usize = 100;

/// Outcome of one committed transaction.
#[derive(Debug)]
pub struct CommitResult {
    /// Affected parameters with liveness flags.
    pub res: TxRes,
    /// What the execution pass did.
    pub pass: PassReport,
}

/// The reactive document model.
pub struct Model {
    doc: Document,
    registry: FunctionRegistry,
    logbook: LogBook,
    txn: TransactionEngine,
    ctx: ExecutionCtx,
    tracer: Arc<dyn Tracer>,
    cancel: Option<CancelToken>,
}

impl Model {
    /// Creates a model with the given function registry and the default
    /// undo limit.
    pub fn new(registry: FunctionRegistry) -> Self {
        Self::with_undo_limit(registry, DEFAULT_UNDO_LIMIT)
    }

    /// Creates a model bounding the undo/redo stacks at `undo_limit`.
    pub fn with_undo_limit(registry: FunctionRegistry, undo_limit: usize) -> Self {
        Self {
            doc: Document::new(),
            registry,
            logbook: LogBook::new(),
            txn: TransactionEngine::new(undo_limit),
            ctx: ExecutionCtx::new(),
            tracer: Arc::new(NoopTracer),
            cancel: None,
        }
    }

    /// Installs a tracer receiving engine lifecycle events.
    pub fn with_tracer(mut self, tracer: Arc<dyn Tracer>) -> Self {
        self.tracer = tracer;
        self
    }

    /// The document store.
    pub fn document(&self) -> &Document {
        &self.doc
    }

    /// Mutable access to the document store for structural edits (growing
    /// or pruning the hierarchy). Structural edits are not transactional;
    /// execution statuses are reset because binding indices may shift.
    pub fn document_mut(&mut self) -> &mut Document {
        self.ctx.reset_statuses();
        &mut self.doc
    }

    /// The function registry.
    pub fn registry(&self) -> &FunctionRegistry {
        &self.registry
    }

    /// The dirty tracker.
    pub fn logbook(&self) -> &LogBook {
        &self.logbook
    }

    /// The execution context (user data binding, graph freezing).
    pub fn execution_ctx(&mut self) -> &mut ExecutionCtx {
        &mut self.ctx
    }

    /// Installs a cancellation token polled between function executions.
    pub fn set_cancel_token(&mut self, token: CancelToken) {
        self.cancel = Some(token);
    }

    // ------------------------------------------------------------------
    // Transactional surface
    // ------------------------------------------------------------------

    /// Opens a transactional scope explicitly.
    pub fn open_command(&mut self) -> Result<(), Error> {
        self.txn.open_command()
    }

    /// Whether a transactional scope is open.
    pub fn has_open_command(&self) -> bool {
        self.txn.has_open_command()
    }

    /// Transactional write: opens a scope when none is open, snapshots the
    /// cell for undo and marks the location touched.
    pub fn set_parameter(&mut self, id: &ParameterId, value: ParamValue) -> Result<(), Error> {
        self.txn.set_value(&mut self.doc, id, value)?;
        self.logbook.log_label(id.clone());
        Ok(())
    }

    /// Queues a function's argument location for forced execution in the
    /// next pass, regardless of input changes.
    pub fn force(&mut self, loc: ParameterId) {
        self.logbook.force(loc);
    }

    /// Grants a heavy function (identified by an output location)
    /// permission to execute inline in the next pass.
    pub fn heavy_deploy(&mut self, loc: ParameterId) {
        self.logbook.heavy_deploy(loc);
    }

    /// Commits the open transaction with an empty payload.
    pub fn commit(&mut self) -> Result<CommitResult, Error> {
        self.commit_with(TxData::default())
    }

    /// Runs the execution pass over the logged locations, then finalizes
    /// the delta paired with `tx_data` onto the undo stack.
    ///
    /// On failure inside the pass the transaction stays open so the caller
    /// can decide between aborting and committing the partial state; on
    /// success the logbook is cleared for the next pass.
    pub fn commit_with(&mut self, tx_data: TxData) -> Result<CommitResult, Error> {
        if !self.txn.has_open_command() {
            return Err(Error::NoOpenTransaction);
        }
        let pass = execute_pass(
            &mut self.doc,
            &self.registry,
            &mut self.logbook,
            &mut self.txn,
            &mut self.ctx,
            self.tracer.as_ref(),
            self.cancel.as_ref(),
        )?;
        let res = self.txn.commit_command_ext(&self.doc, tx_data)?;
        self.tracer.on_commit(res.records().len());
        self.logbook.release_logged();
        Ok(CommitResult { res, pass })
    }

    /// Rolls the open transaction back and drops its dirty records.
    pub fn abort(&mut self) -> Result<(), Error> {
        self.txn.abort_command(&mut self.doc)?;
        self.logbook.release_logged();
        Ok(())
    }

    /// Undoes up to `n` transactions, clamped to the stack depth.
    /// Returns the applied count and the affected parameters.
    pub fn undo(&mut self, n: usize) -> Result<(usize, TxRes), Error> {
        let (applied, res) = self.txn.undo(&mut self.doc, n)?;
        self.tracer.on_undo(applied);
        Ok((applied, res))
    }

    /// Redoes up to `n` transactions, clamped to the stack depth.
    pub fn redo(&mut self, n: usize) -> Result<(usize, TxRes), Error> {
        let (applied, res) = self.txn.redo(&mut self.doc, n)?;
        self.tracer.on_redo(applied);
        Ok((applied, res))
    }

    /// Read-only peek at the undo payloads, most recent first.
    pub fn get_undo_data(&self, depth: usize) -> Vec<TxData> {
        self.txn.get_undo_data(depth)
    }

    /// Read-only peek at the redo payloads, most recent first.
    pub fn get_redo_data(&self, depth: usize) -> Vec<TxData> {
        self.txn.get_redo_data(depth)
    }

    /// Number of committed transactions available to undo.
    pub fn nb_undos(&self) -> usize {
        self.txn.nb_undos()
    }

    /// Number of undone transactions available to redo.
    pub fn nb_redos(&self) -> usize {
        self.txn.nb_redos()
    }

    // ------------------------------------------------------------------
    // Graph surface
    // ------------------------------------------------------------------

    /// Builds the current dependency graph (cycle-checked).
    pub fn graph(&self) -> Result<DependencyGraph, Error> {
        DependencyGraph::build(&self.doc, &self.registry)
    }

    /// Declares a tree-function instance over existing parameters.
    ///
    /// The GUID must be registered; execution statuses are reset because
    /// binding indices shift.
    pub fn connect(
        &mut self,
        guid: FuncGuid,
        inputs: Vec<ParameterId>,
        outputs: Vec<ParameterId>,
    ) -> Result<(), Error> {
        if !self.registry.contains(guid) {
            return Err(Error::UnresolvedFunction { guid });
        }
        self.ctx.reset_statuses();
        self.doc.connect(guid, inputs, outputs)
    }

    /// Removes a node subtree and releases every dirty record of its
    /// parameters.
    pub fn prune(&mut self, id: &crate::id::NodeId) -> Result<(), Error> {
        let removed = self.doc.prune(id)?;
        for pid in &removed {
            self.logbook.clear_references_for(pid);
        }
        self.ctx.reset_statuses();
        Ok(())
    }
}
