//! Error taxonomy for the document engine.

use thiserror::Error;

use crate::function::FuncGuid;
use crate::id::{NodeId, ParameterId};

/// Errors surfaced by the document, graph, and transaction machinery.
///
/// `MalformedId`, `CycleDetected`, and `UnresolvedFunction` are recoverable,
/// caller-visible conditions. A function failure is local: the engine keeps
/// running independent functions in the same wave and only stops descending
/// past the failed function's outputs. Undo/redo depth overruns are not
/// errors at all; the engines clamp to the available depth and report how
/// many steps were actually applied.
#[derive(Debug, Error)]
pub enum Error {
    /// The id does not carry a tag count any document object can have.
    #[error("malformed id `{id}`")]
    MalformedId {
        /// The offending raw id.
        id: String,
    },

    /// The dependency graph is not a DAG.
    ///
    /// Cycles are a data error, reported instead of looping. The listed
    /// functions are the members of the detected loop (optionally enriched
    /// with their non-calculable successors, see
    /// [`DependencyGraph::cyclic_functions`](crate::graph::DependencyGraph::cyclic_functions)).
    #[error("dependency cycle detected among {functions:?}")]
    CycleDetected {
        /// Functions participating in (or blocked by) the loop.
        functions: Vec<FuncGuid>,
    },

    /// No factory is registered for the requested tree-function GUID.
    #[error("no tree function registered for {guid}")]
    UnresolvedFunction {
        /// The unresolved GUID.
        guid: FuncGuid,
    },

    /// A tree function reported a non-success status from `execute`.
    #[error("tree function {name} ({guid}) failed: {source}")]
    FunctionExecutionFailure {
        /// GUID of the failed function.
        guid: FuncGuid,
        /// Display name of the failed function.
        name: String,
        /// The failure the function body reported.
        source: anyhow::Error,
    },

    /// A transactional scope is already open.
    #[error("a transaction is already open")]
    TransactionAlreadyOpen,

    /// The operation requires an open transactional scope.
    #[error("no open transaction")]
    NoOpenTransaction,

    /// The node is not present in the document.
    #[error("node `{0}` not found")]
    NodeNotFound(NodeId),

    /// The parameter is not present in the document.
    #[error("parameter `{0}` not found")]
    ParameterNotFound(ParameterId),

    /// The execution pass was cancelled between function executions.
    #[error("execution pass cancelled")]
    Cancelled,
}
