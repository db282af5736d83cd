#![deny(missing_docs)]
//! Docflow: a reactive framework for hierarchical CAD-style documents.
//!
//! The document is a tree of nodes owning typed parameter cells, addressed
//! by colon-tagged ids. On top of it sit two engines:
//!
//! - **Execution engine**: tree functions declare which parameters they
//!   consume and produce; when a commit touches a parameter, the engine
//!   derives a dependency graph scoped to the dirty set and re-runs the
//!   reachable functions in deterministic, priority-ordered waves.
//! - **Transaction engine**: every commit is captured as an invertible
//!   modification delta paired with an opaque caller payload, on a bounded
//!   undo/redo stack.
//!
//! # Key Features
//!
//! - **Incremental**: only functions reachable from touched parameters run
//! - **Deterministic sequencing**: waves ordered by dependency, priority
//!   tie-breaks inside a wave; no hidden threads
//! - **Localized failure**: a failed function pends its outputs and blocks
//!   its dependents, independent work continues
//! - **Bounded history**: undo/redo stacks evict oldest entries past the
//!   configured limit; depth requests clamp instead of failing
//! - **Host-scheduled heavy work**: heavy functions are reported as
//!   deferred instead of executed inline
//!
//! # Example
//!
//! ```ignore
//! use docflow::{FuncGuid, FunctionRegistry, Model, ParamValue, ParameterId, TxData};
//!
//! let mut registry = FunctionRegistry::new();
//! registry.register(|| std::sync::Arc::new(Doubler));
//!
//! let mut model = Model::new(registry);
//! // ... grow the document, connect functions ...
//! model.set_parameter(&input, ParamValue::Int(21))?;
//! let result = model.commit_with(TxData::new().with("set input"))?;
//! model.undo(1)?;
//! ```

mod delta;
mod document;
mod engine;
mod error;
mod function;
mod graph;
mod id;
mod iterator;
mod logbook;
mod model;
mod registry;
pub mod tracer;
mod transaction;
mod value;

pub use delta::{DeltaRecord, ModificationDelta};
pub use document::{Document, FunctionBinding, ParamSnapshot};
pub use engine::{execute_pass, CancelToken, ExecutionCtx, PassReport};
pub use error::Error;
pub use function::{ExecutionMode, ExecutionStatus, FuncGuid, TreeFunction, UserData};
pub use graph::{DependencyGraph, Edge, Vertex};
pub use id::{
    node_id_by_parameter_id, split_tags, trim_to_parameter_id, NodeId, ParamIdKind, ParameterId,
};
pub use iterator::{IterState, SequentialFuncIterator};
pub use logbook::{LogBook, LogKind};
pub use model::{CommitResult, Model, DEFAULT_UNDO_LIMIT};
pub use registry::FunctionRegistry;
pub use tracer::{FuncOutcome, NoopTracer, Tracer};
pub use transaction::{
    ParamHandle, TransactionEngine, TxData, TxDatum, TxRes, TxResRecord, TxState,
};
pub use value::{ParamType, ParamValue};
