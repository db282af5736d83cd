//! Tree-function capability: the computation unit of the reactive layer.

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use crate::value::ParamValue;

/// Globally unique identifier of a tree-function type.
///
/// Construct as a constant next to the function it names:
///
/// ```ignore
/// const SUM_GUID: FuncGuid = FuncGuid(0x7a3e_0001);
/// ```
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FuncGuid(pub u128);

impl fmt::Display for FuncGuid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:032x}", self.0)
    }
}

impl fmt::Debug for FuncGuid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "FuncGuid({:032x})", self.0)
    }
}

/// Opaque per-function-type data a host binds into the execution context.
pub type UserData = Arc<dyn Any + Send + Sync>;

/// Execution state of a function within a scope.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ExecutionStatus {
    /// Not run in the current scope yet.
    #[default]
    NotExecuted,
    /// Ran (or was recognized as up to date) in the current scope.
    Executed,
    /// Ran and reported a failure; dependents are not descended.
    Failed,
}

/// How a function's `execute` is meant to be dispatched.
///
/// The engine never forks threads itself: heavy functions are reported as
/// `Deferred` work for the host scheduler, and their results become visible
/// only at the next commit boundary.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ExecutionMode {
    /// Run inline, inside the current pass.
    Inline,
    /// Hand off to the host; outputs stay pending this pass.
    Deferred,
}

/// A GUID-identified, stateless computation unit.
///
/// Implementations transform an ordered list of input parameter values into
/// an ordered list of output values. Side effects are confined to writing
/// `outputs`; everything else the engine needs is exposed through the
/// remaining capability methods.
pub trait TreeFunction: Send + Sync {
    /// Identity of this function type.
    fn guid(&self) -> FuncGuid;

    /// Human-readable name, used in graph exports and failure reports.
    fn name(&self) -> &str;

    /// Tie-break among functions with no dependency ordering between them.
    ///
    /// Lower values run first inside a wave. This is a deterministic
    /// sequencing contract, not a parallelism hint.
    fn priority(&self) -> i32 {
        0
    }

    /// Scheduling hint: `true` requests [`ExecutionMode::Deferred`].
    fn is_heavy(&self) -> bool {
        false
    }

    /// Returns `true` to skip execution even though the function is
    /// reachable from the changed set, when the function judges its inputs
    /// functionally unchanged.
    fn must_execute_intact(&self, inputs: &[ParamValue], user_data: Option<&UserData>) -> bool {
        let _ = (inputs, user_data);
        false
    }

    /// Pure transformation of `inputs` into `outputs`.
    ///
    /// `outputs` arrives pre-sized to the declared output list; the function
    /// overwrites the slots it produces. Any error is wrapped into
    /// [`Error::FunctionExecutionFailure`](crate::Error::FunctionExecutionFailure)
    /// and marks the outputs pending.
    fn execute(
        &self,
        inputs: &[ParamValue],
        outputs: &mut [ParamValue],
        user_data: Option<&UserData>,
    ) -> anyhow::Result<()>;
}
