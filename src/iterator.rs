//! Sequential function iterator: priority-ordered waves of ready functions.
//!
//! The iterator walks the function-level adjacency of a
//! [`DependencyGraph`] restricted to a scope of dirty functions. Each wave
//! holds the functions whose predecessors are all settled; inside a wave
//! functions are ordered by ascending priority, ties broken by discovery
//! order. This is a sequencing contract: lower-priority functions run
//! first, deterministically, on one logical thread.

use std::collections::{HashMap, HashSet};

use crate::function::ExecutionStatus;
use crate::graph::DependencyGraph;

/// Iterator state.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum IterState {
    /// Constructed, first wave not computed yet.
    Init,
    /// A non-empty wave is available.
    HasWave,
    /// No further wave can be produced.
    Exhausted,
}

/// Wave-by-wave iterator over the scoped functions of a graph.
pub struct SequentialFuncIterator<'g> {
    graph: &'g DependencyGraph,
    /// Scoped function indices in discovery order.
    scope: Vec<usize>,
    scope_set: HashSet<usize>,
    statuses: HashMap<usize, ExecutionStatus>,
    /// Functions already handed out in some wave; never re-emitted.
    emitted: HashSet<usize>,
    wave: Vec<usize>,
    state: IterState,
}

impl<'g> SequentialFuncIterator<'g> {
    /// Initializes the iterator over `scope` and computes the first wave.
    ///
    /// `statuses` seeds the execution state of every function in the graph
    /// (scoped functions are expected to arrive `NotExecuted`; functions
    /// outside the scope keep whatever state previous passes left, so a
    /// half-failed pass resumes instead of re-running completed work).
    pub fn init(
        graph: &'g DependencyGraph,
        scope: Vec<usize>,
        statuses: HashMap<usize, ExecutionStatus>,
    ) -> Self {
        let scope_set = scope.iter().copied().collect();
        let mut it = Self {
            graph,
            scope,
            scope_set,
            statuses,
            emitted: HashSet::new(),
            wave: Vec::new(),
            state: IterState::Init,
        };
        it.compute_wave();
        it
    }

    /// Whether a wave is available.
    pub fn more(&self) -> bool {
        self.state == IterState::HasWave
    }

    /// The current wave, in execution order.
    pub fn current(&self) -> &[usize] {
        &self.wave
    }

    /// Advances to the next wave.
    pub fn next_wave(&mut self) {
        if self.state == IterState::Exhausted {
            return;
        }
        self.compute_wave();
    }

    /// Current iterator state.
    pub fn state(&self) -> IterState {
        self.state
    }

    /// Execution status of a function, defaulting to `NotExecuted`.
    pub fn status(&self, func: usize) -> ExecutionStatus {
        self.statuses.get(&func).copied().unwrap_or_default()
    }

    /// Records the execution status of a function.
    pub fn set_status(&mut self, func: usize, status: ExecutionStatus) {
        self.statuses.insert(func, status);
    }

    /// Consumes the iterator, handing the status map back to the caller.
    pub fn into_statuses(self) -> HashMap<usize, ExecutionStatus> {
        self.statuses
    }

    /// A function is ready when every predecessor is settled: in-scope
    /// predecessors must have executed; out-of-scope ones only block when
    /// they failed earlier and were never refreshed.
    fn is_ready(&self, func: usize) -> bool {
        self.graph.funcs()[func].prev.iter().all(|&p| {
            if self.scope_set.contains(&p) {
                self.status(p) == ExecutionStatus::Executed
            } else {
                self.status(p) != ExecutionStatus::Failed
            }
        })
    }

    fn compute_wave(&mut self) {
        let mut wave: Vec<usize> = self
            .scope
            .iter()
            .copied()
            .filter(|&f| {
                !self.emitted.contains(&f)
                    && self.status(f) == ExecutionStatus::NotExecuted
                    && self.is_ready(f)
            })
            .collect();
        // Stable: ties keep discovery order.
        wave.sort_by_key(|&f| self.graph.funcs()[f].priority);
        self.emitted.extend(wave.iter().copied());
        self.state = if wave.is_empty() {
            IterState::Exhausted
        } else {
            IterState::HasWave
        };
        self.wave = wave;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::Document;
    use crate::function::{FuncGuid, TreeFunction, UserData};
    use crate::id::{NodeId, ParameterId};
    use crate::registry::FunctionRegistry;
    use crate::value::ParamValue;
    use std::sync::Arc;

    struct Passthrough {
        guid: FuncGuid,
        priority: i32,
    }

    impl TreeFunction for Passthrough {
        fn guid(&self) -> FuncGuid {
            self.guid
        }

        fn name(&self) -> &str {
            "passthrough"
        }

        fn priority(&self) -> i32 {
            self.priority
        }

        fn execute(
            &self,
            inputs: &[ParamValue],
            outputs: &mut [ParamValue],
            _user_data: Option<&UserData>,
        ) -> anyhow::Result<()> {
            if let (Some(first), Some(slot)) = (inputs.first(), outputs.first_mut()) {
                *slot = first.clone();
            }
            Ok(())
        }
    }

    fn pid(s: &str) -> ParameterId {
        ParameterId::new(s).unwrap()
    }

    /// Chain A -> B -> C through single parameters.
    fn chain_fixture() -> (Document, FunctionRegistry) {
        let mut doc = Document::new();
        doc.add_node(NodeId::new("0:1:0:1").unwrap(), "n", false, None)
            .unwrap();
        for p in ["0:1:0:1:1", "0:1:0:1:2", "0:1:0:1:3", "0:1:0:1:4"] {
            doc.add_parameter(pid(p), ParamValue::Int(0)).unwrap();
        }
        let mut registry = FunctionRegistry::new();
        for (g, prio) in [(1u128, 0), (2, 0), (3, 0)] {
            registry.register(move || {
                Arc::new(Passthrough {
                    guid: FuncGuid(g),
                    priority: prio,
                }) as Arc<dyn TreeFunction>
            });
        }
        doc.connect(FuncGuid(1), vec![pid("0:1:0:1:1")], vec![pid("0:1:0:1:2")])
            .unwrap();
        doc.connect(FuncGuid(2), vec![pid("0:1:0:1:2")], vec![pid("0:1:0:1:3")])
            .unwrap();
        doc.connect(FuncGuid(3), vec![pid("0:1:0:1:3")], vec![pid("0:1:0:1:4")])
            .unwrap();
        (doc, registry)
    }

    #[test]
    fn chain_produces_single_function_waves() {
        let (doc, registry) = chain_fixture();
        let graph = DependencyGraph::build(&doc, &registry).unwrap();
        let mut it = SequentialFuncIterator::init(&graph, vec![0, 1, 2], HashMap::new());

        let mut waves = Vec::new();
        while it.more() {
            let wave = it.current().to_vec();
            for &f in &wave {
                it.set_status(f, ExecutionStatus::Executed);
            }
            waves.push(wave);
            it.next_wave();
        }
        assert_eq!(waves, vec![vec![0], vec![1], vec![2]]);
        assert_eq!(it.state(), IterState::Exhausted);
    }

    #[test]
    fn failed_function_blocks_descendants() {
        let (doc, registry) = chain_fixture();
        let graph = DependencyGraph::build(&doc, &registry).unwrap();
        let mut it = SequentialFuncIterator::init(&graph, vec![0, 1, 2], HashMap::new());

        assert_eq!(it.current(), &[0]);
        it.set_status(0, ExecutionStatus::Failed);
        it.next_wave();
        assert!(!it.more());
        assert_eq!(it.status(1), ExecutionStatus::NotExecuted);
    }

    #[test]
    fn out_of_scope_executed_predecessor_unblocks_resume() {
        let (doc, registry) = chain_fixture();
        let graph = DependencyGraph::build(&doc, &registry).unwrap();
        // Function 0 completed in a previous pass; only 1 and 2 are dirty.
        let statuses = HashMap::from([(0, ExecutionStatus::Executed)]);
        let mut it = SequentialFuncIterator::init(&graph, vec![1, 2], statuses);

        assert_eq!(it.current(), &[1]);
        it.set_status(1, ExecutionStatus::Executed);
        it.next_wave();
        assert_eq!(it.current(), &[2]);
    }

    #[test]
    fn priority_orders_within_wave() {
        let mut doc = Document::new();
        doc.add_node(NodeId::new("0:1:0:1").unwrap(), "n", false, None)
            .unwrap();
        for p in ["0:1:0:1:1", "0:1:0:1:2", "0:1:0:1:3", "0:1:0:1:4"] {
            doc.add_parameter(pid(p), ParamValue::Int(0)).unwrap();
        }
        let mut registry = FunctionRegistry::new();
        for (g, prio) in [(1u128, 5), (2, 1)] {
            registry.register(move || {
                Arc::new(Passthrough {
                    guid: FuncGuid(g),
                    priority: prio,
                }) as Arc<dyn TreeFunction>
            });
        }
        doc.connect(FuncGuid(1), vec![pid("0:1:0:1:1")], vec![pid("0:1:0:1:2")])
            .unwrap();
        doc.connect(FuncGuid(2), vec![pid("0:1:0:1:3")], vec![pid("0:1:0:1:4")])
            .unwrap();

        let graph = DependencyGraph::build(&doc, &registry).unwrap();
        let it = SequentialFuncIterator::init(&graph, vec![0, 1], HashMap::new());
        // Priority 1 (function index 1) runs before priority 5.
        assert_eq!(it.current(), &[1, 0]);
    }
}
