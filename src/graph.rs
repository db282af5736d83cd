//! Dependency graph derived from the document's function bindings.
//!
//! Vertices are parameter cells (deduplicated by id, with back-references
//! to the owning node and the connected function); edges are the data-flow
//! links through each function's input→output relation. On top of the
//! vertex/edge model the graph keeps a function-level adjacency used by the
//! wave iterator. The graph is transient: it is rebuilt for each execution
//! pass and never outlives it.

use std::collections::{HashMap, HashSet, VecDeque};

use crate::document::{Document, FunctionBinding};
use crate::error::Error;
use crate::function::FuncGuid;
use crate::id::{NodeId, ParameterId};
use crate::registry::FunctionRegistry;

/// Graph vertex: one parameter cell.
#[derive(Clone, Debug)]
pub struct Vertex {
    /// The parameter this vertex stands for.
    pub param: ParameterId,
    /// Node owning the parameter.
    pub node: NodeId,
    /// Function the parameter is connected to (first declared).
    pub func: FuncGuid,
}

/// Graph edge: one data-flow link between two vertices.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Edge {
    /// Index of the producing-side vertex in [`DependencyGraph::vertices`].
    pub from: usize,
    /// Index of the consuming-side vertex.
    pub to: usize,
}

/// Function-level node: a binding plus its dependency adjacency.
#[derive(Clone, Debug)]
pub(crate) struct FuncNode {
    pub guid: FuncGuid,
    pub name: String,
    pub priority: i32,
    pub heavy: bool,
    pub inputs: Vec<ParameterId>,
    pub outputs: Vec<ParameterId>,
    /// Indices of functions producing any of our inputs.
    pub prev: Vec<usize>,
    /// Indices of functions consuming any of our outputs.
    pub next: Vec<usize>,
}

/// Directed graph of parameter vertices and function-mediated edges.
#[derive(Debug)]
pub struct DependencyGraph {
    vertices: Vec<Vertex>,
    vertex_index: HashMap<ParameterId, usize>,
    edges: Vec<Edge>,
    funcs: Vec<FuncNode>,
}

impl DependencyGraph {
    /// Builds the graph from the document's declared bindings.
    ///
    /// Every binding's GUID must resolve through the registry; the graph is
    /// checked for cycles before it is returned, so downstream consumers
    /// can rely on it being a DAG.
    pub fn build(doc: &Document, registry: &FunctionRegistry) -> Result<Self, Error> {
        let graph = Self::build_unchecked(doc, registry)?;
        graph.ensure_acyclic()?;
        Ok(graph)
    }

    /// Builds the graph without the cycle check, for topological analysis
    /// of graphs already known (or suspected) to be broken.
    pub fn build_unchecked(doc: &Document, registry: &FunctionRegistry) -> Result<Self, Error> {
        let mut graph = Self {
            vertices: Vec::new(),
            vertex_index: HashMap::new(),
            edges: Vec::new(),
            funcs: Vec::new(),
        };

        for binding in doc.bindings() {
            let func = registry.resolve(binding.guid)?;
            graph.funcs.push(FuncNode {
                guid: binding.guid,
                name: func.name().to_owned(),
                priority: func.priority(),
                heavy: func.is_heavy(),
                inputs: binding.inputs.clone(),
                outputs: binding.outputs.clone(),
                prev: Vec::new(),
                next: Vec::new(),
            });
            graph.register_binding(binding);
        }

        graph.link_functions();
        Ok(graph)
    }

    fn register_binding(&mut self, binding: &FunctionBinding) {
        for pid in binding.inputs.iter().chain(&binding.outputs) {
            if !self.vertex_index.contains_key(pid) {
                let idx = self.vertices.len();
                self.vertices.push(Vertex {
                    param: pid.clone(),
                    node: pid.node_id(),
                    func: binding.guid,
                });
                self.vertex_index.insert(pid.clone(), idx);
            }
        }
        for input in &binding.inputs {
            for output in &binding.outputs {
                let edge = Edge {
                    from: self.vertex_index[input],
                    to: self.vertex_index[output],
                };
                if !self.edges.contains(&edge) {
                    self.edges.push(edge);
                }
            }
        }
    }

    /// Derives the function-level prev/next adjacency from the bindings.
    fn link_functions(&mut self) {
        let mut producer: HashMap<&ParameterId, usize> = HashMap::new();
        for (i, f) in self.funcs.iter().enumerate() {
            for output in &f.outputs {
                producer.insert(output, i);
            }
        }
        let mut prev: Vec<Vec<usize>> = vec![Vec::new(); self.funcs.len()];
        let mut next: Vec<Vec<usize>> = vec![Vec::new(); self.funcs.len()];
        for (i, f) in self.funcs.iter().enumerate() {
            for input in &f.inputs {
                if let Some(&p) = producer.get(input) {
                    if p != i && !prev[i].contains(&p) {
                        prev[i].push(p);
                        next[p].push(i);
                    }
                }
            }
        }
        for (i, f) in self.funcs.iter_mut().enumerate() {
            f.prev = std::mem::take(&mut prev[i]);
            f.next = std::mem::take(&mut next[i]);
        }
    }

    /// Topological pass over the function adjacency.
    ///
    /// Fails with [`Error::CycleDetected`] when some function can never
    /// reach a terminal state; the error lists the loop members.
    fn ensure_acyclic(&self) -> Result<(), Error> {
        let stuck = self.non_terminating();
        if stuck.is_empty() {
            Ok(())
        } else {
            // Report loop members only, not their blocked successors.
            let members = self.loop_members(&stuck);
            Err(Error::CycleDetected {
                functions: members.into_iter().map(|i| self.funcs[i].guid).collect(),
            })
        }
    }

    /// Function indices that never reach a terminal state in a Kahn pass.
    fn non_terminating(&self) -> HashSet<usize> {
        let mut indegree: Vec<usize> = self.funcs.iter().map(|f| f.prev.len()).collect();
        let mut queue: VecDeque<usize> = indegree
            .iter()
            .enumerate()
            .filter(|(_, &d)| d == 0)
            .map(|(i, _)| i)
            .collect();
        let mut done = 0usize;
        let mut settled = vec![false; self.funcs.len()];
        while let Some(i) = queue.pop_front() {
            settled[i] = true;
            done += 1;
            for &n in &self.funcs[i].next {
                indegree[n] -= 1;
                if indegree[n] == 0 {
                    queue.push_back(n);
                }
            }
        }
        if done == self.funcs.len() {
            HashSet::new()
        } else {
            settled
                .iter()
                .enumerate()
                .filter(|(_, &s)| !s)
                .map(|(i, _)| i)
                .collect()
        }
    }

    /// Members of actual loops within the stuck set.
    ///
    /// Every stuck function either sits on a loop or hangs below one.
    /// Repeatedly trimming stuck functions with no successor left in the
    /// set removes the hanging tail; loop members always keep an in-set
    /// successor and survive.
    fn loop_members(&self, stuck: &HashSet<usize>) -> Vec<usize> {
        let mut remaining = stuck.clone();
        loop {
            let tail: Vec<usize> = remaining
                .iter()
                .copied()
                .filter(|&i| !self.funcs[i].next.iter().any(|n| remaining.contains(n)))
                .collect();
            if tail.is_empty() {
                break;
            }
            for i in tail {
                remaining.remove(&i);
            }
        }
        let mut members: Vec<usize> = remaining.into_iter().collect();
        members.sort_unstable();
        members
    }

    /// Loop members, optionally enriched with their blocked successors.
    ///
    /// After rejecting a loop the remaining graph must stay executable, so
    /// callers usually also want the non-cyclic functions that depend on
    /// loop members (they can never be computed either). Enrichment adds
    /// exactly those.
    pub fn cyclic_functions(&self, enriched: bool) -> Vec<FuncGuid> {
        let stuck = self.non_terminating();
        let indices = if enriched {
            let mut sorted: Vec<usize> = stuck.into_iter().collect();
            sorted.sort_unstable();
            sorted
        } else {
            self.loop_members(&stuck)
        };
        indices.into_iter().map(|i| self.funcs[i].guid).collect()
    }

    /// Read-only vertex list.
    pub fn vertices(&self) -> &[Vertex] {
        &self.vertices
    }

    /// Read-only edge list.
    pub fn edges(&self) -> &[Edge] {
        &self.edges
    }

    pub(crate) fn funcs(&self) -> &[FuncNode] {
        &self.funcs
    }

    /// Function indices reachable from the given changed/forced locations.
    ///
    /// A function is seeded into the scope when one of its inputs is in
    /// the changed set or one of its arguments is forced; the scope then
    /// closes transitively over consumers of the seeds' outputs.
    pub(crate) fn reachable_from(
        &self,
        changed: &HashSet<ParameterId>,
        forced: &HashSet<ParameterId>,
    ) -> HashSet<usize> {
        let mut scope = HashSet::new();
        let mut queue: VecDeque<usize> = VecDeque::new();
        for (i, f) in self.funcs.iter().enumerate() {
            let seeded = f.inputs.iter().any(|p| changed.contains(p))
                || f.inputs.iter().chain(&f.outputs).any(|p| forced.contains(p));
            if seeded {
                scope.insert(i);
                queue.push_back(i);
            }
        }
        while let Some(i) = queue.pop_front() {
            for &n in &self.funcs[i].next {
                if scope.insert(n) {
                    queue.push_back(n);
                }
            }
        }
        scope
    }

    /// Renders the edge list in the exported DOT-fragment format.
    ///
    /// One line per edge:
    /// `"<FunctionName> (<VertexLabel1>)" -> "<FunctionName> (<VertexLabel2>)";`
    /// where the vertex label is the node's variable name for
    /// Variable-kind nodes and the raw node id otherwise.
    pub fn dot_lines(&self, doc: &Document) -> Result<Vec<String>, Error> {
        let name_of = |guid: FuncGuid| {
            self.funcs
                .iter()
                .find(|f| f.guid == guid)
                .map(|f| f.name.as_str())
                .unwrap_or("?")
        };
        let mut lines = Vec::with_capacity(self.edges.len());
        for edge in &self.edges {
            let v1 = &self.vertices[edge.from];
            let v2 = &self.vertices[edge.to];
            lines.push(format!(
                "\"{} ({})\" -> \"{} ({})\";",
                name_of(v1.func),
                self.vertex_label(doc, &v1.node)?,
                name_of(v2.func),
                self.vertex_label(doc, &v2.node)?,
            ));
        }
        Ok(lines)
    }

    fn vertex_label(&self, doc: &Document, node: &NodeId) -> Result<String, Error> {
        if doc.is_variable_node(node)? {
            Ok(doc.node_name(node)?.to_owned())
        } else {
            Ok(node.as_str().to_owned())
        }
    }
}
