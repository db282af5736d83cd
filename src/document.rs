//! In-memory document store: an arena of node and parameter records.
//!
//! Records live in [`Slab`] arenas and are addressed by stable colon-tagged
//! ids; every cross-reference in the crate is a non-owning id lookup, never
//! a pointer into the arena. Hierarchy is kept as parent/child slot lists
//! inside node records, so arena growth cannot invalidate anything.

use std::collections::HashMap;

use slab::Slab;

use crate::error::Error;
use crate::function::FuncGuid;
use crate::id::{NodeId, ParameterId};
use crate::value::{ParamType, ParamValue};

/// Full restorable state of one parameter cell.
#[derive(Clone, Debug, PartialEq)]
pub struct ParamSnapshot {
    /// Stored value.
    pub value: ParamValue,
    /// Concrete type tag, possibly [`ParamType::Undefined`].
    pub ty: ParamType,
    /// Result not recomputed yet (set while a producing function is
    /// deferred or failed).
    pub pending: bool,
    /// Cell holds consistent data.
    pub valid: bool,
}

#[derive(Debug)]
struct ParamRec {
    id: ParameterId,
    ty: ParamType,
    value: ParamValue,
    pending: bool,
    valid: bool,
    /// Tree functions this cell feeds or receives from.
    funcs: Vec<FuncGuid>,
    owner: usize,
}

#[derive(Debug)]
struct NodeRec {
    id: NodeId,
    name: String,
    variable: bool,
    parent: Option<usize>,
    children: Vec<usize>,
    params: Vec<usize>,
}

/// One declared instance of a tree function: its GUID plus the ordered
/// argument and result parameter lists.
#[derive(Clone, Debug)]
pub struct FunctionBinding {
    /// Function type to instantiate through the registry.
    pub guid: FuncGuid,
    /// Ordered input parameters.
    pub inputs: Vec<ParameterId>,
    /// Ordered output parameters.
    pub outputs: Vec<ParameterId>,
}

/// The hierarchical document of nodes and parameters.
#[derive(Default)]
pub struct Document {
    nodes: Slab<NodeRec>,
    params: Slab<ParamRec>,
    node_index: HashMap<NodeId, usize>,
    param_index: HashMap<ParameterId, usize>,
    bindings: Vec<FunctionBinding>,
}

impl Document {
    /// Creates an empty document.
    pub fn new() -> Self {
        Self::default()
    }

    // ------------------------------------------------------------------
    // Nodes
    // ------------------------------------------------------------------

    /// Adds a node under `parent` (or as a root when `None`).
    ///
    /// The `variable` flag is resolved here, once, and drives how graph
    /// exports label the node later on.
    pub fn add_node(
        &mut self,
        id: NodeId,
        name: impl Into<String>,
        variable: bool,
        parent: Option<&NodeId>,
    ) -> Result<(), Error> {
        let parent_slot = match parent {
            Some(pid) => Some(self.node_slot(pid)?),
            None => None,
        };
        let slot = self.nodes.insert(NodeRec {
            id: id.clone(),
            name: name.into(),
            variable,
            parent: parent_slot,
            children: Vec::new(),
            params: Vec::new(),
        });
        if let Some(p) = parent_slot {
            self.nodes[p].children.push(slot);
        }
        self.node_index.insert(id, slot);
        Ok(())
    }

    /// Whether the document contains a node with this id.
    pub fn has_node(&self, id: &NodeId) -> bool {
        self.node_index.contains_key(id)
    }

    /// Display name of a node.
    pub fn node_name(&self, id: &NodeId) -> Result<&str, Error> {
        Ok(&self.nodes[self.node_slot(id)?].name)
    }

    /// Whether the node was constructed as a Variable-kind node.
    pub fn is_variable_node(&self, id: &NodeId) -> Result<bool, Error> {
        Ok(self.nodes[self.node_slot(id)?].variable)
    }

    /// Parent of a node, if any.
    pub fn parent(&self, id: &NodeId) -> Result<Option<&NodeId>, Error> {
        let rec = &self.nodes[self.node_slot(id)?];
        Ok(rec.parent.map(|slot| &self.nodes[slot].id))
    }

    /// Direct children of a node, in insertion order.
    pub fn children(&self, id: &NodeId) -> Result<Vec<&NodeId>, Error> {
        let rec = &self.nodes[self.node_slot(id)?];
        Ok(rec
            .children
            .iter()
            .map(|&slot| &self.nodes[slot].id)
            .collect())
    }

    /// Parameters owned by a node, in insertion order.
    pub fn node_parameters(&self, id: &NodeId) -> Result<Vec<&ParameterId>, Error> {
        let rec = &self.nodes[self.node_slot(id)?];
        Ok(rec
            .params
            .iter()
            .map(|&slot| &self.params[slot].id)
            .collect())
    }

    /// Removes a node with its whole subtree and all owned parameters.
    ///
    /// Function bindings touching any removed parameter are dropped as
    /// well. Returns the ids of the removed parameters so the caller can
    /// release their dirty-tracking records.
    pub fn prune(&mut self, id: &NodeId) -> Result<Vec<ParameterId>, Error> {
        let root = self.node_slot(id)?;
        let mut stack = vec![root];
        let mut node_slots = Vec::new();
        while let Some(slot) = stack.pop() {
            node_slots.push(slot);
            stack.extend(self.nodes[slot].children.iter().copied());
        }

        let mut removed_params = Vec::new();
        for &slot in &node_slots {
            for &pslot in &self.nodes[slot].params {
                let rec = self.params.remove(pslot);
                self.param_index.remove(&rec.id);
                removed_params.push(rec.id);
            }
        }
        if let Some(parent) = self.nodes[root].parent {
            self.nodes[parent].children.retain(|&c| c != root);
        }
        for slot in node_slots {
            let rec = self.nodes.remove(slot);
            self.node_index.remove(&rec.id);
        }
        self.bindings.retain(|b| {
            b.inputs
                .iter()
                .chain(&b.outputs)
                .all(|pid| !removed_params.contains(pid))
        });
        Ok(removed_params)
    }

    // ------------------------------------------------------------------
    // Parameters
    // ------------------------------------------------------------------

    /// Adds a parameter cell under its owning node.
    ///
    /// The owning node is derived from the id's leading four tags and must
    /// already exist. The concrete type tag is taken from the initial
    /// value.
    pub fn add_parameter(&mut self, id: ParameterId, value: ParamValue) -> Result<(), Error> {
        let owner = self.node_slot(&id.node_id())?;
        let ty = value.param_type();
        let slot = self.params.insert(ParamRec {
            id: id.clone(),
            ty,
            value,
            pending: false,
            valid: true,
            funcs: Vec::new(),
            owner,
        });
        self.nodes[owner].params.push(slot);
        self.param_index.insert(id, slot);
        Ok(())
    }

    /// Whether the document contains a parameter with this id.
    pub fn has_parameter(&self, id: &ParameterId) -> bool {
        self.param_index.contains_key(id)
    }

    /// Current value of a parameter.
    pub fn value(&self, id: &ParameterId) -> Result<&ParamValue, Error> {
        Ok(&self.params[self.param_slot(id)?].value)
    }

    /// Overwrites a parameter value, returning the previous one.
    ///
    /// This is the raw write primitive; transactional callers snapshot the
    /// cell first so the change stays invertible.
    pub fn set_value(&mut self, id: &ParameterId, value: ParamValue) -> Result<ParamValue, Error> {
        let slot = self.param_slot(id)?;
        let rec = &mut self.params[slot];
        rec.ty = value.param_type();
        rec.valid = true;
        rec.pending = false;
        Ok(std::mem::replace(&mut rec.value, value))
    }

    /// Concrete type tag of a parameter.
    pub fn param_type(&self, id: &ParameterId) -> Result<ParamType, Error> {
        Ok(self.params[self.param_slot(id)?].ty)
    }

    /// Whether the parameter holds a not-yet-recomputed result.
    pub fn is_pending(&self, id: &ParameterId) -> Result<bool, Error> {
        Ok(self.params[self.param_slot(id)?].pending)
    }

    /// Whether the parameter holds consistent data.
    pub fn is_valid(&self, id: &ParameterId) -> Result<bool, Error> {
        Ok(self.params[self.param_slot(id)?].valid)
    }

    /// Marks a parameter pending/invalid (a producing function failed or
    /// was deferred).
    pub fn mark_pending(&mut self, id: &ParameterId) -> Result<(), Error> {
        let slot = self.param_slot(id)?;
        self.params[slot].pending = true;
        self.params[slot].valid = false;
        Ok(())
    }

    /// Full restorable state of a parameter cell.
    pub fn snapshot(&self, id: &ParameterId) -> Result<ParamSnapshot, Error> {
        let rec = &self.params[self.param_slot(id)?];
        Ok(ParamSnapshot {
            value: rec.value.clone(),
            ty: rec.ty,
            pending: rec.pending,
            valid: rec.valid,
        })
    }

    /// Restores a parameter cell from a snapshot.
    pub fn restore(&mut self, id: &ParameterId, snapshot: &ParamSnapshot) -> Result<(), Error> {
        let slot = self.param_slot(id)?;
        let rec = &mut self.params[slot];
        rec.value = snapshot.value.clone();
        rec.ty = snapshot.ty;
        rec.pending = snapshot.pending;
        rec.valid = snapshot.valid;
        Ok(())
    }

    /// Tree functions the parameter feeds or receives from.
    pub fn connected_functions(&self, id: &ParameterId) -> Result<&[FuncGuid], Error> {
        Ok(&self.params[self.param_slot(id)?].funcs)
    }

    // ------------------------------------------------------------------
    // Function bindings
    // ------------------------------------------------------------------

    /// Declares a tree-function instance over existing parameters.
    ///
    /// Every listed parameter must exist; each gets the function's GUID
    /// appended to its connection list.
    pub fn connect(
        &mut self,
        guid: FuncGuid,
        inputs: Vec<ParameterId>,
        outputs: Vec<ParameterId>,
    ) -> Result<(), Error> {
        for pid in inputs.iter().chain(&outputs) {
            let slot = self.param_slot(pid)?;
            if !self.params[slot].funcs.contains(&guid) {
                self.params[slot].funcs.push(guid);
            }
        }
        self.bindings.push(FunctionBinding {
            guid,
            inputs,
            outputs,
        });
        Ok(())
    }

    /// All declared function instances, in declaration order.
    pub fn bindings(&self) -> &[FunctionBinding] {
        &self.bindings
    }

    // ------------------------------------------------------------------
    // Internals
    // ------------------------------------------------------------------

    fn node_slot(&self, id: &NodeId) -> Result<usize, Error> {
        self.node_index
            .get(id)
            .copied()
            .ok_or_else(|| Error::NodeNotFound(id.clone()))
    }

    fn param_slot(&self, id: &ParameterId) -> Result<usize, Error> {
        self.param_index
            .get(id)
            .copied()
            .ok_or_else(|| Error::ParameterNotFound(id.clone()))
    }
}
