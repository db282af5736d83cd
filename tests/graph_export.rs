//! Dependency-graph structure: vertex/edge accessors, the DOT-fragment
//! export format, and cycle reporting.

use std::sync::Arc;

use docflow::{
    DependencyGraph, Document, Error, FuncGuid, FunctionRegistry, NodeId, ParamValue, ParameterId,
    TreeFunction, UserData,
};

struct Named {
    guid: FuncGuid,
    name: &'static str,
}

impl TreeFunction for Named {
    fn guid(&self) -> FuncGuid {
        self.guid
    }

    fn name(&self) -> &str {
        self.name
    }

    fn execute(
        &self,
        inputs: &[ParamValue],
        outputs: &mut [ParamValue],
        _user_data: Option<&UserData>,
    ) -> anyhow::Result<()> {
        if let (Some(v), Some(slot)) = (inputs.first(), outputs.first_mut()) {
            *slot = v.clone();
        }
        Ok(())
    }
}

fn pid(s: &str) -> ParameterId {
    ParameterId::new(s).unwrap()
}

fn nid(s: &str) -> NodeId {
    NodeId::new(s).unwrap()
}

fn register(registry: &mut FunctionRegistry, guid: FuncGuid, name: &'static str) {
    registry.register(move || Arc::new(Named { guid, name }) as Arc<dyn TreeFunction>);
}

#[test]
fn vertices_deduplicate_by_parameter_id() {
    let mut doc = Document::new();
    doc.add_node(nid("0:1:0:1"), "n", false, None).unwrap();
    for p in ["0:1:0:1:1", "0:1:0:1:2", "0:1:0:1:3"] {
        doc.add_parameter(pid(p), ParamValue::Int(0)).unwrap();
    }
    let mut registry = FunctionRegistry::new();
    register(&mut registry, FuncGuid(1), "first");
    register(&mut registry, FuncGuid(2), "second");
    // The shared middle parameter appears in both bindings but gets a
    // single vertex.
    doc.connect(FuncGuid(1), vec![pid("0:1:0:1:1")], vec![pid("0:1:0:1:2")])
        .unwrap();
    doc.connect(FuncGuid(2), vec![pid("0:1:0:1:2")], vec![pid("0:1:0:1:3")])
        .unwrap();

    let graph = DependencyGraph::build(&doc, &registry).unwrap();
    assert_eq!(graph.vertices().len(), 3);
    assert_eq!(graph.edges().len(), 2);

    let shared = graph
        .vertices()
        .iter()
        .find(|v| v.param == pid("0:1:0:1:2"))
        .unwrap();
    assert_eq!(shared.node, nid("0:1:0:1"));
    assert_eq!(shared.func, FuncGuid(1));
}

#[test]
fn dot_lines_use_variable_names_for_variable_nodes() {
    let mut doc = Document::new();
    // A Variable-kind node is labeled by its name; a plain node by its id.
    doc.add_node(nid("0:1:0:1"), "radius", true, None).unwrap();
    doc.add_node(nid("0:1:0:2"), "cylinder", false, None).unwrap();
    doc.add_parameter(pid("0:1:0:1:1"), ParamValue::Real(2.5))
        .unwrap();
    doc.add_parameter(pid("0:1:0:2:1"), ParamValue::Real(0.0))
        .unwrap();

    let mut registry = FunctionRegistry::new();
    register(&mut registry, FuncGuid(7), "Evaluate");
    doc.connect(FuncGuid(7), vec![pid("0:1:0:1:1")], vec![pid("0:1:0:2:1")])
        .unwrap();

    let graph = DependencyGraph::build(&doc, &registry).unwrap();
    let lines = graph.dot_lines(&doc).unwrap();
    assert_eq!(
        lines,
        vec![r#""Evaluate (radius)" -> "Evaluate (0:1:0:2)";"#.to_string()]
    );
}

#[test]
fn unresolved_guid_fails_the_build() {
    let mut doc = Document::new();
    doc.add_node(nid("0:1:0:1"), "n", false, None).unwrap();
    doc.add_parameter(pid("0:1:0:1:1"), ParamValue::Int(0))
        .unwrap();
    doc.add_parameter(pid("0:1:0:1:2"), ParamValue::Int(0))
        .unwrap();
    doc.connect(FuncGuid(99), vec![pid("0:1:0:1:1")], vec![pid("0:1:0:1:2")])
        .unwrap();

    let registry = FunctionRegistry::new();
    assert!(matches!(
        DependencyGraph::build(&doc, &registry),
        Err(Error::UnresolvedFunction {
            guid: FuncGuid(99)
        })
    ));
}

/// Two functions feeding each other: F1 a -> b, F2 b -> a.
fn cyclic_fixture() -> (Document, FunctionRegistry) {
    let mut doc = Document::new();
    doc.add_node(nid("0:1:0:1"), "n", false, None).unwrap();
    for p in ["0:1:0:1:1", "0:1:0:1:2", "0:1:0:1:3"] {
        doc.add_parameter(pid(p), ParamValue::Int(0)).unwrap();
    }
    let mut registry = FunctionRegistry::new();
    register(&mut registry, FuncGuid(1), "forward");
    register(&mut registry, FuncGuid(2), "backward");
    register(&mut registry, FuncGuid(3), "downstream");
    doc.connect(FuncGuid(1), vec![pid("0:1:0:1:1")], vec![pid("0:1:0:1:2")])
        .unwrap();
    doc.connect(FuncGuid(2), vec![pid("0:1:0:1:2")], vec![pid("0:1:0:1:1")])
        .unwrap();
    // Downstream of the loop: not a member, but never calculable.
    doc.connect(FuncGuid(3), vec![pid("0:1:0:1:2")], vec![pid("0:1:0:1:3")])
        .unwrap();
    (doc, registry)
}

#[test]
fn cycle_is_reported_not_looped() {
    let (doc, registry) = cyclic_fixture();
    let err = DependencyGraph::build(&doc, &registry).unwrap_err();
    match err {
        Error::CycleDetected { functions } => {
            assert_eq!(functions, vec![FuncGuid(1), FuncGuid(2)]);
        }
        other => panic!("expected CycleDetected, got {other:?}"),
    }
}

#[test]
fn enriched_cycle_report_includes_blocked_successors() {
    let (doc, registry) = cyclic_fixture();
    let graph = DependencyGraph::build_unchecked(&doc, &registry).unwrap();

    let plain = graph.cyclic_functions(false);
    assert_eq!(plain, vec![FuncGuid(1), FuncGuid(2)]);

    let enriched = graph.cyclic_functions(true);
    assert_eq!(enriched, vec![FuncGuid(1), FuncGuid(2), FuncGuid(3)]);
}

#[test]
fn acyclic_graph_reports_no_cyclic_functions() {
    let mut doc = Document::new();
    doc.add_node(nid("0:1:0:1"), "n", false, None).unwrap();
    doc.add_parameter(pid("0:1:0:1:1"), ParamValue::Int(0))
        .unwrap();
    doc.add_parameter(pid("0:1:0:1:2"), ParamValue::Int(0))
        .unwrap();
    let mut registry = FunctionRegistry::new();
    register(&mut registry, FuncGuid(1), "only");
    doc.connect(FuncGuid(1), vec![pid("0:1:0:1:1")], vec![pid("0:1:0:1:2")])
        .unwrap();

    let graph = DependencyGraph::build(&doc, &registry).unwrap();
    assert!(graph.cyclic_functions(true).is_empty());
}
