//! Whole-graph compilation: assembly, dependencies and failure modes.

use flowc_compiler::{CompileError, CompileOptions, Compiler, ConfigError, OperatorGraph};
use flowc_core::{
    ArtifactBody, CoreOperatorKind, DataModel, DataModelCatalog, EdgeDescriptor, ElementKind,
    GraphError, Grouping, OperatorId, OperatorKind, OperatorSpec, PortId, PropertyType, SubPlanRef,
    UserFunctionRef, VertexElement, IMPLICIT_PORT,
};
use pretty_assertions::assert_eq;

fn catalog() -> DataModelCatalog {
    DataModelCatalog::new()
        .with(
            DataModel::new("example.Order")
                .with_property("id", PropertyType::Long)
                .with_property("customer", PropertyType::Long)
                .with_property("amount", PropertyType::Long),
        )
        .with(
            DataModel::new("example.Customer")
                .with_property("customer", PropertyType::Long)
                .with_property("name", PropertyType::Text),
        )
        .with(DataModel::new("example.Receipt").with_property("text", PropertyType::Text))
}

fn checkpoint(id: &str, ty: &str) -> OperatorSpec {
    OperatorSpec::new(id, OperatorKind::Core(CoreOperatorKind::Checkpoint))
        .input("in", ty)
        .output("out", ty)
}

fn stop(id: &str, ty: &str) -> OperatorSpec {
    OperatorSpec::new(id, OperatorKind::Core(CoreOperatorKind::Stop)).input("in", ty)
}

/// conv splits orders into receipts and originals; both flow on.
fn pipeline() -> OperatorGraph {
    let mut graph = OperatorGraph::new();
    graph.add(checkpoint("src", "example.Order")).unwrap();
    graph
        .add(
            OperatorSpec::new("conv", OperatorKind::Convert)
                .input("in", "example.Order")
                .output("converted", "example.Receipt")
                .output("original", "example.Order")
                .function(UserFunctionRef::new("receipt")),
        )
        .unwrap();
    graph.add(stop("receipts", "example.Receipt")).unwrap();
    graph.add(checkpoint("orders", "example.Order")).unwrap();
    graph
        .connect("src", "out", "conv", "in")
        .connect("conv", "converted", "receipts", "in")
        .connect("conv", "original", "orders", "in");
    graph
}

fn codec_of(descriptor: &EdgeDescriptor) -> &str {
    match descriptor {
        EdgeDescriptor::OneToOne { codec }
        | EdgeDescriptor::Broadcast { codec }
        | EdgeDescriptor::ScatterGather { codec, .. } => codec.as_str(),
        EdgeDescriptor::Void => "",
    }
}

#[test]
fn edges_follow_connections() {
    let catalog = catalog();
    let compiled = Compiler::new(&catalog).compile(&pipeline()).unwrap();

    assert_eq!(compiled.graph.vertex_count(), 4);
    assert_eq!(compiled.graph.edge_count(), 3);
    let edges: Vec<_> = compiled
        .graph
        .edges()
        .iter()
        .map(|e| (e.upstream.to_string(), e.downstream.to_string()))
        .collect();
    assert_eq!(
        edges,
        vec![
            ("src.out(OUTPUT)".to_string(), "conv.in(INPUT)".to_string()),
            ("conv.converted(OUTPUT)".to_string(), "receipts.in(INPUT)".to_string()),
            ("conv.original(OUTPUT)".to_string(), "orders.in(INPUT)".to_string()),
        ]
    );

    let conv = compiled.graph.vertex("conv").unwrap();
    assert_eq!(conv.descriptor().kind, "convert");
    assert_eq!(conv.descriptor().artifact, compiled.unit(&OperatorId::new("conv")).unwrap().artifact);
}

#[test]
fn value_codecs_are_shared_per_type() {
    let catalog = catalog();
    let compiled = Compiler::new(&catalog).compile(&pipeline()).unwrap();

    let order_edges: Vec<_> = compiled
        .graph
        .edges()
        .iter()
        .filter(|e| e.downstream.vertex != "receipts")
        .map(|e| codec_of(&e.descriptor))
        .collect();
    assert_eq!(order_edges.len(), 2);
    assert_eq!(order_edges[0], order_edges[1]);

    let codecs = compiled
        .artifacts
        .iter()
        .filter(|a| matches!(a.body, ArtifactBody::ValueCodec { .. }))
        .count();
    // Order and Receipt
    assert_eq!(codecs, 2);
}

#[test]
fn compilation_is_deterministic() {
    let catalog = catalog();
    let compiler = Compiler::new(&catalog);
    let first = compiler.compile(&pipeline()).unwrap();
    let second = compiler.compile(&pipeline()).unwrap();
    assert_eq!(first.graph, second.graph);
    assert_eq!(first.units, second.units);
    let ids = |c: &flowc_compiler::CompiledGraph| {
        c.artifacts.iter().map(|a| a.id.to_string()).collect::<Vec<_>>()
    };
    assert_eq!(ids(&first), ids(&second));
}

#[test]
fn prefix_names_every_artifact() {
    let catalog = catalog();
    let compiled = Compiler::new(&catalog)
        .with_options(CompileOptions::default().with_prefix("batch.orders."))
        .compile(&pipeline())
        .unwrap();
    assert!(compiled
        .artifacts
        .iter()
        .all(|a| a.id.as_str().starts_with("batch.orders.")));
}

#[test]
fn grouped_inputs_scatter_by_key() {
    let catalog = catalog();
    let mut graph = OperatorGraph::new();
    graph.add(checkpoint("src", "example.Order")).unwrap();
    graph
        .add(
            OperatorSpec::new("total", OperatorKind::Fold)
                .grouped_input("in", "example.Order", Grouping::of(["customer"]))
                .output("out", "example.Order")
                .function(UserFunctionRef::new("add")),
        )
        .unwrap();
    graph.connect("src", "out", "total", "in");
    let compiled = Compiler::new(&catalog).compile(&graph).unwrap();

    let edge = &compiled.graph.edges()[0];
    match &edge.descriptor {
        EdgeDescriptor::ScatterGather { codec, grouping } => {
            assert_eq!(grouping, &Grouping::of(["customer"]));
            assert!(matches!(
                compiled.artifacts.get(codec).map(|a| &a.body),
                Some(ArtifactBody::KeyValueCodec { .. })
            ));
        }
        other => panic!("expected scatter-gather, got {other:?}"),
    }

    let unit = compiled.unit(&OperatorId::new("total")).unwrap();
    let helpers = unit.aggregate.as_ref().unwrap();
    assert_eq!(helpers.copier, unit.artifact.nested("Copier"));
    assert_eq!(helpers.combiner, unit.artifact.nested("Combiner"));
    assert!(compiled.artifacts.contains(&helpers.copier));
    assert!(compiled.artifacts.contains(&helpers.combiner));

    // combiner slot first, then the output
    let kinds: Vec<_> = unit.dependencies.iter().map(VertexElement::kind).collect();
    assert_eq!(kinds, vec![ElementKind::Nested, ElementKind::Output]);
}

#[test]
fn tables_are_broadcast() {
    let catalog = catalog();
    let mut graph = pipeline();
    graph.add(checkpoint("customers", "example.Customer")).unwrap();
    graph
        .add(
            OperatorSpec::new("enrich", OperatorKind::Update)
                .input("in", "example.Order")
                .output("out", "example.Order")
                .table("byCustomer", "example.Customer", Grouping::of(["customer"]))
                .function(UserFunctionRef::new("enrich")),
        )
        .unwrap();
    graph
        .connect("orders", "out", "enrich", "in")
        .bind_table("customers", "out", "enrich", "byCustomer");
    let compiled = Compiler::new(&catalog).compile(&graph).unwrap();

    let port = PortId::input("enrich", "byCustomer");
    let edges: Vec<_> = compiled.graph.edges_to(&port).collect();
    assert_eq!(edges.len(), 1);
    assert!(matches!(edges[0].descriptor, EdgeDescriptor::Broadcast { .. }));

    let unit = compiled.unit(&OperatorId::new("enrich")).unwrap();
    assert_eq!(unit.slots_of(ElementKind::DataTable), vec![1]);
}

#[test]
fn unbound_table_is_rejected() {
    let catalog = catalog();
    let mut graph = OperatorGraph::new();
    graph
        .add(
            OperatorSpec::new("enrich", OperatorKind::Update)
                .input("in", "example.Order")
                .output("out", "example.Order")
                .table("byCustomer", "example.Customer", Grouping::of(["customer"]))
                .function(UserFunctionRef::new("enrich")),
        )
        .unwrap();
    let err = Compiler::new(&catalog).compile(&graph).unwrap_err();
    assert_eq!(
        err.to_string(),
        "operator enrich: table byCustomer is not bound"
    );
}

#[test]
fn implicit_dependency_adds_one_void_edge() {
    let catalog = catalog();
    let mut graph = pipeline();
    graph.add_dependency("receipts", "orders");
    let compiled = Compiler::new(&catalog).compile(&graph).unwrap();

    let receipts = compiled.graph.vertex("receipts").unwrap();
    let orders = compiled.graph.vertex("orders").unwrap();
    assert!(receipts.find_input(IMPLICIT_PORT).is_some());
    assert!(orders.find_output(IMPLICIT_PORT).is_some());
    assert_eq!(compiled.graph.edge_count(), 4);

    let implicit: Vec<_> = compiled
        .graph
        .edges()
        .iter()
        .filter(|e| e.descriptor.is_void())
        .collect();
    assert_eq!(implicit.len(), 1);
    assert_eq!(implicit[0].upstream, PortId::output("orders", IMPLICIT_PORT));
    assert_eq!(implicit[0].downstream, PortId::input("receipts", IMPLICIT_PORT));

    assert!(graph.remove_dependency(&OperatorId::new("receipts"), &OperatorId::new("orders")));
    let compiled = Compiler::new(&catalog).compile(&graph).unwrap();
    assert!(compiled.graph.edges().iter().all(|e| !e.descriptor.is_void()));
    assert!(compiled
        .graph
        .vertices()
        .all(|v| v.inputs().iter().chain(v.outputs()).all(|p| p.name != IMPLICIT_PORT)));
}

#[test]
fn dependency_on_missing_operator_fails() {
    let catalog = catalog();
    let mut graph = pipeline();
    graph.add_dependency("receipts", "nowhere");
    assert!(matches!(
        Compiler::new(&catalog).compile(&graph),
        Err(CompileError::Graph(GraphError::UnknownDependency { .. }))
    ));
}

#[test]
fn origins_must_be_unique() {
    let catalog = catalog();
    let mut graph = pipeline();
    graph.set_origin("src", SubPlanRef("plan-1".into()));
    graph.set_origin("orders", SubPlanRef("plan-1".into()));
    assert!(matches!(
        Compiler::new(&catalog).compile(&graph),
        Err(CompileError::Graph(GraphError::DuplicateOrigin { .. }))
    ));
}

#[test]
fn arity_violation_names_the_operator() {
    let catalog = catalog();
    let mut graph = OperatorGraph::new();
    graph
        .add(
            OperatorSpec::new("half", OperatorKind::Convert)
                .input("in", "example.Order")
                .output("converted", "example.Receipt")
                .function(UserFunctionRef::new("receipt")),
        )
        .unwrap();
    match Compiler::new(&catalog).compile(&graph) {
        Err(CompileError::Arity { operator, .. }) => assert_eq!(operator.as_str(), "half"),
        other => panic!("expected arity error, got {other:?}"),
    }
}

#[test]
fn missing_function_is_rejected() {
    let catalog = catalog();
    let mut graph = OperatorGraph::new();
    graph
        .add(
            OperatorSpec::new("conv", OperatorKind::Convert)
                .input("in", "example.Order")
                .output("converted", "example.Receipt")
                .output("original", "example.Order"),
        )
        .unwrap();
    assert!(matches!(
        Compiler::new(&catalog).compile(&graph),
        Err(CompileError::MissingFunction { .. })
    ));
}

#[test]
fn mismatched_connection_is_rejected() {
    let catalog = catalog();
    let mut graph = pipeline();
    graph.connect("conv", "converted", "orders", "in");
    let err = Compiler::new(&catalog).compile(&graph).unwrap_err();
    assert!(matches!(err, CompileError::Connection { .. }));
    assert!(err.to_string().contains("type mismatch"));

    let mut graph = pipeline();
    graph.connect("conv", "nope", "orders", "in");
    assert!(Compiler::new(&catalog)
        .compile(&graph)
        .unwrap_err()
        .to_string()
        .contains("conv has no output nope"));
}

#[test]
fn unknown_grouping_key() {
    let catalog = catalog();
    let mut graph = OperatorGraph::new();
    graph
        .add(
            OperatorSpec::new("total", OperatorKind::Fold)
                .grouped_input("in", "example.Order", Grouping::of(["region"]))
                .output("out", "example.Order")
                .function(UserFunctionRef::new("add")),
        )
        .unwrap();

    match Compiler::new(&catalog).compile(&graph) {
        Err(CompileError::UnknownGroupingKey { key, .. }) => assert_eq!(key, "region"),
        other => panic!("expected grouping error, got {other:?}"),
    }

    let lenient = CompileOptions {
        strict_grouping: false,
        ..CompileOptions::default()
    };
    assert!(matches!(
        Compiler::new(&catalog).with_options(lenient).compile(&graph),
        Err(CompileError::Codegen { .. })
    ));
}

#[test]
fn unknown_data_model_is_a_codegen_error() {
    let catalog = catalog();
    let mut graph = OperatorGraph::new();
    graph.add(checkpoint("cp", "example.Unknown")).unwrap();
    let lenient = CompileOptions {
        strict_grouping: false,
        ..CompileOptions::default()
    };
    let err = Compiler::new(&catalog)
        .with_options(lenient)
        .compile(&graph)
        .unwrap_err();
    assert!(err.to_string().contains("unknown data model: example.Unknown"));
}

#[test]
fn artifacts_are_dumped_when_configured() {
    let dir = tempfile::tempdir().unwrap();
    let options = CompileOptions::default().with_dump_dir(dir.path().join("artifacts"));
    let catalog = catalog();
    let compiled = Compiler::new(&catalog)
        .with_options(options)
        .compile(&pipeline())
        .unwrap();

    let written = std::fs::read_dir(dir.path().join("artifacts")).unwrap().count();
    assert_eq!(written, compiled.artifacts.len());

    let conv = compiled.unit(&OperatorId::new("conv")).unwrap();
    let path = dir.path().join("artifacts").join(format!("{}.json", conv.artifact));
    let json: serde_json::Value = serde_json::from_str(&std::fs::read_to_string(path).unwrap()).unwrap();
    assert_eq!(json["id"], conv.artifact.as_str());
}

#[test]
fn options_load_from_toml() {
    let dir = tempfile::tempdir().unwrap();
    let options = CompileOptions::from_toml_str(&format!(
        "prefix = \"nightly.\"\ndump-artifacts = true\ndump-dir = {:?}\n",
        dir.path().display().to_string()
    ))
    .unwrap();
    let catalog = catalog();
    let compiled = Compiler::new(&catalog)
        .with_options(options)
        .compile(&pipeline())
        .unwrap();
    assert!(compiled.artifacts.iter().all(|a| a.id.as_str().starts_with("nightly.")));
    assert_eq!(
        std::fs::read_dir(dir.path()).unwrap().count(),
        compiled.artifacts.len()
    );
}

#[test]
fn dump_without_directory_is_rejected() {
    let catalog = catalog();
    let options = CompileOptions {
        dump_artifacts: true,
        ..CompileOptions::default()
    };
    let err = Compiler::new(&catalog)
        .with_options(options)
        .compile(&pipeline())
        .unwrap_err();
    assert!(matches!(err, CompileError::Config(ConfigError::Invalid { .. })));
    assert!(err.to_string().contains("dump-artifacts requires dump-dir"));
}
