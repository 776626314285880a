//! Record-level behavior of specialized operators, run through the
//! interpreting backend.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use flowc_codegen::{
    BindingsBuilder, CollectingSink, FnSink, FunctionTable, Input, InterpretingBackend, Processor,
    RuntimeError, Sink,
};
use flowc_compiler::{CompileError, CompiledGraph, Compiler, OperatorGraph};
use flowc_core::{
    Aggregation, CoreOperatorKind, DataModel, DataModelCatalog, EnumType, Grouping, OperatorId,
    OperatorKind, OperatorSpec, PropertyType, Record, SummarizeTerm, UserFunctionRef, Value,
};
use pretty_assertions::assert_eq;

fn catalog() -> DataModelCatalog {
    DataModelCatalog::new()
        .with(
            DataModel::new("T")
                .with_property("k", PropertyType::Int)
                .with_property("v", PropertyType::Int)
                .with_property("name", PropertyType::Text),
        )
        .with(DataModel::new("U").with_property("label", PropertyType::Text))
        .with(
            DataModel::new("M")
                .with_property("k", PropertyType::Int)
                .with_property("rank", PropertyType::Int),
        )
        .with(
            DataModel::new("S")
                .with_property("k", PropertyType::Int)
                .with_property("total", PropertyType::Int)
                .with_property("n", PropertyType::Int)
                .with_property("top", PropertyType::Int),
        )
        .with(
            DataModel::new("Narrow")
                .with_property("k", PropertyType::Int)
                .with_property("name", PropertyType::Text),
        )
}

fn compile_one(spec: OperatorSpec) -> CompiledGraph {
    let catalog = catalog();
    let mut graph = OperatorGraph::new();
    graph.add(spec).unwrap();
    Compiler::new(&catalog).compile(&graph).unwrap()
}

/// Instantiate the only vertex of `compiled`, binding each named output to
/// a fresh collecting sink.
fn instantiate(
    compiled: &CompiledGraph,
    functions: FunctionTable,
    outputs: &[&str],
) -> (Box<dyn Processor>, Vec<Arc<CollectingSink>>) {
    let id = compiled.units.keys().next().unwrap().clone();
    let unit = compiled.unit(&id).unwrap();
    let sinks: Vec<Arc<CollectingSink>> = outputs.iter().map(|_| Arc::new(CollectingSink::new())).collect();
    let mut builder = BindingsBuilder::for_unit(unit);
    for (name, sink) in outputs.iter().zip(&sinks) {
        builder = builder.sink(*name, sink.clone() as Arc<dyn Sink>);
    }
    let processor = compiled
        .instantiate(&id, &InterpretingBackend::new(functions), builder.build().unwrap())
        .unwrap();
    (processor, sinks)
}

fn t(k: i64, v: i64, name: &str) -> Record {
    Record::new("T").with("k", k).with("v", v).with("name", name)
}

fn names(records: &[Record]) -> Vec<String> {
    records
        .iter()
        .map(|r| r.get("name").as_str().unwrap_or("").to_string())
        .collect()
}

#[test]
fn convert_pushes_converted_before_original() {
    let compiled = compile_one(
        OperatorSpec::new("conv", OperatorKind::Convert)
            .input("in", "T")
            .output("converted", "U")
            .output("original", "T")
            .function(UserFunctionRef::new("label")),
    );
    let functions = FunctionTable::new().transform("label", |r, _| {
        Record::new("U").with("label", format!("#{}", r.get("name").as_str().unwrap_or("")))
    });

    let log = Arc::new(Mutex::new(Vec::<String>::new()));
    let logging = |tag: &'static str| -> Arc<dyn Sink> {
        let log = Arc::clone(&log);
        Arc::new(FnSink(move |r: Record| -> Result<(), RuntimeError> {
            log.lock().unwrap().push(format!("{tag}:{r}"));
            Ok(())
        }))
    };
    let id = OperatorId::new("conv");
    let bindings = BindingsBuilder::for_unit(compiled.unit(&id).unwrap())
        .sink("converted", logging("converted"))
        .sink("original", logging("original"))
        .build()
        .unwrap();
    let mut processor = compiled
        .instantiate(&id, &InterpretingBackend::new(functions), bindings)
        .unwrap();

    processor.process(Input::Record(t(1, 10, "a"))).unwrap();
    processor.process(Input::Record(t(2, 20, "b"))).unwrap();

    let log = log.lock().unwrap().clone();
    assert_eq!(log.len(), 4);
    assert!(log[0].starts_with("converted:U{label: \"#a\"}"));
    assert!(log[1].starts_with("original:T{k: 1"));
    assert!(log[2].starts_with("converted:U{label: \"#b\"}"));
    assert!(log[3].starts_with("original:T{k: 2"));
}

#[test]
fn convert_passes_constants_in_order() {
    let compiled = compile_one(
        OperatorSpec::new("conv", OperatorKind::Convert)
            .input("in", "T")
            .output("converted", "U")
            .output("original", "T")
            .argument("prefix", "<")
            .argument("suffix", ">")
            .function(UserFunctionRef::new("wrap")),
    );
    let functions = FunctionTable::new().transform("wrap", |r, args| {
        Record::new("U").with(
            "label",
            format!(
                "{}{}{}",
                args.constant(0).as_str().unwrap_or(""),
                r.get("name").as_str().unwrap_or(""),
                args.constant(1).as_str().unwrap_or("")
            ),
        )
    });
    let (mut processor, sinks) = instantiate(&compiled, functions, &["converted", "original"]);
    processor.process(Input::Record(t(0, 0, "x"))).unwrap();
    assert_eq!(sinks[0].records()[0].get("label"), &Value::text("<x>"));
    assert_eq!(sinks[1].records(), vec![t(0, 0, "x")]);
}

#[test]
fn branch_routes_to_exactly_one_output() {
    let compiled = compile_one(
        OperatorSpec::new(
            "br",
            OperatorKind::Branch {
                discriminator: EnumType::new("Mod", ["ZERO", "ONE", "TWO"]),
            },
        )
        .input("in", "T")
        .output("zero", "T")
        .output("one", "T")
        .output("two", "T")
        .function(UserFunctionRef::new("mod3")),
    );
    let functions = FunctionTable::new().discriminate("mod3", |r, _| {
        match r.get("v").as_int().unwrap_or(0) % 3 {
            0 => "ZERO",
            1 => "ONE",
            _ => "TWO",
        }
        .to_string()
    });
    let (mut processor, sinks) = instantiate(&compiled, functions, &["zero", "one", "two"]);
    for v in 0..9 {
        processor.process(Input::Record(t(0, v, "r"))).unwrap();
    }
    for (ordinal, sink) in sinks.iter().enumerate() {
        let values: Vec<_> = sink.records().iter().map(|r| r.get("v").as_int().unwrap()).collect();
        assert_eq!(values.len(), 3);
        assert!(values.iter().all(|v| *v % 3 == ordinal as i64));
    }
}

#[test]
fn branch_rejects_unknown_discriminator() {
    let compiled = compile_one(
        OperatorSpec::new(
            "br",
            OperatorKind::Branch {
                discriminator: EnumType::new("Flag", ["YES", "NO"]),
            },
        )
        .input("in", "T")
        .output("yes", "T")
        .output("no", "T")
        .function(UserFunctionRef::new("flag")),
    );
    let functions = FunctionTable::new().discriminate("flag", |_, _| "MAYBE".to_string());
    let (mut processor, sinks) = instantiate(&compiled, functions, &["yes", "no"]);
    let err = processor.process(Input::Record(t(0, 0, "r"))).unwrap_err();
    assert!(matches!(err, RuntimeError::UnknownDiscriminator { value, .. } if value == "MAYBE"));
    assert!(sinks.iter().all(|s| s.is_empty()));
}

#[test]
fn update_modifies_in_place() {
    let compiled = compile_one(
        OperatorSpec::new("up", OperatorKind::Update)
            .input("in", "T")
            .output("out", "T")
            .argument("step", 5)
            .function(UserFunctionRef::new("bump")),
    );
    let functions = FunctionTable::new().modify("bump", |r, args| {
        let v = r.get("v").as_int().unwrap_or(0) + args.constant(0).as_int().unwrap_or(0);
        r.set("v", v);
    });
    let (mut processor, sinks) = instantiate(&compiled, functions, &["out"]);
    processor.process(Input::Record(t(1, 1, "a"))).unwrap();
    assert_eq!(sinks[0].records(), vec![t(1, 6, "a")]);
}

fn fold_spec(bonus: i64) -> OperatorSpec {
    OperatorSpec::new("fold", OperatorKind::Fold)
        .grouped_input("in", "T", Grouping::of(["k"]))
        .output("out", "T")
        .argument("bonus", bonus)
        .function(UserFunctionRef::new("add"))
}

fn add_function() -> FunctionTable {
    FunctionTable::new().fold("add", |acc, next, args| {
        let sum = acc.get("v").as_int().unwrap_or(0)
            + next.get("v").as_int().unwrap_or(0)
            + args.constant(0).as_int().unwrap_or(0);
        acc.set("v", sum);
    })
}

#[test]
fn fold_copies_once_and_combines_the_rest() {
    let compiled = compile_one(fold_spec(0));
    let (mut processor, sinks) = instantiate(&compiled, add_function(), &["out"]);
    for record in [t(1, 1, "a"), t(2, 5, "b"), t(1, 2, "c"), t(1, 3, "d")] {
        processor.process(Input::Record(record)).unwrap();
    }
    assert!(sinks[0].is_empty());
    processor.finish().unwrap();

    let out = sinks[0].records();
    assert_eq!(out.len(), 2);
    assert_eq!(out[0].get("k"), &Value::Int(1));
    assert_eq!(out[0].get("v"), &Value::Int(6));
    assert_eq!(out[1].get("v"), &Value::Int(5));

    let counters = processor.counters();
    assert_eq!(counters.get("copies"), 2);
    assert_eq!(counters.get("combines"), 2);
}

#[test]
fn fold_result_does_not_depend_on_arrival_order() {
    let compiled = compile_one(fold_spec(0));
    let mut totals = Vec::new();
    for order in [[1, 2, 3, 4], [4, 3, 2, 1], [2, 4, 1, 3]] {
        let (mut processor, sinks) = instantiate(&compiled, add_function(), &["out"]);
        for v in order {
            processor.process(Input::Record(t(7, v, "x"))).unwrap();
        }
        processor.finish().unwrap();
        totals.push(sinks[0].records()[0].get("v").clone());
    }
    assert_eq!(totals, vec![Value::Int(10); 3]);
}

#[test]
fn fold_combiner_receives_constants() {
    let compiled = compile_one(fold_spec(100));
    let (mut processor, sinks) = instantiate(&compiled, add_function(), &["out"]);
    for v in [1, 2, 3] {
        processor.process(Input::Record(t(0, v, "x"))).unwrap();
    }
    processor.finish().unwrap();
    // two combines, each adding the constant once
    assert_eq!(sinks[0].records()[0].get("v"), &Value::Int(206));
}

#[test]
fn summarize_applies_declared_terms() {
    let terms = vec![
        SummarizeTerm::new("k", "k", Aggregation::Any),
        SummarizeTerm::new("v", "total", Aggregation::Sum),
        SummarizeTerm::new("v", "n", Aggregation::Count),
        SummarizeTerm::new("v", "top", Aggregation::Max),
    ];
    let compiled = compile_one(
        OperatorSpec::new("sum", OperatorKind::Summarize { terms })
            .grouped_input("in", "T", Grouping::of(["k"]))
            .output("out", "S"),
    );
    let (mut processor, sinks) = instantiate(&compiled, FunctionTable::new(), &["out"]);
    for record in [t(1, 4, "a"), t(1, 9, "b"), t(2, 3, "c"), t(1, 2, "d")] {
        processor.process(Input::Record(record)).unwrap();
    }
    processor.finish().unwrap();

    let out = sinks[0].records();
    assert_eq!(
        out[0],
        Record::new("S")
            .with("k", 1)
            .with("total", 15)
            .with("n", 3)
            .with("top", 9)
    );
    assert_eq!(
        out[1],
        Record::new("S")
            .with("k", 2)
            .with("total", 3)
            .with("n", 1)
            .with("top", 3)
    );
}

fn master_check(selection: Option<&str>) -> OperatorSpec {
    let spec = OperatorSpec::new("mc", OperatorKind::MasterCheck)
        .grouped_input("master", "M", Grouping::of(["k"]))
        .grouped_input("tx", "T", Grouping::of(["k"]))
        .output("found", "T")
        .output("missing", "T");
    match selection {
        Some(name) => spec.selection(UserFunctionRef::new(name)),
        None => spec,
    }
}

fn m(k: i64, rank: i64) -> Record {
    Record::new("M").with("k", k).with("rank", rank)
}

#[test]
fn master_check_routes_by_master_presence() {
    let compiled = compile_one(master_check(None));
    let (mut processor, sinks) = instantiate(&compiled, FunctionTable::new(), &["found", "missing"]);
    processor
        .process(Input::CoGroup(vec![vec![m(0, 1)], vec![t(0, 0, "A"), t(0, 0, "B")]]))
        .unwrap();
    assert_eq!(names(&sinks[0].records()), vec!["A", "B"]);
    assert!(sinks[1].is_empty());

    let (mut processor, sinks) = instantiate(&compiled, FunctionTable::new(), &["found", "missing"]);
    processor
        .process(Input::CoGroup(vec![vec![], vec![t(0, 0, "A"), t(0, 0, "B")]]))
        .unwrap();
    assert!(sinks[0].is_empty());
    assert_eq!(names(&sinks[1].records()), vec!["A", "B"]);
}

#[test]
fn selection_runs_once_per_group() {
    let compiled = compile_one(master_check(Some("best")));
    let calls = Arc::new(AtomicUsize::new(0));
    let counted = Arc::clone(&calls);
    let functions = FunctionTable::new().select("best", move |masters, _tx, _| {
        counted.fetch_add(1, Ordering::SeqCst);
        masters
            .iter()
            .enumerate()
            .max_by_key(|(_, r)| r.get("rank").as_int())
            .map(|(i, _)| i)
    });
    let (mut processor, sinks) = instantiate(&compiled, functions, &["found", "missing"]);

    let transactions: Vec<_> = ["A", "B", "C", "D"].iter().map(|n| t(3, 0, n)).collect();
    processor
        .process(Input::CoGroup(vec![vec![m(3, 1), m(3, 9), m(3, 4)], transactions]))
        .unwrap();
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(sinks[0].len(), 4);

    // no candidates: the selection is skipped and everything is missing
    processor
        .process(Input::CoGroup(vec![vec![], vec![t(4, 0, "E"), t(4, 0, "F")]]))
        .unwrap();
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(names(&sinks[1].records()), vec!["E", "F"]);
    assert_eq!(processor.counters().get("selections"), 1);
    assert_eq!(processor.counters().get("groups"), 2);
}

#[test]
fn selection_returning_none_means_missing() {
    let compiled = compile_one(master_check(Some("none")));
    let functions = FunctionTable::new().select("none", |_, _, _| None);
    let (mut processor, sinks) = instantiate(&compiled, functions, &["found", "missing"]);
    processor
        .process(Input::CoGroup(vec![vec![m(1, 1)], vec![t(1, 0, "A")]]))
        .unwrap();
    assert!(sinks[0].is_empty());
    assert_eq!(names(&sinks[1].records()), vec!["A"]);
}

#[test]
fn master_check_rejects_wrong_cogroup_arity() {
    let compiled = compile_one(master_check(None));
    let (mut processor, _) = instantiate(&compiled, FunctionTable::new(), &["found", "missing"]);
    assert!(matches!(
        processor.process(Input::CoGroup(vec![vec![]])),
        Err(RuntimeError::CoGroupArity { expected: 2, actual: 1 })
    ));
    assert!(matches!(
        processor.process(Input::Record(t(0, 0, "A"))),
        Err(RuntimeError::UnexpectedInput { .. })
    ));
}

#[test]
fn master_branch_uses_default_branch_without_master() {
    let compiled = compile_one(
        OperatorSpec::new(
            "mb",
            OperatorKind::MasterBranch {
                discriminator: EnumType::new("Tier", ["GOLD", "PLAIN", "NONE"]),
                default_branch: Some("NONE".to_string()),
            },
        )
        .grouped_input("master", "M", Grouping::of(["k"]))
        .grouped_input("tx", "T", Grouping::of(["k"]))
        .output("gold", "T")
        .output("plain", "T")
        .output("none", "T")
        .function(UserFunctionRef::new("tier")),
    );
    let calls = Arc::new(AtomicUsize::new(0));
    let counted = Arc::clone(&calls);
    let functions = FunctionTable::new().master_discriminate("tier", move |master, _tx, _| {
        counted.fetch_add(1, Ordering::SeqCst);
        match master.and_then(|m| m.get("rank").as_int()) {
            Some(rank) if rank > 5 => "GOLD",
            _ => "PLAIN",
        }
        .to_string()
    });
    let (mut processor, sinks) = instantiate(&compiled, functions, &["gold", "plain", "none"]);
    processor
        .process(Input::CoGroup(vec![vec![m(1, 9)], vec![t(1, 0, "A"), t(1, 0, "B")]]))
        .unwrap();
    processor
        .process(Input::CoGroup(vec![vec![m(2, 1)], vec![t(2, 0, "C")]]))
        .unwrap();
    processor
        .process(Input::CoGroup(vec![vec![], vec![t(3, 0, "D")]]))
        .unwrap();

    assert_eq!(names(&sinks[0].records()), vec!["A", "B"]);
    assert_eq!(names(&sinks[1].records()), vec!["C"]);
    assert_eq!(names(&sinks[2].records()), vec!["D"]);
    assert_eq!(calls.load(Ordering::SeqCst), 3);
}

#[test]
fn master_branch_selects_once_per_group() {
    let compiled = compile_one(
        OperatorSpec::new(
            "mb",
            OperatorKind::MasterBranch {
                discriminator: EnumType::new("Tier", ["GOLD", "PLAIN", "NONE"]),
                default_branch: Some("NONE".to_string()),
            },
        )
        .grouped_input("master", "M", Grouping::of(["k"]))
        .grouped_input("tx", "T", Grouping::of(["k"]))
        .output("gold", "T")
        .output("plain", "T")
        .output("none", "T")
        .function(UserFunctionRef::new("tier"))
        .selection(UserFunctionRef::new("highest")),
    );
    let selections = Arc::new(AtomicUsize::new(0));
    let counted = Arc::clone(&selections);
    let functions = FunctionTable::new()
        .select("highest", move |masters, _tx, _| {
            counted.fetch_add(1, Ordering::SeqCst);
            masters
                .iter()
                .enumerate()
                .max_by_key(|(_, r)| r.get("rank").as_int())
                .map(|(i, _)| i)
        })
        .master_discriminate("tier", |master, _tx, _| {
            match master.and_then(|m| m.get("rank").as_int()) {
                Some(rank) if rank > 5 => "GOLD",
                _ => "PLAIN",
            }
            .to_string()
        });
    let (mut processor, sinks) = instantiate(&compiled, functions, &["gold", "plain", "none"]);

    let transactions: Vec<_> = ["A", "B", "C"].iter().map(|n| t(5, 0, n)).collect();
    processor
        .process(Input::CoGroup(vec![vec![m(5, 2), m(5, 8), m(5, 3)], transactions]))
        .unwrap();
    assert_eq!(selections.load(Ordering::SeqCst), 1);
    // the highest-ranked candidate decides for the whole group
    assert_eq!(names(&sinks[0].records()), vec!["A", "B", "C"]);

    processor
        .process(Input::CoGroup(vec![vec![], vec![t(6, 0, "D"), t(6, 0, "E")]]))
        .unwrap();
    assert_eq!(selections.load(Ordering::SeqCst), 1);
    assert_eq!(names(&sinks[2].records()), vec!["D", "E"]);
    assert!(sinks[1].is_empty());
    assert_eq!(processor.counters().get("selections"), 1);
}

#[test]
fn buffer_gives_each_consumer_its_own_copy() {
    let compiled = compile_one(
        OperatorSpec::new("buf", OperatorKind::Buffer)
            .input("in", "T")
            .output("a", "T")
            .output("b", "T")
            .output("c", "T"),
    );
    let (mut processor, sinks) = instantiate(&compiled, FunctionTable::new(), &["a", "b", "c"]);
    processor.process(Input::Record(t(1, 1, "x"))).unwrap();
    for sink in &sinks {
        assert_eq!(sink.records(), vec![t(1, 1, "x")]);
    }
    assert_eq!(processor.counters().get("copies"), 2);
}

#[test]
fn project_keeps_shared_properties() {
    let compiled = compile_one(
        OperatorSpec::new("proj", OperatorKind::Core(CoreOperatorKind::Project))
            .input("in", "T")
            .output("out", "Narrow"),
    );
    let (mut processor, sinks) = instantiate(&compiled, FunctionTable::new(), &["out"]);
    processor.process(Input::Record(t(4, 40, "n"))).unwrap();
    assert_eq!(
        sinks[0].records(),
        vec![Record::new("Narrow").with("k", 4).with("name", "n")]
    );
}

#[test]
fn checkpoint_and_stop() {
    let compiled = compile_one(
        OperatorSpec::new("cp", OperatorKind::Core(CoreOperatorKind::Checkpoint))
            .input("in", "T")
            .output("out", "T"),
    );
    let (mut processor, sinks) = instantiate(&compiled, FunctionTable::new(), &["out"]);
    processor.process(Input::Record(t(1, 1, "x"))).unwrap();
    assert_eq!(sinks[0].len(), 1);

    let compiled = compile_one(
        OperatorSpec::new("stop", OperatorKind::Core(CoreOperatorKind::Stop)).input("in", "T"),
    );
    let (mut processor, _) = instantiate(&compiled, FunctionTable::new(), &[]);
    processor.process(Input::Record(t(1, 1, "x"))).unwrap();
    assert_eq!(processor.counters().get("records"), 1);
}

#[test]
fn emission_failures_are_wrapped() {
    let compiled = compile_one(fold_spec(0));
    let id = OperatorId::new("fold");

    let err = match compiled.instantiate(&id, &InterpretingBackend::default(), vec![]) {
        Err(err) => err,
        Ok(_) => panic!("empty bindings must be rejected"),
    };
    assert!(matches!(&err, CompileError::Emit { vertex, .. } if vertex.as_str() == "fold"));

    let bindings = BindingsBuilder::for_unit(compiled.unit(&id).unwrap())
        .sink("out", Arc::new(CollectingSink::new()))
        .build()
        .unwrap();
    let err = match compiled.instantiate(&id, &InterpretingBackend::default(), bindings) {
        Err(err) => err,
        Ok(_) => panic!("unknown function must be rejected"),
    };
    assert!(err.to_string().contains("unknown user function: add"));
}
