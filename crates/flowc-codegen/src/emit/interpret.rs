//! A backend that evaluates compiled units directly.

use std::sync::Arc;

use flowc_core::{
    Aggregation, ArtifactBody, ArtifactData, ArtifactId, CombinerBody, CompiledUnit, DataType, EnumType,
    Grouping, Invocation, Key, Record, SummarizeTerm, UnitBehavior, Value, VertexElement,
};
use indexmap::map::Entry;
use indexmap::IndexMap;
use tracing::{debug, trace};

use crate::emit::function::{
    Arguments, DiscriminateFn, FoldFn, FunctionTable, MasterDiscriminateFn, MasterTestFn,
    ModifyFn, SelectFn, TransformFn,
};
use crate::emit::{check_bindings, ArtifactBackend, Binding, Counters, DataTable, Input, Processor, Sink};
use crate::error::{EmitError, RuntimeError};
use crate::repository::ArtifactRegistry;

/// Resolves user functions by name from a [`FunctionTable`].
#[derive(Debug, Clone, Default)]
pub struct InterpretingBackend {
    functions: FunctionTable,
}

impl InterpretingBackend {
    pub fn new(functions: FunctionTable) -> Self {
        Self { functions }
    }

    pub fn functions(&self) -> &FunctionTable {
        &self.functions
    }
}

impl ArtifactBackend for InterpretingBackend {
    fn instantiate(
        &self,
        unit: &CompiledUnit,
        artifacts: &ArtifactRegistry,
        bindings: Vec<Binding>,
    ) -> Result<Box<dyn Processor>, EmitError> {
        check_bindings(&unit.artifact, &unit.dependencies, &bindings)?;
        let slots = Slots {
            artifact: &unit.artifact,
            bindings: &bindings,
        };
        debug!(
            unit = %unit.artifact,
            operator = %unit.operator,
            behavior = unit.behavior.label(),
            "instantiating unit"
        );
        let processor: Box<dyn Processor> = match &unit.behavior {
            UnitBehavior::Convert {
                invocation,
                converted,
                original,
            } => Box::new(ConvertProcessor {
                call: slots.call(invocation)?,
                function: self.functions.get_transform(&invocation.function)?,
                converted: slots.sink(*converted)?,
                original: slots.sink(*original)?,
                counters: Counters::default(),
            }),
            UnitBehavior::Branch {
                invocation,
                discriminator,
                branches,
            } => Box::new(BranchProcessor {
                call: slots.call(invocation)?,
                function: self.functions.get_discriminate(&invocation.function)?,
                router: Router::new(discriminator, slots.sinks(branches)?),
                counters: Counters::default(),
            }),
            UnitBehavior::Update { invocation, output } => Box::new(UpdateProcessor {
                call: slots.call(invocation)?,
                function: self.functions.get_modify(&invocation.function)?,
                output: slots.sink(*output)?,
                counters: Counters::default(),
            }),
            UnitBehavior::Aggregate {
                grouping,
                copier,
                combiner,
                output,
            } => Box::new(AggregateProcessor {
                grouping: grouping.clone(),
                seed: self.seed(artifacts, copier)?,
                merge: self.merge(artifacts, unit, &slots, *combiner)?,
                output: slots.sink(*output)?,
                state: IndexMap::new(),
                counters: Counters::default(),
            }),
            UnitBehavior::MasterCheck {
                selection,
                check,
                found,
                missing,
            } => Box::new(MasterCheckProcessor {
                selector: self.selector(&slots, selection.as_ref())?,
                check: match check {
                    Some(invocation) => Some((
                        slots.call(invocation)?,
                        self.functions.get_master_test(&invocation.function)?,
                    )),
                    None => None,
                },
                found: slots.sink(*found)?,
                missing: slots.sink(*missing)?,
                counters: Counters::default(),
            }),
            UnitBehavior::MasterBranch {
                selection,
                invocation,
                discriminator,
                branches,
                default_branch,
            } => Box::new(MasterBranchProcessor {
                selector: self.selector(&slots, selection.as_ref())?,
                call: slots.call(invocation)?,
                function: self.functions.get_master_discriminate(&invocation.function)?,
                router: Router::new(discriminator, slots.sinks(branches)?),
                default_branch: default_branch.map(|slot| slots.sink(slot)).transpose()?,
                counters: Counters::default(),
            }),
            UnitBehavior::PassThrough { output } => Box::new(PassThroughProcessor {
                output: slots.sink(*output)?,
                counters: Counters::default(),
            }),
            UnitBehavior::Mapping { factory, output } => {
                let (data_type, properties) = match &lookup(artifacts, factory)?.body {
                    ArtifactBody::Factory {
                        data_type,
                        properties,
                    } => (data_type.clone(), properties.clone()),
                    _ => {
                        return Err(EmitError::UnexpectedArtifact {
                            id: factory.clone(),
                            expected: "factory",
                        })
                    }
                };
                Box::new(MappingProcessor {
                    data_type,
                    properties,
                    output: slots.sink(*output)?,
                    counters: Counters::default(),
                })
            }
            UnitBehavior::Discard => Box::new(DiscardProcessor {
                counters: Counters::default(),
            }),
            UnitBehavior::Buffer { outputs } => Box::new(BufferProcessor {
                outputs: slots.sinks(outputs)?,
                counters: Counters::default(),
            }),
        };
        Ok(processor)
    }
}

impl InterpretingBackend {
    fn selector(&self, slots: &Slots<'_>, selection: Option<&Invocation>) -> Result<Option<Selector>, EmitError> {
        selection
            .map(|invocation| {
                Ok::<_, EmitError>(Selector {
                    call: slots.call(invocation)?,
                    function: self.functions.get_select(&invocation.function)?,
                })
            })
            .transpose()
    }

    fn seed(&self, artifacts: &ArtifactRegistry, copier: &ArtifactId) -> Result<Seed, EmitError> {
        match &lookup(artifacts, copier)?.body {
            ArtifactBody::Copier {
                data_type,
                properties,
            } => Ok(Seed::Copy {
                data_type: data_type.clone(),
                properties: properties.clone(),
            }),
            ArtifactBody::Initializer { target, terms, .. } => Ok(Seed::Summarize {
                target: target.clone(),
                terms: terms.clone(),
            }),
            _ => Err(EmitError::UnexpectedArtifact {
                id: copier.clone(),
                expected: "copier",
            }),
        }
    }

    fn merge(
        &self,
        artifacts: &ArtifactRegistry,
        unit: &CompiledUnit,
        slots: &Slots<'_>,
        slot: usize,
    ) -> Result<Merge, EmitError> {
        let (nested, inner) = match (unit.dependencies.get(slot), slots.bindings.get(slot)) {
            (Some(VertexElement::Nested(nested)), Some(Binding::Nested(inner))) => (nested, inner),
            _ => {
                return Err(EmitError::InvalidSlot {
                    artifact: unit.artifact.clone(),
                    slot,
                })
            }
        };
        match &lookup(artifacts, &nested.artifact)?.body {
            ArtifactBody::Combiner(CombinerBody::Fold { invocation, .. }) => {
                let inner_slots = Slots {
                    artifact: &nested.artifact,
                    bindings: inner,
                };
                Ok(Merge::Fold {
                    call: inner_slots.call(invocation)?,
                    function: self.functions.get_fold(&invocation.function)?,
                })
            }
            ArtifactBody::Combiner(CombinerBody::Summarize { terms, .. }) => Ok(Merge::Summarize {
                terms: terms.clone(),
            }),
            _ => Err(EmitError::UnexpectedArtifact {
                id: nested.artifact.clone(),
                expected: "combiner",
            }),
        }
    }
}

fn lookup<'r>(
    artifacts: &'r ArtifactRegistry,
    id: &ArtifactId,
) -> Result<&'r ArtifactData, EmitError> {
    artifacts
        .get(id)
        .ok_or_else(|| EmitError::MissingArtifact(id.clone()))
}

/// Positional view over checked bindings.
struct Slots<'b> {
    artifact: &'b ArtifactId,
    bindings: &'b [Binding],
}

impl Slots<'_> {
    fn invalid(&self, slot: usize) -> EmitError {
        EmitError::InvalidSlot {
            artifact: self.artifact.clone(),
            slot,
        }
    }

    fn sink(&self, slot: usize) -> Result<Arc<dyn Sink>, EmitError> {
        match self.bindings.get(slot) {
            Some(Binding::Sink(sink)) => Ok(Arc::clone(sink)),
            _ => Err(self.invalid(slot)),
        }
    }

    fn sinks(&self, slots: &[usize]) -> Result<Vec<Arc<dyn Sink>>, EmitError> {
        slots.iter().map(|&slot| self.sink(slot)).collect()
    }

    fn call(&self, invocation: &Invocation) -> Result<Call, EmitError> {
        let constants = invocation
            .arguments
            .iter()
            .map(|&slot| match self.bindings.get(slot) {
                Some(Binding::Value(v)) => Ok(v.clone()),
                _ => Err(self.invalid(slot)),
            })
            .collect::<Result<_, _>>()?;
        let tables = invocation
            .tables
            .iter()
            .map(|&slot| match self.bindings.get(slot) {
                Some(Binding::Table(t)) => Ok(Arc::clone(t)),
                _ => Err(self.invalid(slot)),
            })
            .collect::<Result<_, _>>()?;
        Ok(Call {
            function: invocation.function.clone(),
            constants,
            tables,
        })
    }
}

/// Resolved arguments of one user function invocation.
struct Call {
    function: String,
    constants: Vec<Value>,
    tables: Vec<Arc<DataTable>>,
}

impl Call {
    fn args(&self) -> Arguments<'_> {
        Arguments {
            constants: &self.constants,
            tables: &self.tables,
        }
    }
}

/// Maps discriminator constants to sinks by ordinal.
struct Router {
    discriminator: EnumType,
    branches: Vec<Arc<dyn Sink>>,
}

impl Router {
    fn new(discriminator: &EnumType, branches: Vec<Arc<dyn Sink>>) -> Self {
        Self {
            discriminator: discriminator.clone(),
            branches,
        }
    }

    fn route(&self, function: &str, constant: String) -> Result<&Arc<dyn Sink>, RuntimeError> {
        self.discriminator
            .ordinal(&constant)
            .and_then(|ordinal| self.branches.get(ordinal))
            .ok_or_else(|| RuntimeError::UnknownDiscriminator {
                function: function.to_string(),
                value: constant,
            })
    }
}

fn expect_record(unit: &'static str, input: Input) -> Result<Record, RuntimeError> {
    match input {
        Input::Record(record) => Ok(record),
        other => Err(RuntimeError::UnexpectedInput {
            unit,
            input: other.label(),
        }),
    }
}

struct ConvertProcessor {
    call: Call,
    function: Arc<TransformFn>,
    converted: Arc<dyn Sink>,
    original: Arc<dyn Sink>,
    counters: Counters,
}

impl Processor for ConvertProcessor {
    fn process(&mut self, input: Input) -> Result<(), RuntimeError> {
        let record = expect_record("convert", input)?;
        self.counters.incr("records");
        let converted = (self.function)(&record, &self.call.args());
        self.converted.add(converted)?;
        self.original.add(record)
    }

    fn counters(&self) -> Counters {
        self.counters.clone()
    }
}

struct BranchProcessor {
    call: Call,
    function: Arc<DiscriminateFn>,
    router: Router,
    counters: Counters,
}

impl Processor for BranchProcessor {
    fn process(&mut self, input: Input) -> Result<(), RuntimeError> {
        let record = expect_record("branch", input)?;
        self.counters.incr("records");
        let constant = (self.function)(&record, &self.call.args());
        self.router.route(&self.call.function, constant)?.add(record)
    }

    fn counters(&self) -> Counters {
        self.counters.clone()
    }
}

struct UpdateProcessor {
    call: Call,
    function: Arc<ModifyFn>,
    output: Arc<dyn Sink>,
    counters: Counters,
}

impl Processor for UpdateProcessor {
    fn process(&mut self, input: Input) -> Result<(), RuntimeError> {
        let mut record = expect_record("update", input)?;
        self.counters.incr("records");
        (self.function)(&mut record, &self.call.args());
        self.output.add(record)
    }

    fn counters(&self) -> Counters {
        self.counters.clone()
    }
}

/// Builds the accumulator from the first record of a key group.
enum Seed {
    Copy {
        data_type: DataType,
        properties: Vec<String>,
    },
    Summarize {
        target: DataType,
        terms: Vec<SummarizeTerm>,
    },
}

impl Seed {
    fn apply(&self, first: &Record) -> Record {
        match self {
            Seed::Copy {
                data_type,
                properties,
            } => properties.iter().fold(Record::new(data_type.clone()), |r, p| {
                r.with(p.as_str(), first.get(p).clone())
            }),
            Seed::Summarize { target, terms } => {
                terms.iter().fold(Record::new(target.clone()), |r, term| {
                    let value = match term.aggregation {
                        Aggregation::Count => Value::Int(1),
                        _ => first.get(&term.source).clone(),
                    };
                    r.with(term.destination.as_str(), value)
                })
            }
        }
    }
}

/// Merges a subsequent record of a key group into the accumulator.
enum Merge {
    Fold { call: Call, function: Arc<FoldFn> },
    Summarize { terms: Vec<SummarizeTerm> },
}

impl Merge {
    fn apply(&self, accumulator: &mut Record, next: &Record) {
        match self {
            Merge::Fold { call, function } => function(accumulator, next, &call.args()),
            Merge::Summarize { terms } => {
                for term in terms {
                    let current = accumulator.get(&term.destination);
                    let incoming = next.get(&term.source);
                    let merged = match term.aggregation {
                        Aggregation::Any => continue,
                        Aggregation::Count => sum(current, &Value::Int(1)),
                        Aggregation::Sum => sum(current, incoming),
                        Aggregation::Max => pick(current, incoming, |a, b| b > a),
                        Aggregation::Min => pick(current, incoming, |a, b| b < a),
                    };
                    accumulator.set(term.destination.as_str(), merged);
                }
            }
        }
    }
}

fn sum(a: &Value, b: &Value) -> Value {
    match (a, b) {
        (Value::Null, other) | (other, Value::Null) => other.clone(),
        (Value::Int(x), Value::Int(y)) => Value::Int(x.wrapping_add(*y)),
        _ => match (a.as_float(), b.as_float()) {
            (Some(x), Some(y)) => Value::Float(x + y),
            _ => a.clone(),
        },
    }
}

/// `current` unless `replace(current, incoming)` holds; nulls never win.
fn pick(current: &Value, incoming: &Value, replace: impl Fn(&Value, &Value) -> bool) -> Value {
    if incoming.is_null() {
        current.clone()
    } else if current.is_null() || replace(current, incoming) {
        incoming.clone()
    } else {
        current.clone()
    }
}

struct AggregateProcessor {
    grouping: Grouping,
    seed: Seed,
    merge: Merge,
    output: Arc<dyn Sink>,
    state: IndexMap<Key, Record>,
    counters: Counters,
}

impl Processor for AggregateProcessor {
    fn process(&mut self, input: Input) -> Result<(), RuntimeError> {
        let record = expect_record("aggregate", input)?;
        match self.state.entry(self.grouping.key_of(&record)) {
            Entry::Occupied(mut entry) => {
                self.merge.apply(entry.get_mut(), &record);
                self.counters.incr("combines");
            }
            Entry::Vacant(entry) => {
                entry.insert(self.seed.apply(&record));
                self.counters.incr("copies");
            }
        }
        Ok(())
    }

    fn finish(&mut self) -> Result<(), RuntimeError> {
        trace!(groups = self.state.len(), "flushing aggregate state");
        for (_, accumulator) in self.state.drain(..) {
            self.output.add(accumulator)?;
        }
        Ok(())
    }

    fn counters(&self) -> Counters {
        self.counters.clone()
    }
}

/// Chooses the master record of a key group.
struct Selector {
    call: Call,
    function: Arc<SelectFn>,
}

/// Split a co-group into master candidates and transactions.
fn split_master(input: Input, unit: &'static str) -> Result<(Vec<Record>, Vec<Record>), RuntimeError> {
    let groups = match input {
        Input::CoGroup(groups) => groups,
        other => {
            return Err(RuntimeError::UnexpectedInput {
                unit,
                input: other.label(),
            })
        }
    };
    let [masters, transactions]: [Vec<Record>; 2] =
        groups
            .try_into()
            .map_err(|groups: Vec<Vec<Record>>| RuntimeError::CoGroupArity {
                expected: 2,
                actual: groups.len(),
            })?;
    Ok((masters, transactions))
}

/// Resolve the master for a group. The selection runs at most once per
/// group, against the first transaction; no candidates means no master.
fn resolve_master<'m>(
    selector: Option<&Selector>,
    masters: &'m [Record],
    first: &Record,
    counters: &mut Counters,
) -> Result<Option<&'m Record>, RuntimeError> {
    if masters.is_empty() {
        return Ok(None);
    }
    let Some(selector) = selector else {
        return Ok(masters.first());
    };
    counters.incr("selections");
    match (selector.function)(masters, first, &selector.call.args()) {
        None => Ok(None),
        Some(index) => masters
            .get(index)
            .map(Some)
            .ok_or_else(|| RuntimeError::SelectionOutOfRange {
                function: selector.call.function.clone(),
                index,
                candidates: masters.len(),
            }),
    }
}

struct MasterCheckProcessor {
    selector: Option<Selector>,
    check: Option<(Call, Arc<MasterTestFn>)>,
    found: Arc<dyn Sink>,
    missing: Arc<dyn Sink>,
    counters: Counters,
}

impl Processor for MasterCheckProcessor {
    fn process(&mut self, input: Input) -> Result<(), RuntimeError> {
        let (masters, transactions) = split_master(input, "masterCheck")?;
        let Some(first) = transactions.first() else {
            return Ok(());
        };
        self.counters.incr("groups");
        let master = resolve_master(self.selector.as_ref(), &masters, first, &mut self.counters)?;
        for transaction in transactions.iter().cloned() {
            let found = match (master, &self.check) {
                (None, _) => false,
                (Some(_), None) => true,
                (Some(m), Some((call, test))) => test(Some(m), &transaction, &call.args()),
            };
            if found {
                self.found.add(transaction)?;
            } else {
                self.missing.add(transaction)?;
            }
        }
        Ok(())
    }

    fn counters(&self) -> Counters {
        self.counters.clone()
    }
}

struct MasterBranchProcessor {
    selector: Option<Selector>,
    call: Call,
    function: Arc<MasterDiscriminateFn>,
    router: Router,
    default_branch: Option<Arc<dyn Sink>>,
    counters: Counters,
}

impl Processor for MasterBranchProcessor {
    fn process(&mut self, input: Input) -> Result<(), RuntimeError> {
        let (masters, transactions) = split_master(input, "masterBranch")?;
        let Some(first) = transactions.first() else {
            return Ok(());
        };
        self.counters.incr("groups");
        let master = resolve_master(self.selector.as_ref(), &masters, first, &mut self.counters)?;
        for transaction in transactions.iter().cloned() {
            if let (None, Some(default)) = (master, &self.default_branch) {
                default.add(transaction)?;
                continue;
            }
            let constant = (self.function)(master, &transaction, &self.call.args());
            self.router.route(&self.call.function, constant)?.add(transaction)?;
        }
        Ok(())
    }

    fn counters(&self) -> Counters {
        self.counters.clone()
    }
}

struct PassThroughProcessor {
    output: Arc<dyn Sink>,
    counters: Counters,
}

impl Processor for PassThroughProcessor {
    fn process(&mut self, input: Input) -> Result<(), RuntimeError> {
        let record = expect_record("passThrough", input)?;
        self.counters.incr("records");
        self.output.add(record)
    }

    fn counters(&self) -> Counters {
        self.counters.clone()
    }
}

struct MappingProcessor {
    data_type: DataType,
    properties: Vec<String>,
    output: Arc<dyn Sink>,
    counters: Counters,
}

impl Processor for MappingProcessor {
    fn process(&mut self, input: Input) -> Result<(), RuntimeError> {
        let record = expect_record("mapping", input)?;
        self.counters.incr("records");
        let mapped = self
            .properties
            .iter()
            .fold(Record::new(self.data_type.clone()), |r, p| {
                r.with(p.as_str(), record.get(p).clone())
            });
        self.output.add(mapped)
    }

    fn counters(&self) -> Counters {
        self.counters.clone()
    }
}

struct DiscardProcessor {
    counters: Counters,
}

impl Processor for DiscardProcessor {
    fn process(&mut self, input: Input) -> Result<(), RuntimeError> {
        expect_record("discard", input)?;
        self.counters.incr("records");
        Ok(())
    }

    fn counters(&self) -> Counters {
        self.counters.clone()
    }
}

struct BufferProcessor {
    outputs: Vec<Arc<dyn Sink>>,
    counters: Counters,
}

impl Processor for BufferProcessor {
    fn process(&mut self, input: Input) -> Result<(), RuntimeError> {
        let record = expect_record("buffer", input)?;
        self.counters.incr("records");
        let Some((last, rest)) = self.outputs.split_last() else {
            return Ok(());
        };
        for sink in rest {
            sink.add(record.clone())?;
            self.counters.incr("copies");
        }
        last.add(record)
    }

    fn counters(&self) -> Counters {
        self.counters.clone()
    }
}
