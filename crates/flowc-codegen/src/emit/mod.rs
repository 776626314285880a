//! The emission boundary.
//!
//! A [`CompiledUnit`] describes behavior and an ordered list of dependency
//! slots. An [`ArtifactBackend`] binds concrete resources to those slots and
//! yields a [`Processor`]. The compiler does not depend on any particular
//! backend; [`InterpretingBackend`] evaluates units directly and is used for
//! testing and local execution.

pub mod function;
pub mod interpret;
pub mod sink;
pub mod table;

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::Arc;

use flowc_core::{ArtifactId, CompiledUnit, ElementKind, Record, Value, VertexElement};

use crate::error::{EmitError, RuntimeError};
use crate::repository::ArtifactRegistry;

pub use function::{Arguments, FunctionTable, UserFunction};
pub use interpret::InterpretingBackend;
pub use sink::{CollectingSink, FnSink, Sink};
pub use table::DataTable;

/// A concrete resource bound to one dependency slot.
#[derive(Debug, Clone)]
pub enum Binding {
    Value(Value),
    Sink(Arc<dyn Sink>),
    Table(Arc<DataTable>),
    Nested(Vec<Binding>),
}

impl Binding {
    pub fn kind(&self) -> ElementKind {
        match self {
            Binding::Value(_) => ElementKind::Value,
            Binding::Sink(_) => ElementKind::Output,
            Binding::Table(_) => ElementKind::DataTable,
            Binding::Nested(_) => ElementKind::Nested,
        }
    }
}

/// One unit of work handed to a processor.
#[derive(Debug, Clone)]
pub enum Input {
    Record(Record),
    /// One record list per co-grouped input, all sharing one key.
    CoGroup(Vec<Vec<Record>>),
}

impl Input {
    pub fn label(&self) -> &'static str {
        match self {
            Input::Record(_) => "record",
            Input::CoGroup(_) => "co-group",
        }
    }
}

/// Named event counts reported by a processor.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Counters(BTreeMap<&'static str, u64>);

impl Counters {
    pub fn incr(&mut self, name: &'static str) {
        *self.0.entry(name).or_insert(0) += 1;
    }

    pub fn get(&self, name: &str) -> u64 {
        self.0.get(name).copied().unwrap_or(0)
    }
}

impl fmt::Display for Counters {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, (name, count)) in self.0.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{name}={count}")?;
        }
        Ok(())
    }
}

/// A runnable instance of a compiled unit.
pub trait Processor: Send {
    fn process(&mut self, input: Input) -> Result<(), RuntimeError>;

    /// Flush any buffered state. Called once after the last input.
    fn finish(&mut self) -> Result<(), RuntimeError> {
        Ok(())
    }

    fn counters(&self) -> Counters;
}

/// Turns compiled units into processors.
pub trait ArtifactBackend {
    fn instantiate(
        &self,
        unit: &CompiledUnit,
        artifacts: &ArtifactRegistry,
        bindings: Vec<Binding>,
    ) -> Result<Box<dyn Processor>, EmitError>;
}

/// Verify that `bindings` match `elements` position by position.
pub fn check_bindings(
    artifact: &ArtifactId,
    elements: &[VertexElement],
    bindings: &[Binding],
) -> Result<(), EmitError> {
    if elements.len() != bindings.len() {
        return Err(EmitError::SlotCount {
            artifact: artifact.clone(),
            expected: elements.len(),
            actual: bindings.len(),
        });
    }
    for (slot, (element, binding)) in elements.iter().zip(bindings).enumerate() {
        if element.kind() != binding.kind() {
            return Err(EmitError::SlotKind {
                artifact: artifact.clone(),
                slot,
                expected: element.kind(),
                actual: binding.kind(),
            });
        }
        if let (VertexElement::Nested(nested), Binding::Nested(inner)) = (element, binding) {
            check_bindings(&nested.artifact, &nested.elements, inner)?;
        }
    }
    Ok(())
}

/// Builds the binding list for a unit from resources named by port or
/// table name. Constant slots default to their compile-time values.
#[derive(Debug)]
pub struct BindingsBuilder<'u> {
    unit: &'u CompiledUnit,
    sinks: HashMap<String, Arc<dyn Sink>>,
    tables: HashMap<String, Arc<DataTable>>,
    values: HashMap<String, Value>,
}

impl<'u> BindingsBuilder<'u> {
    pub fn for_unit(unit: &'u CompiledUnit) -> Self {
        Self {
            unit,
            sinks: HashMap::new(),
            tables: HashMap::new(),
            values: HashMap::new(),
        }
    }

    pub fn sink(mut self, output: impl Into<String>, sink: Arc<dyn Sink>) -> Self {
        self.sinks.insert(output.into(), sink);
        self
    }

    pub fn table(mut self, name: impl Into<String>, table: Arc<DataTable>) -> Self {
        self.tables.insert(name.into(), table);
        self
    }

    /// Override a constant's runtime value.
    pub fn value(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.values.insert(name.into(), value.into());
        self
    }

    pub fn build(self) -> Result<Vec<Binding>, EmitError> {
        self.bind_all(&self.unit.dependencies)
    }

    fn bind_all(&self, elements: &[VertexElement]) -> Result<Vec<Binding>, EmitError> {
        elements.iter().map(|e| self.bind(e)).collect()
    }

    fn bind(&self, element: &VertexElement) -> Result<Binding, EmitError> {
        Ok(match element {
            VertexElement::Value(c) => Binding::Value(
                self.values
                    .get(&c.name)
                    .cloned()
                    .unwrap_or_else(|| c.value.clone()),
            ),
            VertexElement::Output(o) => Binding::Sink(
                self.sinks
                    .get(&o.name)
                    .cloned()
                    .ok_or_else(|| EmitError::MissingSink(o.name.clone()))?,
            ),
            VertexElement::DataTable(t) => Binding::Table(
                self.tables
                    .get(&t.name)
                    .cloned()
                    .ok_or_else(|| EmitError::MissingTable(t.name.clone()))?,
            ),
            VertexElement::Nested(n) => Binding::Nested(self.bind_all(&n.elements)?),
        })
    }
}
