//! Operator descriptions produced by the upstream planner.
//!
//! An [`OperatorSpec`] is immutable once built. It names its kind, its
//! ordered input and output ports, its constant arguments, the side tables
//! it reads, and the user functions the compiled unit calls back into.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::grouping::Grouping;
use crate::types::DataType;
use crate::value::Value;

/// Stable identifier of an operator within one operator graph.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct OperatorId(String);

impl OperatorId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for OperatorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for OperatorId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

/// An enumerated discriminator type returned by branch functions.
///
/// Constant `i` selects the operator's output at position `i`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EnumType {
    pub name: String,
    pub constants: Vec<String>,
}

impl EnumType {
    pub fn new<I, S>(name: impl Into<String>, constants: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            name: name.into(),
            constants: constants.into_iter().map(Into::into).collect(),
        }
    }

    /// Ordinal of a constant.
    pub fn ordinal(&self, constant: &str) -> Option<usize> {
        self.constants.iter().position(|c| c == constant)
    }
}

/// Aggregation applied by a summarize term.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Aggregation {
    /// Value of the first record of the group.
    Any,
    /// Number of records in the group.
    Count,
    Sum,
    Max,
    Min,
}

/// One output property of a summarize operator.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SummarizeTerm {
    /// Input property (ignored for `Count`).
    pub source: String,
    /// Output property.
    pub destination: String,
    pub aggregation: Aggregation,
}

impl SummarizeTerm {
    pub fn new(source: impl Into<String>, destination: impl Into<String>, aggregation: Aggregation) -> Self {
        Self {
            source: source.into(),
            destination: destination.into(),
            aggregation,
        }
    }
}

/// Built-in housekeeping operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CoreOperatorKind {
    Checkpoint,
    Project,
    Extend,
    Restructure,
    Stop,
}

impl fmt::Display for CoreOperatorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CoreOperatorKind::Checkpoint => write!(f, "core.checkpoint"),
            CoreOperatorKind::Project => write!(f, "core.project"),
            CoreOperatorKind::Extend => write!(f, "core.extend"),
            CoreOperatorKind::Restructure => write!(f, "core.restructure"),
            CoreOperatorKind::Stop => write!(f, "core.stop"),
        }
    }
}

/// The kind of an operator, which fixes its arity contract and behavior.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OperatorKind {
    Convert,
    Branch {
        discriminator: EnumType,
    },
    Update,
    Fold,
    Summarize {
        terms: Vec<SummarizeTerm>,
    },
    MasterBranch {
        discriminator: EnumType,
        /// Branch taken without calling the user function when no master
        /// matches. When absent the function is called with no master.
        default_branch: Option<String>,
    },
    MasterCheck,
    Core(CoreOperatorKind),
    Buffer,
}

impl OperatorKind {
    /// Short label used for artifact naming and diagnostics.
    pub fn label(&self) -> &'static str {
        match self {
            OperatorKind::Convert => "convert",
            OperatorKind::Branch { .. } => "branch",
            OperatorKind::Update => "update",
            OperatorKind::Fold => "fold",
            OperatorKind::Summarize { .. } => "summarize",
            OperatorKind::MasterBranch { .. } => "masterBranch",
            OperatorKind::MasterCheck => "masterCheck",
            OperatorKind::Core(CoreOperatorKind::Checkpoint) => "checkpoint",
            OperatorKind::Core(CoreOperatorKind::Project) => "project",
            OperatorKind::Core(CoreOperatorKind::Extend) => "extend",
            OperatorKind::Core(CoreOperatorKind::Restructure) => "restructure",
            OperatorKind::Core(CoreOperatorKind::Stop) => "stop",
            OperatorKind::Buffer => "buffer",
        }
    }

    /// Whether the kind co-groups several grouped inputs.
    pub fn is_cogroup(&self) -> bool {
        matches!(
            self,
            OperatorKind::MasterBranch { .. } | OperatorKind::MasterCheck
        )
    }

    /// Whether the kind aggregates a single grouped input.
    pub fn is_aggregate(&self) -> bool {
        matches!(self, OperatorKind::Fold | OperatorKind::Summarize { .. })
    }
}

impl fmt::Display for OperatorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// An operator input.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct InputPort {
    pub name: String,
    pub data_type: DataType,
    /// Present on grouped inputs; drives (co-)group iteration.
    pub grouping: Option<Grouping>,
}

/// An operator output.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OutputPort {
    pub name: String,
    pub data_type: DataType,
}

/// A named compile-time constant argument.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ConstantValue {
    pub name: String,
    pub value: Value,
}

/// A side data table read by a user function.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TableRef {
    pub name: String,
    pub data_type: DataType,
    pub grouping: Grouping,
}

/// Kind of one user function parameter.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ParameterKind {
    /// A record of the given type (optional for master records).
    Record(DataType),
    /// All master candidates of a key group.
    RecordList(DataType),
    Table(DataType),
    Constant,
}

/// Reference to user transformation logic.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UserFunctionRef {
    pub name: String,
    /// Declared parameter signature. Empty means the planner did not
    /// supply one and the signature is not re-checked.
    pub parameters: Vec<ParameterKind>,
}

impl UserFunctionRef {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            parameters: Vec::new(),
        }
    }

    pub fn with_parameters(mut self, parameters: Vec<ParameterKind>) -> Self {
        self.parameters = parameters;
        self
    }
}

/// Immutable description of one operator node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperatorSpec {
    pub id: OperatorId,
    pub kind: OperatorKind,
    pub inputs: Vec<InputPort>,
    pub outputs: Vec<OutputPort>,
    pub arguments: Vec<ConstantValue>,
    pub tables: Vec<TableRef>,
    pub function: Option<UserFunctionRef>,
    /// Chooses one master among several candidates sharing a key.
    pub selection: Option<UserFunctionRef>,
}

impl OperatorSpec {
    pub fn new(id: impl Into<OperatorId>, kind: OperatorKind) -> Self {
        Self {
            id: id.into(),
            kind,
            inputs: Vec::new(),
            outputs: Vec::new(),
            arguments: Vec::new(),
            tables: Vec::new(),
            function: None,
            selection: None,
        }
    }

    pub fn input(mut self, name: impl Into<String>, data_type: impl Into<DataType>) -> Self {
        self.inputs.push(InputPort {
            name: name.into(),
            data_type: data_type.into(),
            grouping: None,
        });
        self
    }

    pub fn grouped_input(
        mut self,
        name: impl Into<String>,
        data_type: impl Into<DataType>,
        grouping: Grouping,
    ) -> Self {
        self.inputs.push(InputPort {
            name: name.into(),
            data_type: data_type.into(),
            grouping: Some(grouping),
        });
        self
    }

    pub fn output(mut self, name: impl Into<String>, data_type: impl Into<DataType>) -> Self {
        self.outputs.push(OutputPort {
            name: name.into(),
            data_type: data_type.into(),
        });
        self
    }

    pub fn argument(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.arguments.push(ConstantValue {
            name: name.into(),
            value: value.into(),
        });
        self
    }

    pub fn table(
        mut self,
        name: impl Into<String>,
        data_type: impl Into<DataType>,
        grouping: Grouping,
    ) -> Self {
        self.tables.push(TableRef {
            name: name.into(),
            data_type: data_type.into(),
            grouping,
        });
        self
    }

    pub fn function(mut self, function: UserFunctionRef) -> Self {
        self.function = Some(function);
        self
    }

    pub fn selection(mut self, selection: UserFunctionRef) -> Self {
        self.selection = Some(selection);
        self
    }

    pub fn find_input(&self, name: &str) -> Option<(usize, &InputPort)> {
        self.inputs.iter().enumerate().find(|(_, p)| p.name == name)
    }

    pub fn find_output(&self, name: &str) -> Option<(usize, &OutputPort)> {
        self.outputs.iter().enumerate().find(|(_, p)| p.name == name)
    }

    pub fn find_table(&self, name: &str) -> Option<(usize, &TableRef)> {
        self.tables.iter().enumerate().find(|(_, t)| t.name == name)
    }
}
