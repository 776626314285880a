//! Dependency slots of a compiled unit.
//!
//! A compiled unit is instantiated by binding every [`VertexElement`] in
//! order. Output elements refer to sinks by port name only; the surrounding
//! graph owns the sinks.

use serde::{Deserialize, Serialize};

use crate::artifact::ArtifactId;
use crate::operator::{ConstantValue, TableRef};
use crate::types::DataType;

/// Discriminant of a [`VertexElement`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ElementKind {
    Value,
    Output,
    DataTable,
    Nested,
}

/// A downstream sink slot, referenced by the owning operator's output name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OutputElement {
    pub name: String,
    pub data_type: DataType,
}

/// A nested helper unit together with its own dependency slots.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NestedElement {
    pub artifact: ArtifactId,
    pub elements: Vec<VertexElement>,
}

/// One typed, positional dependency slot.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum VertexElement {
    Value(ConstantValue),
    Output(OutputElement),
    DataTable(TableRef),
    Nested(NestedElement),
}

impl VertexElement {
    pub fn kind(&self) -> ElementKind {
        match self {
            VertexElement::Value(_) => ElementKind::Value,
            VertexElement::Output(_) => ElementKind::Output,
            VertexElement::DataTable(_) => ElementKind::DataTable,
            VertexElement::Nested(_) => ElementKind::Nested,
        }
    }

    /// Short label of the slot for diagnostics.
    pub fn describe(&self) -> String {
        match self {
            VertexElement::Value(v) => format!("value {}={}", v.name, v.value),
            VertexElement::Output(o) => format!("output {}: {}", o.name, o.data_type),
            VertexElement::DataTable(t) => format!("table {}: {}", t.name, t.data_type),
            VertexElement::Nested(n) => format!("nested {}", n.artifact),
        }
    }
}
