//! Compiled units: the output of operator specialization.

use serde::{Deserialize, Serialize};

use crate::artifact::{ArtifactId, UnitBehavior};
use crate::element::{ElementKind, VertexElement};
use crate::operator::OperatorId;
use crate::types::DataType;

/// Auxiliary helpers generated for aggregate operators.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AggregateHelpers {
    /// Materializes the first record of a key group into a fresh accumulator.
    pub copier: ArtifactId,
    /// Merges each subsequent record of the group into the accumulator.
    pub combiner: ArtifactId,
    pub output_type: DataType,
}

/// The specialized executable description of one operator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompiledUnit {
    pub operator: OperatorId,
    pub artifact: ArtifactId,
    pub behavior: UnitBehavior,
    /// Ordered dependency slots; every slot must be bound to instantiate.
    pub dependencies: Vec<VertexElement>,
    /// Record type accepted by the unit. `None` for co-group units, which
    /// accept one record list per input.
    pub input_type: Option<DataType>,
    pub aggregate: Option<AggregateHelpers>,
}

impl CompiledUnit {
    /// Positions of all slots of the given kind.
    pub fn slots_of(&self, kind: ElementKind) -> Vec<usize> {
        self.dependencies
            .iter()
            .enumerate()
            .filter(|(_, e)| e.kind() == kind)
            .map(|(i, _)| i)
            .collect()
    }

    /// Position of the output slot bound to the named operator output.
    pub fn output_slot(&self, name: &str) -> Option<usize> {
        self.dependencies.iter().position(|e| match e {
            VertexElement::Output(o) => o.name == name,
            _ => false,
        })
    }
}
