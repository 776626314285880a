//! Dependency resolution: turning an operator's constants, side tables and
//! outputs into the ordered slot list of its compiled unit.

use flowc_core::{
    ArtifactId, Invocation, NestedElement, OperatorSpec, OutputElement, UserFunctionRef,
    VertexElement,
};

use crate::error::CompileError;

/// Slot positions of the default dependencies of an operator.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DefaultSlots {
    pub constants: Vec<usize>,
    pub outputs: Vec<usize>,
    pub tables: Vec<usize>,
}

impl DefaultSlots {
    /// An invocation of `function` reading every constant and table.
    pub fn invocation(&self, function: &UserFunctionRef) -> Invocation {
        Invocation {
            function: function.name.clone(),
            arguments: self.constants.clone(),
            tables: self.tables.clone(),
        }
    }
}

/// Accumulates the ordered dependency slots of one unit.
#[derive(Debug)]
pub struct DependencyResolver<'s> {
    spec: &'s OperatorSpec,
    elements: Vec<VertexElement>,
}

impl<'s> DependencyResolver<'s> {
    pub fn new(spec: &'s OperatorSpec) -> Self {
        Self {
            spec,
            elements: Vec::new(),
        }
    }

    fn push(&mut self, element: VertexElement) -> usize {
        self.elements.push(element);
        self.elements.len() - 1
    }

    pub fn constants(&mut self) -> Vec<usize> {
        let spec = self.spec;
        spec.arguments
            .iter()
            .map(|c| self.push(VertexElement::Value(c.clone())))
            .collect()
    }

    pub fn outputs(&mut self) -> Vec<usize> {
        let spec = self.spec;
        spec.outputs
            .iter()
            .map(|o| {
                self.push(VertexElement::Output(OutputElement {
                    name: o.name.clone(),
                    data_type: o.data_type.clone(),
                }))
            })
            .collect()
    }

    pub fn tables(&mut self) -> Vec<usize> {
        let spec = self.spec;
        spec.tables
            .iter()
            .map(|t| self.push(VertexElement::DataTable(t.clone())))
            .collect()
    }

    pub fn nested(&mut self, artifact: ArtifactId, elements: Vec<VertexElement>) -> usize {
        self.push(VertexElement::Nested(NestedElement { artifact, elements }))
    }

    /// Every constant in declaration order, then every output sink, then
    /// every side table.
    pub fn defaults(&mut self) -> DefaultSlots {
        let constants = self.constants();
        let outputs = self.outputs();
        let tables = self.tables();
        DefaultSlots {
            constants,
            outputs,
            tables,
        }
    }

    pub fn finish(self) -> Vec<VertexElement> {
        self.elements
    }
}

/// Fail unless every side table of `spec` is bound.
pub fn require_tables(
    spec: &OperatorSpec,
    is_bound: impl Fn(&str) -> bool,
) -> Result<(), CompileError> {
    match spec.tables.iter().find(|t| !is_bound(&t.name)) {
        Some(table) => Err(CompileError::UnboundTable {
            operator: spec.id.clone(),
            table: table.name.clone(),
        }),
        None => Ok(()),
    }
}
