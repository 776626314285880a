//! The operator graph handed over by the planner.

use flowc_core::{OperatorId, OperatorSpec, SubPlanRef};
use indexmap::{IndexMap, IndexSet};
use serde::{Deserialize, Serialize};

use crate::error::CompileError;

/// What a connection feeds on the downstream operator.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ConnectionTarget {
    Input(String),
    Table(String),
}

impl ConnectionTarget {
    /// Port name on the downstream vertex.
    pub fn port(&self) -> &str {
        match self {
            ConnectionTarget::Input(name) | ConnectionTarget::Table(name) => name,
        }
    }
}

/// A data edge from an operator output to a downstream input or table.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Connection {
    pub upstream: OperatorId,
    pub output: String,
    pub downstream: OperatorId,
    pub target: ConnectionTarget,
}

/// Operators, data connections and run-before relationships.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OperatorGraph {
    operators: IndexMap<OperatorId, OperatorSpec>,
    connections: Vec<Connection>,
    dependencies: IndexMap<OperatorId, IndexSet<OperatorId>>,
    origins: IndexMap<OperatorId, SubPlanRef>,
}

impl OperatorGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, spec: OperatorSpec) -> Result<(), CompileError> {
        if self.operators.contains_key(&spec.id) {
            return Err(CompileError::DuplicateOperator(spec.id));
        }
        self.operators.insert(spec.id.clone(), spec);
        Ok(())
    }

    /// Record the planner sub-plan an operator came from.
    pub fn set_origin(&mut self, operator: impl Into<OperatorId>, origin: SubPlanRef) {
        self.origins.insert(operator.into(), origin);
    }

    pub fn connect(
        &mut self,
        upstream: impl Into<OperatorId>,
        output: impl Into<String>,
        downstream: impl Into<OperatorId>,
        input: impl Into<String>,
    ) -> &mut Self {
        self.connections.push(Connection {
            upstream: upstream.into(),
            output: output.into(),
            downstream: downstream.into(),
            target: ConnectionTarget::Input(input.into()),
        });
        self
    }

    /// Bind an operator output as a side table of `downstream`.
    pub fn bind_table(
        &mut self,
        upstream: impl Into<OperatorId>,
        output: impl Into<String>,
        downstream: impl Into<OperatorId>,
        table: impl Into<String>,
    ) -> &mut Self {
        self.connections.push(Connection {
            upstream: upstream.into(),
            output: output.into(),
            downstream: downstream.into(),
            target: ConnectionTarget::Table(table.into()),
        });
        self
    }

    /// `dependent` must run after `target` finishes.
    pub fn add_dependency(
        &mut self,
        dependent: impl Into<OperatorId>,
        target: impl Into<OperatorId>,
    ) -> &mut Self {
        self.dependencies
            .entry(dependent.into())
            .or_default()
            .insert(target.into());
        self
    }

    pub fn remove_dependency(&mut self, dependent: &OperatorId, target: &OperatorId) -> bool {
        self.dependencies
            .get_mut(dependent)
            .is_some_and(|targets| targets.shift_remove(target))
    }

    pub fn operators(&self) -> impl Iterator<Item = &OperatorSpec> {
        self.operators.values()
    }

    pub fn operator(&self, id: &OperatorId) -> Option<&OperatorSpec> {
        self.operators.get(id)
    }

    pub fn connections(&self) -> &[Connection] {
        &self.connections
    }

    pub fn dependencies_of(&self, id: &OperatorId) -> impl Iterator<Item = &OperatorId> {
        self.dependencies.get(id).into_iter().flatten()
    }

    pub fn origin(&self, id: &OperatorId) -> Option<&SubPlanRef> {
        self.origins.get(id)
    }

    pub fn len(&self) -> usize {
        self.operators.len()
    }

    pub fn is_empty(&self) -> bool {
        self.operators.is_empty()
    }
}
