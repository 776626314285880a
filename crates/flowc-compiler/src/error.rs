//! Compilation errors.

use flowc_codegen::{CodegenError, EmitError};
use flowc_core::{DataType, GraphError, OperatorId};
use thiserror::Error;

use crate::config::ConfigError;

/// A fatal compile-time diagnostic. Every variant names the operator,
/// vertex or port that locates the fault.
#[derive(Debug, Error)]
pub enum CompileError {
    #[error("operator {operator} ({kind}): {detail}")]
    Arity {
        operator: OperatorId,
        kind: String,
        detail: String,
    },

    #[error("duplicate operator id: {0}")]
    DuplicateOperator(OperatorId),

    #[error("operator {operator}: table {table} is not bound")]
    UnboundTable { operator: OperatorId, table: String },

    #[error("operator {operator}: no {function} function declared")]
    MissingFunction {
        operator: OperatorId,
        function: &'static str,
    },

    #[error("operator {operator}: function {function} declares an incompatible signature: {detail}")]
    Signature {
        operator: OperatorId,
        function: String,
        detail: String,
    },

    #[error("operator {operator}: port {port} of {data_type} groups by unknown property {key}")]
    UnknownGroupingKey {
        operator: OperatorId,
        port: String,
        data_type: DataType,
        key: String,
    },

    #[error("operator {operator}: {detail}")]
    Invalid { operator: OperatorId, detail: String },

    #[error("connection {upstream} -> {downstream}: {detail}")]
    Connection {
        upstream: String,
        downstream: String,
        detail: String,
    },

    #[error("operator {operator}: {source}")]
    Codegen {
        operator: OperatorId,
        #[source]
        source: CodegenError,
    },

    #[error("graph assembly failed: {0}")]
    Graph(#[from] GraphError),

    #[error("failed to dump artifacts: {0}")]
    Dump(#[source] CodegenError),

    /// Opaque failure reported by an emission backend.
    #[error("vertex {vertex}: artifact emission failed: {source}")]
    Emit {
        vertex: OperatorId,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("unknown vertex: {0}")]
    UnknownVertex(OperatorId),

    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl CompileError {
    pub(crate) fn codegen(operator: &OperatorId) -> impl FnOnce(CodegenError) -> CompileError + '_ {
        move |source| CompileError::Codegen {
            operator: operator.clone(),
            source,
        }
    }

    pub(crate) fn emit(vertex: &OperatorId, source: EmitError) -> CompileError {
        CompileError::Emit {
            vertex: vertex.clone(),
            source: Box::new(source),
        }
    }
}
