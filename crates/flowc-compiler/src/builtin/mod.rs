//! Operator specializers, one module per operator family.
//!
//! Each specializer is a function of the operator description and the
//! generation context; dispatch is a match over the operator kind.

mod aggregate;
mod branch;
mod buffer;
mod convert;
mod housekeeping;
mod master;
mod update;

use flowc_codegen::GeneratorContext;
use flowc_core::{
    AggregateHelpers, ArtifactBody, ArtifactId, CompiledUnit, DataModel, DataType, OperatorKind,
    OperatorSpec, UnitBehavior, VertexElement,
};
use tracing::debug;

use crate::contract;
use crate::error::CompileError;

/// Specialize one operator into a compiled unit.
///
/// The operator is checked against its kind's contract first, so a port
/// count mismatch is reported as [`CompileError::Arity`].
pub fn specialize(
    cx: &mut GeneratorContext<'_>,
    spec: &OperatorSpec,
) -> Result<CompiledUnit, CompileError> {
    contract::validate(spec)?;
    debug!(operator = %spec.id, kind = %spec.kind, "specializing operator");
    let unit = match &spec.kind {
        OperatorKind::Convert => convert::specialize(cx, spec),
        OperatorKind::Branch { discriminator } => branch::specialize(cx, spec, discriminator),
        OperatorKind::Update => update::specialize(cx, spec),
        OperatorKind::Fold => aggregate::fold(cx, spec),
        OperatorKind::Summarize { terms } => aggregate::summarize(cx, spec, terms),
        OperatorKind::MasterCheck => master::check(cx, spec),
        OperatorKind::MasterBranch {
            discriminator,
            default_branch,
        } => master::branch(cx, spec, discriminator, default_branch.as_deref()),
        OperatorKind::Core(kind) => housekeeping::specialize(cx, spec, *kind),
        OperatorKind::Buffer => buffer::specialize(cx, spec),
    }?;
    debug!(
        operator = %spec.id,
        artifact = %unit.artifact,
        slots = unit.dependencies.len(),
        "specialized operator"
    );
    Ok(unit)
}

/// Pieces of a unit assembled by a specializer.
struct UnitParts {
    behavior: UnitBehavior,
    dependencies: Vec<VertexElement>,
    input_type: Option<DataType>,
    aggregate: Option<AggregateHelpers>,
}

impl UnitParts {
    fn new(behavior: UnitBehavior, dependencies: Vec<VertexElement>) -> Self {
        Self {
            behavior,
            dependencies,
            input_type: None,
            aggregate: None,
        }
    }

    fn input_type(mut self, spec: &OperatorSpec) -> Self {
        self.input_type = spec.inputs.first().map(|p| p.data_type.clone());
        self
    }
}

/// Register the unit artifact under a fresh name.
fn register(
    cx: &mut GeneratorContext<'_>,
    spec: &OperatorSpec,
    parts: UnitParts,
) -> Result<CompiledUnit, CompileError> {
    let artifact = cx
        .add_artifact(Some(spec.kind.label()), ArtifactBody::Unit(parts.behavior.clone()))
        .map_err(CompileError::codegen(&spec.id))?;
    Ok(assemble(spec, artifact, parts))
}

/// Register the unit artifact under a previously reserved name.
fn register_as(
    cx: &mut GeneratorContext<'_>,
    spec: &OperatorSpec,
    artifact: ArtifactId,
    parts: UnitParts,
) -> Result<CompiledUnit, CompileError> {
    let artifact = cx
        .add_named(artifact, ArtifactBody::Unit(parts.behavior.clone()))
        .map_err(CompileError::codegen(&spec.id))?;
    Ok(assemble(spec, artifact, parts))
}

fn assemble(spec: &OperatorSpec, artifact: ArtifactId, parts: UnitParts) -> CompiledUnit {
    CompiledUnit {
        operator: spec.id.clone(),
        artifact,
        behavior: parts.behavior,
        dependencies: parts.dependencies,
        input_type: parts.input_type,
        aggregate: parts.aggregate,
    }
}

fn model<'a>(
    cx: &GeneratorContext<'a>,
    spec: &OperatorSpec,
    data_type: &DataType,
) -> Result<&'a DataModel, CompileError> {
    cx.data_model(data_type).map_err(CompileError::codegen(&spec.id))
}

/// The user function of an operator whose contract requires one.
fn function(spec: &OperatorSpec) -> Result<&flowc_core::UserFunctionRef, CompileError> {
    spec.function
        .as_ref()
        .ok_or_else(|| CompileError::MissingFunction {
            operator: spec.id.clone(),
            function: "user",
        })
}
