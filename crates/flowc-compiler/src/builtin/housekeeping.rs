//! Core housekeeping operators.

use flowc_codegen::GeneratorContext;
use flowc_core::{CompiledUnit, CoreOperatorKind, OperatorSpec, UnitBehavior};

use super::{model, register, UnitParts};
use crate::dependency::DependencyResolver;
use crate::error::CompileError;

pub(super) fn specialize(
    cx: &mut GeneratorContext<'_>,
    spec: &OperatorSpec,
    kind: CoreOperatorKind,
) -> Result<CompiledUnit, CompileError> {
    let mut resolver = DependencyResolver::new(spec);
    let slots = resolver.defaults();
    let behavior = match kind {
        CoreOperatorKind::Checkpoint => UnitBehavior::PassThrough {
            output: slots.outputs[0],
        },
        CoreOperatorKind::Stop => UnitBehavior::Discard,
        CoreOperatorKind::Project | CoreOperatorKind::Extend | CoreOperatorKind::Restructure => {
            check_mapping(cx, spec, kind)?;
            let factory = cx
                .factory_for(&spec.outputs[0].data_type)
                .map_err(CompileError::codegen(&spec.id))?;
            UnitBehavior::Mapping {
                factory,
                output: slots.outputs[0],
            }
        }
    };
    register(
        cx,
        spec,
        UnitParts::new(behavior, resolver.finish()).input_type(spec),
    )
}

/// Project may only drop properties and Extend may only add them.
fn check_mapping(
    cx: &GeneratorContext<'_>,
    spec: &OperatorSpec,
    kind: CoreOperatorKind,
) -> Result<(), CompileError> {
    let input = model(cx, spec, &spec.inputs[0].data_type)?;
    let output = model(cx, spec, &spec.outputs[0].data_type)?;
    let (narrow, wide) = match kind {
        CoreOperatorKind::Project => (output, input),
        CoreOperatorKind::Extend => (input, output),
        _ => return Ok(()),
    };
    match narrow.property_names().find(|name| wide.property(name).is_none()) {
        Some(name) => Err(CompileError::Invalid {
            operator: spec.id.clone(),
            detail: format!(
                "{kind}: property {name} of {} is missing from {}",
                narrow.data_type, wide.data_type
            ),
        }),
        None => Ok(()),
    }
}
