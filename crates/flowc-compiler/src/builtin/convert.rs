//! Convert: one transformed record, then the original.

use flowc_codegen::GeneratorContext;
use flowc_core::{CompiledUnit, OperatorSpec, UnitBehavior};

use super::{function, register, UnitParts};
use crate::dependency::DependencyResolver;
use crate::error::CompileError;

pub(super) fn specialize(
    cx: &mut GeneratorContext<'_>,
    spec: &OperatorSpec,
) -> Result<CompiledUnit, CompileError> {
    let mut resolver = DependencyResolver::new(spec);
    let slots = resolver.defaults();
    let behavior = UnitBehavior::Convert {
        invocation: slots.invocation(function(spec)?),
        converted: slots.outputs[0],
        original: slots.outputs[1],
    };
    register(
        cx,
        spec,
        UnitParts::new(behavior, resolver.finish()).input_type(spec),
    )
}
