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
    let behavior = UnitBehavior::Update {
        invocation: slots.invocation(function(spec)?),
        output: slots.outputs[0],
    };
    register(
        cx,
        spec,
        UnitParts::new(behavior, resolver.finish()).input_type(spec),
    )
}
