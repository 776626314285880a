//! Buffer: fan one input out to independent copies.

use flowc_codegen::GeneratorContext;
use flowc_core::{CompiledUnit, OperatorSpec, UnitBehavior};

use super::{register, UnitParts};
use crate::dependency::DependencyResolver;
use crate::error::CompileError;

pub(super) fn specialize(
    cx: &mut GeneratorContext<'_>,
    spec: &OperatorSpec,
) -> Result<CompiledUnit, CompileError> {
    let mut resolver = DependencyResolver::new(spec);
    let slots = resolver.defaults();
    let behavior = UnitBehavior::Buffer {
        outputs: slots.outputs,
    };
    register(
        cx,
        spec,
        UnitParts::new(behavior, resolver.finish()).input_type(spec),
    )
}
