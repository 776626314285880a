//! Branch: route each record to the output matching its discriminator.

use flowc_codegen::GeneratorContext;
use flowc_core::{CompiledUnit, EnumType, OperatorSpec, UnitBehavior};

use super::{function, register, UnitParts};
use crate::dependency::DependencyResolver;
use crate::error::CompileError;

/// Output `i` receives the records whose discriminator has ordinal `i`.
pub(super) fn specialize(
    cx: &mut GeneratorContext<'_>,
    spec: &OperatorSpec,
    discriminator: &EnumType,
) -> Result<CompiledUnit, CompileError> {
    let mut resolver = DependencyResolver::new(spec);
    let slots = resolver.defaults();
    let behavior = UnitBehavior::Branch {
        invocation: slots.invocation(function(spec)?),
        discriminator: discriminator.clone(),
        branches: slots.outputs.clone(),
    };
    register(
        cx,
        spec,
        UnitParts::new(behavior, resolver.finish()).input_type(spec),
    )
}
