//! MasterCheck and MasterBranch: joins against master data.
//!
//! Input 0 carries the master candidates and input 1 the transactions.
//! Both share one key and are co-iterated per key group.

use flowc_codegen::GeneratorContext;
use flowc_core::{CompiledUnit, EnumType, OperatorSpec, UnitBehavior};

use super::{function, register, UnitParts};
use crate::dependency::DependencyResolver;
use crate::error::CompileError;

/// Outputs: 0 receives transactions with a master, 1 those without.
pub(super) fn check(
    cx: &mut GeneratorContext<'_>,
    spec: &OperatorSpec,
) -> Result<CompiledUnit, CompileError> {
    let mut resolver = DependencyResolver::new(spec);
    let slots = resolver.defaults();
    let behavior = UnitBehavior::MasterCheck {
        selection: spec.selection.as_ref().map(|s| slots.invocation(s)),
        check: spec.function.as_ref().map(|f| slots.invocation(f)),
        found: slots.outputs[0],
        missing: slots.outputs[1],
    };
    register(cx, spec, UnitParts::new(behavior, resolver.finish()))
}

pub(super) fn branch(
    cx: &mut GeneratorContext<'_>,
    spec: &OperatorSpec,
    discriminator: &EnumType,
    default_branch: Option<&str>,
) -> Result<CompiledUnit, CompileError> {
    let mut resolver = DependencyResolver::new(spec);
    let slots = resolver.defaults();
    let default_branch = match default_branch {
        Some(name) => Some(
            discriminator
                .ordinal(name)
                .and_then(|ordinal| slots.outputs.get(ordinal).copied())
                .ok_or_else(|| CompileError::Invalid {
                    operator: spec.id.clone(),
                    detail: format!("default branch {name} has no output"),
                })?,
        ),
        None => None,
    };
    let behavior = UnitBehavior::MasterBranch {
        selection: spec.selection.as_ref().map(|s| slots.invocation(s)),
        invocation: slots.invocation(function(spec)?),
        discriminator: discriminator.clone(),
        branches: slots.outputs.clone(),
        default_branch,
    };
    register(cx, spec, UnitParts::new(behavior, resolver.finish()))
}
