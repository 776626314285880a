//! Fold and Summarize: per-key accumulation.
//!
//! Both produce a unit whose slots are a nested combiner followed by the
//! output sink. The combiner carries every constant argument, so the fold
//! function sees them on each invocation. The copier (or, for Summarize,
//! the initializer) turns the first record of a key group into the
//! accumulator.

use flowc_codegen::{copier_body, GeneratorContext};
use flowc_core::{
    AggregateHelpers, Aggregation, ArtifactBody, ArtifactId, CombinerBody, CompiledUnit,
    Grouping, Invocation, OperatorSpec, SummarizeTerm, UnitBehavior, VertexElement,
};

use super::{function, model, register_as, UnitParts};
use crate::dependency::DependencyResolver;
use crate::error::CompileError;

pub(super) fn fold(
    cx: &mut GeneratorContext<'_>,
    spec: &OperatorSpec,
) -> Result<CompiledUnit, CompileError> {
    let input = &spec.inputs[0];
    let grouping = input.grouping.clone().unwrap_or_default();
    let id = cx
        .reserve_unit(spec.kind.label())
        .map_err(CompileError::codegen(&spec.id))?;

    let input_model = model(cx, spec, &input.data_type)?;
    let copier = cx
        .add_named(id.nested("Copier"), copier_body(input_model))
        .map_err(CompileError::codegen(&spec.id))?;

    let (elements, invocation) = combiner_slots(spec, &function(spec)?.name);
    let body = CombinerBody::Fold {
        data_type: input.data_type.clone(),
        grouping: grouping.clone(),
        invocation,
    };
    let combiner = cx
        .add_named(id.nested("Combiner"), ArtifactBody::Combiner(body))
        .map_err(CompileError::codegen(&spec.id))?;

    finish(cx, spec, id, grouping, copier, combiner, elements)
}

pub(super) fn summarize(
    cx: &mut GeneratorContext<'_>,
    spec: &OperatorSpec,
    terms: &[SummarizeTerm],
) -> Result<CompiledUnit, CompileError> {
    let input = &spec.inputs[0];
    let output = &spec.outputs[0];
    let grouping = input.grouping.clone().unwrap_or_default();

    let source = model(cx, spec, &input.data_type)?;
    let target = model(cx, spec, &output.data_type)?;
    for term in terms {
        if term.aggregation != Aggregation::Count && source.property(&term.source).is_none() {
            return Err(CompileError::Invalid {
                operator: spec.id.clone(),
                detail: format!("{} has no property {}", input.data_type, term.source),
            });
        }
        if target.property(&term.destination).is_none() {
            return Err(CompileError::Invalid {
                operator: spec.id.clone(),
                detail: format!("{} has no property {}", output.data_type, term.destination),
            });
        }
    }

    let id = cx
        .reserve_unit(spec.kind.label())
        .map_err(CompileError::codegen(&spec.id))?;
    let initializer = cx
        .add_named(
            id.nested("Initializer"),
            ArtifactBody::Initializer {
                source: input.data_type.clone(),
                target: output.data_type.clone(),
                terms: terms.to_vec(),
            },
        )
        .map_err(CompileError::codegen(&spec.id))?;

    let (elements, _) = combiner_slots(spec, "");
    let body = CombinerBody::Summarize {
        data_type: output.data_type.clone(),
        grouping: grouping.clone(),
        terms: terms.to_vec(),
    };
    let combiner = cx
        .add_named(id.nested("Combiner"), ArtifactBody::Combiner(body))
        .map_err(CompileError::codegen(&spec.id))?;

    finish(cx, spec, id, grouping, initializer, combiner, elements)
}

/// Slots of the nested combiner: constants, then tables.
fn combiner_slots(spec: &OperatorSpec, function: &str) -> (Vec<VertexElement>, Invocation) {
    let mut nested = DependencyResolver::new(spec);
    let arguments = nested.constants();
    let tables = nested.tables();
    let invocation = Invocation {
        function: function.to_string(),
        arguments,
        tables,
    };
    (nested.finish(), invocation)
}

fn finish(
    cx: &mut GeneratorContext<'_>,
    spec: &OperatorSpec,
    id: ArtifactId,
    grouping: Grouping,
    copier: ArtifactId,
    combiner: ArtifactId,
    combiner_elements: Vec<VertexElement>,
) -> Result<CompiledUnit, CompileError> {
    let mut resolver = DependencyResolver::new(spec);
    let combiner_slot = resolver.nested(combiner.clone(), combiner_elements);
    let outputs = resolver.outputs();
    let behavior = UnitBehavior::Aggregate {
        grouping,
        copier: copier.clone(),
        combiner: combiner_slot,
        output: outputs[0],
    };
    let mut parts = UnitParts::new(behavior, resolver.finish()).input_type(spec);
    parts.aggregate = Some(AggregateHelpers {
        copier,
        combiner,
        output_type: spec.outputs[0].data_type.clone(),
    });
    register_as(cx, spec, id, parts)
}
