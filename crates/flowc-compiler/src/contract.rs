//! Arity contracts fixed by each operator kind.
//!
//! Every operator of a graph is checked before any specialization starts,
//! so a compilation never produces a partial result.

use flowc_core::{
    CoreOperatorKind, DataModelLoader, OperatorKind, OperatorSpec, ParameterKind, UserFunctionRef,
};

use crate::error::CompileError;

/// Number of inputs and outputs an operator kind accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Arity {
    pub inputs: usize,
    pub min_outputs: usize,
    pub max_outputs: Option<usize>,
    /// Inputs must carry a grouping.
    pub grouped: bool,
}

impl Arity {
    const fn exact(inputs: usize, outputs: usize) -> Self {
        Self {
            inputs,
            min_outputs: outputs,
            max_outputs: Some(outputs),
            grouped: false,
        }
    }

    const fn grouped(mut self) -> Self {
        self.grouped = true;
        self
    }
}

/// The arity contract of `kind`.
pub fn arity_of(kind: &OperatorKind) -> Arity {
    match kind {
        OperatorKind::Convert => Arity::exact(1, 2),
        OperatorKind::Branch { discriminator } => Arity::exact(1, discriminator.constants.len()),
        OperatorKind::Update => Arity::exact(1, 1),
        OperatorKind::Fold | OperatorKind::Summarize { .. } => Arity::exact(1, 1).grouped(),
        OperatorKind::MasterCheck => Arity::exact(2, 2).grouped(),
        OperatorKind::MasterBranch { discriminator, .. } => {
            Arity::exact(2, discriminator.constants.len()).grouped()
        }
        OperatorKind::Core(CoreOperatorKind::Stop) => Arity::exact(1, 0),
        OperatorKind::Core(_) => Arity::exact(1, 1),
        OperatorKind::Buffer => Arity {
            inputs: 1,
            min_outputs: 1,
            max_outputs: None,
            grouped: false,
        },
    }
}

fn violation(spec: &OperatorSpec, detail: impl Into<String>) -> CompileError {
    CompileError::Arity {
        operator: spec.id.clone(),
        kind: spec.kind.to_string(),
        detail: detail.into(),
    }
}

/// Check `spec` against its kind's contract.
pub fn validate(spec: &OperatorSpec) -> Result<(), CompileError> {
    let arity = arity_of(&spec.kind);
    if spec.inputs.len() != arity.inputs {
        return Err(violation(
            spec,
            format!("expects {} input(s), found {}", arity.inputs, spec.inputs.len()),
        ));
    }
    let outputs = spec.outputs.len();
    let too_many = arity.max_outputs.is_some_and(|max| outputs > max);
    if outputs < arity.min_outputs || too_many {
        let expected = match arity.max_outputs {
            Some(max) if max == arity.min_outputs => format!("{max}"),
            Some(max) => format!("{}..={max}", arity.min_outputs),
            None => format!("at least {}", arity.min_outputs),
        };
        return Err(violation(
            spec,
            format!("expects {expected} output(s), found {outputs}"),
        ));
    }
    if arity.grouped {
        if let Some(port) = spec.inputs.iter().find(|p| p.grouping.is_none()) {
            return Err(violation(spec, format!("input {} must be grouped", port.name)));
        }
    }
    validate_kind(spec)
}

fn validate_kind(spec: &OperatorSpec) -> Result<(), CompileError> {
    match &spec.kind {
        OperatorKind::Convert | OperatorKind::Update => {
            check_signature(spec, require_function(spec, "user")?, 1)
        }
        OperatorKind::Branch { discriminator } => {
            if discriminator.constants.is_empty() {
                return Err(violation(spec, format!("{} declares no constants", discriminator.name)));
            }
            check_signature(spec, require_function(spec, "branch")?, 1)
        }
        OperatorKind::Fold => {
            let input = &spec.inputs[0];
            let output = &spec.outputs[0];
            if input.data_type != output.data_type {
                return Err(violation(
                    spec,
                    format!(
                        "fold output {} must have the input type {}",
                        output.data_type, input.data_type
                    ),
                ));
            }
            check_signature(spec, require_function(spec, "fold")?, 2)
        }
        OperatorKind::Summarize { terms } => {
            if terms.is_empty() {
                return Err(violation(spec, "summarize declares no terms"));
            }
            Ok(())
        }
        OperatorKind::MasterCheck | OperatorKind::MasterBranch { .. } => {
            let (master, transaction) = (&spec.inputs[0], &spec.inputs[1]);
            let width = |p: &flowc_core::InputPort| p.grouping.as_ref().map_or(0, |g| g.keys.len());
            if width(master) != width(transaction) {
                return Err(violation(
                    spec,
                    format!(
                        "master {} and transaction {} group by different key counts",
                        master.name, transaction.name
                    ),
                ));
            }
            if let Some(selection) = &spec.selection {
                check_signature(spec, selection, 2)?;
            }
            if let OperatorKind::MasterBranch {
                discriminator,
                default_branch,
            } = &spec.kind
            {
                if let Some(default) = default_branch {
                    if discriminator.ordinal(default).is_none() {
                        return Err(violation(
                            spec,
                            format!("default branch {default} is not a constant of {}", discriminator.name),
                        ));
                    }
                }
                check_signature(spec, require_function(spec, "branch")?, 2)?;
            } else if let Some(check) = &spec.function {
                check_signature(spec, check, 2)?;
            }
            Ok(())
        }
        OperatorKind::Core(_) | OperatorKind::Buffer => {
            if spec.function.is_some() {
                return Err(violation(spec, "housekeeping operators take no user function"));
            }
            Ok(())
        }
    }
}

fn require_function<'s>(
    spec: &'s OperatorSpec,
    function: &'static str,
) -> Result<&'s UserFunctionRef, CompileError> {
    spec.function
        .as_ref()
        .ok_or_else(|| CompileError::MissingFunction {
            operator: spec.id.clone(),
            function,
        })
}

/// Check a declared signature: `records` leading record parameters, then
/// one parameter per side table and per constant argument, in any order.
/// An empty signature is not checked.
fn check_signature(
    spec: &OperatorSpec,
    function: &UserFunctionRef,
    records: usize,
) -> Result<(), CompileError> {
    if function.parameters.is_empty() {
        return Ok(());
    }
    let mismatch = |detail: String| CompileError::Signature {
        operator: spec.id.clone(),
        function: function.name.clone(),
        detail,
    };
    let leading = function
        .parameters
        .iter()
        .take_while(|p| matches!(p, ParameterKind::Record(_) | ParameterKind::RecordList(_)))
        .count();
    if leading != records {
        return Err(mismatch(format!("expects {records} record parameter(s), found {leading}")));
    }
    let rest = &function.parameters[leading..];
    let tables = rest.iter().filter(|p| matches!(p, ParameterKind::Table(_))).count();
    let constants = rest.iter().filter(|p| matches!(p, ParameterKind::Constant)).count();
    if tables + constants != rest.len() {
        return Err(mismatch("record parameters must come first".to_string()));
    }
    if tables != spec.tables.len() {
        return Err(mismatch(format!(
            "declares {tables} table parameter(s) for {} table(s)",
            spec.tables.len()
        )));
    }
    if constants != spec.arguments.len() {
        return Err(mismatch(format!(
            "declares {constants} constant parameter(s) for {} argument(s)",
            spec.arguments.len()
        )));
    }
    Ok(())
}

/// Reject groupings of inputs and side tables whose keys the data model
/// does not declare.
pub fn validate_grouping_keys(
    spec: &OperatorSpec,
    loader: &dyn DataModelLoader,
) -> Result<(), CompileError> {
    let inputs = spec
        .inputs
        .iter()
        .filter_map(|p| p.grouping.as_ref().map(|g| (&p.name, &p.data_type, g)));
    let tables = spec.tables.iter().map(|t| (&t.name, &t.data_type, &t.grouping));
    for (port, data_type, grouping) in inputs.chain(tables) {
        let Some(model) = loader.load(data_type) else {
            continue;
        };
        if let Some(key) = grouping.unknown_keys(model).next() {
            return Err(CompileError::UnknownGroupingKey {
                operator: spec.id.clone(),
                port: port.clone(),
                data_type: data_type.clone(),
                key: key.to_string(),
            });
        }
    }
    Ok(())
}
