//! Code generation, emission, and runtime errors.

use std::path::PathBuf;

use flowc_core::{ArtifactId, DataType, ElementKind};
use thiserror::Error;

/// Errors raised while naming or registering artifacts.
#[derive(Debug, Error)]
pub enum CodegenError {
    #[error("invalid artifact category: {0:?}")]
    InvalidCategory(String),

    #[error("invalid artifact hint: {0:?}")]
    InvalidHint(String),

    #[error("duplicate artifact: {0}")]
    DuplicateArtifact(ArtifactId),

    #[error("unknown data model: {0}")]
    UnknownDataModel(DataType),

    #[error("data model {data_type} has no property {property}")]
    UnknownProperty { data_type: DataType, property: String },

    #[error("failed to write artifact {id} to {path}: {source}")]
    Io {
        id: ArtifactId,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to encode artifact {id}: {source}")]
    Encode {
        id: ArtifactId,
        #[source]
        source: serde_json::Error,
    },
}

/// Errors raised by an emission backend while instantiating a unit.
#[derive(Debug, Error)]
pub enum EmitError {
    #[error("artifact {artifact} expects {expected} bindings, got {actual}")]
    SlotCount {
        artifact: ArtifactId,
        expected: usize,
        actual: usize,
    },

    #[error("artifact {artifact} slot {slot} expects a {expected:?} binding, got {actual:?}")]
    SlotKind {
        artifact: ArtifactId,
        slot: usize,
        expected: ElementKind,
        actual: ElementKind,
    },

    #[error("artifact {artifact} refers to slot {slot}, which does not exist")]
    InvalidSlot { artifact: ArtifactId, slot: usize },

    #[error("unknown user function: {0}")]
    UnknownFunction(String),

    #[error("user function {name} is not a {expected} function")]
    FunctionKind { name: String, expected: &'static str },

    #[error("artifact not registered: {0}")]
    MissingArtifact(ArtifactId),

    #[error("artifact {id} is not a {expected} artifact")]
    UnexpectedArtifact { id: ArtifactId, expected: &'static str },

    #[error("no sink bound for output {0}")]
    MissingSink(String),

    #[error("no table bound for {0}")]
    MissingTable(String),
}

/// Errors raised while a processor handles records.
#[derive(Debug, Error)]
pub enum RuntimeError {
    #[error("function {function} returned unknown discriminator {value:?}")]
    UnknownDiscriminator { function: String, value: String },

    #[error("selection {function} chose candidate {index} of {candidates}")]
    SelectionOutOfRange {
        function: String,
        index: usize,
        candidates: usize,
    },

    #[error("{unit} processor does not accept {input} input")]
    UnexpectedInput {
        unit: &'static str,
        input: &'static str,
    },

    #[error("co-group expects {expected} record lists, got {actual}")]
    CoGroupArity { expected: usize, actual: usize },

    #[error("sink rejected record: {0}")]
    Sink(String),
}
