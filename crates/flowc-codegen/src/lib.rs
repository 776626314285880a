//! Artifact generation for the flowc dataflow compiler.
//!
//! Specializers register artifacts through a [`GeneratorContext`], which
//! names them deterministically and memoizes codecs and factories. The
//! [`emit`] module defines how compiled units are turned into runnable
//! processors.

pub mod codec;
pub mod context;
pub mod emit;
pub mod error;
pub mod factory;
pub mod naming;
pub mod repository;

pub use codec::{BasicCodecProvider, CodecProvider};
pub use context::GeneratorContext;
pub use emit::{
    ArtifactBackend, Arguments, Binding, BindingsBuilder, CollectingSink, Counters, DataTable,
    FnSink, FunctionTable, Input, InterpretingBackend, Processor, Sink, UserFunction,
};
pub use error::{CodegenError, EmitError, RuntimeError};
pub use factory::{copier_body, BasicFactoryProvider, FactoryProvider};
pub use naming::NameMap;
pub use repository::ArtifactRegistry;
