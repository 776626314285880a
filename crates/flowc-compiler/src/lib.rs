//! Operator specialization and graph assembly.
//!
//! [`Compiler::compile`] validates every operator against its kind's
//! contract, resolves dependency slots, specializes each operator into a
//! compiled unit and assembles the units into a [`flowc_core::GraphInfo`].
//!
//! ```
//! use flowc_compiler::{Compiler, OperatorGraph};
//! use flowc_core::{
//!     CoreOperatorKind, DataModel, DataModelCatalog, OperatorKind, OperatorSpec, PropertyType,
//! };
//!
//! let catalog = DataModelCatalog::new()
//!     .with(DataModel::new("Order").with_property("id", PropertyType::Long));
//! let mut graph = OperatorGraph::new();
//! graph
//!     .add(
//!         OperatorSpec::new("cp", OperatorKind::Core(CoreOperatorKind::Checkpoint))
//!             .input("in", "Order")
//!             .output("out", "Order"),
//!     )
//!     .unwrap();
//! let compiled = Compiler::new(&catalog).compile(&graph).unwrap();
//! assert_eq!(compiled.graph.vertex_count(), 1);
//! ```

pub mod builtin;
pub mod compiler;
pub mod config;
pub mod contract;
pub mod dependency;
pub mod error;
pub mod graph;

pub use compiler::{CompiledGraph, Compiler};
pub use config::{CompileOptions, ConfigError};
pub use dependency::{DefaultSlots, DependencyResolver};
pub use error::CompileError;
pub use graph::{Connection, ConnectionTarget, OperatorGraph};
