//! Core model of the flowc dataflow compiler.
//!
//! The upstream planner describes a batch job as [`OperatorSpec`] nodes.
//! The compiler specializes each node into a [`CompiledUnit`] and assembles
//! the units into a [`GraphInfo`] for the execution engine. This crate holds
//! the types shared by every stage and the graph assembler itself.

pub mod artifact;
pub mod element;
pub mod graph;
pub mod grouping;
pub mod operator;
pub mod types;
pub mod unit;
pub mod value;

pub use artifact::{ArtifactBody, ArtifactData, ArtifactId, CombinerBody, Invocation, UnitBehavior};
pub use element::{ElementKind, NestedElement, OutputElement, VertexElement};
pub use graph::build::{
    GraphInfoBuilder, InputRef, ResolvedInputInfo, ResolvedOutputInfo, ResolvedVertexInfo,
    SubPlanRef,
};
pub use graph::{
    EdgeDescriptor, EdgeInfo, GraphError, GraphInfo, PortDirection, PortId, VertexDescriptor,
    VertexInfo, IMPLICIT_PORT,
};
pub use grouping::{Direction, Grouping, Key, KeyProperty};
pub use operator::{
    Aggregation, ConstantValue, CoreOperatorKind, EnumType, InputPort, OperatorId, OperatorKind,
    OperatorSpec, OutputPort, ParameterKind, SummarizeTerm, TableRef, UserFunctionRef,
};
pub use types::{DataModel, DataModelCatalog, DataModelLoader, DataType, PropertyType};
pub use unit::{AggregateHelpers, CompiledUnit};
pub use value::{Record, Value};
