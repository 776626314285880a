//! Whole-graph compilation.

use std::collections::{HashMap, HashSet};

use flowc_codegen::{
    ArtifactBackend, ArtifactRegistry, Binding, GeneratorContext, Processor,
};
use flowc_core::{
    CompiledUnit, DataModelLoader, EdgeDescriptor, GraphInfo, GraphInfoBuilder, InputRef,
    OperatorId, OperatorSpec, ResolvedInputInfo, ResolvedOutputInfo, ResolvedVertexInfo,
    VertexDescriptor,
};
use indexmap::IndexMap;
use tracing::{debug, info};

use crate::builtin;
use crate::config::CompileOptions;
use crate::contract;
use crate::dependency::require_tables;
use crate::error::CompileError;
use crate::graph::{ConnectionTarget, OperatorGraph};

/// Everything one compilation produces.
#[derive(Debug, Clone)]
pub struct CompiledGraph {
    pub graph: GraphInfo,
    /// One unit per vertex, keyed by vertex id.
    pub units: IndexMap<OperatorId, CompiledUnit>,
    pub artifacts: ArtifactRegistry,
}

impl CompiledGraph {
    pub fn unit(&self, vertex: &OperatorId) -> Option<&CompiledUnit> {
        self.units.get(vertex)
    }

    /// Turn the unit of `vertex` into a processor through `backend`.
    pub fn instantiate(
        &self,
        vertex: &OperatorId,
        backend: &dyn ArtifactBackend,
        bindings: Vec<Binding>,
    ) -> Result<Box<dyn Processor>, CompileError> {
        let unit = self
            .units
            .get(vertex)
            .ok_or_else(|| CompileError::UnknownVertex(vertex.clone()))?;
        backend
            .instantiate(unit, &self.artifacts, bindings)
            .map_err(|source| CompileError::emit(vertex, source))
    }
}

/// Compiles operator graphs against a data model catalog.
///
/// Every call to [`Compiler::compile`] starts from fresh registries, so
/// compilations never share generated artifacts.
pub struct Compiler<'a> {
    loader: &'a dyn DataModelLoader,
    options: CompileOptions,
}

impl<'a> Compiler<'a> {
    pub fn new(loader: &'a dyn DataModelLoader) -> Self {
        Self {
            loader,
            options: CompileOptions::default(),
        }
    }

    pub fn with_options(mut self, options: CompileOptions) -> Self {
        self.options = options;
        self
    }

    pub fn options(&self) -> &CompileOptions {
        &self.options
    }

    pub fn compile(&self, graph: &OperatorGraph) -> Result<CompiledGraph, CompileError> {
        info!(operators = graph.len(), "compiling operator graph");
        self.options.validate()?;

        // Stage 1: contracts, before anything is generated
        for spec in graph.operators() {
            contract::validate(spec)?;
            if self.options.strict_grouping {
                contract::validate_grouping_keys(spec, self.loader)?;
            }
        }
        self.validate_connections(graph)?;

        // Stage 2: dependencies
        let mut bound: HashMap<&OperatorId, HashSet<&str>> = HashMap::new();
        for c in graph.connections() {
            if let ConnectionTarget::Table(name) = &c.target {
                bound.entry(&c.downstream).or_default().insert(name.as_str());
            }
        }
        for spec in graph.operators() {
            let tables = bound.get(&spec.id);
            require_tables(spec, |table| tables.is_some_and(|t| t.contains(table)))?;
        }

        // Stage 3: specialization
        let mut cx = GeneratorContext::new(self.options.prefix.clone(), self.loader);
        let mut units = IndexMap::with_capacity(graph.len());
        for spec in graph.operators() {
            units.insert(spec.id.clone(), builtin::specialize(&mut cx, spec)?);
        }

        // Stage 4: vertices with edge descriptors
        let mut builder = GraphInfoBuilder::new();
        for (spec, unit) in graph.operators().zip(units.values()) {
            let vertex = self.resolve_vertex(&mut cx, graph, spec, unit)?;
            match graph.origin(&spec.id) {
                Some(origin) => builder.add_with_origin(origin.clone(), vertex)?,
                None => builder.add(vertex)?,
            }
        }

        // Stage 5: assembly
        let info = builder.build(|| EdgeDescriptor::Void)?;
        let artifacts = cx.into_artifacts();
        info!(
            vertices = info.vertex_count(),
            edges = info.edge_count(),
            artifacts = artifacts.len(),
            "compiled operator graph"
        );

        // Stage 6: optional dump
        if let (true, Some(dir)) = (self.options.dump_artifacts, &self.options.dump_dir) {
            artifacts.dump_to(dir).map_err(CompileError::Dump)?;
        }

        Ok(CompiledGraph {
            graph: info,
            units,
            artifacts,
        })
    }

    /// Every connection names existing ports of matching type.
    fn validate_connections(&self, graph: &OperatorGraph) -> Result<(), CompileError> {
        for c in graph.connections() {
            let fail = |detail: String| CompileError::Connection {
                upstream: format!("{}.{}", c.upstream, c.output),
                downstream: format!("{}.{}", c.downstream, c.target.port()),
                detail,
            };
            let upstream = graph
                .operator(&c.upstream)
                .ok_or_else(|| fail(format!("unknown operator {}", c.upstream)))?;
            let downstream = graph
                .operator(&c.downstream)
                .ok_or_else(|| fail(format!("unknown operator {}", c.downstream)))?;
            let (_, output) = upstream
                .find_output(&c.output)
                .ok_or_else(|| fail(format!("{} has no output {}", c.upstream, c.output)))?;
            let expected = match &c.target {
                ConnectionTarget::Input(name) => downstream
                    .find_input(name)
                    .map(|(_, port)| &port.data_type)
                    .ok_or_else(|| fail(format!("{} has no input {name}", c.downstream)))?,
                ConnectionTarget::Table(name) => downstream
                    .find_table(name)
                    .map(|(_, table)| &table.data_type)
                    .ok_or_else(|| fail(format!("{} has no table {name}", c.downstream)))?,
            };
            if &output.data_type != expected {
                return Err(fail(format!(
                    "type mismatch: {} flows into {}",
                    output.data_type, expected
                )));
            }
        }
        Ok(())
    }

    fn resolve_vertex(
        &self,
        cx: &mut GeneratorContext<'_>,
        graph: &OperatorGraph,
        spec: &OperatorSpec,
        unit: &CompiledUnit,
    ) -> Result<ResolvedVertexInfo, CompileError> {
        let codegen = CompileError::codegen;
        let mut vertex = ResolvedVertexInfo::new(
            spec.id.as_str(),
            VertexDescriptor::new(spec.kind.label(), unit.artifact.clone()),
        );
        for port in &spec.inputs {
            let descriptor = match &port.grouping {
                Some(grouping) => EdgeDescriptor::ScatterGather {
                    codec: cx
                        .keyed_serializer_for(&port.data_type, grouping)
                        .map_err(codegen(&spec.id))?,
                    grouping: grouping.clone(),
                },
                None => EdgeDescriptor::OneToOne {
                    codec: cx
                        .serializer_for(&port.data_type)
                        .map_err(codegen(&spec.id))?,
                },
            };
            vertex = vertex.with_input(
                port.name.as_str(),
                ResolvedInputInfo::new(port.name.as_str(), descriptor),
            );
        }
        for table in &spec.tables {
            let descriptor = EdgeDescriptor::Broadcast {
                codec: cx
                    .serializer_for(&table.data_type)
                    .map_err(codegen(&spec.id))?,
            };
            vertex = vertex.with_input(
                table.name.as_str(),
                ResolvedInputInfo::new(table.name.as_str(), descriptor),
            );
        }
        for port in &spec.outputs {
            let downstreams = graph
                .connections()
                .iter()
                .filter(|c| c.upstream == spec.id && c.output == port.name)
                .map(|c| InputRef::new(c.downstream.as_str(), c.target.port()));
            vertex = vertex.with_output(
                port.name.as_str(),
                ResolvedOutputInfo::new(port.name.as_str(), downstreams),
            );
        }
        for target in graph.dependencies_of(&spec.id) {
            vertex = vertex.with_dependency(target.as_str());
        }
        debug!(
            vertex = %spec.id,
            inputs = spec.inputs.len() + spec.tables.len(),
            outputs = spec.outputs.len(),
            "resolved vertex"
        );
        Ok(vertex)
    }
}
