//! Graph assembly from resolved vertices.
//!
//! Each compiled vertex is registered as a [`ResolvedVertexInfo`] whose
//! outputs list their downstream inputs. [`GraphInfoBuilder::build`] turns
//! the registry into a [`GraphInfo`]: it creates every declared port, then
//! synthesizes the reserved `_dependency` ports and control-only edges for
//! implicit dependencies, then adds one data edge per (output, consumer).

use std::fmt;

use indexmap::{IndexMap, IndexSet};
use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use super::{
    EdgeDescriptor, GraphError, GraphInfo, PortDirection, PortId, VertexDescriptor, IMPLICIT_PORT,
};

/// Reference to an input port of a registered vertex.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct InputRef {
    pub vertex: String,
    pub port: String,
}

impl InputRef {
    pub fn new(vertex: impl Into<String>, port: impl Into<String>) -> Self {
        Self {
            vertex: vertex.into(),
            port: port.into(),
        }
    }
}

impl fmt::Display for InputRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.vertex, self.port)
    }
}

/// Planner sub-plan a vertex was compiled from, kept for traceability.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SubPlanRef(pub String);

impl fmt::Display for SubPlanRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A resolved vertex input.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedInputInfo {
    /// Port name in the assembled graph.
    pub id: String,
    /// Descriptor of edges arriving at this input.
    pub descriptor: EdgeDescriptor,
}

impl ResolvedInputInfo {
    pub fn new(id: impl Into<String>, descriptor: EdgeDescriptor) -> Self {
        Self {
            id: id.into(),
            descriptor,
        }
    }
}

/// A resolved vertex output and its consumers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedOutputInfo {
    /// Port name in the assembled graph.
    pub id: String,
    pub downstreams: IndexSet<InputRef>,
}

impl ResolvedOutputInfo {
    pub fn new<I>(id: impl Into<String>, downstreams: I) -> Self
    where
        I: IntoIterator<Item = InputRef>,
    {
        Self {
            id: id.into(),
            downstreams: downstreams.into_iter().collect(),
        }
    }
}

/// A compiled vertex ready for assembly.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedVertexInfo {
    pub id: String,
    pub descriptor: VertexDescriptor,
    /// Declared input name to resolved input.
    pub inputs: IndexMap<String, ResolvedInputInfo>,
    /// Declared output name to resolved output.
    pub outputs: IndexMap<String, ResolvedOutputInfo>,
    /// Vertices that must run before this one without sharing data.
    pub implicit_dependencies: IndexSet<String>,
}

impl ResolvedVertexInfo {
    pub fn new(id: impl Into<String>, descriptor: VertexDescriptor) -> Self {
        Self {
            id: id.into(),
            descriptor,
            inputs: IndexMap::new(),
            outputs: IndexMap::new(),
            implicit_dependencies: IndexSet::new(),
        }
    }

    pub fn with_input(mut self, name: impl Into<String>, input: ResolvedInputInfo) -> Self {
        self.inputs.insert(name.into(), input);
        self
    }

    pub fn with_output(mut self, name: impl Into<String>, output: ResolvedOutputInfo) -> Self {
        self.outputs.insert(name.into(), output);
        self
    }

    pub fn with_dependency(mut self, vertex: impl Into<String>) -> Self {
        self.implicit_dependencies.insert(vertex.into());
        self
    }
}

/// Collects resolved vertices and assembles them into a [`GraphInfo`].
#[derive(Debug, Default)]
pub struct GraphInfoBuilder {
    vertices: IndexMap<String, ResolvedVertexInfo>,
    origins: IndexMap<SubPlanRef, String>,
}

impl GraphInfoBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a vertex. Vertex ids must be unique.
    pub fn add(&mut self, vertex: ResolvedVertexInfo) -> Result<(), GraphError> {
        if self.vertices.contains_key(&vertex.id) {
            return Err(GraphError::DuplicateVertex(vertex.id));
        }
        trace!(vertex = %vertex.id, "registered vertex");
        self.vertices.insert(vertex.id.clone(), vertex);
        Ok(())
    }

    /// Register a vertex compiled from the given sub-plan.
    pub fn add_with_origin(
        &mut self,
        origin: SubPlanRef,
        vertex: ResolvedVertexInfo,
    ) -> Result<(), GraphError> {
        if let Some(existing) = self.origins.get(&origin) {
            return Err(GraphError::DuplicateOrigin {
                origin: origin.0,
                vertex: existing.clone(),
            });
        }
        let id = vertex.id.clone();
        self.add(vertex)?;
        self.origins.insert(origin, id);
        Ok(())
    }

    pub fn get(&self, id: &str) -> Option<&ResolvedVertexInfo> {
        self.vertices.get(id)
    }

    pub fn get_by_origin(&self, origin: &SubPlanRef) -> Option<&ResolvedVertexInfo> {
        self.origins.get(origin).and_then(|id| self.vertices.get(id))
    }

    pub fn input(&self, port: &InputRef) -> Option<&ResolvedInputInfo> {
        self.get(&port.vertex).and_then(|v| v.inputs.get(&port.port))
    }

    pub fn output(&self, vertex: &str, port: &str) -> Option<&ResolvedOutputInfo> {
        self.get(vertex).and_then(|v| v.outputs.get(port))
    }

    pub fn len(&self) -> usize {
        self.vertices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vertices.is_empty()
    }

    /// Assemble the graph. `void_edge` supplies the descriptor of each
    /// synthesized implicit-dependency edge.
    pub fn build<F>(&self, mut void_edge: F) -> Result<GraphInfo, GraphError>
    where
        F: FnMut() -> EdgeDescriptor,
    {
        let mut info = GraphInfo::default();
        for vertex in self.vertices.values() {
            info.add_vertex(&vertex.id, vertex.descriptor.clone())?;
            for output in vertex.outputs.values() {
                check_reserved(&vertex.id, &output.id)?;
                info.add_port(&vertex.id, &output.id, PortDirection::Output)?;
            }
            for input in vertex.inputs.values() {
                check_reserved(&vertex.id, &input.id)?;
                info.add_port(&vertex.id, &input.id, PortDirection::Input)?;
            }
        }
        self.connect_implicit_dependencies(&mut info, &mut void_edge)?;
        self.connect_edges(&mut info)?;
        debug!(
            vertices = info.vertex_count(),
            edges = info.edge_count(),
            "assembled graph"
        );
        Ok(info)
    }

    fn connect_implicit_dependencies<F>(
        &self,
        info: &mut GraphInfo,
        void_edge: &mut F,
    ) -> Result<(), GraphError>
    where
        F: FnMut() -> EdgeDescriptor,
    {
        let mut targets: IndexSet<&str> = IndexSet::new();
        for vertex in self.vertices.values() {
            for target in &vertex.implicit_dependencies {
                if !self.vertices.contains_key(target) {
                    return Err(GraphError::UnknownDependency {
                        vertex: vertex.id.clone(),
                        target: target.clone(),
                    });
                }
                targets.insert(target.as_str());
            }
        }
        for target in &targets {
            info.add_port(target, IMPLICIT_PORT, PortDirection::Output)?;
        }
        for vertex in self.vertices.values() {
            if vertex.implicit_dependencies.is_empty() {
                continue;
            }
            let downstream = info.add_port(&vertex.id, IMPLICIT_PORT, PortDirection::Input)?;
            for target in &vertex.implicit_dependencies {
                debug!(vertex = %vertex.id, before = %target, "synthesized implicit dependency");
                let upstream = PortId::output(target.as_str(), IMPLICIT_PORT);
                info.add_edge(upstream, downstream.clone(), void_edge())?;
            }
        }
        Ok(())
    }

    fn connect_edges(&self, info: &mut GraphInfo) -> Result<(), GraphError> {
        for vertex in self.vertices.values() {
            for output in vertex.outputs.values() {
                let mut resolved = Vec::with_capacity(output.downstreams.len());
                for target in &output.downstreams {
                    let input = self.input(target).ok_or_else(|| GraphError::UnknownDownstream {
                        vertex: vertex.id.clone(),
                        port: output.id.clone(),
                        target_vertex: target.vertex.clone(),
                        target_port: target.port.clone(),
                    })?;
                    resolved.push((target, input));
                }
                // Consumers are not checked for descriptor compatibility;
                // the first consumer's descriptor applies to the whole fan-out.
                let Some((_, first)) = resolved.first() else {
                    continue;
                };
                let descriptor = first.descriptor.clone();
                let upstream = PortId::output(vertex.id.as_str(), output.id.as_str());
                for (target, input) in resolved {
                    let downstream = PortId::input(target.vertex.as_str(), input.id.as_str());
                    info.add_edge(upstream.clone(), downstream, descriptor.clone())?;
                }
            }
        }
        Ok(())
    }
}

fn check_reserved(vertex: &str, port: &str) -> Result<(), GraphError> {
    if port == IMPLICIT_PORT {
        return Err(GraphError::ReservedPortName {
            vertex: vertex.to_string(),
            port: port.to_string(),
        });
    }
    Ok(())
}
