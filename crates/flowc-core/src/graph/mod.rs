//! The vertex/port/edge graph handed to the execution engine.
//!
//! A [`GraphInfo`] is assembled once by [`build::GraphInfoBuilder`] and is
//! read-only afterwards. Every port belongs to exactly one vertex, every edge
//! connects an existing output port to an existing input port, and vertex
//! ids are unique.

pub mod build;

use std::fmt;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::artifact::ArtifactId;
use crate::grouping::Grouping;

/// Reserved port name for control-only implicit dependency edges.
pub const IMPLICIT_PORT: &str = "_dependency";

/// Errors raised while assembling a graph. All of them indicate a faulty
/// graph construction, not a recoverable user condition.
#[derive(Debug, Error)]
pub enum GraphError {
    #[error("duplicate vertex id: {0}")]
    DuplicateVertex(String),

    #[error("duplicate origin {origin} (already mapped to vertex {vertex})")]
    DuplicateOrigin { origin: String, vertex: String },

    #[error("vertex {vertex} depends on unregistered vertex {target}")]
    UnknownDependency { vertex: String, target: String },

    #[error("output {vertex}.{port} feeds unknown input {target_vertex}.{target_port}")]
    UnknownDownstream {
        vertex: String,
        port: String,
        target_vertex: String,
        target_port: String,
    },

    #[error("port {vertex}.{port} uses the reserved name _dependency")]
    ReservedPortName { vertex: String, port: String },

    #[error("duplicate {direction} port {vertex}.{port}")]
    DuplicatePort {
        vertex: String,
        port: String,
        direction: PortDirection,
    },

    #[error("port not found: {0}")]
    PortNotFound(PortId),
}

/// Direction of a port relative to its vertex.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PortDirection {
    Input,
    Output,
}

impl fmt::Display for PortDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PortDirection::Input => write!(f, "INPUT"),
            PortDirection::Output => write!(f, "OUTPUT"),
        }
    }
}

/// Globally unique port identity: (vertex, port name, direction).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PortId {
    pub vertex: String,
    pub name: String,
    pub direction: PortDirection,
}

impl PortId {
    pub fn input(vertex: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            vertex: vertex.into(),
            name: name.into(),
            direction: PortDirection::Input,
        }
    }

    pub fn output(vertex: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            vertex: vertex.into(),
            name: name.into(),
            direction: PortDirection::Output,
        }
    }

    pub fn is_implicit(&self) -> bool {
        self.name == IMPLICIT_PORT
    }
}

impl fmt::Display for PortId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}({})", self.vertex, self.name, self.direction)
    }
}

/// Names the executable a vertex runs.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct VertexDescriptor {
    /// Operator kind label, e.g. `convert`.
    pub kind: String,
    pub artifact: ArtifactId,
}

impl VertexDescriptor {
    pub fn new(kind: impl Into<String>, artifact: ArtifactId) -> Self {
        Self {
            kind: kind.into(),
            artifact,
        }
    }
}

/// How records move along an edge.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EdgeDescriptor {
    /// Control-only; carries no data.
    Void,
    OneToOne {
        codec: ArtifactId,
    },
    /// Every downstream task receives all records.
    Broadcast {
        codec: ArtifactId,
    },
    /// Records are partitioned and sorted by key.
    ScatterGather {
        codec: ArtifactId,
        grouping: Grouping,
    },
}

impl EdgeDescriptor {
    pub fn is_void(&self) -> bool {
        matches!(self, EdgeDescriptor::Void)
    }
}

/// A vertex of the assembled graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VertexInfo {
    id: String,
    descriptor: VertexDescriptor,
    inputs: Vec<PortId>,
    outputs: Vec<PortId>,
}

impl VertexInfo {
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn descriptor(&self) -> &VertexDescriptor {
        &self.descriptor
    }

    pub fn inputs(&self) -> &[PortId] {
        &self.inputs
    }

    pub fn outputs(&self) -> &[PortId] {
        &self.outputs
    }

    pub fn find_input(&self, name: &str) -> Option<&PortId> {
        self.inputs.iter().find(|p| p.name == name)
    }

    pub fn find_output(&self, name: &str) -> Option<&PortId> {
        self.outputs.iter().find(|p| p.name == name)
    }

    /// Add a port, returning its id. Port names are unique per direction.
    fn add_port(&mut self, name: &str, direction: PortDirection) -> Result<PortId, GraphError> {
        let ports = match direction {
            PortDirection::Input => &mut self.inputs,
            PortDirection::Output => &mut self.outputs,
        };
        if ports.iter().any(|p| p.name == name) {
            return Err(GraphError::DuplicatePort {
                vertex: self.id.clone(),
                port: name.to_string(),
                direction,
            });
        }
        let id = PortId {
            vertex: self.id.clone(),
            name: name.to_string(),
            direction,
        };
        ports.push(id.clone());
        Ok(id)
    }
}

/// A directed edge from an output port to an input port.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EdgeInfo {
    pub upstream: PortId,
    pub downstream: PortId,
    pub descriptor: EdgeDescriptor,
}

/// The assembled vertex/port/edge graph.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GraphInfo {
    vertices: IndexMap<String, VertexInfo>,
    edges: Vec<EdgeInfo>,
}

impl GraphInfo {
    pub fn vertices(&self) -> impl Iterator<Item = &VertexInfo> {
        self.vertices.values()
    }

    pub fn vertex(&self, id: &str) -> Option<&VertexInfo> {
        self.vertices.get(id)
    }

    pub fn vertex_count(&self) -> usize {
        self.vertices.len()
    }

    pub fn edges(&self) -> &[EdgeInfo] {
        &self.edges
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    /// Edges whose upstream port is `port`.
    pub fn edges_from<'a>(&'a self, port: &'a PortId) -> impl Iterator<Item = &'a EdgeInfo> + 'a {
        self.edges.iter().filter(move |e| &e.upstream == port)
    }

    /// Edges whose downstream port is `port`.
    pub fn edges_to<'a>(&'a self, port: &'a PortId) -> impl Iterator<Item = &'a EdgeInfo> + 'a {
        self.edges.iter().filter(move |e| &e.downstream == port)
    }

    /// Serialize to pretty-printed JSON.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    fn add_vertex(&mut self, id: &str, descriptor: VertexDescriptor) -> Result<(), GraphError> {
        if self.vertices.contains_key(id) {
            return Err(GraphError::DuplicateVertex(id.to_string()));
        }
        self.vertices.insert(
            id.to_string(),
            VertexInfo {
                id: id.to_string(),
                descriptor,
                inputs: Vec::new(),
                outputs: Vec::new(),
            },
        );
        Ok(())
    }

    fn add_port(
        &mut self,
        vertex: &str,
        name: &str,
        direction: PortDirection,
    ) -> Result<PortId, GraphError> {
        let v = self.vertices.get_mut(vertex).ok_or_else(|| {
            GraphError::PortNotFound(PortId {
                vertex: vertex.to_string(),
                name: name.to_string(),
                direction,
            })
        })?;
        v.add_port(name, direction)
    }

    fn contains_port(&self, port: &PortId) -> bool {
        self.vertices.get(&port.vertex).is_some_and(|v| match port.direction {
            PortDirection::Input => v.inputs.contains(port),
            PortDirection::Output => v.outputs.contains(port),
        })
    }

    fn add_edge(
        &mut self,
        upstream: PortId,
        downstream: PortId,
        descriptor: EdgeDescriptor,
    ) -> Result<(), GraphError> {
        for port in [&upstream, &downstream] {
            if !self.contains_port(port) {
                return Err(GraphError::PortNotFound(port.clone()));
            }
        }
        self.edges.push(EdgeInfo {
            upstream,
            downstream,
            descriptor,
        });
        Ok(())
    }
}
