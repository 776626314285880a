//! Registry of generated artifacts.

use std::fs;
use std::path::{Path, PathBuf};

use flowc_core::{ArtifactBody, ArtifactData, ArtifactId};
use indexmap::IndexMap;
use tracing::debug;

use crate::error::CodegenError;
use crate::naming::NameMap;

/// Every artifact produced by one compilation, in registration order.
#[derive(Debug, Clone)]
pub struct ArtifactRegistry {
    names: NameMap,
    artifacts: IndexMap<ArtifactId, ArtifactData>,
}

impl ArtifactRegistry {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            names: NameMap::new(prefix),
            artifacts: IndexMap::new(),
        }
    }

    /// Name and register a new artifact under its body's category.
    pub fn add(&mut self, hint: Option<&str>, body: ArtifactBody) -> Result<ArtifactId, CodegenError> {
        let id = self.names.get(body.category(), hint)?;
        self.add_as(id, body)
    }

    /// Register an artifact under a name chosen by the caller, typically a
    /// nested name such as `unit_0$Combiner`.
    pub fn add_as(&mut self, id: ArtifactId, body: ArtifactBody) -> Result<ArtifactId, CodegenError> {
        if self.artifacts.contains_key(&id) {
            return Err(CodegenError::DuplicateArtifact(id));
        }
        let category = body.category();
        let data = ArtifactData::new(id.clone(), body).map_err(|source| CodegenError::Encode {
            id: id.clone(),
            source,
        })?;
        debug!(artifact = %id, category, digest = %data.digest, "registered artifact");
        self.artifacts.insert(id.clone(), data);
        Ok(id)
    }

    /// Reserve the next name in `category` without registering a body.
    pub fn reserve(&mut self, category: &str, hint: Option<&str>) -> Result<ArtifactId, CodegenError> {
        self.names.get(category, hint)
    }

    pub fn get(&self, id: &ArtifactId) -> Option<&ArtifactData> {
        self.artifacts.get(id)
    }

    pub fn contains(&self, id: &ArtifactId) -> bool {
        self.artifacts.contains_key(id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &ArtifactData> {
        self.artifacts.values()
    }

    pub fn len(&self) -> usize {
        self.artifacts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.artifacts.is_empty()
    }

    /// Write each artifact as `{id}.json` under `dir`, creating it if needed.
    pub fn dump_to(&self, dir: &Path) -> Result<Vec<PathBuf>, CodegenError> {
        let mut written = Vec::with_capacity(self.artifacts.len());
        for data in self.artifacts.values() {
            let path = dir.join(format!("{}.json", data.id));
            let json = serde_json::to_string_pretty(data).map_err(|source| CodegenError::Encode {
                id: data.id.clone(),
                source,
            })?;
            fs::create_dir_all(dir)
                .and_then(|_| fs::write(&path, json))
                .map_err(|source| CodegenError::Io {
                    id: data.id.clone(),
                    path: path.clone(),
                    source,
                })?;
            written.push(path);
        }
        debug!(dir = %dir.display(), count = written.len(), "dumped artifacts");
        Ok(written)
    }
}
