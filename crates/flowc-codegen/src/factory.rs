//! Record factories and copiers.

use std::collections::HashMap;

use flowc_core::{ArtifactBody, ArtifactId, DataModel, DataType};
use tracing::trace;

use crate::error::CodegenError;
use crate::naming::to_hint;
use crate::repository::ArtifactRegistry;

/// Supplies artifacts that create empty records of a data model.
pub trait FactoryProvider: Send {
    fn factory(
        &mut self,
        registry: &mut ArtifactRegistry,
        model: &DataModel,
    ) -> Result<ArtifactId, CodegenError>;
}

/// One factory per data type, memoized.
#[derive(Debug, Default)]
pub struct BasicFactoryProvider {
    factories: HashMap<DataType, ArtifactId>,
}

impl BasicFactoryProvider {
    pub fn new() -> Self {
        Self::default()
    }
}

impl FactoryProvider for BasicFactoryProvider {
    fn factory(
        &mut self,
        registry: &mut ArtifactRegistry,
        model: &DataModel,
    ) -> Result<ArtifactId, CodegenError> {
        if let Some(id) = self.factories.get(&model.data_type) {
            trace!(data_type = %model.data_type, factory = %id, "factory cache hit");
            return Ok(id.clone());
        }
        let body = ArtifactBody::Factory {
            data_type: model.data_type.clone(),
            properties: model.property_names().map(str::to_string).collect(),
        };
        let hint = to_hint(model.data_type.simple_name());
        let id = registry.add(hint.as_deref(), body)?;
        self.factories.insert(model.data_type.clone(), id.clone());
        Ok(id)
    }
}

/// Body of a copier that duplicates every property of `model`.
///
/// Copiers are nested in the unit that owns them and are never shared.
pub fn copier_body(model: &DataModel) -> ArtifactBody {
    ArtifactBody::Copier {
        data_type: model.data_type.clone(),
        properties: model.property_names().map(str::to_string).collect(),
    }
}
