//! Serialization codec binding for edge data.

use std::collections::HashMap;

use flowc_core::{ArtifactBody, ArtifactId, DataModel, DataType, Grouping};
use tracing::trace;

use crate::error::CodegenError;
use crate::naming::to_hint;
use crate::repository::ArtifactRegistry;

/// Supplies codec artifacts for edge payloads.
///
/// Implementations must return the same artifact for the same request
/// within one compilation.
pub trait CodecProvider: Send {
    /// Codec for plain records of `model`.
    fn value_codec(
        &mut self,
        registry: &mut ArtifactRegistry,
        model: &DataModel,
    ) -> Result<ArtifactId, CodegenError>;

    /// Codec splitting records of `model` into a sortable key and a value.
    fn keyed_codec(
        &mut self,
        registry: &mut ArtifactRegistry,
        model: &DataModel,
        grouping: &Grouping,
    ) -> Result<ArtifactId, CodegenError>;
}

/// Generates one codec per distinct request and memoizes it.
#[derive(Debug, Default)]
pub struct BasicCodecProvider {
    values: HashMap<DataType, ArtifactId>,
    keyed: HashMap<(DataType, Grouping), ArtifactId>,
}

impl BasicCodecProvider {
    pub fn new() -> Self {
        Self::default()
    }
}

impl CodecProvider for BasicCodecProvider {
    fn value_codec(
        &mut self,
        registry: &mut ArtifactRegistry,
        model: &DataModel,
    ) -> Result<ArtifactId, CodegenError> {
        if let Some(id) = self.values.get(&model.data_type) {
            trace!(data_type = %model.data_type, codec = %id, "value codec cache hit");
            return Ok(id.clone());
        }
        let body = ArtifactBody::ValueCodec {
            data_type: model.data_type.clone(),
            properties: model
                .properties
                .iter()
                .map(|(name, ty)| (name.clone(), *ty))
                .collect(),
        };
        let hint = to_hint(model.data_type.simple_name());
        let id = registry.add(hint.as_deref(), body)?;
        self.values.insert(model.data_type.clone(), id.clone());
        Ok(id)
    }

    fn keyed_codec(
        &mut self,
        registry: &mut ArtifactRegistry,
        model: &DataModel,
        grouping: &Grouping,
    ) -> Result<ArtifactId, CodegenError> {
        let cache_key = (model.data_type.clone(), grouping.clone());
        if let Some(id) = self.keyed.get(&cache_key) {
            trace!(data_type = %model.data_type, %grouping, codec = %id, "keyed codec cache hit");
            return Ok(id.clone());
        }
        if let Some(unknown) = grouping.unknown_keys(model).next() {
            return Err(CodegenError::UnknownProperty {
                data_type: model.data_type.clone(),
                property: unknown.to_string(),
            });
        }
        let body = ArtifactBody::KeyValueCodec {
            data_type: model.data_type.clone(),
            grouping: grouping.clone(),
            value_properties: model
                .property_names()
                .filter(|name| !grouping.keys.iter().any(|k| k.name == *name))
                .map(str::to_string)
                .collect(),
        };
        let hint = to_hint(model.data_type.simple_name());
        let id = registry.add(hint.as_deref(), body)?;
        self.keyed.insert(cache_key, id.clone());
        Ok(id)
    }
}
