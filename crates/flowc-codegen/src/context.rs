//! Generation context shared by every specializer in one compilation.

use flowc_core::{ArtifactBody, ArtifactId, DataModel, DataModelLoader, DataType, Grouping};

use crate::codec::{BasicCodecProvider, CodecProvider};
use crate::error::CodegenError;
use crate::factory::{BasicFactoryProvider, FactoryProvider};
use crate::repository::ArtifactRegistry;

/// Owns the artifact registry and the memoizing providers.
///
/// Lives for exactly one compilation and is passed by reference into each
/// specializer.
pub struct GeneratorContext<'a> {
    loader: &'a dyn DataModelLoader,
    registry: ArtifactRegistry,
    codecs: Box<dyn CodecProvider + 'a>,
    factories: Box<dyn FactoryProvider + 'a>,
}

impl<'a> GeneratorContext<'a> {
    pub fn new(prefix: impl Into<String>, loader: &'a dyn DataModelLoader) -> Self {
        Self {
            loader,
            registry: ArtifactRegistry::new(prefix),
            codecs: Box::new(BasicCodecProvider::new()),
            factories: Box::new(BasicFactoryProvider::new()),
        }
    }

    pub fn with_codecs(mut self, codecs: impl CodecProvider + 'a) -> Self {
        self.codecs = Box::new(codecs);
        self
    }

    pub fn with_factories(mut self, factories: impl FactoryProvider + 'a) -> Self {
        self.factories = Box::new(factories);
        self
    }

    pub fn data_model(&self, data_type: &DataType) -> Result<&'a DataModel, CodegenError> {
        let loader = self.loader;
        loader
            .load(data_type)
            .ok_or_else(|| CodegenError::UnknownDataModel(data_type.clone()))
    }

    /// Value codec for `data_type`.
    pub fn serializer_for(&mut self, data_type: &DataType) -> Result<ArtifactId, CodegenError> {
        let model = self.data_model(data_type)?;
        self.codecs.value_codec(&mut self.registry, model)
    }

    /// Keyed codec for `data_type` under `grouping`.
    pub fn keyed_serializer_for(
        &mut self,
        data_type: &DataType,
        grouping: &Grouping,
    ) -> Result<ArtifactId, CodegenError> {
        let model = self.data_model(data_type)?;
        self.codecs.keyed_codec(&mut self.registry, model, grouping)
    }

    pub fn factory_for(&mut self, data_type: &DataType) -> Result<ArtifactId, CodegenError> {
        let model = self.data_model(data_type)?;
        self.factories.factory(&mut self.registry, model)
    }

    /// Reserve a fresh unit name so nested helpers can be named after it.
    pub fn reserve_unit(&mut self, hint: &str) -> Result<ArtifactId, CodegenError> {
        self.registry.reserve("unit", Some(hint))
    }

    pub fn add_artifact(
        &mut self,
        hint: Option<&str>,
        body: ArtifactBody,
    ) -> Result<ArtifactId, CodegenError> {
        self.registry.add(hint, body)
    }

    pub fn add_named(&mut self, id: ArtifactId, body: ArtifactBody) -> Result<ArtifactId, CodegenError> {
        self.registry.add_as(id, body)
    }

    pub fn artifacts(&self) -> &ArtifactRegistry {
        &self.registry
    }

    pub fn into_artifacts(self) -> ArtifactRegistry {
        self.registry
    }
}
