//! Data types and data-model references.
//!
//! A record flowing between operators is an instance of a named data model:
//! an ordered list of typed properties. The compiler never inspects record
//! layout beyond what a [`DataModelLoader`] exposes, which is used to check
//! grouping keys and to drive codec and factory binding.

use std::fmt;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Name of a record type known to the upstream planner.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct DataType(String);

impl DataType {
    /// Create a data type reference by name.
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// The fully qualified type name.
    pub fn name(&self) -> &str {
        &self.0
    }

    /// The last `.`-separated segment of the name.
    pub fn simple_name(&self) -> &str {
        self.0.rsplit('.').next().unwrap_or(&self.0)
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for DataType {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

/// Scalar type of a single record property.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PropertyType {
    Boolean,
    Int,
    Long,
    Float,
    Text,
}

impl fmt::Display for PropertyType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PropertyType::Boolean => write!(f, "boolean"),
            PropertyType::Int => write!(f, "int"),
            PropertyType::Long => write!(f, "long"),
            PropertyType::Float => write!(f, "float"),
            PropertyType::Text => write!(f, "text"),
        }
    }
}

/// The shape of a record type: its ordered, named, typed properties.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataModel {
    pub data_type: DataType,
    pub properties: IndexMap<String, PropertyType>,
}

impl DataModel {
    /// Create a data model with no properties.
    pub fn new(data_type: impl Into<DataType>) -> Self {
        Self {
            data_type: data_type.into(),
            properties: IndexMap::new(),
        }
    }

    /// Append a property.
    pub fn with_property(mut self, name: impl Into<String>, ty: PropertyType) -> Self {
        self.properties.insert(name.into(), ty);
        self
    }

    /// Look up a property's type.
    pub fn property(&self, name: &str) -> Option<PropertyType> {
        self.properties.get(name).copied()
    }

    /// Property names in declaration order.
    pub fn property_names(&self) -> impl Iterator<Item = &str> {
        self.properties.keys().map(String::as_str)
    }
}

/// Resolves a data type to its data model.
///
/// Supplied by the upstream planner; the compiler only reads from it.
pub trait DataModelLoader {
    fn load(&self, data_type: &DataType) -> Option<&DataModel>;
}

/// In-memory data model registry.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DataModelCatalog {
    models: IndexMap<DataType, DataModel>,
}

impl DataModelCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a data model, replacing any previous model with the same type.
    pub fn register(&mut self, model: DataModel) {
        self.models.insert(model.data_type.clone(), model);
    }

    /// Builder-style variant of [`register`](Self::register).
    pub fn with(mut self, model: DataModel) -> Self {
        self.register(model);
        self
    }

    pub fn len(&self) -> usize {
        self.models.len()
    }

    pub fn is_empty(&self) -> bool {
        self.models.is_empty()
    }
}

impl DataModelLoader for DataModelCatalog {
    fn load(&self, data_type: &DataType) -> Option<&DataModel> {
        self.models.get(data_type)
    }
}
