//! Generated artifact descriptions.
//!
//! The compiler does not produce executable code. It produces an
//! [`ArtifactData`] describing behavior plus the slots it reads, and an
//! emission backend turns that description into something runnable.

use std::fmt;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::grouping::Grouping;
use crate::operator::{EnumType, SummarizeTerm};
use crate::types::{DataType, PropertyType};

/// Deterministic name of a generated artifact.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ArtifactId(String);

impl ArtifactId {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Name of an inner artifact derived from this one, e.g. `Foo$Copier`.
    pub fn nested(&self, suffix: &str) -> Self {
        Self(format!("{}${}", self.0, suffix))
    }
}

impl fmt::Display for ArtifactId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A call into a named user function.
///
/// `arguments` and `tables` are slot positions in the dependency list of the
/// unit (or nested helper) that owns the invocation.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Invocation {
    pub function: String,
    pub arguments: Vec<usize>,
    pub tables: Vec<usize>,
}

/// What a compiled unit does with each input, with every slot resolved.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum UnitBehavior {
    /// Push the transformed record to `converted`, then the input to `original`.
    Convert {
        invocation: Invocation,
        converted: usize,
        original: usize,
    },
    /// Route each record to `branches[ordinal(discriminator)]`.
    Branch {
        invocation: Invocation,
        discriminator: EnumType,
        branches: Vec<usize>,
    },
    /// Modify each record in place, then push it.
    Update { invocation: Invocation, output: usize },
    /// Per-key accumulation through a copier and a nested combiner.
    Aggregate {
        grouping: Grouping,
        copier: ArtifactId,
        combiner: usize,
        output: usize,
    },
    /// Route transactions by the presence of a matching master.
    MasterCheck {
        selection: Option<Invocation>,
        check: Option<Invocation>,
        found: usize,
        missing: usize,
    },
    /// Route transactions by a discriminator computed from master and transaction.
    MasterBranch {
        selection: Option<Invocation>,
        invocation: Invocation,
        discriminator: EnumType,
        branches: Vec<usize>,
        default_branch: Option<usize>,
    },
    /// Push every record unchanged.
    PassThrough { output: usize },
    /// Create a fresh output record and copy same-named properties into it.
    Mapping { factory: ArtifactId, output: usize },
    /// Drop every record.
    Discard,
    /// Copy to every output but the last, which receives the original.
    Buffer { outputs: Vec<usize> },
}

impl UnitBehavior {
    pub fn label(&self) -> &'static str {
        match self {
            UnitBehavior::Convert { .. } => "convert",
            UnitBehavior::Branch { .. } => "branch",
            UnitBehavior::Update { .. } => "update",
            UnitBehavior::Aggregate { .. } => "aggregate",
            UnitBehavior::MasterCheck { .. } => "masterCheck",
            UnitBehavior::MasterBranch { .. } => "masterBranch",
            UnitBehavior::PassThrough { .. } => "passThrough",
            UnitBehavior::Mapping { .. } => "mapping",
            UnitBehavior::Discard => "discard",
            UnitBehavior::Buffer { .. } => "buffer",
        }
    }
}

/// Merge step of an aggregate operator.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CombinerBody {
    /// User fold; the invocation's slots index the nested element list.
    Fold {
        data_type: DataType,
        grouping: Grouping,
        invocation: Invocation,
    },
    /// Declared summarize terms.
    Summarize {
        data_type: DataType,
        grouping: Grouping,
        terms: Vec<SummarizeTerm>,
    },
}

/// The behavior description carried by an artifact.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ArtifactBody {
    Unit(UnitBehavior),
    ValueCodec {
        data_type: DataType,
        properties: Vec<(String, PropertyType)>,
    },
    KeyValueCodec {
        data_type: DataType,
        grouping: Grouping,
        value_properties: Vec<String>,
    },
    Factory {
        data_type: DataType,
        properties: Vec<String>,
    },
    Copier {
        data_type: DataType,
        properties: Vec<String>,
    },
    /// Builds a summarized record from the first input record of a group.
    Initializer {
        source: DataType,
        target: DataType,
        terms: Vec<SummarizeTerm>,
    },
    Combiner(CombinerBody),
}

impl ArtifactBody {
    pub fn category(&self) -> &'static str {
        match self {
            ArtifactBody::Unit(_) => "unit",
            ArtifactBody::ValueCodec { .. } => "codec.value",
            ArtifactBody::KeyValueCodec { .. } => "codec.keyed",
            ArtifactBody::Factory { .. } => "factory",
            ArtifactBody::Copier { .. } => "copier",
            ArtifactBody::Initializer { .. } => "initializer",
            ArtifactBody::Combiner(_) => "combiner",
        }
    }
}

/// A named, content-addressed artifact description.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactData {
    pub id: ArtifactId,
    pub body: ArtifactBody,
    /// Hex SHA-256 of the body's canonical JSON.
    pub digest: String,
}

impl ArtifactData {
    /// Fails only if the body cannot be rendered as JSON.
    pub fn new(id: ArtifactId, body: ArtifactBody) -> Result<Self, serde_json::Error> {
        let digest = digest_of(&body)?;
        Ok(Self { id, body, digest })
    }
}

/// Hex SHA-256 of the canonical JSON of `body`.
fn digest_of(body: &ArtifactBody) -> Result<String, serde_json::Error> {
    let json = serde_json::to_vec(body)?;
    let hash: [u8; 32] = Sha256::digest(&json).into();
    Ok(hash.iter().map(|b| format!("{b:02x}")).collect())
}
