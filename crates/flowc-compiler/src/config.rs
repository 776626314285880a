//! Compile options.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors raised while loading compile options.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("invalid compile options: {detail}")]
    Invalid { detail: String },
}

/// Options that control one compilation.
///
/// ```toml
/// prefix = "batch.orders."
/// dump-artifacts = true
/// dump-dir = "target/flowc"
/// strict-grouping = true
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct CompileOptions {
    /// Prepended to every generated artifact name.
    pub prefix: String,
    /// Write every artifact description as JSON after compiling.
    pub dump_artifacts: bool,
    pub dump_dir: Option<PathBuf>,
    /// Reject groupings whose key names the data model does not declare.
    pub strict_grouping: bool,
}

impl Default for CompileOptions {
    fn default() -> Self {
        Self {
            prefix: "flowc.".to_string(),
            dump_artifacts: false,
            dump_dir: None,
            strict_grouping: true,
        }
    }
}

impl CompileOptions {
    pub fn from_toml_str(input: &str) -> Result<Self, ConfigError> {
        let options: CompileOptions = toml::from_str(input)?;
        options.validate()?;
        Ok(options)
    }

    /// Reject combinations that cannot be honored.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.dump_artifacts && self.dump_dir.is_none() {
            return Err(ConfigError::Invalid {
                detail: "dump-artifacts requires dump-dir".to_string(),
            });
        }
        Ok(())
    }

    pub fn from_path(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&content)
    }

    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = prefix.into();
        self
    }

    pub fn with_dump_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.dump_artifacts = true;
        self.dump_dir = Some(dir.into());
        self
    }
}
