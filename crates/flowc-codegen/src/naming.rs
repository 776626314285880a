//! Deterministic artifact naming.
//!
//! Names have the form `{prefix}{category}.{hint}_{n}` where `n` counts the
//! requests for the same `(category, hint)` pair in one compilation. The
//! same sequence of requests always yields the same names.

use std::collections::HashMap;
use std::sync::LazyLock;

use flowc_core::ArtifactId;
use regex::Regex;

use crate::error::CodegenError;

static CATEGORY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z][A-Za-z0-9_]*(\.[A-Za-z][A-Za-z0-9_]*)*$").expect("valid pattern")
});

static HINT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z][A-Za-z0-9]*$").expect("valid pattern"));

/// Hands out collision-free artifact names.
#[derive(Debug, Clone)]
pub struct NameMap {
    prefix: String,
    counters: HashMap<(String, Option<String>), usize>,
}

impl NameMap {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            counters: HashMap::new(),
        }
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Allocate the next name for `(category, hint)`.
    pub fn get(&mut self, category: &str, hint: Option<&str>) -> Result<ArtifactId, CodegenError> {
        if !CATEGORY.is_match(category) {
            return Err(CodegenError::InvalidCategory(category.to_string()));
        }
        if let Some(hint) = hint {
            if !HINT.is_match(hint) {
                return Err(CodegenError::InvalidHint(hint.to_string()));
            }
        }
        let counter = self
            .counters
            .entry((category.to_string(), hint.map(str::to_string)))
            .or_insert(0);
        let count = *counter;
        *counter += 1;
        Ok(ArtifactId::new(format!(
            "{}{}.{}_{}",
            self.prefix,
            category,
            hint.unwrap_or(""),
            count
        )))
    }
}

/// Reduce an arbitrary name to a valid hint, or `None` if nothing usable remains.
pub fn to_hint(name: &str) -> Option<String> {
    let cleaned: String = name.chars().filter(|c| c.is_ascii_alphanumeric()).collect();
    let trimmed = cleaned.trim_start_matches(|c: char| c.is_ascii_digit());
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}
