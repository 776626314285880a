//! Grouping keys for grouped and co-grouped inputs.

use std::cmp::Ordering;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::types::DataModel;
use crate::value::{Record, Value};

/// Sort direction of a key property.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Direction {
    Ascending,
    Descending,
}

/// One key property of a grouping.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct KeyProperty {
    pub name: String,
    pub direction: Direction,
}

impl KeyProperty {
    pub fn ascending(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            direction: Direction::Ascending,
        }
    }

    pub fn descending(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            direction: Direction::Descending,
        }
    }
}

impl fmt::Display for KeyProperty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.direction {
            Direction::Ascending => write!(f, "+{}", self.name),
            Direction::Descending => write!(f, "-{}", self.name),
        }
    }
}

/// Ordered key properties that define how records are grouped.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Grouping {
    pub keys: Vec<KeyProperty>,
}

/// The extracted key of one record under a grouping.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Key(pub Vec<Value>);

impl Grouping {
    /// A grouping over ascending keys.
    pub fn of<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            keys: names.into_iter().map(KeyProperty::ascending).collect(),
        }
    }

    pub fn with_key(mut self, key: KeyProperty) -> Self {
        self.keys.push(key);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// Extract this grouping's key from a record.
    pub fn key_of(&self, record: &Record) -> Key {
        Key(self
            .keys
            .iter()
            .map(|k| record.get(&k.name).clone())
            .collect())
    }

    /// Compare two records by key, honoring each key's direction.
    pub fn compare(&self, a: &Record, b: &Record) -> Ordering {
        for key in &self.keys {
            let ord = a.get(&key.name).cmp(b.get(&key.name));
            let ord = match key.direction {
                Direction::Ascending => ord,
                Direction::Descending => ord.reverse(),
            };
            if ord != Ordering::Equal {
                return ord;
            }
        }
        Ordering::Equal
    }

    /// Key property names that `model` does not declare.
    pub fn unknown_keys<'a>(&'a self, model: &'a DataModel) -> impl Iterator<Item = &'a str> + 'a {
        self.keys
            .iter()
            .map(|k| k.name.as_str())
            .filter(move |name| model.property(name).is_none())
    }
}

impl fmt::Display for Grouping {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[")?;
        for (i, key) in self.keys.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{key}")?;
        }
        write!(f, "]")
    }
}
