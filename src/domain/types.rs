//! Identifier newtypes shared across the engine.
//!
//! Catalog identifiers are human-assigned text slugs (often localized product
//! titles), not surrogate integers. `/` is reserved as a path separator by
//! presentation layers, so it is rewritten to `-` at construction.

use std::fmt;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProductId(String);

impl ProductId {
    pub fn new(raw: impl Into<String>) -> Self {
        Self(normalize_slug(raw.into()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ProductId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ProductId {
    fn from(raw: &str) -> Self {
        Self::new(raw)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LocationId(String);

impl LocationId {
    pub fn new(raw: impl Into<String>) -> Self {
        Self(normalize_slug(raw.into()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for LocationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for LocationId {
    fn from(raw: &str) -> Self {
        Self::new(raw)
    }
}

fn normalize_slug(raw: String) -> String {
    let trimmed = raw.trim();
    if trimmed.len() == raw.len() && !trimmed.contains('/') {
        return raw;
    }
    trimmed.replace('/', "-")
}
