//! Entry metadata and exact-match filters

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Metadata attached to a stored chunk
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EntryMetadata {
    /// Upload identifier used for dedup (usually the original filename)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    /// Any other key/value pairs
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

impl EntryMetadata {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_source(source: impl Into<String>) -> Self {
        Self {
            source: Some(source.into()),
            extra: BTreeMap::new(),
        }
    }

    /// Attach an extension field
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.extra.insert(key.into(), value.into());
        self
    }
}

/// Exact-match filter over [`EntryMetadata`]
///
/// Every key set on the filter must be present on the entry with an equal value.
/// An empty filter matches everything.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MetadataFilter {
    pub source: Option<String>,
    pub extra: BTreeMap<String, Value>,
}

impl MetadataFilter {
    /// Filter that matches every entry
    pub fn all() -> Self {
        Self::default()
    }

    pub fn source(source: impl Into<String>) -> Self {
        Self {
            source: Some(source.into()),
            extra: BTreeMap::new(),
        }
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.extra.insert(key.into(), value.into());
        self
    }

    pub fn is_empty(&self) -> bool {
        self.source.is_none() && self.extra.is_empty()
    }

    pub fn matches(&self, metadata: &EntryMetadata) -> bool {
        if let Some(ref source) = self.source {
            if metadata.source.as_deref() != Some(source.as_str()) {
                return false;
            }
        }

        self.extra
            .iter()
            .all(|(key, value)| metadata.extra.get(key) == Some(value))
    }
}
