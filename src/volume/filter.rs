//! Metadata filters for volume listings

use std::collections::HashMap;

/// Which parts of a [`VolumeFilter`] are set
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterMode {
    All,
    KeyOnly,
    ValueOnly,
    KeyAndValue,
}

/// Optional key and value to match against a volume's metadata
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VolumeFilter {
    pub key: Option<String>,
    pub value: Option<String>,
}

impl VolumeFilter {
    /// Matches every volume
    pub fn all() -> Self {
        Self::default()
    }

    pub fn key(key: impl Into<String>) -> Self {
        Self {
            key: Some(key.into()),
            value: None,
        }
    }

    pub fn value(value: impl Into<String>) -> Self {
        Self {
            key: None,
            value: Some(value.into()),
        }
    }

    pub fn key_value(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: Some(key.into()),
            value: Some(value.into()),
        }
    }

    /// Build from request parameters, reading the `key` and `value` entries
    pub fn from_params(params: &HashMap<String, String>) -> Self {
        Self {
            key: params.get("key").cloned(),
            value: params.get("value").cloned(),
        }
    }

    pub fn mode(&self) -> FilterMode {
        match (&self.key, &self.value) {
            (None, None) => FilterMode::All,
            (Some(_), None) => FilterMode::KeyOnly,
            (None, Some(_)) => FilterMode::ValueOnly,
            (Some(_), Some(_)) => FilterMode::KeyAndValue,
        }
    }

    pub fn matches(&self, metadata: &HashMap<String, String>) -> bool {
        match (&self.key, &self.value) {
            (None, None) => true,
            (Some(key), None) => metadata.contains_key(key),
            (None, Some(value)) => metadata.values().any(|v| v == value),
            (Some(key), Some(value)) => metadata.get(key) == Some(value),
        }
    }
}
