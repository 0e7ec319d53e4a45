//! Validated model names.
//!
//! A name doubles as a directory under the store root, so anything that
//! could escape the root (separators, `..`, leading dots) is rejected.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::error::ModelError;

/// Longest accepted model name, in bytes.
pub const MAX_NAME_LEN: usize = 128;

/// Unique key of an artifact under the store root.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct ModelName(String);

impl ModelName {
    pub fn parse(raw: &str) -> Result<Self, ModelError> {
        let invalid = |why: &str| ModelError::InvalidName(format!("'{raw}': {why}"));

        if raw.is_empty() {
            return Err(invalid("name cannot be empty"));
        }
        if raw.len() > MAX_NAME_LEN {
            return Err(invalid("name too long"));
        }
        if raw.starts_with('.') {
            return Err(invalid("name cannot start with '.'"));
        }
        if !raw
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
        {
            return Err(invalid("only ASCII letters, digits, '-', '_' and '.' are allowed"));
        }
        Ok(Self(raw.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ModelName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for ModelName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl<'de> Deserialize<'de> for ModelName {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Self::parse(&raw).map_err(serde::de::Error::custom)
    }
}
