//! Opaque storage references

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::error::Error;

/// Longest accepted object key, in bytes
pub const STORAGE_ID_MAX_BYTES: usize = 512;

/// Object key of an uploaded file, e.g. `posts/0190f5c2-...`
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct StorageId(String);

impl StorageId {
    /// Generate a fresh key under `prefix`
    #[must_use]
    pub fn generate(prefix: &str) -> Self {
        let prefix = prefix.trim_matches('/');
        Self(format!("{prefix}/{}", Uuid::now_v7()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for StorageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for StorageId {
    type Err = Error;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let key = raw.trim().trim_start_matches('/');
        if key.is_empty() {
            return Err(Error::InvalidInput("storage id is required".into()));
        }
        if key.split('/').any(|segment| segment == "..") {
            return Err(Error::InvalidInput(
                "storage id must not contain path traversal segments".into(),
            ));
        }
        if key.len() > STORAGE_ID_MAX_BYTES {
            return Err(Error::InvalidInput(format!(
                "storage id must be at most {STORAGE_ID_MAX_BYTES} bytes"
            )));
        }
        Ok(Self(key.to_string()))
    }
}

impl TryFrom<String> for StorageId {
    type Error = Error;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<StorageId> for String {
    fn from(value: StorageId) -> Self {
        value.0
    }
}
