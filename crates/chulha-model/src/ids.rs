// SPDX-License-Identifier: Apache-2.0

use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};

pub const COLLECTION_REF_MAX_LEN: usize = 128;
pub const DOCUMENT_ID_MAX_LEN: usize = 1500;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{0}")]
pub struct ValidationError(pub String);

fn validate_path_segment(kind: &str, input: &str, max_len: usize) -> Result<(), ValidationError> {
    if input.is_empty() {
        return Err(ValidationError(format!("{kind} must not be empty")));
    }
    if input.len() > max_len {
        return Err(ValidationError(format!(
            "{kind} exceeds max length {max_len}"
        )));
    }
    if input.contains('/') {
        return Err(ValidationError(format!("{kind} must not contain '/'")));
    }
    if input == "." || input == ".." {
        return Err(ValidationError(format!("{kind} must not be '.' or '..'")));
    }
    if input.chars().any(char::is_control) {
        return Err(ValidationError(format!(
            "{kind} must not contain control characters"
        )));
    }
    Ok(())
}

/// Name of a logical group of documents, e.g. `Staff` or `menu`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct CollectionRef(String);

impl CollectionRef {
    pub fn parse(input: &str) -> Result<Self, ValidationError> {
        let s = input.trim();
        validate_path_segment("collection reference", s, COLLECTION_REF_MAX_LEN)?;
        Ok(Self(s.to_string()))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for CollectionRef {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<CollectionRef> for String {
    fn from(value: CollectionRef) -> Self {
        value.0
    }
}

impl Display for CollectionRef {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Opaque identifier assigned by the backing store on first persistence.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct DocumentId(String);

impl DocumentId {
    pub fn parse(input: &str) -> Result<Self, ValidationError> {
        validate_path_segment("document id", input, DOCUMENT_ID_MAX_LEN)?;
        Ok(Self(input.to_string()))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for DocumentId {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<DocumentId> for String {
    fn from(value: DocumentId) -> Self {
        value.0
    }
}

impl Display for DocumentId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Application-level integer id, starting at 1.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "u64", into = "u64")]
pub struct SequentialId(u64);

impl SequentialId {
    pub const FIRST: Self = Self(1);

    pub fn new(value: u64) -> Result<Self, ValidationError> {
        if value == 0 {
            return Err(ValidationError(
                "sequential id must be a positive integer".to_string(),
            ));
        }
        Ok(Self(value))
    }

    #[must_use]
    pub const fn get(self) -> u64 {
        self.0
    }

    /// Reads a positive id from a wire value; older documents stored it as a
    /// decimal string.
    #[must_use]
    pub fn from_wire(value: &serde_json::Value) -> Option<Self> {
        let raw = match value {
            serde_json::Value::Number(n) => n.as_u64(),
            serde_json::Value::String(s) => s.trim().parse::<u64>().ok(),
            _ => None,
        };
        raw.and_then(|v| Self::new(v).ok())
    }

    /// The id following `self`, or `None` on overflow.
    #[must_use]
    pub fn successor(self) -> Option<Self> {
        self.0.checked_add(1).map(Self)
    }
}

impl TryFrom<u64> for SequentialId {
    type Error = ValidationError;

    fn try_from(value: u64) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<SequentialId> for u64 {
    fn from(value: SequentialId) -> Self {
        value.0
    }
}

impl Display for SequentialId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}
