// SPDX-License-Identifier: Apache-2.0

use crate::ids::{CollectionRef, DocumentId, SequentialId, ValidationError};
use crate::value::{FieldKind, FieldValue};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::{BTreeMap, BTreeSet};

pub const DEFAULT_CREATED_AT_FIELD: &str = "createdAt";

/// A document as the backing store holds it: an optional id plus a flat JSON object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WireDocument {
    pub id: Option<DocumentId>,
    pub fields: Map<String, Value>,
}

impl WireDocument {
    #[must_use]
    pub fn new(id: Option<DocumentId>, fields: Map<String, Value>) -> Self {
        Self { id, fields }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldSpec {
    pub name: String,
    pub kind: FieldKind,
    pub required: bool,
}

impl FieldSpec {
    #[must_use]
    pub fn required(name: &str, kind: FieldKind) -> Self {
        Self {
            name: name.to_string(),
            kind,
            required: true,
        }
    }

    #[must_use]
    pub fn optional(name: &str, kind: FieldKind) -> Self {
        Self {
            name: name.to_string(),
            kind,
            required: false,
        }
    }
}

/// Wire key names of one collection's documents.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordLayout {
    sequential_field: Option<String>,
    created_at_field: String,
    image_field: Option<String>,
    fields: Vec<FieldSpec>,
}

impl Default for RecordLayout {
    fn default() -> Self {
        Self {
            sequential_field: None,
            created_at_field: DEFAULT_CREATED_AT_FIELD.to_string(),
            image_field: None,
            fields: Vec::new(),
        }
    }
}

impl RecordLayout {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_sequential_field(mut self, name: &str) -> Self {
        self.sequential_field = Some(name.to_string());
        self
    }

    #[must_use]
    pub fn with_created_at_field(mut self, name: &str) -> Self {
        self.created_at_field = name.to_string();
        self
    }

    #[must_use]
    pub fn with_image_field(mut self, name: &str) -> Self {
        self.image_field = Some(name.to_string());
        self
    }

    #[must_use]
    pub fn with_field(mut self, spec: FieldSpec) -> Self {
        self.fields.push(spec);
        self
    }

    #[must_use]
    pub fn sequential_field(&self) -> Option<&str> {
        self.sequential_field.as_deref()
    }

    #[must_use]
    pub fn created_at_field(&self) -> &str {
        &self.created_at_field
    }

    #[must_use]
    pub fn image_field(&self) -> Option<&str> {
        self.image_field.as_deref()
    }

    #[must_use]
    pub fn fields(&self) -> &[FieldSpec] {
        &self.fields
    }

    #[must_use]
    pub fn field_spec(&self, name: &str) -> Option<&FieldSpec> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// True for the sequential, creation-time and image keys.
    #[must_use]
    pub fn is_reserved(&self, name: &str) -> bool {
        self.sequential_field.as_deref() == Some(name)
            || self.created_at_field == name
            || self.image_field.as_deref() == Some(name)
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        let mut seen = BTreeSet::new();
        let reserved = self
            .sequential_field
            .iter()
            .chain(std::iter::once(&self.created_at_field))
            .chain(self.image_field.iter());
        for name in reserved.chain(self.fields.iter().map(|f| &f.name)) {
            if name.trim().is_empty() {
                return Err(ValidationError(
                    "layout field names must not be empty".to_string(),
                ));
            }
            if !seen.insert(name.as_str()) {
                return Err(ValidationError(format!(
                    "layout declares field `{name}` more than once"
                )));
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDirection {
    Ascending,
    Descending,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SortKey {
    pub field: String,
    pub direction: SortDirection,
}

impl SortKey {
    #[must_use]
    pub fn ascending(field: &str) -> Self {
        Self {
            field: field.to_string(),
            direction: SortDirection::Ascending,
        }
    }

    #[must_use]
    pub fn descending(field: &str) -> Self {
        Self {
            field: field.to_string(),
            direction: SortDirection::Descending,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CollectionSpec {
    reference: CollectionRef,
    layout: RecordLayout,
    default_sort: SortKey,
}

impl CollectionSpec {
    pub fn new(
        reference: CollectionRef,
        layout: RecordLayout,
        default_sort: SortKey,
    ) -> Result<Self, ValidationError> {
        layout.validate()?;
        Ok(Self {
            reference,
            layout,
            default_sort,
        })
    }

    #[must_use]
    pub fn reference(&self) -> &CollectionRef {
        &self.reference
    }

    #[must_use]
    pub fn layout(&self) -> &RecordLayout {
        &self.layout
    }

    #[must_use]
    pub fn default_sort(&self) -> &SortKey {
        &self.default_sort
    }
}

/// Typed view of one document.
///
/// `fields` holds only the keys the layout declares; anything else read from
/// the wire is kept verbatim in `extra` so that writing the record back does
/// not drop data other clients put there.
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    pub id: Option<DocumentId>,
    pub sequential_id: Option<SequentialId>,
    pub created_at: DateTime<Utc>,
    pub image_ref: Option<String>,
    pub fields: BTreeMap<String, FieldValue>,
    pub extra: Map<String, Value>,
}

impl Record {
    #[must_use]
    pub fn new(created_at: DateTime<Utc>) -> Self {
        Self {
            id: None,
            sequential_id: None,
            created_at,
            image_ref: None,
            fields: BTreeMap::new(),
            extra: Map::new(),
        }
    }

    #[must_use]
    pub fn with_field(mut self, name: &str, value: impl Into<FieldValue>) -> Self {
        self.fields.insert(name.to_string(), value.into());
        self
    }

    #[must_use]
    pub fn with_image_ref(mut self, url: &str) -> Self {
        self.image_ref = Some(url.to_string());
        self
    }

    #[must_use]
    pub fn field(&self, name: &str) -> Option<&FieldValue> {
        self.fields.get(name)
    }

    #[must_use]
    pub fn text(&self, name: &str) -> Option<&str> {
        self.fields.get(name).and_then(FieldValue::as_text)
    }
}
