// SPDX-License-Identifier: Apache-2.0

use crate::ids::SequentialId;
use crate::order::SortValue;
use crate::record::{Record, RecordLayout, SortDirection, SortKey, WireDocument};
use crate::value::{json_kind_name, FieldKind, FieldValue};
use chrono::{DateTime, SecondsFormat, Utc};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[non_exhaustive]
pub enum DecodeError {
    #[error("required field `{field}` is missing")]
    MissingField { field: String },
    #[error("field `{field}` expected {expected}, found {found}")]
    WrongKind {
        field: String,
        expected: &'static str,
        found: &'static str,
    },
    #[error("field `{field}` holds an invalid timestamp `{value}`")]
    InvalidTimestamp { field: String, value: String },
    #[error("field `{field}` holds an invalid sequential id `{value}`")]
    InvalidSequentialId { field: String, value: String },
    #[error("field `{field}` is reserved by the collection layout")]
    ReservedField { field: String },
    #[error("required field `{field}` is blank")]
    BlankField { field: String },
    #[error("field `{field}` holds an unknown value `{value}`")]
    InvalidValue { field: String, value: String },
}

impl DecodeError {
    #[must_use]
    pub fn field(&self) -> &str {
        match self {
            Self::MissingField { field }
            | Self::WrongKind { field, .. }
            | Self::InvalidTimestamp { field, .. }
            | Self::InvalidSequentialId { field, .. }
            | Self::ReservedField { field }
            | Self::BlankField { field }
            | Self::InvalidValue { field, .. } => field,
        }
    }
}

#[must_use]
pub fn encode_timestamp(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::AutoSi, true)
}

/// Converts between wire documents and typed records for one layout.
#[derive(Debug, Clone, Copy)]
pub struct RecordCodec<'a> {
    layout: &'a RecordLayout,
}

impl<'a> RecordCodec<'a> {
    #[must_use]
    pub fn new(layout: &'a RecordLayout) -> Self {
        Self { layout }
    }

    pub fn decode(&self, doc: &WireDocument) -> Result<Record, DecodeError> {
        let layout = self.layout;
        let created_at = decode_timestamp(&doc.fields, layout.created_at_field())?;
        let sequential_id = match layout.sequential_field() {
            Some(name) => decode_sequential_id(&doc.fields, name)?,
            None => None,
        };
        let image_ref = match layout.image_field() {
            Some(name) => decode_optional_text(&doc.fields, name)?,
            None => None,
        };

        let mut fields = BTreeMap::new();
        for spec in layout.fields() {
            match doc.fields.get(&spec.name) {
                None | Some(Value::Null) if spec.required => {
                    return Err(DecodeError::MissingField {
                        field: spec.name.clone(),
                    });
                }
                None => {}
                Some(value) => {
                    let decoded = FieldValue::from_json_as(value, spec.kind).ok_or_else(|| {
                        DecodeError::WrongKind {
                            field: spec.name.clone(),
                            expected: spec.kind.as_str(),
                            found: json_kind_name(value),
                        }
                    })?;
                    fields.insert(spec.name.clone(), decoded);
                }
            }
        }

        let extra = doc
            .fields
            .iter()
            .filter(|(name, _)| !layout.is_reserved(name) && layout.field_spec(name).is_none())
            .map(|(name, value)| (name.clone(), value.clone()))
            .collect();

        Ok(Record {
            id: doc.id.clone(),
            sequential_id,
            created_at,
            image_ref,
            fields,
            extra,
        })
    }

    /// Rejects required text fields that are empty or whitespace. Applied to
    /// records about to be written; stored documents decode regardless.
    pub fn check_filled(&self, record: &Record) -> Result<(), DecodeError> {
        for spec in self.layout.fields() {
            if !spec.required || spec.kind != FieldKind::Text {
                continue;
            }
            let blank = match record.fields.get(&spec.name) {
                Some(FieldValue::Text(text)) => text.trim().is_empty(),
                Some(_) => false,
                None => true,
            };
            if blank {
                return Err(DecodeError::BlankField {
                    field: spec.name.clone(),
                });
            }
        }
        Ok(())
    }

    #[must_use]
    pub fn encode(&self, record: &Record) -> WireDocument {
        let layout = self.layout;
        let mut fields = record.extra.clone();
        for (name, value) in &record.fields {
            fields.insert(name.clone(), value.to_json());
        }
        if let (Some(name), Some(seq)) = (layout.sequential_field(), record.sequential_id) {
            fields.insert(name.to_string(), Value::from(seq.get()));
        }
        fields.insert(
            layout.created_at_field().to_string(),
            Value::String(encode_timestamp(&record.created_at)),
        );
        if let Some(name) = layout.image_field() {
            fields.insert(
                name.to_string(),
                record
                    .image_ref
                    .as_ref()
                    .map_or(Value::Null, |url| Value::String(url.clone())),
            );
        }
        WireDocument::new(record.id.clone(), fields)
    }

    /// Orders `records` by `key`, breaking ties on document id.
    #[must_use]
    pub fn sorted(&self, records: Vec<Record>, key: &SortKey) -> Vec<Record> {
        let mut keyed: Vec<(SortValue, Record)> = records
            .into_iter()
            .map(|r| (self.sort_value(&r, &key.field), r))
            .collect();
        keyed.sort_by(|(ka, ra), (kb, rb)| {
            let ord = ka.total_cmp(kb);
            let ord = match key.direction {
                SortDirection::Ascending => ord,
                SortDirection::Descending => ord.reverse(),
            };
            ord.then_with(|| ra.id.cmp(&rb.id))
        });
        keyed.into_iter().map(|(_, r)| r).collect()
    }

    fn sort_value(&self, record: &Record, field: &str) -> SortValue {
        let layout = self.layout;
        if layout.sequential_field() == Some(field) {
            return record
                .sequential_id
                .map_or(SortValue::Missing, |s| SortValue::Number(s.get() as f64));
        }
        if layout.created_at_field() == field {
            return SortValue::Timestamp(record.created_at);
        }
        if layout.image_field() == Some(field) {
            return record
                .image_ref
                .as_ref()
                .map_or(SortValue::Null, |url| SortValue::Text(url.clone()));
        }
        if let Some(value) = record.fields.get(field) {
            return SortValue::from_json(Some(&value.to_json()));
        }
        SortValue::from_json(record.extra.get(field))
    }
}

fn decode_timestamp(fields: &Map<String, Value>, name: &str) -> Result<DateTime<Utc>, DecodeError> {
    match fields.get(name) {
        None | Some(Value::Null) => Err(DecodeError::MissingField {
            field: name.to_string(),
        }),
        Some(Value::String(raw)) => DateTime::parse_from_rfc3339(raw)
            .map(|ts| ts.with_timezone(&Utc))
            .map_err(|_| DecodeError::InvalidTimestamp {
                field: name.to_string(),
                value: raw.clone(),
            }),
        Some(other) => Err(DecodeError::WrongKind {
            field: name.to_string(),
            expected: "timestamp",
            found: json_kind_name(other),
        }),
    }
}

fn decode_sequential_id(
    fields: &Map<String, Value>,
    name: &str,
) -> Result<Option<SequentialId>, DecodeError> {
    match fields.get(name) {
        None | Some(Value::Null) => Ok(None),
        Some(value @ (Value::Number(_) | Value::String(_))) => SequentialId::from_wire(value)
            .map(Some)
            .ok_or_else(|| DecodeError::InvalidSequentialId {
                field: name.to_string(),
                value: value.to_string(),
            }),
        Some(other) => Err(DecodeError::WrongKind {
            field: name.to_string(),
            expected: "integer",
            found: json_kind_name(other),
        }),
    }
}

fn decode_optional_text(
    fields: &Map<String, Value>,
    name: &str,
) -> Result<Option<String>, DecodeError> {
    match fields.get(name) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => Ok(Some(s.clone())),
        Some(other) => Err(DecodeError::WrongKind {
            field: name.to_string(),
            expected: "text",
            found: json_kind_name(other),
        }),
    }
}
