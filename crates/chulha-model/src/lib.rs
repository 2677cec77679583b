// SPDX-License-Identifier: Apache-2.0

#![forbid(unsafe_code)]
//! Typed records for the admin store and the codec that maps them to and
//! from schemaless backing-store documents.

mod codec;
pub mod collections;
mod details;
mod ids;
mod order;
mod record;
mod value;

pub use codec::{encode_timestamp, DecodeError, RecordCodec};
pub use details::{BasicDetails, BASIC_DETAILS_COLLECTION, BASIC_DETAILS_DOCUMENT};
pub use ids::{
    CollectionRef, DocumentId, SequentialId, ValidationError, COLLECTION_REF_MAX_LEN,
    DOCUMENT_ID_MAX_LEN,
};
pub use order::compare_json_values;
pub use record::{
    CollectionSpec, FieldSpec, Record, RecordLayout, SortDirection, SortKey, WireDocument,
    DEFAULT_CREATED_AT_FIELD,
};
pub use value::{json_kind_name, FieldKind, FieldValue};

pub const CRATE_NAME: &str = "chulha-model";
