// SPDX-License-Identifier: Apache-2.0

//! Collections the admin console manages.

use crate::codec::DecodeError;
use crate::ids::{CollectionRef, ValidationError};
use crate::record::{
    CollectionSpec, FieldSpec, Record, RecordLayout, SortKey, DEFAULT_CREATED_AT_FIELD,
};
use crate::value::FieldKind;
use std::fmt::{Display, Formatter};

pub const STAFF_COLLECTION: &str = "Staff";
pub const STAFF_ID: &str = "staffId";
pub const STAFF_NAME: &str = "staffName";
pub const STAFF_DESIGNATION: &str = "staffDesignation";
pub const STAFF_DESCRIPTION: &str = "staffDescription";
pub const STAFF_IMAGE: &str = "staffImage";

pub const MENU_COLLECTION: &str = "menu";
pub const MENU_ID: &str = "menuId";
pub const MENU_NAME: &str = "name";
pub const MENU_CATEGORY: &str = "category";
pub const MENU_PRICE: &str = "price";
pub const MENU_TYPE: &str = "type";
pub const MENU_IMAGE: &str = "menuImage";

pub const RESERVATIONS_COLLECTION: &str = "reservations";
pub const RESERVATION_NAME: &str = "name";
pub const RESERVATION_DATE: &str = "date";
pub const RESERVATION_TIME: &str = "time";
pub const RESERVATION_GUESTS: &str = "guests";
pub const RESERVATION_STATUS: &str = "status";

pub fn staff() -> Result<CollectionSpec, ValidationError> {
    CollectionSpec::new(
        CollectionRef::parse(STAFF_COLLECTION)?,
        RecordLayout::new()
            .with_sequential_field(STAFF_ID)
            .with_image_field(STAFF_IMAGE)
            .with_field(FieldSpec::required(STAFF_NAME, FieldKind::Text))
            .with_field(FieldSpec::required(STAFF_DESIGNATION, FieldKind::Text))
            .with_field(FieldSpec::required(STAFF_DESCRIPTION, FieldKind::Text)),
        SortKey::ascending(STAFF_ID),
    )
}

pub fn menu() -> Result<CollectionSpec, ValidationError> {
    CollectionSpec::new(
        CollectionRef::parse(MENU_COLLECTION)?,
        RecordLayout::new()
            .with_sequential_field(MENU_ID)
            .with_image_field(MENU_IMAGE)
            .with_field(FieldSpec::required(MENU_NAME, FieldKind::Text))
            .with_field(FieldSpec::required(MENU_CATEGORY, FieldKind::Text))
            .with_field(FieldSpec::required(MENU_PRICE, FieldKind::Text))
            .with_field(FieldSpec::required(MENU_TYPE, FieldKind::Text)),
        SortKey::ascending(MENU_ID),
    )
}

pub fn reservations() -> Result<CollectionSpec, ValidationError> {
    CollectionSpec::new(
        CollectionRef::parse(RESERVATIONS_COLLECTION)?,
        RecordLayout::new()
            .with_field(FieldSpec::required(RESERVATION_NAME, FieldKind::Text))
            .with_field(FieldSpec::required(RESERVATION_DATE, FieldKind::Text))
            .with_field(FieldSpec::required(RESERVATION_TIME, FieldKind::Text))
            .with_field(FieldSpec::required(RESERVATION_GUESTS, FieldKind::Integer))
            .with_field(FieldSpec::required(RESERVATION_STATUS, FieldKind::Text)),
        SortKey::ascending(DEFAULT_CREATED_AT_FIELD),
    )
}

/// Lifecycle of a booking. Only a pending booking can change, and only to
/// confirmed or cancelled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReservationStatus {
    Pending,
    Confirmed,
    Cancelled,
}

impl ReservationStatus {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "Pending",
            Self::Confirmed => "Confirmed",
            Self::Cancelled => "Cancelled",
        }
    }

    /// Case-insensitive parse of a stored or typed status.
    pub fn parse(raw: &str) -> Result<Self, DecodeError> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "pending" => Ok(Self::Pending),
            "confirmed" => Ok(Self::Confirmed),
            "cancelled" => Ok(Self::Cancelled),
            _ => Err(DecodeError::InvalidValue {
                field: RESERVATION_STATUS.to_string(),
                value: raw.to_string(),
            }),
        }
    }

    #[must_use]
    pub fn can_become(self, target: Self) -> bool {
        self == Self::Pending && matches!(target, Self::Confirmed | Self::Cancelled)
    }
}

impl Display for ReservationStatus {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Fields a free-text search looks at for `collection`.
#[must_use]
pub fn search_fields(collection: &CollectionRef) -> &'static [&'static str] {
    match collection.as_str() {
        MENU_COLLECTION => &[MENU_NAME, MENU_CATEGORY],
        STAFF_COLLECTION => &[STAFF_NAME, STAFF_DESIGNATION],
        RESERVATIONS_COLLECTION => &[RESERVATION_NAME],
        _ => &[],
    }
}

/// Case-insensitive substring match of `query` against the search fields of
/// `spec`. A blank query matches every record.
#[must_use]
pub fn matches_search(spec: &CollectionSpec, record: &Record, query: &str) -> bool {
    let needle = query.trim().to_lowercase();
    if needle.is_empty() {
        return true;
    }
    search_fields(spec.reference())
        .iter()
        .filter_map(|field| record.text(field))
        .any(|text| text.to_lowercase().contains(&needle))
}

/// Looks a built-in collection up by name, case-insensitively.
pub fn by_name(name: &str) -> Result<Option<CollectionSpec>, ValidationError> {
    match name.trim().to_ascii_lowercase().as_str() {
        "staff" => staff().map(Some),
        "menu" => menu().map(Some),
        "reservations" => reservations().map(Some),
        _ => Ok(None),
    }
}
