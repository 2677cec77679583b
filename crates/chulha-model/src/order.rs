// SPDX-License-Identifier: Apache-2.0

use chrono::{DateTime, Utc};
use serde_json::Value;
use std::cmp::Ordering;

/// Comparable projection of one field used for collection ordering.
///
/// Values of different kinds order by kind: missing, null, bool, number,
/// text, timestamp, then anything structured.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum SortValue {
    Missing,
    Null,
    Bool(bool),
    Number(f64),
    Text(String),
    Timestamp(DateTime<Utc>),
    Structured(String),
}

impl SortValue {
    fn rank(&self) -> u8 {
        match self {
            Self::Missing => 0,
            Self::Null => 1,
            Self::Bool(_) => 2,
            Self::Number(_) => 3,
            Self::Text(_) => 4,
            Self::Timestamp(_) => 5,
            Self::Structured(_) => 6,
        }
    }

    pub(crate) fn from_json(value: Option<&Value>) -> Self {
        match value {
            None => Self::Missing,
            Some(Value::Null) => Self::Null,
            Some(Value::Bool(b)) => Self::Bool(*b),
            Some(Value::Number(n)) => n.as_f64().map_or(Self::Null, Self::Number),
            Some(Value::String(s)) => Self::Text(s.clone()),
            Some(other) => Self::Structured(other.to_string()),
        }
    }

    pub(crate) fn total_cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Self::Bool(a), Self::Bool(b)) => a.cmp(b),
            (Self::Number(a), Self::Number(b)) => a.total_cmp(b),
            (Self::Text(a), Self::Text(b)) | (Self::Structured(a), Self::Structured(b)) => {
                a.cmp(b)
            }
            (Self::Timestamp(a), Self::Timestamp(b)) => a.cmp(b),
            _ => self.rank().cmp(&other.rank()),
        }
    }
}

/// Total order over raw wire values, as used by backends for `query_max`
/// and snapshot ordering.
///
/// Any text value ranks above every number. A sequential-id field that mixes
/// `10` with `"3"` therefore reports `"3"` as its maximum, and read-max
/// allocation hands out `4` again. Records written here always store the id
/// as an integer; text ids only arrive from outside writers.
#[must_use]
pub fn compare_json_values(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    SortValue::from_json(a).total_cmp(&SortValue::from_json(b))
}
