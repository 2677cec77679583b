// SPDX-License-Identifier: Apache-2.0

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

pub const BASIC_DETAILS_COLLECTION: &str = "basic_details";
pub const BASIC_DETAILS_DOCUMENT: &str = "info";

/// Business contact and opening-hours document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BasicDetails {
    pub address: String,
    pub phones: Vec<String>,
    pub emails: Vec<String>,
    pub is_instagram_enabled: bool,
    pub instagram_url: String,
    pub is_facebook_enabled: bool,
    pub facebook_url: String,
    pub is_twitter_enabled: bool,
    pub twitter_url: String,
    pub mon_fri_open: String,
    pub mon_fri_close: String,
    pub sat_sun_open: String,
    pub sat_sun_close: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl BasicDetails {
    /// Copy ready for persistence: trimmed address, blank phones and emails dropped.
    #[must_use]
    pub fn cleaned(&self) -> Self {
        let keep = |items: &[String]| {
            items
                .iter()
                .filter(|s| !s.trim().is_empty())
                .cloned()
                .collect::<Vec<_>>()
        };
        Self {
            address: self.address.trim().to_string(),
            phones: keep(&self.phones),
            emails: keep(&self.emails),
            ..self.clone()
        }
    }

    pub fn from_fields(fields: Map<String, Value>) -> Result<Self, serde_json::Error> {
        serde_json::from_value(Value::Object(fields))
    }

    pub fn to_fields(&self) -> Result<Map<String, Value>, serde_json::Error> {
        match serde_json::to_value(self)? {
            Value::Object(map) => Ok(map),
            _ => Ok(Map::new()),
        }
    }
}
