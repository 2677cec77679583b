// SPDX-License-Identifier: Apache-2.0

use chulha_model::BasicDetails;
use serde_json::{json, Value};

#[test]
fn cleaned_trims_address_and_drops_blank_contacts() {
    let details = BasicDetails {
        address: "  12 MG Road, Indore  ".to_string(),
        phones: vec!["+91 731 000 0000".to_string(), "   ".to_string(), String::new()],
        emails: vec![String::new(), "hello@sanjhachulha.com".to_string()],
        ..BasicDetails::default()
    };
    let cleaned = details.cleaned();
    assert_eq!(cleaned.address, "12 MG Road, Indore");
    assert_eq!(cleaned.phones, vec!["+91 731 000 0000".to_string()]);
    assert_eq!(cleaned.emails, vec!["hello@sanjhachulha.com".to_string()]);
}

#[test]
fn wire_fields_use_camel_case_and_keep_unknown_keys() {
    let raw = json!({
        "address": "12 MG Road",
        "phones": ["1"],
        "emails": [],
        "isInstagramEnabled": true,
        "instagramUrl": "https://instagram.com/sanjhachulha",
        "monFriOpen": "11:00",
        "deliveryPartner": {"name": "x"}
    });
    let fields = match raw {
        Value::Object(map) => map,
        _ => unreachable!("object literal"),
    };
    let details = BasicDetails::from_fields(fields.clone()).expect("decode details");
    assert!(details.is_instagram_enabled);
    assert_eq!(details.mon_fri_open, "11:00");
    assert!(details.extra.contains_key("deliveryPartner"));

    let back = details.to_fields().expect("encode details");
    assert_eq!(back.get("deliveryPartner"), fields.get("deliveryPartner"));
    assert_eq!(back.get("isFacebookEnabled"), Some(&json!(false)));
}

#[test]
fn missing_keys_default_to_empty_values() {
    let details = BasicDetails::from_fields(serde_json::Map::new()).expect("decode empty");
    assert_eq!(details, BasicDetails::default());
}
