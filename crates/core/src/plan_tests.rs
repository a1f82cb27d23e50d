// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[test]
fn uid_is_32_lowercase_hex_chars() {
    let uid = PlanUid::new();
    assert_eq!(uid.as_str().len(), 32);
    assert!(uid.as_str().chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
}

#[test]
fn uids_are_unique() {
    let a = PlanUid::new();
    let b = PlanUid::new();
    assert_ne!(a, b);
}

#[test]
fn uid_serde_is_transparent() {
    let uid = PlanUid::from_string("abc123");
    let json = serde_json::to_string(&uid).unwrap();
    assert_eq!(json, "\"abc123\"");
    let parsed: PlanUid = serde_json::from_str(&json).unwrap();
    assert_eq!(parsed, uid);
}

#[test]
fn spec_into_item_assigns_uid_and_timestamp() {
    let mut spec = PlanSpec::new("count");
    spec.args.push(serde_json::json!(["det1", "det2"]));
    spec.kwargs.insert("num".to_string(), serde_json::json!(5));

    let uid = PlanUid::new();
    let item = spec.into_item(uid.clone(), 1234);

    assert_eq!(item.plan_uid, uid);
    assert_eq!(item.name, "count");
    assert_eq!(item.added_at_epoch_ms, 1234);
    assert_eq!(item.kwargs["num"], serde_json::json!(5));
}

#[test]
fn item_wire_format_omits_empty_meta() {
    let item = PlanSpec::new("count").into_item(PlanUid::from_string("u1"), 0);
    let json = serde_json::to_value(&item).unwrap();
    assert_eq!(json["plan_uid"], "u1");
    assert_eq!(json["name"], "count");
    assert!(json.get("meta").is_none());
}

#[test]
fn item_deserializes_with_missing_optional_fields() {
    let item: PlanItem =
        serde_json::from_str(r#"{"plan_uid": "u1", "name": "count"}"#).unwrap();
    assert!(item.args.is_empty());
    assert!(item.kwargs.is_empty());
    assert_eq!(item.added_at_epoch_ms, 0);
}

#[test]
fn kwargs_preserve_insertion_order() {
    let mut spec = PlanSpec::new("scan");
    for key in ["zeta", "alpha", "mid"] {
        spec.kwargs.insert(key.to_string(), serde_json::json!(1));
    }
    let item = spec.into_item(PlanUid::new(), 0);
    let json = serde_json::to_string(&item).unwrap();
    let zeta = json.find("zeta").unwrap();
    let alpha = json.find("alpha").unwrap();
    assert!(zeta < alpha);
}
