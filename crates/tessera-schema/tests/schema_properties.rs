//! Schema behaviour across leaves, walks and composition.
//!
//! Covers the documented request scenarios plus properties that must hold for
//! every input:
//!
//! 1. Optional absent keys resolve to `null`, required absent keys to a
//!    missing-field error with the dotted path
//! 2. A unit executed twice runs its handler once
//! 3. Conflicting fragment tags fail in any order

use proptest::prelude::*;
use serde_json::{json, Value};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tessera_core::ErrorKind;
use tessera_schema::leaf::{self, UuidConfig};
use tessera_schema::{
    merge_fragments, merge_header_schemas, Fragment, HeaderSchema, Schema, SharedValidator,
    ValidationUnit,
};

fn block_on<F: std::future::Future>(future: F) -> F::Output {
    tokio::runtime::Builder::new_current_thread()
        .build()
        .unwrap()
        .block_on(future)
}

fn leaf_for(index: usize) -> SharedValidator {
    match index % 5 {
        0 => leaf::string(),
        1 => leaf::number(),
        2 => leaf::boolean(),
        3 => leaf::uuid(),
        _ => leaf::array(leaf::string()),
    }
}

// ============================================================================
// Scenarios
// ============================================================================

#[tokio::test]
async fn scenario_optional_age_absent() {
    let schema = Schema::new()
        .field("name", leaf::string())
        .field("age", leaf::optional(leaf::number()));

    let validated = schema.validate(&json!({"name": "Ada"})).await.unwrap();
    assert_eq!(validated.data(), &json!({"name": "Ada", "age": null}));
}

#[tokio::test]
async fn scenario_invalid_number() {
    let schema = Schema::new().field("age", leaf::number());
    let error = schema.validate(&json!({"age": "abc"})).await.unwrap_err();
    assert_eq!(error.message(), "Invalid number");
    assert_eq!(error.status_code(), http::StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn scenario_array_aborts_without_partial_result() {
    let schema = Schema::new().field("flags", leaf::array(leaf::boolean()));
    let error = schema
        .validate(&json!({"flags": [true, "nope"]}))
        .await
        .unwrap_err();
    assert_eq!(error.message(), "Invalid boolean");
}

#[tokio::test]
async fn scenario_uuid_created_when_invalid() {
    let schema = Schema::new().field(
        "id",
        leaf::uuid_with(UuidConfig::default().create_new_if_invalid(true)),
    );
    let validated = schema.validate(&json!({"id": "not-a-uuid"})).await.unwrap();

    let id = validated.data()["id"].as_str().unwrap();
    let parsed = uuid::Uuid::parse_str(id).unwrap();
    assert_eq!(parsed.get_version_num(), 4);
}

#[tokio::test]
async fn enum_matches_query_string_forms() {
    let schema = Schema::new()
        .field("page", leaf::one_of([1, 2, 3]))
        .field("sort", leaf::one_of(["asc", "desc"]));

    let validated = schema
        .validate(&json!({"page": "2", "sort": "desc"}))
        .await
        .unwrap();
    assert_eq!(validated.data(), &json!({"page": 2, "sort": "desc"}));

    let error = schema
        .validate(&json!({"page": [1], "sort": "asc"}))
        .await
        .unwrap_err();
    assert_eq!(error.kind(), ErrorKind::InvalidInput);
}

#[tokio::test]
async fn composed_schema_validates_every_contributor() {
    let merged = merge_fragments(&[
        Fragment::new(
            "auth",
            Schema::new().field("session", leaf::custom(|raw| Ok(json!({"sid": raw})))),
        ),
        Fragment::new(
            "route",
            Schema::new()
                .field("name", leaf::string())
                .field("session", leaf::custom(Ok)),
        ),
    ])
    .unwrap();

    let validated = merged
        .validate(&json!({"name": "Ada", "session": "s-1"}))
        .await
        .unwrap();
    assert_eq!(
        validated.custom_for("auth").unwrap()["session"],
        json!({"sid": "s-1"})
    );
    assert_eq!(validated.data()["session"], "s-1");
}

#[test]
fn header_merge_is_or() {
    let merged = merge_header_schemas(&[
        [("a", true)].into_iter().collect(),
        [("a", false)].into_iter().collect(),
    ]);
    assert_eq!(merged, HeaderSchema::new().required("a"));
}

// ============================================================================
// Properties
// ============================================================================

proptest! {
    #[test]
    fn absence_is_missing_field_unless_optional(
        keys in proptest::collection::vec("[a-z]{1,6}", 1..4),
        optional in any::<bool>(),
    ) {
        let target = if optional { leaf::optional(leaf::string()) } else { leaf::string() };
        let mut schema = Schema::new().field("present", leaf::string());
        let mut nested = Schema::new().field("target", target);
        for key in keys.iter().rev() {
            nested = Schema::new().field(key.clone(), nested);
        }
        schema = schema.field("root", nested);

        let result = block_on(schema.validate(&json!({"present": "x"})));
        if optional {
            let validated = result.unwrap();
            let mut cursor = &validated.data()["root"];
            for key in &keys {
                cursor = &cursor[key.as_str()];
            }
            prop_assert_eq!(&cursor["target"], &Value::Null);
        } else {
            let error = result.unwrap_err();
            let expected = format!("root.{}.target", keys.join("."));
            prop_assert_eq!(error.kind(), ErrorKind::MissingField);
            prop_assert_eq!(error.data()["path"].as_str(), Some(expected.as_str()));
        }
    }

    #[test]
    fn execute_twice_runs_handler_once(raw in "[0-9]{1,8}|[a-z]{1,8}") {
        let calls = Arc::new(AtomicUsize::new(0));
        let counted = {
            let calls = Arc::clone(&calls);
            leaf::custom(move |value| {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok(value)
            })
        };

        let mut unit = ValidationUnit::new(counted, json!(raw));
        let first = block_on(unit.execute());
        let second = block_on(unit.execute());

        prop_assert_eq!(calls.load(Ordering::SeqCst), 1);
        prop_assert_eq!(first, second);
    }

    #[test]
    fn mismatched_tags_fail_in_any_order(left in 0usize..5, offset in 1usize..5, swap in any::<bool>()) {
        let a = Fragment::new("a", Schema::new().field("k", leaf_for(left)));
        let b = Fragment::new("b", Schema::new().field("k", leaf_for(left + offset)));
        let fragments = if swap { [b, a] } else { [a, b] };

        let error = merge_fragments(&fragments).unwrap_err();
        prop_assert_eq!(error.kind(), ErrorKind::SchemaComposition);
    }
}
