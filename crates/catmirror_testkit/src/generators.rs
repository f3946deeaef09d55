//! Property-based generators for remote records and parts payloads.

use catmirror_model::{RemoteElevation, RemoteId, RemoteProject};
use chrono::{DateTime, TimeZone, Utc};
use proptest::prelude::*;
use serde_json::json;

/// Strategy for remote identifiers.
pub fn remote_id_strategy() -> impl Strategy<Value = RemoteId> {
    prop::string::string_regex("[a-f0-9]{8}-[a-f0-9]{4}")
        .expect("valid identifier regex")
        .prop_map(RemoteId::new)
}

/// Strategy for optional remote change markers within a sane range.
pub fn changed_at_strategy() -> impl Strategy<Value = Option<DateTime<Utc>>> {
    prop::option::of((0i64..=86_400 * 365).prop_map(|offset| {
        Utc.timestamp_opt(1_767_225_600 + offset, 0)
            .single()
            .expect("valid generated timestamp")
    }))
}

/// Strategy for remote project records.
pub fn remote_project_strategy() -> impl Strategy<Value = RemoteProject> {
    (
        remote_id_strategy(),
        "[A-Za-z ]{1,24}",
        prop::sample::select(vec!["open", "closed", "archived"]),
        changed_at_strategy(),
    )
        .prop_map(|(id, name, status, changed_at)| RemoteProject {
            id,
            name,
            status: status.into(),
            changed_at,
        })
}

/// Strategy for well-formed parts payloads.
pub fn valid_parts_strategy() -> impl Strategy<Value = serde_json::Value> {
    prop::collection::vec(
        (
            "[A-Z]-[0-9]{3}",
            1u64..50,
            prop::option::of((100.0f64..3000.0, 100.0f64..3000.0)),
        ),
        0..8,
    )
    .prop_map(|rows| {
        serde_json::Value::Array(
            rows.into_iter()
                .map(|(article, quantity, glass)| match glass {
                    Some((width, height)) => json!({
                        "article": article,
                        "quantity": quantity,
                        "glass": { "width_mm": width, "height_mm": height },
                    }),
                    None => json!({ "article": article, "quantity": quantity }),
                })
                .collect(),
        )
    })
}

/// Strategy for remote elevation records carrying a valid payload or none.
pub fn remote_elevation_strategy() -> impl Strategy<Value = RemoteElevation> {
    (
        remote_id_strategy(),
        "[A-Za-z ]{1,24}",
        changed_at_strategy(),
        prop::option::of(valid_parts_strategy()),
    )
        .prop_map(|(id, name, changed_at, parts)| RemoteElevation {
            id,
            name,
            width_mm: Some(2400.0),
            height_mm: Some(2100.0),
            description: None,
            changed_at,
            parts,
        })
}
