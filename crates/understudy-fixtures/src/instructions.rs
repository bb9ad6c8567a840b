// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Clip instruction factory.

use chrono::Duration;
use serde_json::{json, Map, Value};

/// Valid instructions for a trip ten days from the current (possibly virtual) time.
pub fn default_clip_instructions() -> Value {
    let start = understudy::clock::now() + Duration::days(10);
    json!({
        "creator": {"email": "yoni@testjavascript.com", "name": "Yoni"},
        "destination": "Mexico",
        "slogan": "Where the sun meets the sea",
        "startDate": start.to_rfc3339(),
        "photos": ["beach.jpg", "market.jpg", "pyramid.jpg"],
        "music": "mariachi",
    })
}

/// Default instructions with top-level keys replaced by `overrides`.
///
/// A `null` override removes the key.
pub fn clip_instructions(overrides: Value) -> Value {
    let mut base = match default_clip_instructions() {
        Value::Object(m) => m,
        _ => Map::new(),
    };
    if let Value::Object(o) = overrides {
        for (k, v) in o {
            if v.is_null() {
                base.remove(&k);
            } else {
                base.insert(k, v);
            }
        }
    }
    Value::Object(base)
}
