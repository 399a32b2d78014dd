use std::collections::{HashMap, HashSet};

use serde_json::Value;

// ═══════════════════════════════════════════════════════════════
//  Detached children ↔ inline graph
// ═══════════════════════════════════════════════════════════════

const REFERENCE_TYPE: &str = "reference";
const CLOSURE_KEY: &str = "__closure";

fn reference_target(value: &Value) -> Option<&str> {
    let map = value.as_object()?;
    let kind = map.get("speckle_type")?.as_str()?;
    if kind != REFERENCE_TYPE {
        return None;
    }
    map.get("referencedId")?.as_str()
}

/// Replace every `{"speckle_type": "reference", "referencedId": X}` with
/// the data of child `X`, recursively. Unknown ids stay as references;
/// cycles are broken by leaving the repeated reference in place.
pub fn inline_references(root: Value, children: &HashMap<String, Value>) -> Value {
    let mut path = HashSet::new();
    inline(root, children, &mut path)
}

fn inline(value: Value, children: &HashMap<String, Value>, path: &mut HashSet<String>) -> Value {
    if let Some(target) = reference_target(&value).map(str::to_string) {
        let Some(child) = children.get(&target) else {
            return value;
        };
        if !path.insert(target.clone()) {
            return value;
        }
        let resolved = inline(child.clone(), children, path);
        path.remove(&target);
        return resolved;
    }

    match value {
        Value::Object(map) => Value::Object(
            map.into_iter()
                .filter(|(k, _)| k != CLOSURE_KEY)
                .map(|(k, v)| (k, inline(v, children, path)))
                .collect(),
        ),
        Value::Array(items) => Value::Array(
            items.into_iter().map(|v| inline(v, children, path)).collect(),
        ),
        other => other,
    }
}

/// Prepare an edited graph for `objectCreate`: drop the root `id` (the
/// server assigns a fresh content id) and any leftover closure tables.
pub fn detach_for_send(payload: &Value) -> Value {
    let mut out = strip_closures(payload.clone());
    if let Value::Object(map) = &mut out {
        map.remove("id");
    }
    out
}

fn strip_closures(value: Value) -> Value {
    match value {
        Value::Object(map) => Value::Object(
            map.into_iter()
                .filter(|(k, _)| k != CLOSURE_KEY)
                .map(|(k, v)| (k, strip_closures(v)))
                .collect(),
        ),
        Value::Array(items) => Value::Array(items.into_iter().map(strip_closures).collect()),
        other => other,
    }
}
