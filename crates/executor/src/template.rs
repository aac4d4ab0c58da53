//! `{{ variable.x }}` / `{{ const.x }}` interpolation.
//!
//! Runs immediately before a node executes, so values seeded by earlier
//! levels are visible. Every string inside the node's configuration is
//! rewritten, recursively through arrays and nested objects; unknown
//! names leave the placeholder untouched.

use std::sync::LazyLock;

use lattice_workflow::NodeData;
use regex::{Captures, Regex};
use serde_json::Value;

use crate::context::ExecutionContext;

static PLACEHOLDER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\{\{\s*(variable|const)\.([A-Za-z0-9_][A-Za-z0-9_.\-]*)\s*\}\}")
        .expect("placeholder pattern is valid")
});

/// Interpolate every string field of `data` against the context.
#[must_use]
pub fn interpolate_data(data: &NodeData, ctx: &ExecutionContext) -> NodeData {
    let mut out = serde_json::Map::with_capacity(data.0.len());
    for (key, value) in &data.0 {
        out.insert(key.clone(), interpolate_value(value, ctx));
    }
    NodeData(out)
}

/// Interpolate one value, recursing into arrays and objects.
#[must_use]
pub fn interpolate_value(value: &Value, ctx: &ExecutionContext) -> Value {
    match value {
        Value::String(s) => Value::String(interpolate_str(s, ctx)),
        Value::Array(items) => {
            Value::Array(items.iter().map(|v| interpolate_value(v, ctx)).collect())
        }
        Value::Object(map) => Value::Object(
            map.iter()
                .map(|(k, v)| (k.clone(), interpolate_value(v, ctx)))
                .collect(),
        ),
        other => other.clone(),
    }
}

fn interpolate_str(input: &str, ctx: &ExecutionContext) -> String {
    PLACEHOLDER
        .replace_all(input, |caps: &Captures<'_>| {
            match ctx.template_value(&caps[1], &caps[2]) {
                Some(value) => render(&value),
                // Unknown name: keep the placeholder verbatim.
                None => caps[0].to_owned(),
            }
        })
        .into_owned()
}

/// Stringify a context value for substitution: strings verbatim,
/// everything else as JSON text.
fn render(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
