//! Minimal structural schema checks.

use serde_json::Value;

/// Outcome of [`validate_schema`].
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ValidationResult {
    pub valid: bool,
    /// One entry per violated constraint; empty when `valid`.
    pub errors: Vec<String>,
}

/// Checks `data` against a JSON-Schema-shaped `schema`.
///
/// Only these keywords are understood; everything else is ignored:
///
/// | Keyword | Meaning |
/// |---------|---------|
/// | `type` | one of `object`, `array`, `string`, `number`, `integer`, `boolean`, `null`, or a list of them |
/// | `required` | property names that must be present on an object |
/// | `properties` | per-property sub-schemas, checked when the property is present |
/// | `items` | sub-schema applied to every array element |
///
/// A type mismatch stops the descent into that value. All other violations
/// are collected.
///
/// ```rust
/// use conciergus_framework::utils::validate_schema;
/// use serde_json::json;
///
/// let schema = json!({"type": "object", "required": ["name"]});
/// let result = validate_schema(&json!({}), &schema);
/// assert!(!result.valid);
/// assert_eq!(result.errors, vec!["$: missing required property `name`"]);
/// ```
pub fn validate_schema(data: &Value, schema: &Value) -> ValidationResult {
    let mut errors = Vec::new();
    check(data, schema, "$", &mut errors);
    ValidationResult {
        valid: errors.is_empty(),
        errors,
    }
}

fn check(data: &Value, schema: &Value, path: &str, errors: &mut Vec<String>) {
    if let Some(expected) = schema.get("type") {
        let allowed: Vec<&str> = match expected {
            Value::String(t) => vec![t.as_str()],
            Value::Array(ts) => ts.iter().filter_map(Value::as_str).collect(),
            _ => Vec::new(),
        };
        if !allowed.is_empty() && !allowed.iter().any(|t| matches_type(data, t)) {
            errors.push(format!(
                "{path}: expected {}, got {}",
                allowed.join(" | "),
                type_name(data)
            ));
            return;
        }
    }

    if let Value::Object(object) = data {
        if let Some(Value::Array(required)) = schema.get("required") {
            for name in required.iter().filter_map(Value::as_str) {
                if !object.contains_key(name) {
                    errors.push(format!("{path}: missing required property `{name}`"));
                }
            }
        }
        if let Some(Value::Object(properties)) = schema.get("properties") {
            for (name, sub_schema) in properties {
                if let Some(value) = object.get(name) {
                    check(value, sub_schema, &format!("{path}.{name}"), errors);
                }
            }
        }
    }

    if let (Value::Array(items), Some(item_schema)) = (data, schema.get("items")) {
        for (i, item) in items.iter().enumerate() {
            check(item, item_schema, &format!("{path}[{i}]"), errors);
        }
    }
}

fn matches_type(data: &Value, expected: &str) -> bool {
    match expected {
        "object" => data.is_object(),
        "array" => data.is_array(),
        "string" => data.is_string(),
        "number" => data.is_number(),
        "integer" => data.is_i64() || data.is_u64(),
        "boolean" => data.is_boolean(),
        "null" => data.is_null(),
        _ => true,
    }
}

fn type_name(data: &Value) -> &'static str {
    match data {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
