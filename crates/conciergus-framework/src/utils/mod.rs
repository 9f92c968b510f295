//! Stateless helpers available to every plugin.
//!
//! The free functions are the implementation; [`PluginUtils`] is the handle
//! placed in each [`PluginContext`](crate::PluginContext) so plugin code can
//! reach them without extra imports.

mod schema;
mod timing;

pub use schema::{ValidationResult, validate_schema};
pub use timing::{Debounced, Throttled, debounce, throttle};

use std::future::Future;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use serde_json::{Map, Value};
use uuid::Uuid;

/// Milliseconds since the Unix epoch (0 if the clock is before it).
pub fn now_millis() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |d| i64::try_from(d.as_millis()).unwrap_or(i64::MAX))
}

/// Generates a short id: base-36 milliseconds, `-`, nine random hex digits.
///
/// Unique enough for message and listener ids; not suitable as a secret.
pub fn generate_id() -> String {
    let random = Uuid::new_v4().simple().to_string();
    format!("{}-{}", to_base36(now_millis().unsigned_abs()), &random[..9])
}

fn to_base36(mut n: u64) -> String {
    const DIGITS: &[u8; 36] = b"0123456789abcdefghijklmnopqrstuvwxyz";
    if n == 0 {
        return "0".to_string();
    }
    let mut out = Vec::new();
    while n > 0 {
        out.push(DIGITS[(n % 36) as usize]);
        n /= 36;
    }
    out.reverse();
    String::from_utf8(out).unwrap_or_default()
}

/// Recursively copies a JSON value.
///
/// `Value` is a tree, so there are no cycles to handle; timestamps are
/// represented as numbers or strings and copy like any other scalar.
pub fn deep_clone(value: &Value) -> Value {
    value.clone()
}

/// Recursively merges JSON objects; later sources win.
///
/// Objects merge key by key. Any other value, arrays included, replaces
/// what was there.
///
/// ```rust
/// use conciergus_framework::utils::merge;
/// use serde_json::json;
///
/// let merged = merge([
///     &json!({"a": {"x": 1, "y": 2}, "list": [1, 2]}),
///     &json!({"a": {"y": 3}, "list": [9]}),
/// ]);
/// assert_eq!(merged, json!({"a": {"x": 1, "y": 3}, "list": [9]}));
/// ```
pub fn merge<'a, I>(sources: I) -> Value
where
    I: IntoIterator<Item = &'a Value>,
{
    let mut target = Value::Object(Map::new());
    for source in sources {
        merge_into(&mut target, source);
    }
    target
}

fn merge_into(target: &mut Value, source: &Value) {
    match (target, source) {
        (Value::Object(dst), Value::Object(src)) => {
            for (key, value) in src {
                match dst.get_mut(key) {
                    Some(existing) if existing.is_object() && value.is_object() => {
                        merge_into(existing, value);
                    }
                    _ => {
                        dst.insert(key.clone(), value.clone());
                    }
                }
            }
        }
        (target, source) => *target = source.clone(),
    }
}

/// Handle to the helper library, carried by every plugin context.
#[derive(Debug, Clone, Copy, Default)]
pub struct PluginUtils;

impl PluginUtils {
    pub fn generate_id(&self) -> String {
        generate_id()
    }

    pub fn deep_clone(&self, value: &Value) -> Value {
        deep_clone(value)
    }

    pub fn merge<'a, I>(&self, sources: I) -> Value
    where
        I: IntoIterator<Item = &'a Value>,
    {
        merge(sources)
    }

    pub fn validate_schema(&self, data: &Value, schema: &Value) -> ValidationResult {
        validate_schema(data, schema)
    }

    pub fn debounce<A, F, Fut>(&self, delay: Duration, f: F) -> Debounced<A>
    where
        A: Send + 'static,
        F: Fn(A) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        debounce(delay, f)
    }

    pub fn throttle<A, F>(&self, interval: Duration, f: F) -> Throttled<A>
    where
        F: Fn(A) + Send + Sync + 'static,
    {
        throttle(interval, f)
    }
}
