//! JSON <-> JavaScript value conversion.

use rquickjs::{Array, Ctx, IntoJs, Object, Value};

pub(crate) fn json_to_js<'js>(
    ctx: &Ctx<'js>,
    value: &serde_json::Value,
) -> rquickjs::Result<Value<'js>> {
    match value {
        serde_json::Value::Null => Ok(Value::new_null(ctx.clone())),
        serde_json::Value::Bool(b) => Ok(Value::new_bool(ctx.clone(), *b)),
        serde_json::Value::Number(n) => match n.as_i64().and_then(|i| i32::try_from(i).ok()) {
            Some(i) => Ok(Value::new_int(ctx.clone(), i)),
            // Timestamps and other wide integers don't fit an SMI.
            None => Ok(Value::new_float(ctx.clone(), n.as_f64().unwrap_or(f64::NAN))),
        },
        serde_json::Value::String(s) => s.as_str().into_js(ctx),
        serde_json::Value::Array(items) => {
            let array = Array::new(ctx.clone())?;
            for (i, item) in items.iter().enumerate() {
                array.set(i, json_to_js(ctx, item)?)?;
            }
            Ok(array.into_value())
        },
        serde_json::Value::Object(map) => {
            let object = Object::new(ctx.clone())?;
            for (key, item) in map {
                object.set(key.as_str(), json_to_js(ctx, item)?)?;
            }
            Ok(object.into_value())
        },
    }
}

/// Values nested deeper than this convert to `null`.
const MAX_DEPTH: usize = 64;
/// Upper bound on objects and arrays visited by one conversion.
const MAX_NODES: usize = 100_000;

/// Lossy conversion back to JSON. Functions, symbols and `undefined` become
/// `null`; non-finite floats become `null`. A reference back to an enclosing
/// object, or anything past the depth or size limits, also becomes `null`.
pub(crate) fn js_to_json(value: &Value<'_>) -> serde_json::Value {
    Walk::default().convert(value)
}

#[derive(Default)]
struct Walk<'js> {
    parents: Vec<Value<'js>>,
    visited: usize,
}

impl<'js> Walk<'js> {
    fn convert(&mut self, value: &Value<'js>) -> serde_json::Value {
        if value.is_null() || value.is_undefined() || value.is_function() {
            return serde_json::Value::Null;
        }
        if let Some(b) = value.as_bool() {
            return serde_json::Value::Bool(b);
        }
        if let Some(i) = value.as_int() {
            return serde_json::Value::from(i);
        }
        if let Some(f) = value.as_float() {
            return float_to_json(f);
        }
        if let Some(s) = value.as_string() {
            return s
                .to_string()
                .map_or(serde_json::Value::Null, serde_json::Value::String);
        }
        if !value.is_object() || !self.enter(value) {
            return serde_json::Value::Null;
        }

        let converted = if let Some(array) = value.as_array() {
            let items: Vec<Value<'js>> = array.iter::<Value<'js>>().flatten().collect();
            serde_json::Value::Array(items.iter().map(|item| self.convert(item)).collect())
        } else if let Some(object) = value.as_object() {
            let props: Vec<(String, Value<'js>)> =
                object.props::<String, Value<'js>>().flatten().collect();
            let mut map = serde_json::Map::new();
            for (key, item) in &props {
                map.insert(key.clone(), self.convert(item));
            }
            serde_json::Value::Object(map)
        } else {
            serde_json::Value::Null
        };

        self.parents.pop();
        converted
    }

    /// Push `value` as the current parent unless it would recurse forever or
    /// blow the limits.
    fn enter(&mut self, value: &Value<'js>) -> bool {
        if self.parents.len() >= MAX_DEPTH
            || self.visited >= MAX_NODES
            || self.parents.iter().any(|parent| parent == value)
        {
            return false;
        }
        self.visited += 1;
        self.parents.push(value.clone());
        true
    }
}

fn float_to_json(f: f64) -> serde_json::Value {
    // Integral floats come back as integers so round-tripped ids and
    // timestamps keep their JSON shape.
    if f.fract() == 0.0 && f.abs() < 9_007_199_254_740_992.0 {
        return serde_json::Value::from(f as i64);
    }
    serde_json::Number::from_f64(f).map_or(serde_json::Value::Null, serde_json::Value::Number)
}

/// Render console arguments the way a terminal would: strings verbatim,
/// everything else as JSON.
pub(crate) fn display(value: &Value<'_>) -> String {
    match value.as_string().and_then(|s| s.to_string().ok()) {
        Some(s) => s,
        None if value.is_undefined() => "undefined".to_string(),
        None => js_to_json(value).to_string(),
    }
}
