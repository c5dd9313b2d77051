use std::sync::Arc;

use serde::Serialize;
use crate::value::Value;
pub use serde_json::Value as JsonValue;


impl From<&JsonValue> for Value {
    fn from(json: &JsonValue) -> Self {
        match json {
            JsonValue::Null => Value::Null,
            JsonValue::Bool(b) => Value::Bool(*b),
            JsonValue::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Value::Int(i)
                } else if let Some(u) = n.as_u64() {
                    Value::Uint(u)
                } else {
                    Value::Float(n.as_f64().unwrap_or_default())
                }
            },
            JsonValue::String(s) => Value::String(s.clone()),
            JsonValue::Array(seq) => Value::Sequence(Arc::new(
                seq.iter().map(Value::from).collect()
            )),
            JsonValue::Object(obj) => Value::Mapping(Arc::new(
                obj.iter()
                    .map(|(key, value)| (key.clone(), Value::from(value)))
                    .collect()
            )),
        }
    }
}

impl From<JsonValue> for Value {
    fn from(json: JsonValue) -> Self {
        Value::from(&json)
    }
}

impl Value {
    /// Convert any serializable host value, going through its JSON form.
    /// Structs become mappings keyed by their serialized field names.
    pub fn from_serialize<T: Serialize + ?Sized>(data: &T) -> Result<Value, serde_json::Error> {
        serde_json::to_value(data).map(Value::from)
    }
}
