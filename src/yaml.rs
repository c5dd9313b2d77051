use std::sync::Arc;

use crate::value::Value;
pub use serde_yaml::Value as YamlValue;


impl From<&YamlValue> for Value {
    fn from(yaml: &YamlValue) -> Self {
        match yaml {
            YamlValue::Null => Value::Null,
            YamlValue::Bool(b) => Value::Bool(*b),
            YamlValue::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Value::Int(i)
                } else if let Some(u) = n.as_u64() {
                    Value::Uint(u)
                } else {
                    Value::Float(n.as_f64().unwrap_or_default())
                }
            },
            YamlValue::String(s) => Value::String(s.clone()),
            YamlValue::Sequence(seq) => Value::Sequence(Arc::new(
                seq.iter().map(Value::from).collect()
            )),
            YamlValue::Mapping(obj) => Value::Mapping(Arc::new(
                obj.iter()
                    .filter_map(|(key, value)| yaml_key(key).map(|key| (key, Value::from(value))))
                    .collect()
            )),
            YamlValue::Tagged(tagged) => Value::from(&tagged.value),
        }
    }
}

impl From<YamlValue> for Value {
    fn from(yaml: YamlValue) -> Self {
        Value::from(&yaml)
    }
}

// mapping keys are strings; scalar keys are stringified, others dropped
fn yaml_key(key: &YamlValue) -> Option<String> {
    match key {
        YamlValue::String(s) => Some(s.clone()),
        YamlValue::Number(n) => Some(n.to_string()),
        YamlValue::Bool(b) => Some(b.to_string()),
        _ => None
    }
}
