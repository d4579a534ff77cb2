//! Avro-JSON text → Avro binary under a given schema.
//!
//! Union values are written either as `null`, as a single-key wrapper
//! `{"<branch>": value}` naming the branch, or bare, in which case the
//! first branch that accepts the value is used.

use apache_avro::Schema;
use apache_avro::types::Value;

use crate::error::AvroJsonError;

/// Encodes `json` as one Avro binary datum (no container, no framing).
pub fn encode_json_datum(schema: &Schema, json: &serde_json::Value) -> Result<Vec<u8>, AvroJsonError> {
    let value = json_to_avro(json, schema, "$")?;
    apache_avro::to_avro_datum(schema, value).map_err(|e| AvroJsonError::Encode(e.to_string()))
}

// ═══════════════════════════════════════════════════════════════
//  JSON → Avro conversion
// ═══════════════════════════════════════════════════════════════

pub fn json_to_avro(val: &serde_json::Value, schema: &Schema, path: &str) -> Result<Value, AvroJsonError> {
    use serde_json::Value as Json;

    match (val, schema) {
        (Json::Null, Schema::Null) => Ok(Value::Null),
        (Json::Bool(b), Schema::Boolean) => Ok(Value::Boolean(*b)),
        (Json::Number(n), Schema::Int) => n
            .as_i64()
            .and_then(|i| i32::try_from(i).ok())
            .map(Value::Int)
            .ok_or_else(|| mismatch(path, "int", val)),
        (Json::Number(n), Schema::Long) => n.as_i64().map(Value::Long).ok_or_else(|| mismatch(path, "long", val)),
        (Json::Number(n), Schema::Float) => n
            .as_f64()
            .map(|f| Value::Float(f as f32))
            .ok_or_else(|| mismatch(path, "float", val)),
        (Json::Number(n), Schema::Double) => n.as_f64().map(Value::Double).ok_or_else(|| mismatch(path, "double", val)),
        (Json::String(s), Schema::String) => Ok(Value::String(s.clone())),
        (Json::String(s), Schema::Bytes) => Ok(Value::Bytes(latin1_bytes(s, path)?)),
        (Json::String(s), Schema::Fixed(fixed)) => {
            let bytes = latin1_bytes(s, path)?;
            if bytes.len() != fixed.size {
                return Err(AvroJsonError::Invalid {
                    path: path.to_string(),
                    detail: format!("fixed of size {} got {} bytes", fixed.size, bytes.len()),
                });
            }
            Ok(Value::Fixed(fixed.size, bytes))
        }
        (Json::String(s), Schema::Enum(enum_schema)) => enum_schema
            .symbols
            .iter()
            .position(|sym| sym == s)
            .map(|idx| Value::Enum(idx as u32, s.clone()))
            .ok_or_else(|| AvroJsonError::Invalid {
                path: path.to_string(),
                detail: format!("'{s}' is not an enum symbol"),
            }),
        (Json::Array(items), Schema::Array(inner)) => {
            let avro_items = items
                .iter()
                .enumerate()
                .map(|(i, item)| json_to_avro(item, &inner.items, &format!("{path}[{i}]")))
                .collect::<Result<Vec<_>, _>>()?;
            Ok(Value::Array(avro_items))
        }
        (Json::Object(map), Schema::Map(inner)) => {
            let entries = map
                .iter()
                .map(|(k, v)| Ok((k.clone(), json_to_avro(v, &inner.types, &format!("{path}.{k}"))?)))
                .collect::<Result<_, AvroJsonError>>()?;
            Ok(Value::Map(entries))
        }
        (Json::Object(map), Schema::Record(record_schema)) => {
            let mut fields = Vec::with_capacity(record_schema.fields.len());
            for field in &record_schema.fields {
                let field_path = format!("{path}.{}", field.name);
                let field_val = match (map.get(&field.name), &field.default) {
                    (Some(v), _) => v,
                    (None, Some(default)) => default,
                    (None, None) => &Json::Null,
                };
                fields.push((field.name.clone(), json_to_avro(field_val, &field.schema, &field_path)?));
            }
            Ok(Value::Record(fields))
        }
        (val, Schema::Union(union_schema)) => {
            let variants = union_schema.variants();
            if let Json::Object(wrapper) = val {
                if wrapper.len() == 1 {
                    if let Some((branch, inner)) = wrapper.iter().next() {
                        if let Some(idx) = variants.iter().position(|s| branch_matches(s, branch)) {
                            let v = json_to_avro(inner, &variants[idx], &format!("{path}.{branch}"))?;
                            return Ok(Value::Union(idx as u32, Box::new(v)));
                        }
                    }
                }
            }
            for (idx, variant) in variants.iter().enumerate() {
                if let Ok(v) = json_to_avro(val, variant, path) {
                    return Ok(Value::Union(idx as u32, Box::new(v)));
                }
            }
            Err(mismatch(path, "union branch", val))
        }
        (_, Schema::Ref { name }) => Err(AvroJsonError::Invalid {
            path: path.to_string(),
            detail: format!("named reference '{}' is not supported", name.fullname(None)),
        }),
        (val, schema) => Err(mismatch(path, &type_label(schema), val)),
    }
}

/// Whether a union wrapper key names `schema`.
fn branch_matches(schema: &Schema, key: &str) -> bool {
    match schema.name() {
        Some(name) => name.name == key || name.fullname(None) == key,
        None => type_label(schema) == key,
    }
}

fn type_label(schema: &Schema) -> String {
    let label = match schema {
        Schema::Null => "null",
        Schema::Boolean => "boolean",
        Schema::Int => "int",
        Schema::Long => "long",
        Schema::Float => "float",
        Schema::Double => "double",
        Schema::Bytes => "bytes",
        Schema::String => "string",
        Schema::Array(_) => "array",
        Schema::Map(_) => "map",
        Schema::Union(_) => "union",
        Schema::Record(_) => "record",
        Schema::Enum(_) => "enum",
        Schema::Fixed(_) => "fixed",
        other => return format!("{other:?}").to_lowercase(),
    };
    label.to_string()
}

/// Avro-JSON writes bytes as a string of code points 0..=255.
fn latin1_bytes(s: &str, path: &str) -> Result<Vec<u8>, AvroJsonError> {
    s.chars()
        .map(|c| u8::try_from(u32::from(c)))
        .collect::<Result<Vec<u8>, _>>()
        .map_err(|_| AvroJsonError::Invalid {
            path: path.to_string(),
            detail: "bytes string has code points above 255".to_string(),
        })
}

fn mismatch(path: &str, expected: &str, found: &serde_json::Value) -> AvroJsonError {
    let found = match found {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "boolean",
        serde_json::Value::Number(_) => "number",
        serde_json::Value::String(_) => "string",
        serde_json::Value::Array(_) => "array",
        serde_json::Value::Object(_) => "object",
    };
    AvroJsonError::Mismatch {
        path: path.to_string(),
        expected: expected.to_string(),
        found: found.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    const USER_SCHEMA: &str = r#"{
        "type": "record", "name": "Envelope", "namespace": "com.example",
        "fields": [{
            "name": "payload",
            "type": {
                "type": "record", "name": "Payload",
                "fields": [
                    {"name": "type", "type": ["null", "string"], "default": null},
                    {"name": "user_id", "type": ["null", "int"], "default": null},
                    {"name": "color", "type": ["null", {"type": "enum", "name": "Color", "symbols": ["RED", "GREEN"]}], "default": null},
                    {"name": "tags", "type": {"type": "array", "items": "string"}, "default": []}
                ]
            }
        }]
    }"#;

    fn schema() -> Schema {
        Schema::parse_str(USER_SCHEMA).unwrap()
    }

    fn decode(bytes: &[u8]) -> Value {
        let mut reader = bytes;
        apache_avro::from_avro_datum(&schema(), &mut reader, None).unwrap()
    }

    fn payload_field(value: &Value, name: &str) -> Value {
        let Value::Record(outer) = value else { panic!("outer is not a record") };
        let Value::Record(fields) = &outer[0].1 else { panic!("payload is not a record") };
        fields.iter().find(|(k, _)| k == name).map(|(_, v)| v.clone()).unwrap()
    }

    #[test]
    fn wrapped_union_branches_are_selected_by_name() {
        let json = json!({"payload": {"type": {"string": "PL"}, "user_id": {"int": 2097886}}});
        let value = decode(&encode_json_datum(&schema(), &json).unwrap());

        assert_eq!(payload_field(&value, "type"), Value::Union(1, Box::new(Value::String("PL".into()))));
        assert_eq!(payload_field(&value, "user_id"), Value::Union(1, Box::new(Value::Int(2097886))));
        assert_eq!(payload_field(&value, "color"), Value::Union(0, Box::new(Value::Null)));
        assert_eq!(payload_field(&value, "tags"), Value::Array(vec![]));
    }

    #[test]
    fn named_branch_is_selected_by_name() {
        let json = json!({"payload": {"color": {"Color": "GREEN"}}});
        let value = decode(&encode_json_datum(&schema(), &json).unwrap());
        assert_eq!(
            payload_field(&value, "color"),
            Value::Union(1, Box::new(Value::Enum(1, "GREEN".into())))
        );
    }

    #[test]
    fn bare_union_value_takes_first_matching_branch() {
        let json = json!({"payload": {"type": "bare", "tags": ["a", "b"]}});
        let value = decode(&encode_json_datum(&schema(), &json).unwrap());
        assert_eq!(payload_field(&value, "type"), Value::Union(1, Box::new(Value::String("bare".into()))));
        assert_eq!(
            payload_field(&value, "tags"),
            Value::Array(vec![Value::String("a".into()), Value::String("b".into())])
        );
    }

    #[test]
    fn int_overflow_is_rejected() {
        let json = json!({"payload": {"user_id": {"int": 5_000_000_000_i64}}});
        let err = encode_json_datum(&schema(), &json).unwrap_err();
        assert!(err.to_string().contains("user_id"), "{err}");
    }

    #[test]
    fn unknown_enum_symbol_is_rejected() {
        let json = json!({"payload": {"color": {"Color": "BLUE"}}});
        let err = encode_json_datum(&schema(), &json).unwrap_err();
        assert!(err.to_string().contains("BLUE"), "{err}");
    }

    #[test]
    fn bytes_use_code_points() {
        let schema = Schema::parse_str(r#""bytes""#).unwrap();
        let value = json_to_avro(&json!("\u{0000}\u{00ff}A"), &schema, "$").unwrap();
        assert_eq!(value, Value::Bytes(vec![0, 255, b'A']));
        assert!(json_to_avro(&json!("\u{0100}"), &schema, "$").is_err());
    }

    #[test]
    fn map_values_follow_value_schema() {
        let schema = Schema::parse_str(r#"{"type": "map", "values": "long"}"#).unwrap();
        let value = json_to_avro(&json!({"a": 1, "b": 2}), &schema, "$").unwrap();
        let Value::Map(entries) = value else { panic!("expected map") };
        assert_eq!(entries.get("b"), Some(&Value::Long(2)));
    }
}
