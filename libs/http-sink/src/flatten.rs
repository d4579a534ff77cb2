//! Flattens a decoded registry envelope into a compact JSON object.
//!
//! The decoded value is expected to be a single-entry map whose value is a
//! record of fields. Each field is either null or a union wrapper
//! `{ <type tag>: <value> }`; the wrapper is dropped and only the inner
//! value is written. Fields of any other shape are left out.

use crate::error::FlattenError;
use crate::native::NativeValue;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum UnionTag {
    String,
    Enum,
    Int,
    Long,
    Boolean,
    Float,
}

impl UnionTag {
    fn parse(tag: &str) -> Option<Self> {
        match tag {
            "string" => Some(UnionTag::String),
            "enum" => Some(UnionTag::Enum),
            "int" => Some(UnionTag::Int),
            "long" => Some(UnionTag::Long),
            "boolean" => Some(UnionTag::Boolean),
            "float" => Some(UnionTag::Float),
            _ => None,
        }
    }
}

enum FieldShape<'a> {
    Null,
    Union(UnionTag, &'a NativeValue),
    Unrecognized,
}

fn classify(value: &NativeValue) -> FieldShape<'_> {
    match value {
        NativeValue::Null => FieldShape::Null,
        NativeValue::Map(wrapper) => {
            let mut entries = wrapper.iter();
            match (entries.next(), entries.next()) {
                (Some((tag, inner)), None) => match UnionTag::parse(tag) {
                    Some(tag) => FieldShape::Union(tag, inner),
                    None => FieldShape::Unrecognized,
                },
                _ => FieldShape::Unrecognized,
            }
        }
        _ => FieldShape::Unrecognized,
    }
}

/// Produces `{"field":value,...}` for the envelope's inner record.
///
/// Field order follows the map's key order. A field whose inner value does
/// not match its tag degrades to the tag's default literal.
pub fn flatten(decoded: &NativeValue) -> Result<String, FlattenError> {
    let outer = decoded.as_map().ok_or(FlattenError::NotParsable)?;
    let (_, envelope) = outer.iter().next().ok_or(FlattenError::EmptyPayload)?;
    let fields = envelope.as_map().ok_or(FlattenError::NotParsable)?;

    let mut members = Vec::with_capacity(fields.len());
    for (name, value) in fields {
        let literal = match classify(value) {
            FieldShape::Null => "null".to_string(),
            FieldShape::Union(tag, inner) => literal(tag, inner),
            FieldShape::Unrecognized => {
                tracing::trace!(field = %name, "skipping field with unsupported shape");
                continue;
            }
        };
        members.push(format!("{}:{literal}", quote(name)));
    }

    Ok(format!("{{{}}}", members.join(",")))
}

fn literal(tag: UnionTag, inner: &NativeValue) -> String {
    match (tag, inner) {
        (UnionTag::String | UnionTag::Enum, NativeValue::String(s)) => quote(s),
        (UnionTag::String | UnionTag::Enum, _) => quote(""),
        (UnionTag::Int | UnionTag::Long, NativeValue::Int(i)) => i.to_string(),
        (UnionTag::Int | UnionTag::Long, NativeValue::Long(l)) => l.to_string(),
        (UnionTag::Int | UnionTag::Long, _) => "0".to_string(),
        (UnionTag::Boolean, NativeValue::Boolean(b)) => b.to_string(),
        (UnionTag::Boolean, _) => "false".to_string(),
        // shortest f32 form, not the widened f64
        (UnionTag::Float, NativeValue::Float(f)) if f.is_finite() => {
            serde_json::to_string(f).unwrap_or_else(|_| "0".to_string())
        }
        (UnionTag::Float, _) => "0".to_string(),
    }
}

fn quote(s: &str) -> String {
    serde_json::Value::String(s.to_string()).to_string()
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use super::*;

    fn envelope(fields: Vec<(&str, NativeValue)>) -> NativeValue {
        let inner: BTreeMap<String, NativeValue> =
            fields.into_iter().map(|(k, v)| (k.to_string(), v)).collect();
        NativeValue::Map(BTreeMap::from([("payload".to_string(), NativeValue::Map(inner))]))
    }

    fn s(v: &str) -> NativeValue {
        NativeValue::String(v.to_string())
    }

    // ----------------------------------------------------------------
    // Happy paths
    // ----------------------------------------------------------------

    #[test]
    fn flattens_typed_unions() {
        let v = envelope(vec![
            ("type", NativeValue::tagged("string", s("PL"))),
            ("user_id", NativeValue::tagged("int", NativeValue::Int(2_097_886))),
        ]);
        assert_eq!(flatten(&v).unwrap(), r#"{"type":"PL","user_id":2097886}"#);
    }

    #[test]
    fn output_is_valid_json() {
        let v = envelope(vec![
            ("a", NativeValue::tagged("long", NativeValue::Long(-5))),
            ("b", NativeValue::tagged("boolean", NativeValue::Boolean(true))),
            ("c", NativeValue::tagged("float", NativeValue::Float(2.5))),
            ("d", NativeValue::tagged("enum", s("RED"))),
            ("e", NativeValue::Null),
        ]);
        let out = flatten(&v).unwrap();
        let parsed: serde_json::Value = serde_json::from_str(&out).unwrap();
        assert_eq!(
            parsed,
            serde_json::json!({"a": -5, "b": true, "c": 2.5, "d": "RED", "e": null})
        );
    }

    #[test]
    fn null_field_is_written_once() {
        let v = envelope(vec![("gone", NativeValue::Null)]);
        assert_eq!(flatten(&v).unwrap(), r#"{"gone":null}"#);
    }

    #[test]
    fn escapes_names_and_strings() {
        let v = envelope(vec![("qu\"ote", NativeValue::tagged("string", s("line\nbreak \"x\"")))]);
        let out = flatten(&v).unwrap();
        let parsed: serde_json::Value = serde_json::from_str(&out).unwrap();
        assert_eq!(parsed["qu\"ote"], "line\nbreak \"x\"");
    }

    #[test]
    fn empty_record_gives_empty_object() {
        let v = envelope(vec![]);
        assert_eq!(flatten(&v).unwrap(), "{}");
    }

    // ----------------------------------------------------------------
    // Unsupported shapes
    // ----------------------------------------------------------------

    #[test]
    fn unsupported_tags_are_omitted() {
        let v = envelope(vec![
            ("keep", NativeValue::tagged("string", s("x"))),
            ("dbl", NativeValue::tagged("double", NativeValue::Double(1.0))),
            ("arr", NativeValue::tagged("array", NativeValue::Array(vec![]))),
            ("plain", s("not a union")),
            ("empty", NativeValue::Map(BTreeMap::new())),
        ]);
        assert_eq!(flatten(&v).unwrap(), r#"{"keep":"x"}"#);
    }

    #[test]
    fn mismatched_inner_value_degrades_to_default() {
        let v = envelope(vec![
            ("b", NativeValue::tagged("boolean", s("yes"))),
            ("f", NativeValue::tagged("float", NativeValue::Float(f32::NAN))),
            ("i", NativeValue::tagged("int", s("12"))),
            ("s", NativeValue::tagged("string", NativeValue::Int(1))),
        ]);
        assert_eq!(flatten(&v).unwrap(), r#"{"b":false,"f":0,"i":0,"s":""}"#);
    }

    #[test]
    fn float_is_printed_at_single_precision() {
        let v = envelope(vec![
            ("f", NativeValue::tagged("float", NativeValue::Float(1.1))),
            ("inf", NativeValue::tagged("float", NativeValue::Float(f32::INFINITY))),
        ]);
        assert_eq!(flatten(&v).unwrap(), r#"{"f":1.1,"inf":0}"#);
    }

    // ----------------------------------------------------------------
    // Errors
    // ----------------------------------------------------------------

    #[test]
    fn non_map_outer_is_not_parsable() {
        assert_eq!(flatten(&s("x")), Err(FlattenError::NotParsable));
    }

    #[test]
    fn empty_outer_is_empty_payload() {
        let v = NativeValue::Map(BTreeMap::new());
        assert_eq!(flatten(&v), Err(FlattenError::EmptyPayload));
    }

    #[test]
    fn non_map_envelope_is_not_parsable() {
        let v = NativeValue::Map(BTreeMap::from([("payload".to_string(), NativeValue::Int(1))]));
        assert_eq!(flatten(&v), Err(FlattenError::NotParsable));
    }
}
