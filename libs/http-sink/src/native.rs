use std::collections::BTreeMap;

use apache_avro::types::Value;

/// Generic decoded Avro value.
///
/// Unions keep their branch visible: a non-null union becomes a
/// single-entry map `{ <type tag>: <value> }`, a null union becomes
/// [`NativeValue::Null`]. Records become maps keyed by field name.
#[derive(Debug, Clone, PartialEq)]
pub enum NativeValue {
    Null,
    Boolean(bool),
    Int(i32),
    Long(i64),
    Float(f32),
    Double(f64),
    String(String),
    Bytes(Vec<u8>),
    Map(BTreeMap<String, NativeValue>),
    Array(Vec<NativeValue>),
}

impl NativeValue {
    pub fn as_map(&self) -> Option<&BTreeMap<String, NativeValue>> {
        match self {
            NativeValue::Map(m) => Some(m),
            _ => None,
        }
    }

    /// Single-entry union wrapper, the way decoded unions look.
    pub fn tagged(tag: &str, inner: NativeValue) -> Self {
        NativeValue::Map(BTreeMap::from([(tag.to_string(), inner)]))
    }
}

// ═══════════════════════════════════════════════════════════════
//  apache_avro Value → NativeValue
// ═══════════════════════════════════════════════════════════════

impl From<&Value> for NativeValue {
    fn from(value: &Value) -> Self {
        match value {
            Value::Null => NativeValue::Null,
            Value::Boolean(b) => NativeValue::Boolean(*b),
            Value::Int(i) | Value::Date(i) | Value::TimeMillis(i) => NativeValue::Int(*i),
            Value::Long(l)
            | Value::TimeMicros(l)
            | Value::TimestampMillis(l)
            | Value::TimestampMicros(l)
            | Value::TimestampNanos(l)
            | Value::LocalTimestampMillis(l)
            | Value::LocalTimestampMicros(l)
            | Value::LocalTimestampNanos(l) => NativeValue::Long(*l),
            Value::Float(f) => NativeValue::Float(*f),
            Value::Double(d) => NativeValue::Double(*d),
            Value::Bytes(b) | Value::Fixed(_, b) => NativeValue::Bytes(b.clone()),
            Value::String(s) | Value::Enum(_, s) => NativeValue::String(s.clone()),
            Value::Union(_, inner) => match inner.as_ref() {
                Value::Null => NativeValue::Null,
                other => NativeValue::tagged(union_tag(other), NativeValue::from(other)),
            },
            Value::Array(items) => NativeValue::Array(items.iter().map(NativeValue::from).collect()),
            Value::Map(entries) => NativeValue::Map(
                entries
                    .iter()
                    .map(|(k, v)| (k.clone(), NativeValue::from(v)))
                    .collect(),
            ),
            Value::Record(fields) => NativeValue::Map(
                fields
                    .iter()
                    .map(|(k, v)| (k.clone(), NativeValue::from(v)))
                    .collect(),
            ),
            Value::Decimal(d) => {
                let bytes: Vec<u8> = d.try_into().unwrap_or_default();
                NativeValue::Bytes(bytes)
            }
            Value::BigDecimal(d) => NativeValue::String(d.to_string()),
            Value::Uuid(u) => NativeValue::String(u.to_string()),
            Value::Duration(_) => NativeValue::Null,
        }
    }
}

/// Type name used as the key of a decoded union branch.
///
/// Logical types report their underlying Avro type.
fn union_tag(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Boolean(_) => "boolean",
        Value::Int(_) | Value::Date(_) | Value::TimeMillis(_) => "int",
        Value::Long(_)
        | Value::TimeMicros(_)
        | Value::TimestampMillis(_)
        | Value::TimestampMicros(_)
        | Value::TimestampNanos(_)
        | Value::LocalTimestampMillis(_)
        | Value::LocalTimestampMicros(_)
        | Value::LocalTimestampNanos(_) => "long",
        Value::Float(_) => "float",
        Value::Double(_) => "double",
        Value::Bytes(_) | Value::Decimal(_) | Value::BigDecimal(_) => "bytes",
        Value::String(_) | Value::Uuid(_) => "string",
        Value::Enum(..) => "enum",
        Value::Fixed(..) | Value::Duration(_) => "fixed",
        Value::Array(_) => "array",
        Value::Map(_) => "map",
        Value::Record(_) => "record",
        Value::Union(..) => "union",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn union(idx: u32, v: Value) -> Value {
        Value::Union(idx, Box::new(v))
    }

    #[test]
    fn null_union_branch_becomes_null() {
        assert_eq!(NativeValue::from(&union(0, Value::Null)), NativeValue::Null);
    }

    #[test]
    fn union_branch_is_wrapped_with_type_tag() {
        let v = NativeValue::from(&union(1, Value::String("PL".into())));
        assert_eq!(v, NativeValue::tagged("string", NativeValue::String("PL".into())));

        let v = NativeValue::from(&union(1, Value::Long(7)));
        assert_eq!(v, NativeValue::tagged("long", NativeValue::Long(7)));
    }

    #[test]
    fn enum_in_union_reports_enum_tag() {
        let v = NativeValue::from(&union(1, Value::Enum(2, "GREEN".into())));
        assert_eq!(v, NativeValue::tagged("enum", NativeValue::String("GREEN".into())));
    }

    #[test]
    fn float_and_double_tags_differ() {
        let f = NativeValue::from(&union(1, Value::Float(1.5)));
        let d = NativeValue::from(&union(1, Value::Double(1.5)));
        assert_eq!(f, NativeValue::tagged("float", NativeValue::Float(1.5)));
        assert_eq!(d, NativeValue::tagged("double", NativeValue::Double(1.5)));
    }

    #[test]
    fn record_becomes_map_of_fields() {
        let rec = Value::Record(vec![
            ("payload".into(), Value::Record(vec![("n".into(), union(1, Value::Int(3)))])),
        ]);
        let native = NativeValue::from(&rec);
        let outer = native.as_map().expect("outer map");
        let payload = outer["payload"].as_map().expect("payload map");
        assert_eq!(payload["n"], NativeValue::tagged("int", NativeValue::Int(3)));
    }

    #[test]
    fn logical_types_fall_back_to_underlying_tag() {
        let v = NativeValue::from(&union(1, Value::TimestampMillis(1_700_000_000_000)));
        assert_eq!(v, NativeValue::tagged("long", NativeValue::Long(1_700_000_000_000)));

        let v = NativeValue::from(&union(1, Value::Date(19_000)));
        assert_eq!(v, NativeValue::tagged("int", NativeValue::Int(19_000)));
    }
}
