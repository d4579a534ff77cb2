//! Record value → JSON body.
//!
//! Three envelope shapes are understood:
//!
//! - **registry**: `0x00 | schema id (BE u32) | avro binary`, decoded with
//!   the writer schema from the catalog and flattened;
//! - **decoderbufs**: a value whose first four bytes are zero; everything
//!   before the first `{` or `[` is dropped and the rest re-serialized;
//! - **raw**: anything else, forwarded untouched.
//!
//! The registry path is taken for every record when a catalog is
//! configured; otherwise the decoderbufs check decides.

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use apache_avro::Schema;

use crate::error::DecodeError;
use crate::flatten::flatten;
use crate::native::NativeValue;
use crate::registry::SchemaCatalog;

pub const MAGIC_BYTE: u8 = 0;

/// Magic byte plus a big-endian u32 schema id.
pub const REGISTRY_HEADER_LEN: usize = 5;

/// Which decoding path a value takes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnvelopeKind {
    Registry,
    Decoderbufs,
    Raw,
}

// ═══════════════════════════════════════════════════════════════
//  Registry framing
// ═══════════════════════════════════════════════════════════════

/// Builds `0x00 | id (BE) | payload`.
pub fn encode_registry_frame(schema_id: u32, payload: &[u8]) -> Vec<u8> {
    let mut frame = Vec::with_capacity(REGISTRY_HEADER_LEN + payload.len());
    frame.push(MAGIC_BYTE);
    frame.extend_from_slice(&schema_id.to_be_bytes());
    frame.extend_from_slice(payload);
    frame
}

/// Splits a registry frame into schema id and avro payload.
pub fn split_registry_frame(value: &[u8]) -> Result<(u32, &[u8]), DecodeError> {
    if value.len() < REGISTRY_HEADER_LEN {
        return Err(DecodeError::TooShort { len: value.len() });
    }
    if value[0] != MAGIC_BYTE {
        return Err(DecodeError::MagicByte(value[0]));
    }
    let id = u32::from_be_bytes([value[1], value[2], value[3], value[4]]);
    Ok((id, &value[REGISTRY_HEADER_LEN..]))
}

// ═══════════════════════════════════════════════════════════════
//  Decoderbufs
// ═══════════════════════════════════════════════════════════════

/// At least five bytes, the first four reading as big-endian zero.
pub fn is_decoderbufs(value: &[u8]) -> bool {
    value.len() >= 5 && value[..4] == [0, 0, 0, 0]
}

/// Drops the binary prefix and re-serializes the JSON that follows.
pub fn strip_decoderbufs(value: &[u8]) -> Result<Vec<u8>, DecodeError> {
    let start = value
        .iter()
        .position(|&b| b == b'{' || b == b'[')
        .unwrap_or(value.len());
    let parsed: serde_json::Value = serde_json::from_slice(&value[start..])?;
    Ok(serde_json::to_vec(&parsed)?)
}

// ═══════════════════════════════════════════════════════════════
//  Schema handles and cache
// ═══════════════════════════════════════════════════════════════

/// Writer schema resolved from the catalog, parsed once.
#[derive(Debug)]
pub struct SchemaHandle {
    id: u32,
    definition: String,
    schema: Schema,
}

impl SchemaHandle {
    pub fn compile(id: u32, definition: String) -> Result<Self, DecodeError> {
        let schema = Schema::parse_str(&definition).map_err(|e| DecodeError::InvalidSchema {
            id,
            detail: e.to_string(),
        })?;
        Ok(Self { id, definition, schema })
    }

    pub fn id(&self) -> u32 {
        self.id
    }

    pub fn definition(&self) -> &str {
        &self.definition
    }

    /// Decodes one avro binary datum written with this schema.
    ///
    /// The datum must consume the whole payload and must re-encode to the
    /// same bytes; truncated or padded input is rejected.
    pub fn decode(&self, payload: &[u8]) -> Result<NativeValue, DecodeError> {
        let binary = |detail: String| DecodeError::Binary { id: self.id, detail };

        let mut reader = payload;
        let value = apache_avro::from_avro_datum(&self.schema, &mut reader, None)
            .map_err(|e| binary(e.to_string()))?;
        if !reader.is_empty() {
            return Err(binary(format!("{} trailing bytes after datum", reader.len())));
        }
        if !value.validate(&self.schema) {
            return Err(binary("decoded value does not match schema".into()));
        }

        // the reader fills missing input with zero values instead of failing
        let reencoded = apache_avro::to_avro_datum(&self.schema, value.clone())
            .map_err(|e| binary(e.to_string()))?;
        if reencoded != payload {
            return Err(binary(format!(
                "datum is {} bytes, payload is {} bytes",
                reencoded.len(),
                payload.len()
            )));
        }
        Ok(NativeValue::from(&value))
    }
}

/// Id → handle map in front of the catalog. Entries are never evicted:
/// a registered schema id always refers to the same definition.
pub struct SchemaCache {
    catalog: Arc<dyn SchemaCatalog>,
    handles: RwLock<HashMap<u32, Arc<SchemaHandle>>>,
}

impl SchemaCache {
    pub fn new(catalog: Arc<dyn SchemaCatalog>) -> Self {
        Self {
            catalog,
            handles: RwLock::new(HashMap::new()),
        }
    }

    pub fn cached(&self, id: u32) -> Option<Arc<SchemaHandle>> {
        let handles = self.handles.read().unwrap_or_else(PoisonError::into_inner);
        handles.get(&id).cloned()
    }

    pub fn len(&self) -> usize {
        self.handles.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns the cached handle or fetches, compiles and stores it.
    /// When two callers race on the same id the first stored handle wins.
    pub async fn get_or_fetch(&self, id: u32) -> Result<Arc<SchemaHandle>, DecodeError> {
        if let Some(handle) = self.cached(id) {
            return Ok(handle);
        }

        let definition = self
            .catalog
            .schema_by_id(id)
            .await
            .map_err(|source| DecodeError::Schema { id, source })?;
        let handle = Arc::new(SchemaHandle::compile(id, definition)?);
        tracing::debug!(schema_id = id, "schema fetched from registry");

        let mut handles = self.handles.write().unwrap_or_else(PoisonError::into_inner);
        Ok(handles.entry(id).or_insert(handle).clone())
    }
}

// ═══════════════════════════════════════════════════════════════
//  EnvelopeDecoder
// ═══════════════════════════════════════════════════════════════

pub struct EnvelopeDecoder {
    cache: Option<SchemaCache>,
}

impl EnvelopeDecoder {
    pub fn new(catalog: Option<Arc<dyn SchemaCatalog>>) -> Self {
        Self {
            cache: catalog.map(SchemaCache::new),
        }
    }

    pub fn cache(&self) -> Option<&SchemaCache> {
        self.cache.as_ref()
    }

    pub fn classify(&self, value: &[u8]) -> EnvelopeKind {
        if self.cache.is_some() {
            EnvelopeKind::Registry
        } else if is_decoderbufs(value) {
            EnvelopeKind::Decoderbufs
        } else {
            EnvelopeKind::Raw
        }
    }

    /// Produces the JSON body for a record value.
    pub async fn decode(&self, value: &[u8]) -> Result<Vec<u8>, DecodeError> {
        match (&self.cache, self.classify(value)) {
            (Some(cache), EnvelopeKind::Registry) => {
                let (id, payload) = split_registry_frame(value)?;
                let handle = cache.get_or_fetch(id).await?;
                let native = handle.decode(payload)?;
                Ok(flatten(&native)?.into_bytes())
            }
            (_, EnvelopeKind::Decoderbufs) => strip_decoderbufs(value),
            _ => Ok(value.to_vec()),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::future::Future;
    use std::pin::Pin;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use apache_avro::types::Value;

    use super::*;
    use crate::error::CatalogError;

    const SCHEMA: &str = r#"{
        "type": "record", "name": "Envelope",
        "fields": [{
            "name": "payload",
            "type": {
                "type": "record", "name": "Payload",
                "fields": [
                    {"name": "type", "type": ["null", "string"]},
                    {"name": "user_id", "type": ["null", "int"]}
                ]
            }
        }]
    }"#;

    struct CountingCatalog {
        schemas: HashMap<u32, String>,
        calls: AtomicUsize,
    }

    impl CountingCatalog {
        fn with(id: u32, definition: &str) -> Arc<Self> {
            Arc::new(Self {
                schemas: HashMap::from([(id, definition.to_string())]),
                calls: AtomicUsize::new(0),
            })
        }
    }

    impl SchemaCatalog for CountingCatalog {
        fn schema_by_id(
            &self,
            id: u32,
        ) -> Pin<Box<dyn Future<Output = Result<String, CatalogError>> + Send + '_>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let found = self.schemas.get(&id).cloned().ok_or(CatalogError::NotFound(id));
            Box::pin(async move { found })
        }
    }

    fn avro_payload(kind: Option<&str>, user_id: Option<i32>) -> Vec<u8> {
        let schema = Schema::parse_str(SCHEMA).unwrap();
        let opt_str = match kind {
            Some(s) => Value::Union(1, Box::new(Value::String(s.into()))),
            None => Value::Union(0, Box::new(Value::Null)),
        };
        let opt_int = match user_id {
            Some(i) => Value::Union(1, Box::new(Value::Int(i))),
            None => Value::Union(0, Box::new(Value::Null)),
        };
        let value = Value::Record(vec![(
            "payload".into(),
            Value::Record(vec![("type".into(), opt_str), ("user_id".into(), opt_int)]),
        )]);
        apache_avro::to_avro_datum(&schema, value).unwrap()
    }

    // ----------------------------------------------------------------
    // Classification
    // ----------------------------------------------------------------

    #[test]
    fn catalog_forces_registry_path() {
        let decoder = EnvelopeDecoder::new(Some(CountingCatalog::with(1, SCHEMA)));
        assert_eq!(decoder.classify(br#"{"a":1}"#), EnvelopeKind::Registry);
    }

    #[test]
    fn zero_prefix_without_catalog_is_decoderbufs() {
        let decoder = EnvelopeDecoder::new(None);
        assert_eq!(decoder.classify(b"\0\0\0\0{}"), EnvelopeKind::Decoderbufs);
        assert_eq!(decoder.classify(b"\0\0\0\0"), EnvelopeKind::Raw);
        assert_eq!(decoder.classify(b"\0\0\0\x01{}"), EnvelopeKind::Raw);
        assert_eq!(decoder.classify(br#"{"a":1}"#), EnvelopeKind::Raw);
    }

    // ----------------------------------------------------------------
    // Raw and decoderbufs paths
    // ----------------------------------------------------------------

    #[tokio::test]
    async fn raw_value_passes_through_unchanged() {
        let decoder = EnvelopeDecoder::new(None);
        let value = br#"{"b": 2, "a": 1}"#;
        assert_eq!(decoder.decode(value).await.unwrap(), value.to_vec());
    }

    #[tokio::test]
    async fn decoderbufs_prefix_is_stripped() {
        let decoder = EnvelopeDecoder::new(None);
        let value = b"\0\0\0\0\x07\x12garbage{\"b\": 2, \"a\": [1, 2]}";
        let out = decoder.decode(value).await.unwrap();
        assert_eq!(out, br#"{"a":[1,2],"b":2}"#.to_vec());
    }

    #[tokio::test]
    async fn decoderbufs_array_payload() {
        let decoder = EnvelopeDecoder::new(None);
        let out = decoder.decode(b"\0\0\0\0\x02[1, 2]").await.unwrap();
        assert_eq!(out, b"[1,2]".to_vec());
    }

    #[tokio::test]
    async fn decoderbufs_without_json_fails() {
        let decoder = EnvelopeDecoder::new(None);
        let err = decoder.decode(b"\0\0\0\0\x05nothing").await.unwrap_err();
        assert!(matches!(err, DecodeError::InvalidJson(_)));
    }

    // ----------------------------------------------------------------
    // Registry path
    // ----------------------------------------------------------------

    #[tokio::test]
    async fn registry_value_is_decoded_and_flattened() {
        let decoder = EnvelopeDecoder::new(Some(CountingCatalog::with(7, SCHEMA)));
        let frame = encode_registry_frame(7, &avro_payload(Some("PL"), Some(2_097_886)));
        let out = decoder.decode(&frame).await.unwrap();
        assert_eq!(String::from_utf8(out).unwrap(), r#"{"type":"PL","user_id":2097886}"#);
    }

    #[tokio::test]
    async fn null_branches_are_written_as_null() {
        let decoder = EnvelopeDecoder::new(Some(CountingCatalog::with(7, SCHEMA)));
        let frame = encode_registry_frame(7, &avro_payload(None, Some(1)));
        let out = decoder.decode(&frame).await.unwrap();
        assert_eq!(String::from_utf8(out).unwrap(), r#"{"type":null,"user_id":1}"#);
    }

    #[tokio::test]
    async fn schema_is_fetched_once_per_id() {
        let catalog = CountingCatalog::with(7, SCHEMA);
        let decoder = EnvelopeDecoder::new(Some(catalog.clone()));
        let frame = encode_registry_frame(7, &avro_payload(Some("x"), Some(1)));

        for _ in 0..3 {
            decoder.decode(&frame).await.unwrap();
        }

        assert_eq!(catalog.calls.load(Ordering::SeqCst), 1);
        assert_eq!(decoder.cache().map(SchemaCache::len), Some(1));
    }

    #[tokio::test]
    async fn short_value_is_rejected() {
        let decoder = EnvelopeDecoder::new(Some(CountingCatalog::with(7, SCHEMA)));
        let err = decoder.decode(&[0, 0, 7]).await.unwrap_err();
        assert!(matches!(err, DecodeError::TooShort { len: 3 }));
    }

    #[tokio::test]
    async fn wrong_magic_byte_is_rejected() {
        let decoder = EnvelopeDecoder::new(Some(CountingCatalog::with(7, SCHEMA)));
        let err = decoder.decode(br#"{"a":1}"#).await.unwrap_err();
        assert!(matches!(err, DecodeError::MagicByte(b'{')));
    }

    #[tokio::test]
    async fn unknown_schema_id_is_a_decode_error() {
        let decoder = EnvelopeDecoder::new(Some(CountingCatalog::with(7, SCHEMA)));
        let frame = encode_registry_frame(8, &avro_payload(Some("x"), Some(1)));
        let err = decoder.decode(&frame).await.unwrap_err();
        assert!(matches!(
            err,
            DecodeError::Schema { id: 8, source: CatalogError::NotFound(8) }
        ));
        assert!(decoder.cache().is_some_and(SchemaCache::is_empty));
    }

    #[tokio::test]
    async fn truncated_binary_is_a_decode_error() {
        let decoder = EnvelopeDecoder::new(Some(CountingCatalog::with(7, SCHEMA)));
        let payload = avro_payload(Some("a long enough string"), Some(1));
        let frame = encode_registry_frame(7, &payload[..3]);
        let err = decoder.decode(&frame).await.unwrap_err();
        assert!(matches!(err, DecodeError::Binary { id: 7, .. }));
    }

    #[tokio::test]
    async fn empty_binary_is_a_decode_error() {
        let decoder = EnvelopeDecoder::new(Some(CountingCatalog::with(7, SCHEMA)));
        let err = decoder.decode(&encode_registry_frame(7, &[])).await.unwrap_err();
        assert!(matches!(err, DecodeError::Binary { id: 7, .. }));
    }

    #[tokio::test]
    async fn trailing_bytes_are_a_decode_error() {
        let decoder = EnvelopeDecoder::new(Some(CountingCatalog::with(7, SCHEMA)));
        let mut payload = avro_payload(Some("PL"), Some(1));
        payload.extend_from_slice(b"junk");
        let err = decoder.decode(&encode_registry_frame(7, &payload)).await.unwrap_err();
        assert!(matches!(err, DecodeError::Binary { id: 7, .. }));
    }

    #[test]
    fn handle_decodes_only_complete_datum() {
        let handle = SchemaHandle::compile(7, SCHEMA.to_string()).unwrap();
        let payload = avro_payload(Some("PL"), None);
        assert!(handle.decode(&payload).is_ok());
        for end in 0..payload.len() {
            assert!(handle.decode(&payload[..end]).is_err(), "prefix of {end} bytes accepted");
        }
    }

    #[test]
    fn frame_layout_is_magic_then_big_endian_id() {
        let frame = encode_registry_frame(0x0102_0304, b"xy");
        assert_eq!(frame, vec![0, 1, 2, 3, 4, b'x', b'y']);
        assert_eq!(split_registry_frame(&frame).unwrap(), (0x0102_0304, &b"xy"[..]));
    }
}
