//! Kafka record → HTTP POST pipeline.
//!
//! [`Processor`] runs one record through [`EnvelopeDecoder`],
//! [`Dispatcher`] and [`OutcomeRouter`]. Brokers, the schema registry and
//! the HTTP endpoint are reached through the [`SchemaCatalog`],
//! [`RecordSink`] and [`HttpClient`] traits.

pub mod avro_json;
pub mod dispatch;
pub mod envelope;
pub mod error;
pub mod flatten;
pub mod native;
pub mod processor;
pub mod record;
pub mod registry;
pub mod route;
pub mod sanitize;
pub mod url;

pub use dispatch::{
    DispatchFailure, DispatchResult, Dispatcher, Forwarded, HttpClient, HttpHeader, HttpResponse,
    OutboundRequest, ReqwestClient, KEY_HEADER,
};
pub use envelope::{EnvelopeDecoder, EnvelopeKind, SchemaCache, SchemaHandle, encode_registry_frame};
pub use error::{
    AvroJsonError, CatalogError, DecodeError, ErrorKind, FlattenError, HeaderError, HttpStatusError,
    ProcessError, RouteError, SinkError, TemplateError, TransportError,
};
pub use flatten::flatten;
pub use native::NativeValue;
pub use processor::Processor;
pub use record::Record;
pub use registry::{RegisteredSchema, RegistryClient, SchemaCatalog};
pub use route::{ErrorPayload, OutcomeRouter, RecordSink};
pub use sanitize::sanitize_key;
pub use url::{UrlTemplate, resolve_url};
