//! rdkafka bindings for the sink worker: consumed messages become
//! [`http_sink::Record`]s and topics become [`http_sink::RecordSink`]s.

pub mod consumer;
pub mod error;
pub mod producer;

pub use consumer::{ConsumerSettings, create_consumer, to_record};
pub use error::KafkaIoError;
pub use producer::KafkaTopicSink;

/// `host:port` bootstrap list for a single broker.
pub fn bootstrap_servers(host: &str, port: u16) -> String {
    format!("{host}:{port}")
}
