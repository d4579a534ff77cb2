#[derive(Debug, thiserror::Error)]
pub enum ProducerError {
    #[error("{0}")]
    Config(String),

    #[error("payload: {0}")]
    Payload(#[from] serde_json::Error),

    #[error("schema {id}: {detail}")]
    Schema { id: u32, detail: String },

    #[error("encode: {0}")]
    Encode(#[from] http_sink::AvroJsonError),

    #[error("schema registry: {0}")]
    Registry(#[from] http_sink::CatalogError),

    #[error("kafka: {0}")]
    Kafka(#[from] kafka_io::KafkaIoError),

    #[error("publish: {0}")]
    Publish(#[from] http_sink::SinkError),
}
