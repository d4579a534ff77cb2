#[derive(Debug, thiserror::Error)]
pub enum WorkerError {
    #[error("config ({context}): {detail}")]
    Config { context: &'static str, detail: String },

    #[error("http headers: {0}")]
    Header(#[from] http_sink::HeaderError),

    #[error("http client: {0}")]
    Http(#[from] http_sink::TransportError),

    #[error("schema registry: {0}")]
    Registry(#[from] http_sink::CatalogError),

    #[error("kafka: {0}")]
    Kafka(#[from] kafka_io::KafkaIoError),

    #[error("signal: {0}")]
    Signal(#[from] std::io::Error),
}

impl WorkerError {
    pub fn config(context: &'static str, detail: impl Into<String>) -> Self {
        Self::Config {
            context,
            detail: detail.into(),
        }
    }
}
