use rdkafka::error::KafkaError;

#[derive(Debug, thiserror::Error)]
pub enum KafkaIoError {
    #[error("consumer for topic '{topic}': {source}")]
    Consumer { topic: String, source: KafkaError },

    #[error("producer for topic '{topic}': {source}")]
    Producer { topic: String, source: KafkaError },

    #[error("flush of topic '{topic}': {source}")]
    Flush { topic: String, source: KafkaError },
}
