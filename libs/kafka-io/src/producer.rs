use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use http_sink::{RecordSink, SinkError};
use rdkafka::config::ClientConfig;
use rdkafka::producer::{FutureProducer, FutureRecord, Producer};
use rdkafka::util::Timeout;

use crate::error::KafkaIoError;

const DELIVERY_TIMEOUT: Duration = Duration::from_secs(30);

/// Publishes key/value pairs to one topic.
pub struct KafkaTopicSink {
    producer: FutureProducer,
    topic: String,
}

impl KafkaTopicSink {
    pub fn new(brokers: &str, topic: &str) -> Result<Self, KafkaIoError> {
        let producer: FutureProducer = ClientConfig::new()
            .set("bootstrap.servers", brokers)
            .set("message.timeout.ms", DELIVERY_TIMEOUT.as_millis().to_string())
            .create()
            .map_err(|source| KafkaIoError::Producer {
                topic: topic.to_string(),
                source,
            })?;

        tracing::debug!(topic = %topic, brokers = %brokers, "kafka producer created");
        Ok(Self {
            producer,
            topic: topic.to_string(),
        })
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }

    /// Blocks until queued records are delivered or `timeout` elapses.
    pub fn flush(&self, timeout: Duration) -> Result<(), KafkaIoError> {
        self.producer
            .flush(Timeout::After(timeout))
            .map_err(|source| KafkaIoError::Flush {
                topic: self.topic.clone(),
                source,
            })
    }
}

impl RecordSink for KafkaTopicSink {
    fn publish<'a>(
        &'a self,
        key: &'a [u8],
        value: &'a [u8],
    ) -> Pin<Box<dyn Future<Output = Result<(), SinkError>> + Send + 'a>> {
        Box::pin(async move {
            let record = FutureRecord::to(&self.topic).key(key).payload(value);
            self.producer
                .send(record, Timeout::After(DELIVERY_TIMEOUT))
                .await
                .map(|_| ())
                .map_err(|(err, _)| SinkError::new(format!("topic '{}': {err}", self.topic)))
        })
    }
}
