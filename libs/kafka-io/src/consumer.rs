use http_sink::Record;
use rdkafka::config::ClientConfig;
use rdkafka::consumer::{Consumer, StreamConsumer};
use rdkafka::message::{Headers, Message};

use crate::error::KafkaIoError;

#[derive(Debug, Clone)]
pub struct ConsumerSettings {
    pub brokers: String,
    pub group_id: String,
    pub topic: String,
}

impl ConsumerSettings {
    /// Offsets are stored by the caller once a record is handled and
    /// committed in the background.
    pub fn client_config(&self) -> ClientConfig {
        let mut config = ClientConfig::new();
        config
            .set("bootstrap.servers", &self.brokers)
            .set("group.id", &self.group_id)
            .set("enable.auto.commit", "true")
            .set("enable.auto.offset.store", "false")
            .set("auto.offset.reset", "earliest");
        config
    }
}

/// Creates a consumer subscribed to the settings' topic.
pub fn create_consumer(settings: &ConsumerSettings) -> Result<StreamConsumer, KafkaIoError> {
    let wrap = |source| KafkaIoError::Consumer {
        topic: settings.topic.clone(),
        source,
    };

    let consumer: StreamConsumer = settings.client_config().create().map_err(wrap)?;
    consumer.subscribe(&[settings.topic.as_str()]).map_err(wrap)?;

    tracing::info!(
        topic = %settings.topic,
        group = %settings.group_id,
        brokers = %settings.brokers,
        "kafka consumer subscribed"
    );
    Ok(consumer)
}

/// Copies key, value, headers and offset out of a consumed message.
/// Absent keys, values and header values become empty.
pub fn to_record<M: Message>(msg: &M) -> Record {
    let headers = match msg.headers() {
        Some(headers) => (0..headers.count())
            .map(|i| {
                let header = headers.get(i);
                (header.key.to_string(), header.value.unwrap_or_default().to_vec())
            })
            .collect(),
        None => Vec::new(),
    };

    Record {
        key: msg.key().unwrap_or_default().to_vec(),
        value: msg.payload().unwrap_or_default().to_vec(),
        headers,
        offset: msg.offset(),
    }
}
