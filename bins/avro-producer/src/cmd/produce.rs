use apache_avro::Schema;

use http_sink::avro_json::encode_json_datum;
use http_sink::{RecordSink, RegistryClient, encode_registry_frame};
use kafka_io::KafkaTopicSink;

use super::config::Effective;
use super::error::ProducerError;

pub async fn run(eff: &Effective) -> Result<(), ProducerError> {
    let registry = RegistryClient::new(&eff.schema_registry_url, eff.timeout)?;
    let latest = registry.latest_for_subject(&eff.subject).await?;
    tracing::info!(subject = %eff.subject, schema_id = latest.id, "latest schema fetched");

    let schema = Schema::parse_str(&latest.schema).map_err(|e| ProducerError::Schema {
        id: latest.id,
        detail: e.to_string(),
    })?;
    let datum = encode_json_datum(&schema, &eff.payload)?;
    let frame = encode_registry_frame(latest.id, &datum);

    let sink = KafkaTopicSink::new(&eff.brokers, &eff.topic)?;
    sink.publish(eff.key.as_bytes(), &frame).await?;
    sink.flush(eff.timeout)?;

    tracing::info!(
        topic = %eff.topic,
        key = %eff.key,
        bytes = frame.len(),
        "record published"
    );
    Ok(())
}
