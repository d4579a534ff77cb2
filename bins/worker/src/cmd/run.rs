use std::sync::Arc;
use std::time::Duration;

use rdkafka::consumer::{Consumer, StreamConsumer};
use rdkafka::message::{BorrowedMessage, Message};
use tokio::signal::unix::{Signal, SignalKind, signal};
use tokio_util::sync::CancellationToken;

use http_sink::{
    Dispatcher, EnvelopeDecoder, OutcomeRouter, Processor, RecordSink, RegistryClient, ReqwestClient,
    SchemaCatalog, UrlTemplate, sanitize_key,
};
use kafka_io::{ConsumerSettings, KafkaTopicSink, create_consumer, to_record};

use crate::config::{Effective, RunArgs};
use crate::error::WorkerError;

const FLUSH_TIMEOUT: Duration = Duration::from_secs(10);

pub async fn run(args: RunArgs) -> Result<(), WorkerError> {
    tracing::info!("sink-worker starting");

    // --- Config ---
    let eff = Effective::new(&args)?;
    tracing::info!(
        topic = %eff.topic,
        brokers = %eff.brokers,
        url = %eff.http_url,
        registry = eff.schema_registry_url.is_some(),
        "loaded config"
    );

    // --- CancellationToken for graceful shutdown ---
    let token = CancellationToken::new();
    let sigterm = listen_sigterm()?;
    tokio::spawn(shutdown_on_signal(token.clone(), sigterm));

    // --- Pipeline ---
    let sinks = Sinks::open(&eff)?;
    let processor = build_processor(&eff, &sinks)?;
    let consumer = create_consumer(&ConsumerSettings {
        brokers: eff.brokers.clone(),
        group_id: eff.consumer_group.clone(),
        topic: eff.topic.clone(),
    })?;

    tracing::info!("sink-worker started, waiting for messages");

    loop {
        tokio::select! {
            _ = token.cancelled() => break,
            received = consumer.recv() => match received {
                Ok(msg) => {
                    handle(&processor, &msg).await;
                    store_offset(&consumer, &msg);
                }
                Err(e) => tracing::error!(error = %e, "failed to read message"),
            },
        }
    }

    tracing::info!("shutting down...");
    sinks.flush();
    Ok(())
}

fn build_processor(eff: &Effective, sinks: &Sinks) -> Result<Processor, WorkerError> {
    let catalog = match &eff.schema_registry_url {
        Some(url) => Some(Arc::new(RegistryClient::new(url, eff.http_timeout)?) as Arc<dyn SchemaCatalog>),
        None => None,
    };
    let decoder = EnvelopeDecoder::new(catalog);

    let client = Arc::new(ReqwestClient::new(eff.http_timeout)?);
    let target = UrlTemplate::new(eff.http_url.clone(), eff.http_path_param.clone());
    let dispatcher = Dispatcher::new(client, target, &eff.http_headers)?;

    let router = OutcomeRouter::new(sinks.success_sink(), sinks.error_sink());
    Ok(Processor::new(decoder, dispatcher, router))
}

async fn handle(processor: &Processor, msg: &BorrowedMessage<'_>) {
    let record = to_record(msg);
    tracing::debug!(
        topic = msg.topic(),
        partition = msg.partition(),
        offset = record.offset,
        bytes = record.value.len(),
        "processing record"
    );

    if let Err(e) = processor.process(&record).await {
        tracing::error!(
            kind = %e.kind(),
            topic = msg.topic(),
            partition = msg.partition(),
            offset = record.offset,
            key = %sanitize_key(&record.key),
            error = %e,
            "error processing message"
        );
    }
}

/// Marks the record handled whatever the outcome; the consumer commits
/// stored offsets in the background.
fn store_offset(consumer: &StreamConsumer, msg: &BorrowedMessage<'_>) {
    if let Err(e) = consumer.store_offset_from_message(msg) {
        tracing::warn!(offset = msg.offset(), error = %e, "failed to store offset");
    }
}

/// Fails startup when the SIGTERM handler cannot be installed.
fn listen_sigterm() -> Result<Signal, WorkerError> {
    Ok(signal(SignalKind::terminate())?)
}

async fn shutdown_on_signal(token: CancellationToken, mut sigterm: Signal) {
    tokio::select! {
        _ = tokio::signal::ctrl_c() => tracing::info!("SIGINT received"),
        _ = sigterm.recv() => tracing::info!("SIGTERM received"),
    }
    token.cancel();
}

// ═══════════════════════════════════════════════════════════════
//  Outcome topics
// ═══════════════════════════════════════════════════════════════

struct Sinks {
    success: Option<Arc<KafkaTopicSink>>,
    error: Option<Arc<KafkaTopicSink>>,
}

impl Sinks {
    fn open(eff: &Effective) -> Result<Self, WorkerError> {
        let open = |topic: &Option<String>| -> Result<Option<Arc<KafkaTopicSink>>, WorkerError> {
            match topic {
                Some(t) => Ok(Some(Arc::new(KafkaTopicSink::new(&eff.brokers, t)?))),
                None => Ok(None),
            }
        };
        Ok(Self {
            success: open(&eff.success_topic)?,
            error: open(&eff.error_topic)?,
        })
    }

    fn success_sink(&self) -> Option<Arc<dyn RecordSink>> {
        self.success.clone().map(|s| s as Arc<dyn RecordSink>)
    }

    fn error_sink(&self) -> Option<Arc<dyn RecordSink>> {
        self.error.clone().map(|s| s as Arc<dyn RecordSink>)
    }

    fn flush(&self) {
        for sink in self.success.iter().chain(self.error.iter()) {
            match sink.flush(FLUSH_TIMEOUT) {
                Ok(()) => tracing::info!(topic = %sink.topic(), "producer flushed"),
                Err(e) => tracing::warn!(error = %e, "producer flush failed"),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // ----------------------------------------------------------------
    // Shutdown
    // ----------------------------------------------------------------

    #[tokio::test]
    async fn sigterm_listener_registers_inside_runtime() {
        assert!(listen_sigterm().is_ok());
    }

    #[test]
    fn io_failure_maps_to_signal_error() {
        let err = WorkerError::from(std::io::Error::other("sigaction failed"));
        assert!(matches!(err, WorkerError::Signal(_)));
        assert_eq!(err.to_string(), "signal: sigaction failed");
    }
}
