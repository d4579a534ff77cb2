use std::time::Duration;

use clap::Args;
use serde::Deserialize;

use super::error::ProducerError;

// ═══════════════════════════════════════════════════════════════
//  Config file (TOML)
// ═══════════════════════════════════════════════════════════════

#[derive(Debug, Default, Deserialize)]
pub struct Config {
    pub broker_host: Option<String>,
    pub broker_port: Option<u16>,
    pub topic: Option<String>,
    pub schema_registry_url: Option<String>,
    pub subject: Option<String>,
    pub key: Option<String>,
    pub payload: Option<String>,
    pub payload_file: Option<String>,
    pub timeout_secs: Option<u64>,
}

pub fn load_config(path: &str) -> Result<Config, ProducerError> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| ProducerError::Config(format!("cannot read config {path}: {e}")))?;
    toml::from_str(&content).map_err(|e| ProducerError::Config(format!("bad config {path}: {e}")))
}

// ═══════════════════════════════════════════════════════════════
//  CLI args
// ═══════════════════════════════════════════════════════════════

#[derive(Args, Clone, Debug, Default)]
pub struct ProduceArgs {
    /// Путь к TOML конфиг файлу (необязательный)
    #[arg(long, default_value = "producer.toml", env = "AVRO_PRODUCER_CONFIG")]
    pub config: String,

    /// Хост брокера Kafka
    #[arg(long, env = "KAFKA_BROKER_HOST")]
    pub broker_host: Option<String>,

    /// Порт брокера Kafka
    #[arg(long, env = "KAFKA_BROKER_PORT")]
    pub broker_port: Option<u16>,

    /// Топик назначения
    #[arg(long, env = "KAFKA_TOPIC")]
    pub topic: Option<String>,

    /// URL schema registry
    #[arg(long, env = "KAFKA_SCHEMA_REGISTRY_URL")]
    pub schema_registry_url: Option<String>,

    /// Subject схемы. По умолчанию <topic>-value
    #[arg(long)]
    pub subject: Option<String>,

    /// Ключ записи
    #[arg(long)]
    pub key: Option<String>,

    /// Avro-JSON значение, напр. {"payload":{"type":{"string":"PL"}}}
    #[arg(long)]
    pub payload: Option<String>,

    /// Файл с Avro-JSON значением
    #[arg(long)]
    pub payload_file: Option<String>,

    /// Таймаут запросов к registry, секунды
    #[arg(long)]
    pub timeout_secs: Option<u64>,
}

// ═══════════════════════════════════════════════════════════════
//  Effective: merged config
// ═══════════════════════════════════════════════════════════════

/// Итоговая конфигурация после мержа: producer.toml < env/CLI
#[derive(Debug)]
pub struct Effective {
    pub brokers: String,
    pub topic: String,
    pub schema_registry_url: String,
    pub subject: String,
    pub key: String,
    pub payload: serde_json::Value,
    pub timeout: Duration,
}

impl Effective {
    pub fn new(args: &ProduceArgs) -> Result<Self, ProducerError> {
        let cfg = match load_config(&args.config) {
            Ok(c) => c,
            Err(e) => {
                if std::path::Path::new(&args.config).exists() {
                    return Err(e);
                }
                Config::default()
            }
        };
        Self::merge(args, cfg)
    }

    pub fn merge(args: &ProduceArgs, cfg: Config) -> Result<Self, ProducerError> {
        let broker_host = required(args.broker_host.clone().or(cfg.broker_host), "broker host")?;
        let broker_port = required(args.broker_port.or(cfg.broker_port), "broker port")?;
        let topic = required(args.topic.clone().or(cfg.topic), "topic")?;
        let schema_registry_url = required(
            args.schema_registry_url.clone().or(cfg.schema_registry_url),
            "schema registry url",
        )?;
        let key = required(args.key.clone().or(cfg.key), "key")?;

        let inline = args.payload.clone().or(cfg.payload);
        let file = args.payload_file.clone().or(cfg.payload_file);
        let payload_text = match (inline, file) {
            (Some(inline), _) => inline,
            (None, Some(path)) => std::fs::read_to_string(&path)
                .map_err(|e| ProducerError::Config(format!("cannot read payload {path}: {e}")))?,
            (None, None) => return Err(ProducerError::Config("payload or payload file is required".into())),
        };
        let payload = serde_json::from_str(&payload_text)?;

        Ok(Self {
            brokers: kafka_io::bootstrap_servers(&broker_host, broker_port),
            subject: args
                .subject
                .clone()
                .or(cfg.subject)
                .unwrap_or_else(|| format!("{topic}-value")),
            topic,
            schema_registry_url,
            key,
            payload,
            timeout: Duration::from_secs(args.timeout_secs.or(cfg.timeout_secs).unwrap_or(10)),
        })
    }
}

fn required<T>(value: Option<T>, name: &str) -> Result<T, ProducerError> {
    value.ok_or_else(|| ProducerError::Config(format!("{name} is required")))
}
