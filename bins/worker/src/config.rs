use std::time::Duration;

use clap::{Args, Parser, Subcommand};
use serde::Deserialize;

use http_sink::HttpHeader;

use crate::error::WorkerError;

#[derive(Parser)]
#[command(name = "sink-worker", about = "Пересылка записей Kafka в HTTP API")]
pub struct Cli {
    /// Логи в формате JSON
    #[arg(long, env = "LOG_JSON", global = true)]
    pub log_json: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Читать топик и отправлять записи в HTTP API
    Run(RunArgs),
}

#[derive(Args, Clone, Debug, Default)]
pub struct RunArgs {
    /// Путь к TOML конфиг файлу (необязательный)
    #[arg(long, default_value = "sink.toml", env = "SINK_CONFIG")]
    pub config: String,

    /// Хост брокера Kafka
    #[arg(long, env = "KAFKA_BROKER_HOST")]
    pub broker_host: Option<String>,

    /// Порт брокера Kafka
    #[arg(long, env = "KAFKA_BROKER_PORT")]
    pub broker_port: Option<u16>,

    /// Входной топик
    #[arg(long, env = "KAFKA_TOPIC")]
    pub topic: Option<String>,

    /// Consumer group
    #[arg(long, env = "KAFKA_CONSUMER_GROUP_NAME")]
    pub consumer_group: Option<String>,

    /// Топик для успешно отправленных записей
    #[arg(long, env = "KAFKA_SUCCESS_TOPIC")]
    pub success_topic: Option<String>,

    /// Топик для ошибок HTTP
    #[arg(long, env = "KAFKA_ERROR_TOPIC")]
    pub error_topic: Option<String>,

    /// URL schema registry. Без него Avro-декодирование выключено
    #[arg(long, env = "KAFKA_SCHEMA_REGISTRY_URL")]
    pub schema_registry_url: Option<String>,

    /// URL HTTP API, может содержать плейсхолдер ключа
    #[arg(long, env = "HTTP_API_URL")]
    pub http_url: Option<String>,

    /// Плейсхолдер в URL, заменяемый ключом записи (напр. :userId)
    #[arg(long, env = "HTTP_API_PATH_PARAM")]
    pub http_path_param: Option<String>,

    /// Статические заголовки name=value, через запятую
    #[arg(long = "http-header", env = "HTTP_HEADERS", value_delimiter = ',')]
    pub http_headers: Vec<String>,

    /// Таймаут HTTP запроса, секунды
    #[arg(long, env = "HTTP_TIMEOUT_SECS")]
    pub http_timeout_secs: Option<u64>,
}

// ═══════════════════════════════════════════════════════════════
//  Config file (TOML)
// ═══════════════════════════════════════════════════════════════

#[derive(Debug, Default, Deserialize)]
pub struct FileConfig {
    #[serde(default)]
    pub kafka: KafkaSection,
    #[serde(default)]
    pub http: HttpSection,
}

#[derive(Debug, Default, Deserialize)]
pub struct KafkaSection {
    pub broker_host: Option<String>,
    pub broker_port: Option<u16>,
    pub topic: Option<String>,
    pub consumer_group: Option<String>,
    pub success_topic: Option<String>,
    pub error_topic: Option<String>,
    pub schema_registry_url: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct HttpSection {
    pub url: Option<String>,
    pub path_param: Option<String>,
    #[serde(default)]
    pub headers: Vec<String>,
    pub timeout_secs: Option<u64>,
}

fn default_timeout_secs() -> u64 {
    30
}

pub fn load_config(path: &str) -> Result<FileConfig, WorkerError> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| WorkerError::config("file", format!("cannot read config {path}: {e}")))?;
    toml::from_str(&content).map_err(|e| WorkerError::config("file", format!("bad config {path}: {e}")))
}

// ═══════════════════════════════════════════════════════════════
//  Effective: merged config
// ═══════════════════════════════════════════════════════════════

/// Итоговая конфигурация после мержа: sink.toml < env/CLI
#[derive(Debug)]
pub struct Effective {
    pub brokers: String,
    pub topic: String,
    pub consumer_group: String,
    pub success_topic: Option<String>,
    pub error_topic: Option<String>,
    pub schema_registry_url: Option<String>,
    pub http_url: String,
    pub http_path_param: Option<String>,
    pub http_headers: Vec<HttpHeader>,
    pub http_timeout: Duration,
}

impl Effective {
    pub fn new(args: &RunArgs) -> Result<Self, WorkerError> {
        let cfg = match load_config(&args.config) {
            Ok(c) => c,
            Err(e) => {
                if std::path::Path::new(&args.config).exists() {
                    return Err(e);
                }
                FileConfig::default()
            }
        };
        Self::merge(args, cfg)
    }

    pub fn merge(args: &RunArgs, cfg: FileConfig) -> Result<Self, WorkerError> {
        let FileConfig { kafka, http } = cfg;

        let broker_host = required(pick(&args.broker_host, kafka.broker_host), "kafka", "broker host")?;
        let broker_port = required(args.broker_port.or(kafka.broker_port), "kafka", "broker port")?;
        let topic = required(pick(&args.topic, kafka.topic), "kafka", "topic")?;
        let consumer_group = required(pick(&args.consumer_group, kafka.consumer_group), "kafka", "consumer group")?;
        let http_url = required(pick(&args.http_url, http.url), "http", "url")?;

        let http_path_param = pick(&args.http_path_param, http.path_param);
        if let Some(param) = &http_path_param {
            if !http_url.contains(param.as_str()) {
                return Err(WorkerError::config(
                    "http",
                    format!("placeholder '{param}' not found in URL '{http_url}'"),
                ));
            }
        }

        let header_entries = if args.http_headers.is_empty() {
            http.headers
        } else {
            args.http_headers.clone()
        };
        let http_headers = header_entries
            .iter()
            .filter(|entry| !entry.trim().is_empty())
            .map(|entry| HttpHeader::parse(entry))
            .collect::<Result<Vec<_>, _>>()?;

        let timeout_secs = args
            .http_timeout_secs
            .or(http.timeout_secs)
            .unwrap_or_else(default_timeout_secs);
        if timeout_secs == 0 {
            return Err(WorkerError::config("http", "timeout must be greater than zero"));
        }

        Ok(Self {
            brokers: kafka_io::bootstrap_servers(&broker_host, broker_port),
            topic,
            consumer_group,
            success_topic: pick(&args.success_topic, kafka.success_topic),
            error_topic: pick(&args.error_topic, kafka.error_topic),
            schema_registry_url: pick(&args.schema_registry_url, kafka.schema_registry_url),
            http_url,
            http_path_param,
            http_headers,
            http_timeout: Duration::from_secs(timeout_secs),
        })
    }
}

/// CLI/env wins over the file; blank values count as unset.
fn pick(arg: &Option<String>, file: Option<String>) -> Option<String> {
    arg.clone()
        .filter(|v| !v.trim().is_empty())
        .or(file)
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn required<T>(value: Option<T>, context: &'static str, name: &str) -> Result<T, WorkerError> {
    value.ok_or_else(|| WorkerError::config(context, format!("{name} is required")))
}
