use std::future::Future;
use std::pin::Pin;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderName, HeaderValue};

use crate::error::{HeaderError, HttpStatusError, TemplateError, TransportError};
use crate::record::Record;
use crate::sanitize::sanitize_key;
use crate::url::UrlTemplate;

/// Header carrying the sanitized record key.
pub const KEY_HEADER: &str = "kafka_key";

/// Record header that is never forwarded.
pub const SKIPPED_RECORD_HEADER: &str = "id";

// ═══════════════════════════════════════════════════════════════
//  Static headers
// ═══════════════════════════════════════════════════════════════

/// One `name=value` header from configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpHeader {
    pub key: String,
    pub value: String,
}

impl HttpHeader {
    /// Splits on the first `=`; name and value are trimmed.
    pub fn parse(entry: &str) -> Result<Self, HeaderError> {
        let (key, value) = entry
            .split_once('=')
            .ok_or_else(|| HeaderError::Malformed(entry.to_string()))?;
        let (key, value) = (key.trim(), value.trim());
        if key.is_empty() {
            return Err(HeaderError::Malformed(entry.to_string()));
        }
        HeaderName::from_str(key).map_err(|_| HeaderError::InvalidName(key.to_string()))?;
        HeaderValue::from_str(value).map_err(|_| HeaderError::InvalidValue(key.to_string()))?;
        Ok(Self {
            key: key.to_string(),
            value: value.to_string(),
        })
    }
}

impl FromStr for HttpHeader {
    type Err = HeaderError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

// ═══════════════════════════════════════════════════════════════
//  HttpClient seam
// ═══════════════════════════════════════════════════════════════

#[derive(Debug, Clone)]
pub struct OutboundRequest {
    pub url: String,
    pub headers: HeaderMap,
    pub body: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub body: String,
}

pub trait HttpClient: Send + Sync {
    /// Sends one POST. Any completed exchange is `Ok`, whatever the status.
    fn post(
        &self,
        request: OutboundRequest,
    ) -> Pin<Box<dyn Future<Output = Result<HttpResponse, TransportError>> + Send + '_>>;
}

pub struct ReqwestClient {
    http: reqwest::Client,
}

impl ReqwestClient {
    pub fn new(timeout: Duration) -> Result<Self, TransportError> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| TransportError(format!("HTTP client: {e}")))?;
        Ok(Self { http })
    }
}

impl HttpClient for ReqwestClient {
    fn post(
        &self,
        request: OutboundRequest,
    ) -> Pin<Box<dyn Future<Output = Result<HttpResponse, TransportError>> + Send + '_>> {
        Box::pin(async move {
            let resp = self
                .http
                .post(&request.url)
                .headers(request.headers)
                .body(request.body)
                .send()
                .await?;
            let status = resp.status().as_u16();
            let body = resp.text().await?;
            Ok(HttpResponse { status, body })
        })
    }
}

// ═══════════════════════════════════════════════════════════════
//  Dispatcher
// ═══════════════════════════════════════════════════════════════

/// Successful exchange (status < 300).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Forwarded {
    pub status: u16,
    pub body: String,
}

#[derive(Debug, Clone, thiserror::Error)]
pub enum DispatchFailure {
    #[error(transparent)]
    Template(#[from] TemplateError),

    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error(transparent)]
    Status(#[from] HttpStatusError),
}

pub type DispatchResult = Result<Forwarded, DispatchFailure>;

pub struct Dispatcher {
    client: Arc<dyn HttpClient>,
    target: UrlTemplate,
    static_headers: HeaderMap,
}

impl Dispatcher {
    pub fn new(
        client: Arc<dyn HttpClient>,
        target: UrlTemplate,
        headers: &[HttpHeader],
    ) -> Result<Self, HeaderError> {
        let mut static_headers = HeaderMap::with_capacity(headers.len());
        for header in headers {
            let name = HeaderName::from_str(&header.key)
                .map_err(|_| HeaderError::InvalidName(header.key.clone()))?;
            let value = HeaderValue::from_str(&header.value)
                .map_err(|_| HeaderError::InvalidValue(header.key.clone()))?;
            static_headers.insert(name, value);
        }
        Ok(Self {
            client,
            target,
            static_headers,
        })
    }

    /// Static headers, then the key header, then the record's own headers
    /// except `id`. Later writes replace earlier ones.
    pub fn build_request(&self, record: &Record, body: &[u8]) -> Result<OutboundRequest, TemplateError> {
        let url = self.target.resolve(&record.key)?.into_owned();

        let mut headers = self.static_headers.clone();
        let key = sanitize_key(&record.key);
        match HeaderValue::from_bytes(key.as_bytes()) {
            Ok(value) => {
                headers.insert(HeaderName::from_static(KEY_HEADER), value);
            }
            Err(_) => tracing::warn!(key = %key, "record key is not a valid header value"),
        }

        for (name, value) in &record.headers {
            if name == SKIPPED_RECORD_HEADER {
                continue;
            }
            let parsed = (
                HeaderName::from_bytes(name.as_bytes()),
                HeaderValue::from_bytes(value),
            );
            match parsed {
                (Ok(name), Ok(value)) => {
                    headers.insert(name, value);
                }
                _ => tracing::warn!(header = %name, "skipping record header not valid for HTTP"),
            }
        }

        Ok(OutboundRequest {
            url,
            headers,
            body: body.to_vec(),
        })
    }

    pub async fn dispatch(&self, record: &Record, body: &[u8]) -> DispatchResult {
        let request = self.build_request(record, body)?;
        tracing::debug!(url = %request.url, bytes = request.body.len(), "posting record");

        let resp = self.client.post(request).await?;
        if resp.status >= 300 {
            return Err(HttpStatusError {
                code: resp.status,
                body: resp.body,
            }
            .into());
        }
        Ok(Forwarded {
            status: resp.status,
            body: resp.body,
        })
    }
}
