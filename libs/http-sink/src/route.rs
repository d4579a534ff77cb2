use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use serde::Serialize;
use serde_json::value::RawValue;

use crate::dispatch::{DispatchFailure, DispatchResult, Forwarded};
use crate::error::{ProcessError, RouteError, SinkError};
use crate::record::Record;

// ═══════════════════════════════════════════════════════════════
//  RecordSink seam
// ═══════════════════════════════════════════════════════════════

/// Append-only destination for key/value records (a topic).
pub trait RecordSink: Send + Sync {
    fn publish<'a>(
        &'a self,
        key: &'a [u8],
        value: &'a [u8],
    ) -> Pin<Box<dyn Future<Output = Result<(), SinkError>> + Send + 'a>>;
}

// ═══════════════════════════════════════════════════════════════
//  ErrorPayload
// ═══════════════════════════════════════════════════════════════

/// Value written to the error topic when a dispatch fails.
#[derive(Debug, Serialize)]
pub struct ErrorPayload {
    pub response_body: String,
    /// HTTP status, or `0` when no response was received.
    pub response_code: u16,
    /// The request body, embedded as JSON when it parses and as a JSON
    /// string otherwise.
    pub request_body_json: Box<RawValue>,
}

impl ErrorPayload {
    pub fn new(response_body: String, response_code: u16, request_body: &[u8]) -> Result<Self, serde_json::Error> {
        let embedded = match std::str::from_utf8(request_body) {
            Ok(text) => RawValue::from_string(text.to_string()).ok(),
            Err(_) => None,
        };
        let request_body_json = match embedded {
            Some(raw) => raw,
            None => {
                let text = String::from_utf8_lossy(request_body);
                RawValue::from_string(serde_json::to_string(&text)?)?
            }
        };
        Ok(Self {
            response_body,
            response_code,
            request_body_json,
        })
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(self)
    }
}

// ═══════════════════════════════════════════════════════════════
//  OutcomeRouter
// ═══════════════════════════════════════════════════════════════

pub struct OutcomeRouter {
    success: Option<Arc<dyn RecordSink>>,
    error: Option<Arc<dyn RecordSink>>,
}

impl OutcomeRouter {
    pub fn new(success: Option<Arc<dyn RecordSink>>, error: Option<Arc<dyn RecordSink>>) -> Self {
        Self { success, error }
    }

    /// Records the outcome of one dispatch.
    ///
    /// On success the decoded body goes to the success sink. On an HTTP
    /// failure an [`ErrorPayload`] goes to the error sink and the dispatch
    /// error is still returned. URL template errors are returned without
    /// publishing anything.
    pub async fn route(
        &self,
        record: &Record,
        body: &[u8],
        result: DispatchResult,
    ) -> Result<Forwarded, ProcessError> {
        let failure = match result {
            Ok(forwarded) => {
                if let Some(sink) = &self.success {
                    sink.publish(&record.key, body)
                        .await
                        .map_err(RouteError::SuccessTopic)?;
                }
                return Ok(forwarded);
            }
            Err(failure) => failure,
        };

        let payload = match &failure {
            DispatchFailure::Template(_) => None,
            DispatchFailure::Status(e) => Some(ErrorPayload::new(e.body.clone(), e.code, body)),
            DispatchFailure::Transport(e) => Some(ErrorPayload::new(e.to_string(), 0, body)),
        };

        if let (Some(sink), Some(payload)) = (&self.error, payload) {
            let value = payload.and_then(|p| p.to_bytes()).map_err(RouteError::Payload)?;
            if let Err(sink_err) = sink.publish(&record.key, &value).await {
                return Err(RouteError::ErrorTopic {
                    sink: sink_err,
                    original: failure.to_string(),
                }
                .into());
            }
        }

        Err(failure.into())
    }
}

impl From<DispatchFailure> for ProcessError {
    fn from(failure: DispatchFailure) -> Self {
        match failure {
            DispatchFailure::Template(e) => ProcessError::Template(e),
            DispatchFailure::Transport(e) => ProcessError::Transport(e),
            DispatchFailure::Status(e) => ProcessError::HttpStatus(e),
        }
    }
}
