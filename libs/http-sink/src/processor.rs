use crate::dispatch::{Dispatcher, Forwarded};
use crate::envelope::EnvelopeDecoder;
use crate::error::ProcessError;
use crate::record::Record;
use crate::route::OutcomeRouter;

/// decode → dispatch → route for one record.
pub struct Processor {
    decoder: EnvelopeDecoder,
    dispatcher: Dispatcher,
    router: OutcomeRouter,
}

impl Processor {
    pub fn new(decoder: EnvelopeDecoder, dispatcher: Dispatcher, router: OutcomeRouter) -> Self {
        Self {
            decoder,
            dispatcher,
            router,
        }
    }

    /// Runs the whole pipeline for `record`. A decode failure stops before
    /// any HTTP call is made and nothing is published.
    pub async fn process(&self, record: &Record) -> Result<Forwarded, ProcessError> {
        let body = self.decoder.decode(&record.value).await?;
        let result = self.dispatcher.dispatch(record, &body).await;
        let forwarded = self.router.route(record, &body, result).await?;
        tracing::debug!(
            offset = record.offset,
            status = forwarded.status,
            body = %forwarded.body,
            "got successful response"
        );
        Ok(forwarded)
    }
}
