use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use serde::Deserialize;
use serde::de::DeserializeOwned;

use crate::error::CatalogError;

const ACCEPT: &str = "application/vnd.schemaregistry.v1+json";

// ═══════════════════════════════════════════════════════════════
//  SchemaCatalog: lookup of writer schemas by numeric id
// ═══════════════════════════════════════════════════════════════

pub trait SchemaCatalog: Send + Sync {
    /// Returns the schema definition text registered under `id`.
    fn schema_by_id(
        &self,
        id: u32,
    ) -> Pin<Box<dyn Future<Output = Result<String, CatalogError>> + Send + '_>>;
}

/// Latest registered version of a subject.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct RegisteredSchema {
    pub id: u32,
    pub schema: String,
}

#[derive(Deserialize)]
struct SchemaById {
    schema: String,
}

// ═══════════════════════════════════════════════════════════════
//  RegistryClient: Confluent-compatible REST registry
// ═══════════════════════════════════════════════════════════════

pub struct RegistryClient {
    http: reqwest::Client,
    base_url: String,
}

impl RegistryClient {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, CatalogError> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| CatalogError::Registry(format!("HTTP client: {e}")))?;

        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn schema_url(&self, id: u32) -> String {
        format!("{}/schemas/ids/{id}", self.base_url)
    }

    fn latest_url(&self, subject: &str) -> String {
        format!(
            "{}/subjects/{}/versions/latest",
            self.base_url,
            urlencoding::encode(subject)
        )
    }

    /// Fetches the latest schema registered for `subject`.
    pub async fn latest_for_subject(&self, subject: &str) -> Result<RegisteredSchema, CatalogError> {
        self.get_json(self.latest_url(subject), || {
            CatalogError::SubjectNotFound(subject.to_string())
        })
        .await
    }

    async fn fetch_by_id(&self, id: u32) -> Result<String, CatalogError> {
        let found: SchemaById = self
            .get_json(self.schema_url(id), || CatalogError::NotFound(id))
            .await?;
        Ok(found.schema)
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        url: String,
        not_found: impl FnOnce() -> CatalogError,
    ) -> Result<T, CatalogError> {
        tracing::debug!(url = %url, "schema registry request");

        let resp = self
            .http
            .get(&url)
            .header(reqwest::header::ACCEPT, ACCEPT)
            .send()
            .await
            .map_err(|e| CatalogError::Registry(format!("request: {e}")))?;

        let status = resp.status();
        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(not_found());
        }

        let body = resp
            .text()
            .await
            .map_err(|e| CatalogError::Registry(format!("response body: {e}")))?;

        if !status.is_success() {
            return Err(CatalogError::Registry(format!("{status}: {body}")));
        }

        serde_json::from_str(&body).map_err(|e| CatalogError::Registry(format!("response json: {e}")))
    }
}

impl SchemaCatalog for RegistryClient {
    fn schema_by_id(
        &self,
        id: u32,
    ) -> Pin<Box<dyn Future<Output = Result<String, CatalogError>> + Send + '_>> {
        Box::pin(self.fetch_by_id(id))
    }
}
