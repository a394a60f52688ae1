//! HTTP client for a remote semantic search service.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, StatusCode};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use super::{SearchFilters, SemanticRecord, SemanticStore};
use crate::error::{Error, Result};

/// Semantic store reached over HTTP.
///
/// Routes are relative to `base_url`:
///
/// | operation | route |
/// |-----------|-------|
/// | search | `POST /collections/{c}/search` |
/// | insert | `POST /collections/{c}/records` |
/// | count  | `GET /collections/{c}/count` |
/// | recent | `GET /collections/{c}/records?limit=N` |
/// | evict  | `POST /collections/{c}/evict` |
/// | delete | `DELETE /collections/{c}/records/{id}` |
#[derive(Clone)]
pub struct HttpSemanticStore {
    base_url: String,
    api_key: Option<String>,
    client: Client,
}

impl HttpSemanticStore {
    /// Create a client for the service at `base_url`.
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::Other(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: None,
            client,
        })
    }

    /// Set the bearer token sent with every request
    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    fn url(&self, collection: &str, suffix: &str) -> String {
        format!("{}/collections/{}{}", self.base_url, collection, suffix)
    }

    fn authorize(&self, req: RequestBuilder) -> RequestBuilder {
        match &self.api_key {
            Some(key) => req.bearer_auth(key),
            None => req,
        }
    }

    /// Send a request and decode a JSON body; 404 means the collection is missing.
    async fn send_json<T: DeserializeOwned>(&self, collection: &str, req: RequestBuilder) -> Result<T> {
        let resp = self.authorize(req).send().await?;
        let status = resp.status();

        if status.is_success() {
            Ok(resp.json::<T>().await?)
        } else if status == StatusCode::NOT_FOUND {
            Err(Error::CollectionNotFound(collection.to_string()))
        } else {
            let body = resp.text().await.unwrap_or_default();
            Err(Error::api(status.as_u16(), body))
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Request/Response Types
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
struct SearchRequest<'a> {
    query: &'a str,
    top_k: usize,
    #[serde(skip_serializing_if = "no_filters")]
    filters: &'a SearchFilters,
}

fn no_filters(filters: &&SearchFilters) -> bool {
    filters.is_empty()
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    results: Vec<SemanticRecord>,
}

#[derive(Debug, Serialize)]
struct InsertRequest<'a> {
    id: &'a str,
    content: &'a str,
    metadata: Value,
}

#[derive(Debug, Deserialize)]
struct CountResponse {
    count: usize,
}

#[derive(Debug, Deserialize)]
struct RecordsResponse {
    #[serde(default)]
    records: Vec<SemanticRecord>,
}

#[derive(Debug, Serialize)]
struct EvictRequest {
    count: usize,
    order: &'static str,
}

#[derive(Debug, Deserialize)]
struct EvictResponse {
    evicted: usize,
}

#[async_trait]
impl SemanticStore for HttpSemanticStore {
    async fn search(
        &self,
        collection: &str,
        query: &str,
        top_k: usize,
        filters: &SearchFilters,
    ) -> Result<Vec<SemanticRecord>> {
        debug!(collection, top_k, "Semantic search");
        let body = SearchRequest { query, top_k, filters };
        let req = self.client.post(self.url(collection, "/search")).json(&body);
        let resp: SearchResponse = self.send_json(collection, req).await?;
        Ok(resp.results)
    }

    async fn insert(&self, collection: &str, id: &str, content: &str, metadata: Value) -> Result<()> {
        let body = InsertRequest { id, content, metadata };
        let resp = self
            .authorize(self.client.post(self.url(collection, "/records")).json(&body))
            .send()
            .await?;

        let status = resp.status();
        if status.is_success() {
            Ok(())
        } else {
            let body = resp.text().await.unwrap_or_default();
            Err(Error::api(status.as_u16(), body))
        }
    }

    async fn count(&self, collection: &str) -> Result<usize> {
        let req = self.client.get(self.url(collection, "/count"));
        let resp: CountResponse = self.send_json(collection, req).await?;
        Ok(resp.count)
    }

    async fn recent(&self, collection: &str, limit: usize) -> Result<Vec<SemanticRecord>> {
        let req = self
            .client
            .get(self.url(collection, "/records"))
            .query(&[("limit", limit.to_string())]);
        let resp: RecordsResponse = self.send_json(collection, req).await?;
        Ok(resp.records)
    }

    async fn evict_least_recently_accessed(&self, collection: &str, count: usize) -> Result<usize> {
        let body = EvictRequest {
            count,
            order: "least_recently_accessed",
        };
        let req = self.client.post(self.url(collection, "/evict")).json(&body);
        let resp: EvictResponse = self.send_json(collection, req).await?;
        Ok(resp.evicted)
    }

    async fn delete(&self, collection: &str, id: &str) -> Result<bool> {
        let resp = self
            .authorize(self.client.delete(self.url(collection, &format!("/records/{}", id))))
            .send()
            .await?;

        let status = resp.status();
        if status.is_success() {
            Ok(true)
        } else if status == StatusCode::NOT_FOUND {
            Ok(false)
        } else {
            let body = resp.text().await.unwrap_or_default();
            Err(Error::api(status.as_u16(), body))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_url_building() {
        let store = HttpSemanticStore::new("http://localhost:6333/", Duration::from_secs(5)).unwrap();
        assert_eq!(
            store.url("ltm-agent-1", "/search"),
            "http://localhost:6333/collections/ltm-agent-1/search"
        );
    }

    #[test]
    fn test_search_request_omits_empty_filters() {
        let filters = SearchFilters::new();
        let body = SearchRequest {
            query: "rust",
            top_k: 3,
            filters: &filters,
        };
        let json = serde_json::to_value(&body).unwrap();
        assert!(json.get("filters").is_none());
        assert_eq!(json["top_k"], 3);
    }

    #[test]
    fn test_search_response_tolerates_missing_fields() {
        let resp: SearchResponse =
            serde_json::from_str(r#"{"results":[{"id":"1","content":"hello"}]}"#).unwrap();
        assert_eq!(resp.results.len(), 1);
        assert_eq!(resp.results[0].score, 0.0);
        assert!(resp.results[0].metadata.is_null());
    }
}
