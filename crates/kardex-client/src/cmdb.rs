//! Destination CMDB HTTP client (reqwest-based).
//!
//! Token-authenticated REST API. List endpoints accept `?name=`, `?limit=`
//! and `?offset=` filters and return the `{count, results, next}` envelope;
//! mutation endpoints accept a single object or an array of objects for
//! bulk create/update, and bulk delete answers 204 with an empty body.

use crate::auth::ApiAuth;
use crate::error::{ClientError, ClientResult};
use crate::page::{PageCollection, PagedFetcher};
use kardex_core::config::CmdbConfig;
use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::time::Duration;
use tracing::debug;

/// Page size used for full-collection listings.
const PAGE_LIMIT: &str = "200";

/// Collection paths under the API root.
pub mod endpoints {
    pub const SITES: &str = "api/dcim/sites/";
    pub const DEVICE_ROLES: &str = "api/dcim/device-roles/";
    pub const CLUSTER_TYPES: &str = "api/virtualization/cluster-types/";
    pub const CLUSTERS: &str = "api/virtualization/clusters/";
    pub const VIRTUAL_MACHINES: &str = "api/virtualization/virtual-machines/";
    pub const INTERFACES: &str = "api/virtualization/interfaces/";
    pub const IP_ADDRESSES: &str = "api/ipam/ip-addresses/";
    pub const TAGS: &str = "api/extras/tags/";
}

/// HTTP client for the destination CMDB.
#[derive(Debug, Clone)]
pub struct CmdbClient {
    base_url: String,
    auth: ApiAuth,
    http: Client,
}

impl CmdbClient {
    /// Build a client from the destination configuration.
    pub fn new(config: &CmdbConfig) -> ClientResult<Self> {
        let http = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .danger_accept_invalid_certs(!config.verify_tls)
            .user_agent("kardex-sync/0.4")
            .build()
            .map_err(|e| ClientError::InvalidConfig(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            base_url: config.base_url.trim_end_matches('/').to_string(),
            auth: ApiAuth::Token {
                token: config.token.clone(),
            },
            http,
        })
    }

    /// Get the base URL.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path)
    }

    fn url_for_id(&self, path: &str, id: i64) -> String {
        format!("{}/{}{}/", self.base_url, path, id)
    }

    // ── Collection ────────────────────────────────────────────────────

    /// Collect every item of a collection, optionally filtered.
    ///
    /// Never raises: a collection error is recorded on the returned
    /// [`PageCollection`] for the caller to judge.
    pub async fn list_all(&self, path: &str, extra: &[(&str, &str)]) -> PageCollection {
        let mut query: Vec<(&str, &str)> = vec![("limit", PAGE_LIMIT)];
        query.extend_from_slice(extra);

        PagedFetcher::new(&self.http, &self.auth)
            .fetch_all(&self.base_url, path, &query)
            .await
    }

    /// Find a single entity by its exact name.
    ///
    /// The endpoint filter is a broad match, so the name is re-checked
    /// client-side before an entity is returned.
    pub async fn find_by_name(&self, path: &str, name: &str) -> ClientResult<Option<Value>> {
        let items = self.list_all(path, &[("name", name)]).await.into_result()?;
        Ok(items
            .into_iter()
            .find(|item| item.get("name").and_then(Value::as_str) == Some(name)))
    }

    // ── Mutation ──────────────────────────────────────────────────────

    /// Create a single entity.
    pub async fn create(&self, path: &str, payload: &Value) -> ClientResult<Value> {
        let url = self.url(path);
        debug!(url = %url, "CMDB create");
        let request = self.auth.apply(self.http.post(&url)).json(payload);
        self.handle_response(request.send().await?).await
    }

    /// Create a chunk of entities with one array call, returning the
    /// created entities in submission order.
    pub async fn bulk_create(&self, path: &str, items: &[Value]) -> ClientResult<Vec<Value>> {
        let url = self.url(path);
        debug!(url = %url, count = items.len(), "CMDB bulk create");
        let request = self.auth.apply(self.http.post(&url)).json(items);
        self.handle_response(request.send().await?).await
    }

    /// Update a chunk of entities (each carrying its `id`) with one array
    /// call.
    pub async fn bulk_update(&self, path: &str, items: &[Value]) -> ClientResult<Vec<Value>> {
        let url = self.url(path);
        debug!(url = %url, count = items.len(), "CMDB bulk update");
        let request = self.auth.apply(self.http.patch(&url)).json(items);
        self.handle_response(request.send().await?).await
    }

    /// Delete a chunk of entities by id with one array call. The endpoint
    /// answers 204 with an empty body.
    pub async fn bulk_delete(&self, path: &str, ids: &[i64]) -> ClientResult<()> {
        let url = self.url(path);
        debug!(url = %url, count = ids.len(), "CMDB bulk delete");
        let body: Vec<Value> = ids.iter().map(|id| serde_json::json!({ "id": id })).collect();
        let request = self.auth.apply(self.http.delete(&url)).json(&body);
        let response = request.send().await?;

        let status = response.status();
        if status == StatusCode::NO_CONTENT || status.is_success() {
            Ok(())
        } else {
            Err(self.error_from(response).await)
        }
    }

    /// Partially update one entity.
    pub async fn patch(&self, path: &str, id: i64, payload: &Value) -> ClientResult<Value> {
        let url = self.url_for_id(path, id);
        debug!(url = %url, "CMDB patch");
        let request = self.auth.apply(self.http.patch(&url)).json(payload);
        self.handle_response(request.send().await?).await
    }

    // ── Response handling ─────────────────────────────────────────────

    async fn handle_response<T: DeserializeOwned>(
        &self,
        response: reqwest::Response,
    ) -> ClientResult<T> {
        let status = response.status();
        if status.is_success() {
            let body = response.text().await?;
            serde_json::from_str(&body)
                .map_err(|e| ClientError::Decode(format!("failed to parse response: {e}")))
        } else {
            Err(self.error_from(response).await)
        }
    }

    async fn error_from(&self, response: reqwest::Response) -> ClientError {
        let status = response.status();
        let body = response
            .text()
            .await
            .unwrap_or_else(|_| "<no body>".to_string());

        match status {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                ClientError::Auth(format!("HTTP {status}: {body}"))
            }
            StatusCode::NOT_FOUND => ClientError::NotFound(body),
            _ => ClientError::Api {
                status: status.as_u16(),
                detail: if body.is_empty() {
                    format!("HTTP {status}")
                } else {
                    body
                },
            },
        }
    }
}
