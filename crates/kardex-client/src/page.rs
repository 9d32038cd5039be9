//! Complete collection of paginated list endpoints.
//!
//! Both collaborators return the same list envelope: `{count, results,
//! next}`, where `next` is an absolute URL, a site-relative path, or null.
//! [`PagedFetcher`] follows `next` until the collection is complete and
//! never propagates an error past its boundary: collection stops and
//! whatever was accumulated is handed back, with the terminating error
//! recorded so callers can decide whether a partial result is acceptable.

use crate::auth::ApiAuth;
use crate::error::ClientError;
use reqwest::RequestBuilder;
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, warn};
use url::Url;

/// Hard ceiling on pages fetched from a single endpoint, against servers
/// that keep handing out `next` links.
const MAX_PAGES: usize = 500;

/// Page size used when a timed-out request is rebuilt from offset state and
/// the original query carried no explicit limit.
const RETRY_PAGE_SIZE: u64 = 100;

/// One page of a list endpoint.
#[derive(Debug, Deserialize)]
struct ListPage {
    #[serde(default)]
    count: Option<u64>,
    #[serde(default)]
    results: Vec<Value>,
    #[serde(default)]
    next: Option<String>,
}

/// The outcome of collecting an endpoint.
#[derive(Debug, Default)]
pub struct PageCollection {
    /// Every item accumulated, in page order.
    pub items: Vec<Value>,
    /// Set when collection stopped on an error; `items` then holds the
    /// partial result gathered up to that point.
    pub truncated: Option<ClientError>,
}

impl PageCollection {
    /// Treat truncation as fatal, yielding the item list only when the
    /// collection completed.
    pub fn into_result(self) -> Result<Vec<Value>, ClientError> {
        match self.truncated {
            Some(err) => Err(err),
            None => Ok(self.items),
        }
    }
}

/// The request that produces the next page: either the endpoint plus query
/// parameters (first page, or a rebuild after timeout) or a fully-formed
/// `next` link.
enum NextRequest {
    Query(Vec<(String, String)>),
    Link(Url),
}

/// Fetches every page of a list endpoint.
pub struct PagedFetcher<'a> {
    http: &'a reqwest::Client,
    auth: &'a ApiAuth,
}

impl<'a> PagedFetcher<'a> {
    pub fn new(http: &'a reqwest::Client, auth: &'a ApiAuth) -> Self {
        Self { http, auth }
    }

    /// Collect the complete ordered union of `results` across all pages of
    /// `path` under `base_url`.
    ///
    /// Site-relative `next` links are resolved against `base_url`. On a
    /// request timeout the next offset is recomputed from the number of
    /// items already observed (tracked as a value, never re-parsed out of a
    /// URL) and the request is retried once; a second consecutive timeout,
    /// or any other network or decode error, ends the collection with the
    /// partial result. When a page declares a total `count`, collection
    /// stops once that many items have been seen even if a `next` link is
    /// still present.
    pub async fn fetch_all(
        &self,
        base_url: &str,
        path: &str,
        query: &[(&str, &str)],
    ) -> PageCollection {
        let base = match normalize_base(base_url) {
            Ok(base) => base,
            Err(err) => {
                return PageCollection {
                    items: Vec::new(),
                    truncated: Some(err),
                }
            }
        };
        let endpoint = match base.join(path) {
            Ok(endpoint) => endpoint,
            Err(e) => {
                return PageCollection {
                    items: Vec::new(),
                    truncated: Some(ClientError::InvalidConfig(format!(
                        "invalid endpoint path {path}: {e}"
                    ))),
                }
            }
        };

        let mut items: Vec<Value> = Vec::new();
        let mut truncated = None;
        let mut expected: Option<u64> = None;
        let mut retried_after_timeout = false;
        let mut pages = 0usize;

        let mut next = NextRequest::Query(owned_pairs(query));

        loop {
            if pages >= MAX_PAGES {
                warn!(
                    endpoint = %endpoint,
                    pages = pages,
                    items = items.len(),
                    "page ceiling reached, stopping collection"
                );
                break;
            }
            pages += 1;

            let request = match &next {
                NextRequest::Query(pairs) => self.http.get(endpoint.clone()).query(pairs),
                NextRequest::Link(url) => self.http.get(url.clone()),
            };

            let page = match self.fetch_page(self.auth.apply(request)).await {
                Ok(page) => {
                    retried_after_timeout = false;
                    page
                }
                Err(err) if err.is_timeout() && !retried_after_timeout => {
                    retried_after_timeout = true;
                    warn!(
                        endpoint = %endpoint,
                        offset = items.len(),
                        "page request timed out, retrying once from tracked offset"
                    );
                    next = NextRequest::Query(retry_query(query, items.len() as u64));
                    continue;
                }
                Err(err) => {
                    warn!(endpoint = %endpoint, items = items.len(), error = %err, "collection stopped early");
                    truncated = Some(err);
                    break;
                }
            };

            if expected.is_none() {
                expected = page.count;
            }
            items.extend(page.results);
            debug!(endpoint = %endpoint, page = pages, items = items.len(), "collected page");

            // Cross-check against the declared total: once we have seen that
            // many items the collection is complete, trailing link or not.
            if let Some(total) = expected {
                if items.len() as u64 >= total {
                    break;
                }
            }

            match page.next {
                Some(link) => match base.join(&link) {
                    Ok(url) => next = NextRequest::Link(url),
                    Err(e) => {
                        truncated = Some(ClientError::Decode(format!(
                            "unresolvable next link {link}: {e}"
                        )));
                        break;
                    }
                },
                None => break,
            }
        }

        PageCollection { items, truncated }
    }

    async fn fetch_page(&self, request: RequestBuilder) -> Result<ListPage, ClientError> {
        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            let detail = response
                .text()
                .await
                .unwrap_or_else(|_| "<no body>".to_string());
            return Err(ClientError::Api {
                status: status.as_u16(),
                detail,
            });
        }
        let body = response.text().await?;
        serde_json::from_str(&body)
            .map_err(|e| ClientError::Decode(format!("invalid list envelope: {e}")))
    }
}

/// Parse and normalize a base URL so that joining endpoint paths keeps the
/// full base path.
fn normalize_base(base_url: &str) -> Result<Url, ClientError> {
    let trimmed = base_url.trim_end_matches('/');
    Url::parse(&format!("{trimmed}/"))
        .map_err(|e| ClientError::InvalidConfig(format!("invalid base URL {base_url}: {e}")))
}

fn owned_pairs(query: &[(&str, &str)]) -> Vec<(String, String)> {
    query
        .iter()
        .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
        .collect()
}

/// Rebuild the query for a retried page from the tracked offset.
fn retry_query(original: &[(&str, &str)], offset: u64) -> Vec<(String, String)> {
    let mut pairs: Vec<(String, String)> = original
        .iter()
        .filter(|(k, _)| *k != "offset")
        .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
        .collect();
    if !pairs.iter().any(|(k, _)| k == "limit") {
        pairs.push(("limit".to_string(), RETRY_PAGE_SIZE.to_string()));
    }
    pairs.push(("offset".to_string(), offset.to_string()));
    pairs
}
