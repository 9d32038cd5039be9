//! Source automation platform client.
//!
//! Enumerates inventories and the hosts inside them, turning each host's
//! variable payload into a [`SourceRecord`]. The source is authoritative
//! but unreliable-friendly: a failed collection yields the records gathered
//! so far, and a host with a malformed payload is dropped, not fatal.

use crate::auth::ApiAuth;
use crate::error::{ClientError, ClientResult};
use crate::page::PagedFetcher;
use kardex_core::config::SourceConfig;
use kardex_core::record::SourceRecord;
use reqwest::Client;
use serde_json::Value;
use std::time::Duration;
use tracing::{info, warn};

const INVENTORIES_PATH: &str = "api/v2/inventories/";

/// HTTP client for the source inventory API.
#[derive(Debug, Clone)]
pub struct SourceClient {
    base_url: String,
    auth: ApiAuth,
    http: Client,
}

impl SourceClient {
    /// Build a client from the source configuration.
    pub fn new(config: &SourceConfig) -> ClientResult<Self> {
        let http = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .danger_accept_invalid_certs(!config.verify_tls)
            .user_agent("kardex-sync/0.4")
            .build()
            .map_err(|e| ClientError::InvalidConfig(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            base_url: config.base_url.trim_end_matches('/').to_string(),
            auth: ApiAuth::Basic {
                username: config.username.clone(),
                password: config.password.clone(),
            },
            http,
        })
    }

    /// Get the base URL.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Collect every VM record across all inventories.
    ///
    /// Collection failures are logged and produce a partial result rather
    /// than an error: whatever the source managed to hand over is synced.
    pub async fn collect_records(&self) -> Vec<SourceRecord> {
        let fetcher = PagedFetcher::new(&self.http, &self.auth);

        let inventories = fetcher.fetch_all(&self.base_url, INVENTORIES_PATH, &[]).await;
        if let Some(ref err) = inventories.truncated {
            warn!(error = %err, "inventory listing incomplete, continuing with partial set");
        }

        let mut records = Vec::new();
        for inventory in &inventories.items {
            let Some(inventory_id) = inventory.get("id").and_then(Value::as_i64) else {
                continue;
            };
            let inventory_name = inventory
                .get("name")
                .and_then(Value::as_str)
                .unwrap_or("<unnamed>");

            let hosts_path = format!("api/v2/inventories/{inventory_id}/hosts/");
            let hosts = fetcher.fetch_all(&self.base_url, &hosts_path, &[]).await;
            if let Some(ref err) = hosts.truncated {
                warn!(
                    inventory = %inventory_name,
                    error = %err,
                    "host listing incomplete, continuing with partial set"
                );
            }

            let mut collected = 0usize;
            let mut dropped = 0usize;
            for host in &hosts.items {
                let host_name = host.get("name").and_then(Value::as_str).unwrap_or_default();
                match SourceRecord::from_variables(host_name, host.get("variables")) {
                    Some(record) => {
                        collected += 1;
                        records.push(record);
                    }
                    None => dropped += 1,
                }
            }

            info!(
                inventory = %inventory_name,
                hosts = collected,
                dropped = dropped,
                "collected inventory"
            );
        }

        info!(total = records.len(), "source collection complete");
        records
    }
}
