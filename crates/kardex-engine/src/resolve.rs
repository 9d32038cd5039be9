//! Idempotent get-or-create for prerequisite entities.
//!
//! Every VM payload references already-resolved site, cluster and role ids,
//! so dependency resolution strictly precedes the VM upsert. Each `ensure_*`
//! consults the run cache first; on a miss it submits a single create call
//! and feeds the new entity back into the cache. A rejected create is
//! logged with the destination's own detail and surfaces as `None`, which
//! callers propagate by skipping the dependent record.
//!
//! Ordering contract: resolve a site and a cluster type before the cluster
//! that references them. Roles and tags have no cross-dependency.

use crate::cache::EntityCache;
use kardex_client::cmdb::{endpoints, CmdbClient};
use kardex_client::models::TagEntity;
use kardex_core::slug::{slugify, tag_slug};
use serde_json::{json, Value};
use tracing::{info, warn};

/// Color assigned to roles created by the synchronizer.
const ROLE_COLOR: &str = "9e9e9e";

/// Get-or-create resolver for dependency entities.
pub struct DependencyResolver<'a> {
    client: &'a CmdbClient,
}

impl<'a> DependencyResolver<'a> {
    pub fn new(client: &'a CmdbClient) -> Self {
        Self { client }
    }

    /// Ensure a site exists, returning its id.
    pub async fn ensure_site(&self, cache: &mut EntityCache, name: &str) -> Option<i64> {
        match cache.lookup_site(self.client, name).await {
            Ok(Some(id)) => return Some(id),
            Ok(None) => {}
            Err(e) => {
                warn!(site = %name, error = %e, "site lookup failed");
                return None;
            }
        }

        let payload = json!({
            "name": name,
            "slug": slugify(name),
            "status": "active",
        });
        let id = self.create_entity(endpoints::SITES, "site", name, &payload).await?;
        cache.memoize_site(name, id);
        Some(id)
    }

    /// Ensure a cluster type exists, returning its id.
    pub async fn ensure_cluster_type(&self, cache: &mut EntityCache, name: &str) -> Option<i64> {
        match cache.lookup_cluster_type(self.client, name).await {
            Ok(Some(id)) => return Some(id),
            Ok(None) => {}
            Err(e) => {
                warn!(cluster_type = %name, error = %e, "cluster type lookup failed");
                return None;
            }
        }

        let payload = json!({
            "name": name,
            "slug": slugify(name),
        });
        let id = self
            .create_entity(endpoints::CLUSTER_TYPES, "cluster type", name, &payload)
            .await?;
        cache.memoize_cluster_type(name, id);
        Some(id)
    }

    /// Ensure a cluster exists, referencing an already-resolved cluster type
    /// and site.
    pub async fn ensure_cluster(
        &self,
        cache: &mut EntityCache,
        name: &str,
        type_id: i64,
        site_id: i64,
    ) -> Option<i64> {
        match cache.lookup_cluster(self.client, name).await {
            Ok(Some(id)) => return Some(id),
            Ok(None) => {}
            Err(e) => {
                warn!(cluster = %name, error = %e, "cluster lookup failed");
                return None;
            }
        }

        let payload = json!({
            "name": name,
            "type": type_id,
            "site": site_id,
        });
        let id = self
            .create_entity(endpoints::CLUSTERS, "cluster", name, &payload)
            .await?;
        cache.memoize_cluster(name, id);
        Some(id)
    }

    /// Ensure a VM-capable role exists, returning its id.
    pub async fn ensure_role(&self, cache: &mut EntityCache, name: &str) -> Option<i64> {
        match cache.lookup_role(self.client, name).await {
            Ok(Some(id)) => return Some(id),
            Ok(None) => {}
            Err(e) => {
                warn!(role = %name, error = %e, "role lookup failed");
                return None;
            }
        }

        let payload = json!({
            "name": name,
            "slug": slugify(name),
            "color": ROLE_COLOR,
            "vm_role": true,
        });
        let id = self
            .create_entity(endpoints::DEVICE_ROLES, "role", name, &payload)
            .await?;
        cache.memoize_role(name, id);
        Some(id)
    }

    /// Ensure a tag exists for the (category, name) pair, returning its id.
    ///
    /// Tags are cached eagerly by slug; the slug folds the category in, so
    /// identically named tags from different categories stay distinct.
    pub async fn ensure_tag(
        &self,
        cache: &mut EntityCache,
        category: &str,
        name: &str,
        description: &str,
    ) -> Option<i64> {
        let slug = tag_slug(category, name);
        if let Some(tag) = cache.tags.get(&slug) {
            return Some(tag.id);
        }

        let payload = json!({
            "name": name,
            "slug": slug,
            "description": description,
        });
        let created = match self.client.create(endpoints::TAGS, &payload).await {
            Ok(created) => created,
            Err(e) => {
                warn!(tag = %slug, error = %e, "tag creation rejected");
                return None;
            }
        };

        match serde_json::from_value::<TagEntity>(created) {
            Ok(tag) => {
                info!(tag = %tag.slug, id = tag.id, "created tag");
                let id = tag.id;
                cache.insert_tag(tag);
                Some(id)
            }
            Err(e) => {
                warn!(tag = %slug, error = %e, "created tag has unexpected shape");
                None
            }
        }
    }

    /// Submit one create call and pull the assigned id out of the echo.
    async fn create_entity(
        &self,
        path: &str,
        kind: &'static str,
        name: &str,
        payload: &Value,
    ) -> Option<i64> {
        match self.client.create(path, payload).await {
            Ok(created) => match created.get("id").and_then(Value::as_i64) {
                Some(id) => {
                    info!(kind = kind, name = %name, id = id, "created dependency entity");
                    Some(id)
                }
                None => {
                    warn!(kind = kind, name = %name, "create response carried no id");
                    None
                }
            },
            Err(e) => {
                warn!(kind = kind, name = %name, error = %e, "dependency creation rejected");
                None
            }
        }
    }
}
