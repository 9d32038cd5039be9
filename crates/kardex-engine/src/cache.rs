//! Run-scoped destination entity cache.
//!
//! One `EntityCache` lives for exactly one sync run and is passed
//! explicitly into the resolver and executors; there is no shared global
//! state. High-churn collections (VMs, interfaces, IP addresses, tags) are
//! loaded eagerly in bulk before any mutation. Low-churn dependency
//! collections (sites, cluster types, clusters, roles) are looked up
//! lazily, scoped to a name filter, on first access.
//!
//! Within one run a given name is looked up against the network at most
//! once: lazy lookups memoize misses as well as hits, and every entity
//! created during the run is inserted back so later lookups see it.

use crate::error::{SyncError, SyncResult};
use kardex_client::cmdb::{endpoints, CmdbClient};
use kardex_client::error::ClientResult;
use kardex_client::models::{strip_mask, InterfaceEntity, IpAddressEntity, TagEntity, VmEntity};
use serde_json::Value;
use std::collections::HashMap;
use tracing::{debug, warn};

/// In-memory mapping from natural keys to destination entities.
#[derive(Debug, Default)]
pub struct EntityCache {
    /// VMs by name.
    pub vms: HashMap<String, VmEntity>,
    /// Interfaces by (vm id, interface name).
    pub interfaces: HashMap<(i64, String), InterfaceEntity>,
    /// IP addresses by bare address (mask stripped).
    pub ips: HashMap<String, IpAddressEntity>,
    /// Tags by slug.
    pub tags: HashMap<String, TagEntity>,

    sites: HashMap<String, Option<i64>>,
    cluster_types: HashMap<String, Option<i64>>,
    clusters: HashMap<String, Option<i64>>,
    roles: HashMap<String, Option<i64>>,
}

impl EntityCache {
    /// Bulk-load the eager caches from the destination.
    ///
    /// An incomplete collection here would misclassify creates as updates
    /// (or worse, the reverse), so any truncation aborts the run.
    pub async fn load(client: &CmdbClient) -> SyncResult<Self> {
        let mut cache = Self::default();

        let vms = Self::load_collection(client, endpoints::VIRTUAL_MACHINES, "virtual machine")
            .await?;
        for value in vms {
            match serde_json::from_value::<VmEntity>(value) {
                Ok(vm) => {
                    cache.vms.insert(vm.name.clone(), vm);
                }
                Err(e) => warn!(error = %e, "skipping malformed virtual machine entity"),
            }
        }

        let interfaces =
            Self::load_collection(client, endpoints::INTERFACES, "interface").await?;
        for value in interfaces {
            match serde_json::from_value::<InterfaceEntity>(value) {
                Ok(iface) => cache.insert_interface(iface),
                Err(e) => warn!(error = %e, "skipping malformed interface entity"),
            }
        }

        let ips = Self::load_collection(client, endpoints::IP_ADDRESSES, "IP address").await?;
        for value in ips {
            match serde_json::from_value::<IpAddressEntity>(value) {
                Ok(ip) => cache.insert_ip(ip),
                Err(e) => warn!(error = %e, "skipping malformed IP address entity"),
            }
        }

        let tags = Self::load_collection(client, endpoints::TAGS, "tag").await?;
        for value in tags {
            match serde_json::from_value::<TagEntity>(value) {
                Ok(tag) => {
                    cache.tags.insert(tag.slug.clone(), tag);
                }
                Err(e) => warn!(error = %e, "skipping malformed tag entity"),
            }
        }

        debug!(
            vms = cache.vms.len(),
            interfaces = cache.interfaces.len(),
            ips = cache.ips.len(),
            tags = cache.tags.len(),
            "destination caches loaded"
        );

        Ok(cache)
    }

    async fn load_collection(
        client: &CmdbClient,
        path: &str,
        entity: &'static str,
    ) -> SyncResult<Vec<Value>> {
        client
            .list_all(path, &[])
            .await
            .into_result()
            .map_err(|source| SyncError::CacheLoad { entity, source })
    }

    // ── Eager cache insertion (mutation feedback) ─────────────────────

    pub fn insert_vm(&mut self, vm: VmEntity) {
        self.vms.insert(vm.name.clone(), vm);
    }

    pub fn insert_interface(&mut self, iface: InterfaceEntity) {
        if let Some(vm_id) = iface.virtual_machine {
            self.interfaces.insert((vm_id, iface.name.clone()), iface);
        }
    }

    pub fn insert_ip(&mut self, ip: IpAddressEntity) {
        self.ips.insert(ip.bare_address().to_string(), ip);
    }

    pub fn insert_tag(&mut self, tag: TagEntity) {
        self.tags.insert(tag.slug.clone(), tag);
    }

    /// Look up a cached IP address by bare address (mask tolerated).
    pub fn ip_by_address(&self, address: &str) -> Option<&IpAddressEntity> {
        self.ips.get(strip_mask(address))
    }

    // ── Lazy dependency lookups ───────────────────────────────────────

    pub async fn lookup_site(
        &mut self,
        client: &CmdbClient,
        name: &str,
    ) -> ClientResult<Option<i64>> {
        Self::lookup_lazy(&mut self.sites, client, endpoints::SITES, name).await
    }

    pub async fn lookup_cluster_type(
        &mut self,
        client: &CmdbClient,
        name: &str,
    ) -> ClientResult<Option<i64>> {
        Self::lookup_lazy(&mut self.cluster_types, client, endpoints::CLUSTER_TYPES, name).await
    }

    pub async fn lookup_cluster(
        &mut self,
        client: &CmdbClient,
        name: &str,
    ) -> ClientResult<Option<i64>> {
        Self::lookup_lazy(&mut self.clusters, client, endpoints::CLUSTERS, name).await
    }

    pub async fn lookup_role(
        &mut self,
        client: &CmdbClient,
        name: &str,
    ) -> ClientResult<Option<i64>> {
        Self::lookup_lazy(&mut self.roles, client, endpoints::DEVICE_ROLES, name).await
    }

    async fn lookup_lazy(
        map: &mut HashMap<String, Option<i64>>,
        client: &CmdbClient,
        path: &str,
        name: &str,
    ) -> ClientResult<Option<i64>> {
        if let Some(cached) = map.get(name) {
            return Ok(*cached);
        }

        let found = client.find_by_name(path, name).await?;
        let id = found.and_then(|entity| entity.get("id").and_then(Value::as_i64));
        map.insert(name.to_string(), id);
        Ok(id)
    }

    // ── Memoization of entities created during the run ────────────────

    pub fn memoize_site(&mut self, name: &str, id: i64) {
        self.sites.insert(name.to_string(), Some(id));
    }

    pub fn memoize_cluster_type(&mut self, name: &str, id: i64) {
        self.cluster_types.insert(name.to_string(), Some(id));
    }

    pub fn memoize_cluster(&mut self, name: &str, id: i64) {
        self.clusters.insert(name.to_string(), Some(id));
    }

    pub fn memoize_role(&mut self, name: &str, id: i64) {
        self.roles.insert(name.to_string(), Some(id));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn vm(id: i64, name: &str) -> VmEntity {
        serde_json::from_value(json!({ "id": id, "name": name })).unwrap()
    }

    #[test]
    fn test_vm_keyed_by_name() {
        let mut cache = EntityCache::default();
        cache.insert_vm(vm(1, "web-01"));

        assert_eq!(cache.vms.get("web-01").unwrap().id, 1);
        assert!(cache.vms.get("web-02").is_none());
    }

    #[test]
    fn test_interface_composite_key() {
        let mut cache = EntityCache::default();
        let iface: InterfaceEntity = serde_json::from_value(json!({
            "id": 40, "name": "eth0", "virtual_machine": 12
        }))
        .unwrap();
        cache.insert_interface(iface);

        assert!(cache.interfaces.contains_key(&(12, "eth0".to_string())));
        assert!(!cache.interfaces.contains_key(&(13, "eth0".to_string())));
    }

    #[test]
    fn test_interface_without_vm_not_cached() {
        let mut cache = EntityCache::default();
        let orphan: InterfaceEntity =
            serde_json::from_value(json!({ "id": 40, "name": "eth0" })).unwrap();
        cache.insert_interface(orphan);
        assert!(cache.interfaces.is_empty());
    }

    #[test]
    fn test_ip_keyed_by_bare_address() {
        let mut cache = EntityCache::default();
        let ip: IpAddressEntity = serde_json::from_value(json!({
            "id": 91, "address": "10.0.0.5/32"
        }))
        .unwrap();
        cache.insert_ip(ip);

        assert!(cache.ip_by_address("10.0.0.5").is_some());
        assert!(cache.ip_by_address("10.0.0.5/24").is_some());
        assert!(cache.ip_by_address("10.0.0.6").is_none());
    }

    #[test]
    fn test_memoized_site_served_from_memory() {
        let mut cache = EntityCache::default();
        cache.memoize_site("DC East", 3);
        assert_eq!(cache.sites.get("DC East"), Some(&Some(3)));
    }
}
