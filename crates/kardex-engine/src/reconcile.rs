//! Desired-state payload construction and create/update classification.

use crate::cache::EntityCache;
use crate::resolve::DependencyResolver;
use kardex_client::cmdb::CmdbClient;
use kardex_core::record::SourceRecord;
use serde::Serialize;
use tracing::debug;

/// Cluster type assigned to clusters discovered from the source inventory.
/// The source enumerates a hypervisor estate, which carries no cluster-type
/// concept of its own.
pub const DEFAULT_CLUSTER_TYPE: &str = "VMware vSphere";

/// The desired destination state for one VM.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct VmPayload {
    /// Present only for updates: the existing entity's id.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
    pub name: String,
    pub vcpus: u32,
    pub memory: u64,
    pub disk: u64,
    pub status: String,
    pub site: i64,
    pub cluster: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<i64>,
    pub tags: Vec<i64>,
}

/// What should happen to one source record.
#[derive(Debug)]
pub enum ReconcileOutcome {
    /// No matching VM in the destination: submit as a create.
    Create(VmPayload),
    /// The VM exists: submit as an update carrying the existing id.
    Update(VmPayload),
    /// Not a sync candidate (anonymous record); not an error.
    Skipped,
    /// A prerequisite could not be resolved; the record is dropped from
    /// this run and counted as an error.
    Failed { name: String, reason: String },
}

/// Transforms one source record into its desired destination payload.
pub struct Reconciler<'a> {
    resolver: DependencyResolver<'a>,
}

impl<'a> Reconciler<'a> {
    pub fn new(client: &'a CmdbClient) -> Self {
        Self {
            resolver: DependencyResolver::new(client),
        }
    }

    /// Resolve dependencies for `record` and classify it against the VM
    /// cache. Dependency resolution happens here, before the payload is
    /// built, so a payload never leaves this function with an unresolved
    /// reference.
    pub async fn reconcile(
        &self,
        record: &SourceRecord,
        cache: &mut EntityCache,
    ) -> ReconcileOutcome {
        if record.is_anonymous() {
            debug!("skipping anonymous record");
            return ReconcileOutcome::Skipped;
        }
        let name = record.name.clone();

        if record.datacenter.is_empty() {
            return ReconcileOutcome::Failed {
                name,
                reason: "record carries no datacenter label".to_string(),
            };
        }
        if record.cluster.is_empty() {
            return ReconcileOutcome::Failed {
                name,
                reason: "record carries no cluster label".to_string(),
            };
        }

        // Site and cluster type first; the cluster references both.
        let Some(site_id) = self.resolver.ensure_site(cache, &record.datacenter).await else {
            return ReconcileOutcome::Failed {
                name,
                reason: format!("could not resolve site '{}'", record.datacenter),
            };
        };
        let Some(type_id) = self
            .resolver
            .ensure_cluster_type(cache, DEFAULT_CLUSTER_TYPE)
            .await
        else {
            return ReconcileOutcome::Failed {
                name,
                reason: format!("could not resolve cluster type '{DEFAULT_CLUSTER_TYPE}'"),
            };
        };
        let Some(cluster_id) = self
            .resolver
            .ensure_cluster(cache, &record.cluster, type_id, site_id)
            .await
        else {
            return ReconcileOutcome::Failed {
                name,
                reason: format!("could not resolve cluster '{}'", record.cluster),
            };
        };

        let role_id = match &record.role {
            Some(role) => match self.resolver.ensure_role(cache, role).await {
                Some(id) => Some(id),
                None => {
                    return ReconcileOutcome::Failed {
                        name,
                        reason: format!("could not resolve role '{role}'"),
                    }
                }
            },
            None => None,
        };

        let mut tag_ids = Vec::with_capacity(record.tags.len());
        for tag in &record.tags {
            match self
                .resolver
                .ensure_tag(cache, &tag.category, &tag.name, &tag.description)
                .await
            {
                Some(id) => tag_ids.push(id),
                None => {
                    return ReconcileOutcome::Failed {
                        name,
                        reason: format!("could not resolve tag '{}/{}'", tag.category, tag.name),
                    }
                }
            }
        }

        let payload = VmPayload {
            id: None,
            name: record.name.clone(),
            vcpus: record.cpus,
            memory: record.memory_mb,
            disk: record.disk_gb,
            status: record.status().to_string(),
            site: site_id,
            cluster: cluster_id,
            role: role_id,
            tags: tag_ids,
        };

        match cache.vms.get(&record.name) {
            Some(existing) => ReconcileOutcome::Update(VmPayload {
                id: Some(existing.id),
                ..payload
            }),
            None => ReconcileOutcome::Create(payload),
        }
    }
}
