//! Interface, IP-address and primary-IP attachment pass.
//!
//! Runs after VM upsert and cache refresh. For each source record whose VM
//! now exists: ensure the primary interface exists, ensure the first source
//! IP exists and is assigned to that interface, and update the VM's
//! primary-IP pointer only when it actually changed.

use crate::cache::EntityCache;
use crate::stats::RunSummary;
use kardex_client::cmdb::{endpoints, CmdbClient};
use kardex_client::error::{ClientError, ClientResult};
use kardex_client::models::{strip_mask, InterfaceEntity, IpAddressEntity};
use kardex_core::record::SourceRecord;
use serde_json::json;
use tracing::{debug, info, warn};

/// Name of the interface ensured for every VM.
pub const PRIMARY_INTERFACE: &str = "eth0";

/// Interface type used for created interfaces.
pub const INTERFACE_TYPE: &str = "1000base-t";

/// Mask appended when the source supplies a bare address.
const DEFAULT_MASK: &str = "/32";

const ASSIGNED_OBJECT_TYPE: &str = "virtualization.vminterface";

/// Second-pass synchronizer for per-VM network attachments.
pub struct AttachmentSync<'a> {
    client: &'a CmdbClient,
}

impl<'a> AttachmentSync<'a> {
    pub fn new(client: &'a CmdbClient) -> Self {
        Self { client }
    }

    /// Ensure interface, IP and primary-IP state for one record.
    ///
    /// Any failure marks the record failed on the summary and returns; the
    /// caller moves on to the next record.
    pub async fn sync_record(
        &self,
        record: &SourceRecord,
        cache: &mut EntityCache,
        summary: &mut RunSummary,
    ) {
        let Some(vm) = cache.vms.get(&record.name).cloned() else {
            return;
        };

        let iface_id = match self.ensure_interface(cache, vm.id).await {
            Ok((id, created)) => {
                if created {
                    summary.interfaces_created += 1;
                }
                id
            }
            Err(e) => {
                warn!(vm = %record.name, error = %e, "interface ensure failed");
                summary.record_failure(record.name.clone(), format!("interface: {e}"));
                return;
            }
        };

        // A record without addresses is complete after the interface step.
        let Some(raw_address) = record.ip_addresses.first() else {
            return;
        };

        let ip_id = match self.ensure_ip(cache, raw_address, iface_id).await {
            Ok((id, created)) => {
                if created {
                    summary.ips_created += 1;
                }
                id
            }
            Err(e) => {
                warn!(vm = %record.name, address = %raw_address, error = %e, "IP ensure failed");
                summary.record_failure(record.name.clone(), format!("ip address: {e}"));
                return;
            }
        };

        if vm.primary_ip4 == Some(ip_id) {
            debug!(vm = %record.name, ip = ip_id, "primary IP already current");
            return;
        }

        match self
            .client
            .patch(
                endpoints::VIRTUAL_MACHINES,
                vm.id,
                &json!({ "primary_ip4": ip_id }),
            )
            .await
        {
            Ok(_) => {
                info!(vm = %record.name, ip = ip_id, "primary IP updated");
                summary.primary_ip_updates += 1;
                if let Some(cached) = cache.vms.get_mut(&record.name) {
                    cached.primary_ip4 = Some(ip_id);
                }
            }
            Err(e) => {
                warn!(vm = %record.name, error = %e, "primary IP update failed");
                summary.record_failure(record.name.clone(), format!("primary ip: {e}"));
            }
        }
    }

    /// Ensure the primary interface exists for a VM. Returns the interface
    /// id and whether it was created by this call.
    async fn ensure_interface(
        &self,
        cache: &mut EntityCache,
        vm_id: i64,
    ) -> ClientResult<(i64, bool)> {
        if let Some(iface) = cache.interfaces.get(&(vm_id, PRIMARY_INTERFACE.to_string())) {
            return Ok((iface.id, false));
        }

        let payload = json!({
            "name": PRIMARY_INTERFACE,
            "virtual_machine": vm_id,
            "type": INTERFACE_TYPE,
        });
        let created = self.client.create(endpoints::INTERFACES, &payload).await?;
        let iface: InterfaceEntity = serde_json::from_value(created)
            .map_err(|e| ClientError::Decode(format!("created interface has unexpected shape: {e}")))?;

        let id = iface.id;
        cache.insert_interface(iface);
        Ok((id, true))
    }

    /// Ensure an IP address entity exists for `raw_address`, assigned to
    /// `iface_id`. An existing entity is re-pointed only when its owning
    /// interface differs. Returns the IP id and whether it was created.
    async fn ensure_ip(
        &self,
        cache: &mut EntityCache,
        raw_address: &str,
        iface_id: i64,
    ) -> ClientResult<(i64, bool)> {
        let address = if raw_address.contains('/') {
            raw_address.to_string()
        } else {
            format!("{raw_address}{DEFAULT_MASK}")
        };

        if let Some(existing) = cache.ip_by_address(&address) {
            let id = existing.id;
            if existing.assigned_object_id != Some(iface_id) {
                self.client
                    .patch(
                        endpoints::IP_ADDRESSES,
                        id,
                        &json!({
                            "assigned_object_type": ASSIGNED_OBJECT_TYPE,
                            "assigned_object_id": iface_id,
                        }),
                    )
                    .await?;
                info!(address = %address, interface = iface_id, "IP address reassigned");
                if let Some(cached) = cache.ips.get_mut(strip_mask(&address)) {
                    cached.assigned_object_id = Some(iface_id);
                }
            }
            return Ok((id, false));
        }

        let payload = json!({
            "address": address,
            "status": "active",
            "assigned_object_type": ASSIGNED_OBJECT_TYPE,
            "assigned_object_id": iface_id,
        });
        let created = self.client.create(endpoints::IP_ADDRESSES, &payload).await?;
        let ip: IpAddressEntity = serde_json::from_value(created)
            .map_err(|e| ClientError::Decode(format!("created IP has unexpected shape: {e}")))?;

        let id = ip.id;
        cache.insert_ip(ip);
        Ok((id, true))
    }
}
