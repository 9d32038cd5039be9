//! Destination CMDB entity models.
//!
//! List endpoints expand reference fields into nested objects
//! (`"cluster": {"id": 7, ...}`) while mutation payloads carry bare ids.
//! The [`ref_id`] deserializer accepts both shapes so the same model works
//! against list responses and create/update echoes.

use serde::{Deserialize, Deserializer};

/// Deserialize a reference field that arrives either as a bare integer id
/// or as a nested object carrying an `id`.
pub fn ref_id<'de, D>(deserializer: D) -> Result<Option<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum RefRepr {
        Id(i64),
        Object { id: i64 },
    }

    let value = Option::<RefRepr>::deserialize(deserializer)?;
    Ok(value.map(|r| match r {
        RefRepr::Id(id) => id,
        RefRepr::Object { id } => id,
    }))
}

/// A virtual machine entity in the destination.
#[derive(Debug, Clone, Deserialize)]
pub struct VmEntity {
    pub id: i64,
    pub name: String,
    #[serde(default, deserialize_with = "ref_id")]
    pub site: Option<i64>,
    #[serde(default, deserialize_with = "ref_id")]
    pub cluster: Option<i64>,
    #[serde(default, deserialize_with = "ref_id")]
    pub primary_ip4: Option<i64>,
}

/// A VM network interface. The natural key is (virtual machine, name).
#[derive(Debug, Clone, Deserialize)]
pub struct InterfaceEntity {
    pub id: i64,
    pub name: String,
    #[serde(default, deserialize_with = "ref_id")]
    pub virtual_machine: Option<i64>,
}

/// An IP address entity, stored with its CIDR suffix.
#[derive(Debug, Clone, Deserialize)]
pub struct IpAddressEntity {
    pub id: i64,
    pub address: String,
    #[serde(default)]
    pub assigned_object_id: Option<i64>,
}

impl IpAddressEntity {
    /// The bare address with the mask stripped, used as the cache key.
    pub fn bare_address(&self) -> &str {
        strip_mask(&self.address)
    }
}

/// A tag entity. The slug is globally unique.
#[derive(Debug, Clone, Deserialize)]
pub struct TagEntity {
    pub id: i64,
    pub name: String,
    pub slug: String,
}

/// Strip the CIDR mask suffix from an address, if present.
pub fn strip_mask(address: &str) -> &str {
    address.split('/').next().unwrap_or(address)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_vm_with_nested_references() {
        let vm: VmEntity = serde_json::from_value(json!({
            "id": 12,
            "name": "web-01",
            "site": { "id": 3, "name": "DC East", "slug": "dc-east" },
            "cluster": { "id": 7, "name": "Prod" },
            "primary_ip4": { "id": 91, "address": "10.0.0.5/32" }
        }))
        .unwrap();

        assert_eq!(vm.site, Some(3));
        assert_eq!(vm.cluster, Some(7));
        assert_eq!(vm.primary_ip4, Some(91));
    }

    #[test]
    fn test_vm_with_bare_id_references() {
        let vm: VmEntity = serde_json::from_value(json!({
            "id": 12,
            "name": "web-01",
            "site": 3,
            "cluster": 7,
            "primary_ip4": null
        }))
        .unwrap();

        assert_eq!(vm.site, Some(3));
        assert_eq!(vm.primary_ip4, None);
    }

    #[test]
    fn test_vm_with_absent_references() {
        let vm: VmEntity = serde_json::from_value(json!({ "id": 1, "name": "lonely" })).unwrap();
        assert_eq!(vm.site, None);
        assert_eq!(vm.cluster, None);
        assert_eq!(vm.primary_ip4, None);
    }

    #[test]
    fn test_interface_composite_key_parts() {
        let iface: InterfaceEntity = serde_json::from_value(json!({
            "id": 40,
            "name": "eth0",
            "virtual_machine": { "id": 12, "name": "web-01" }
        }))
        .unwrap();

        assert_eq!((iface.virtual_machine, iface.name.as_str()), (Some(12), "eth0"));
    }

    #[test]
    fn test_bare_address_strips_mask() {
        let ip: IpAddressEntity = serde_json::from_value(json!({
            "id": 91,
            "address": "10.0.0.5/32",
            "assigned_object_id": 40
        }))
        .unwrap();

        assert_eq!(ip.bare_address(), "10.0.0.5");
        assert_eq!(strip_mask("10.0.0.5"), "10.0.0.5");
        assert_eq!(strip_mask("192.168.1.10/24"), "192.168.1.10");
    }
}
