//! Normalized source record model.
//!
//! Each host in the source inventory carries a free-form variable payload
//! describing the virtual machine behind it. The payload arrives either as a
//! JSON-encoded string or as an already-structured object and is parsed
//! defensively: a malformed payload drops that one record, never the
//! collection.

use serde_json::Value;
use tracing::warn;

/// Power state sentinel reported by the hypervisor for a stopped VM.
pub const POWERED_OFF: &str = "poweredOff";

/// One (category, name, description) tag attached to a source VM.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TagSpec {
    pub category: String,
    pub name: String,
    pub description: String,
}

/// A virtual machine as reported by the source inventory.
///
/// The natural key is `name`. Missing attributes receive fixed defaults:
/// one vCPU, zero memory, zero disk, empty IP list.
#[derive(Debug, Clone, PartialEq)]
pub struct SourceRecord {
    pub name: String,
    pub cpus: u32,
    pub memory_mb: u64,
    pub disk_gb: u64,
    pub power_state: String,
    pub datacenter: String,
    pub cluster: String,
    pub role: Option<String>,
    pub tags: Vec<TagSpec>,
    pub ip_addresses: Vec<String>,
}

impl SourceRecord {
    /// Build a record from a host's variable payload.
    ///
    /// `variables` may be a JSON object, a JSON-encoded string, or absent.
    /// An absent or empty payload yields a record built entirely from
    /// defaults (with the host name as VM name). A string payload that is
    /// not valid JSON returns `None` and the record is dropped.
    pub fn from_variables(host_name: &str, variables: Option<&Value>) -> Option<Self> {
        let vars = match variables {
            None | Some(Value::Null) => Value::Object(Default::default()),
            Some(Value::String(raw)) => match serde_json::from_str::<Value>(raw) {
                Ok(parsed) => parsed,
                Err(e) => {
                    warn!(host = %host_name, error = %e, "dropping host with unparseable variables");
                    return None;
                }
            },
            Some(other) => other.clone(),
        };

        let name = str_var(&vars, "vm_name")
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| host_name.to_string());

        Some(Self {
            name,
            cpus: uint_var(&vars, "vm_cpu_count").unwrap_or(1) as u32,
            memory_mb: uint_var(&vars, "vm_memory_mb").unwrap_or(0),
            disk_gb: uint_var(&vars, "vm_disk_total_gb").unwrap_or(0),
            power_state: str_var(&vars, "vm_power_state").unwrap_or_default(),
            datacenter: str_var(&vars, "vm_datacenter").unwrap_or_default(),
            cluster: str_var(&vars, "vm_cluster").unwrap_or_default(),
            role: str_var(&vars, "vm_role").filter(|s| !s.is_empty()),
            tags: tag_vars(&vars),
            ip_addresses: string_list_var(&vars, "vm_ip_addresses"),
        })
    }

    /// Whether the record identifies a VM at all. Anonymous records are not
    /// sync candidates.
    pub fn is_anonymous(&self) -> bool {
        self.name.is_empty()
    }

    /// Destination status derived from the hypervisor power state.
    pub fn status(&self) -> &'static str {
        if self.power_state == POWERED_OFF {
            "offline"
        } else {
            "active"
        }
    }
}

fn str_var(vars: &Value, key: &str) -> Option<String> {
    vars.get(key).and_then(Value::as_str).map(str::to_string)
}

/// Integer variables sometimes arrive as JSON numbers and sometimes as
/// quoted strings; accept both.
fn uint_var(vars: &Value, key: &str) -> Option<u64> {
    match vars.get(key)? {
        Value::Number(n) => n.as_u64().or_else(|| n.as_f64().map(|f| f.max(0.0) as u64)),
        Value::String(s) => s.trim().parse::<u64>().ok(),
        _ => None,
    }
}

fn string_list_var(vars: &Value, key: &str) -> Vec<String> {
    vars.get(key)
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(Value::as_str)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}

fn tag_vars(vars: &Value) -> Vec<TagSpec> {
    vars.get("vm_tags")
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(|t| {
                    let category = t.get("category").and_then(Value::as_str)?;
                    let name = t.get("name").and_then(Value::as_str)?;
                    let description = t
                        .get("description")
                        .and_then(Value::as_str)
                        .unwrap_or_default();
                    Some(TagSpec {
                        category: category.to_string(),
                        name: name.to_string(),
                        description: description.to_string(),
                    })
                })
                .collect()
        })
        .unwrap_or_default()
}
