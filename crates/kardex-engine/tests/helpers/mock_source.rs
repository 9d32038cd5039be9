//! Mock source inventory server for engine tests.

#![allow(dead_code)]

use serde_json::{json, Value};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use kardex_client::source::SourceClient;
use kardex_core::config::SourceConfig;

/// Start a mock source exposing one inventory with the given hosts.
pub async fn start_source(hosts: Vec<Value>) -> MockServer {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/v2/inventories/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "count": 1,
            "results": [{ "id": 1, "name": "VMware Inventory" }],
            "next": null
        })))
        .mount(&server)
        .await;

    let count = hosts.len();
    Mock::given(method("GET"))
        .and(path("/api/v2/inventories/1/hosts/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "count": count,
            "results": hosts,
            "next": null
        })))
        .mount(&server)
        .await;

    server
}

/// Build a source client pointed at a mock server.
pub fn client_for(server: &MockServer) -> SourceClient {
    SourceClient::new(&SourceConfig {
        base_url: server.uri(),
        username: "svc-sync".to_string(),
        password: "hunter2".to_string(),
        verify_tls: true,
        timeout_secs: 5,
    })
    .unwrap()
}

/// A host entry whose variables describe a typical powered-on VM.
pub fn vm_host(name: &str, ip: &str) -> Value {
    json!({
        "id": 100,
        "name": name,
        "variables": {
            "vm_name": name,
            "vm_cpu_count": 2,
            "vm_memory_mb": 2048,
            "vm_disk_total_gb": 20,
            "vm_power_state": "poweredOn",
            "vm_datacenter": "DC East",
            "vm_cluster": "Prod Cluster",
            "vm_ip_addresses": [ip]
        }
    })
}
