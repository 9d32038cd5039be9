//! Stateful mock CMDB server for engine tests.
//!
//! Simulates the destination API closely enough to drive full sync runs:
//! list endpoints with `{count, results, next}` envelopes and name filters,
//! single-object creates for dependency entities, array create/update for
//! virtual machines, and per-id PATCH for primary-IP and IP reassignment.
//! All created entities live in shared in-memory state so a second run
//! observes what the first one wrote.

#![allow(dead_code)]

use serde_json::{json, Value};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};
use wiremock::matchers::{method, path, path_regex};
use wiremock::{Mock, MockServer, Request, ResponseTemplate};

use kardex_client::cmdb::CmdbClient;
use kardex_core::config::CmdbConfig;

#[derive(Default)]
struct State {
    next_id: i64,
    sites: Vec<Value>,
    cluster_types: Vec<Value>,
    clusters: Vec<Value>,
    roles: Vec<Value>,
    tags: Vec<Value>,
    vms: Vec<Value>,
    interfaces: Vec<Value>,
    ips: Vec<Value>,
}

impl State {
    fn assign_id(&mut self, mut obj: Value) -> Value {
        self.next_id += 1;
        obj["id"] = json!(self.next_id);
        obj
    }
}

/// A mock destination CMDB that tracks created entities.
pub struct MockCmdbServer {
    server: MockServer,
    state: Arc<RwLock<State>>,
    fail_site_creates: Arc<AtomicBool>,
}

fn list_response(items: &[Value], request: &Request) -> ResponseTemplate {
    let name_filter: Option<String> = request
        .url
        .query_pairs()
        .find(|(k, _)| k == "name")
        .map(|(_, v)| v.to_string());

    let results: Vec<Value> = items
        .iter()
        .filter(|item| match &name_filter {
            Some(name) => item
                .get("name")
                .and_then(Value::as_str)
                .is_some_and(|n| n.contains(name.as_str())),
            None => true,
        })
        .cloned()
        .collect();

    ResponseTemplate::new(200).set_body_json(json!({
        "count": results.len(),
        "results": results,
        "next": null
    }))
}

fn parse_body(request: &Request) -> Value {
    serde_json::from_slice(&request.body).unwrap_or(Value::Null)
}

impl MockCmdbServer {
    pub async fn new() -> Self {
        let mock = Self {
            server: MockServer::start().await,
            state: Arc::new(RwLock::new(State {
                next_id: 100,
                ..Default::default()
            })),
            fail_site_creates: Arc::new(AtomicBool::new(false)),
        };
        mock.mount_all().await;
        mock
    }

    pub fn uri(&self) -> String {
        self.server.uri()
    }

    /// Build a CMDB client pointed at this mock.
    pub fn client(&self) -> CmdbClient {
        CmdbClient::new(&CmdbConfig {
            base_url: self.uri(),
            token: "test-token-123".to_string(),
            verify_tls: true,
            timeout_secs: 5,
        })
        .unwrap()
    }

    /// Make every site create fail with a destination-side rejection.
    pub fn set_fail_site_creates(&self, fail: bool) {
        self.fail_site_creates.store(fail, Ordering::SeqCst);
    }

    /// Seed an existing IP address entity, optionally assigned to an
    /// interface. Returns its id.
    pub fn seed_ip(&self, address: &str, assigned_object_id: Option<i64>) -> i64 {
        let mut state = self.state.write().unwrap();
        state.next_id += 1;
        let id = state.next_id;
        state.ips.push(json!({
            "id": id,
            "address": address,
            "status": "active",
            "assigned_object_id": assigned_object_id,
        }));
        id
    }

    // ── State accessors ───────────────────────────────────────────────

    pub fn sites(&self) -> Vec<Value> {
        self.state.read().unwrap().sites.clone()
    }

    pub fn cluster_types(&self) -> Vec<Value> {
        self.state.read().unwrap().cluster_types.clone()
    }

    pub fn clusters(&self) -> Vec<Value> {
        self.state.read().unwrap().clusters.clone()
    }

    pub fn vms(&self) -> Vec<Value> {
        self.state.read().unwrap().vms.clone()
    }

    pub fn vm_by_name(&self, name: &str) -> Option<Value> {
        self.state
            .read()
            .unwrap()
            .vms
            .iter()
            .find(|vm| vm.get("name").and_then(Value::as_str) == Some(name))
            .cloned()
    }

    pub fn interfaces(&self) -> Vec<Value> {
        self.state.read().unwrap().interfaces.clone()
    }

    pub fn ips(&self) -> Vec<Value> {
        self.state.read().unwrap().ips.clone()
    }

    /// Count recorded requests by method and exact path.
    pub async fn requests(&self, method_name: &str, path_name: &str) -> usize {
        self.server
            .received_requests()
            .await
            .unwrap()
            .iter()
            .filter(|r| {
                r.method.to_string().eq_ignore_ascii_case(method_name) && r.url.path() == path_name
            })
            .count()
    }

    /// All recorded requests, for order-sensitive assertions.
    pub async fn recorded(&self) -> Vec<Request> {
        self.server.received_requests().await.unwrap()
    }

    // ── Mount helpers ─────────────────────────────────────────────────

    async fn mount_all(&self) {
        self.mount_list("/api/dcim/sites/", |s| &s.sites).await;
        self.mount_list("/api/dcim/device-roles/", |s| &s.roles).await;
        self.mount_list("/api/virtualization/cluster-types/", |s| &s.cluster_types)
            .await;
        self.mount_list("/api/virtualization/clusters/", |s| &s.clusters).await;
        self.mount_list("/api/extras/tags/", |s| &s.tags).await;
        self.mount_list("/api/virtualization/virtual-machines/", |s| &s.vms).await;
        self.mount_list("/api/virtualization/interfaces/", |s| &s.interfaces)
            .await;
        self.mount_list("/api/ipam/ip-addresses/", |s| &s.ips).await;

        self.mount_site_create().await;
        self.mount_create("/api/dcim/device-roles/", |s| &mut s.roles).await;
        self.mount_create("/api/virtualization/cluster-types/", |s| &mut s.cluster_types)
            .await;
        self.mount_create("/api/virtualization/clusters/", |s| &mut s.clusters)
            .await;
        self.mount_create("/api/extras/tags/", |s| &mut s.tags).await;
        self.mount_create("/api/virtualization/interfaces/", |s| &mut s.interfaces)
            .await;
        self.mount_create("/api/ipam/ip-addresses/", |s| &mut s.ips).await;

        self.mount_vm_bulk().await;
        self.mount_vm_bulk_delete().await;
        self.mount_entity_patch(
            r"^/api/virtualization/virtual-machines/\d+/$",
            |s| &mut s.vms,
        )
        .await;
        self.mount_entity_patch(r"^/api/ipam/ip-addresses/\d+/$", |s| &mut s.ips)
            .await;
    }

    async fn mount_list(&self, endpoint: &str, accessor: fn(&State) -> &Vec<Value>) {
        let state = Arc::clone(&self.state);
        Mock::given(method("GET"))
            .and(path(endpoint))
            .respond_with(move |request: &Request| {
                let state = state.read().unwrap();
                list_response(accessor(&state), request)
            })
            .mount(&self.server)
            .await;
    }

    async fn mount_create(&self, endpoint: &str, accessor: fn(&mut State) -> &mut Vec<Value>) {
        let state = Arc::clone(&self.state);
        Mock::given(method("POST"))
            .and(path(endpoint))
            .respond_with(move |request: &Request| {
                let mut state = state.write().unwrap();
                let created = state.assign_id(parse_body(request));
                accessor(&mut state).push(created.clone());
                ResponseTemplate::new(201).set_body_json(created)
            })
            .mount(&self.server)
            .await;
    }

    async fn mount_site_create(&self) {
        let state = Arc::clone(&self.state);
        let fail = Arc::clone(&self.fail_site_creates);
        Mock::given(method("POST"))
            .and(path("/api/dcim/sites/"))
            .respond_with(move |request: &Request| {
                if fail.load(Ordering::SeqCst) {
                    return ResponseTemplate::new(500)
                        .set_body_json(json!({ "detail": "induced site failure" }));
                }
                let mut state = state.write().unwrap();
                let created = state.assign_id(parse_body(request));
                state.sites.push(created.clone());
                ResponseTemplate::new(201).set_body_json(created)
            })
            .mount(&self.server)
            .await;
    }

    /// Array create and array update on the virtual-machines collection.
    async fn mount_vm_bulk(&self) {
        let state = Arc::clone(&self.state);
        Mock::given(method("POST"))
            .and(path("/api/virtualization/virtual-machines/"))
            .respond_with(move |request: &Request| {
                let body = parse_body(request);
                let items = match body {
                    Value::Array(items) => items,
                    other => vec![other],
                };
                let mut state = state.write().unwrap();
                let mut created = Vec::with_capacity(items.len());
                for item in items {
                    let entity = state.assign_id(item);
                    state.vms.push(entity.clone());
                    created.push(entity);
                }
                ResponseTemplate::new(201).set_body_json(Value::Array(created))
            })
            .mount(&self.server)
            .await;

        let state = Arc::clone(&self.state);
        Mock::given(method("PATCH"))
            .and(path("/api/virtualization/virtual-machines/"))
            .respond_with(move |request: &Request| {
                let body = parse_body(request);
                let items = match body {
                    Value::Array(items) => items,
                    other => vec![other],
                };
                let mut state = state.write().unwrap();
                let mut updated = Vec::with_capacity(items.len());
                for item in items {
                    let id = item.get("id").and_then(Value::as_i64);
                    if let Some(existing) = state
                        .vms
                        .iter_mut()
                        .find(|vm| vm.get("id").and_then(Value::as_i64) == id)
                    {
                        merge_fields(existing, &item);
                        updated.push(existing.clone());
                    }
                }
                ResponseTemplate::new(200).set_body_json(Value::Array(updated))
            })
            .mount(&self.server)
            .await;
    }

    /// Array delete on the virtual-machines collection: 204, empty body.
    async fn mount_vm_bulk_delete(&self) {
        let state = Arc::clone(&self.state);
        Mock::given(method("DELETE"))
            .and(path("/api/virtualization/virtual-machines/"))
            .respond_with(move |request: &Request| {
                let body = parse_body(request);
                let ids: Vec<i64> = body
                    .as_array()
                    .map(|items| {
                        items
                            .iter()
                            .filter_map(|item| item.get("id").and_then(Value::as_i64))
                            .collect()
                    })
                    .unwrap_or_default();
                let mut state = state.write().unwrap();
                state
                    .vms
                    .retain(|vm| !ids.contains(&vm.get("id").and_then(Value::as_i64).unwrap_or(0)));
                ResponseTemplate::new(204)
            })
            .mount(&self.server)
            .await;
    }

    /// Per-entity PATCH (primary-IP pointer, IP reassignment).
    async fn mount_entity_patch(
        &self,
        pattern: &str,
        accessor: fn(&mut State) -> &mut Vec<Value>,
    ) {
        let state = Arc::clone(&self.state);
        Mock::given(method("PATCH"))
            .and(path_regex(pattern))
            .respond_with(move |request: &Request| {
                let id: Option<i64> = request
                    .url
                    .path_segments()
                    .and_then(|segments| {
                        segments
                            .filter(|s| !s.is_empty())
                            .last()
                            .and_then(|s| s.parse().ok())
                    });
                let patch = parse_body(request);
                let mut state = state.write().unwrap();
                if let Some(entity) = accessor(&mut state)
                    .iter_mut()
                    .find(|e| e.get("id").and_then(Value::as_i64) == id)
                {
                    merge_fields(entity, &patch);
                    let body = entity.clone();
                    ResponseTemplate::new(200).set_body_json(body)
                } else {
                    ResponseTemplate::new(404).set_body_json(json!({ "detail": "Not found." }))
                }
            })
            .mount(&self.server)
            .await;
    }
}

fn merge_fields(target: &mut Value, patch: &Value) {
    if let (Some(target), Some(patch)) = (target.as_object_mut(), patch.as_object()) {
        for (key, value) in patch {
            target.insert(key.clone(), value.clone());
        }
    }
}
