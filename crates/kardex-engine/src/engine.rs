//! Run orchestration.

use crate::attach::AttachmentSync;
use crate::batch::{BatchExecutor, BatchOp, ChunkFailure};
use crate::cache::EntityCache;
use crate::error::SyncResult;
use crate::reconcile::{ReconcileOutcome, Reconciler};
use crate::stats::{FailureDetail, RunSummary};
use chrono::Utc;
use kardex_client::cmdb::{endpoints, CmdbClient};
use kardex_client::models::VmEntity;
use kardex_client::source::SourceClient;
use serde_json::Value;
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{info, warn};

/// Orchestrates one complete sync run.
///
/// All network operations execute strictly sequentially; there is exactly
/// one in-flight request at any time, so the run cache needs no locking.
/// The shutdown flag is checked between records: an interrupt ends the loop
/// cleanly and the counters accumulated so far are preserved.
pub struct SyncEngine;

impl SyncEngine {
    /// Execute a full reconciliation of the source inventory into the
    /// destination CMDB.
    pub async fn run(
        source: &SourceClient,
        cmdb: &CmdbClient,
        shutdown: &AtomicBool,
    ) -> SyncResult<RunSummary> {
        let mut summary = RunSummary::new();

        info!(source = %source.base_url(), cmdb = %cmdb.base_url(), "starting sync run");

        // ── 1. Collect source records ────────────────────────────────
        let records = source.collect_records().await;
        summary.processed = records.len();

        // ── 2. Bulk-load destination caches ──────────────────────────
        let mut cache = EntityCache::load(cmdb).await?;

        // ── 3. Resolve dependencies and partition create/update ──────
        let reconciler = Reconciler::new(cmdb);
        let mut creates: Vec<Value> = Vec::new();
        let mut updates: Vec<Value> = Vec::new();
        // Records absorbed by a failure are excluded from the attachment
        // pass even when their VM already exists.
        let mut failed_names: HashSet<String> = HashSet::new();

        for record in &records {
            if shutdown.load(Ordering::Relaxed) {
                summary.interrupted = true;
                break;
            }

            match reconciler.reconcile(record, &mut cache).await {
                ReconcileOutcome::Create(payload) => match serde_json::to_value(&payload) {
                    Ok(value) => creates.push(value),
                    Err(e) => summary.record_failure(payload.name.clone(), e.to_string()),
                },
                ReconcileOutcome::Update(payload) => match serde_json::to_value(&payload) {
                    Ok(value) => updates.push(value),
                    Err(e) => summary.record_failure(payload.name.clone(), e.to_string()),
                },
                ReconcileOutcome::Skipped => summary.skipped += 1,
                ReconcileOutcome::Failed { name, reason } => {
                    warn!(vm = %name, reason = %reason, "record failed during reconciliation");
                    failed_names.insert(name.clone());
                    summary.record_failure(name, reason);
                }
            }
        }

        info!(
            creates = creates.len(),
            updates = updates.len(),
            skipped = summary.skipped,
            failed = summary.failed,
            "reconciliation partitioned"
        );

        // ── 4. Execute batched mutations ─────────────────────────────
        if !summary.interrupted {
            let executor = BatchExecutor::new(cmdb);

            let outcome = executor
                .execute(endpoints::VIRTUAL_MACHINES, creates, BatchOp::Create)
                .await;
            summary.created = outcome.created.len();
            for value in outcome.created {
                match serde_json::from_value::<VmEntity>(value) {
                    Ok(vm) => cache.insert_vm(vm),
                    Err(e) => warn!(error = %e, "created VM has unexpected shape, not cached"),
                }
            }
            record_chunk_failures(&mut summary, &mut failed_names, outcome.failures);

            let outcome = executor
                .execute(endpoints::VIRTUAL_MACHINES, updates, BatchOp::Update)
                .await;
            summary.updated = outcome.succeeded;
            record_chunk_failures(&mut summary, &mut failed_names, outcome.failures);

            info!(
                created = summary.created,
                updated = summary.updated,
                "mutation batches executed"
            );
        }

        // ── 5. Attachment pass: interfaces, IPs, primary-IP pointers ─
        if !summary.interrupted {
            let attach = AttachmentSync::new(cmdb);
            for record in &records {
                if shutdown.load(Ordering::Relaxed) {
                    summary.interrupted = true;
                    break;
                }
                if record.is_anonymous()
                    || failed_names.contains(&record.name)
                    || !cache.vms.contains_key(&record.name)
                {
                    continue;
                }
                attach.sync_record(record, &mut cache, &mut summary).await;
            }
        }

        summary.completed_at = Some(Utc::now());
        if summary.interrupted {
            warn!(
                processed = summary.processed,
                created = summary.created,
                failed = summary.failed,
                "sync run interrupted, counters preserved"
            );
        } else {
            info!(
                processed = summary.processed,
                created = summary.created,
                updated = summary.updated,
                skipped = summary.skipped,
                failed = summary.failed,
                interfaces_created = summary.interfaces_created,
                ips_created = summary.ips_created,
                primary_ip_updates = summary.primary_ip_updates,
                "sync run finished"
            );
        }

        Ok(summary)
    }
}

/// Fold rejected chunks into the summary: every item in a failed chunk
/// counts as a failed record, and the chunk payload travels with the detail
/// so a destination-side validation failure can be diagnosed offline.
fn record_chunk_failures(
    summary: &mut RunSummary,
    failed_names: &mut HashSet<String>,
    failures: Vec<ChunkFailure>,
) {
    for failure in failures {
        for item in &failure.payload {
            if let Some(name) = item.get("name").and_then(Value::as_str) {
                failed_names.insert(name.to_string());
            }
        }
        summary.failed += failure.payload.len();
        summary.failures.push(FailureDetail {
            subject: format!("chunk of {} items", failure.payload.len()),
            detail: format!(
                "{} (chunk payload: {})",
                failure.detail,
                Value::Array(failure.payload)
            ),
        });
    }
}
