//! # kardex-engine
//!
//! The reconciliation engine. One run:
//!
//! 1. collects every VM record from the source inventory,
//! 2. bulk-loads the destination caches (VMs, interfaces, IP addresses,
//!    tags),
//! 3. per record, resolves prerequisite entities (site, cluster type,
//!    cluster, role, tags) and builds the desired VM payload, classifying
//!    it as create or update by cache lookup,
//! 4. executes the mutations in fixed-size chunks with per-chunk failure
//!    isolation, refreshing the cache from the created entities,
//! 5. makes a second pass ensuring each VM's interface and IP address
//!    objects exist, updating the primary-IP pointer only when it changed.
//!
//! Every mutation is an ensure/upsert keyed by natural identity, so
//! re-running the sync after a partial failure converges to the same end
//! state. No per-record error halts the run; only configuration errors and
//! an explicit interrupt are fatal.

pub mod attach;
pub mod batch;
pub mod cache;
pub mod engine;
pub mod error;
pub mod reconcile;
pub mod resolve;
pub mod stats;

pub use engine::SyncEngine;
pub use error::{SyncError, SyncResult};
pub use stats::RunSummary;
