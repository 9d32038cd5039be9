//! Engine error types.
//!
//! The failure taxonomy is deliberately narrow: almost nothing that goes
//! wrong during a run is allowed to be fatal. Per-record problems
//! (dependency resolution, rejected chunks, attachment failures) are
//! recorded on the run summary and the loop continues. What remains here
//! are the conditions that genuinely end a run before or during execution.

use kardex_client::error::ClientError;
use kardex_core::config::ConfigError;
use thiserror::Error;

/// Fatal errors for a sync run.
#[derive(Debug, Error)]
pub enum SyncError {
    /// A required connection parameter was absent or invalid. Raised before
    /// any collection begins.
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// A destination cache could not be bulk-loaded. Without a complete
    /// cache the create/update classification would be wrong, so the run
    /// aborts rather than risk duplicate entities.
    #[error("failed to load {entity} cache: {source}")]
    CacheLoad {
        entity: &'static str,
        #[source]
        source: ClientError,
    },

    /// A transport error outside the tolerated (partial-result) paths.
    #[error(transparent)]
    Client(#[from] ClientError),
}

/// Result type for engine operations.
pub type SyncResult<T> = Result<T, SyncError>;
