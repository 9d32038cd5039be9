//! Chunked bulk mutation execution with per-chunk failure isolation.

use kardex_client::cmdb::CmdbClient;
use serde_json::Value;
use tracing::{debug, warn};

/// Items per bulk mutation call.
pub const CHUNK_SIZE: usize = 100;

/// The mutation applied to every chunk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatchOp {
    Create,
    Update,
    Delete,
}

/// A rejected chunk: the status and detail reported by the destination plus
/// the exact chunk payload, preserved for diagnosis.
#[derive(Debug)]
pub struct ChunkFailure {
    pub status: Option<u16>,
    pub detail: String,
    pub payload: Vec<Value>,
}

/// The result of one batched mutation.
#[derive(Debug, Default)]
pub struct BatchOutcome {
    /// Entities created by the destination, in submission order. Populated
    /// for [`BatchOp::Create`] only, so the caller can refresh its cache.
    pub created: Vec<Value>,
    /// Items that went through successfully, across all chunks.
    pub succeeded: usize,
    /// Rejected chunks, in submission order.
    pub failures: Vec<ChunkFailure>,
}

/// Number of mutation calls needed for `items` at `chunk_size`.
pub fn chunk_count(items: usize, chunk_size: usize) -> usize {
    items.div_ceil(chunk_size)
}

/// Executes bulk mutations in fixed-size chunks.
pub struct BatchExecutor<'a> {
    client: &'a CmdbClient,
}

impl<'a> BatchExecutor<'a> {
    pub fn new(client: &'a CmdbClient) -> Self {
        Self { client }
    }

    /// Split `items` into chunks of [`CHUNK_SIZE`] and submit each as one
    /// array call. A rejected chunk is recorded and the remaining chunks
    /// still execute; one bad chunk never aborts the batch.
    pub async fn execute(&self, path: &str, items: Vec<Value>, op: BatchOp) -> BatchOutcome {
        let mut outcome = BatchOutcome::default();
        if items.is_empty() {
            return outcome;
        }

        debug!(
            path = path,
            op = ?op,
            items = items.len(),
            chunks = chunk_count(items.len(), CHUNK_SIZE),
            "executing batched mutation"
        );

        for chunk in items.chunks(CHUNK_SIZE) {
            let result = match op {
                BatchOp::Create => self.client.bulk_create(path, chunk).await.map(Some),
                BatchOp::Update => self.client.bulk_update(path, chunk).await.map(Some),
                BatchOp::Delete => {
                    let ids: Vec<i64> = chunk
                        .iter()
                        .filter_map(|item| item.get("id").and_then(Value::as_i64))
                        .collect();
                    self.client.bulk_delete(path, &ids).await.map(|()| None)
                }
            };

            match result {
                Ok(returned) => {
                    outcome.succeeded += chunk.len();
                    if op == BatchOp::Create {
                        if let Some(entities) = returned {
                            outcome.created.extend(entities);
                        }
                    }
                }
                Err(err) => {
                    warn!(
                        path = path,
                        op = ?op,
                        status = ?err.status(),
                        items = chunk.len(),
                        error = %err,
                        "chunk rejected, continuing with next chunk"
                    );
                    outcome.failures.push(ChunkFailure {
                        status: err.status(),
                        detail: err.to_string(),
                        payload: chunk.to_vec(),
                    });
                }
            }
        }

        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chunk_count() {
        assert_eq!(chunk_count(0, 100), 0);
        assert_eq!(chunk_count(1, 100), 1);
        assert_eq!(chunk_count(100, 100), 1);
        assert_eq!(chunk_count(101, 100), 2);
        assert_eq!(chunk_count(250, 100), 3);
    }
}
