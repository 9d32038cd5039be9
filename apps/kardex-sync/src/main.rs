use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tracing_subscriber::EnvFilter;

use kardex_client::cmdb::CmdbClient;
use kardex_client::source::SourceClient;
use kardex_core::config::SyncConfig;
use kardex_engine::SyncEngine;

#[tokio::main]
async fn main() {
    // Load .env if present
    let _ = dotenvy::dotenv();

    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,kardex_engine=debug")),
        )
        .init();

    // Load configuration; a missing connection parameter aborts before any
    // collection begins.
    let config = SyncConfig::from_env().unwrap_or_else(|e| {
        eprintln!("Configuration error: {e}");
        std::process::exit(1);
    });

    tracing::info!(
        source = %config.source.base_url,
        cmdb = %config.cmdb.base_url,
        "starting kardex-sync"
    );

    let source = SourceClient::new(&config.source).unwrap_or_else(|e| {
        eprintln!("Source client error: {e}");
        std::process::exit(1);
    });
    let cmdb = CmdbClient::new(&config.cmdb).unwrap_or_else(|e| {
        eprintln!("CMDB client error: {e}");
        std::process::exit(1);
    });

    // Ctrl-C aborts the per-record loop cleanly, keeping the counters
    // accumulated so far.
    let shutdown = Arc::new(AtomicBool::new(false));
    {
        let shutdown = Arc::clone(&shutdown);
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::warn!("interrupt received, finishing current record");
                shutdown.store(true, Ordering::Relaxed);
            }
        });
    }

    match SyncEngine::run(&source, &cmdb, &shutdown).await {
        Ok(summary) => {
            for failure in &summary.failures {
                tracing::warn!(subject = %failure.subject, detail = %failure.detail, "sync failure");
            }
            tracing::info!(
                processed = summary.processed,
                created = summary.created,
                updated = summary.updated,
                skipped = summary.skipped,
                failed = summary.failed,
                interrupted = summary.interrupted,
                "kardex-sync done"
            );
        }
        Err(e) => {
            tracing::error!(error = %e, "sync run aborted");
            std::process::exit(1);
        }
    }
}
