// SPDX-FileCopyrightText: 2026 Tally Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `tally serve` and `tally worker` command implementations.
//!
//! Both commands open the record store, probe both stores until they are
//! ready, and assemble one [`Sequencer`]. `serve` then answers HTTP
//! (running the worker alongside unless `worker.enabled = false`);
//! `worker` only consumes the queue. Everything stops on SIGINT/SIGTERM.

use std::sync::Arc;
use std::time::Duration;

use tally_config::model::TallyConfig;
use tally_core::{KeyValueStore, PluginAdapter, RecordStore, TallyError};
use tally_gateway::{GatewayState, ServerConfig};
use tally_prometheus::PrometheusExporter;
use tally_sequencer::deadline::bounded;
use tally_sequencer::{Sequencer, SequencerSettings};
use tally_storage::SqliteRecordStore;
use tally_worker::{JobExecutor, Reconciler, Worker, WorkerSettings};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::readiness::{Probe, ProbePolicy};
use crate::shutdown;

/// Store handles shared by every task, released on shutdown.
struct Stack {
    records: Arc<SqliteRecordStore>,
    kv: Arc<dyn KeyValueStore>,
    sequencer: Sequencer,
}

impl Stack {
    /// Open and probe both stores, then build the pipeline.
    async fn assemble(config: &TallyConfig) -> Result<Self, TallyError> {
        let records = Arc::new(SqliteRecordStore::new(config.storage.clone()));
        records.initialize().await?;
        let kv = tally_kv::from_config(&config.counter)?;

        let policy = ProbePolicy::from_config(&config.startup);
        let storage_timeout = Duration::from_millis(config.storage.call_timeout_ms);
        let counter_timeout = Duration::from_millis(config.counter.call_timeout_ms);

        Probe::new(records.name(), policy.clone())
            .run(|| bounded("records.health", storage_timeout, records.health_check()))
            .await?;
        Probe::new(kv.name(), policy)
            .run(|| bounded("counter.health", counter_timeout, kv.health_check()))
            .await?;

        let sequencer = Sequencer::new(
            records.clone(),
            kv.clone(),
            SequencerSettings::from_config(config),
        );
        info!(
            strategy = ?sequencer.strategy(),
            queue = %sequencer.dispatcher().queue_key(),
            "numbering pipeline ready"
        );

        Ok(Self {
            records,
            kv,
            sequencer,
        })
    }

    /// Spawn the queue consumer and the count reconciler.
    fn spawn_background(&self, config: &TallyConfig, cancel: &CancellationToken) -> Vec<JoinHandle<()>> {
        let worker = Worker::new(
            self.sequencer.clone(),
            WorkerSettings::from_config(&config.worker),
        );
        let reconciler = Reconciler::new(
            JobExecutor::new(self.sequencer.clone()),
            Duration::from_secs(config.worker.reconcile_interval_secs),
        );

        let worker_cancel = cancel.clone();
        let reconciler_cancel = cancel.clone();
        vec![
            tokio::spawn(async move { worker.run(worker_cancel).await }),
            tokio::spawn(async move { reconciler.run(reconciler_cancel).await }),
        ]
    }

    /// Release both stores. Failures are logged, not returned.
    async fn shutdown(self) {
        if let Err(e) = self.records.close().await {
            warn!(error = %e, "record store did not close cleanly");
        }
        if let Err(e) = self.kv.shutdown().await {
            warn!(error = %e, "counter store shutdown failed");
        }
    }
}

/// Runs the `tally serve` command.
pub async fn run_serve(config: TallyConfig) -> Result<(), TallyError> {
    init_tracing(&config.server.log_level);
    info!("starting tally serve");
    warn_ignored_store_vars();

    let stack = Stack::assemble(&config).await?;

    let mut state = GatewayState::new(stack.sequencer.clone());
    match PrometheusExporter::install() {
        Ok(exporter) => {
            state = state.with_metrics(Arc::new(move || exporter.render()));
        }
        Err(e) => warn!(error = %e, "metrics disabled"),
    }

    let cancel = shutdown::install_signal_handler();
    let background = if config.worker.enabled {
        stack.spawn_background(&config, &cancel)
    } else {
        info!("embedded worker disabled");
        Vec::new()
    };

    let server_config = ServerConfig {
        host: config.server.host.clone(),
        port: config.server.port,
        max_concurrent_requests: config.server.max_concurrent_requests,
    };
    let served = tally_gateway::start_server(&server_config, state, cancel.clone()).await;

    // The server may have stopped on its own; take the background tasks down with it.
    cancel.cancel();
    join_all(background).await;
    stack.shutdown().await;

    info!("tally serve shutdown complete");
    served
}

/// Runs the `tally worker` command.
pub async fn run_worker(config: TallyConfig) -> Result<(), TallyError> {
    init_tracing(&config.server.log_level);
    info!("starting tally worker");
    warn_ignored_store_vars();

    let stack = Stack::assemble(&config).await?;
    let cancel = shutdown::install_signal_handler();
    join_all(stack.spawn_background(&config, &cancel)).await;
    stack.shutdown().await;

    info!("tally worker shutdown complete");
    Ok(())
}

async fn join_all(handles: Vec<JoinHandle<()>>) {
    for handle in handles {
        if let Err(e) = handle.await {
            warn!(error = %e, "background task panicked");
        }
    }
}

fn warn_ignored_store_vars() {
    let ignored = tally_config::ignored_store_vars();
    if !ignored.is_empty() {
        warn!(
            variables = ?ignored,
            "records are stored in SQLite; set storage.database_path instead"
        );
    }
}

/// Initializes the tracing subscriber with the given log level.
///
/// `RUST_LOG` takes precedence over the configured level.
fn init_tracing(log_level: &str) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("tally={log_level},warn")));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_names(false)
        .init();
}

#[cfg(test)]
mod tests {
    use super::*;
    use tally_config::model::CounterBackend;

    fn memory_config(dir: &tempfile::TempDir) -> TallyConfig {
        let mut config = TallyConfig::default();
        config.counter.backend = CounterBackend::Memory;
        config.storage.database_path = dir.path().join("tally.db").to_string_lossy().to_string();
        config.startup.probe_attempts = 1;
        config
    }

    #[tokio::test]
    async fn assembles_over_memory_backend() {
        let dir = tempfile::tempdir().unwrap();
        let config = memory_config(&dir);

        let stack = Stack::assemble(&config).await.unwrap();
        let app = stack.sequencer.create_application(Some("acme")).await.unwrap();
        let issued = stack.sequencer.create_chat(&app).await.unwrap();
        assert_eq!(issued.number, 1);
        stack.shutdown().await;
    }

    #[tokio::test]
    async fn background_tasks_stop_on_cancel() {
        let dir = tempfile::tempdir().unwrap();
        let config = memory_config(&dir);
        let stack = Stack::assemble(&config).await.unwrap();

        let cancel = CancellationToken::new();
        let handles = stack.spawn_background(&config, &cancel);
        cancel.cancel();
        tokio::time::timeout(Duration::from_secs(5), join_all(handles))
            .await
            .unwrap();
        stack.shutdown().await;
    }
}
