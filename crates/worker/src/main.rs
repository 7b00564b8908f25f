//! Headless dashboard worker.
//!
//! Loads the persisted widget collection, keeps every widget's data fresh
//! through the binding engine, and logs each widget as its data changes.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use pulseboard_core::extract::Rendered;
use pulseboard_engine::{BindingEngine, EngineEvent, WidgetView};
use pulseboard_fetch::{FetchClient, Fetcher};
use pulseboard_store::{JsonFileStorage, WidgetStore};
use tokio::sync::broadcast::error::RecvError;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod config;

use config::WorkerConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "pulseboard_worker=info,pulseboard_engine=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = WorkerConfig::from_env();
    tracing::info!(
        store_dir = %config.store_dir.display(),
        store_key = %config.store_key,
        request_timeout_secs = config.fetch.request_timeout.as_secs(),
        secrets = ?config.configured_secrets(),
        "Loaded worker configuration",
    );

    tokio::fs::create_dir_all(&config.store_dir)
        .await
        .with_context(|| format!("Failed to create store dir {}", config.store_dir.display()))?;
    let backend = Arc::new(JsonFileStorage::new(&config.store_dir));
    let store = Arc::new(WidgetStore::open(backend, config.store_key.clone()).await);
    if store.is_empty() {
        tracing::warn!("No widgets configured, waiting for the collection to change");
    }

    let fetcher: Arc<dyn Fetcher> = Arc::new(FetchClient::new(&config.fetch));
    let engine = BindingEngine::new(fetcher, config.engine.clone());

    let cancel = CancellationToken::new();

    let follow_handle = tokio::spawn({
        let engine = Arc::clone(&engine);
        let store = Arc::clone(&store);
        let cancel = cancel.clone();
        async move { engine.follow(&store, cancel).await }
    });

    let log_handle = tokio::spawn(log_updates(Arc::clone(&engine), cancel.clone()));
    let signal_handle = tokio::spawn(cancel_on_signal(cancel.clone()));

    cancel.cancelled().await;

    // --- Shutdown ---
    if let Ok(Err(e)) = signal_handle.await {
        tracing::error!(error = %e, "Signal listener failed");
    }
    let _ = tokio::time::timeout(Duration::from_secs(5), follow_handle).await;
    let _ = tokio::time::timeout(Duration::from_secs(5), log_handle).await;
    engine.shutdown().await;

    tracing::info!("Graceful shutdown complete");
    Ok(())
}

/// Log a one-line summary of every widget whose data changed.
async fn log_updates(engine: Arc<BindingEngine>, cancel: CancellationToken) {
    let mut rx = engine.events();
    loop {
        let event = tokio::select! {
            _ = cancel.cancelled() => break,
            received = rx.recv() => match received {
                Ok(event) => event,
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "Engine events lagged");
                    continue;
                }
                Err(RecvError::Closed) => break,
            },
        };

        match &event {
            EngineEvent::SnapshotUpdated { widget_id, .. } => {
                if let Some(view) = engine.view(widget_id).await {
                    tracing::info!(
                        widget_id = %view.widget_id,
                        title = %view.title,
                        data = %summarize(&view),
                        "Widget updated",
                    );
                    tracing::debug!(
                        view = %serde_json::to_string(&view).unwrap_or_default(),
                        "Widget view",
                    );
                }
            }
            EngineEvent::FetchFailed {
                widget_id,
                kind,
                message,
            } => {
                tracing::warn!(widget_id = %widget_id, kind = kind.as_str(), error = %message, "Widget fetch failed");
            }
            EngineEvent::BindingStarted { .. } | EngineEvent::BindingRemoved { .. } => {}
        }
    }
}

fn summarize(view: &WidgetView) -> String {
    match &view.rendered {
        None => "no data".to_string(),
        Some(Rendered::Card(cells)) => cells
            .iter()
            .map(|c| format!("{}={}", c.label, c.display))
            .collect::<Vec<_>>()
            .join(", "),
        Some(Rendered::Table(rows)) => format!("{} rows", rows.len()),
        Some(Rendered::Chart(points)) => match points.last() {
            Some(last) => format!("{} points, latest {} at {}", points.len(), last.y, last.x),
            None => "0 points".to_string(),
        },
    }
}

/// Cancel `shutdown` on the first SIGINT (Ctrl-C) or SIGTERM.
///
/// Also cancels if a handler can't be installed, so the worker never runs
/// without a way to stop. Returns as soon as `shutdown` is cancelled
/// elsewhere.
async fn cancel_on_signal(shutdown: CancellationToken) -> anyhow::Result<()> {
    let result = wait_for_signal(&shutdown).await;
    shutdown.cancel();
    result
}

async fn wait_for_signal(shutdown: &CancellationToken) -> anyhow::Result<()> {
    tokio::select! {
        _ = shutdown.cancelled() => {}
        result = tokio::signal::ctrl_c() => {
            result.context("Failed to listen for Ctrl-C")?;
            tracing::info!("Received SIGINT (Ctrl-C), starting graceful shutdown");
        }
        result = terminate_signal() => {
            result?;
            tracing::info!("Received SIGTERM, starting graceful shutdown");
        }
    }
    Ok(())
}

#[cfg(unix)]
async fn terminate_signal() -> anyhow::Result<()> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut sigterm = signal(SignalKind::terminate()).context("Failed to install SIGTERM handler")?;
    sigterm.recv().await;
    Ok(())
}

#[cfg(not(unix))]
async fn terminate_signal() -> anyhow::Result<()> {
    std::future::pending().await
}
