//! Run the change-feed consumer in the foreground

use crate::locks::CollectionLock;
use crate::processor::JsonLinesProcessor;
use crate::status_server::{self, StatusState};
use crate::{logging, system_config, util};
use anyhow::{Context, Result};
use feed_core::Processor;
use mongo::{ChangeStreamSource, CollectionScanSource, MongoDocGetter, MongoHandle};
use std::path::Path;
use std::sync::Arc;
use tracing::{info, warn};
use watcher::{ChangeFeedWatcher, FeedStatus, Shutdown, ShutdownTrigger};

pub async fn run(config_path: Option<&Path>, no_backfill: bool) -> Result<()> {
    let mut config = system_config::load(config_path)?;
    if no_backfill {
        config.backfill.enabled = false;
    }

    let _log_guard = logging::init(&config.logging)?;

    let namespace = config.namespace();
    let state_dir = util::state_dir()?;
    let _lock = CollectionLock::acquire(&state_dir, &namespace)?;

    info!(
        namespace = %namespace,
        backfill = config.backfill.enabled,
        concurrency = config.backfill.concurrency,
        checkpoint = config.checkpoint.kind(),
        "Starting tailfeed"
    );

    // Live subscription and full reads use separate connections
    let mongo = &config.mongo;
    let live = MongoHandle::connect(&mongo.uri, &mongo.extra, &mongo.db, &mongo.collection)
        .await
        .context("Failed to create live MongoDB client")?;
    let reader = MongoHandle::connect(mongo.read_uri(), &mongo.extra, &mongo.db, &mongo.collection)
        .await
        .context("Failed to create full-read MongoDB client")?;

    let store = config
        .checkpoint
        .open()
        .context("Failed to open checkpoint store")?;
    info!(store = %store.describe(), "Checkpoint store ready");

    let processor: Arc<dyn Processor> = Arc::new(JsonLinesProcessor::stdout());
    processor.set_doc_getter(Arc::new(MongoDocGetter::new(reader.clone())));

    let filter = config.feed_filter()?;
    let status = Arc::new(FeedStatus::new());
    let (trigger, shutdown) = Shutdown::new();

    let server = match config.status.port {
        Some(port) => {
            let state = Arc::new(StatusState::new(
                &mongo.db,
                &mongo.collection,
                status.clone(),
                processor.clone(),
            ));
            status_server::start(&config.status.bind, port, state, shutdown.clone()).await
        }
        None => None,
    };

    let watcher = ChangeFeedWatcher::new(
        Arc::new(ChangeStreamSource::new(live, filter.rules().to_vec())),
        Arc::new(CollectionScanSource::new(reader).with_batch_size(config.backfill.batch_size)),
        processor,
        store,
    )
    .with_filter(filter)
    .with_config(config.watcher_config())
    .with_status(status)
    .with_shutdown(shutdown);

    let trigger = Arc::new(trigger);
    let signals = tokio::spawn(stop_on_signal(trigger.clone()));

    let result = watcher.run().await;

    // Stop the status server along with the feed
    trigger.trigger();
    signals.abort();
    if let Some(server) = server {
        let _ = server.await;
    }

    match result {
        Ok(()) => {
            info!(state = ?watcher.state(), "tailfeed stopped");
            Ok(())
        }
        Err(e) => Err(e).context(format!("Change feed on {} terminated", namespace)),
    }
}

/// Trigger a graceful stop on SIGINT or SIGTERM
async fn stop_on_signal(trigger: Arc<ShutdownTrigger>) {
    use tokio::signal::unix::{signal, SignalKind};

    let mut terminate = match signal(SignalKind::terminate()) {
        Ok(stream) => stream,
        Err(e) => {
            warn!(error = %e, "Failed to install SIGTERM handler");
            if tokio::signal::ctrl_c().await.is_ok() {
                trigger.trigger();
            }
            return;
        }
    };

    tokio::select! {
        _ = tokio::signal::ctrl_c() => info!("Received SIGINT"),
        _ = terminate.recv() => info!("Received SIGTERM"),
    }
    trigger.trigger();
}
