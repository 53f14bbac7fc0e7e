//! HTTP status surface
//!
//! `GET /` and `GET /status` return the identity of the watched collection,
//! process memory, host load, the last checkpoint and the current queue depth.

use anyhow::{Context, Result};
use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};
use feed_core::Processor;
use parking_lot::Mutex;
use serde_json::{json, Value};
use std::net::SocketAddr;
use std::sync::Arc;
use sysinfo::{ProcessesToUpdate, System};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tracing::{error, info};
use watcher::{FeedStatus, Shutdown};

/// Everything a status request reads
pub struct StatusState {
    db: String,
    collection: String,
    status: Arc<FeedStatus>,
    processor: Arc<dyn Processor>,
    system: Mutex<System>,
}

impl StatusState {
    pub fn new(db: &str, collection: &str, status: Arc<FeedStatus>, processor: Arc<dyn Processor>) -> Self {
        Self {
            db: db.to_string(),
            collection: collection.to_string(),
            status,
            processor,
            system: Mutex::new(System::new()),
        }
    }

    /// Backfill calls in flight plus the Processor's own backlog
    pub fn queue_size(&self) -> u64 {
        self.status.backfill_in_flight() + self.processor.queue_depth() as u64
    }

    fn memory_usage(&self) -> Value {
        let Ok(pid) = sysinfo::get_current_pid() else {
            return Value::Null;
        };
        let mut system = self.system.lock();
        system.refresh_processes(ProcessesToUpdate::Some(&[pid]), true);
        match system.process(pid) {
            Some(process) => json!({
                "rss": process.memory(),
                "virtual": process.virtual_memory(),
            }),
            None => Value::Null,
        }
    }

    pub fn document(&self) -> Value {
        let load = System::load_average();
        let snapshot = self.status.snapshot();
        let last_op = match &snapshot.last_position {
            Some(position) => json!(position),
            None => json!("unknown"),
        };

        json!({
            "db": self.db,
            "collection": self.collection,
            "memoryUsage": self.memory_usage(),
            "loadavg": [load.one, load.five, load.fifteen],
            "lastOp": last_op,
            "queueSize": self.queue_size(),
            "state": snapshot.state,
            "counters": snapshot,
        })
    }
}

async fn status_handler(State(state): State<Arc<StatusState>>) -> Json<Value> {
    Json(state.document())
}

pub fn router(state: Arc<StatusState>) -> Router {
    Router::new()
        .route("/", get(status_handler))
        .route("/status", get(status_handler))
        .with_state(state)
}

pub async fn bind(bind: &str, port: u16) -> Result<TcpListener> {
    let addr = format!("{}:{}", bind, port);
    TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind status server to {}", addr))
}

/// Serve until `shutdown` fires
pub fn serve(listener: TcpListener, state: Arc<StatusState>, mut shutdown: Shutdown) -> JoinHandle<()> {
    let addr: Option<SocketAddr> = listener.local_addr().ok();
    tokio::spawn(async move {
        if let Some(addr) = addr {
            info!("Status server listening at http://{}", addr);
        }
        let server = axum::serve(listener, router(state)).with_graceful_shutdown(async move {
            shutdown.wait().await;
        });
        if let Err(e) = server.await {
            error!(error = %e, "Status server error");
        }
    })
}

/// Bind and serve; a bind failure is logged and the feed runs without it
pub async fn start(bind_addr: &str, port: u16, state: Arc<StatusState>, shutdown: Shutdown) -> Option<JoinHandle<()>> {
    match bind(bind_addr, port).await {
        Ok(listener) => Some(serve(listener, state, shutdown)),
        Err(e) => {
            error!(error = %format!("{:#}", e), "Status server disabled");
            None
        }
    }
}
