//! External stop signal
//!
//! Checked between live events and between backfill dispatches. Work that
//! is already in flight always runs to completion.

use tokio::sync::watch;

/// Sender half, held by the composition root
#[derive(Debug)]
pub struct ShutdownTrigger {
    tx: watch::Sender<bool>,
}

impl ShutdownTrigger {
    /// Request a graceful stop. Idempotent.
    pub fn trigger(&self) {
        self.tx.send_replace(true);
    }
}

/// Receiver half, cloned into every component that must stop
#[derive(Debug, Clone)]
pub struct Shutdown {
    rx: watch::Receiver<bool>,
}

impl Shutdown {
    pub fn new() -> (ShutdownTrigger, Shutdown) {
        let (tx, rx) = watch::channel(false);
        (ShutdownTrigger { tx }, Shutdown { rx })
    }

    /// A signal that never fires
    pub fn never() -> Self {
        let (_, rx) = watch::channel(false);
        Shutdown { rx }
    }

    pub fn is_requested(&self) -> bool {
        *self.rx.borrow()
    }

    /// Resolve once a stop has been requested. If the trigger is dropped
    /// without firing, this never resolves.
    pub async fn wait(&mut self) {
        loop {
            if *self.rx.borrow_and_update() {
                return;
            }
            if self.rx.changed().await.is_err() {
                std::future::pending::<()>().await;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_trigger_wakes_waiter() {
        let (trigger, mut shutdown) = Shutdown::new();
        assert!(!shutdown.is_requested());

        let waiter = tokio::spawn(async move {
            shutdown.wait().await;
            shutdown.is_requested()
        });

        trigger.trigger();
        assert!(waiter.await.unwrap());
    }

    #[tokio::test]
    async fn test_never_does_not_fire() {
        let mut shutdown = Shutdown::never();
        let fired = tokio::time::timeout(Duration::from_millis(20), shutdown.wait()).await;
        assert!(fired.is_err());
    }

    #[tokio::test]
    async fn test_dropped_trigger_does_not_fire() {
        let (trigger, mut shutdown) = Shutdown::new();
        drop(trigger);
        let fired = tokio::time::timeout(Duration::from_millis(20), shutdown.wait()).await;
        assert!(fired.is_err());
    }
}
