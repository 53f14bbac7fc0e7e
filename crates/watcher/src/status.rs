//! Shared run status
//!
//! Written by the watcher and the backfill scanner, read by the status
//! surface. All counters only ever increase except the in-flight gauge.

use chrono::{DateTime, Utc};
use feed_core::Position;
use parking_lot::RwLock;
use serde::Serialize;
use std::sync::atomic::{AtomicU64, AtomicU8, Ordering};

/// Lifecycle of one consumer run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FeedState {
    ResolvingPosition,
    Backfilling,
    Streaming,
    Error,
    Stopped,
}

impl FeedState {
    fn from_u8(value: u8) -> Self {
        match value {
            0 => FeedState::ResolvingPosition,
            1 => FeedState::Backfilling,
            2 => FeedState::Streaming,
            3 => FeedState::Error,
            _ => FeedState::Stopped,
        }
    }

    fn as_u8(self) -> u8 {
        match self {
            FeedState::ResolvingPosition => 0,
            FeedState::Backfilling => 1,
            FeedState::Streaming => 2,
            FeedState::Error => 3,
            FeedState::Stopped => 4,
        }
    }
}

/// Live counters for one run
#[derive(Debug)]
pub struct FeedStatus {
    state: AtomicU8,
    last_position: RwLock<Option<Position>>,
    backfill_started_at: RwLock<Option<DateTime<Utc>>>,
    forwarded: AtomicU64,
    dropped: AtomicU64,
    processing_failures: AtomicU64,
    checkpoint_failures: AtomicU64,
    backfill_processed: AtomicU64,
    backfill_failures: AtomicU64,
    backfill_in_flight: AtomicU64,
}

impl Default for FeedStatus {
    fn default() -> Self {
        Self {
            state: AtomicU8::new(FeedState::ResolvingPosition.as_u8()),
            last_position: RwLock::new(None),
            backfill_started_at: RwLock::new(None),
            forwarded: AtomicU64::new(0),
            dropped: AtomicU64::new(0),
            processing_failures: AtomicU64::new(0),
            checkpoint_failures: AtomicU64::new(0),
            backfill_processed: AtomicU64::new(0),
            backfill_failures: AtomicU64::new(0),
            backfill_in_flight: AtomicU64::new(0),
        }
    }
}

impl FeedStatus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> FeedState {
        FeedState::from_u8(self.state.load(Ordering::Acquire))
    }

    pub fn set_state(&self, state: FeedState) {
        self.state.store(state.as_u8(), Ordering::Release);
    }

    pub fn last_position(&self) -> Option<Position> {
        self.last_position.read().clone()
    }

    pub fn set_last_position(&self, position: Position) {
        *self.last_position.write() = Some(position);
    }

    pub fn record_forwarded(&self) {
        self.forwarded.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_dropped(&self) {
        self.dropped.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_processing_failure(&self) {
        self.processing_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_checkpoint_failure(&self) {
        self.checkpoint_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn backfill_started(&self, at: DateTime<Utc>) {
        *self.backfill_started_at.write() = Some(at);
    }

    pub fn backfill_dispatched(&self) {
        self.backfill_in_flight.fetch_add(1, Ordering::AcqRel);
    }

    /// A backfill Processor call returned (`ok` = no error)
    pub fn backfill_returned(&self, ok: bool) {
        self.backfill_in_flight.fetch_sub(1, Ordering::AcqRel);
        self.backfill_processed.fetch_add(1, Ordering::AcqRel);
        if !ok {
            self.backfill_failures.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// A backfill task died without returning
    pub fn backfill_abandoned(&self) {
        self.backfill_in_flight.fetch_sub(1, Ordering::AcqRel);
        self.backfill_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn backfill_in_flight(&self) -> u64 {
        self.backfill_in_flight.load(Ordering::Acquire)
    }

    pub fn snapshot(&self) -> StatusSnapshot {
        StatusSnapshot {
            state: self.state(),
            last_position: self.last_position(),
            forwarded: self.forwarded.load(Ordering::Relaxed),
            dropped: self.dropped.load(Ordering::Relaxed),
            processing_failures: self.processing_failures.load(Ordering::Relaxed),
            checkpoint_failures: self.checkpoint_failures.load(Ordering::Relaxed),
            backfill: BackfillSnapshot {
                started_at: *self.backfill_started_at.read(),
                processed: self.backfill_processed.load(Ordering::Acquire),
                failures: self.backfill_failures.load(Ordering::Relaxed),
                in_flight: self.backfill_in_flight(),
            },
        }
    }
}

/// Point-in-time copy of [`FeedStatus`]
#[derive(Debug, Clone, Serialize)]
pub struct StatusSnapshot {
    pub state: FeedState,
    pub last_position: Option<Position>,
    pub forwarded: u64,
    pub dropped: u64,
    pub processing_failures: u64,
    pub checkpoint_failures: u64,
    pub backfill: BackfillSnapshot,
}

#[derive(Debug, Clone, Serialize)]
pub struct BackfillSnapshot {
    pub started_at: Option<DateTime<Utc>>,
    pub processed: u64,
    pub failures: u64,
    pub in_flight: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_round_trip() {
        let status = FeedStatus::new();
        assert_eq!(status.state(), FeedState::ResolvingPosition);

        for state in [
            FeedState::Backfilling,
            FeedState::Streaming,
            FeedState::Error,
            FeedState::Stopped,
        ] {
            status.set_state(state);
            assert_eq!(status.state(), state);
        }
    }

    #[test]
    fn test_backfill_gauge() {
        let status = FeedStatus::new();
        status.backfill_dispatched();
        status.backfill_dispatched();
        status.backfill_returned(true);

        let snap = status.snapshot();
        assert_eq!(snap.backfill.in_flight, 1);
        assert_eq!(snap.backfill.processed, 1);

        status.backfill_returned(false);
        let snap = status.snapshot();
        assert_eq!(snap.backfill.in_flight, 0);
        assert_eq!(snap.backfill.processed, 2);
        assert_eq!(snap.backfill.failures, 1);
    }

    #[test]
    fn test_snapshot_serializes_state_snake_case() {
        let status = FeedStatus::new();
        status.set_state(FeedState::ResolvingPosition);
        let json = serde_json::to_value(status.snapshot()).unwrap();
        assert_eq!(json["state"], "resolving_position");
    }
}
