//! # Persistence Coordinator
//!
//! Coalesces high-frequency tree mutations into metadata writes. There is at
//! most one pending patch; every submission replaces it and pushes the
//! deadline out by one quiet period. When [`PersistenceCoordinator::tick`]
//! runs after the deadline, the pending patch is merged into the stored
//! snapshot and cleared.
//!
//! The coordinator is poll-driven: the owner calls `tick()` from its event
//! loop (or a test calls it after moving a [`crate::clock::ManualClock`]).
//! Flush failures are not retried. They are sent to the failure channel
//! returned by [`PersistenceCoordinator::new`]; the failed patch is held,
//! unscheduled, and written by the next `submit` + quiet period or
//! `flush_now`.

use crate::clock::Clock;
use crate::error::{Result, WordsError};
use crate::model::{ProjectName, Snapshot, SnapshotPatch};
use crate::store::{MetadataStore, StorageBackend};
use chrono::{DateTime, Duration, Utc};
use crossbeam_channel::{unbounded, Receiver, Sender};
use tracing::{debug, warn};

pub const DEFAULT_QUIET_PERIOD_MS: i64 = 300;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CoordinatorConfig {
    pub quiet_period: Duration,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            quiet_period: Duration::milliseconds(DEFAULT_QUIET_PERIOD_MS),
        }
    }
}

/// A re-armable deadline.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DelayedTask {
    deadline: Option<DateTime<Utc>>,
}

impl DelayedTask {
    pub fn arm(&mut self, now: DateTime<Utc>, delay: Duration) {
        self.deadline = Some(now + delay);
    }

    pub fn cancel(&mut self) {
        self.deadline = None;
    }

    pub fn is_armed(&self) -> bool {
        self.deadline.is_some()
    }

    pub fn deadline(&self) -> Option<DateTime<Utc>> {
        self.deadline
    }

    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        self.deadline.is_some_and(|d| now >= d)
    }
}

/// A flush that could not be written.
#[derive(Debug)]
pub struct FlushFailure {
    pub project: ProjectName,
    pub at: DateTime<Utc>,
    pub error: WordsError,
}

#[derive(Debug, Clone, PartialEq)]
pub enum FlushOutcome {
    /// Nothing pending.
    Idle,
    /// A patch is pending but the quiet period has not elapsed.
    Waiting,
    /// The pending patch was written; this is the stored snapshot now.
    Flushed(Box<Snapshot>),
    /// The write failed. The patch is held until the next submit or flush.
    Failed,
    /// A patch from a failed flush is pending but not scheduled.
    Held,
}

pub struct PersistenceCoordinator<B: StorageBackend, C: Clock> {
    store: MetadataStore<B>,
    project: ProjectName,
    clock: C,
    config: CoordinatorConfig,
    timer: DelayedTask,
    pending: Option<SnapshotPatch>,
    failures: Sender<FlushFailure>,
}

impl<B: StorageBackend, C: Clock> PersistenceCoordinator<B, C> {
    pub fn new(
        store: MetadataStore<B>,
        project: ProjectName,
        clock: C,
        config: CoordinatorConfig,
    ) -> (Self, Receiver<FlushFailure>) {
        let (failures, receiver) = unbounded();
        let coordinator = Self {
            store,
            project,
            clock,
            config,
            timer: DelayedTask::default(),
            pending: None,
            failures,
        };
        (coordinator, receiver)
    }

    pub fn has_pending(&self) -> bool {
        self.pending.is_some()
    }

    pub fn deadline(&self) -> Option<DateTime<Utc>> {
        self.timer.deadline()
    }

    /// Replaces the pending patch and re-arms the quiet-period timer.
    pub fn submit(&mut self, patch: SnapshotPatch) {
        if self.pending.replace(patch).is_some() {
            debug!(project = %self.project, "pending snapshot replaced");
        }
        self.timer.arm(self.clock.now(), self.config.quiet_period);
    }

    pub fn tick(&mut self) -> FlushOutcome {
        if self.pending.is_none() {
            return FlushOutcome::Idle;
        }
        if !self.timer.is_armed() {
            return FlushOutcome::Held;
        }
        let now = self.clock.now();
        if !self.timer.is_due(now) {
            return FlushOutcome::Waiting;
        }
        match self.flush() {
            Ok(Some(snapshot)) => FlushOutcome::Flushed(Box::new(snapshot)),
            Ok(None) => FlushOutcome::Idle,
            Err(error) => {
                warn!(project = %self.project, error = %error, "snapshot flush failed");
                let _ = self.failures.send(FlushFailure {
                    project: self.project.clone(),
                    at: now,
                    error,
                });
                FlushOutcome::Failed
            }
        }
    }

    /// Writes the pending patch right away, ignoring the timer. Errors go to
    /// the caller instead of the failure channel.
    pub fn flush_now(&mut self) -> Result<Option<Snapshot>> {
        self.flush()
    }

    /// Drops the pending patch without writing it.
    pub fn discard(&mut self) {
        self.pending = None;
        self.timer.cancel();
    }

    fn flush(&mut self) -> Result<Option<Snapshot>> {
        self.timer.cancel();
        let Some(patch) = self.pending.take() else {
            return Ok(None);
        };
        match self.store.update(&self.project, patch.clone()) {
            Ok(snapshot) => {
                debug!(project = %self.project, "pending snapshot flushed");
                Ok(Some(snapshot))
            }
            Err(e) => {
                self.pending = Some(patch);
                Err(e)
            }
        }
    }
}
