//! Session state machine and single-flight admission.
//!
//! `submit_session` is the only operation that can schedule work, and it
//! does so only when the store grants admission for a brand new session id.
//! Every other path, including polling through the latest-session pointer,
//! is a pure read. Admitted sessions run on a tracked background task so the
//! caller never waits for the fan-out.
//!
//! Shutdown gives running fan-outs a grace period. Sessions still unfinished
//! at the deadline, including those queued behind the concurrency bound, are
//! committed as `Ready` with an empty result so the shared store never keeps
//! a session `Pending` that no process will ever finish.

use std::collections::HashSet;
use std::fmt;
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use futures::FutureExt;
use tokio::sync::Semaphore;
use tokio_util::task::TaskTracker;
use tracing::{debug, error, info, warn};

use crate::error::{JudgeError, Result};
use crate::fanout::FanOutAggregator;
use crate::session::{
    LatestResult, SessionId, SessionResult, SessionStatus, SubmissionOutcome, Theme,
};
use crate::store::{SessionStore, StoreError};

/// Default upper bound on fan-outs running at the same time.
pub const DEFAULT_MAX_CONCURRENT_FANOUTS: usize = 16;

pub struct SessionOrchestrator {
    store: Arc<dyn SessionStore>,
    aggregator: Arc<FanOutAggregator>,
    tasks: TaskTracker,
    permits: Arc<Semaphore>,
    lifecycle: Arc<Mutex<Lifecycle>>,
}

/// Admitted sessions whose fan-out has not finished, and whether shutdown
/// has begun. Guarded together so a session is either tracked before
/// shutdown starts or never scheduled at all.
#[derive(Debug, Default)]
struct Lifecycle {
    shut_down: bool,
    unfinished: HashSet<SessionId>,
}

fn lock(lifecycle: &Mutex<Lifecycle>) -> MutexGuard<'_, Lifecycle> {
    lifecycle.lock().unwrap_or_else(PoisonError::into_inner)
}

impl fmt::Debug for SessionOrchestrator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionOrchestrator")
            .field("store", &self.store)
            .field("aggregator", &self.aggregator)
            .field("in_flight", &self.tasks.len())
            .finish()
    }
}

impl SessionOrchestrator {
    pub fn new(store: Arc<dyn SessionStore>, aggregator: Arc<FanOutAggregator>) -> Self {
        Self {
            store,
            aggregator,
            tasks: TaskTracker::new(),
            permits: Arc::new(Semaphore::new(DEFAULT_MAX_CONCURRENT_FANOUTS)),
            lifecycle: Arc::default(),
        }
    }

    /// Bounds how many admitted sessions fan out at once. Sessions beyond the
    /// bound stay `Pending` until a slot frees up.
    pub fn with_max_concurrent_fanouts(mut self, limit: usize) -> Self {
        self.permits = Arc::new(Semaphore::new(limit.max(1)));
        self
    }

    /// Submits a session, scheduling its fan-out if and only if this call is
    /// the one that created the session record.
    pub async fn submit_session(
        &self,
        session_id: SessionId,
        theme: Theme,
    ) -> Result<SubmissionOutcome> {
        let status = self.store.status(&session_id).await?;
        if status != SessionStatus::Unknown {
            return self.outcome_for(&session_id, status).await;
        }

        if self.is_shut_down() {
            return Err(JudgeError::ShuttingDown);
        }

        if self.store.try_admit(&session_id).await? {
            info!(session_id = %session_id, theme = %theme, "Session admitted; scheduling fan-out");
            if !self.schedule(session_id.clone(), theme) {
                warn!(session_id = %session_id, "Shutdown began during admission; completing without evaluation");
                commit_empty(self.store.as_ref(), &session_id).await?;
            }
            return Ok(SubmissionOutcome::Initializing);
        }

        // Another submission won the admission race between our read and the
        // conditional create.
        debug!(session_id = %session_id, "Lost admission race");
        match self.store.status(&session_id).await? {
            SessionStatus::Unknown => Ok(SubmissionOutcome::Waiting),
            status => self.outcome_for(&session_id, status).await,
        }
    }

    /// Read-only view of one session. Never schedules work.
    pub async fn session_outcome(&self, session_id: &SessionId) -> Result<SubmissionOutcome> {
        let status = self.store.status(session_id).await?;
        self.outcome_for(session_id, status).await
    }

    /// Resolves the latest-session pointer and reports that session's state.
    /// Never schedules work, even when the session is still pending.
    pub async fn latest_result(&self) -> Result<LatestResult> {
        let Some(session_id) = self.store.latest_session().await? else {
            return Ok(LatestResult::none());
        };

        let status = self.store.status(&session_id).await?;
        if status == SessionStatus::Unknown {
            warn!(session_id = %session_id, "Latest session pointer refers to a missing record");
            return Ok(LatestResult::none());
        }

        let outcome = self.outcome_for(&session_id, status).await?;
        Ok(LatestResult {
            session_id: Some(session_id),
            outcome,
        })
    }

    /// Number of fan-outs scheduled but not finished.
    pub fn in_flight(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_shut_down(&self) -> bool {
        lock(&self.lifecycle).shut_down
    }

    /// Waits for every fan-out scheduled so far. Keeps accepting work
    /// afterwards unless [`shutdown`](Self::shutdown) has begun.
    #[doc(hidden)]
    pub async fn drain(&self) {
        self.tasks.close();
        self.tasks.wait().await;

        let lifecycle = lock(&self.lifecycle);
        if !lifecycle.shut_down {
            self.tasks.reopen();
        }
    }

    /// Refuses new sessions and gives running fan-outs up to `grace` to
    /// commit. Sessions still unfinished at the deadline are committed with
    /// an empty result. Returns `false` if the grace period elapsed.
    pub async fn shutdown(&self, grace: Duration) -> bool {
        lock(&self.lifecycle).shut_down = true;
        self.tasks.close();

        let pending = self.tasks.len();
        if pending > 0 {
            info!(pending, "Waiting for background fan-outs to finish");
        }
        if tokio::time::timeout(grace, self.tasks.wait()).await.is_ok() {
            return true;
        }

        let abandoned: Vec<SessionId> = lock(&self.lifecycle).unfinished.drain().collect();
        warn!(
            abandoned = abandoned.len(),
            "Shutdown grace elapsed; completing unfinished sessions with empty results"
        );
        for session_id in &abandoned {
            if let Err(err) = commit_empty(self.store.as_ref(), session_id).await {
                error!(session_id = %session_id, error = %err, "Failed to complete abandoned session");
            }
        }
        false
    }

    async fn outcome_for(
        &self,
        session_id: &SessionId,
        status: SessionStatus,
    ) -> Result<SubmissionOutcome> {
        match status {
            SessionStatus::Unknown => Ok(SubmissionOutcome::NoSession),
            SessionStatus::Pending => Ok(SubmissionOutcome::Waiting),
            SessionStatus::Ready => {
                let result = self.store.result(session_id).await?.unwrap_or_default();
                Ok(SubmissionOutcome::Done(result))
            }
        }
    }

    /// Spawns the fan-out and tracks the session until it finishes.
    /// Returns `false` without spawning once shutdown has begun.
    fn schedule(&self, session_id: SessionId, theme: Theme) -> bool {
        let mut lifecycle = lock(&self.lifecycle);
        if lifecycle.shut_down {
            return false;
        }
        lifecycle.unfinished.insert(session_id.clone());

        let aggregator = Arc::clone(&self.aggregator);
        let store = Arc::clone(&self.store);
        let permits = Arc::clone(&self.permits);
        let tracked = Arc::clone(&self.lifecycle);

        self.tasks.spawn(async move {
            let _permit = permits.acquire_owned().await.ok();
            let abandoned = !lock(&tracked).unfinished.contains(&session_id);
            if abandoned {
                debug!(session_id = %session_id, "Session completed by shutdown before its fan-out started");
                return;
            }
            run_fan_out(aggregator, store, session_id.clone(), theme).await;
            lock(&tracked).unfinished.remove(&session_id);
        });
        true
    }
}

/// Commits an empty result, treating an earlier commit as success.
async fn commit_empty(store: &dyn SessionStore, session_id: &SessionId) -> Result<()> {
    match store.commit_result(session_id, &SessionResult::new()).await {
        Ok(()) | Err(StoreError::AlreadyCommitted(_)) => Ok(()),
        Err(err) => Err(err.into()),
    }
}

/// Runs one fan-out to completion. A panic anywhere in the workflow still
/// ends with the session committed as `Ready` (empty result) so it can never
/// be stuck in `Pending`.
async fn run_fan_out(
    aggregator: Arc<FanOutAggregator>,
    store: Arc<dyn SessionStore>,
    session_id: SessionId,
    theme: Theme,
) {
    let outcome = AssertUnwindSafe(aggregator.run(&session_id, &theme))
        .catch_unwind()
        .await;

    match outcome {
        Ok(Ok(report)) => {
            debug!(session_id = %session_id, ?report, "Fan-out finished");
        }
        Ok(Err(JudgeError::Store(StoreError::AlreadyCommitted(_)))) => {
            info!(session_id = %session_id, "Session was completed during shutdown; result discarded");
        }
        Ok(Err(err)) => {
            error!(session_id = %session_id, error = %err, "Fan-out could not commit its result");
        }
        Err(_) => {
            error!(session_id = %session_id, "Fan-out panicked; committing empty result");
            if let Err(err) = commit_empty(store.as_ref(), &session_id).await {
                error!(session_id = %session_id, error = %err, "Failed to commit after panic");
            }
        }
    }
}
