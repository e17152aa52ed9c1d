use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::debug;

use super::{SessionStore, StoreError, StoreResult};
use crate::session::{SessionId, SessionResult, SessionStatus};

#[derive(Debug, Default)]
struct Record {
    status: SessionStatus,
    result: Option<SessionResult>,
}

#[derive(Debug, Default)]
struct MemoryState {
    records: HashMap<SessionId, Record>,
    latest: Option<SessionId>,
}

/// Process-local store with the same atomicity guarantees as the Redis
/// adapter. Only safe for single-instance deployments.
#[derive(Debug, Default)]
pub struct InMemorySessionStore {
    state: RwLock<MemoryState>,
}

impl InMemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of session records held.
    pub async fn len(&self) -> usize {
        self.state.read().await.records.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[async_trait]
impl SessionStore for InMemorySessionStore {
    async fn status(&self, session_id: &SessionId) -> StoreResult<SessionStatus> {
        let state = self.state.read().await;
        Ok(state
            .records
            .get(session_id)
            .map(|record| record.status)
            .unwrap_or(SessionStatus::Unknown))
    }

    async fn set_status(&self, session_id: &SessionId, status: SessionStatus) -> StoreResult<()> {
        let mut state = self.state.write().await;
        let current = state
            .records
            .get(session_id)
            .map(|record| record.status)
            .unwrap_or(SessionStatus::Unknown);
        if !current.can_advance_to(status) {
            return Err(StoreError::StatusRegression {
                session_id: session_id.clone(),
                from: current,
                to: status,
            });
        }
        state.records.entry(session_id.clone()).or_default().status = status;
        Ok(())
    }

    async fn result(&self, session_id: &SessionId) -> StoreResult<Option<SessionResult>> {
        let state = self.state.read().await;
        Ok(state
            .records
            .get(session_id)
            .and_then(|record| record.result.clone()))
    }

    async fn set_result(&self, session_id: &SessionId, result: &SessionResult) -> StoreResult<()> {
        let mut state = self.state.write().await;
        let record = state.records.entry(session_id.clone()).or_default();
        if record.status == SessionStatus::Ready {
            return Err(StoreError::AlreadyCommitted(session_id.clone()));
        }
        record.result = Some(result.clone());
        Ok(())
    }

    async fn latest_session(&self) -> StoreResult<Option<SessionId>> {
        Ok(self.state.read().await.latest.clone())
    }

    async fn set_latest_session(&self, session_id: &SessionId) -> StoreResult<()> {
        self.state.write().await.latest = Some(session_id.clone());
        Ok(())
    }

    async fn try_admit(&self, session_id: &SessionId) -> StoreResult<bool> {
        let mut state = self.state.write().await;
        if state
            .records
            .get(session_id)
            .is_some_and(|record| record.status != SessionStatus::Unknown)
        {
            debug!(session_id = %session_id, "admission refused, record exists");
            return Ok(false);
        }

        state.records.insert(
            session_id.clone(),
            Record {
                status: SessionStatus::Pending,
                result: None,
            },
        );
        state.latest = Some(session_id.clone());
        Ok(true)
    }

    async fn commit_result(
        &self,
        session_id: &SessionId,
        result: &SessionResult,
    ) -> StoreResult<()> {
        let mut state = self.state.write().await;
        let record = state.records.entry(session_id.clone()).or_default();
        if record.status == SessionStatus::Ready {
            return Err(StoreError::AlreadyCommitted(session_id.clone()));
        }
        record.result = Some(result.clone());
        record.status = SessionStatus::Ready;
        Ok(())
    }
}
