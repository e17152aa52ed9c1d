//! Key-value session store contract.
//!
//! The store is the only shared mutable resource in the engine and may be
//! shared across process instances, so every guarantee the orchestrator
//! relies on (single-flight admission, monotonic status, immutable results)
//! is expressed as a store primitive rather than an in-process lock.

pub mod keys;
pub mod memory;
#[cfg(feature = "redis")]
pub mod redis;

pub use keys::StoreKeys;
pub use memory::InMemorySessionStore;
#[cfg(feature = "redis")]
pub use self::redis::RedisSessionStore;

use std::fmt;

use async_trait::async_trait;
use thiserror::Error;

use crate::session::{SessionId, SessionResult, SessionStatus};

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("store backend unavailable: {0}")]
    Unavailable(String),

    #[error("failed to (de)serialize stored value: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("unexpected value {value:?} stored under {key}")]
    Corrupt { key: String, value: String },

    #[error("refusing to move session {session_id} from {from} to {to}")]
    StatusRegression {
        session_id: SessionId,
        from: SessionStatus,
        to: SessionStatus,
    },

    #[error("result for session {0} is already committed")]
    AlreadyCommitted(SessionId),
}

pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// Persistence contract consumed by the orchestrator and the aggregator.
#[async_trait]
pub trait SessionStore: Send + Sync + fmt::Debug {
    /// Current status; `Unknown` when no record exists.
    async fn status(&self, session_id: &SessionId) -> StoreResult<SessionStatus>;

    /// Writes a status. Rejects `Unknown` and any move backwards.
    async fn set_status(&self, session_id: &SessionId, status: SessionStatus) -> StoreResult<()>;

    async fn result(&self, session_id: &SessionId) -> StoreResult<Option<SessionResult>>;

    /// Writes a result. Rejected once the session is `Ready`.
    async fn set_result(&self, session_id: &SessionId, result: &SessionResult) -> StoreResult<()>;

    async fn latest_session(&self) -> StoreResult<Option<SessionId>>;

    async fn set_latest_session(&self, session_id: &SessionId) -> StoreResult<()>;

    /// Atomically creates the record as `Pending` iff none exists and, in
    /// the same step, points the latest-session pointer at it.
    ///
    /// Returns `true` for exactly one caller per session id.
    async fn try_admit(&self, session_id: &SessionId) -> StoreResult<bool>;

    /// Atomically writes `result` and flips the status to `Ready`.
    ///
    /// Fails with [`StoreError::AlreadyCommitted`] if the session is already
    /// `Ready`, leaving the stored result untouched.
    async fn commit_result(&self, session_id: &SessionId, result: &SessionResult)
    -> StoreResult<()>;
}
