use std::fmt;

use async_trait::async_trait;
use redis::{AsyncCommands, aio::ConnectionManager};
use tracing::{debug, info};

use super::{SessionStore, StoreError, StoreKeys, StoreResult};
use crate::session::{SessionId, SessionResult, SessionStatus};

/// Redis scripts for atomic operations
mod scripts {
    use redis::Script;

    /// Create the status record iff absent and move the latest pointer with it.
    pub fn admit() -> Script {
        Script::new(
            r#"
            local status_key = KEYS[1]
            local latest_key = KEYS[2]
            local session_id = ARGV[1]

            if redis.call('SET', status_key, 'pending', 'NX') then
                redis.call('SET', latest_key, session_id)
                return 1
            end
            return 0
            "#,
        )
    }

    /// Monotonic status write; a ready session never goes back.
    pub fn advance_status() -> Script {
        Script::new(
            r#"
            local status_key = KEYS[1]
            local next = ARGV[1]

            local current = redis.call('GET', status_key)
            if current == 'ready' and next ~= 'ready' then
                return 0
            end
            redis.call('SET', status_key, next)
            return 1
            "#,
        )
    }

    /// Result write, optionally flipping the session to ready in the same step.
    /// Refused once the session is ready.
    pub fn write_result() -> Script {
        Script::new(
            r#"
            local status_key = KEYS[1]
            local result_key = KEYS[2]
            local payload = ARGV[1]
            local mark_ready = ARGV[2] == '1'

            if redis.call('GET', status_key) == 'ready' then
                return 0
            end
            redis.call('SET', result_key, payload)
            if mark_ready then
                redis.call('SET', status_key, 'ready')
            end
            return 1
            "#,
        )
    }
}

/// Session store backed by a shared Redis instance.
///
/// All multi-key invariants are enforced by server-side scripts, so the
/// guarantees hold across any number of server processes.
#[derive(Clone)]
pub struct RedisSessionStore {
    conn: ConnectionManager,
    keys: StoreKeys,
}

impl fmt::Debug for RedisSessionStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RedisSessionStore")
            .field("connection", &"ConnectionManager")
            .field("keys", &self.keys)
            .finish()
    }
}

impl RedisSessionStore {
    pub async fn connect(redis_url: &str, keys: StoreKeys) -> StoreResult<Self> {
        info!("Connecting to Redis session store at {}", redis_url);

        let client = redis::Client::open(redis_url).map_err(|e| {
            StoreError::Unavailable(format!("Failed to create Redis client: {e}"))
        })?;

        let conn = ConnectionManager::new(client)
            .await
            .map_err(|e| StoreError::Unavailable(format!("Failed to connect to Redis: {e}")))?;

        info!("Successfully connected to Redis session store");

        Ok(Self { conn, keys })
    }

    pub fn from_connection(conn: ConnectionManager, keys: StoreKeys) -> Self {
        Self { conn, keys }
    }

    async fn write_result(
        &self,
        session_id: &SessionId,
        result: &SessionResult,
        mark_ready: bool,
    ) -> StoreResult<()> {
        let payload = serde_json::to_string(result)?;
        let mut conn = self.conn.clone();

        let written: i64 = scripts::write_result()
            .key(self.keys.status(session_id))
            .key(self.keys.result(session_id))
            .arg(payload)
            .arg(if mark_ready { "1" } else { "0" })
            .invoke_async(&mut conn)
            .await
            .map_err(|e| StoreError::Unavailable(format!("Redis result write failed: {e}")))?;

        if written == 0 {
            return Err(StoreError::AlreadyCommitted(session_id.clone()));
        }
        Ok(())
    }
}

#[async_trait]
impl SessionStore for RedisSessionStore {
    async fn status(&self, session_id: &SessionId) -> StoreResult<SessionStatus> {
        let key = self.keys.status(session_id);
        let mut conn = self.conn.clone();

        let raw: Option<String> = conn
            .get(&key)
            .await
            .map_err(|e| StoreError::Unavailable(format!("Redis GET failed: {e}")))?;

        match raw {
            None => Ok(SessionStatus::Unknown),
            Some(value) => SessionStatus::parse(&value).ok_or(StoreError::Corrupt { key, value }),
        }
    }

    async fn set_status(&self, session_id: &SessionId, status: SessionStatus) -> StoreResult<()> {
        if status == SessionStatus::Unknown {
            return Err(StoreError::StatusRegression {
                session_id: session_id.clone(),
                from: self.status(session_id).await?,
                to: status,
            });
        }

        let mut conn = self.conn.clone();
        let applied: i64 = scripts::advance_status()
            .key(self.keys.status(session_id))
            .arg(status.as_str())
            .invoke_async(&mut conn)
            .await
            .map_err(|e| StoreError::Unavailable(format!("Redis status write failed: {e}")))?;

        if applied == 0 {
            return Err(StoreError::StatusRegression {
                session_id: session_id.clone(),
                from: SessionStatus::Ready,
                to: status,
            });
        }
        Ok(())
    }

    async fn result(&self, session_id: &SessionId) -> StoreResult<Option<SessionResult>> {
        let key = self.keys.result(session_id);
        debug!("Session store GET: {}", key);
        let mut conn = self.conn.clone();

        let raw: Option<String> = conn
            .get(&key)
            .await
            .map_err(|e| StoreError::Unavailable(format!("Redis GET failed: {e}")))?;

        raw.map(|json| serde_json::from_str(&json))
            .transpose()
            .map_err(StoreError::from)
    }

    async fn set_result(&self, session_id: &SessionId, result: &SessionResult) -> StoreResult<()> {
        self.write_result(session_id, result, false).await
    }

    async fn latest_session(&self) -> StoreResult<Option<SessionId>> {
        let key = self.keys.latest_session();
        let mut conn = self.conn.clone();

        let raw: Option<String> = conn
            .get(&key)
            .await
            .map_err(|e| StoreError::Unavailable(format!("Redis GET failed: {e}")))?;

        raw.map(|value| {
            SessionId::parse(value.clone()).map_err(|_| StoreError::Corrupt {
                key: key.clone(),
                value,
            })
        })
        .transpose()
    }

    async fn set_latest_session(&self, session_id: &SessionId) -> StoreResult<()> {
        let mut conn = self.conn.clone();
        conn.set::<_, _, ()>(self.keys.latest_session(), session_id.as_str())
            .await
            .map_err(|e| StoreError::Unavailable(format!("Redis SET failed: {e}")))
    }

    async fn try_admit(&self, session_id: &SessionId) -> StoreResult<bool> {
        let mut conn = self.conn.clone();
        let admitted: i64 = scripts::admit()
            .key(self.keys.status(session_id))
            .key(self.keys.latest_session())
            .arg(session_id.as_str())
            .invoke_async(&mut conn)
            .await
            .map_err(|e| StoreError::Unavailable(format!("Redis admission failed: {e}")))?;

        debug!(session_id = %session_id, admitted = admitted == 1, "Session admission");
        Ok(admitted == 1)
    }

    async fn commit_result(
        &self,
        session_id: &SessionId,
        result: &SessionResult,
    ) -> StoreResult<()> {
        self.write_result(session_id, result, true).await
    }
}
