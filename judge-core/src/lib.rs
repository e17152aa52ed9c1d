//! Session orchestration and fan-out aggregation engine.
//!
//! A client submits a session (an id plus a one-character theme). The first
//! submission for an id is admitted through an atomic store primitive and a
//! background task fans the session image out to every configured evaluator,
//! waits for all of them, and commits whatever succeeded. Any number of
//! callers may poll the session afterwards without re-triggering work.

pub mod auth;
pub mod capture;
pub mod error;
pub mod evaluator;
pub mod fanout;
pub mod orchestrator;
pub mod session;
pub mod store;

pub use auth::AccessToken;
pub use capture::{CapturedImage, FsImageProvider, ImageError, ImageProvider};
pub use error::{JudgeError, Result};
pub use evaluator::{
    EvaluationRequest, Evaluator, EvaluatorEndpoint, EvaluatorError, HttpEvaluator,
};
pub use fanout::{FanOutAggregator, FanOutReport};
pub use orchestrator::SessionOrchestrator;
pub use session::{
    EvaluatorId, InvocationRequest, LatestResult, Score, SessionId, SessionResult, SessionStatus,
    SubmissionOutcome, Theme,
};
#[cfg(feature = "redis")]
pub use store::RedisSessionStore;
pub use store::{InMemorySessionStore, SessionStore, StoreError, StoreKeys};
