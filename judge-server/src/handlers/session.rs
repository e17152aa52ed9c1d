use axum::{
    extract::{Path, State},
    response::Json,
};
use judge_core::{SessionId, SessionResult, SubmissionOutcome, Theme};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::AppState;
use crate::infra::errors::AppResult;

#[derive(Debug, Clone, Deserialize)]
pub struct SessionRequest {
    pub session_id: String,
    pub theme: String,
}

/// Response shape shared by every session endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionResponse {
    pub status: bool,
    pub message: String,
    pub data: Option<SessionResult>,
    pub image_url: String,
}

impl SessionResponse {
    fn new(status: bool, message: &str, data: Option<SessionResult>, image_url: String) -> Self {
        Self {
            status,
            message: message.to_string(),
            data,
            image_url,
        }
    }

    fn from_outcome(outcome: SubmissionOutcome, image_url: String) -> Self {
        match outcome {
            SubmissionOutcome::Initializing => Self::new(false, "initialize", None, image_url),
            SubmissionOutcome::Waiting => Self::new(false, "waiting", None, image_url),
            SubmissionOutcome::Done(result) => Self::new(true, "success", Some(result), image_url),
            SubmissionOutcome::NoSession => Self::new(false, "not found", None, String::new()),
        }
    }
}

/// `POST /session`: starts a session on first sight, reports its state on
/// every later call.
pub async fn submit_session(
    State(state): State<AppState>,
    Json(request): Json<SessionRequest>,
) -> AppResult<Json<SessionResponse>> {
    let session_id = SessionId::parse(request.session_id)?;
    let theme = Theme::parse(request.theme)?;

    let outcome = state
        .orchestrator
        .submit_session(session_id.clone(), theme)
        .await?;
    debug!(session_id = %session_id, ?outcome, "Session submission");

    let image_url = state.image_urls.for_session(&session_id);
    Ok(Json(SessionResponse::from_outcome(outcome, image_url)))
}

/// `GET /session/{session_id}`: read-only view of one session.
pub async fn get_session(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> AppResult<Json<SessionResponse>> {
    let session_id = SessionId::parse(session_id)?;
    let outcome = state.orchestrator.session_outcome(&session_id).await?;

    let image_url = state.image_urls.for_session(&session_id);
    Ok(Json(SessionResponse::from_outcome(outcome, image_url)))
}

/// `GET /result`: state of the most recently submitted session.
pub async fn latest_result(State(state): State<AppState>) -> AppResult<Json<SessionResponse>> {
    let latest = state.orchestrator.latest_result().await?;

    let Some(session_id) = latest.session_id else {
        return Ok(Json(SessionResponse::new(
            false,
            "no session found",
            None,
            String::new(),
        )));
    };
    let image_url = state.image_urls.for_session(&session_id);

    let response = match latest.outcome {
        SubmissionOutcome::Done(result) if !result.is_empty() => {
            SessionResponse::new(true, "success", Some(result), image_url)
        }
        _ => SessionResponse::new(false, "no result found", None, image_url),
    };
    Ok(Json(response))
}
