//! Stand-in evaluator backend for local runs without real agents.

use std::time::Duration;

use axum::{extract::State, response::Json};
use judge_core::{InvocationRequest, Score};
use rand::Rng;
use tracing::debug;

use crate::AppState;

/// Answers like a real evaluator after a random delay, with a random score.
pub async fn invoke(
    State(state): State<AppState>,
    Json(request): Json<InvocationRequest<'static>>,
) -> Json<Score> {
    let mock = &state.config().mock;
    let (delay, score) = {
        let mut rng = rand::rng();
        (
            pick_delay(&mut rng, mock.min_delay, mock.max_delay),
            rng.random_range(0..=100),
        )
    };

    debug!(model = %request.model, theme = %request.theme, ?delay, "Mock invocation");
    tokio::time::sleep(delay).await;

    Json(Score {
        reason: format!(
            "{} model invoked with theme {}",
            request.model, request.theme
        ),
        score,
    })
}

/// Uniform delay in `[min, max]`. A `max` below `min` collapses to `min`.
fn pick_delay(rng: &mut impl Rng, min: Duration, max: Duration) -> Duration {
    rng.random_range(min..=max.max(min))
}
