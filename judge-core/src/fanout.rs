//! Background fan-out: acquire the session image, call every evaluator
//! concurrently, keep what succeeded and commit it as the session result.

use std::fmt;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use futures::FutureExt;
use futures::future::join_all;
use tracing::{debug, info, instrument, warn};

use crate::capture::ImageProvider;
use crate::error::Result;
use crate::evaluator::{EvaluationRequest, Evaluator, EvaluatorError};
use crate::session::{EvaluatorId, SessionId, SessionResult, Theme};
use crate::store::SessionStore;

/// Counters describing one completed fan-out.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FanOutReport {
    pub image_found: bool,
    pub attempted: usize,
    pub succeeded: usize,
    pub failed: usize,
}

pub struct FanOutAggregator {
    images: Arc<dyn ImageProvider>,
    evaluators: Vec<Arc<dyn Evaluator>>,
    store: Arc<dyn SessionStore>,
    capture_delay: Duration,
}

impl fmt::Debug for FanOutAggregator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FanOutAggregator")
            .field("evaluators", &self.evaluator_ids())
            .field("capture_delay", &self.capture_delay)
            .finish_non_exhaustive()
    }
}

impl FanOutAggregator {
    pub fn new(
        images: Arc<dyn ImageProvider>,
        evaluators: Vec<Arc<dyn Evaluator>>,
        store: Arc<dyn SessionStore>,
    ) -> Self {
        Self {
            images,
            evaluators,
            store,
            capture_delay: Duration::ZERO,
        }
    }

    /// Wait applied before the image is acquired so the capture device can
    /// land the frame belonging to the new session.
    pub fn with_capture_delay(mut self, capture_delay: Duration) -> Self {
        self.capture_delay = capture_delay;
        self
    }

    pub fn evaluator_ids(&self) -> Vec<EvaluatorId> {
        self.evaluators.iter().map(|e| e.id().clone()).collect()
    }

    /// Runs the whole workflow for one admitted session and commits the
    /// result. Every path that reaches the store ends in `Ready`.
    #[instrument(skip_all, fields(session_id = %session_id, theme = %theme))]
    pub async fn run(&self, session_id: &SessionId, theme: &Theme) -> Result<FanOutReport> {
        if !self.capture_delay.is_zero() {
            tokio::time::sleep(self.capture_delay).await;
        }

        let image = match self.images.latest_image(session_id).await {
            Ok(image) => image,
            Err(err) => {
                warn!(error = %err, "Image acquisition failed; treating as no image");
                None
            }
        };

        let Some(image) = image else {
            info!("No image available; completing session with an empty result");
            self.store
                .commit_result(session_id, &SessionResult::new())
                .await?;
            return Ok(FanOutReport::default());
        };

        let request = EvaluationRequest::new(theme.clone(), &image);
        let (result, report) = self.evaluate_all(&request).await;

        self.store.commit_result(session_id, &result).await?;
        info!(
            attempted = report.attempted,
            succeeded = report.succeeded,
            failed = report.failed,
            "Session result committed"
        );
        Ok(report)
    }

    /// Issues every evaluator call at once and waits for all of them to
    /// settle. Failures, including panics, only drop that evaluator.
    pub async fn evaluate_all(&self, request: &EvaluationRequest) -> (SessionResult, FanOutReport) {
        let calls = self.evaluators.iter().map(|evaluator| async move {
            let outcome = AssertUnwindSafe(async { evaluator.evaluate(request).await })
                .catch_unwind()
                .await
                .unwrap_or_else(|_| Err(EvaluatorError::Panicked(evaluator.id().clone())));
            (evaluator.id().clone(), outcome)
        });

        let mut report = FanOutReport {
            image_found: true,
            attempted: self.evaluators.len(),
            ..FanOutReport::default()
        };
        let mut result = SessionResult::new();

        for (evaluator, outcome) in join_all(calls).await {
            match outcome {
                Ok(score) => {
                    debug!(evaluator = %evaluator, score = score.score, "Evaluator succeeded");
                    result.insert(evaluator, score);
                    report.succeeded += 1;
                }
                Err(err) => {
                    warn!(
                        evaluator = %evaluator,
                        kind = err.kind(),
                        error = %err,
                        "Evaluator failed; omitting from result"
                    );
                    report.failed += 1;
                }
            }
        }

        (result, report)
    }
}
