//! Evaluator protocol: one request per backend carrying the theme and the
//! base64 image, answered with a `{reason, score}` judgment.

pub mod client;

pub use client::{EvaluatorEndpoint, HttpEvaluator};

use std::sync::Arc;

use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use thiserror::Error;

use crate::capture::CapturedImage;
use crate::session::{EvaluatorId, Score, Theme};

/// Why a single evaluator produced no score. The variants only matter for
/// logging; the aggregator treats all of them the same way.
#[derive(Error, Debug)]
pub enum EvaluatorError {
    #[error("evaluator {evaluator} returned HTTP {status}: {body}")]
    Status {
        evaluator: EvaluatorId,
        status: u16,
        body: String,
    },

    #[error("transport error calling evaluator {evaluator}: {source}")]
    Transport {
        evaluator: EvaluatorId,
        #[source]
        source: reqwest::Error,
    },

    #[error("malformed response from evaluator {evaluator}: {source}")]
    Decode {
        evaluator: EvaluatorId,
        #[source]
        source: serde_json::Error,
    },

    #[error("evaluator {0} panicked")]
    Panicked(EvaluatorId),
}

impl EvaluatorError {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Status { .. } => "status",
            Self::Transport { .. } => "transport",
            Self::Decode { .. } => "decode",
            Self::Panicked(_) => "panic",
        }
    }
}

/// Payload shared by every evaluator call of one fan-out. The image is
/// encoded once and shared between the concurrent calls.
#[derive(Debug, Clone)]
pub struct EvaluationRequest {
    theme: Theme,
    image_base64: Arc<str>,
}

impl EvaluationRequest {
    pub fn new(theme: Theme, image: &CapturedImage) -> Self {
        Self {
            theme,
            image_base64: STANDARD.encode(image.bytes()).into(),
        }
    }

    pub fn theme(&self) -> &Theme {
        &self.theme
    }

    pub fn image_base64(&self) -> &str {
        &self.image_base64
    }
}

/// A remote scoring backend.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Evaluator: Send + Sync {
    /// Key under which this evaluator's score is stored.
    fn id(&self) -> &EvaluatorId;

    async fn evaluate(&self, request: &EvaluationRequest) -> Result<Score, EvaluatorError>;
}
