use std::borrow::Cow;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::debug;

use super::{EvaluationRequest, Evaluator, EvaluatorError};
use crate::auth::AccessToken;
use crate::session::{EvaluatorId, InvocationRequest, Score};

/// Where and how to reach one evaluator backend.
#[derive(Debug, Clone)]
pub struct EvaluatorEndpoint {
    pub id: EvaluatorId,
    /// Backend-specific model identifier sent in the request body.
    pub model: String,
    pub url: String,
    /// Per-call bound; `None` waits indefinitely.
    pub timeout: Option<Duration>,
}

/// Evaluator reached over HTTP with a bearer credential.
pub struct HttpEvaluator {
    endpoint: EvaluatorEndpoint,
    client: reqwest::Client,
    token: Arc<AccessToken>,
}

impl fmt::Debug for HttpEvaluator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HttpEvaluator")
            .field("endpoint", &self.endpoint)
            .field("token", &self.token)
            .finish_non_exhaustive()
    }
}

impl HttpEvaluator {
    pub fn new(
        endpoint: EvaluatorEndpoint,
        client: reqwest::Client,
        token: Arc<AccessToken>,
    ) -> Self {
        Self {
            endpoint,
            client,
            token,
        }
    }
}

#[async_trait]
impl Evaluator for HttpEvaluator {
    fn id(&self) -> &EvaluatorId {
        &self.endpoint.id
    }

    async fn evaluate(&self, request: &EvaluationRequest) -> Result<Score, EvaluatorError> {
        let evaluator = &self.endpoint.id;
        let body = InvocationRequest {
            model: Cow::Borrowed(&self.endpoint.model),
            theme: Cow::Borrowed(request.theme().as_str()),
            image: Cow::Borrowed(request.image_base64()),
        };

        let mut call = self.client.post(&self.endpoint.url).json(&body);
        if !self.token.is_anonymous() {
            call = call.bearer_auth(self.token.expose());
        }
        if let Some(timeout) = self.endpoint.timeout {
            call = call.timeout(timeout);
        }

        debug!(evaluator = %evaluator, model = %self.endpoint.model, "Invoking evaluator");

        let transport = |source: reqwest::Error| EvaluatorError::Transport {
            evaluator: evaluator.clone(),
            source,
        };
        let response = call.send().await.map_err(transport)?;
        let status = response.status();
        let text = response.text().await.map_err(transport)?;

        if !status.is_success() {
            return Err(EvaluatorError::Status {
                evaluator: evaluator.clone(),
                status: status.as_u16(),
                body: text,
            });
        }

        serde_json::from_str::<Score>(&text).map_err(|source| EvaluatorError::Decode {
            evaluator: evaluator.clone(),
            source,
        })
    }
}
