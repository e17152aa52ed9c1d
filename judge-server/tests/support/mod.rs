#![allow(dead_code)]

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use anyhow::{Result, anyhow};
use async_trait::async_trait;
use axum_test::TestServer;
use judge_config::{ConfigLoader, EnvConfig};
use judge_core::{
    CapturedImage, EvaluationRequest, Evaluator, EvaluatorError, EvaluatorId, ImageError,
    ImageProvider, InMemorySessionStore, Score, SessionId,
};
use judge_server::{AppState, create_router, infra::startup::build_orchestrator};
use tempfile::TempDir;
use tokio::sync::Semaphore;

pub const PUBLIC_ORIGIN: &str = "http://judge.test/assets";

/// Evaluator that scores every request with a fixed value, optionally
/// blocking until the test opens its gate.
#[derive(Debug)]
pub struct FixedEvaluator {
    id: EvaluatorId,
    score: i64,
    gate: Option<Arc<Semaphore>>,
    calls: AtomicUsize,
}

impl FixedEvaluator {
    pub fn new(id: &str, score: i64) -> Arc<Self> {
        Arc::new(Self {
            id: EvaluatorId::new(id),
            score,
            gate: None,
            calls: AtomicUsize::new(0),
        })
    }

    pub fn gated(id: &str, score: i64, gate: Arc<Semaphore>) -> Arc<Self> {
        Arc::new(Self {
            id: EvaluatorId::new(id),
            score,
            gate: Some(gate),
            calls: AtomicUsize::new(0),
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Evaluator for FixedEvaluator {
    fn id(&self) -> &EvaluatorId {
        &self.id
    }

    async fn evaluate(&self, request: &EvaluationRequest) -> Result<Score, EvaluatorError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(gate) = &self.gate {
            let _permit = gate.acquire().await;
        }
        Ok(Score {
            reason: format!("pose matches {}", request.theme()),
            score: self.score,
        })
    }
}

#[derive(Debug)]
pub struct StaticImage(pub Option<Vec<u8>>);

#[async_trait]
impl ImageProvider for StaticImage {
    async fn latest_image(
        &self,
        _session_id: &SessionId,
    ) -> Result<Option<CapturedImage>, ImageError> {
        Ok(self.0.clone().map(CapturedImage::new))
    }
}

pub struct TestApp {
    pub server: TestServer,
    pub state: AppState,
    pub store: Arc<InMemorySessionStore>,
    _tempdir: TempDir,
}

impl TestApp {
    /// Waits for every scheduled fan-out to commit.
    pub async fn settle(&self) {
        self.state.orchestrator.drain().await;
    }
}

pub async fn build_test_app(
    evaluators: Vec<Arc<FixedEvaluator>>,
    image: Option<Vec<u8>>,
) -> Result<TestApp> {
    let tempdir = tempfile::tempdir()?;
    let config_path = tempdir.path().join("judge.toml");
    std::fs::write(
        &config_path,
        format!(
            r#"
            [capture]
            root = "{captures}"
            delay = "0s"

            [assets]
            dir = "{assets}"
            public_origin = "{PUBLIC_ORIGIN}"

            [mock]
            enabled = true
            min_delay = "0s"
            max_delay = "10ms"
            "#,
            captures = tempdir.path().join("captures").display(),
            assets = tempdir.path().join("assets").display(),
        ),
    )?;

    let config = ConfigLoader::new()
        .with_config_path(&config_path)
        .load_with_env(EnvConfig::default())?
        .config;
    let config = Arc::new(config);

    let store = Arc::new(InMemorySessionStore::new());
    let evaluators = evaluators
        .into_iter()
        .map(|e| e as Arc<dyn Evaluator>)
        .collect();
    let orchestrator = build_orchestrator(
        &config,
        store.clone(),
        Arc::new(StaticImage(image)),
        evaluators,
    );

    let state = AppState::new(orchestrator, config);
    let server = TestServer::builder()
        .build(create_router(state.clone()))
        .map_err(|err| anyhow!(err.to_string()))?;

    Ok(TestApp {
        server,
        state,
        store,
        _tempdir: tempdir,
    })
}
