//! Wires configuration into the running service graph.

use std::sync::Arc;

use anyhow::Context;
use judge_config::Config;
use judge_core::{
    AccessToken, Evaluator, EvaluatorEndpoint, EvaluatorId, FanOutAggregator, FsImageProvider,
    HttpEvaluator, ImageProvider, InMemorySessionStore, RedisSessionStore, SessionOrchestrator,
    SessionStore, StoreKeys,
};
use tracing::{info, warn};

use super::app_state::AppState;
use super::credentials;

/// Builds the shared application state: store, credentials, evaluators,
/// image provider and orchestrator.
pub async fn build_state(config: Arc<Config>) -> anyhow::Result<AppState> {
    let store = build_store(&config).await?;
    let client = build_http_client()?;

    let token = credentials::acquire_token(&client, &config.auth)
        .await
        .context("failed to acquire evaluator access token")?;

    let evaluators = build_evaluators(&config, &client, Arc::new(token));
    let images: Arc<dyn ImageProvider> = Arc::new(
        FsImageProvider::new(&config.capture.root).with_asset_dir(&config.assets.dir),
    );

    let orchestrator = build_orchestrator(&config, store, images, evaluators);
    Ok(AppState::new(orchestrator, config))
}

pub async fn build_store(config: &Config) -> anyhow::Result<Arc<dyn SessionStore>> {
    let keys = StoreKeys::new(config.store.namespace.clone());

    match &config.redis {
        Some(redis) => {
            let store = RedisSessionStore::connect(&redis.url, keys)
                .await
                .context("failed to connect to Redis")?;
            info!("Using Redis session store");
            Ok(Arc::new(store))
        }
        None => {
            warn!("Using in-memory session store; state is not shared and is lost on restart");
            Ok(Arc::new(InMemorySessionStore::new()))
        }
    }
}

pub fn build_http_client() -> anyhow::Result<reqwest::Client> {
    reqwest::Client::builder()
        .user_agent(concat!("judge-server/", env!("CARGO_PKG_VERSION")))
        .build()
        .context("failed to build HTTP client")
}

pub fn build_evaluators(
    config: &Config,
    client: &reqwest::Client,
    token: Arc<AccessToken>,
) -> Vec<Arc<dyn Evaluator>> {
    config
        .evaluators
        .backends
        .iter()
        .map(|backend| {
            let endpoint = EvaluatorEndpoint {
                id: EvaluatorId::new(backend.id.clone()),
                model: backend.model.clone(),
                url: backend.url.to_string(),
                timeout: config.evaluators.timeout,
            };
            info!(
                evaluator = %endpoint.id,
                model = %endpoint.model,
                url = %endpoint.url,
                "Registered evaluator"
            );
            Arc::new(HttpEvaluator::new(endpoint, client.clone(), Arc::clone(&token)))
                as Arc<dyn Evaluator>
        })
        .collect()
}

pub fn build_orchestrator(
    config: &Config,
    store: Arc<dyn SessionStore>,
    images: Arc<dyn ImageProvider>,
    evaluators: Vec<Arc<dyn Evaluator>>,
) -> Arc<SessionOrchestrator> {
    let aggregator = FanOutAggregator::new(images, evaluators, Arc::clone(&store))
        .with_capture_delay(config.capture.delay);
    Arc::new(
        SessionOrchestrator::new(store, Arc::new(aggregator))
            .with_max_concurrent_fanouts(config.fanout.max_concurrent),
    )
}
