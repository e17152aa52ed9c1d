use std::{fmt, sync::Arc};

use judge_config::Config;
use judge_core::{SessionId, SessionOrchestrator};

#[derive(Clone)]
pub struct AppState {
    pub orchestrator: Arc<SessionOrchestrator>,
    pub config: Arc<Config>,
    pub image_urls: ImageUrls,
}

impl fmt::Debug for AppState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AppState")
            .field("orchestrator", &self.orchestrator)
            .finish_non_exhaustive()
    }
}

impl AppState {
    pub fn new(orchestrator: Arc<SessionOrchestrator>, config: Arc<Config>) -> Self {
        let image_urls = ImageUrls::new(&config.assets.public_origin);
        Self {
            orchestrator,
            config,
            image_urls,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }
}

/// Builds the public URL a session's published image is served under.
#[derive(Debug, Clone)]
pub struct ImageUrls {
    origin: Arc<str>,
}

impl ImageUrls {
    pub fn new(origin: &str) -> Self {
        Self {
            origin: Arc::from(origin.trim_end_matches('/')),
        }
    }

    /// Empty when the id has no published asset name, so clients never get a
    /// URL that cannot resolve.
    pub fn for_session(&self, session_id: &SessionId) -> String {
        match session_id.asset_file_name() {
            Some(file_name) => format!("{}/{}", self.origin, urlencoding::encode(&file_name)),
            None => String::new(),
        }
    }
}
