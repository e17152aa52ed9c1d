use std::collections::HashSet;

use thiserror::Error;

use crate::models::{AuthConfig, Config};

#[derive(Debug, Error)]
pub enum ConfigGuardRailError {
    #[error("evaluator id '{id}' is configured more than once")]
    DuplicateEvaluator { id: String },
    #[error("evaluator ids must not be empty")]
    EmptyEvaluatorId,
    #[error("auth.token_url is set but {field} is missing")]
    MissingCredential { field: &'static str },
    #[error("mock.min_delay must not exceed mock.max_delay")]
    InvalidMockDelays,
    #[error("fanout.max_concurrent must be at least 1")]
    ZeroFanoutConcurrency,
}

#[derive(Debug, Clone)]
pub struct ConfigWarning {
    pub message: String,
    pub hint: Option<String>,
}

#[derive(Debug, Default, Clone)]
pub struct ConfigWarnings {
    pub items: Vec<ConfigWarning>,
}

impl ConfigWarnings {
    pub fn push<S: Into<String>>(&mut self, message: S) {
        self.items.push(ConfigWarning {
            message: message.into(),
            hint: None,
        });
    }

    pub fn push_with_hint<S: Into<String>, H: Into<String>>(&mut self, message: S, hint: H) {
        self.items.push(ConfigWarning {
            message: message.into(),
            hint: Some(hint.into()),
        });
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn extend(&mut self, other: ConfigWarnings) {
        self.items.extend(other.items);
    }

    pub fn iter(&self) -> impl Iterator<Item = &ConfigWarning> {
        self.items.iter()
    }
}

pub fn apply_guard_rails(config: &Config) -> Result<ConfigWarnings, ConfigGuardRailError> {
    let mut warnings = ConfigWarnings::default();

    let mut seen = HashSet::new();
    for backend in &config.evaluators.backends {
        if backend.id.is_empty() {
            return Err(ConfigGuardRailError::EmptyEvaluatorId);
        }
        if !seen.insert(backend.id.as_str()) {
            return Err(ConfigGuardRailError::DuplicateEvaluator {
                id: backend.id.clone(),
            });
        }
    }

    if config.evaluators.backends.is_empty() {
        warnings.push_with_hint(
            "No evaluator backends configured; every session will complete with an empty result",
            "Add [[evaluators.backends]] entries to the configuration file",
        );
    }

    if config.evaluators.timeout.is_none() {
        warnings.push_with_hint(
            "Evaluator timeout disabled; a stalled backend keeps its session pending",
            "Set evaluators.timeout (EVALUATOR_TIMEOUT) to a non-zero duration",
        );
    }

    if config.redis.is_none() {
        warnings.push_with_hint(
            "REDIS_URL not configured; sessions are kept in process memory",
            "State is lost on restart and cannot be shared between server instances",
        );
    }

    check_auth(&config.auth, &mut warnings)?;

    if config.mock.min_delay > config.mock.max_delay {
        return Err(ConfigGuardRailError::InvalidMockDelays);
    }

    if config.fanout.max_concurrent == 0 {
        return Err(ConfigGuardRailError::ZeroFanoutConcurrency);
    }

    Ok(warnings)
}

fn check_auth(
    auth: &AuthConfig,
    warnings: &mut ConfigWarnings,
) -> Result<(), ConfigGuardRailError> {
    if !auth.is_enabled() {
        warnings.push_with_hint(
            "auth.token_url not set; evaluator requests are sent without credentials",
            "Set AUTHORIZE_HOST, CLIENT_ID and CLIENT_SECRET to enable client-credential auth",
        );
        return Ok(());
    }

    if auth.client_id.as_deref().is_none_or(str::is_empty) {
        return Err(ConfigGuardRailError::MissingCredential { field: "client_id" });
    }
    if auth.client_secret.as_deref().is_none_or(str::is_empty) {
        return Err(ConfigGuardRailError::MissingCredential {
            field: "client_secret",
        });
    }

    Ok(())
}
