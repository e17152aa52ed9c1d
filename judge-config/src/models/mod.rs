pub mod sources;

use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use url::Url;

#[derive(Debug, Clone)]
pub struct Config {
    pub server: ServerConfig,
    pub redis: Option<RedisConfig>,
    pub store: StoreConfig,
    pub evaluators: EvaluatorsConfig,
    pub auth: AuthConfig,
    pub capture: CaptureConfig,
    pub assets: AssetsConfig,
    pub cors: CorsConfig,
    pub mock: MockConfig,
    pub fanout: FanoutConfig,
    pub shutdown: ShutdownConfig,
    pub metadata: ConfigMetadata,
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl ServerConfig {
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

#[derive(Debug, Clone)]
pub struct RedisConfig {
    pub url: String,
}

#[derive(Debug, Clone, Default)]
pub struct StoreConfig {
    /// Prefix applied to every session key; empty means no prefix.
    pub namespace: String,
}

#[derive(Debug, Clone)]
pub struct EvaluatorsConfig {
    pub agent_host: Url,
    /// Per-call bound. `None` leaves evaluator calls unbounded.
    pub timeout: Option<Duration>,
    pub backends: Vec<BackendConfig>,
}

/// One evaluator backend with its endpoint fully resolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackendConfig {
    pub id: String,
    pub model: String,
    pub url: Url,
}

#[derive(Clone)]
pub struct AuthConfig {
    pub token_url: Option<Url>,
    pub client_id: Option<String>,
    pub client_secret: Option<String>,
    pub grant_type: String,
    pub scope: Option<String>,
}

impl AuthConfig {
    /// True when a token endpoint is configured and evaluator calls should
    /// carry bearer credentials.
    pub fn is_enabled(&self) -> bool {
        self.token_url.is_some()
    }
}

impl fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthConfig")
            .field("token_url", &self.token_url.as_ref().map(Url::as_str))
            .field("client_id", &self.client_id)
            .field(
                "client_secret",
                &self.client_secret.as_ref().map(|_| "<redacted>"),
            )
            .field("grant_type", &self.grant_type)
            .field("scope", &self.scope)
            .finish()
    }
}

#[derive(Debug, Clone)]
pub struct CaptureConfig {
    pub root: PathBuf,
    pub delay: Duration,
}

#[derive(Debug, Clone)]
pub struct AssetsConfig {
    pub dir: PathBuf,
    /// Origin the published images are reachable under, without a trailing
    /// slash.
    pub public_origin: String,
}

#[derive(Debug, Clone)]
pub struct CorsConfig {
    pub allowed_origins: Vec<String>,
}

impl CorsConfig {
    pub fn is_wildcard_included(&self) -> bool {
        self.allowed_origins
            .iter()
            .any(|origin| origin.trim() == "*")
    }
}

#[derive(Debug, Clone)]
pub struct MockConfig {
    pub enabled: bool,
    pub min_delay: Duration,
    pub max_delay: Duration,
}

#[derive(Debug, Clone)]
pub struct FanoutConfig {
    pub max_concurrent: usize,
}

#[derive(Debug, Clone)]
pub struct ShutdownConfig {
    pub grace: Duration,
}

#[derive(Debug, Clone, Default)]
pub struct ConfigMetadata {
    pub config_path: Option<PathBuf>,
    pub env_file_loaded: bool,
}
