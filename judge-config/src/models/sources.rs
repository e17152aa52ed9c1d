use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::util::{non_blank, parse_bool, split_csv};

/// Raw configuration as defined in a TOML file.
///
/// Durations are kept as strings (`"3s"`, `"1m 30s"`) and parsed by the
/// loader so errors can name the offending field.
#[derive(Debug, Default, Clone, Deserialize, Serialize)]
#[serde(rename_all = "snake_case", deny_unknown_fields)]
pub struct FileConfig {
    #[serde(default)]
    pub server: FileServerConfig,
    pub redis: Option<FileRedisConfig>,
    #[serde(default)]
    pub store: FileStoreConfig,
    #[serde(default)]
    pub evaluators: FileEvaluatorsConfig,
    #[serde(default)]
    pub auth: FileAuthConfig,
    #[serde(default)]
    pub capture: FileCaptureConfig,
    #[serde(default)]
    pub assets: FileAssetsConfig,
    #[serde(default)]
    pub cors: FileCorsConfig,
    #[serde(default)]
    pub mock: FileMockConfig,
    #[serde(default)]
    pub fanout: FileFanoutConfig,
    #[serde(default)]
    pub shutdown: FileShutdownConfig,
}

#[derive(Debug, Default, Clone, Deserialize, Serialize)]
pub struct FileServerConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub host: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct FileRedisConfig {
    pub url: String,
}

#[derive(Debug, Default, Clone, Deserialize, Serialize)]
pub struct FileStoreConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
}

#[derive(Debug, Default, Clone, Deserialize, Serialize)]
pub struct FileEvaluatorsConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub agent_host: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeout: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub backends: Option<Vec<FileBackendConfig>>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct FileBackendConfig {
    pub id: String,
    pub model: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

#[derive(Debug, Default, Clone, Deserialize, Serialize)]
pub struct FileAuthConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_secret: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub grant_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,
}

#[derive(Debug, Default, Clone, Deserialize, Serialize)]
pub struct FileCaptureConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub root: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub delay: Option<String>,
}

#[derive(Debug, Default, Clone, Deserialize, Serialize)]
pub struct FileAssetsConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dir: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub public_origin: Option<String>,
}

#[derive(Debug, Default, Clone, Deserialize, Serialize)]
pub struct FileCorsConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub allowed_origins: Option<Vec<String>>,
}

#[derive(Debug, Default, Clone, Deserialize, Serialize)]
pub struct FileMockConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub enabled: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_delay: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_delay: Option<String>,
}

#[derive(Debug, Default, Clone, Deserialize, Serialize)]
pub struct FileFanoutConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_concurrent: Option<usize>,
}

#[derive(Debug, Default, Clone, Deserialize, Serialize)]
pub struct FileShutdownConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub grace: Option<String>,
}

/// Environment-derived configuration values.
#[derive(Debug, Default, Clone)]
pub struct EnvConfig {
    pub config_path: Option<PathBuf>,
    pub server_host: Option<String>,
    pub server_port: Option<u16>,
    pub redis_url: Option<String>,
    pub store_namespace: Option<String>,
    pub agent_host: Option<String>,
    pub evaluator_timeout: Option<String>,
    pub authorize_host: Option<String>,
    pub client_id: Option<String>,
    pub client_secret: Option<String>,
    pub grant_type: Option<String>,
    pub scope: Option<String>,
    pub capture_root: Option<PathBuf>,
    pub capture_delay: Option<String>,
    pub asset_dir: Option<PathBuf>,
    pub asset_public_origin: Option<String>,
    pub cors_allowed_origins: Option<Vec<String>>,
    pub mock_enabled: Option<bool>,
    pub mock_min_delay: Option<String>,
    pub mock_max_delay: Option<String>,
    pub fanout_max_concurrent: Option<usize>,
    pub shutdown_grace: Option<String>,
}

impl EnvConfig {
    pub fn gather() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Builds the environment view from an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &str| non_blank(lookup(name));

        Self {
            config_path: var("JUDGE_CONFIG").map(PathBuf::from),
            server_host: var("SERVER_HOST"),
            server_port: var("SERVER_PORT").and_then(|s| s.trim().parse().ok()),
            redis_url: var("REDIS_URL"),
            store_namespace: var("STORE_NAMESPACE"),
            agent_host: var("AGENT_HOST"),
            evaluator_timeout: var("EVALUATOR_TIMEOUT"),
            authorize_host: var("AUTHORIZE_HOST"),
            client_id: var("CLIENT_ID"),
            client_secret: var("CLIENT_SECRET"),
            grant_type: var("GRANT_TYPE"),
            scope: var("SCOPE"),
            capture_root: var("CAPTURE_ROOT").map(PathBuf::from),
            capture_delay: var("CAPTURE_DELAY"),
            asset_dir: var("ASSET_DIR").map(PathBuf::from),
            asset_public_origin: var("ASSET_PUBLIC_ORIGIN"),
            cors_allowed_origins: var("CORS_ALLOWED_ORIGINS").map(|raw| split_csv(&raw)),
            mock_enabled: var("MOCK_EVALUATOR").and_then(|raw| parse_bool(&raw)),
            mock_min_delay: var("MOCK_MIN_DELAY"),
            mock_max_delay: var("MOCK_MAX_DELAY"),
            fanout_max_concurrent: var("FANOUT_MAX_CONCURRENT")
                .and_then(|s| s.trim().parse().ok()),
            shutdown_grace: var("SHUTDOWN_GRACE"),
        }
    }
}
