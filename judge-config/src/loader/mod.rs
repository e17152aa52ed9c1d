pub mod error;

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use tracing::debug;
use url::Url;

use self::error::ConfigLoadError;
use crate::constants::*;
use crate::models::sources::{EnvConfig, FileBackendConfig, FileConfig};
use crate::models::{
    AssetsConfig, AuthConfig, BackendConfig, CaptureConfig, Config, ConfigMetadata, CorsConfig,
    EvaluatorsConfig, FanoutConfig, MockConfig, RedisConfig, ServerConfig, ShutdownConfig,
    StoreConfig,
};
use crate::validation::{self, ConfigWarnings};

#[derive(Debug, Default, Clone)]
struct ConfigLoaderOptions {
    config_path: Option<PathBuf>,
    env_file: Option<PathBuf>,
}

#[derive(Debug, Default)]
pub struct ConfigLoader {
    options: ConfigLoaderOptions,
}

#[derive(Debug)]
pub struct ConfigLoad {
    pub config: Config,
    pub warnings: ConfigWarnings,
}

impl ConfigLoader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config_path<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.options.config_path = Some(path.into());
        self
    }

    pub fn with_env_file<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.options.env_file = Some(path.into());
        self
    }

    /// Loads `.env`, reads the process environment and composes the final
    /// configuration.
    pub fn load(&self) -> Result<ConfigLoad, ConfigLoadError> {
        let env_file_loaded = self.load_env_file()?;
        let mut load = self.load_with_env(EnvConfig::gather())?;
        load.config.metadata.env_file_loaded = env_file_loaded;
        Ok(load)
    }

    /// Composes the configuration from an already gathered environment. Does
    /// not touch `.env` or the process environment.
    pub fn load_with_env(&self, env: EnvConfig) -> Result<ConfigLoad, ConfigLoadError> {
        let (file_config, config_path) = self.load_file_config(&env)?;
        let config = compose_config(file_config, env, config_path)?;

        let mut warnings = ConfigWarnings::default();
        if config.metadata.config_path.is_none() {
            warnings.push_with_hint(
                "No judge.toml detected; using defaults and environment variables",
                "Pass --config or set JUDGE_CONFIG to point at a configuration file",
            );
        }
        warnings.extend(validation::apply_guard_rails(&config)?);

        Ok(ConfigLoad { config, warnings })
    }

    fn load_env_file(&self) -> Result<bool, ConfigLoadError> {
        let loaded = match &self.options.env_file {
            Some(path) => dotenvy::from_path(path).map(|_| true),
            None => dotenvy::dotenv().map(|_| true),
        };
        match loaded {
            Ok(loaded) => Ok(loaded),
            Err(dotenvy::Error::Io(_)) => Ok(false),
            Err(err) => Err(err.into()),
        }
    }

    fn load_file_config(
        &self,
        env: &EnvConfig,
    ) -> Result<(Option<FileConfig>, Option<PathBuf>), ConfigLoadError> {
        let explicit = self
            .options
            .config_path
            .clone()
            .or_else(|| env.config_path.clone());

        let path = match explicit {
            Some(path) if !path.exists() => {
                return Err(ConfigLoadError::MissingConfig { path });
            }
            Some(path) => path,
            None => match DEFAULT_CONFIG_LOCATIONS
                .iter()
                .map(PathBuf::from)
                .find(|candidate| candidate.exists())
            {
                Some(path) => path,
                None => return Ok((None, None)),
            },
        };

        debug!(path = %path.display(), "Reading configuration file");
        let file_config = read_file_config(&path)?;
        Ok((Some(file_config), Some(path)))
    }
}

fn read_file_config(path: &Path) -> Result<FileConfig, ConfigLoadError> {
    let contents = fs::read_to_string(path).map_err(|source| ConfigLoadError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    toml::from_str(&contents).map_err(|source| ConfigLoadError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

fn compose_config(
    file_config: Option<FileConfig>,
    env: EnvConfig,
    config_path: Option<PathBuf>,
) -> Result<Config, ConfigLoadError> {
    let FileConfig {
        server: file_server,
        redis: file_redis,
        store: file_store,
        evaluators: file_evaluators,
        auth: file_auth,
        capture: file_capture,
        assets: file_assets,
        cors: file_cors,
        mock: file_mock,
        fanout: file_fanout,
        shutdown: file_shutdown,
    } = file_config.unwrap_or_default();

    let server = ServerConfig {
        host: env
            .server_host
            .or(file_server.host)
            .unwrap_or_else(|| DEFAULT_HOST.to_string()),
        port: env.server_port.or(file_server.port).unwrap_or(DEFAULT_PORT),
    };

    let redis = env
        .redis_url
        .or(file_redis.map(|r| r.url))
        .filter(|url| !url.trim().is_empty())
        .map(|url| RedisConfig { url });

    let store = StoreConfig {
        namespace: env
            .store_namespace
            .or(file_store.namespace)
            .unwrap_or_default(),
    };

    let agent_host_raw = env
        .agent_host
        .or(file_evaluators.agent_host)
        .unwrap_or_else(|| DEFAULT_AGENT_HOST.to_string());
    let agent_host = parse_url("evaluators.agent_host", &agent_host_raw)?;

    let timeout = resolve_duration(
        "evaluators.timeout",
        env.evaluator_timeout,
        file_evaluators.timeout,
        DEFAULT_EVALUATOR_TIMEOUT,
    )?;
    let timeout = (!timeout.is_zero()).then_some(timeout);

    let backends = file_evaluators
        .backends
        .unwrap_or_else(default_backends)
        .into_iter()
        .map(|backend| resolve_backend(backend, &agent_host))
        .collect::<Result<Vec<_>, _>>()?;

    let evaluators = EvaluatorsConfig {
        agent_host,
        timeout,
        backends,
    };

    let token_url = env
        .authorize_host
        .or(file_auth.token_url)
        .filter(|raw| !raw.trim().is_empty())
        .map(|raw| parse_url("auth.token_url", &raw))
        .transpose()?;
    let auth = AuthConfig {
        token_url,
        client_id: env.client_id.or(file_auth.client_id),
        client_secret: env.client_secret.or(file_auth.client_secret),
        grant_type: env
            .grant_type
            .or(file_auth.grant_type)
            .unwrap_or_else(|| DEFAULT_GRANT_TYPE.to_string()),
        scope: env.scope.or(file_auth.scope),
    };

    let capture = CaptureConfig {
        root: env
            .capture_root
            .or(file_capture.root)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_CAPTURE_ROOT)),
        delay: resolve_duration(
            "capture.delay",
            env.capture_delay,
            file_capture.delay,
            DEFAULT_CAPTURE_DELAY,
        )?,
    };

    let public_origin = env
        .asset_public_origin
        .or(file_assets.public_origin)
        .unwrap_or_else(|| DEFAULT_ASSET_PUBLIC_ORIGIN.to_string());
    parse_url("assets.public_origin", &public_origin)?;
    let assets = AssetsConfig {
        dir: env
            .asset_dir
            .or(file_assets.dir)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_ASSET_DIR)),
        public_origin: public_origin.trim().trim_end_matches('/').to_string(),
    };

    let cors = CorsConfig {
        allowed_origins: env
            .cors_allowed_origins
            .or(file_cors.allowed_origins)
            .unwrap_or_else(|| vec!["*".to_string()]),
    };

    let mock = MockConfig {
        enabled: env.mock_enabled.or(file_mock.enabled).unwrap_or(true),
        min_delay: resolve_duration(
            "mock.min_delay",
            env.mock_min_delay,
            file_mock.min_delay,
            DEFAULT_MOCK_MIN_DELAY,
        )?,
        max_delay: resolve_duration(
            "mock.max_delay",
            env.mock_max_delay,
            file_mock.max_delay,
            DEFAULT_MOCK_MAX_DELAY,
        )?,
    };

    let fanout = FanoutConfig {
        max_concurrent: env
            .fanout_max_concurrent
            .or(file_fanout.max_concurrent)
            .unwrap_or(DEFAULT_MAX_CONCURRENT_FANOUTS),
    };

    let shutdown = ShutdownConfig {
        grace: resolve_duration(
            "shutdown.grace",
            env.shutdown_grace,
            file_shutdown.grace,
            DEFAULT_SHUTDOWN_GRACE,
        )?,
    };

    Ok(Config {
        server,
        redis,
        store,
        evaluators,
        auth,
        capture,
        assets,
        cors,
        mock,
        fanout,
        shutdown,
        metadata: ConfigMetadata {
            config_path,
            env_file_loaded: false,
        },
    })
}

fn default_backends() -> Vec<FileBackendConfig> {
    DEFAULT_BACKENDS
        .iter()
        .map(|(id, model)| FileBackendConfig {
            id: id.to_string(),
            model: model.to_string(),
            url: None,
        })
        .collect()
}

fn resolve_backend(
    backend: FileBackendConfig,
    agent_host: &Url,
) -> Result<BackendConfig, ConfigLoadError> {
    let url = match backend.url {
        Some(raw) => parse_url("evaluators.backends.url", &raw)?,
        None => invocation_url(agent_host)?,
    };
    Ok(BackendConfig {
        id: backend.id.trim().to_string(),
        model: backend.model,
        url,
    })
}

/// `<agent_host>/invocations`, keeping any path prefix on the host.
fn invocation_url(agent_host: &Url) -> Result<Url, ConfigLoadError> {
    let raw = format!(
        "{}/{}",
        agent_host.as_str().trim_end_matches('/'),
        DEFAULT_INVOCATION_PATH
    );
    parse_url("evaluators.agent_host", &raw)
}

fn parse_url(field: &'static str, raw: &str) -> Result<Url, ConfigLoadError> {
    Url::parse(raw.trim()).map_err(|source| ConfigLoadError::InvalidUrl {
        field,
        value: raw.to_string(),
        source,
    })
}

fn resolve_duration(
    field: &'static str,
    env: Option<String>,
    file: Option<String>,
    default: Duration,
) -> Result<Duration, ConfigLoadError> {
    match env.or(file) {
        Some(raw) => humantime::parse_duration(raw.trim()).map_err(|source| {
            ConfigLoadError::InvalidDuration {
                field,
                value: raw,
                source,
            }
        }),
        None => Ok(default),
    }
}
