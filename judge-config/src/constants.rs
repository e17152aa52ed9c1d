//! Built-in defaults.

use std::time::Duration;

pub const DEFAULT_HOST: &str = "0.0.0.0";
pub const DEFAULT_PORT: u16 = 8000;

pub const DEFAULT_AGENT_HOST: &str = "http://0.0.0.0:8000";
pub const DEFAULT_INVOCATION_PATH: &str = "invocations";
pub const DEFAULT_EVALUATOR_TIMEOUT: Duration = Duration::from_secs(60);

/// `(evaluator id, model identifier)` for the backends enabled when the
/// configuration file lists none.
pub const DEFAULT_BACKENDS: [(&str, &str); 4] = [
    ("amazon", "amazon.nova-pro-v1:0"),
    ("anthropic", "anthropic.claude-sonnet-4-20250514-v1:0"),
    ("meta", "meta.llama4-maverick-17b-instruct-v1:0"),
    ("stability", "stability.sd3-5-large-v1:0"),
];

pub const DEFAULT_GRANT_TYPE: &str = "client_credentials";

pub const DEFAULT_CAPTURE_ROOT: &str = "./captures";
pub const DEFAULT_CAPTURE_DELAY: Duration = Duration::from_secs(3);

pub const DEFAULT_ASSET_DIR: &str = "./assets";
pub const DEFAULT_ASSET_PUBLIC_ORIGIN: &str = "http://localhost:8000/assets";

pub const DEFAULT_MOCK_MIN_DELAY: Duration = Duration::from_secs(1);
pub const DEFAULT_MOCK_MAX_DELAY: Duration = Duration::from_secs(3);

pub const DEFAULT_MAX_CONCURRENT_FANOUTS: usize = 16;
pub const DEFAULT_SHUTDOWN_GRACE: Duration = Duration::from_secs(30);

pub const DEFAULT_CONFIG_LOCATIONS: [&str; 2] = ["judge.toml", "config/judge.toml"];
