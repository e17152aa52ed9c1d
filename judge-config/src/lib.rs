//! Configuration for the gesture judge service.
//!
//! Values are layered: built-in defaults, then an optional TOML file, then
//! environment variables (optionally seeded from a `.env` file). The loader
//! returns the composed [`Config`] along with non-fatal [`ConfigWarnings`].

pub mod constants;
pub mod loader;
pub mod models;
pub mod util;
pub mod validation;

pub use loader::{ConfigLoad, ConfigLoader, error::ConfigLoadError};
pub use models::sources::{EnvConfig, FileConfig};
pub use models::{
    AssetsConfig, AuthConfig, BackendConfig, CaptureConfig, Config, ConfigMetadata, CorsConfig,
    EvaluatorsConfig, FanoutConfig, MockConfig, RedisConfig, ServerConfig, ShutdownConfig,
    StoreConfig,
};
pub use validation::{ConfigGuardRailError, ConfigWarning, ConfigWarnings};
