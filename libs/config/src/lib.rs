//! # Chainwatch Configuration
//!
//! One [`AppConfig`] is built at startup from a TOML file with
//! `CHAINWATCH__SECTION__KEY` environment overrides, validated, and then
//! handed by reference to every component. Nothing here is global.
//!
//! ```rust,no_run
//! use chainwatch_config::{AppConfig, credentials};
//!
//! let cfg = AppConfig::load(None)?;
//! let keys = credentials::load_keys(&cfg.keys)?;
//! # Ok::<(), anyhow::Error>(())
//! ```

pub mod app_config;
pub mod credentials;

pub use app_config::{
    AppConfig, BundleConfig, ChainConfig, KeysConfig, LoggingConfig, RelayConfig, RestartConfig,
    StorageConfig, WatcherConfig, DEFAULT_CONFIG_PATH, ENV_PREFIX,
};
pub use credentials::{load_keys, load_wallet, Keys};
