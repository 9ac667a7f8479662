//! Application configuration
//!
//! Loads `config/chainwatch.toml` (or an explicit path) and layers
//! `CHAINWATCH__<SECTION>__<KEY>` environment variables on top.

use anyhow::{bail, Context, Result};
use config_crate::{Config, Environment, File, FileFormat};
use ethers::types::{Address, U256};
use serde::de::{self, Deserializer, Visitor};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use tracing::{debug, info};
use types::TxType;

pub const DEFAULT_CONFIG_PATH: &str = "config/chainwatch.toml";
pub const ENV_PREFIX: &str = "CHAINWATCH";
/// Upper bound on `bundle.gas_buffer_pct`
pub const MAX_GAS_BUFFER_PCT: u64 = 1_000;

/// Root configuration object
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct AppConfig {
    pub chain: ChainConfig,
    pub watcher: WatcherConfig,
    pub bundle: BundleConfig,
    #[serde(default)]
    pub relay: RelayConfig,
    #[serde(default)]
    pub keys: KeysConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    pub storage: Option<StorageConfig>,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ChainConfig {
    pub ws_url: String,
    /// Checked against the node at startup when set
    pub chain_id: Option<u64>,
    #[serde(default = "default_rpc_timeout_ms")]
    pub rpc_timeout_ms: u64,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct WatcherConfig {
    pub contract_address: Address,
    #[serde(default = "default_abi_dir")]
    pub abi_dir: PathBuf,
    pub abi_file: Option<String>,
    /// Event names from the ABI to subscribe to. Empty means every event.
    #[serde(default)]
    pub events: Vec<String>,
    /// Extra text signatures, e.g. `Transfer(address,address,uint256)`
    #[serde(default)]
    pub signatures: Vec<String>,
    #[serde(default = "default_event_buffer")]
    pub event_buffer: usize,
    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,
    #[serde(default = "default_true")]
    pub subscribe_heads: bool,
    #[serde(default)]
    pub subscribe_pending: bool,
    #[serde(default = "default_lookup_workers")]
    pub lookup_workers: usize,
    /// Function name whose pending calls to `contract_address` fire a trigger
    pub pending_selector: Option<String>,
    pub from_block: Option<u64>,
    #[serde(default)]
    pub restart: RestartConfig,
}

/// Supervised restart policy for subscription loops
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct RestartConfig {
    /// 0 makes the first subscription error fatal
    #[serde(default = "default_max_restarts")]
    pub max_restarts: u32,
    #[serde(default = "default_base_backoff_ms")]
    pub base_backoff_ms: u64,
    #[serde(default = "default_max_backoff_ms")]
    pub max_backoff_ms: u64,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct BundleConfig {
    pub contract_address: Address,
    pub abi_file: String,
    #[serde(default = "default_function")]
    pub function: String,
    /// Arguments in human-readable form, tokenized against the function inputs
    #[serde(default)]
    pub args: Vec<String>,
    #[serde(default = "default_value_wei", deserialize_with = "de_u256")]
    pub value_wei: U256,
    #[serde(default = "default_gas_limit")]
    pub gas_limit: u64,
    #[serde(default = "default_gas_buffer_pct")]
    pub gas_buffer_pct: u64,
    #[serde(default = "default_tx_count")]
    pub tx_count: usize,
    #[serde(default = "default_target_block_offset")]
    pub target_block_offset: u64,
    /// Triggers carrying an amount below this are skipped
    #[serde(default, deserialize_with = "de_opt_u256")]
    pub min_trigger_amount: Option<U256>,
    #[serde(default)]
    pub tx_type: TxType,
    /// Decoded events that start a build. Empty means every decoded event.
    #[serde(default)]
    pub trigger_events: Vec<String>,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct RelayConfig {
    #[serde(default = "default_relay_url")]
    pub url: String,
    #[serde(default = "default_relay_timeout_ms")]
    pub timeout_ms: u64,
    /// Use the call (simulation) path instead of send
    #[serde(default)]
    pub simulate: bool,
    #[serde(default = "default_state_block")]
    pub state_block: String,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct KeysConfig {
    #[serde(default = "default_signer_key_env")]
    pub signer_key_env: String,
    /// Falls back to the signer key when unset
    pub relay_identity_key_env: Option<String>,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default)]
    pub json: bool,
}

/// Dynamic struct array inspected by the `locks` mode
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct StorageConfig {
    pub contract_address: Address,
    pub base_slot: u64,
    /// Upper bound on elements read in one pass
    #[serde(default = "default_max_entries")]
    pub max_entries: u64,
}

fn default_rpc_timeout_ms() -> u64 {
    5_000
}
fn default_abi_dir() -> PathBuf {
    PathBuf::from("abis")
}
fn default_event_buffer() -> usize {
    100
}
fn default_poll_interval_secs() -> u64 {
    12
}
fn default_true() -> bool {
    true
}
fn default_lookup_workers() -> usize {
    8
}
fn default_max_restarts() -> u32 {
    5
}
fn default_base_backoff_ms() -> u64 {
    1_000
}
fn default_max_backoff_ms() -> u64 {
    30_000
}
fn default_function() -> String {
    "presale".to_string()
}
fn default_value_wei() -> U256 {
    U256::one()
}
fn default_gas_limit() -> u64 {
    200_000
}
fn default_gas_buffer_pct() -> u64 {
    20
}
fn default_tx_count() -> usize {
    2
}
fn default_target_block_offset() -> u64 {
    1
}
fn default_relay_url() -> String {
    "https://relay.flashbots.net".to_string()
}
fn default_relay_timeout_ms() -> u64 {
    3_000
}
fn default_state_block() -> String {
    "latest".to_string()
}
fn default_signer_key_env() -> String {
    "CHAINWATCH_SIGNER_KEY".to_string()
}
fn default_log_level() -> String {
    "info".to_string()
}
fn default_max_entries() -> u64 {
    1_000
}

impl Default for RestartConfig {
    fn default() -> Self {
        Self {
            max_restarts: default_max_restarts(),
            base_backoff_ms: default_base_backoff_ms(),
            max_backoff_ms: default_max_backoff_ms(),
        }
    }
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            url: default_relay_url(),
            timeout_ms: default_relay_timeout_ms(),
            simulate: false,
            state_block: default_state_block(),
        }
    }
}

impl Default for KeysConfig {
    fn default() -> Self {
        Self {
            signer_key_env: default_signer_key_env(),
            relay_identity_key_env: None,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

impl AppConfig {
    /// Load from a TOML file with environment overrides, then validate.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let path = path.unwrap_or(Path::new(DEFAULT_CONFIG_PATH));
        info!("Loading configuration from {:?}", path);

        let builder = Config::builder().add_source(File::from(path).required(true));
        Self::finish(builder)
    }

    /// Same layering as [`AppConfig::load`], starting from an in-memory TOML document.
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let builder = Config::builder().add_source(File::from_str(content, FileFormat::Toml));
        Self::finish(builder)
    }

    fn finish(
        builder: config_crate::ConfigBuilder<config_crate::builder::DefaultState>,
    ) -> Result<Self> {
        let config = builder
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .context("Failed to build configuration")?;

        let mut cfg: AppConfig = config
            .try_deserialize()
            .context("Failed to deserialize configuration")?;
        cfg.expand_env_vars()?;
        cfg.validate()?;
        debug!(chain = ?cfg.chain, relay = %cfg.relay.url, "Configuration loaded");
        Ok(cfg)
    }

    /// Expand `${VAR}` references in endpoint URLs.
    pub fn expand_env_vars(&mut self) -> Result<()> {
        self.chain.ws_url = shellexpand::env(&self.chain.ws_url)
            .context("Failed to expand chain.ws_url")?
            .to_string();
        self.relay.url = shellexpand::env(&self.relay.url)
            .context("Failed to expand relay.url")?
            .to_string();
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        let ws = url::Url::parse(&self.chain.ws_url).context("chain.ws_url is not a valid URL")?;
        if !matches!(ws.scheme(), "ws" | "wss") {
            bail!("chain.ws_url must use ws:// or wss://, got {}", ws.scheme());
        }
        if self.chain.rpc_timeout_ms == 0 {
            bail!("chain.rpc_timeout_ms must be positive");
        }

        let relay = url::Url::parse(&self.relay.url).context("relay.url is not a valid URL")?;
        if !matches!(relay.scheme(), "http" | "https") {
            bail!("relay.url must use http:// or https://, got {}", relay.scheme());
        }
        if self.relay.timeout_ms == 0 {
            bail!("relay.timeout_ms must be positive");
        }

        if self.watcher.event_buffer == 0 {
            bail!("watcher.event_buffer must be positive");
        }
        if self.watcher.lookup_workers == 0 {
            bail!("watcher.lookup_workers must be positive");
        }
        if self.watcher.abi_file.is_none() && self.watcher.signatures.is_empty() {
            bail!("watcher needs an abi_file or at least one entry in signatures");
        }
        let restart = &self.watcher.restart;
        if restart.base_backoff_ms > restart.max_backoff_ms {
            bail!(
                "watcher.restart.base_backoff_ms ({}) exceeds max_backoff_ms ({})",
                restart.base_backoff_ms,
                restart.max_backoff_ms
            );
        }

        if self.bundle.tx_count == 0 {
            bail!("bundle.tx_count must be at least 1");
        }
        if self.bundle.target_block_offset == 0 {
            bail!("bundle.target_block_offset must be at least 1");
        }
        if self.bundle.gas_limit == 0 {
            bail!("bundle.gas_limit must be positive");
        }
        if self.bundle.gas_buffer_pct > MAX_GAS_BUFFER_PCT {
            bail!(
                "bundle.gas_buffer_pct ({}) exceeds {}",
                self.bundle.gas_buffer_pct,
                MAX_GAS_BUFFER_PCT
            );
        }
        Ok(())
    }

    pub fn watcher_abi_path(&self) -> Option<PathBuf> {
        self.watcher
            .abi_file
            .as_ref()
            .map(|file| self.watcher.abi_dir.join(file))
    }

    pub fn bundle_abi_path(&self) -> PathBuf {
        self.watcher.abi_dir.join(&self.bundle.abi_file)
    }
}

impl BundleConfig {
    /// Configured gas limit raised by `gas_buffer_pct` percent.
    pub fn buffered_gas_limit(&self) -> U256 {
        let pct = U256::from(self.gas_buffer_pct) + U256::from(100);
        U256::from(self.gas_limit).saturating_mul(pct) / U256::from(100)
    }
}

struct U256Visitor;

impl<'de> Visitor<'de> for U256Visitor {
    type Value = U256;

    fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("an unsigned integer or a decimal / 0x-hex string")
    }

    fn visit_u64<E: de::Error>(self, v: u64) -> std::result::Result<U256, E> {
        Ok(U256::from(v))
    }

    fn visit_i64<E: de::Error>(self, v: i64) -> std::result::Result<U256, E> {
        u64::try_from(v)
            .map(U256::from)
            .map_err(|_| E::custom(format!("negative amount {v}")))
    }

    fn visit_str<E: de::Error>(self, v: &str) -> std::result::Result<U256, E> {
        let v = v.trim();
        let parsed = match v.strip_prefix("0x") {
            Some(hex) => U256::from_str_radix(hex, 16).map_err(|e| e.to_string()),
            None => U256::from_dec_str(v).map_err(|e| e.to_string()),
        };
        parsed.map_err(|e| E::custom(format!("invalid amount {v:?}: {e}")))
    }
}

fn de_u256<'de, D: Deserializer<'de>>(d: D) -> std::result::Result<U256, D::Error> {
    d.deserialize_any(U256Visitor)
}

fn de_opt_u256<'de, D: Deserializer<'de>>(d: D) -> std::result::Result<Option<U256>, D::Error> {
    d.deserialize_any(U256Visitor).map(Some)
}
