//! Signing key loading
//!
//! Keys arrive already decrypted through environment variables and are read
//! once at startup. The transaction signer and the relay identity are kept as
//! separate wallets even when a deployment points both at the same variable.

use anyhow::{Context, Result};
use ethers::signers::{LocalWallet, Signer};
use tracing::{info, warn};

use crate::KeysConfig;

/// The two wallets the pipeline needs
#[derive(Debug, Clone)]
pub struct Keys {
    /// Signs bundle transactions
    pub signer: LocalWallet,
    /// Signs relay requests (`X-Flashbots-Signature`)
    pub relay_identity: LocalWallet,
}

/// Read a hex private key (with or without `0x`) from `env_var`.
pub fn load_wallet(env_var: &str) -> Result<LocalWallet> {
    let raw = std::env::var(env_var)
        .with_context(|| format!("Environment variable {env_var} is not set"))?;
    raw.trim()
        .parse::<LocalWallet>()
        .with_context(|| format!("{env_var} does not hold a valid private key"))
}

pub fn load_keys(cfg: &KeysConfig) -> Result<Keys> {
    let signer = load_wallet(&cfg.signer_key_env)?;
    info!("🔑 Signer {:?} loaded from {}", signer.address(), cfg.signer_key_env);

    let relay_identity = match &cfg.relay_identity_key_env {
        Some(var) => {
            let wallet = load_wallet(var)?;
            info!("🔑 Relay identity {:?} loaded from {}", wallet.address(), var);
            wallet
        }
        None => {
            warn!("No relay identity key configured; reusing the signer key for relay authentication");
            signer.clone()
        }
    };

    Ok(Keys {
        signer,
        relay_identity,
    })
}
