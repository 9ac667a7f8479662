//! Component assembly from configuration

use abi::{load_abi, CallEncoder, SignatureTable};
use anyhow::{bail, Context, Result};
use config::{AppConfig, ChainConfig, Keys};
use mev::{BundleBuilder, BundleExecutor, BundleTemplate, RelaySubmitter, TxSigner};
use network::{ChainClient, EthersClient};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};
use watcher::SelectorTrigger;

/// Open the WebSocket connection and check the chain id.
pub async fn connect(chain: &ChainConfig) -> Result<(Arc<dyn ChainClient>, u64)> {
    info!("🔌 Connecting to {}", chain.ws_url);
    let client = EthersClient::connect(&chain.ws_url, Duration::from_millis(chain.rpc_timeout_ms))
        .await
        .with_context(|| format!("Failed to connect to {}", chain.ws_url))?;
    let client: Arc<dyn ChainClient> = Arc::new(client);

    let chain_id = verify_chain_id(client.as_ref(), chain.chain_id).await?;
    info!(chain_id, "✅ Connected");
    Ok((client, chain_id))
}

/// The node's chain id, refusing to continue when it differs from `expected`.
pub async fn verify_chain_id(client: &dyn ChainClient, expected: Option<u64>) -> Result<u64> {
    let actual = client.chain_id().await.context("Failed to read chain id")?;
    match expected {
        Some(expected) if expected != actual => {
            bail!("Node reports chain id {actual}, configuration expects {expected}")
        }
        Some(_) => Ok(actual),
        None => {
            warn!(chain_id = actual, "⚠️ chain.chain_id not set, trusting the node");
            Ok(actual)
        }
    }
}

/// Watched events from the ABI file plus any text signatures.
pub fn signature_table(cfg: &AppConfig) -> Result<SignatureTable> {
    let table = match &cfg.watcher.abi_file {
        Some(file) => {
            let contract = load_abi(&cfg.watcher.abi_dir, file)?;
            SignatureTable::from_contract(&contract, &cfg.watcher.events)?
        }
        None => SignatureTable::default(),
    };
    let table = table.with_text_signatures(&cfg.watcher.signatures)?;
    if table.is_empty() {
        bail!("No events to watch: the watcher ABI and signatures are both empty");
    }
    info!(events = ?table.names(), "📋 Watching {} event signature(s)", table.len());
    Ok(table)
}

/// Pending-call trigger for `watcher.pending_selector`, if configured.
///
/// The function is looked up in the watcher ABI first, then in the bundle ABI.
pub fn selector_trigger(cfg: &AppConfig) -> Result<Option<SelectorTrigger>> {
    let Some(function) = &cfg.watcher.pending_selector else {
        return Ok(None);
    };

    let mut files: Vec<&str> = cfg.watcher.abi_file.iter().map(String::as_str).collect();
    files.push(&cfg.bundle.abi_file);

    for file in files {
        let contract = load_abi(&cfg.watcher.abi_dir, file)?;
        if let Ok(encoder) = CallEncoder::from_contract(&contract, function) {
            let selector = encoder.selector();
            info!(
                function = %function,
                selector = %format!("0x{}", hex::encode(selector)),
                "🎯 Pending-call trigger armed"
            );
            return Ok(Some(SelectorTrigger {
                contract: cfg.watcher.contract_address,
                selector,
                function: function.clone(),
            }));
        }
    }
    bail!("watcher.pending_selector {function:?} is not a function in the configured ABIs")
}

pub fn bundle_template(cfg: &AppConfig) -> Result<BundleTemplate> {
    let contract = load_abi(&cfg.watcher.abi_dir, &cfg.bundle.abi_file)?;
    let encoder = CallEncoder::from_contract(&contract, &cfg.bundle.function)?;
    let template = BundleTemplate::from_config(&cfg.bundle, &encoder)
        .with_context(|| format!("Failed to encode {}({:?})", cfg.bundle.function, cfg.bundle.args))?;
    info!(
        to = ?template.to,
        function = %cfg.bundle.function,
        txs = template.tx_count,
        gas_limit = %template.gas_limit,
        tx_type = ?template.tx_type,
        "📦 Bundle template ready"
    );
    Ok(template)
}

/// Builder, signer and relay client for one signing key.
pub fn executor(
    cfg: &AppConfig,
    client: Arc<dyn ChainClient>,
    keys: Keys,
    chain_id: u64,
) -> Result<BundleExecutor> {
    let template = bundle_template(cfg)?;
    let relay = RelaySubmitter::from_config(&cfg.relay, keys.relay_identity)
        .context("Failed to create relay client")?;
    info!(relay = %relay.url(), "🌐 Relay configured");

    let builder = BundleBuilder::new(client, TxSigner::new(keys.signer, chain_id), template);
    Ok(BundleExecutor::new(builder, Arc::new(relay)))
}
