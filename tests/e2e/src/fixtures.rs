//! Configuration, log builders and a running pipeline

use abi::SignatureTable;
use anyhow::{Context, Result};
use config::{AppConfig, Keys};
use ethers::signers::LocalWallet;
use ethers::types::Transaction;
use mev::SubmitMode;
use network::testing::{Feed, ScriptedChainClient};
use network::Shutdown;
use sniper::{pipeline, RouterStats, TriggerRouter};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use types::{Address, Bytes, LogEvent, PendingTxHandle, H256, U256};
use watcher::{
    DispatcherHandle, DispatcherStatsSnapshot, EventDispatcher, PendingHandle, PendingStats,
    PendingStatsSnapshot, PendingTxWatcher,
};

// anvil's first development key
pub const SIGNER_KEY: &str = "ac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80";
pub const WATCHED_CONTRACT: &str = "0x5fbdb2315678afecb367f032d93f642f64180aa3";

pub fn abi_dir() -> PathBuf {
    PathBuf::from(concat!(env!("CARGO_MANIFEST_DIR"), "/../../abis"))
}

/// Launchpad watcher with a `presale(1)` bundle, plus `extra` appended to
/// the `[bundle]` table.
pub fn app_config(relay_url: &str, extra: &str) -> Result<AppConfig> {
    let toml = format!(
        r#"
[chain]
ws_url = "ws://127.0.0.1:8546"
chain_id = 1

[watcher]
contract_address = "{WATCHED_CONTRACT}"
abi_file = "launchpad.json"
events = ["NewPoolContract", "PoolParametersSet"]
signatures = ["Transfer(address,address,uint256)"]

[watcher.restart]
max_restarts = 0

[relay]
url = "{relay_url}"
timeout_ms = 2000

[bundle]
contract_address = "0xe7f1725e7734ce288f8367e1bb143e90bb3f0512"
abi_file = "launchpad.json"
args = ["1"]
{extra}
"#
    );
    let mut cfg = AppConfig::from_toml_str(&toml)?;
    cfg.watcher.abi_dir = abi_dir();
    Ok(cfg)
}

/// [`app_config`] with the pending feed on, armed with `selector` if given.
pub fn pending_config(relay_url: &str, selector: Option<&str>) -> Result<AppConfig> {
    let mut cfg = app_config(relay_url, "")?;
    cfg.watcher.subscribe_pending = true;
    cfg.watcher.pending_selector = selector.map(str::to_string);
    Ok(cfg)
}

/// Still-pending call to `to` carrying `input`
pub fn pending_tx(hash: u8, to: Address, value: U256, input: Vec<u8>) -> Transaction {
    Transaction {
        hash: H256::repeat_byte(hash),
        from: Address::repeat_byte(0xf0),
        to: Some(to),
        value,
        gas: U256::from(90_000u64),
        gas_price: Some(U256::from(30_000_000_000u64)),
        input: Bytes::from(input),
        ..Default::default()
    }
}

/// Signature hash the table assigned to `name`
pub fn topic(table: &SignatureTable, name: &str) -> H256 {
    let position = table
        .names()
        .iter()
        .position(|n| *n == name)
        .unwrap_or_else(|| panic!("{name} is not in the signature table"));
    table.topics()[position]
}

pub fn pool_created_log(table: &SignatureTable, pool: Address, block: u64) -> LogEvent {
    LogEvent {
        address: watched(),
        topics: vec![topic(table, "NewPoolContract"), H256::from(pool)],
        data: Bytes::default(),
        block_number: block,
        tx_hash: H256::from_low_u64_be(block),
    }
}

pub fn transfer_log(table: &SignatureTable, value: u64, block: u64) -> LogEvent {
    let mut word = [0u8; 32];
    U256::from(value).to_big_endian(&mut word);
    LogEvent {
        address: watched(),
        topics: vec![
            topic(table, "Transfer"),
            H256::from(Address::repeat_byte(0x01)),
            H256::from(Address::repeat_byte(0x02)),
        ],
        data: Bytes::from(word.to_vec()),
        block_number: block,
        tx_hash: H256::from_low_u64_be(block),
    }
}

pub fn watched() -> Address {
    WATCHED_CONTRACT.parse().unwrap_or_default()
}

struct PendingSide {
    feed: Feed<PendingTxHandle>,
    handle: PendingHandle,
    stats: Arc<PendingStats>,
}

/// Dispatcher, optional pending watcher and router running against a
/// scripted chain
pub struct Pipeline {
    pub client: Arc<ScriptedChainClient>,
    pub table: Arc<SignatureTable>,
    pub feed: Feed<LogEvent>,
    pending: Option<PendingSide>,
    dispatcher: DispatcherHandle,
    router: JoinHandle<RouterStats>,
    _shutdown: Shutdown,
}

impl Pipeline {
    pub async fn start(cfg: &AppConfig, heights: &[u64], mode: SubmitMode) -> Result<Self> {
        let client = Arc::new(ScriptedChainClient::new(1).with_heights(heights.iter().copied()));
        let feed = client.log_feed();
        let table = Arc::new(pipeline::signature_table(cfg)?);

        let wallet: LocalWallet = SIGNER_KEY.parse().context("test key")?;
        let keys = Keys {
            signer: wallet.clone(),
            relay_identity: wallet,
        };
        let executor = pipeline::executor(cfg, client.clone(), keys, 1)?;

        let (event_tx, event_rx) = mpsc::channel(cfg.watcher.event_buffer);
        let dispatcher = EventDispatcher::new(client.clone(), table.clone(), cfg.watcher.event_buffer)
            .start(cfg.watcher.contract_address, &cfg.watcher.restart, event_tx);

        let (pending, pending_rx) = if cfg.watcher.subscribe_pending {
            let feed = client.pending_feed();
            let watcher = PendingTxWatcher::new(
                client.clone(),
                cfg.watcher.event_buffer,
                cfg.watcher.lookup_workers,
            )
            .with_trigger(pipeline::selector_trigger(cfg)?);
            let (tx, rx) = mpsc::channel(cfg.watcher.event_buffer);
            let side = PendingSide {
                feed,
                handle: watcher.start(&cfg.watcher.restart, tx),
                stats: watcher.stats(),
            };
            (Some(side), Some(rx))
        } else {
            (None, None)
        };

        let shutdown = Shutdown::new();
        let router = TriggerRouter::new(
            Some(Arc::new(executor)),
            mode,
            cfg.bundle.trigger_events.clone(),
        );
        let router = tokio::spawn(router.run(event_rx, pending_rx, shutdown.signal()));

        Ok(Self {
            client,
            table,
            feed,
            pending,
            dispatcher,
            router,
            _shutdown: shutdown,
        })
    }

    pub async fn push(&mut self, log: LogEvent) {
        assert!(self.feed.push(log).await, "dispatcher released the log feed");
    }

    /// Make `tx` resolvable as pending and announce its hash.
    pub async fn announce(&mut self, tx: Transaction) {
        let hash = tx.hash;
        self.client.set_pending_tx(tx);
        let side = self.pending.as_mut().expect("pipeline started without a pending feed");
        assert!(
            side.feed.push(PendingTxHandle(hash)).await,
            "pending watcher released the feed"
        );
    }

    /// Wait until `announced` hashes were resolved and every pending one
    /// was either dropped or handed to the router.
    pub async fn settle_pending(&self, announced: u64) -> PendingStatsSnapshot {
        let side = self.pending.as_ref().expect("pipeline started without a pending feed");
        tokio::time::timeout(Duration::from_secs(5), async {
            loop {
                let stats = side.stats.snapshot();
                let resolved = stats.still_pending + stats.not_pending + stats.lookup_errors;
                let handled = stats.inspect_only + stats.selector_mismatch + stats.forwarded;
                if resolved >= announced && handled >= stats.still_pending {
                    return stats;
                }
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .unwrap_or_else(|_| panic!("pending watcher did not resolve {announced} hashes"))
    }

    /// Wait until the dispatcher has finished with `received` logs: each one
    /// forwarded, counted unknown, or failed to decode.
    pub async fn settle(&self, received: u64) -> DispatcherStatsSnapshot {
        tokio::time::timeout(Duration::from_secs(5), async {
            loop {
                let stats = self.dispatcher.stats();
                let handled = stats.forwarded + stats.unknown + stats.decode_errors;
                if stats.received >= received && handled >= received {
                    return stats;
                }
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .unwrap_or_else(|_| panic!("dispatcher did not see {received} logs"))
    }

    /// Stop the log feed, let the router drain, and return its counters.
    pub async fn finish(self) -> Result<RouterStats> {
        if let Some(side) = self.pending {
            side.handle.stop().await?;
        }
        self.dispatcher.stop().await?;
        Ok(self.router.await?)
    }
}
