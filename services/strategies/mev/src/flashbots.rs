//! Flashbots-style private relay client
//!
//! `eth_sendBundle` and `eth_callBundle` over authenticated JSON-RPC. The
//! request body is signed by the relay identity key and sent as
//! `X-Flashbots-Signature: <address>:<signature>`.

use async_trait::async_trait;
use ethers::signers::{LocalWallet, Signer};
use ethers::utils::keccak256;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::time::Duration;
use tracing::{debug, warn};
use types::{SignedBundle, H256};

use crate::error::RelayError;

pub const SIGNATURE_HEADER: &str = "X-Flashbots-Signature";

/// Relay operations used by the executor
#[async_trait]
pub trait BundleRelay: Send + Sync {
    /// Submit for inclusion at the bundle's target block.
    async fn send_bundle(&self, bundle: &SignedBundle) -> Result<H256, RelayError>;

    /// Simulate against `state_block` without broadcasting.
    async fn call_bundle(&self, bundle: &SignedBundle) -> Result<SimulationResult, RelayError>;
}

/// `eth_callBundle` result
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SimulationResult {
    pub bundle_hash: Option<H256>,
    pub bundle_gas_price: Option<String>,
    pub coinbase_diff: Option<String>,
    pub total_gas_used: Option<u64>,
    pub state_block_number: Option<u64>,
    pub results: Vec<Value>,
}

impl SimulationResult {
    /// First per-transaction error or revert reported by the simulation
    pub fn first_failure(&self) -> Option<String> {
        self.results.iter().find_map(|r| {
            r.get("error")
                .or_else(|| r.get("revert"))
                .and_then(Value::as_str)
                .map(str::to_string)
        })
    }
}

#[derive(Debug, Deserialize)]
struct RpcResponse {
    result: Option<Value>,
    error: Option<RpcErrorBody>,
}

#[derive(Debug, Deserialize)]
struct RpcErrorBody {
    #[serde(default)]
    code: i64,
    #[serde(default)]
    message: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SendBundleResult {
    bundle_hash: H256,
}

pub struct RelaySubmitter {
    http: reqwest::Client,
    url: String,
    identity: LocalWallet,
    timeout: Duration,
    state_block: String,
}

impl RelaySubmitter {
    pub fn new(
        url: impl Into<String>,
        identity: LocalWallet,
        timeout: Duration,
        state_block: impl Into<String>,
    ) -> Result<Self, RelayError> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .tcp_nodelay(true)
            .build()
            .map_err(|e| RelayError::Transport {
                message: e.to_string(),
            })?;
        Ok(Self {
            http,
            url: url.into(),
            identity,
            timeout,
            state_block: state_block.into(),
        })
    }

    pub fn from_config(cfg: &config::RelayConfig, identity: LocalWallet) -> Result<Self, RelayError> {
        Self::new(
            cfg.url.clone(),
            identity,
            Duration::from_millis(cfg.timeout_ms),
            cfg.state_block.clone(),
        )
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn send_params(bundle: &SignedBundle) -> Value {
        json!([{
            "txs": bundle.raw_transactions(),
            "blockNumber": bundle.target_block_hex(),
        }])
    }

    pub fn call_params(bundle: &SignedBundle, state_block: &str) -> Value {
        json!([{
            "txs": bundle.raw_transactions(),
            "blockNumber": bundle.target_block_hex(),
            "stateBlockNumber": state_block,
        }])
    }

    /// `<address>:0x<signature>` over the hex-encoded keccak of `body`.
    pub async fn signature_header(&self, body: &str) -> Result<String, RelayError> {
        let digest = format!("0x{}", hex::encode(keccak256(body.as_bytes())));
        let signature = self
            .identity
            .sign_message(digest)
            .await
            .map_err(|e| RelayError::Authentication {
                message: e.to_string(),
            })?;
        Ok(format!("{:?}:0x{}", self.identity.address(), signature))
    }

    async fn request(&self, method: &'static str, params: Value) -> Result<Value, RelayError> {
        let body = json!({
            "jsonrpc": "2.0",
            "id": 1,
            "method": method,
            "params": params,
        })
        .to_string();
        let header = self.signature_header(&body).await?;

        debug!(method, url = %self.url, "Posting to relay");
        let response = self
            .http
            .post(&self.url)
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .header(SIGNATURE_HEADER, header)
            .body(body)
            .send()
            .await
            .map_err(|e| self.transport_error(e))?;

        let status = response.status();
        let text = response.text().await.map_err(|e| self.transport_error(e))?;

        // relays answer rejections with JSON-RPC errors, sometimes on 4xx
        match serde_json::from_str::<RpcResponse>(&text) {
            Ok(RpcResponse {
                error: Some(err), ..
            }) => Err(RelayError::Rejected {
                code: err.code,
                message: err.message,
            }),
            Ok(RpcResponse {
                result: Some(result),
                ..
            }) if status.is_success() => Ok(result),
            _ if !status.is_success() => {
                warn!(method, %status, "⚠️ Relay returned HTTP error");
                Err(RelayError::Transport {
                    message: format!("HTTP {status}"),
                })
            }
            _ => Err(RelayError::InvalidResponse {
                message: format!("{method}: no result in {}", truncate(&text)),
            }),
        }
    }

    fn transport_error(&self, e: reqwest::Error) -> RelayError {
        if e.is_timeout() {
            RelayError::Timeout {
                timeout_ms: self.timeout.as_millis() as u64,
            }
        } else {
            RelayError::Transport {
                message: e.to_string(),
            }
        }
    }
}

#[async_trait]
impl BundleRelay for RelaySubmitter {
    async fn send_bundle(&self, bundle: &SignedBundle) -> Result<H256, RelayError> {
        let result = self
            .request("eth_sendBundle", Self::send_params(bundle))
            .await?;
        serde_json::from_value::<SendBundleResult>(result)
            .map(|r| r.bundle_hash)
            .map_err(|e| RelayError::InvalidResponse {
                message: e.to_string(),
            })
    }

    async fn call_bundle(&self, bundle: &SignedBundle) -> Result<SimulationResult, RelayError> {
        let result = self
            .request(
                "eth_callBundle",
                Self::call_params(bundle, &self.state_block),
            )
            .await?;
        serde_json::from_value(result).map_err(|e| RelayError::InvalidResponse {
            message: e.to_string(),
        })
    }
}

fn truncate(text: &str) -> &str {
    match text.char_indices().nth(200) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}
