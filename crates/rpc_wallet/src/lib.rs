use std::sync::{
    atomic::{AtomicU64, Ordering},
    Arc,
};
use std::time::Duration;

use alloy_primitives::{keccak256, Bytes};
use anyhow::{anyhow, bail};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use thiserror::Error;
use tokio::{sync::broadcast, task::JoinHandle};
use tracing::{debug, warn};

use shared::domain::{Address, ChainId, TxHash, U256};
use wallet_integration::{MintContract, PendingMint, ProviderEvent, WalletProvider};

pub mod config;

const RECEIPT_POLL_INTERVAL: Duration = Duration::from_millis(500);
/// Two minutes at the poll interval.
const RECEIPT_POLL_ATTEMPTS: usize = 240;
const WATCHER_POLL_INTERVAL: Duration = Duration::from_secs(2);
const EVENT_CHANNEL_CAPACITY: usize = 64;

#[derive(Debug, Error)]
pub enum RpcError {
    #[error("transport failure calling {method}: {source}")]
    Transport {
        method: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("node rejected {method}: {message} (code {code})")]
    Node {
        method: String,
        code: i64,
        message: String,
    },
    #[error("malformed response from {method}: {detail}")]
    Malformed { method: String, detail: String },
}

#[derive(Debug, Serialize)]
struct RpcRequest<'a> {
    jsonrpc: &'static str,
    id: u64,
    method: &'a str,
    params: Value,
}

#[derive(Debug, Deserialize)]
struct RpcResponse {
    #[serde(default)]
    result: Option<Value>,
    #[serde(default)]
    error: Option<RpcErrorObject>,
}

#[derive(Debug, Deserialize)]
struct RpcErrorObject {
    code: i64,
    message: String,
}

/// An `eth_sendTransaction`-style request. The node signs with its own
/// unlocked key, which is what development nodes (Hardhat, Anvil) do in
/// place of a consenting wallet.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionRequest {
    pub from: Address,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub to: Option<Address>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<U256>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Bytes>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionReceipt {
    pub transaction_hash: TxHash,
    #[serde(default)]
    pub contract_address: Option<Address>,
    #[serde(default)]
    pub status: Option<String>,
}

impl TransactionReceipt {
    pub fn succeeded(&self) -> bool {
        matches!(self.status.as_deref(), Some("0x1"))
    }
}

/// Minimal JSON-RPC client over HTTP. Cheap to clone; the request ids are
/// shared across clones.
#[derive(Clone)]
pub struct RpcClient {
    http: Client,
    url: String,
    next_id: Arc<AtomicU64>,
}

impl RpcClient {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            http: Client::new(),
            url: url.into(),
            next_id: Arc::new(AtomicU64::new(1)),
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    async fn call(&self, method: &str, params: Value) -> Result<Value, RpcError> {
        let request = RpcRequest {
            jsonrpc: "2.0",
            id: self.next_id.fetch_add(1, Ordering::Relaxed),
            method,
            params,
        };

        let response = self
            .http
            .post(&self.url)
            .json(&request)
            .send()
            .await
            .and_then(|res| res.error_for_status())
            .map_err(|source| RpcError::Transport {
                method: method.to_string(),
                source,
            })?;

        let body: RpcResponse =
            response
                .json()
                .await
                .map_err(|source| RpcError::Transport {
                    method: method.to_string(),
                    source,
                })?;

        if let Some(err) = body.error {
            return Err(RpcError::Node {
                method: method.to_string(),
                code: err.code,
                message: err.message,
            });
        }
        body.result.ok_or_else(|| RpcError::Malformed {
            method: method.to_string(),
            detail: "missing result".into(),
        })
    }

    pub async fn chain_id(&self) -> Result<ChainId, RpcError> {
        let result = self.call("eth_chainId", json!([])).await?;
        parse_quantity(&result, "eth_chainId").map(ChainId)
    }

    pub async fn accounts(&self) -> Result<Vec<Address>, RpcError> {
        let result = self.call("eth_accounts", json!([])).await?;
        serde_json::from_value(result).map_err(|err| RpcError::Malformed {
            method: "eth_accounts".into(),
            detail: err.to_string(),
        })
    }

    pub async fn send_transaction(&self, tx: &TransactionRequest) -> Result<TxHash, RpcError> {
        let result = self.call("eth_sendTransaction", json!([tx])).await?;
        serde_json::from_value(result).map_err(|err| RpcError::Malformed {
            method: "eth_sendTransaction".into(),
            detail: err.to_string(),
        })
    }

    pub async fn transaction_receipt(
        &self,
        tx_hash: TxHash,
    ) -> Result<Option<TransactionReceipt>, RpcError> {
        let result = self
            .call("eth_getTransactionReceipt", json!([tx_hash]))
            .await?;
        if result.is_null() {
            return Ok(None);
        }
        serde_json::from_value(result)
            .map(Some)
            .map_err(|err| RpcError::Malformed {
                method: "eth_getTransactionReceipt".into(),
                detail: err.to_string(),
            })
    }
}

fn parse_quantity(value: &Value, method: &str) -> Result<u64, RpcError> {
    let text = value.as_str().ok_or_else(|| RpcError::Malformed {
        method: method.to_string(),
        detail: format!("expected quantity string, got {value}"),
    })?;
    let digits = text.strip_prefix("0x").unwrap_or(text);
    u64::from_str_radix(digits, 16).map_err(|err| RpcError::Malformed {
        method: method.to_string(),
        detail: format!("bad quantity {text}: {err}"),
    })
}

/// `mint(uint256)` selector plus the quantity as one left-padded word.
pub fn mint_calldata(quantity: u8) -> Bytes {
    let selector = &keccak256("mint(uint256)".as_bytes())[..4];
    let mut data = Vec::with_capacity(36);
    data.extend_from_slice(selector);
    data.extend_from_slice(&U256::from(quantity).to_be_bytes::<32>());
    Bytes::from(data)
}

/// Polls for the receipt until the transaction is mined. A receipt with
/// status 0x0 is a revert and fails the wait.
pub async fn wait_for_receipt(rpc: &RpcClient, tx_hash: TxHash) -> anyhow::Result<TransactionReceipt> {
    for _ in 0..RECEIPT_POLL_ATTEMPTS {
        if let Some(receipt) = rpc.transaction_receipt(tx_hash).await? {
            if receipt.succeeded() {
                return Ok(receipt);
            }
            bail!("transaction {tx_hash} reverted");
        }
        tokio::time::sleep(RECEIPT_POLL_INTERVAL).await;
    }
    bail!("timed out waiting for receipt of {tx_hash}")
}

/// Wallet provider backed by a development node. The node has no push
/// channel for wallet events, so a polling watcher synthesizes them from
/// `eth_chainId`/`eth_accounts` snapshots.
pub struct RpcWalletProvider {
    rpc: RpcClient,
    events: broadcast::Sender<ProviderEvent>,
    watcher: std::sync::Mutex<Option<JoinHandle<()>>>,
}

impl RpcWalletProvider {
    pub fn new(rpc: RpcClient) -> Arc<Self> {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Arc::new(Self {
            rpc,
            events,
            watcher: std::sync::Mutex::new(None),
        })
    }

    /// Starts the event watcher. The first healthy poll emits `Connected`
    /// and sets the baseline; only later differences become events, so a
    /// page that has not connected yet is not force-connected by the
    /// watcher.
    pub fn start_watcher(self: &Arc<Self>) {
        let rpc = self.rpc.clone();
        let events = self.events.clone();
        let task = tokio::spawn(async move {
            let mut last_chain: Option<ChainId> = None;
            let mut last_accounts: Option<Vec<Address>> = None;
            let mut healthy = false;
            loop {
                tokio::time::sleep(WATCHER_POLL_INTERVAL).await;

                let chain = match rpc.chain_id().await {
                    Ok(chain) => chain,
                    Err(err) => {
                        if healthy {
                            warn!(error = %err, "wallet node unreachable");
                            let _ = events.send(ProviderEvent::Disconnected {
                                reason: err.to_string(),
                            });
                            healthy = false;
                        }
                        continue;
                    }
                };
                let accounts = match rpc.accounts().await {
                    Ok(accounts) => accounts,
                    Err(err) => {
                        if healthy {
                            warn!(error = %err, "wallet node unreachable");
                            let _ = events.send(ProviderEvent::Disconnected {
                                reason: err.to_string(),
                            });
                            healthy = false;
                        }
                        continue;
                    }
                };

                if !healthy {
                    healthy = true;
                    let _ = events.send(ProviderEvent::Connected { chain_id: chain });
                }
                if let Some(prev) = last_chain {
                    if prev != chain {
                        debug!(chain_id = chain.0, "chain id changed");
                        let _ = events.send(ProviderEvent::ChainChanged(chain));
                    }
                }
                if let Some(prev) = &last_accounts {
                    if prev != &accounts {
                        let _ = events.send(ProviderEvent::AccountsChanged(accounts.clone()));
                    }
                }
                last_chain = Some(chain);
                last_accounts = Some(accounts);
            }
        });

        if let Ok(mut guard) = self.watcher.lock() {
            if let Some(previous) = guard.replace(task) {
                previous.abort();
            }
        }
    }

    pub fn stop_watcher(&self) {
        if let Ok(mut guard) = self.watcher.lock() {
            if let Some(task) = guard.take() {
                task.abort();
            }
        }
    }
}

impl Drop for RpcWalletProvider {
    fn drop(&mut self) {
        self.stop_watcher();
    }
}

#[async_trait]
impl WalletProvider for RpcWalletProvider {
    fn is_available(&self) -> bool {
        true
    }

    async fn request_accounts(&self) -> anyhow::Result<Vec<Address>> {
        // Dev nodes keep their accounts unlocked; listing them stands in
        // for the consent flow of a real wallet.
        Ok(self.rpc.accounts().await?)
    }

    fn subscribe_events(&self) -> broadcast::Receiver<ProviderEvent> {
        self.events.subscribe()
    }
}

/// The deployed fixed-price contract, addressed over JSON-RPC.
pub struct RpcMintContract {
    rpc: RpcClient,
    contract: Address,
    from: Option<Address>,
}

impl RpcMintContract {
    pub fn new(rpc: RpcClient, contract: Address, from: Option<Address>) -> Self {
        Self {
            rpc,
            contract,
            from,
        }
    }

    async fn sender(&self) -> anyhow::Result<Address> {
        if let Some(from) = self.from {
            return Ok(from);
        }
        self.rpc
            .accounts()
            .await?
            .first()
            .copied()
            .ok_or_else(|| anyhow!("node has no unlocked account to send from"))
    }
}

#[async_trait]
impl MintContract for RpcMintContract {
    async fn mint(&self, quantity: u8, value: U256) -> anyhow::Result<Arc<dyn PendingMint>> {
        let from = self.sender().await?;
        let tx = TransactionRequest {
            from,
            to: Some(self.contract),
            value: Some(value),
            data: Some(mint_calldata(quantity)),
        };
        let tx_hash = self.rpc.send_transaction(&tx).await?;
        debug!(%tx_hash, quantity, %value, "mint transaction sent");
        Ok(Arc::new(RpcPendingMint {
            rpc: self.rpc.clone(),
            tx_hash,
        }))
    }
}

pub struct RpcPendingMint {
    rpc: RpcClient,
    tx_hash: TxHash,
}

#[async_trait]
impl PendingMint for RpcPendingMint {
    fn tx_hash(&self) -> TxHash {
        self.tx_hash
    }

    async fn wait_confirmed(&self) -> anyhow::Result<()> {
        wait_for_receipt(&self.rpc, self.tx_hash).await.map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mint_calldata_is_selector_plus_padded_quantity() {
        let data = mint_calldata(3);
        assert_eq!(data.len(), 36);
        // keccak256("mint(uint256)")[..4]
        assert_eq!(&data[..4], &[0xa0, 0x71, 0x2d, 0x68]);
        assert!(data[4..35].iter().all(|b| *b == 0));
        assert_eq!(data[35], 3);
    }

    #[test]
    fn transaction_request_serializes_as_hex_quantities() {
        let tx = TransactionRequest {
            from: Address::repeat_byte(0x11),
            to: Some(Address::repeat_byte(0x22)),
            value: Some(U256::from(0x2au64)),
            data: None,
        };
        let value = serde_json::to_value(&tx).expect("serialize");
        assert_eq!(
            value["from"],
            "0x1111111111111111111111111111111111111111"
        );
        assert_eq!(value["to"], "0x2222222222222222222222222222222222222222");
        assert_eq!(value["value"], "0x2a");
        assert!(value.get("data").is_none());
    }

    #[test]
    fn parse_quantity_reads_hex_strings() {
        assert_eq!(
            parse_quantity(&json!("0x539"), "eth_chainId").expect("parse"),
            1337
        );
        assert!(parse_quantity(&json!(42), "eth_chainId").is_err());
        assert!(parse_quantity(&json!("0xzz"), "eth_chainId").is_err());
    }

    #[test]
    fn receipt_status_distinguishes_revert() {
        let mined: TransactionReceipt = serde_json::from_value(json!({
            "transactionHash": "0x1111111111111111111111111111111111111111111111111111111111111111",
            "status": "0x1"
        }))
        .expect("receipt");
        assert!(mined.succeeded());
        assert!(mined.contract_address.is_none());

        let reverted: TransactionReceipt = serde_json::from_value(json!({
            "transactionHash": "0x1111111111111111111111111111111111111111111111111111111111111111",
            "status": "0x0"
        }))
        .expect("receipt");
        assert!(!reverted.succeeded());
    }
}
