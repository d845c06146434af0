use async_trait::async_trait;
use tokio::sync::broadcast;

use shared::domain::{Address, ChainId, TxHash, U256};

/// Lifecycle events emitted by a wallet provider, delivered in emission
/// order. `AccountsChanged` is the only event that carries the authorized
/// account set; `Connected`/`Disconnected` are informational.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProviderEvent {
    AccountsChanged(Vec<Address>),
    ChainChanged(ChainId),
    Connected { chain_id: ChainId },
    Disconnected { reason: String },
}

/// A browser-extension-style wallet: mediates user consent for account
/// access and transaction signing. Presence is detected at runtime;
/// absence degrades gracefully on the caller's side.
#[async_trait]
pub trait WalletProvider: Send + Sync {
    /// Whether a wallet is actually reachable. Callers must treat `false`
    /// as "feature disabled", not as an error.
    fn is_available(&self) -> bool;

    /// Request account authorization from the user. The returned sequence
    /// is ordered; the first entry is the active account.
    async fn request_accounts(&self) -> anyhow::Result<Vec<Address>>;

    fn subscribe_events(&self) -> broadcast::Receiver<ProviderEvent>;
}

/// Handle to a submitted mint transaction: the hash exists as soon as the
/// provider accepts the call, confirmation is observed asynchronously.
#[async_trait]
pub trait PendingMint: Send + Sync {
    fn tx_hash(&self) -> TxHash;

    /// Resolves once the transaction is accepted into the ledger; errors on
    /// revert or when the confirmation wait itself fails.
    async fn wait_confirmed(&self) -> anyhow::Result<()>;
}

/// The one state-changing entry point of the deployed contract:
/// `mint(quantity) payable`.
#[async_trait]
pub trait MintContract: Send + Sync {
    async fn mint(
        &self,
        quantity: u8,
        value: U256,
    ) -> anyhow::Result<std::sync::Arc<dyn PendingMint>>;
}
