use std::sync::{Arc, Weak};

use anyhow::anyhow;
use async_trait::async_trait;
use tokio::{
    sync::{broadcast, Mutex, RwLock},
    task::JoinHandle,
};
use tracing::{debug, error, info, warn};

use shared::{
    domain::{Address, ChainId, MintPolicy, TxHash, U256},
    error::WalletError,
    notify::{Notification, NoticeKind, MINT_NOTICE_SECS, WALLET_NOTICE_SECS},
};
use wallet_integration::{MintContract, PendingMint, ProviderEvent, WalletProvider};

const EVENT_CHANNEL_CAPACITY: usize = 64;

/// First six and last four characters of the 0x-prefixed address, joined by
/// an ellipsis. Display only; callers keep the full address internally.
pub fn short_address(address: &Address) -> String {
    let full = address.to_string();
    format!("{}...{}", &full[..6], &full[full.len() - 4..])
}

pub struct MissingWalletProvider;

#[async_trait]
impl WalletProvider for MissingWalletProvider {
    fn is_available(&self) -> bool {
        false
    }

    async fn request_accounts(&self) -> anyhow::Result<Vec<Address>> {
        Err(anyhow!("wallet provider is unavailable"))
    }

    fn subscribe_events(&self) -> broadcast::Receiver<ProviderEvent> {
        // Dead stream: the sender is dropped immediately, so listeners see
        // a closed channel and stop.
        let (_tx, rx) = broadcast::channel(1);
        rx
    }
}

pub struct MissingMintContract;

#[async_trait]
impl MintContract for MissingMintContract {
    async fn mint(&self, _quantity: u8, _value: U256) -> anyhow::Result<Arc<dyn PendingMint>> {
        Err(anyhow!("mint contract is unavailable"))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connected,
}

/// Wallet lifecycle notifications. `AccountsChanged` always carries the full
/// replacement set; `AccountSwitched`/`Disconnected` follow it and say which
/// way the connection state resolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    AccountsChanged { accounts: Vec<Address> },
    AccountSwitched { label: String },
    Disconnected,
    ProviderConnected { chain_id: ChainId },
    ProviderDisconnected { reason: String },
    /// The host surface must perform a full reload: a chain switch
    /// invalidates the configured contract/network pairing.
    ChainChanged { chain_id: ChainId },
}

/// Owns the set of authorized accounts. The provider event stream is the
/// only writer besides [`WalletSession::connect`]; dependents read, never
/// write.
pub struct WalletSession {
    provider: Arc<dyn WalletProvider>,
    accounts: RwLock<Vec<Address>>,
    events: broadcast::Sender<SessionEvent>,
    listener: std::sync::Mutex<Option<JoinHandle<()>>>,
}

impl WalletSession {
    /// Creates the session and subscribes to the provider's event stream.
    /// The subscription is released by [`WalletSession::shutdown`] or drop,
    /// whichever comes first.
    pub fn start(provider: Arc<dyn WalletProvider>) -> Arc<Self> {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        let session = Arc::new(Self {
            provider: Arc::clone(&provider),
            accounts: RwLock::new(Vec::new()),
            events,
            listener: std::sync::Mutex::new(None),
        });

        // Subscribe before the task is spawned: events emitted between
        // construction and the first poll of the listener must not be lost.
        let events = provider.subscribe_events();
        let task = Self::spawn_provider_listener(&session, events);
        if let Ok(mut guard) = session.listener.lock() {
            *guard = Some(task);
        }
        session
    }

    fn spawn_provider_listener(
        session: &Arc<Self>,
        mut events: broadcast::Receiver<ProviderEvent>,
    ) -> JoinHandle<()> {
        let weak: Weak<Self> = Arc::downgrade(session);
        tokio::spawn(async move {
            loop {
                match events.recv().await {
                    Ok(event) => {
                        let Some(session) = weak.upgrade() else { break };
                        session.handle_provider_event(event).await;
                    }
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        warn!(skipped, "wallet provider event stream lagged");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
            debug!("wallet provider listener stopped");
        })
    }

    /// Deregisters the provider listener. Idempotent.
    pub fn shutdown(&self) {
        if let Ok(mut guard) = self.listener.lock() {
            if let Some(task) = guard.take() {
                task.abort();
                debug!("wallet provider listener released");
            }
        }
    }

    pub fn is_available(&self) -> bool {
        self.provider.is_available()
    }

    pub async fn accounts(&self) -> Vec<Address> {
        self.accounts.read().await.clone()
    }

    pub async fn active_account(&self) -> Option<Address> {
        self.accounts.read().await.first().copied()
    }

    pub async fn connection_state(&self) -> ConnectionState {
        if self.accounts.read().await.is_empty() {
            ConnectionState::Disconnected
        } else {
            ConnectionState::Connected
        }
    }

    pub fn subscribe_events(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }

    /// Requests account authorization from the provider and replaces the
    /// account set on success. Both failure kinds leave the session in its
    /// pre-operation state.
    pub async fn connect(&self) -> Result<Vec<Address>, WalletError> {
        if !self.provider.is_available() {
            warn!("connect requested without a wallet provider");
            return Err(WalletError::ProviderMissing);
        }

        let accounts = self
            .provider
            .request_accounts()
            .await
            .map_err(|err| WalletError::ConnectionRejected(err.to_string()))?;

        self.replace_accounts(accounts.clone()).await;
        Ok(accounts)
    }

    async fn handle_provider_event(&self, event: ProviderEvent) {
        match event {
            ProviderEvent::AccountsChanged(accounts) => {
                self.replace_accounts(accounts).await;
            }
            ProviderEvent::ChainChanged(chain_id) => {
                info!(chain_id = chain_id.0, "chain changed, full reload required");
                self.emit(SessionEvent::ChainChanged { chain_id });
            }
            ProviderEvent::Connected { chain_id } => {
                info!(chain_id = chain_id.0, "wallet provider connected");
                self.emit(SessionEvent::ProviderConnected { chain_id });
            }
            ProviderEvent::Disconnected { reason } => {
                // Account mutation stays driven by accountsChanged alone;
                // this event only notifies.
                warn!(%reason, "wallet provider disconnected");
                self.emit(SessionEvent::ProviderDisconnected { reason });
            }
        }
    }

    async fn replace_accounts(&self, accounts: Vec<Address>) {
        {
            let mut guard = self.accounts.write().await;
            *guard = accounts.clone();
        }
        self.emit(SessionEvent::AccountsChanged {
            accounts: accounts.clone(),
        });

        match accounts.first() {
            None => {
                info!("wallet disconnected");
                self.emit(SessionEvent::Disconnected);
            }
            Some(first) => {
                let label = short_address(first);
                info!(account = %label, "wallet account active");
                self.emit(SessionEvent::AccountSwitched { label });
            }
        }
    }

    fn emit(&self, event: SessionEvent) {
        // Send fails only when nobody is subscribed, which is fine.
        let _ = self.events.send(event);
    }
}

impl Drop for WalletSession {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// User-facing notice accompanying a session event, if any. Timing and
/// rendering are the surface's concern; the kinds and durations are fixed
/// here.
pub fn session_notification(event: &SessionEvent) -> Option<Notification> {
    match event {
        SessionEvent::AccountsChanged { .. } => None,
        SessionEvent::AccountSwitched { label } => Some(
            Notification::timed(NoticeKind::Success, "Wallet account active", WALLET_NOTICE_SECS)
                .with_body(format!("Current account: {label}")),
        ),
        SessionEvent::Disconnected => Some(Notification::timed(
            NoticeKind::Warning,
            "Wallet disconnected",
            WALLET_NOTICE_SECS,
        )),
        SessionEvent::ProviderConnected { .. } => Some(Notification::timed(
            NoticeKind::Success,
            "Wallet connected",
            WALLET_NOTICE_SECS,
        )),
        SessionEvent::ProviderDisconnected { .. } => Some(Notification::timed(
            NoticeKind::Error,
            "Wallet disconnected",
            WALLET_NOTICE_SECS,
        )),
        SessionEvent::ChainChanged { .. } => Some(Notification::timed(
            NoticeKind::Info,
            "Network changed, reloading",
            WALLET_NOTICE_SECS,
        )),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MintStatus {
    Idle,
    Submitting,
    AwaitingConfirmation,
    Succeeded,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MintEvent {
    StatusChanged(MintStatus),
    QuantityChanged(u8),
    Submitted { tx_hash: TxHash, quantity: u8 },
    Succeeded { quantity: u8 },
    Failed { reason: String },
}

struct MintControllerState {
    quantity: u8,
    status: MintStatus,
}

/// Drives one mint transaction at a time. Quantity stays within the policy
/// bounds; submissions are serialized by the `status != Idle` guard, checked
/// under the state lock. Terminal states are transient: the reset to `Idle`
/// follows the outcome notification immediately.
pub struct MintController {
    session: Arc<WalletSession>,
    contract: Arc<dyn MintContract>,
    policy: MintPolicy,
    inner: Mutex<MintControllerState>,
    events: broadcast::Sender<MintEvent>,
}

impl MintController {
    pub fn new(
        session: Arc<WalletSession>,
        contract: Arc<dyn MintContract>,
        policy: MintPolicy,
    ) -> Arc<Self> {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        let quantity = policy.min_quantity;
        Arc::new(Self {
            session,
            contract,
            policy,
            inner: Mutex::new(MintControllerState {
                quantity,
                status: MintStatus::Idle,
            }),
            events,
        })
    }

    pub fn policy(&self) -> &MintPolicy {
        &self.policy
    }

    pub async fn quantity(&self) -> u8 {
        self.inner.lock().await.quantity
    }

    pub async fn status(&self) -> MintStatus {
        self.inner.lock().await.status
    }

    pub fn subscribe_events(&self) -> broadcast::Receiver<MintEvent> {
        self.events.subscribe()
    }

    /// No-op at the upper bound.
    pub async fn increment(&self) {
        let mut guard = self.inner.lock().await;
        let next = guard.quantity.saturating_add(1);
        if self.policy.contains(next) {
            guard.quantity = next;
            self.emit(MintEvent::QuantityChanged(next));
        }
    }

    /// No-op at the lower bound.
    pub async fn decrement(&self) {
        let mut guard = self.inner.lock().await;
        let next = guard.quantity.saturating_sub(1);
        if self.policy.contains(next) {
            guard.quantity = next;
            self.emit(MintEvent::QuantityChanged(next));
        }
    }

    pub async fn set_quantity(&self, quantity: u8) {
        let clamped = self.policy.clamp(quantity);
        let mut guard = self.inner.lock().await;
        if guard.quantity != clamped {
            guard.quantity = clamped;
            self.emit(MintEvent::QuantityChanged(clamped));
        }
    }

    /// Submits one mint transaction. A missing provider or an in-flight
    /// attempt makes this a no-op; the triggering control is expected to be
    /// disabled in those states already. All failures are recovered here:
    /// the status always returns to `Idle`.
    pub async fn submit_mint(&self) {
        let (quantity, value) = {
            let mut guard = self.inner.lock().await;
            if !self.session.is_available() {
                debug!("mint requested without a wallet provider, ignoring");
                return;
            }
            if guard.status != MintStatus::Idle {
                debug!(status = ?guard.status, "mint already in flight, ignoring");
                return;
            }
            guard.status = MintStatus::Submitting;
            (guard.quantity, self.policy.payment_for(guard.quantity))
        };
        self.emit(MintEvent::StatusChanged(MintStatus::Submitting));
        info!(quantity, value = %value, "submitting mint transaction");

        let pending = match self.contract.mint(quantity, value).await {
            Ok(pending) => pending,
            Err(err) => {
                error!(error = %err, "mint submission rejected");
                self.fail(err.to_string()).await;
                return;
            }
        };

        let tx_hash = pending.tx_hash();
        self.transition(MintStatus::AwaitingConfirmation).await;
        self.emit(MintEvent::Submitted { tx_hash, quantity });
        info!(%tx_hash, "mint transaction accepted, awaiting confirmation");

        // Committed: no cancellation once a transaction hash exists.
        match pending.wait_confirmed().await {
            Ok(()) => {
                self.transition(MintStatus::Succeeded).await;
                self.emit(MintEvent::Succeeded { quantity });
                info!(quantity, %tx_hash, "mint confirmed");
                self.transition(MintStatus::Idle).await;
            }
            Err(err) => {
                error!(error = %err, %tx_hash, "mint confirmation failed");
                self.fail(err.to_string()).await;
            }
        }
    }

    async fn fail(&self, reason: String) {
        self.transition(MintStatus::Failed).await;
        self.emit(MintEvent::Failed { reason });
        self.transition(MintStatus::Idle).await;
    }

    async fn transition(&self, status: MintStatus) {
        {
            let mut guard = self.inner.lock().await;
            guard.status = status;
        }
        self.emit(MintEvent::StatusChanged(status));
    }

    fn emit(&self, event: MintEvent) {
        let _ = self.events.send(event);
    }
}

/// User-facing notice accompanying a mint event, if any. The submitted
/// notice is indefinite until replaced by the outcome notice.
pub fn mint_notification(event: &MintEvent) -> Option<Notification> {
    match event {
        MintEvent::StatusChanged(_) | MintEvent::QuantityChanged(_) => None,
        MintEvent::Submitted { .. } => Some(
            Notification::indefinite(NoticeKind::Info, "Transaction submitted")
                .with_body("Please wait for confirmation..."),
        ),
        MintEvent::Succeeded { quantity } => Some(
            Notification::timed(NoticeKind::Success, "Mint successful!", MINT_NOTICE_SECS)
                .with_body(format!(
                    "Successfully minted {quantity} NFT{}",
                    if *quantity > 1 { "s" } else { "" }
                )),
        ),
        MintEvent::Failed { .. } => Some(Notification::timed(
            NoticeKind::Error,
            "Mint failed",
            MINT_NOTICE_SECS,
        )),
    }
}

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;
