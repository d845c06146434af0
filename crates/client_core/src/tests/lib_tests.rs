use std::time::Duration;

use super::*;
use tokio::sync::Notify;

fn addr(byte: u8) -> Address {
    Address::repeat_byte(byte)
}

struct ScriptedProvider {
    available: bool,
    accounts: Vec<Address>,
    fail_with: Option<String>,
    events: broadcast::Sender<ProviderEvent>,
    request_calls: Arc<Mutex<u32>>,
}

impl ScriptedProvider {
    fn ok(accounts: Vec<Address>) -> Self {
        let (events, _) = broadcast::channel(16);
        Self {
            available: true,
            accounts,
            fail_with: None,
            events,
            request_calls: Arc::new(Mutex::new(0)),
        }
    }

    fn failing(err: impl Into<String>) -> Self {
        let mut provider = Self::ok(Vec::new());
        provider.fail_with = Some(err.into());
        provider
    }

    fn emit(&self, event: ProviderEvent) {
        let _ = self.events.send(event);
    }
}

#[async_trait]
impl WalletProvider for ScriptedProvider {
    fn is_available(&self) -> bool {
        self.available
    }

    async fn request_accounts(&self) -> anyhow::Result<Vec<Address>> {
        let mut calls = self.request_calls.lock().await;
        *calls += 1;
        if let Some(err) = &self.fail_with {
            return Err(anyhow!(err.clone()));
        }
        Ok(self.accounts.clone())
    }

    fn subscribe_events(&self) -> broadcast::Receiver<ProviderEvent> {
        self.events.subscribe()
    }
}

struct ScriptedContract {
    submit_fail: Option<String>,
    confirm_fail: Option<String>,
    confirm_gate: Option<Arc<Notify>>,
    tx_hash: TxHash,
    mint_calls: Arc<Mutex<Vec<(u8, U256)>>>,
    confirm_calls: Arc<Mutex<u32>>,
}

impl ScriptedContract {
    fn ok() -> Self {
        Self {
            submit_fail: None,
            confirm_fail: None,
            confirm_gate: None,
            tx_hash: TxHash::repeat_byte(0xab),
            mint_calls: Arc::new(Mutex::new(Vec::new())),
            confirm_calls: Arc::new(Mutex::new(0)),
        }
    }

    fn failing_submit(err: impl Into<String>) -> Self {
        let mut contract = Self::ok();
        contract.submit_fail = Some(err.into());
        contract
    }

    fn failing_confirm(err: impl Into<String>) -> Self {
        let mut contract = Self::ok();
        contract.confirm_fail = Some(err.into());
        contract
    }

    fn gated(gate: Arc<Notify>) -> Self {
        let mut contract = Self::ok();
        contract.confirm_gate = Some(gate);
        contract
    }
}

#[async_trait]
impl MintContract for ScriptedContract {
    async fn mint(&self, quantity: u8, value: U256) -> anyhow::Result<Arc<dyn PendingMint>> {
        let mut calls = self.mint_calls.lock().await;
        calls.push((quantity, value));
        if let Some(err) = &self.submit_fail {
            return Err(anyhow!(err.clone()));
        }
        Ok(Arc::new(ScriptedPending {
            tx_hash: self.tx_hash,
            confirm_fail: self.confirm_fail.clone(),
            confirm_gate: self.confirm_gate.clone(),
            confirm_calls: Arc::clone(&self.confirm_calls),
        }))
    }
}

struct ScriptedPending {
    tx_hash: TxHash,
    confirm_fail: Option<String>,
    confirm_gate: Option<Arc<Notify>>,
    confirm_calls: Arc<Mutex<u32>>,
}

#[async_trait]
impl PendingMint for ScriptedPending {
    fn tx_hash(&self) -> TxHash {
        self.tx_hash
    }

    async fn wait_confirmed(&self) -> anyhow::Result<()> {
        {
            let mut calls = self.confirm_calls.lock().await;
            *calls += 1;
        }
        if let Some(gate) = &self.confirm_gate {
            gate.notified().await;
        }
        if let Some(err) = &self.confirm_fail {
            return Err(anyhow!(err.clone()));
        }
        Ok(())
    }
}

async fn next_session_event(rx: &mut broadcast::Receiver<SessionEvent>) -> SessionEvent {
    tokio::time::timeout(Duration::from_secs(1), rx.recv())
        .await
        .expect("timed out waiting for session event")
        .expect("session event stream closed")
}

fn drain_statuses(rx: &mut broadcast::Receiver<MintEvent>) -> Vec<MintStatus> {
    let mut statuses = Vec::new();
    while let Ok(event) = rx.try_recv() {
        if let MintEvent::StatusChanged(status) = event {
            statuses.push(status);
        }
    }
    statuses
}

fn controller_with(
    provider: Arc<dyn WalletProvider>,
    contract: Arc<ScriptedContract>,
) -> (Arc<WalletSession>, Arc<MintController>) {
    let session = WalletSession::start(provider);
    let controller = MintController::new(
        Arc::clone(&session),
        contract as Arc<dyn MintContract>,
        MintPolicy::default(),
    );
    (session, controller)
}

#[test]
fn short_address_truncates_first_six_last_four() {
    let address: Address = "0x1234567890123456789012345678901234567890"
        .parse()
        .expect("address");
    assert_eq!(short_address(&address), "0x1234...7890");
}

#[tokio::test]
async fn quantity_adjustments_stay_within_bounds() {
    let (_session, controller) = controller_with(
        Arc::new(ScriptedProvider::ok(vec![addr(1)])),
        Arc::new(ScriptedContract::ok()),
    );

    assert_eq!(controller.quantity().await, 1);
    controller.decrement().await;
    assert_eq!(controller.quantity().await, 1);

    controller.increment().await;
    controller.increment().await;
    assert_eq!(controller.quantity().await, 3);
    controller.increment().await;
    assert_eq!(controller.quantity().await, 3);

    controller.set_quantity(0).await;
    assert_eq!(controller.quantity().await, 1);
    controller.set_quantity(9).await;
    assert_eq!(controller.quantity().await, 3);
}

#[tokio::test]
async fn connect_without_provider_reports_provider_missing() {
    let session = WalletSession::start(Arc::new(MissingWalletProvider));

    let result = session.connect().await;
    assert!(matches!(result, Err(WalletError::ProviderMissing)));
    assert!(session.accounts().await.is_empty());
    assert_eq!(
        session.connection_state().await,
        ConnectionState::Disconnected
    );
}

#[tokio::test]
async fn connect_success_replaces_account_set() {
    let account = addr(0xaa);
    let session = WalletSession::start(Arc::new(ScriptedProvider::ok(vec![account])));

    let accounts = session.connect().await.expect("connect");
    assert_eq!(accounts, vec![account]);
    assert_eq!(session.accounts().await, vec![account]);
    assert_eq!(session.connection_state().await, ConnectionState::Connected);
}

#[tokio::test]
async fn connect_rejection_leaves_session_disconnected() {
    let session = WalletSession::start(Arc::new(ScriptedProvider::failing("user rejected")));

    let result = session.connect().await;
    assert!(matches!(result, Err(WalletError::ConnectionRejected(_))));
    assert!(session.accounts().await.is_empty());
    assert_eq!(
        session.connection_state().await,
        ConnectionState::Disconnected
    );
}

#[tokio::test]
async fn empty_accounts_changed_disconnects_regardless_of_prior_state() {
    let provider = Arc::new(ScriptedProvider::ok(vec![addr(0xaa)]));
    let session = WalletSession::start(Arc::clone(&provider) as Arc<dyn WalletProvider>);
    session.connect().await.expect("connect");
    let mut events = session.subscribe_events();

    provider.emit(ProviderEvent::AccountsChanged(Vec::new()));

    loop {
        if next_session_event(&mut events).await == SessionEvent::Disconnected {
            break;
        }
    }
    assert!(session.accounts().await.is_empty());
    assert_eq!(
        session.connection_state().await,
        ConnectionState::Disconnected
    );
}

#[tokio::test]
async fn accounts_changed_emits_truncated_switch_label() {
    let provider = Arc::new(ScriptedProvider::ok(Vec::new()));
    let session = WalletSession::start(Arc::clone(&provider) as Arc<dyn WalletProvider>);
    let mut events = session.subscribe_events();

    let account: Address = "0x1234567890123456789012345678901234567890"
        .parse()
        .expect("address");
    provider.emit(ProviderEvent::AccountsChanged(vec![account]));

    loop {
        if let SessionEvent::AccountSwitched { label } = next_session_event(&mut events).await {
            assert_eq!(label, "0x1234...7890");
            break;
        }
    }
    assert_eq!(session.active_account().await, Some(account));
    assert_eq!(session.connection_state().await, ConnectionState::Connected);
}

#[tokio::test]
async fn disconnect_event_notifies_without_touching_accounts() {
    let provider = Arc::new(ScriptedProvider::ok(vec![addr(0xaa)]));
    let session = WalletSession::start(Arc::clone(&provider) as Arc<dyn WalletProvider>);
    session.connect().await.expect("connect");
    let mut events = session.subscribe_events();

    provider.emit(ProviderEvent::Disconnected {
        reason: "provider gone".into(),
    });

    loop {
        if let SessionEvent::ProviderDisconnected { reason } =
            next_session_event(&mut events).await
        {
            assert_eq!(reason, "provider gone");
            break;
        }
    }
    // accountsChanged alone drives the account set.
    assert_eq!(session.connection_state().await, ConnectionState::Connected);
}

#[tokio::test]
async fn chain_changed_requests_full_reload() {
    let provider = Arc::new(ScriptedProvider::ok(Vec::new()));
    let session = WalletSession::start(Arc::clone(&provider) as Arc<dyn WalletProvider>);
    let mut events = session.subscribe_events();

    provider.emit(ProviderEvent::ChainChanged(ChainId(5)));

    loop {
        if let SessionEvent::ChainChanged { chain_id } = next_session_event(&mut events).await {
            assert_eq!(chain_id, ChainId(5));
            break;
        }
    }
}

#[tokio::test]
async fn events_emitted_right_after_start_are_not_lost() {
    let provider = Arc::new(ScriptedProvider::ok(Vec::new()));
    let session = WalletSession::start(Arc::clone(&provider) as Arc<dyn WalletProvider>);

    // Emit before the listener task has ever been polled. The session's
    // subscription is taken in start(), so nothing in this window may drop.
    let account = addr(0x42);
    provider.emit(ProviderEvent::AccountsChanged(vec![account]));

    tokio::time::timeout(Duration::from_secs(1), async {
        loop {
            if session.active_account().await == Some(account) {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("account set never caught up with the provider event");
    assert_eq!(session.connection_state().await, ConnectionState::Connected);
}

#[tokio::test]
async fn shutdown_releases_the_provider_listener() {
    let provider = Arc::new(ScriptedProvider::ok(Vec::new()));
    let session = WalletSession::start(Arc::clone(&provider) as Arc<dyn WalletProvider>);
    let mut events = session.subscribe_events();

    session.shutdown();
    provider.emit(ProviderEvent::AccountsChanged(vec![addr(1)]));
    tokio::time::sleep(Duration::from_millis(50)).await;

    assert!(events.try_recv().is_err());
    assert!(session.accounts().await.is_empty());
}

#[tokio::test]
async fn successful_mint_walks_the_full_status_sequence() {
    let contract = Arc::new(ScriptedContract::ok());
    let (_session, controller) = controller_with(
        Arc::new(ScriptedProvider::ok(vec![addr(1)])),
        Arc::clone(&contract),
    );
    controller.set_quantity(3).await;
    let mut events = controller.subscribe_events();

    controller.submit_mint().await;

    let mut succeeded_quantity = None;
    let mut statuses = Vec::new();
    while let Ok(event) = events.try_recv() {
        match event {
            MintEvent::StatusChanged(status) => statuses.push(status),
            MintEvent::Succeeded { quantity } => succeeded_quantity = Some(quantity),
            _ => {}
        }
    }
    assert_eq!(
        statuses,
        vec![
            MintStatus::Submitting,
            MintStatus::AwaitingConfirmation,
            MintStatus::Succeeded,
            MintStatus::Idle,
        ]
    );
    assert_eq!(succeeded_quantity, Some(3));
    assert_eq!(controller.status().await, MintStatus::Idle);
}

#[tokio::test]
async fn payment_amount_is_exactly_quantity_times_unit_price() {
    let contract = Arc::new(ScriptedContract::ok());
    let (_session, controller) = controller_with(
        Arc::new(ScriptedProvider::ok(vec![addr(1)])),
        Arc::clone(&contract),
    );
    controller.set_quantity(2).await;

    controller.submit_mint().await;

    let calls = contract.mint_calls.lock().await;
    assert_eq!(
        calls.as_slice(),
        &[(2u8, U256::from(40_000_000_000_000_000u64))]
    );
}

#[tokio::test]
async fn submission_rejection_skips_the_confirmation_wait() {
    let contract = Arc::new(ScriptedContract::failing_submit("insufficient funds"));
    let (_session, controller) = controller_with(
        Arc::new(ScriptedProvider::ok(vec![addr(1)])),
        Arc::clone(&contract),
    );
    let mut events = controller.subscribe_events();

    controller.submit_mint().await;

    assert_eq!(
        drain_statuses(&mut events),
        vec![MintStatus::Submitting, MintStatus::Failed, MintStatus::Idle]
    );
    assert_eq!(*contract.confirm_calls.lock().await, 0);
}

#[tokio::test]
async fn confirmation_failure_resets_to_idle() {
    let contract = Arc::new(ScriptedContract::failing_confirm("reverted"));
    let (_session, controller) = controller_with(
        Arc::new(ScriptedProvider::ok(vec![addr(1)])),
        Arc::clone(&contract),
    );
    let mut events = controller.subscribe_events();

    controller.submit_mint().await;

    assert_eq!(
        drain_statuses(&mut events),
        vec![
            MintStatus::Submitting,
            MintStatus::AwaitingConfirmation,
            MintStatus::Failed,
            MintStatus::Idle,
        ]
    );
    assert_eq!(controller.status().await, MintStatus::Idle);
}

#[tokio::test]
async fn concurrent_submit_is_a_noop_while_in_flight() {
    let gate = Arc::new(Notify::new());
    let contract = Arc::new(ScriptedContract::gated(Arc::clone(&gate)));
    let (_session, controller) = controller_with(
        Arc::new(ScriptedProvider::ok(vec![addr(1)])),
        Arc::clone(&contract),
    );
    let mut events = controller.subscribe_events();

    let in_flight = {
        let controller = Arc::clone(&controller);
        tokio::spawn(async move { controller.submit_mint().await })
    };

    // Wait until the first submission holds the in-flight status.
    loop {
        if let Ok(MintEvent::StatusChanged(MintStatus::AwaitingConfirmation)) = events.recv().await
        {
            break;
        }
    }

    controller.submit_mint().await;
    assert_eq!(contract.mint_calls.lock().await.len(), 1);

    gate.notify_one();
    in_flight.await.expect("join");

    assert_eq!(controller.status().await, MintStatus::Idle);
    assert_eq!(contract.mint_calls.lock().await.len(), 1);
}

#[tokio::test]
async fn submit_without_provider_has_no_observable_effect() {
    let contract = Arc::new(ScriptedContract::ok());
    let session = WalletSession::start(Arc::new(MissingWalletProvider));
    let controller = MintController::new(
        session,
        Arc::clone(&contract) as Arc<dyn MintContract>,
        MintPolicy::default(),
    );
    let mut events = controller.subscribe_events();

    controller.submit_mint().await;

    assert!(events.try_recv().is_err());
    assert!(contract.mint_calls.lock().await.is_empty());
    assert_eq!(controller.status().await, MintStatus::Idle);
}

#[test]
fn notifications_track_the_event_kinds() {
    let submitted = mint_notification(&MintEvent::Submitted {
        tx_hash: TxHash::repeat_byte(1),
        quantity: 2,
    })
    .expect("notice");
    assert!(submitted.is_indefinite());
    assert_eq!(submitted.kind, NoticeKind::Info);

    let succeeded = mint_notification(&MintEvent::Succeeded { quantity: 3 }).expect("notice");
    assert_eq!(succeeded.duration_secs, Some(MINT_NOTICE_SECS));
    assert_eq!(succeeded.body.as_deref(), Some("Successfully minted 3 NFTs"));

    let single = mint_notification(&MintEvent::Succeeded { quantity: 1 }).expect("notice");
    assert_eq!(single.body.as_deref(), Some("Successfully minted 1 NFT"));

    let failed = mint_notification(&MintEvent::Failed {
        reason: "reverted".into(),
    })
    .expect("notice");
    assert_eq!(failed.kind, NoticeKind::Error);
    assert_eq!(failed.duration_secs, Some(MINT_NOTICE_SECS));

    assert!(mint_notification(&MintEvent::StatusChanged(MintStatus::Idle)).is_none());
    assert!(session_notification(&SessionEvent::AccountsChanged {
        accounts: Vec::new()
    })
    .is_none());
    let disconnected = session_notification(&SessionEvent::Disconnected).expect("notice");
    assert_eq!(disconnected.kind, NoticeKind::Warning);
    assert_eq!(disconnected.duration_secs, Some(WALLET_NOTICE_SECS));
}
