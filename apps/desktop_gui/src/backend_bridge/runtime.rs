//! Backend worker: owns the tokio runtime, the wallet session, and the mint
//! controller; consumes UI commands and feeds UI events back.

use std::sync::Arc;

use client_core::{
    mint_notification, session_notification, MintController, MintEvent, MissingMintContract,
    SessionEvent, WalletSession,
};
use crossbeam_channel::{Receiver, Sender};
use rpc_wallet::{config::Settings, RpcClient, RpcMintContract, RpcWalletProvider};
use shared::notify::{Notification, NoticeKind, WALLET_NOTICE_SECS};
use tracing::{error, warn};
use wallet_integration::MintContract;

use crate::backend_bridge::commands::BackendCommand;
use crate::controller::events::{classify_connect_failure, UiEvent};

pub fn launch(settings: Settings, cmd_rx: Receiver<BackendCommand>, ui_tx: Sender<UiEvent>) {
    let spawned = std::thread::Builder::new()
        .name("wallet-backend".into())
        .spawn(move || run(settings, cmd_rx, ui_tx));
    if let Err(err) = spawned {
        error!(error = %err, "failed to spawn wallet backend thread");
    }
}

fn run(settings: Settings, cmd_rx: Receiver<BackendCommand>, ui_tx: Sender<UiEvent>) {
    let runtime = match tokio::runtime::Builder::new_multi_thread().enable_all().build() {
        Ok(runtime) => runtime,
        Err(err) => {
            error!(error = %err, "failed to build backend runtime");
            let _ = ui_tx.try_send(UiEvent::Notice(
                Notification::timed(NoticeKind::Error, "Backend startup failed", WALLET_NOTICE_SECS)
                    .with_body(err.to_string()),
            ));
            return;
        }
    };
    let _guard = runtime.enter();

    let rpc = RpcClient::new(settings.rpc_url.clone());
    let provider = RpcWalletProvider::new(rpc.clone());
    provider.start_watcher();
    let session = WalletSession::start(provider);

    let contract: Arc<dyn MintContract> = match settings.contract_address {
        Some(address) => Arc::new(RpcMintContract::new(rpc, address, settings.from_address)),
        None => {
            warn!("no contract address configured; minting disabled");
            Arc::new(MissingMintContract)
        }
    };
    let controller = MintController::new(Arc::clone(&session), contract, settings.policy.clone());

    let _ = ui_tx.try_send(UiEvent::BackendReady {
        contract_configured: settings.contract_address.is_some(),
    });

    forward_session_events(&runtime, &session, ui_tx.clone());
    forward_mint_events(&runtime, &controller, ui_tx.clone());

    for cmd in cmd_rx.iter() {
        match cmd {
            BackendCommand::ConnectWallet => {
                let session = Arc::clone(&session);
                let ui_tx = ui_tx.clone();
                runtime.spawn(async move {
                    if let Err(err) = session.connect().await {
                        warn!(error = %err, "wallet connect failed");
                        let _ = ui_tx.try_send(UiEvent::Notice(
                            Notification::timed(
                                NoticeKind::Error,
                                "Connection failed",
                                WALLET_NOTICE_SECS,
                            )
                            .with_body(classify_connect_failure(&err.to_string())),
                        ));
                    }
                });
            }
            BackendCommand::IncrementQuantity => {
                let controller = Arc::clone(&controller);
                runtime.spawn(async move { controller.increment().await });
            }
            BackendCommand::DecrementQuantity => {
                let controller = Arc::clone(&controller);
                runtime.spawn(async move { controller.decrement().await });
            }
            BackendCommand::SubmitMint => {
                let controller = Arc::clone(&controller);
                runtime.spawn(async move { controller.submit_mint().await });
            }
        }
    }

    // UI side hung up; release the provider subscription before the runtime
    // goes away.
    session.shutdown();
}

fn forward_session_events(
    runtime: &tokio::runtime::Runtime,
    session: &Arc<WalletSession>,
    ui_tx: Sender<UiEvent>,
) {
    let mut events = session.subscribe_events();
    runtime.spawn(async move {
        while let Ok(event) = events.recv().await {
            if let Some(notice) = session_notification(&event) {
                let _ = ui_tx.try_send(UiEvent::Notice(notice));
            }
            match event {
                SessionEvent::AccountsChanged { accounts } => {
                    let _ = ui_tx.try_send(UiEvent::AccountsChanged { accounts });
                }
                SessionEvent::ChainChanged { .. } => {
                    let _ = ui_tx.try_send(UiEvent::ReloadRequired);
                }
                _ => {}
            }
        }
    });
}

fn forward_mint_events(
    runtime: &tokio::runtime::Runtime,
    controller: &Arc<MintController>,
    ui_tx: Sender<UiEvent>,
) {
    let mut events = controller.subscribe_events();
    runtime.spawn(async move {
        while let Ok(event) = events.recv().await {
            if let Some(notice) = mint_notification(&event) {
                let _ = ui_tx.try_send(UiEvent::Notice(notice));
            }
            match event {
                MintEvent::StatusChanged(status) => {
                    let _ = ui_tx.try_send(UiEvent::MintStatusChanged(status));
                }
                MintEvent::QuantityChanged(quantity) => {
                    let _ = ui_tx.try_send(UiEvent::QuantityChanged(quantity));
                }
                _ => {}
            }
        }
    });
}
