use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use client_core::{short_address, MintController, MintEvent, WalletSession};
use rpc_wallet::{
    config::{load_settings, Settings},
    RpcClient, RpcMintContract, RpcWalletProvider,
};
use shared::{domain::Address, error::MintError};
use tracing::info;
use wallet_integration::MintContract;

#[derive(Parser, Debug)]
struct Args {
    #[arg(long)]
    rpc_url: Option<String>,
    #[arg(long)]
    contract: Option<Address>,
    #[arg(long)]
    from: Option<Address>,
    /// Submit a mint for this many tokens; without it, just connect and
    /// report the active account.
    #[arg(long)]
    mint: Option<u8>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt().init();
    let args = Args::parse();

    let mut settings: Settings = load_settings();
    if let Some(rpc_url) = args.rpc_url {
        settings.rpc_url = rpc_url;
    }
    if let Some(contract) = args.contract {
        settings.contract_address = Some(contract);
    }
    if let Some(from) = args.from {
        settings.from_address = Some(from);
    }

    let rpc = RpcClient::new(settings.rpc_url.clone());
    let provider = RpcWalletProvider::new(rpc.clone());
    let session = WalletSession::start(provider);

    let accounts = session.connect().await?;
    info!(accounts = accounts.len(), "wallet connected");
    match accounts.first() {
        Some(account) => println!("connected account={}", short_address(account)),
        None => println!("connected, but the node reports no accounts"),
    }

    let Some(quantity) = args.mint else {
        return Ok(());
    };

    let contract_address = settings
        .contract_address
        .context("no contract address configured (mint.toml, MINT_CONTRACT_ADDRESS, or --contract)")?;
    let contract: Arc<dyn MintContract> = Arc::new(RpcMintContract::new(
        rpc,
        contract_address,
        settings.from_address,
    ));

    let controller = MintController::new(session, contract, settings.policy.clone());
    controller.set_quantity(quantity).await;
    let mut events = controller.subscribe_events();

    controller.submit_mint().await;

    while let Ok(event) = events.try_recv() {
        match event {
            MintEvent::StatusChanged(status) => println!("status={status:?}"),
            MintEvent::Submitted { tx_hash, quantity } => {
                println!("submitted tx_hash={tx_hash} quantity={quantity}");
            }
            MintEvent::Succeeded { quantity } => {
                info!(quantity, "mint confirmed");
                println!("minted quantity={quantity}");
            }
            MintEvent::Failed { reason } => return Err(MintError(reason).into()),
            MintEvent::QuantityChanged(_) => {}
        }
    }

    Ok(())
}
