use anyhow::Result;
use clap::Parser;
use crossbeam_channel::bounded;
use rpc_wallet::config::load_settings;
use shared::domain::Address;

mod backend_bridge;
mod controller;
mod ui;

#[derive(Parser, Debug)]
struct Args {
    #[arg(long)]
    rpc_url: Option<String>,
    #[arg(long)]
    contract: Option<Address>,
    #[arg(long)]
    from: Option<Address>,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt().init();
    let args = Args::parse();

    let mut settings = load_settings();
    if let Some(rpc_url) = args.rpc_url {
        settings.rpc_url = rpc_url;
    }
    if let Some(contract) = args.contract {
        settings.contract_address = Some(contract);
    }
    if let Some(from) = args.from {
        settings.from_address = Some(from);
    }

    let (cmd_tx, cmd_rx) = bounded(64);
    let (ui_tx, ui_rx) = bounded(256);
    backend_bridge::runtime::launch(settings.clone(), cmd_rx, ui_tx);

    let native_options = eframe::NativeOptions::default();
    eframe::run_native(
        "NFT Mint",
        native_options,
        Box::new(move |_cc| Ok(Box::new(ui::app::MintApp::new(settings, cmd_tx, ui_rx)))),
    )
    .map_err(|err| anyhow::anyhow!("failed to run gui: {err}"))
}
