use std::{fs, path::PathBuf};

use alloy_primitives::{hex, Bytes};
use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use rpc_wallet::{
    config::load_settings, wait_for_receipt, RpcClient, TransactionRequest,
};
use shared::domain::Address;

#[derive(Parser, Debug)]
struct Cli {
    #[arg(long)]
    rpc_url: Option<String>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Publish the contract: send a creation transaction from a compiled
    /// bytecode hex file and print the deployed address.
    Deploy {
        #[arg(long)]
        bytecode_file: PathBuf,
        #[arg(long)]
        from: Option<Address>,
    },
    /// Print the payment amount the client will attach for a quantity.
    MintPrice {
        #[arg(default_value_t = 1)]
        quantity: u8,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let mut settings = load_settings();
    if let Some(rpc_url) = cli.rpc_url {
        settings.rpc_url = rpc_url;
    }

    match cli.command {
        Command::Deploy {
            bytecode_file,
            from,
        } => {
            let raw = fs::read_to_string(&bytecode_file).with_context(|| {
                format!("failed to read bytecode file '{}'", bytecode_file.display())
            })?;
            let bytecode = hex::decode(raw.trim().trim_start_matches("0x"))
                .context("bytecode file is not valid hex")?;

            let rpc = RpcClient::new(settings.rpc_url);
            let from = match from.or(settings.from_address) {
                Some(from) => from,
                None => *rpc
                    .accounts()
                    .await?
                    .first()
                    .context("node has no unlocked account to deploy from")?,
            };

            let tx_hash = rpc
                .send_transaction(&TransactionRequest {
                    from,
                    to: None,
                    value: None,
                    data: Some(Bytes::from(bytecode)),
                })
                .await?;
            println!("deployment submitted tx_hash={tx_hash}");

            let receipt = wait_for_receipt(&rpc, tx_hash).await?;
            let address = receipt
                .contract_address
                .context("receipt carried no contract address")?;
            println!("contract deployed address={address}");
        }
        Command::MintPrice { quantity } => {
            let quantity = settings.policy.clamp(quantity);
            println!(
                "quantity={} payment_wei={}",
                quantity,
                settings.policy.payment_for(quantity)
            );
        }
    }

    Ok(())
}
