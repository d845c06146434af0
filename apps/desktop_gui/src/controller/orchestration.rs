//! Command orchestration helpers from UI actions to backend command queue.

use crossbeam_channel::{Sender, TrySendError};

use crate::backend_bridge::commands::BackendCommand;

pub fn dispatch_backend_command(
    cmd_tx: &Sender<BackendCommand>,
    cmd: BackendCommand,
    status: &mut String,
) {
    let cmd_name = match &cmd {
        BackendCommand::ConnectWallet => "connect_wallet",
        BackendCommand::IncrementQuantity => "increment_quantity",
        BackendCommand::DecrementQuantity => "decrement_quantity",
        BackendCommand::SubmitMint => "submit_mint",
    };

    match cmd_tx.try_send(cmd) {
        Ok(()) => tracing::debug!(command = cmd_name, "queued ui->backend command"),
        Err(TrySendError::Full(_)) => {
            *status = "UI command queue is full; please retry".to_string();
        }
        Err(TrySendError::Disconnected(_)) => {
            *status = "Wallet backend stopped (startup failure?); restart the app".to_string();
        }
    }
}
