//! UI/backend events and failure classification for the mint GUI.

use client_core::MintStatus;
use shared::{domain::Address, notify::Notification};

pub enum UiEvent {
    BackendReady { contract_configured: bool },
    AccountsChanged { accounts: Vec<Address> },
    QuantityChanged(u8),
    MintStatusChanged(MintStatus),
    Notice(Notification),
    /// Chain id changed under us; the UI tears down to the startup screen,
    /// the desktop equivalent of a full page reload.
    ReloadRequired,
}

pub fn classify_connect_failure(message: &str) -> String {
    let lower = message.to_ascii_lowercase();
    if lower.contains("no wallet provider") {
        "No wallet detected; configure an RPC node and restart.".to_string()
    } else if lower.contains("connection refused")
        || lower.contains("dns")
        || lower.contains("timed out")
        || lower.contains("transport failure")
    {
        "Node unreachable; check the RPC URL and retry.".to_string()
    } else {
        format!("Connection error: {message}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_transport_failures_as_unreachable() {
        let classified = classify_connect_failure(
            "wallet connection rejected: transport failure calling eth_accounts: connection refused",
        );
        assert!(classified.contains("unreachable"));
    }

    #[test]
    fn classifies_missing_provider() {
        assert!(classify_connect_failure("no wallet provider detected").contains("No wallet"));
    }

    #[test]
    fn passes_through_unknown_failures() {
        assert!(classify_connect_failure("user denied").contains("user denied"));
    }
}
