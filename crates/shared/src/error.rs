use thiserror::Error;

/// Failures while establishing a wallet connection. Both are user-facing and
/// non-fatal: the session stays in its pre-operation state.
#[derive(Debug, Error)]
pub enum WalletError {
    #[error("no wallet provider detected")]
    ProviderMissing,
    #[error("wallet connection rejected: {0}")]
    ConnectionRejected(String),
}

/// Failure of a mint attempt. Cancellations, insufficient funds, and reverts
/// are deliberately not distinguished; each click is a fresh attempt.
#[derive(Debug, Error)]
#[error("mint failed: {0}")]
pub struct MintError(pub String);
