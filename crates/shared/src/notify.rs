use serde::{Deserialize, Serialize};

/// How long wallet-lifecycle notices stay up, in seconds.
pub const WALLET_NOTICE_SECS: u64 = 3;
/// How long mint-outcome notices stay up, in seconds.
pub const MINT_NOTICE_SECS: u64 = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NoticeKind {
    Info,
    Success,
    Warning,
    Error,
}

/// A dismissible user notification. `duration_secs = None` means the notice
/// stays up until a later notice replaces it (the "submitted, awaiting
/// confirmation" case).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    pub kind: NoticeKind,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<String>,
    pub duration_secs: Option<u64>,
}

impl Notification {
    pub fn timed(kind: NoticeKind, title: impl Into<String>, secs: u64) -> Self {
        Self {
            kind,
            title: title.into(),
            body: None,
            duration_secs: Some(secs),
        }
    }

    pub fn indefinite(kind: NoticeKind, title: impl Into<String>) -> Self {
        Self {
            kind,
            title: title.into(),
            body: None,
            duration_secs: None,
        }
    }

    pub fn with_body(mut self, body: impl Into<String>) -> Self {
        self.body = Some(body.into());
        self
    }

    pub fn is_indefinite(&self) -> bool {
        self.duration_secs.is_none()
    }
}
