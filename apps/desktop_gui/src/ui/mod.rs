//! UI layer for the mint GUI: app shell, panels, and toasts.

pub mod app;

pub use app::MintApp;
