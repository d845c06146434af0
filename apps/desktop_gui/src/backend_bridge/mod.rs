//! Bridge between the UI thread and the wallet backend worker.

pub mod commands;
pub mod runtime;
