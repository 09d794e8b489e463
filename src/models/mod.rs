//! Data models shared across handlers and services.

/// Transfer status, ledger record, and API request/response types
pub mod transfer;
