//! HTTP request handlers (route handlers).
//!
//! Each handler is an async function that:
//! 1. Receives HTTP request data (JSON body, URL params, etc.)
//! 2. Delegates to the orchestrator, ledger, or health monitor
//! 3. Returns HTTP response (JSON, status code)

/// Health and banner endpoints
pub mod health;

/// Transfer submission and transaction lookup endpoints
pub mod transfers;
