//! Transfer data models and API request/response types.
//!
//! This module defines:
//! - `TransferStatus`: terminal and in-flight saga outcomes
//! - `TransactionRecord`: ledger entry for one orchestrated transfer
//! - Request/response types for the transfer endpoints

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Outcome of an orchestrated transfer.
///
/// `DebitedNotCredited` is the only non-terminal status: the sender has been
/// debited but the receiver credit has not been confirmed, so the record must
/// eventually move to `Completed` (credit retried through) or `Reversed`
/// (sender refunded), or stay put awaiting manual reconciliation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransferStatus {
    /// Both mutations confirmed
    Completed,

    /// Rejected before any mutation; balances at both ends unchanged
    Failed,

    /// Funds left the sender but did not reach the receiver
    DebitedNotCredited,

    /// Credit could not be delivered; debit compensated back to the sender
    Reversed,
}

impl TransferStatus {
    /// Whether no further transition is possible for this record.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, TransferStatus::DebitedNotCredited)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TransferStatus::Completed => "completed",
            TransferStatus::Failed => "failed",
            TransferStatus::DebitedNotCredited => "debited_not_credited",
            TransferStatus::Reversed => "reversed",
        }
    }
}

impl fmt::Display for TransferStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Ledger entry for one orchestrated transfer.
///
/// Created exactly once per accepted intent and owned by the orchestrator.
/// Append-only: after being written, the only permitted in-place change is
/// the `DebitedNotCredited` transition to a compensation outcome (see
/// `TransactionLedger::resolve_pending`).
#[derive(Debug, Clone, Serialize)]
pub struct TransactionRecord {
    /// Orchestrator-minted identifier, reused as the idempotency key for
    /// every downstream debit/credit call
    pub transaction_id: Uuid,

    /// Sender account reference (opaque, prefix-routed)
    pub from_account: String,

    /// Receiver account reference
    pub to_account: String,

    /// Amount in cents
    pub amount_cents: i64,

    /// Owning institution of the sender
    ///
    /// None when the reference could not be routed.
    pub sender_institution: Option<String>,

    /// Owning institution of the receiver
    pub receiver_institution: Option<String>,

    pub description: Option<String>,

    pub status: TransferStatus,

    /// Failure or compensation reason, when the transfer did not complete
    /// cleanly on the first pass
    pub reason: Option<String>,

    /// Sender balance reported by its institution after the debit
    pub sender_new_balance: Option<i64>,

    /// Receiver balance reported by its institution after the credit
    pub receiver_new_balance: Option<i64>,

    pub created_at: DateTime<Utc>,
}

/// Request body for `POST /transfer`.
///
/// The `token` is a bearer credential scoped to the sender's owning
/// institution; the gateway relays it without inspecting it.
#[derive(Debug, Deserialize)]
pub struct TransferRequest {
    pub from_account: String,
    pub to_account: String,

    /// Amount to move, in cents. Must be positive.
    pub amount_cents: i64,

    pub token: String,

    #[serde(default)]
    pub description: Option<String>,
}

/// Post-mutation balances included on responses when known.
#[derive(Debug, Serialize)]
pub struct TransferDetails {
    pub sender_new_balance: Option<i64>,
    pub receiver_new_balance: Option<i64>,
}

/// Response body for `POST /transfer`.
///
/// The transaction id is always present once an intent has been accepted,
/// even for failed transfers, so callers can query the ledger afterwards.
#[derive(Debug, Serialize)]
pub struct TransferResponse {
    pub success: bool,
    pub transaction_id: Uuid,
    pub status: TransferStatus,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<TransferDetails>,
}

impl From<&TransactionRecord> for TransferResponse {
    fn from(record: &TransactionRecord) -> Self {
        let message = match record.status {
            TransferStatus::Completed => "Transfer completed successfully".to_string(),
            TransferStatus::Failed => match &record.reason {
                Some(reason) => format!("Transfer failed: {}", reason),
                None => "Transfer failed".to_string(),
            },
            TransferStatus::DebitedNotCredited => {
                "Transfer needs attention: sender debited but receiver credit unconfirmed"
                    .to_string()
            }
            TransferStatus::Reversed => {
                "Transfer reversed: receiver credit failed, sender refunded".to_string()
            }
        };

        let details = if record.sender_new_balance.is_some()
            || record.receiver_new_balance.is_some()
        {
            Some(TransferDetails {
                sender_new_balance: record.sender_new_balance,
                receiver_new_balance: record.receiver_new_balance,
            })
        } else {
            None
        };

        Self {
            success: record.status == TransferStatus::Completed,
            transaction_id: record.transaction_id,
            status: record.status,
            message,
            details,
        }
    }
}
