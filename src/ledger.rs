//! Append-only ledger of orchestrated transfers.
//!
//! The ledger is the orchestrator's only durable state. Records are keyed by
//! the minted transaction id and never rewritten after being appended, with
//! one exception: a `DebitedNotCredited` record may move to its compensation
//! outcome. `DashMap` keeps appends from different transfers off a global
//! lock.

use crate::models::transfer::{TransactionRecord, TransferStatus};
use dashmap::DashMap;
use uuid::Uuid;

/// Ledger access errors.
#[derive(Debug, thiserror::Error)]
pub enum LedgerError {
    #[error("transaction {0} already recorded")]
    DuplicateTransaction(Uuid),

    #[error("transaction {0} not found")]
    NotFound(Uuid),

    #[error("transaction {id} is {status}, not awaiting compensation")]
    InvalidTransition { id: Uuid, status: TransferStatus },
}

/// Resolution applied to a `DebitedNotCredited` record.
#[derive(Debug)]
pub enum CompensationOutcome {
    /// A credit retry went through; the transfer completed after all.
    Credited { receiver_new_balance: Option<i64> },

    /// The debit was compensated back to the sender.
    Reversed { sender_new_balance: Option<i64> },

    /// Retry and reversal both failed; the record stays pending with an
    /// updated reason for the operator.
    Unreconciled { reason: String },
}

#[derive(Default)]
pub struct TransactionLedger {
    records: DashMap<Uuid, TransactionRecord>,
}

impl TransactionLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a new record. Transaction ids are minted per intent, so a
    /// duplicate indicates a caller bug rather than a replay.
    pub fn append(&self, record: TransactionRecord) -> Result<(), LedgerError> {
        match self.records.entry(record.transaction_id) {
            dashmap::mapref::entry::Entry::Occupied(_) => {
                Err(LedgerError::DuplicateTransaction(record.transaction_id))
            }
            dashmap::mapref::entry::Entry::Vacant(slot) => {
                slot.insert(record);
                Ok(())
            }
        }
    }

    pub fn get(&self, transaction_id: Uuid) -> Option<TransactionRecord> {
        self.records.get(&transaction_id).map(|r| r.value().clone())
    }

    /// All records, newest first.
    pub fn list(&self) -> Vec<TransactionRecord> {
        let mut records: Vec<TransactionRecord> =
            self.records.iter().map(|r| r.value().clone()).collect();
        records.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        records
    }

    /// Records still awaiting compensation, for operator reconciliation.
    pub fn pending_reconciliation(&self) -> Vec<TransactionRecord> {
        let mut records: Vec<TransactionRecord> = self
            .records
            .iter()
            .filter(|r| !r.value().status.is_terminal())
            .map(|r| r.value().clone())
            .collect();
        records.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        records
    }

    /// Apply a compensation outcome to a `DebitedNotCredited` record.
    ///
    /// This is the single permitted in-place mutation. Any other starting
    /// status is rejected.
    pub fn resolve_pending(
        &self,
        transaction_id: Uuid,
        outcome: CompensationOutcome,
    ) -> Result<(), LedgerError> {
        let mut entry = self
            .records
            .get_mut(&transaction_id)
            .ok_or(LedgerError::NotFound(transaction_id))?;

        if entry.status != TransferStatus::DebitedNotCredited {
            return Err(LedgerError::InvalidTransition {
                id: transaction_id,
                status: entry.status,
            });
        }

        match outcome {
            CompensationOutcome::Credited {
                receiver_new_balance,
            } => {
                entry.status = TransferStatus::Completed;
                entry.reason = None;
                entry.receiver_new_balance = receiver_new_balance;
            }
            CompensationOutcome::Reversed { sender_new_balance } => {
                entry.status = TransferStatus::Reversed;
                entry.reason = Some("receiver credit failed; sender refunded".to_string());
                if sender_new_balance.is_some() {
                    entry.sender_new_balance = sender_new_balance;
                }
            }
            CompensationOutcome::Unreconciled { reason } => {
                entry.reason = Some(reason);
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn record(status: TransferStatus) -> TransactionRecord {
        TransactionRecord {
            transaction_id: Uuid::new_v4(),
            from_account: "BANK1A1B2C3D4".to_string(),
            to_account: "BANK2E5F6A7B8".to_string(),
            amount_cents: 1200,
            sender_institution: Some("BANK1".to_string()),
            receiver_institution: Some("BANK2".to_string()),
            description: None,
            status,
            reason: None,
            sender_new_balance: None,
            receiver_new_balance: None,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_append_and_get() {
        let ledger = TransactionLedger::new();
        let rec = record(TransferStatus::Completed);
        let id = rec.transaction_id;

        ledger.append(rec).unwrap();
        let fetched = ledger.get(id).unwrap();
        assert_eq!(fetched.transaction_id, id);
        assert_eq!(fetched.status, TransferStatus::Completed);
        assert!(ledger.get(Uuid::new_v4()).is_none());
    }

    #[test]
    fn test_duplicate_append_rejected() {
        let ledger = TransactionLedger::new();
        let rec = record(TransferStatus::Failed);
        let id = rec.transaction_id;

        ledger.append(rec.clone()).unwrap();
        let err = ledger.append(rec).unwrap_err();
        assert!(matches!(err, LedgerError::DuplicateTransaction(dup) if dup == id));
    }

    #[test]
    fn test_pending_record_resolves_to_completed() {
        let ledger = TransactionLedger::new();
        let rec = record(TransferStatus::DebitedNotCredited);
        let id = rec.transaction_id;
        ledger.append(rec).unwrap();

        ledger
            .resolve_pending(
                id,
                CompensationOutcome::Credited {
                    receiver_new_balance: Some(5200),
                },
            )
            .unwrap();

        let resolved = ledger.get(id).unwrap();
        assert_eq!(resolved.status, TransferStatus::Completed);
        assert_eq!(resolved.receiver_new_balance, Some(5200));
        assert!(resolved.reason.is_none());
    }

    #[test]
    fn test_pending_record_resolves_to_reversed() {
        let ledger = TransactionLedger::new();
        let rec = record(TransferStatus::DebitedNotCredited);
        let id = rec.transaction_id;
        ledger.append(rec).unwrap();

        ledger
            .resolve_pending(
                id,
                CompensationOutcome::Reversed {
                    sender_new_balance: Some(5000),
                },
            )
            .unwrap();

        let resolved = ledger.get(id).unwrap();
        assert_eq!(resolved.status, TransferStatus::Reversed);
        assert_eq!(resolved.sender_new_balance, Some(5000));
    }

    #[test]
    fn test_unreconciled_keeps_pending_status() {
        let ledger = TransactionLedger::new();
        let rec = record(TransferStatus::DebitedNotCredited);
        let id = rec.transaction_id;
        ledger.append(rec).unwrap();

        ledger
            .resolve_pending(
                id,
                CompensationOutcome::Unreconciled {
                    reason: "manual reconciliation required".to_string(),
                },
            )
            .unwrap();

        let still_pending = ledger.get(id).unwrap();
        assert_eq!(still_pending.status, TransferStatus::DebitedNotCredited);
        assert_eq!(
            still_pending.reason.as_deref(),
            Some("manual reconciliation required")
        );
        assert_eq!(ledger.pending_reconciliation().len(), 1);
    }

    #[test]
    fn test_terminal_record_rejects_transition() {
        let ledger = TransactionLedger::new();
        let rec = record(TransferStatus::Completed);
        let id = rec.transaction_id;
        ledger.append(rec).unwrap();

        let err = ledger
            .resolve_pending(
                id,
                CompensationOutcome::Reversed {
                    sender_new_balance: None,
                },
            )
            .unwrap_err();
        assert!(matches!(err, LedgerError::InvalidTransition { .. }));
    }

    #[tokio::test]
    async fn test_concurrent_appends() {
        let ledger = std::sync::Arc::new(TransactionLedger::new());

        let mut handles = Vec::new();
        for _ in 0..50 {
            let ledger = ledger.clone();
            handles.push(tokio::spawn(async move {
                ledger.append(record(TransferStatus::Completed)).unwrap();
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        assert_eq!(ledger.list().len(), 50);
    }
}
