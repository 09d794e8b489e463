//! Transfer orchestration: the cross-institution saga.
//!
//! A transfer touches two independently-failing account services that share
//! no transaction. The saga runs the steps strictly in order (route, verify
//! both ends, authorize with the sender's institution, debit, credit) and
//! records one ledger entry per accepted intent. Everything up to and
//! including the debit resolves failures locally into a terminal `failed`
//! record with nothing mutated. A credit failure after a successful debit is
//! different: funds have left the sender, so the record enters
//! `debited_not_credited` and compensation (credit retries, then a reversal
//! back to the sender) must run before the saga is closed.

use crate::directory::{Directory, Institution, RoutingError};
use crate::error::GatewayError;
use crate::ledger::{CompensationOutcome, TransactionLedger};
use crate::models::transfer::{TransactionRecord, TransferRequest, TransferStatus};
use crate::services::account_client::{AccountService, ClientError};
use crate::services::health_service::HealthMonitor;
use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};
use uuid::Uuid;

/// Compensation tuning, from configuration.
#[derive(Debug, Clone)]
pub struct SagaSettings {
    /// Credit retries before a reversal is attempted
    pub credit_retry_attempts: u32,

    /// Pause between credit retries
    pub credit_retry_delay: Duration,
}

/// Failures resolved before any balance has moved.
#[derive(Debug, thiserror::Error)]
enum SagaError {
    #[error("sender bank not identified: {0}")]
    SenderUnroutable(RoutingError),

    #[error("receiver bank not identified: {0}")]
    ReceiverUnroutable(RoutingError),

    #[error("sender account not found")]
    SenderNotFound,

    #[error("receiver account not found")]
    ReceiverNotFound,

    #[error("{institution} unreachable: {source}")]
    ServiceUnavailable {
        institution: String,
        source: ClientError,
    },

    #[error("transaction not authorized: {0}")]
    NotAuthorized(String),
}

pub struct TransferOrchestrator {
    directory: Arc<Directory>,
    accounts: Arc<dyn AccountService>,
    ledger: Arc<TransactionLedger>,
    health: Arc<HealthMonitor>,
    settings: SagaSettings,
}

impl TransferOrchestrator {
    pub fn new(
        directory: Arc<Directory>,
        accounts: Arc<dyn AccountService>,
        ledger: Arc<TransactionLedger>,
        health: Arc<HealthMonitor>,
        settings: SagaSettings,
    ) -> Self {
        Self {
            directory,
            accounts,
            ledger,
            health,
            settings,
        }
    }

    /// Run one transfer intent to its ledger outcome.
    ///
    /// Returns `Err` only for requests rejected before a transaction id is
    /// minted; every accepted intent yields exactly one ledger record, which
    /// is returned whatever its status.
    pub async fn submit(
        &self,
        request: TransferRequest,
    ) -> Result<TransactionRecord, GatewayError> {
        if request.amount_cents <= 0 {
            return Err(GatewayError::InvalidRequest(
                "Amount must be positive".to_string(),
            ));
        }
        if request.from_account == request.to_account {
            return Err(GatewayError::InvalidRequest(
                "Cannot transfer to same account".to_string(),
            ));
        }
        if request.token.is_empty() {
            return Err(GatewayError::InvalidRequest(
                "Missing sender credential".to_string(),
            ));
        }

        let transaction_id = Uuid::new_v4();
        info!(
            %transaction_id,
            from = %request.from_account,
            to = %request.to_account,
            amount_cents = request.amount_cents,
            "Transfer accepted"
        );

        // Route both references. No remote call has been made yet.
        let sender = match self.directory.resolve(&request.from_account) {
            Ok(institution) => institution.clone(),
            Err(e) => {
                return Ok(self.reject(
                    transaction_id,
                    &request,
                    None,
                    None,
                    SagaError::SenderUnroutable(e),
                ));
            }
        };
        let receiver = match self.directory.resolve(&request.to_account) {
            Ok(institution) => institution.clone(),
            Err(e) => {
                return Ok(self.reject(
                    transaction_id,
                    &request,
                    Some(sender.id.clone()),
                    None,
                    SagaError::ReceiverUnroutable(e),
                ));
            }
        };

        // The two existence checks touch different services and mutate
        // nothing, so their ordering is not observable.
        let (sender_exists, receiver_exists) = tokio::join!(
            self.accounts.verify_account(&sender, &request.from_account),
            self.accounts.verify_account(&receiver, &request.to_account),
        );

        let institutions = (Some(sender.id.clone()), Some(receiver.id.clone()));
        match sender_exists {
            Ok(true) => {}
            Ok(false) => {
                return Ok(self.reject(
                    transaction_id,
                    &request,
                    institutions.0,
                    institutions.1,
                    SagaError::SenderNotFound,
                ));
            }
            Err(e) => {
                return Ok(self.reject(
                    transaction_id,
                    &request,
                    institutions.0,
                    institutions.1,
                    SagaError::ServiceUnavailable {
                        institution: sender.id.clone(),
                        source: e,
                    },
                ));
            }
        }
        match receiver_exists {
            Ok(true) => {}
            Ok(false) => {
                return Ok(self.reject(
                    transaction_id,
                    &request,
                    institutions.0,
                    institutions.1,
                    SagaError::ReceiverNotFound,
                ));
            }
            Err(e) => {
                return Ok(self.reject(
                    transaction_id,
                    &request,
                    institutions.0,
                    institutions.1,
                    SagaError::ServiceUnavailable {
                        institution: receiver.id.clone(),
                        source: e,
                    },
                ));
            }
        }

        // Authorization is entirely the sender institution's judgement; the
        // token is relayed, never inspected here.
        let decision = match self
            .accounts
            .authorize_transfer(
                &sender,
                &request.from_account,
                request.amount_cents,
                &request.token,
            )
            .await
        {
            Ok(decision) => decision,
            Err(e) => {
                return Ok(self.reject(
                    transaction_id,
                    &request,
                    institutions.0,
                    institutions.1,
                    SagaError::ServiceUnavailable {
                        institution: sender.id.clone(),
                        source: e,
                    },
                ));
            }
        };
        if !decision.authorized {
            let reason = decision
                .reason
                .unwrap_or_else(|| "authorization denied".to_string());
            return Ok(self.reject(
                transaction_id,
                &request,
                institutions.0,
                institutions.1,
                SagaError::NotAuthorized(reason),
            ));
        }

        // From the debit onward the saga must not be abandoned, so the
        // mutation phase runs on its own task: a caller dropping the request
        // mid-flight cannot leave a successful debit without its credit or
        // compensation.
        let phase = MutationPhase {
            accounts: self.accounts.clone(),
            ledger: self.ledger.clone(),
            health: self.health.clone(),
            settings: self.settings.clone(),
            transaction_id,
            from_account: request.from_account,
            to_account: request.to_account,
            amount_cents: request.amount_cents,
            description: request.description,
            sender,
            receiver,
        };

        match tokio::spawn(phase.run()).await {
            Ok(record) => Ok(record),
            Err(e) => {
                error!(%transaction_id, error = %e, "Mutation phase task failed");
                self.ledger
                    .get(transaction_id)
                    .ok_or_else(|| GatewayError::Internal("transfer state lost".to_string()))
            }
        }
    }

    fn reject(
        &self,
        transaction_id: Uuid,
        request: &TransferRequest,
        sender_institution: Option<String>,
        receiver_institution: Option<String>,
        error: SagaError,
    ) -> TransactionRecord {
        warn!(%transaction_id, error = %error, "Transfer rejected before any mutation");
        let record = TransactionRecord {
            transaction_id,
            from_account: request.from_account.clone(),
            to_account: request.to_account.clone(),
            amount_cents: request.amount_cents,
            sender_institution,
            receiver_institution,
            description: request.description.clone(),
            status: TransferStatus::Failed,
            reason: Some(error.to_string()),
            sender_new_balance: None,
            receiver_new_balance: None,
            created_at: Utc::now(),
        };
        self.append(&record);
        record
    }

    fn append(&self, record: &TransactionRecord) {
        if let Err(e) = self.ledger.append(record.clone()) {
            error!(error = %e, "Failed to append ledger record");
        }
    }
}

/// The debit-and-credit leg of one saga, detached from request cancellation.
struct MutationPhase {
    accounts: Arc<dyn AccountService>,
    ledger: Arc<TransactionLedger>,
    health: Arc<HealthMonitor>,
    settings: SagaSettings,
    transaction_id: Uuid,
    from_account: String,
    to_account: String,
    amount_cents: i64,
    description: Option<String>,
    sender: Institution,
    receiver: Institution,
}

impl MutationPhase {
    async fn run(self) -> TransactionRecord {
        // Debit the sender under the minted transaction id. A rejection here
        // (e.g. the balance moved since authorization) is a normal saga
        // failure: nothing has been mutated.
        let sender_balance = match self
            .accounts
            .debit(
                &self.sender,
                &self.from_account,
                self.amount_cents,
                self.transaction_id,
            )
            .await
        {
            Ok(outcome) if outcome.success => outcome.new_balance,
            Ok(outcome) => {
                let reason = outcome
                    .reason
                    .unwrap_or_else(|| "debit rejected".to_string());
                return self.finish_failed(format!("failed to debit sender: {}", reason));
            }
            Err(e) => {
                return self.finish_failed(format!(
                    "failed to debit sender: {} unreachable: {}",
                    self.sender.id, e
                ));
            }
        };
        info!(transaction_id = %self.transaction_id, "Sender debited");

        let credit_failure = match self
            .accounts
            .credit(
                &self.receiver,
                &self.to_account,
                self.amount_cents,
                self.transaction_id,
            )
            .await
        {
            Ok(outcome) if outcome.success => {
                let record = self.record(
                    TransferStatus::Completed,
                    None,
                    sender_balance,
                    outcome.new_balance,
                );
                self.append(&record);
                info!(transaction_id = %self.transaction_id, "Transfer completed");
                return record;
            }
            Ok(outcome) => outcome
                .reason
                .unwrap_or_else(|| "credit rejected".to_string()),
            Err(e) => format!("credit outcome unknown: {}", e),
        };

        // The critical window: money has left the sender. Record the
        // displaced funds durably before attempting compensation.
        warn!(
            transaction_id = %self.transaction_id,
            reason = %credit_failure,
            "Sender debited but receiver credit unconfirmed; starting compensation"
        );
        let pending = self.record(
            TransferStatus::DebitedNotCredited,
            Some(credit_failure),
            sender_balance,
            None,
        );
        self.append(&pending);

        self.compensate(sender_balance).await
    }

    /// Retry the credit under the original transaction id, then fall back to
    /// reversing the debit. The receiver applies at most one credit per id,
    /// so retries cannot double-pay.
    async fn compensate(&self, sender_balance: Option<i64>) -> TransactionRecord {
        for attempt in 1..=self.settings.credit_retry_attempts {
            tokio::time::sleep(self.settings.credit_retry_delay).await;

            if !self.health.is_reachable(&self.receiver).await {
                warn!(
                    transaction_id = %self.transaction_id,
                    attempt,
                    institution = %self.receiver.id,
                    "Receiver unreachable; deferring credit retry"
                );
                continue;
            }

            match self
                .accounts
                .credit(
                    &self.receiver,
                    &self.to_account,
                    self.amount_cents,
                    self.transaction_id,
                )
                .await
            {
                Ok(outcome) if outcome.success => {
                    info!(
                        transaction_id = %self.transaction_id,
                        attempt,
                        "Credit retry succeeded; transfer completed"
                    );
                    self.resolve(CompensationOutcome::Credited {
                        receiver_new_balance: outcome.new_balance,
                    });
                    return self.current_record(sender_balance);
                }
                Ok(outcome) => {
                    warn!(
                        transaction_id = %self.transaction_id,
                        attempt,
                        reason = ?outcome.reason,
                        "Credit retry rejected"
                    );
                }
                Err(e) => {
                    warn!(
                        transaction_id = %self.transaction_id,
                        attempt,
                        error = %e,
                        "Credit retry failed"
                    );
                }
            }
        }

        // Retries exhausted: refund the sender. The reversal id is derived
        // from the transaction id so a replayed reversal deduplicates the
        // same way forward credits do.
        let reversal_id = Uuid::new_v5(&self.transaction_id, b"reversal");
        match self
            .accounts
            .credit(
                &self.sender,
                &self.from_account,
                self.amount_cents,
                reversal_id,
            )
            .await
        {
            Ok(outcome) if outcome.success => {
                warn!(
                    transaction_id = %self.transaction_id,
                    "Credit retries exhausted; debit reversed"
                );
                self.resolve(CompensationOutcome::Reversed {
                    sender_new_balance: outcome.new_balance,
                });
            }
            Ok(outcome) => {
                self.unreconciled(format!(
                    "compensation failed: reversal rejected: {}",
                    outcome.reason.unwrap_or_else(|| "unknown".to_string())
                ));
            }
            Err(e) => {
                self.unreconciled(format!("compensation failed: reversal unreachable: {}", e));
            }
        }

        self.current_record(sender_balance)
    }

    fn unreconciled(&self, reason: String) {
        error!(
            transaction_id = %self.transaction_id,
            reason = %reason,
            "Compensation failed; funds remain displaced, manual reconciliation required"
        );
        self.resolve(CompensationOutcome::Unreconciled { reason });
    }

    fn resolve(&self, outcome: CompensationOutcome) {
        if let Err(e) = self.ledger.resolve_pending(self.transaction_id, outcome) {
            error!(
                transaction_id = %self.transaction_id,
                error = %e,
                "Failed to resolve pending ledger record"
            );
        }
    }

    fn finish_failed(&self, reason: String) -> TransactionRecord {
        warn!(transaction_id = %self.transaction_id, reason = %reason, "Transfer failed");
        let record = self.record(TransferStatus::Failed, Some(reason), None, None);
        self.append(&record);
        record
    }

    fn current_record(&self, sender_balance: Option<i64>) -> TransactionRecord {
        match self.ledger.get(self.transaction_id) {
            Some(record) => record,
            None => {
                error!(transaction_id = %self.transaction_id, "Pending ledger record missing");
                self.record(
                    TransferStatus::DebitedNotCredited,
                    Some("ledger record missing".to_string()),
                    sender_balance,
                    None,
                )
            }
        }
    }

    fn record(
        &self,
        status: TransferStatus,
        reason: Option<String>,
        sender_new_balance: Option<i64>,
        receiver_new_balance: Option<i64>,
    ) -> TransactionRecord {
        TransactionRecord {
            transaction_id: self.transaction_id,
            from_account: self.from_account.clone(),
            to_account: self.to_account.clone(),
            amount_cents: self.amount_cents,
            sender_institution: Some(self.sender.id.clone()),
            receiver_institution: Some(self.receiver.id.clone()),
            description: self.description.clone(),
            status,
            reason,
            sender_new_balance,
            receiver_new_balance,
            created_at: Utc::now(),
        }
    }

    fn append(&self, record: &TransactionRecord) {
        if let Err(e) = self.ledger.append(record.clone()) {
            error!(error = %e, "Failed to append ledger record");
        }
    }
}
