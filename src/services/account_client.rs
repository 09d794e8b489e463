//! Typed client for the account-service operations the gateway consumes.
//!
//! Each institution exposes four JSON-over-HTTP operations (verify-account,
//! authorize-transfer, debit, credit) plus a liveness probe at its root. The
//! client issues one bounded call per operation and never retries on its
//! own: a retried debit or credit is only safe when the callee deduplicates
//! by transaction id, and that decision belongs to the orchestrator.

use crate::directory::Institution;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use uuid::Uuid;

/// Failure of a single outbound call.
///
/// `Timeout` is separated from the other variants because the orchestrator
/// treats a timed-out mutation as an unknown outcome, not a negative one.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ClientError {
    #[error("request timed out")]
    Timeout,

    #[error("transport error: {0}")]
    Transport(String),

    #[error("unexpected status {0}")]
    Status(u16),

    #[error("invalid response body: {0}")]
    Decode(String),
}

impl From<reqwest::Error> for ClientError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            ClientError::Timeout
        } else if e.is_decode() {
            ClientError::Decode(e.to_string())
        } else {
            ClientError::Transport(e.to_string())
        }
    }
}

/// Ephemeral decision returned by the sender's institution.
///
/// The reason vocabulary (account not found, token mismatch, insufficient
/// funds, invalid token) is owned by the institution; the gateway relays it.
#[derive(Debug, Clone, Deserialize)]
pub struct AuthorizationDecision {
    pub authorized: bool,
    pub reason: Option<String>,
}

/// Result of a debit or credit mutation.
#[derive(Debug, Clone, Deserialize)]
pub struct MutationOutcome {
    pub success: bool,
    pub new_balance: Option<i64>,
    pub reason: Option<String>,
}

/// The account-service operations consumed by the orchestrator.
///
/// Implementations must not retry mutations internally. Repeated `debit` or
/// `credit` calls under one transaction id are the orchestrator's tool for
/// resolving ambiguous outcomes and rely on the callee applying the
/// mutation at most once per id.
#[async_trait]
pub trait AccountService: Send + Sync {
    /// Does the account exist at this institution?
    async fn verify_account(
        &self,
        institution: &Institution,
        account: &str,
    ) -> Result<bool, ClientError>;

    /// Ask the sender's institution to authorize the transfer. The bearer
    /// token is passed through verbatim; only the institution that minted it
    /// can judge it.
    async fn authorize_transfer(
        &self,
        institution: &Institution,
        from_account: &str,
        amount_cents: i64,
        token: &str,
    ) -> Result<AuthorizationDecision, ClientError>;

    async fn debit(
        &self,
        institution: &Institution,
        account: &str,
        amount_cents: i64,
        transaction_id: Uuid,
    ) -> Result<MutationOutcome, ClientError>;

    async fn credit(
        &self,
        institution: &Institution,
        account: &str,
        amount_cents: i64,
        transaction_id: Uuid,
    ) -> Result<MutationOutcome, ClientError>;

    /// Liveness probe against the institution's root endpoint.
    async fn probe(&self, institution: &Institution) -> bool;
}

#[derive(Serialize)]
struct VerifyAccountRequest<'a> {
    account_number: &'a str,
}

#[derive(Deserialize)]
struct VerifyAccountResponse {
    exists: bool,
}

#[derive(Serialize)]
struct AuthorizeTransferRequest<'a> {
    from_account: &'a str,
    amount_cents: i64,
    token: &'a str,
}

#[derive(Serialize)]
struct MutationRequest<'a> {
    account_number: &'a str,
    amount_cents: i64,
    transaction_id: Uuid,
}

/// reqwest-backed client with a fixed per-call timeout.
pub struct HttpAccountClient {
    client: reqwest::Client,
    health_timeout: Duration,
}

impl HttpAccountClient {
    pub fn new(request_timeout: Duration, health_timeout: Duration) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder().timeout(request_timeout).build()?;
        Ok(Self {
            client,
            health_timeout,
        })
    }

    async fn post_json<Req: Serialize, Resp: for<'de> Deserialize<'de>>(
        &self,
        institution: &Institution,
        path: &str,
        body: &Req,
    ) -> Result<Resp, ClientError> {
        let url = format!("{}{}", institution.base_url, path);
        let response = self.client.post(&url).json(body).send().await?;

        if !response.status().is_success() {
            return Err(ClientError::Status(response.status().as_u16()));
        }

        Ok(response.json::<Resp>().await?)
    }
}

#[async_trait]
impl AccountService for HttpAccountClient {
    async fn verify_account(
        &self,
        institution: &Institution,
        account: &str,
    ) -> Result<bool, ClientError> {
        let response: VerifyAccountResponse = self
            .post_json(
                institution,
                "/verify-account",
                &VerifyAccountRequest {
                    account_number: account,
                },
            )
            .await?;
        Ok(response.exists)
    }

    async fn authorize_transfer(
        &self,
        institution: &Institution,
        from_account: &str,
        amount_cents: i64,
        token: &str,
    ) -> Result<AuthorizationDecision, ClientError> {
        self.post_json(
            institution,
            "/authorize-transfer",
            &AuthorizeTransferRequest {
                from_account,
                amount_cents,
                token,
            },
        )
        .await
    }

    async fn debit(
        &self,
        institution: &Institution,
        account: &str,
        amount_cents: i64,
        transaction_id: Uuid,
    ) -> Result<MutationOutcome, ClientError> {
        self.post_json(
            institution,
            "/debit",
            &MutationRequest {
                account_number: account,
                amount_cents,
                transaction_id,
            },
        )
        .await
    }

    async fn credit(
        &self,
        institution: &Institution,
        account: &str,
        amount_cents: i64,
        transaction_id: Uuid,
    ) -> Result<MutationOutcome, ClientError> {
        self.post_json(
            institution,
            "/credit",
            &MutationRequest {
                account_number: account,
                amount_cents,
                transaction_id,
            },
        )
        .await
    }

    async fn probe(&self, institution: &Institution) -> bool {
        let url = format!("{}/", institution.base_url);
        match self
            .client
            .get(&url)
            .timeout(self.health_timeout)
            .send()
            .await
        {
            Ok(response) => response.status().is_success(),
            Err(_) => false,
        }
    }
}

/// In-memory stand-in for the account services, used by saga and health
/// tests.
#[cfg(test)]
pub mod mock {
    use super::*;
    use std::collections::{HashMap, HashSet};
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicU32, Ordering};

    /// One mock backing every configured institution. Accounts are keyed by
    /// their full reference, so the prefix decides which "institution" a
    /// call lands on without needing separate instances.
    ///
    /// Debit and credit honor the transaction-id idempotency contract: a
    /// replayed id reports success without touching the balance again.
    pub struct MockBank {
        accounts: Mutex<HashMap<String, i64>>,
        tokens: Mutex<HashMap<String, String>>,
        applied_debits: Mutex<HashSet<Uuid>>,
        applied_credits: Mutex<HashSet<Uuid>>,

        down: Mutex<HashSet<String>>,
        fail_debit: Mutex<bool>,
        /// Institutions whose credit endpoint always times out
        credit_timeouts_at: Mutex<HashSet<String>>,
        /// Next N credit calls time out without applying the mutation
        drop_credits: AtomicU32,
        /// Next N credit calls apply the mutation, then time out (the
        /// delivered-but-response-lost case)
        lose_credit_responses: AtomicU32,

        verify_calls: AtomicU32,
        authorize_calls: AtomicU32,
        debit_log: Mutex<Vec<(String, Uuid)>>,
        credit_log: Mutex<Vec<(String, Uuid)>>,
    }

    impl MockBank {
        pub fn new() -> Self {
            Self {
                accounts: Mutex::new(HashMap::new()),
                tokens: Mutex::new(HashMap::new()),
                applied_debits: Mutex::new(HashSet::new()),
                applied_credits: Mutex::new(HashSet::new()),
                down: Mutex::new(HashSet::new()),
                fail_debit: Mutex::new(false),
                credit_timeouts_at: Mutex::new(HashSet::new()),
                drop_credits: AtomicU32::new(0),
                lose_credit_responses: AtomicU32::new(0),
                verify_calls: AtomicU32::new(0),
                authorize_calls: AtomicU32::new(0),
                debit_log: Mutex::new(Vec::new()),
                credit_log: Mutex::new(Vec::new()),
            }
        }

        pub fn add_account(&self, account: &str, balance_cents: i64) {
            self.accounts
                .lock()
                .unwrap()
                .insert(account.to_string(), balance_cents);
        }

        pub fn add_token(&self, token: &str, account: &str) {
            self.tokens
                .lock()
                .unwrap()
                .insert(token.to_string(), account.to_string());
        }

        pub fn balance(&self, account: &str) -> i64 {
            *self.accounts.lock().unwrap().get(account).unwrap()
        }

        pub fn set_down(&self, institution_id: &str) {
            self.down.lock().unwrap().insert(institution_id.to_string());
        }

        pub fn set_fail_debit(&self, fail: bool) {
            *self.fail_debit.lock().unwrap() = fail;
        }

        pub fn time_out_credits_at(&self, institution_id: &str) {
            self.credit_timeouts_at
                .lock()
                .unwrap()
                .insert(institution_id.to_string());
        }

        pub fn drop_next_credits(&self, n: u32) {
            self.drop_credits.store(n, Ordering::SeqCst);
        }

        pub fn lose_next_credit_responses(&self, n: u32) {
            self.lose_credit_responses.store(n, Ordering::SeqCst);
        }

        pub fn verify_count(&self) -> u32 {
            self.verify_calls.load(Ordering::SeqCst)
        }

        pub fn authorize_count(&self) -> u32 {
            self.authorize_calls.load(Ordering::SeqCst)
        }

        pub fn debit_count(&self) -> usize {
            self.debit_log.lock().unwrap().len()
        }

        pub fn credit_calls_to(&self, institution_id: &str) -> usize {
            self.credit_log
                .lock()
                .unwrap()
                .iter()
                .filter(|(id, _)| id == institution_id)
                .count()
        }

        pub fn credit_log(&self) -> Vec<(String, Uuid)> {
            self.credit_log.lock().unwrap().clone()
        }

        fn apply_credit(&self, account: &str, amount_cents: i64, transaction_id: Uuid) -> MutationOutcome {
            let mut accounts = self.accounts.lock().unwrap();
            let Some(balance) = accounts.get_mut(account) else {
                return MutationOutcome {
                    success: false,
                    new_balance: None,
                    reason: Some("Account not found".to_string()),
                };
            };
            if self.applied_credits.lock().unwrap().insert(transaction_id) {
                *balance += amount_cents;
            }
            MutationOutcome {
                success: true,
                new_balance: Some(*balance),
                reason: None,
            }
        }
    }

    #[async_trait]
    impl AccountService for MockBank {
        async fn verify_account(
            &self,
            _institution: &Institution,
            account: &str,
        ) -> Result<bool, ClientError> {
            self.verify_calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.accounts.lock().unwrap().contains_key(account))
        }

        async fn authorize_transfer(
            &self,
            _institution: &Institution,
            from_account: &str,
            amount_cents: i64,
            token: &str,
        ) -> Result<AuthorizationDecision, ClientError> {
            self.authorize_calls.fetch_add(1, Ordering::SeqCst);

            let denied = |reason: &str| AuthorizationDecision {
                authorized: false,
                reason: Some(reason.to_string()),
            };

            let Some(token_account) = self.tokens.lock().unwrap().get(token).cloned() else {
                return Ok(denied("Invalid token"));
            };
            let Some(balance) = self.accounts.lock().unwrap().get(from_account).copied() else {
                return Ok(denied("Account not found"));
            };
            if token_account != from_account {
                return Ok(denied("Token does not match account"));
            }
            if balance < amount_cents {
                return Ok(denied("Insufficient funds"));
            }
            Ok(AuthorizationDecision {
                authorized: true,
                reason: None,
            })
        }

        async fn debit(
            &self,
            institution: &Institution,
            account: &str,
            amount_cents: i64,
            transaction_id: Uuid,
        ) -> Result<MutationOutcome, ClientError> {
            self.debit_log
                .lock()
                .unwrap()
                .push((institution.id.clone(), transaction_id));

            if *self.fail_debit.lock().unwrap() {
                return Ok(MutationOutcome {
                    success: false,
                    new_balance: None,
                    reason: Some("Insufficient funds".to_string()),
                });
            }

            let mut accounts = self.accounts.lock().unwrap();
            let Some(balance) = accounts.get_mut(account) else {
                return Ok(MutationOutcome {
                    success: false,
                    new_balance: None,
                    reason: Some("Account not found".to_string()),
                });
            };
            let mut applied = self.applied_debits.lock().unwrap();
            if !applied.contains(&transaction_id) {
                if *balance < amount_cents {
                    return Ok(MutationOutcome {
                        success: false,
                        new_balance: None,
                        reason: Some("Insufficient funds".to_string()),
                    });
                }
                *balance -= amount_cents;
                applied.insert(transaction_id);
            }
            Ok(MutationOutcome {
                success: true,
                new_balance: Some(*balance),
                reason: None,
            })
        }

        async fn credit(
            &self,
            institution: &Institution,
            account: &str,
            amount_cents: i64,
            transaction_id: Uuid,
        ) -> Result<MutationOutcome, ClientError> {
            self.credit_log
                .lock()
                .unwrap()
                .push((institution.id.clone(), transaction_id));

            if self
                .credit_timeouts_at
                .lock()
                .unwrap()
                .contains(&institution.id)
            {
                return Err(ClientError::Timeout);
            }

            if self
                .lose_credit_responses
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
                .is_ok()
            {
                self.apply_credit(account, amount_cents, transaction_id);
                return Err(ClientError::Timeout);
            }

            if self
                .drop_credits
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
                .is_ok()
            {
                return Err(ClientError::Timeout);
            }

            Ok(self.apply_credit(account, amount_cents, transaction_id))
        }

        async fn probe(&self, institution: &Institution) -> bool {
            !self.down.lock().unwrap().contains(&institution.id)
        }
    }
}
