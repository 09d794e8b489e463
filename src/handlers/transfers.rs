//! Transfer HTTP handlers.
//!
//! This module implements the gateway's transfer endpoints:
//! - POST /transfer - Submit a cross-institution transfer
//! - GET /transaction/{id} - Get one transaction record
//! - GET /transactions - List all transaction records (diagnostic)
//! - GET /transactions/pending - List records awaiting reconciliation

use crate::{
    error::GatewayError,
    models::transfer::{TransactionRecord, TransferRequest, TransferResponse},
    state::AppState,
};
use axum::{
    Json,
    extract::{Path, State},
};
use serde::Serialize;
use uuid::Uuid;

/// Submit a transfer between two accounts, same institution or not.
///
/// The saga outcome, including failures, is reported in the response body
/// with the minted transaction id and a status, so HTTP errors are reserved
/// for requests rejected before an intent was accepted.
///
/// # Request Body
///
/// ```json
/// {
///   "from_account": "BANK1A1B2C3D4",
///   "to_account": "BANK2E5F6A7B8",
///   "amount_cents": 120000,
///   "token": "<bearer token from the sender's institution>",
///   "description": "Invoice 42"
/// }
/// ```
pub async fn create_transfer(
    State(state): State<AppState>,
    Json(request): Json<TransferRequest>,
) -> Result<Json<TransferResponse>, GatewayError> {
    let record = state.orchestrator.submit(request).await?;
    Ok(Json(TransferResponse::from(&record)))
}

/// Get a transaction record by id.
pub async fn get_transaction(
    State(state): State<AppState>,
    Path(transaction_id): Path<Uuid>,
) -> Result<Json<TransactionRecord>, GatewayError> {
    state
        .ledger
        .get(transaction_id)
        .map(Json)
        .ok_or(GatewayError::TransactionNotFound)
}

#[derive(Debug, Serialize)]
pub struct TransactionListResponse {
    pub transactions: Vec<TransactionRecord>,
}

/// List all transaction records, newest first.
pub async fn list_transactions(State(state): State<AppState>) -> Json<TransactionListResponse> {
    Json(TransactionListResponse {
        transactions: state.ledger.list(),
    })
}

/// List records still awaiting compensation, for operator reconciliation.
pub async fn list_pending_transactions(
    State(state): State<AppState>,
) -> Json<TransactionListResponse> {
    Json(TransactionListResponse {
        transactions: state.ledger.pending_reconciliation(),
    })
}
