//! Shared application state handed to every handler via axum's `State`.

use crate::directory::Directory;
use crate::ledger::TransactionLedger;
use crate::services::health_service::HealthMonitor;
use crate::services::transfer_service::TransferOrchestrator;
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub directory: Arc<Directory>,
    pub orchestrator: Arc<TransferOrchestrator>,
    pub ledger: Arc<TransactionLedger>,
    pub health: Arc<HealthMonitor>,
}
