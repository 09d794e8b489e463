//! Reachability monitoring for the configured account services.
//!
//! Diagnostic only: saga execution never consults a probe on its correctness
//! path. The one operational coupling is the compensation loop, which asks
//! whether the receiver is reachable before spending a credit retry on it.

use crate::directory::{Directory, Institution};
use crate::services::account_client::AccountService;
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Probe verdict for a single institution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum InstitutionHealth {
    Connected,
    Disconnected,
}

pub struct HealthMonitor {
    directory: Arc<Directory>,
    accounts: Arc<dyn AccountService>,
}

impl HealthMonitor {
    pub fn new(directory: Arc<Directory>, accounts: Arc<dyn AccountService>) -> Self {
        Self {
            directory,
            accounts,
        }
    }

    /// Probe every configured institution.
    pub async fn check_all(&self) -> BTreeMap<String, InstitutionHealth> {
        let mut report = BTreeMap::new();
        for institution in self.directory.institutions() {
            let health = if self.accounts.probe(institution).await {
                InstitutionHealth::Connected
            } else {
                tracing::warn!(institution = %institution.id, "Institution unreachable");
                InstitutionHealth::Disconnected
            };
            report.insert(institution.id.clone(), health);
        }
        report
    }

    /// Single-institution probe, used to defer compensation retries.
    pub async fn is_reachable(&self, institution: &Institution) -> bool {
        self.accounts.probe(institution).await
    }
}
