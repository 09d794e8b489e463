//! Directory resolver: maps account references to their owning institution.
//!
//! An account reference carries a structural prefix (e.g. `BANK1...`) that
//! names the institution holding the account. The mapping from prefix to
//! network address is static after startup, so resolution is a pure lookup
//! with no locking.

use crate::config::Config;
use url::Url;

/// A configured account-holding institution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Institution {
    /// Short identifier, also the account-reference prefix (e.g. "BANK1")
    pub id: String,

    /// Base URL of the institution's account service
    pub base_url: String,
}

/// Routing failure for an account reference.
#[derive(Debug, Clone, thiserror::Error)]
pub enum RoutingError {
    #[error("no institution recognizes account '{0}'")]
    Unrecognized(String),
}

/// Static prefix table driving account-reference routing.
pub struct Directory {
    institutions: Vec<Institution>,
}

impl Directory {
    /// Build the directory from configuration, validating each base URL.
    pub fn from_config(config: &Config) -> anyhow::Result<Self> {
        Self::new(vec![
            ("BANK1", config.bank1_url.clone()),
            ("BANK2", config.bank2_url.clone()),
        ])
    }

    pub(crate) fn new(entries: Vec<(&str, String)>) -> anyhow::Result<Self> {
        let mut institutions = Vec::with_capacity(entries.len());
        for (id, base_url) in entries {
            Url::parse(&base_url)
                .map_err(|e| anyhow::anyhow!("invalid base URL for {}: {}", id, e))?;
            institutions.push(Institution {
                id: id.to_string(),
                base_url: base_url.trim_end_matches('/').to_string(),
            });
        }
        Ok(Self { institutions })
    }

    /// Resolve an account reference to its owning institution.
    ///
    /// The longest matching prefix wins, so overlapping prefixes cannot make
    /// resolution ambiguous.
    pub fn resolve(&self, account: &str) -> Result<&Institution, RoutingError> {
        self.institutions
            .iter()
            .filter(|inst| account.starts_with(&inst.id))
            .max_by_key(|inst| inst.id.len())
            .ok_or_else(|| RoutingError::Unrecognized(account.to_string()))
    }

    /// All configured institutions, for health probing and diagnostics.
    pub fn institutions(&self) -> &[Institution] {
        &self.institutions
    }
}
