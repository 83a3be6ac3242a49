//! # Identity Context
//!
//! The already-authenticated caller of every engine operation: which tenant,
//! which actor, and which capabilities the upstream authorizer granted.
//! Nothing in the engine reads tenant or user from ambient state.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

use crate::error::ValidationError;

/// A capability granted by the upstream authorizer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Capability {
    /// Delta and full export.
    SyncData,
    /// Bulk ingestion of offline transactions.
    SyncTransactions,
    /// Full export (in addition to `sync_data`).
    FullSync,
    ResolveConflicts,
    /// Sync housekeeping such as conflict cleanup.
    ManageSync,
}

impl Capability {
    pub const ALL: [Capability; 5] = [
        Capability::SyncData,
        Capability::SyncTransactions,
        Capability::FullSync,
        Capability::ResolveConflicts,
        Capability::ManageSync,
    ];

    pub const fn as_str(&self) -> &'static str {
        match self {
            Capability::SyncData => "sync_data",
            Capability::SyncTransactions => "sync_transactions",
            Capability::FullSync => "full_sync",
            Capability::ResolveConflicts => "resolve_conflicts",
            Capability::ManageSync => "manage_sync",
        }
    }
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Capability {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let name = s.trim();
        Self::ALL
            .iter()
            .copied()
            .find(|c| c.as_str() == name)
            .ok_or_else(|| ValidationError::NotAllowed {
                field: format!("capability '{}'", name),
                allowed: Self::ALL.iter().map(|c| c.as_str().to_string()).collect(),
            })
    }
}

/// `(tenant, actor, capabilities)` for one call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdentityContext {
    pub tenant_id: String,
    pub actor_id: String,
    pub capabilities: HashSet<Capability>,
}

impl IdentityContext {
    /// A context with no capabilities.
    pub fn new(tenant_id: impl Into<String>, actor_id: impl Into<String>) -> Self {
        IdentityContext {
            tenant_id: tenant_id.into(),
            actor_id: actor_id.into(),
            capabilities: HashSet::new(),
        }
    }

    pub fn with_capability(mut self, capability: Capability) -> Self {
        self.capabilities.insert(capability);
        self
    }

    pub fn with_capabilities(mut self, capabilities: impl IntoIterator<Item = Capability>) -> Self {
        self.capabilities.extend(capabilities);
        self
    }

    /// A context holding every capability.
    pub fn with_all_capabilities(self) -> Self {
        self.with_capabilities(Capability::ALL)
    }

    #[inline]
    pub fn has(&self, capability: Capability) -> bool {
        self.capabilities.contains(&capability)
    }

    /// Returns the first capability in `required` the caller lacks.
    pub fn missing<'a>(&self, required: &'a [Capability]) -> Option<&'a Capability> {
        required.iter().find(|c| !self.has(**c))
    }
}
