use crate::core::Dbid;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Per-call reconciliation settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReconcileOptions {
    /// Dbids that must be removed and re-added even if their record is unchanged
    /// (e.g. mirrors undergoing a full resynchronization).
    #[serde(default)]
    pub force_remove_and_add: BTreeSet<Dbid>,

    /// Allows adding or removing primaries (expansion workflows only).
    #[serde(default)]
    pub authorized_primary_changes: bool,

    /// Connected to the coordinator in utility mode.
    #[serde(default)]
    pub utility_mode: bool,

    /// Run the per-host port / data directory conflict check on the result.
    #[serde(default = "default_check_host_conflicts")]
    pub check_host_conflicts: bool,
}

fn default_check_host_conflicts() -> bool {
    true
}

impl Default for ReconcileOptions {
    fn default() -> Self {
        Self {
            force_remove_and_add: BTreeSet::new(),
            authorized_primary_changes: false,
            utility_mode: false,
            check_host_conflicts: default_check_host_conflicts(),
        }
    }
}

impl ReconcileOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Force `dbid` through remove-and-add
    pub fn force_remove_and_add(mut self, dbid: Dbid) -> Self {
        self.force_remove_and_add.insert(dbid);
        self
    }

    pub fn authorize_primary_changes(mut self, authorized: bool) -> Self {
        self.authorized_primary_changes = authorized;
        self
    }

    pub fn utility_mode(mut self, utility_mode: bool) -> Self {
        self.utility_mode = utility_mode;
        self
    }

    pub fn check_host_conflicts(mut self, enabled: bool) -> Self {
        self.check_host_conflicts = enabled;
        self
    }
}
