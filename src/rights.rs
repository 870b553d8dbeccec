//! Moderation rights: who and what skips the queue.

use serde::Deserialize;

use crate::{intercept::BypassCheck, model::Identity};

/// Bypass rules read from the `[moderation]` config table.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct ModerationRights {
    /// Accounts whose edits are never queued.
    pub automoderated: Vec<String>,

    /// Namespaces where nobody's edits are queued.
    pub unmoderated_namespaces: Vec<i32>,
}

impl BypassCheck for ModerationRights {
    fn can_bypass(&self, identity: &Identity, namespace: i32) -> bool {
        if self.unmoderated_namespaces.contains(&namespace) {
            return true;
        }
        match identity {
            Identity::Registered { name } => self.automoderated.iter().any(|a| a == name),
            Identity::Anonymous { .. } => false,
        }
    }
}
