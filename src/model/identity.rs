//! Submitter identity as reported by the host platform.

use serde::{Deserialize, Serialize};

/// Who is acting: a logged-in account or an anonymous visitor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum Identity {
    /// A logged-in account.
    Registered { name: String },

    /// An anonymous visitor, known only by address.
    Anonymous { ip: String },
}

impl Identity {
    pub fn registered(name: impl Into<String>) -> Self {
        Self::Registered { name: name.into() }
    }

    pub fn anonymous(ip: impl Into<String>) -> Self {
        Self::Anonymous { ip: ip.into() }
    }

    pub fn is_logged_in(&self) -> bool {
        matches!(self, Self::Registered { .. })
    }

    /// Display name: the account name, or the address for anonymous visitors.
    pub fn name(&self) -> &str {
        match self {
            Self::Registered { name } => name,
            Self::Anonymous { ip } => ip,
        }
    }
}
