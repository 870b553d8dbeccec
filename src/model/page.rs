//! Page identity: the (namespace, title) pair a pending entry belongs to.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Identifies a page on the host platform.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PageIdentity {
    pub namespace: i32,
    pub title: String,
}

impl PageIdentity {
    pub fn new(namespace: i32, title: impl Into<String>) -> Self {
        Self {
            namespace,
            title: title.into(),
        }
    }
}

impl fmt::Display for PageIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.namespace == 0 {
            write!(f, "{}", self.title)
        } else {
            write!(f, "{}:{}", self.namespace, self.title)
        }
    }
}
