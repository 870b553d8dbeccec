//! Edit content handed over by the host's save pipeline.

use serde::{Deserialize, Serialize};

/// The new content of a page.
///
/// Only text content can be queued. Anything else (structured discussion
/// boards and the like) passes through to the host unmoderated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum Content {
    Text { model: String, text: String },
    Other { model: String },
}

impl Content {
    /// Wikitext content, the common case.
    #[cfg(test)]
    pub fn wikitext(text: impl Into<String>) -> Self {
        Self::Text {
            model: "wikitext".into(),
            text: text.into(),
        }
    }
}
