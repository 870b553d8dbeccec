//! An edit attempt as handed over by the host's save pipeline.

use serde::{Deserialize, Serialize};

use super::{Content, Identity, PageIdentity};

/// Everything known about one attempt to save a page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EditAttempt {
    pub page: PageIdentity,
    pub identity: Identity,
    pub content: Content,
    pub summary: String,

    /// Section id ("2", "new", ...) for section edits; empty otherwise.
    pub section: String,

    /// New text of just the edited section. Not persisted: the queued
    /// entry keeps the full page text.
    pub section_text: String,
    pub bot: bool,
    pub minor: bool,
}
