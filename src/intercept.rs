//! Edit interception: deciding whether an edit is saved or queued.
//!
//! For each edit attempt, in order:
//!
//! 1. A user who can bypass moderation in the namespace saves normally.
//! 2. Any registered hook may veto interception; the edit then saves normally.
//! 3. Non-text content always saves normally.
//! 4. Otherwise a single `QueueEdit` consequence is emitted and the caller is
//!    redirected to the "queued" notice instead of saving.
//!
//! The merge path lives here too: when a moderator saves a revision that
//! resolves a queued entry, the entry is marked merged and the merge recorded.

use std::collections::BTreeMap;

use serde_json::{Map, Value, json};

use crate::{
    consequence::{Consequence, ConsequenceManager},
    error::{ModerationError, Result},
    model::{Content, EditAttempt, Identity, LogAction, PageIdentity},
    storage::UpsertOutcome,
};

/// Capability check: may `identity` skip moderation in `namespace`?
pub trait BypassCheck {
    fn can_bypass(&self, identity: &Identity, namespace: i32) -> bool;
}

/// Answer of a [`EditHook::before_intercept`] hook.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HookVerdict {
    Continue,

    /// Let this edit bypass moderation.
    Veto,
}

/// Where the "continue editing" link of the queued notice should point.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReturnTo {
    pub page: String,
    /// Query parameters, in the order the hook gave them.
    pub query: Vec<(String, String)>,
}

/// Extension points consulted during interception. Both default to no-ops.
pub trait EditHook {
    fn before_intercept(&self, _attempt: &EditAttempt) -> HookVerdict {
        HookVerdict::Continue
    }

    fn continue_editing_link(
        &self,
        _page: &PageIdentity,
        _identity: &Identity,
    ) -> Option<ReturnTo> {
        None
    }
}

/// Redirect issued after an edit was queued.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Redirect {
    pub page: PageIdentity,
    pub return_to: Option<ReturnTo>,
}

impl Redirect {
    /// Query parameters of the redirect: `modqueued=1`, and `returnto` as
    /// JSON `[page, {query}]` when a hook overrode it.
    pub fn query(&self) -> Vec<(String, String)> {
        let mut query = vec![("modqueued".to_string(), "1".to_string())];
        if let Some(return_to) = &self.return_to {
            let params: Map<String, Value> = return_to
                .query
                .iter()
                .map(|(k, v)| (k.clone(), Value::from(v.as_str())))
                .collect();
            query.push((
                "returnto".to_string(),
                json!([return_to.page, params]).to_string(),
            ));
        }
        query
    }
}

/// What happened to an edit attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EditOutcome {
    /// Not moderated: the host should save the edit as usual.
    Bypassed,

    /// Queued. `entry` is the upsert result when the manager ran the effect.
    Queued {
        redirect: Redirect,
        entry: Option<UpsertOutcome>,
    },
}

/// Intercepts edit attempts on behalf of the host's save pipeline.
pub struct EditInterceptor<'a> {
    rights: &'a dyn BypassCheck,
    manager: &'a dyn ConsequenceManager,
    hooks: Vec<Box<dyn EditHook + 'a>>,
}

impl<'a> EditInterceptor<'a> {
    pub fn new(rights: &'a dyn BypassCheck, manager: &'a dyn ConsequenceManager) -> Self {
        Self {
            rights,
            manager,
            hooks: Vec::new(),
        }
    }

    /// Registers a hook. Hooks are consulted in registration order.
    #[allow(dead_code)]
    #[must_use]
    pub fn with_hook(mut self, hook: impl EditHook + 'a) -> Self {
        self.hooks.push(Box::new(hook));
        self
    }

    pub fn intercept(&self, attempt: EditAttempt) -> Result<EditOutcome> {
        if self
            .rights
            .can_bypass(&attempt.identity, attempt.page.namespace)
        {
            tracing::debug!(page = %attempt.page, "submitter bypasses moderation");
            return Ok(EditOutcome::Bypassed);
        }

        if self
            .hooks
            .iter()
            .any(|h| h.before_intercept(&attempt) == HookVerdict::Veto)
        {
            tracing::debug!(page = %attempt.page, "hook vetoed interception");
            return Ok(EditOutcome::Bypassed);
        }

        if let Content::Other { model } = &attempt.content {
            tracing::debug!(
                page = %attempt.page,
                model = model.as_str(),
                "non-text content is not moderated"
            );
            return Ok(EditOutcome::Bypassed);
        }

        let page = attempt.page.clone();
        let identity = attempt.identity.clone();
        let entry = self.manager.add(Consequence::QueueEdit(attempt))?.upsert();

        let return_to = self
            .hooks
            .iter()
            .find_map(|h| h.continue_editing_link(&page, &identity));

        Ok(EditOutcome::Queued {
            redirect: Redirect { page, return_to },
            entry,
        })
    }

    /// Records that revision `rev_id` merged pending entry `mod_id`.
    pub fn on_merge_saved(
        &self,
        mod_id: i64,
        rev_id: i64,
        moderator: &Identity,
        page: &PageIdentity,
    ) -> Result<()> {
        record_merge(self.manager, mod_id, rev_id, moderator, page)
    }
}

/// Emits, in order: mark-merged, then (only if that succeeded) the merge
/// log entry, pending-time invalidation, and the merged tag on the revision.
pub fn record_merge(
    manager: &dyn ConsequenceManager,
    mod_id: i64,
    rev_id: i64,
    moderator: &Identity,
    page: &PageIdentity,
) -> Result<()> {
    let marked = manager
        .add(Consequence::MarkAsMerged { mod_id, rev_id })?
        .flag()
        .unwrap_or(false);
    if !marked {
        return Err(ModerationError::EntryNotFound(mod_id));
    }

    manager.add(Consequence::AddLogEntry {
        action: LogAction::Merge,
        actor: moderator.clone(),
        page: page.clone(),
        params: BTreeMap::from([
            ("modid".to_string(), json!(mod_id)),
            ("revid".to_string(), json!(rev_id)),
        ]),
    })?;
    manager.add(Consequence::InvalidatePendingTimeCache)?;
    manager.add(Consequence::TagRevisionAsMerged { rev_id })?;

    tracing::info!(mod_id, rev_id, moderator = moderator.name(), "entry merged");
    Ok(())
}
