//! Queueing an intercepted edit.

use jiff::Timestamp;

use crate::{
    context::RequestContext,
    error::{ModerationError, Result},
    model::{Content, EditAttempt, EntryType, PendingEntryFields},
    preload::PreloadResolver,
};

use super::{Consequence, ConsequenceKind, ConsequenceManager, Outcome, RealManager};

/// Resolves the submitter's preload id (creating an anonymous marker if
/// needed), then upserts the entry through the same manager.
pub(super) fn run(attempt: &EditAttempt, manager: &RealManager<'_>) -> Result<Outcome> {
    let text = match &attempt.content {
        Content::Text { text, .. } => text.clone(),
        Content::Other { model } => return Err(ModerationError::NonTextContent(model.clone())),
    };

    // The submitter's own session, whatever identity the request was opened with.
    let session = manager
        .context()
        .ok_or(ModerationError::NoRequestContext)?
        .session;
    let resolver = PreloadResolver::new(manager.storage(), manager)
        .with_context(RequestContext::new(attempt.identity.clone(), session));
    let preload_id = resolver
        .get_id(true)?
        .ok_or(ModerationError::UnexpectedOutcome {
            kind: ConsequenceKind::RememberAnonId,
        })?;

    let fields = PendingEntryFields {
        page: attempt.page.clone(),
        preload_id,
        entry_type: EntryType::Edit,
        submitter: attempt.identity.name().to_string(),
        anonymous: !attempt.identity.is_logged_in(),
        text,
        summary: attempt.summary.clone(),
        section: attempt.section.clone(),
        bot: attempt.bot,
        minor: attempt.minor,
        timestamp: Timestamp::now(),
    };

    let outcome = manager.add(Consequence::InsertRowIntoModerationTable { fields })?;
    let upsert = outcome.upsert().ok_or(ModerationError::UnexpectedOutcome {
        kind: ConsequenceKind::InsertRowIntoModerationTable,
    })?;
    manager.add(Consequence::InvalidatePendingTimeCache)?;

    tracing::info!(
        mod_id = upsert.id,
        page = %attempt.page,
        submitter = attempt.identity.name(),
        updated = upsert.is_update(),
        "edit queued for moderation"
    );
    Ok(Outcome::Upsert(upsert))
}
