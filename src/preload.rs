//! Preload: recognizing a submitter's own pending edit across requests.
//!
//! When someone reopens the edit form for a page they already submitted,
//! the form should show their queued text, not the live page. The preload id
//! ties the two requests together:
//!
//! 1. Logged-in users are recognized by account name. Nothing is stored.
//! 2. Anonymous users are recognized by a marker kept in their session. The
//!    marker is created lazily, the first time one of their edits is queued.
//!
//! Looking something up never creates a marker: a visitor who hasn't edited
//! has no pending edit, and gets no identity either.

use crate::{
    consequence::{Consequence, ConsequenceKind, ConsequenceManager},
    context::{ANON_ID_KEY, RequestContext},
    error::{ModerationError, Result},
    model::{Identity, PageIdentity, PendingEdit, PreloadId},
    storage::StorageError,
};

/// Finds the pending edit a submitter left on a page.
pub trait PendingEditLookup {
    fn find_pending_edit(
        &self,
        preload_id: &PreloadId,
        page: &PageIdentity,
    ) -> core::result::Result<Option<PendingEdit>, StorageError>;
}

/// Computes preload ids for one request and finds the matching pending edit.
pub struct PreloadResolver<'a> {
    lookup: &'a dyn PendingEditLookup,
    manager: &'a dyn ConsequenceManager,
    context: Option<RequestContext>,
}

impl<'a> PreloadResolver<'a> {
    pub fn new(lookup: &'a dyn PendingEditLookup, manager: &'a dyn ConsequenceManager) -> Self {
        Self {
            lookup,
            manager,
            context: None,
        }
    }

    /// Binds the request to resolve against. Without a binding, each call
    /// reads the thread's main context once.
    #[must_use]
    pub fn with_context(mut self, context: RequestContext) -> Self {
        self.context = Some(context);
        self
    }

    /// Returns the current submitter's preload id.
    ///
    /// For an anonymous submitter without a marker, `create` decides between
    /// `None` and generating (and remembering) a new marker.
    pub fn get_id(&self, create: bool) -> Result<Option<PreloadId>> {
        let context = self.context()?;

        match &context.identity {
            Identity::Registered { name } => Ok(Some(PreloadId::for_user(name))),
            Identity::Anonymous { .. } => {
                if let Some(marker) = context
                    .session
                    .get(ANON_ID_KEY)
                    .filter(|m| !m.is_empty())
                {
                    return Ok(Some(PreloadId::for_anonymous(&marker)));
                }
                if !create {
                    return Ok(None);
                }

                let marker = self
                    .manager
                    .add(Consequence::RememberAnonId)?
                    .into_token()
                    .ok_or(ModerationError::UnexpectedOutcome {
                        kind: ConsequenceKind::RememberAnonId,
                    })?;
                context.session.set(ANON_ID_KEY, &marker);
                Ok(Some(PreloadId::for_anonymous(&marker)))
            }
        }
    }

    /// Finds the current submitter's pending edit of `page`.
    ///
    /// Submitters without a preload id have nothing pending; the lookup is
    /// skipped for them.
    pub fn find_pending_edit(&self, page: &PageIdentity) -> Result<Option<PendingEdit>> {
        let Some(preload_id) = self.get_id(false)? else {
            return Ok(None);
        };
        Ok(self.lookup.find_pending_edit(&preload_id, page)?)
    }

    fn context(&self) -> Result<RequestContext> {
        self.context
            .clone()
            .or_else(RequestContext::main)
            .ok_or(ModerationError::NoRequestContext)
    }
}
