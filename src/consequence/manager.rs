//! Consequence managers: the single gate through which effects pass.

use crate::{context::RequestContext, error::Result, storage::Storage};

use super::{Consequence, Outcome};

/// Accepts consequences one at a time, in order, and returns each result.
///
/// Implementations must finish one consequence before accepting the next.
pub trait ConsequenceManager {
    fn add(&self, consequence: Consequence) -> Result<Outcome>;
}

/// Runs consequences against real storage.
///
/// Errors from a consequence are returned as-is: no retry, no rollback of
/// consequences that already ran.
pub struct RealManager<'a> {
    storage: &'a Storage,
    context: Option<RequestContext>,
}

impl<'a> RealManager<'a> {
    pub fn new(storage: &'a Storage) -> Self {
        Self {
            storage,
            context: None,
        }
    }

    /// Binds the request whose session consequences may need.
    #[must_use]
    pub fn with_context(mut self, context: RequestContext) -> Self {
        self.context = Some(context);
        self
    }

    pub fn storage(&self) -> &'a Storage {
        self.storage
    }

    /// The bound request context, else the thread's main context.
    pub fn context(&self) -> Option<RequestContext> {
        self.context.clone().or_else(RequestContext::main)
    }
}

impl ConsequenceManager for RealManager<'_> {
    fn add(&self, consequence: Consequence) -> Result<Outcome> {
        tracing::debug!(consequence = %consequence.kind(), "running consequence");
        consequence.run(self)
    }
}
