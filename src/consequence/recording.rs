//! Recording manager: stores consequences instead of running them.
//!
//! Used by tests to assert which effects were requested, and by the CLI's
//! dry-run mode to show them.

use std::{cell::RefCell, collections::HashMap};

use crate::error::Result;

use super::{Consequence, ConsequenceKind, ConsequenceManager, Outcome};

/// Appends every consequence to a log and answers with canned results.
#[derive(Debug, Default)]
pub struct RecordingManager {
    consequences: RefCell<Vec<Consequence>>,
    results: RefCell<HashMap<ConsequenceKind, Outcome>>,
}

impl RecordingManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Result returned for every later consequence of `kind`.
    ///
    /// Unregistered kinds yield [`Outcome::None`].
    pub fn mock_result(&self, kind: ConsequenceKind, outcome: Outcome) {
        self.results.borrow_mut().insert(kind, outcome);
    }

    /// Everything recorded so far, in submission order.
    pub fn consequences(&self) -> Vec<Consequence> {
        self.consequences.borrow().clone()
    }
}

impl ConsequenceManager for RecordingManager {
    fn add(&self, consequence: Consequence) -> Result<Outcome> {
        let outcome = self
            .results
            .borrow()
            .get(&consequence.kind())
            .cloned()
            .unwrap_or_default();
        self.consequences.borrow_mut().push(consequence);
        Ok(outcome)
    }
}
