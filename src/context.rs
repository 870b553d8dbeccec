//! Request context: who is acting and which session they carry.
//!
//! Components take a context explicitly. For hosts that keep one "current
//! request" around, a context can be installed as the thread's main context;
//! components fall back to it only when nothing was bound.

use std::{cell::RefCell, collections::HashMap, rc::Rc};

use crate::model::Identity;

/// Session key under which an anonymous submitter's marker is kept.
pub const ANON_ID_KEY: &str = "anon_id";

thread_local! {
    static MAIN: RefCell<Option<RequestContext>> = const { RefCell::new(None) };
}

/// Session data of one visitor. Clones share the same values.
#[derive(Debug, Clone, Default)]
pub struct Session {
    values: Rc<RefCell<HashMap<String, String>>>,
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_values(values: HashMap<String, String>) -> Self {
        Self {
            values: Rc::new(RefCell::new(values)),
        }
    }

    pub fn get(&self, key: &str) -> Option<String> {
        self.values.borrow().get(key).cloned()
    }

    pub fn set(&self, key: &str, value: &str) {
        self.values
            .borrow_mut()
            .insert(key.to_string(), value.to_string());
    }

    /// Snapshot of all values, for persisting.
    pub fn values(&self) -> HashMap<String, String> {
        self.values.borrow().clone()
    }
}

/// The identity and session of the request being served.
#[derive(Debug, Clone)]
pub struct RequestContext {
    pub identity: Identity,
    pub session: Session,
}

impl RequestContext {
    pub fn new(identity: Identity, session: Session) -> Self {
        Self { identity, session }
    }

    /// Installs this context as the thread's main context, replacing any
    /// previous one.
    pub fn install_main(self) {
        MAIN.with(|main| *main.borrow_mut() = Some(self));
    }

    /// The thread's main context, if one was installed.
    pub fn main() -> Option<Self> {
        MAIN.with(|main| main.borrow().clone())
    }
}
