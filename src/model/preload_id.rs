//! Preload ids: stable per-submitter tokens used to find "my pending edit".
//!
//! The first character says where the rest came from:
//!
//! - `[` followed by the account name, for logged-in users.
//! - `]` followed by the session marker, for anonymous users.
//!
//! A user who logs in mid-session gets a different token, which is the point:
//! an anonymous edit stays with the anonymous session.

use std::fmt;

use serde::{Deserialize, Serialize};

const REGISTERED_PREFIX: char = '[';
const ANONYMOUS_PREFIX: char = ']';

/// A discriminator-prefixed submitter token.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PreloadId(String);

impl PreloadId {
    /// Token for a logged-in user, derived from the account name.
    pub fn for_user(name: &str) -> Self {
        Self(format!("{REGISTERED_PREFIX}{name}"))
    }

    /// Token for an anonymous user, wrapping the session marker.
    pub fn for_anonymous(marker: &str) -> Self {
        Self(format!("{ANONYMOUS_PREFIX}{marker}"))
    }

    /// Rebuilds a token read back from storage.
    pub fn from_stored(raw: String) -> Self {
        Self(raw)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PreloadId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn user_token_uses_bracket_prefix() {
        let id = PreloadId::for_user("Alice");
        assert_eq!(id.as_str(), "[Alice");
    }

    #[test]
    fn anonymous_token_uses_closing_bracket_prefix() {
        let id = PreloadId::for_anonymous("XYZ");
        assert_eq!(id.as_str(), "]XYZ");
    }

    #[test]
    fn user_named_like_marker_does_not_collide() {
        assert_ne!(PreloadId::for_user("XYZ"), PreloadId::for_anonymous("XYZ"));
    }
}
