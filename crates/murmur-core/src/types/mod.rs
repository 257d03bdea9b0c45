//! # Core Type Definitions
//!
//! This module contains the shared types for the Murmur social core:
//! - Record identifiers (`UserId`, `PostId`, `CommentId`)
//! - Normalized string wrappers (`Username`, `Email`)
//! - Error types (`SocialError`)
//!
//! ## Determinism Guarantees
//!
//! All types in this module implement `Ord` for deterministic ordering in
//! `BTreeMap`/`BTreeSet`. Identifiers are plain `u64` counters allocated by
//! the store, never random.

use serde::{Deserialize, Serialize};
use thiserror::Error;

// =============================================================================
// RECORD IDENTIFIERS
// =============================================================================

/// Unique identifier for a registered user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct UserId(pub u64);

/// Unique identifier for a post.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct PostId(pub u64);

/// Identifier for a comment, unique within its containing post.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct CommentId(pub u64);

// =============================================================================
// NORMALIZED STRING WRAPPERS
// =============================================================================

/// A username. Stored exactly as entered after trimming; comparisons are
/// case-sensitive.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Username(pub String);

impl Username {
    /// Create a new username, trimming surrounding whitespace.
    #[must_use]
    pub fn new(s: impl AsRef<str>) -> Self {
        Self(s.as_ref().trim().to_string())
    }

    /// Get the username as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// A username must be non-empty after trimming.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        !self.0.is_empty()
    }
}

impl std::fmt::Display for Username {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// An email address, normalized to lowercase at construction.
///
/// Uniqueness checks and login lookups are therefore case-insensitive.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Email(pub String);

impl Email {
    /// Create a new email, trimming whitespace and lowercasing.
    #[must_use]
    pub fn new(s: impl AsRef<str>) -> Self {
        Self(s.as_ref().trim().to_lowercase())
    }

    /// Get the email as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Minimal shape check: something before `@`, a dot somewhere after it.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        match self.0.split_once('@') {
            Some((local, domain)) => !local.is_empty() && domain.contains('.'),
            None => false,
        }
    }
}

impl std::fmt::Display for Email {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

// =============================================================================
// ERROR TYPES
// =============================================================================

/// Errors that can occur in the Murmur core.
///
/// Each variant corresponds to exactly one HTTP status at the API boundary:
/// `Validation` 400, `Authentication` 401, `Forbidden` 403, `NotFound` 404,
/// `Conflict` 409, `Serialization`/`Io` 500.
#[derive(Debug, Error)]
pub enum SocialError {
    /// Missing or malformed input.
    #[error("{0}")]
    Validation(String),

    /// Absent or invalid credentials. Deliberately carries no detail so an
    /// unknown email and a wrong password are indistinguishable.
    #[error("Invalid email or password")]
    Authentication,

    /// Authenticated but not permitted to perform the operation.
    #[error("{0}")]
    Forbidden(String),

    /// The referenced entity does not exist.
    #[error("{0} not found")]
    NotFound(&'static str),

    /// A uniqueness constraint would be violated.
    #[error("{0}")]
    Conflict(String),

    /// A serialization or deserialization error occurred.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// An I/O or storage error occurred.
    #[error("I/O error: {0}")]
    Io(String),
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn username_trims_whitespace() {
        let name = Username::new("  alice ");
        assert_eq!(name.as_str(), "alice");
        assert!(name.is_valid());
    }

    #[test]
    fn username_blank_is_invalid() {
        assert!(!Username::new("   ").is_valid());
    }

    #[test]
    fn email_normalizes_to_lowercase() {
        let email = Email::new(" A@X.Com ");
        assert_eq!(email.as_str(), "a@x.com");
        assert!(email.is_valid());
    }

    #[test]
    fn email_shape_check() {
        assert!(Email::new("a@x.com").is_valid());
        assert!(!Email::new("ax.com").is_valid());
        assert!(!Email::new("@x.com").is_valid());
        assert!(!Email::new("a@xcom").is_valid());
    }

    #[test]
    fn error_messages_map_one_to_one() {
        assert_eq!(SocialError::NotFound("User").to_string(), "User not found");
        assert_eq!(
            SocialError::Authentication.to_string(),
            "Invalid email or password"
        );
    }
}
