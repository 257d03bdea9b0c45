//! # Identity Records
//!
//! The user account record and its outward projections, plus password
//! hashing.
//!
//! The raw `User` record carries the Argon2id credential hash and never
//! crosses the API boundary; handlers project it through [`UserSummary`],
//! [`PublicProfile`], or explicit response types instead.

use crate::primitives::DEFAULT_AVATAR;
use crate::types::{Email, SocialError, UserId, Username};
use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// =============================================================================
// USER RECORD
// =============================================================================

/// A registered user account as persisted by the stores.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    /// Store-allocated identifier.
    pub id: UserId,
    /// Unique, case-sensitive.
    pub username: Username,
    /// Unique, case-insensitive (normalized to lowercase).
    pub email: Email,
    /// Argon2id hash in PHC string format. The clear secret is never stored.
    pub password_hash: String,
    /// Path or URL of the avatar image.
    pub avatar: String,
    /// Short free-text bio, possibly empty.
    pub bio: String,
    /// Registration time.
    pub created_at: DateTime<Utc>,
}

impl User {
    /// Create a new user record with default avatar and empty bio.
    #[must_use]
    pub fn new(id: UserId, username: Username, email: Email, password_hash: String) -> Self {
        Self {
            id,
            username,
            email,
            password_hash,
            avatar: DEFAULT_AVATAR.to_string(),
            bio: String::new(),
            created_at: Utc::now(),
        }
    }

    /// Project into the summary shape embedded in posts and follow lists.
    #[must_use]
    pub fn summary(&self) -> UserSummary {
        UserSummary {
            id: self.id,
            username: self.username.as_str().to_string(),
            avatar: self.avatar.clone(),
            bio: self.bio.clone(),
        }
    }
}

// =============================================================================
// OUTWARD PROJECTIONS
// =============================================================================

/// The short user shape joined into posts, comments, and follow lists.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserSummary {
    pub id: UserId,
    pub username: String,
    pub avatar: String,
    pub bio: String,
}

/// The public profile view, including derived content counts.
///
/// `likes_received` sums like-set sizes across all of the user's posts at
/// query time; it is not maintained incrementally.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublicProfile {
    pub id: UserId,
    pub username: String,
    pub avatar: String,
    pub bio: String,
    pub created_at: DateTime<Utc>,
    pub post_count: usize,
    pub likes_received: usize,
}

// =============================================================================
// PASSWORD HASHING
// =============================================================================

/// Hash a clear secret with Argon2id and a fresh random salt.
pub fn hash_password(secret: &str) -> Result<String, SocialError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(secret.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| SocialError::Io(format!("Password hashing failed: {e}")))
}

/// Verify a clear secret against a stored PHC hash string.
///
/// An unparseable stored hash verifies as `false` rather than erroring, so a
/// corrupted record behaves like a wrong password.
#[must_use]
pub fn verify_password(secret: &str, stored: &str) -> bool {
    PasswordHash::new(stored)
        .map(|parsed| {
            Argon2::default()
                .verify_password(secret.as_bytes(), &parsed)
                .is_ok()
        })
        .unwrap_or(false)
}

// =============================================================================
// TESTS
// =============================================================================
