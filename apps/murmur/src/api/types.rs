//! # API Request/Response Types
//!
//! This module defines the JSON structures for the HTTP API.
//!
//! The materialized views (`PostView`, `CommentView`, `ReplyView`,
//! `MediaView`, `UserSummary`, `PublicProfile`) serialize straight from
//! murmur-core; only the shapes specific to the HTTP surface live here.

use murmur_core::{ProfileUpdate, User, UserId};
use serde::{Deserialize, Serialize};

// =============================================================================
// GENERIC RESPONSES
// =============================================================================

/// Health check response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

impl Default for HealthResponse {
    fn default() -> Self {
        Self {
            status: "ok".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

/// The single-message body used for every error and for confirmations.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

// =============================================================================
// AUTH REQUESTS/RESPONSES
// =============================================================================

/// Registration request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegisterRequest {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
}

/// Login request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginRequest {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
}

/// Response carrying public profile fields plus a freshly issued token.
/// Returned by register, login, and profile update.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthResponse {
    pub id: UserId,
    pub username: String,
    pub email: String,
    pub avatar: String,
    pub bio: String,
    pub token: String,
}

impl AuthResponse {
    pub fn from_user(user: &User, token: String) -> Self {
        Self {
            id: user.id,
            username: user.username.as_str().to_string(),
            email: user.email.as_str().to_string(),
            avatar: user.avatar.clone(),
            bio: user.bio.clone(),
            token,
        }
    }
}

/// The caller's own profile, hash excluded.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProfileResponse {
    pub id: UserId,
    pub username: String,
    pub email: String,
    pub avatar: String,
    pub bio: String,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

impl ProfileResponse {
    pub fn from_user(user: &User) -> Self {
        Self {
            id: user.id,
            username: user.username.as_str().to_string(),
            email: user.email.as_str().to_string(),
            avatar: user.avatar.clone(),
            bio: user.bio.clone(),
            created_at: user.created_at,
        }
    }
}

// =============================================================================
// PROFILE UPDATE
// =============================================================================

/// Partial profile update. Absent fields are left unchanged; `bio` may be
/// the empty string to clear it. The avatar travels as a multipart file,
/// never through this body.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateProfileRequest {
    pub username: Option<String>,
    pub email: Option<String>,
    pub bio: Option<String>,
    pub password: Option<String>,
}

impl UpdateProfileRequest {
    /// Convert into the core update, attaching the stored avatar path when
    /// an upload was processed.
    pub fn into_update(self, avatar: Option<String>) -> ProfileUpdate {
        ProfileUpdate {
            username: self.username,
            email: self.email,
            bio: self.bio,
            password: self.password,
            avatar,
        }
    }
}

// =============================================================================
// CONTENT REQUESTS/RESPONSES
// =============================================================================

/// Post creation request (JSON form). Image uploads arrive as multipart
/// files instead; `images` here carries already-stored paths.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CreatePostRequest {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub images: Vec<String>,
}

/// Comment creation request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommentRequest {
    #[serde(default)]
    pub text: String,
}

/// The updated like set returned by the toggle endpoints.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LikesResponse {
    pub likes: Vec<UserId>,
}

impl LikesResponse {
    pub fn new(likes: Vec<UserId>) -> Self {
        Self { likes }
    }
}

/// Comment sort hint query parameter: `?sort=time|likes`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SortQuery {
    pub sort: Option<String>,
}

impl SortQuery {
    pub fn comment_sort(&self) -> murmur_core::CommentSort {
        self.sort
            .as_deref()
            .map(murmur_core::CommentSort::from_hint)
            .unwrap_or_default()
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use murmur_core::CommentSort;

    #[test]
    fn health_response_carries_crate_version() {
        let health = HealthResponse::default();
        assert_eq!(health.status, "ok");
        assert_eq!(health.version, env!("CARGO_PKG_VERSION"));
    }

    #[test]
    fn sort_query_defaults_to_time() {
        assert_eq!(SortQuery::default().comment_sort(), CommentSort::Time);
        let likes = SortQuery {
            sort: Some("likes".to_string()),
        };
        assert_eq!(likes.comment_sort(), CommentSort::Likes);
        let junk = SortQuery {
            sort: Some("upside-down".to_string()),
        };
        assert_eq!(junk.comment_sort(), CommentSort::Time);
    }

    #[test]
    fn register_request_tolerates_missing_fields() {
        let parsed: Result<RegisterRequest, _> = serde_json::from_str("{}");
        assert!(parsed.is_ok_and(|r| r.username.is_empty() && r.password.is_empty()));
    }
}
