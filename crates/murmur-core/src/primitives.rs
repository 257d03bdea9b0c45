//! # Fixed Limits
//!
//! Hardcoded runtime constants for the Murmur core.
//!
//! These limits are compiled into the binary and are immutable at runtime.
//! They mirror the validation the stores and the upload layer enforce.

/// Minimum length for a password, checked at registration and on rotation.
pub const MIN_PASSWORD_LENGTH: usize = 6;

/// Maximum length for a user bio, in characters.
pub const MAX_BIO_LENGTH: usize = 200;

/// Maximum length for a post title, in characters.
pub const MAX_TITLE_LENGTH: usize = 100;

/// Maximum number of images attached to a single post.
pub const MAX_POST_IMAGES: usize = 5;

/// Maximum size of a single uploaded file (avatar or post image).
pub const MAX_UPLOAD_BYTES: usize = 5 * 1024 * 1024;

/// Sentinel avatar value for users who never uploaded one.
///
/// The upload layer must never delete a file by this name.
pub const DEFAULT_AVATAR: &str = "default_avatar.png";

/// Validity window for issued bearer tokens, in days.
pub const TOKEN_TTL_DAYS: i64 = 30;
