//! # murmur-core
//!
//! The social data core for Murmur - THE LOGIC.
//!
//! This crate implements the identity store, the content store, the follow
//! graph, and every operation the HTTP layer exposes: registration, login,
//! profiles, follow/unfollow, posts, embedded comments, like toggles, and
//! the per-user aggregation feeds.
//!
//! ## Architectural Constraints
//!
//! - The core is the only place where state lives; callers go through
//!   [`Session`]
//! - No async, no network dependencies (pure Rust)
//! - Deterministic collections only: `BTreeMap`/`BTreeSet`, ids are
//!   store-allocated counters
//! - The follow graph is a single edge table read from both directions, so
//!   it cannot drift asymmetric

// =============================================================================
// MODULES
// =============================================================================

pub mod accounts;
pub mod content;
pub mod feed;
pub mod identity;
pub mod primitives;
pub mod session;
pub mod storage;
pub mod store;
pub mod types;

// =============================================================================
// RE-EXPORTS: Core Types (from types module)
// =============================================================================

pub use types::{CommentId, Email, PostId, SocialError, UserId, Username};

// =============================================================================
// RE-EXPORTS: Records and Projections
// =============================================================================

pub use content::{Comment, Post};
pub use identity::{PublicProfile, User, UserSummary, hash_password, verify_password};

// =============================================================================
// RE-EXPORTS: Operations
// =============================================================================

pub use accounts::ProfileUpdate;
pub use feed::{CommentSort, CommentView, MediaView, PostView, ReplyView};
pub use session::{Session, StorageBackend, UserIdent};
pub use storage::RedbStore;
pub use store::{MemoryStore, SocialStore};
