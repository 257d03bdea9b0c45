//! # Social Store
//!
//! The `SocialStore` trait defines every persistence operation the core
//! needs, and `MemoryStore` implements it in memory.
//!
//! All data structures use `BTreeMap`/`BTreeSet` for deterministic ordering.
//! The follow graph is a single edge table keyed by `(follower, followee)`;
//! both directions are reads of the same edges, so the graph cannot drift
//! asymmetric.

use crate::content::Post;
use crate::identity::User;
use crate::types::{PostId, SocialError, UserId};
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;

// =============================================================================
// SOCIALSTORE TRAIT
// =============================================================================

/// The SocialStore trait defines the core persistence operations.
///
/// All fallible operations return `Result<T, SocialError>` to support both
/// in-memory and persistent storage backends uniformly.
///
/// Uniqueness of usernames and emails is enforced here: `insert_user` and
/// `update_user` are the final backstop behind the caller's pre-checks and
/// fail with `SocialError::Conflict` on collision.
pub trait SocialStore {
    /// Allocate the next user id. Ids are monotonic and never reused.
    fn allocate_user_id(&mut self) -> Result<UserId, SocialError>;

    /// Insert a new user. Fails with `Conflict` if the username or email is
    /// already indexed.
    fn insert_user(&mut self, user: User) -> Result<(), SocialError>;

    /// Overwrite an existing user, re-pointing the unique indexes if the
    /// username or email changed. Fails with `NotFound` if the id is
    /// unknown and `Conflict` if an index entry belongs to another user.
    fn update_user(&mut self, user: &User) -> Result<(), SocialError>;

    /// Look up a user by id.
    fn user(&self, id: UserId) -> Result<Option<User>, SocialError>;

    /// Look up a user by exact username.
    fn user_by_username(&self, username: &str) -> Result<Option<User>, SocialError>;

    /// Look up a user by email. Callers pass the normalized (lowercase) form.
    fn user_by_email(&self, email: &str) -> Result<Option<User>, SocialError>;

    /// Total number of registered users.
    fn user_count(&self) -> Result<usize, SocialError>;

    /// Insert a follow edge. Returns `false` without writing if the edge
    /// already exists.
    fn insert_follow(&mut self, follower: UserId, followee: UserId) -> Result<bool, SocialError>;

    /// Remove a follow edge. Returns `false` if the edge did not exist.
    fn remove_follow(&mut self, follower: UserId, followee: UserId) -> Result<bool, SocialError>;

    /// Check whether a follow edge exists.
    fn is_following(&self, follower: UserId, followee: UserId) -> Result<bool, SocialError>;

    /// All users `user` follows, in ascending id order.
    fn following_of(&self, user: UserId) -> Result<Vec<UserId>, SocialError>;

    /// All users following `user`, in ascending id order.
    fn followers_of(&self, user: UserId) -> Result<Vec<UserId>, SocialError>;

    /// Allocate the next post id. Ids are monotonic and never reused.
    fn allocate_post_id(&mut self) -> Result<PostId, SocialError>;

    /// Insert a new post.
    fn insert_post(&mut self, post: Post) -> Result<(), SocialError>;

    /// Overwrite an existing post (comments and likes are saved through
    /// this). Fails with `NotFound` if the id is unknown.
    fn update_post(&mut self, post: &Post) -> Result<(), SocialError>;

    /// Look up a post by id.
    fn post(&self, id: PostId) -> Result<Option<Post>, SocialError>;

    /// All posts, unordered (callers sort). Full scan.
    fn posts(&self) -> Result<Vec<Post>, SocialError>;

    /// All posts owned by `user`, unordered. Full scan.
    fn posts_by_user(&self, user: UserId) -> Result<Vec<Post>, SocialError>;

    /// Total number of posts.
    fn post_count(&self) -> Result<usize, SocialError>;
}

// =============================================================================
// MEMORYSTORE IMPLEMENTATION
// =============================================================================

/// In-memory store backend (fast, volatile). Used by tests and by the
/// server's `--backend memory` mode.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    /// User storage: UserId -> User
    users: BTreeMap<UserId, User>,
    /// Unique index: username -> UserId
    username_index: BTreeMap<String, UserId>,
    /// Unique index: lowercase email -> UserId
    email_index: BTreeMap<String, UserId>,
    /// Post storage: PostId -> Post
    posts: BTreeMap<PostId, Post>,
    /// Follow edges: (follower, followee) -> followed_at
    follows: BTreeMap<(UserId, UserId), DateTime<Utc>>,
    /// Next available user id.
    next_user_id: u64,
    /// Next available post id.
    next_post_id: u64,
}

impl MemoryStore {
    /// Create a new empty store.
    #[must_use]
    pub fn new() -> Self {
        Self {
            next_user_id: 1,
            next_post_id: 1,
            ..Self::default()
        }
    }
}

impl SocialStore for MemoryStore {
    fn allocate_user_id(&mut self) -> Result<UserId, SocialError> {
        let id = UserId(self.next_user_id.max(1));
        self.next_user_id = id.0.saturating_add(1);
        Ok(id)
    }

    fn insert_user(&mut self, user: User) -> Result<(), SocialError> {
        if self.username_index.contains_key(user.username.as_str())
            || self.email_index.contains_key(user.email.as_str())
        {
            return Err(SocialError::Conflict(
                "Email or username already exists".to_string(),
            ));
        }
        self.username_index
            .insert(user.username.as_str().to_string(), user.id);
        self.email_index
            .insert(user.email.as_str().to_string(), user.id);
        self.users.insert(user.id, user);
        Ok(())
    }

    fn update_user(&mut self, user: &User) -> Result<(), SocialError> {
        let Some(old) = self.users.get(&user.id).cloned() else {
            return Err(SocialError::NotFound("User"));
        };

        // An index entry may exist for the same user (unchanged field); only
        // another user's entry is a conflict.
        let username_taken = self
            .username_index
            .get(user.username.as_str())
            .is_some_and(|&id| id != user.id);
        let email_taken = self
            .email_index
            .get(user.email.as_str())
            .is_some_and(|&id| id != user.id);
        if username_taken || email_taken {
            return Err(SocialError::Conflict(
                "Email or username already exists".to_string(),
            ));
        }

        if old.username != user.username {
            self.username_index.remove(old.username.as_str());
        }
        if old.email != user.email {
            self.email_index.remove(old.email.as_str());
        }
        self.username_index
            .insert(user.username.as_str().to_string(), user.id);
        self.email_index
            .insert(user.email.as_str().to_string(), user.id);
        self.users.insert(user.id, user.clone());
        Ok(())
    }

    fn user(&self, id: UserId) -> Result<Option<User>, SocialError> {
        Ok(self.users.get(&id).cloned())
    }

    fn user_by_username(&self, username: &str) -> Result<Option<User>, SocialError> {
        Ok(self
            .username_index
            .get(username)
            .and_then(|id| self.users.get(id))
            .cloned())
    }

    fn user_by_email(&self, email: &str) -> Result<Option<User>, SocialError> {
        Ok(self
            .email_index
            .get(email)
            .and_then(|id| self.users.get(id))
            .cloned())
    }

    fn user_count(&self) -> Result<usize, SocialError> {
        Ok(self.users.len())
    }

    fn insert_follow(&mut self, follower: UserId, followee: UserId) -> Result<bool, SocialError> {
        if self.follows.contains_key(&(follower, followee)) {
            return Ok(false);
        }
        self.follows.insert((follower, followee), Utc::now());
        Ok(true)
    }

    fn remove_follow(&mut self, follower: UserId, followee: UserId) -> Result<bool, SocialError> {
        Ok(self.follows.remove(&(follower, followee)).is_some())
    }

    fn is_following(&self, follower: UserId, followee: UserId) -> Result<bool, SocialError> {
        Ok(self.follows.contains_key(&(follower, followee)))
    }

    fn following_of(&self, user: UserId) -> Result<Vec<UserId>, SocialError> {
        Ok(self
            .follows
            .range((user, UserId(0))..=(user, UserId(u64::MAX)))
            .map(|((_, followee), _)| *followee)
            .collect())
    }

    fn followers_of(&self, user: UserId) -> Result<Vec<UserId>, SocialError> {
        // The edge table is keyed by follower, so the reverse direction is a
        // full scan. Acceptable at this data volume; see DESIGN.md.
        Ok(self
            .follows
            .keys()
            .filter(|(_, followee)| *followee == user)
            .map(|(follower, _)| *follower)
            .collect())
    }

    fn allocate_post_id(&mut self) -> Result<PostId, SocialError> {
        let id = PostId(self.next_post_id.max(1));
        self.next_post_id = id.0.saturating_add(1);
        Ok(id)
    }

    fn insert_post(&mut self, post: Post) -> Result<(), SocialError> {
        self.posts.insert(post.id, post);
        Ok(())
    }

    fn update_post(&mut self, post: &Post) -> Result<(), SocialError> {
        if !self.posts.contains_key(&post.id) {
            return Err(SocialError::NotFound("Post"));
        }
        self.posts.insert(post.id, post.clone());
        Ok(())
    }

    fn post(&self, id: PostId) -> Result<Option<Post>, SocialError> {
        Ok(self.posts.get(&id).cloned())
    }

    fn posts(&self) -> Result<Vec<Post>, SocialError> {
        Ok(self.posts.values().cloned().collect())
    }

    fn posts_by_user(&self, user: UserId) -> Result<Vec<Post>, SocialError> {
        Ok(self
            .posts
            .values()
            .filter(|p| p.user == user)
            .cloned()
            .collect())
    }

    fn post_count(&self) -> Result<usize, SocialError> {
        Ok(self.posts.len())
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Email, Username};

    fn user(store: &mut MemoryStore, name: &str, email: &str) -> User {
        let id = match store.allocate_user_id() {
            Ok(id) => id,
            Err(_) => UserId(0),
        };
        User::new(id, Username::new(name), Email::new(email), "h".to_string())
    }

    #[test]
    fn insert_user_enforces_unique_username() {
        let mut store = MemoryStore::new();
        let alice = user(&mut store, "alice", "a@x.com");
        let dup = user(&mut store, "alice", "other@x.com");
        assert!(store.insert_user(alice).is_ok());
        assert!(matches!(
            store.insert_user(dup),
            Err(SocialError::Conflict(_))
        ));
    }

    #[test]
    fn insert_user_enforces_unique_email() {
        let mut store = MemoryStore::new();
        let alice = user(&mut store, "alice", "a@x.com");
        let dup = user(&mut store, "bob", "a@x.com");
        assert!(store.insert_user(alice).is_ok());
        assert!(matches!(
            store.insert_user(dup),
            Err(SocialError::Conflict(_))
        ));
    }

    #[test]
    fn update_user_repoints_indexes() {
        let mut store = MemoryStore::new();
        let mut alice = user(&mut store, "alice", "a@x.com");
        assert!(store.insert_user(alice.clone()).is_ok());

        alice.username = Username::new("alicia");
        assert!(store.update_user(&alice).is_ok());
        assert!(matches!(store.user_by_username("alice"), Ok(None)));
        let found = store.user_by_username("alicia");
        assert!(found.is_ok_and(|u| u.is_some_and(|u| u.id == alice.id)));
    }

    #[test]
    fn update_user_rejects_taken_username() {
        let mut store = MemoryStore::new();
        let alice = user(&mut store, "alice", "a@x.com");
        let mut bob = user(&mut store, "bob", "b@x.com");
        assert!(store.insert_user(alice).is_ok());
        assert!(store.insert_user(bob.clone()).is_ok());

        bob.username = Username::new("alice");
        assert!(matches!(
            store.update_user(&bob),
            Err(SocialError::Conflict(_))
        ));
    }

    #[test]
    fn update_user_same_fields_is_not_a_conflict() {
        let mut store = MemoryStore::new();
        let mut alice = user(&mut store, "alice", "a@x.com");
        assert!(store.insert_user(alice.clone()).is_ok());
        alice.bio = "hello".to_string();
        assert!(store.update_user(&alice).is_ok());
    }

    #[test]
    fn follow_edges_read_from_both_directions() {
        let mut store = MemoryStore::new();
        let a = UserId(1);
        let b = UserId(2);

        assert!(store.insert_follow(a, b).is_ok_and(|fresh| fresh));
        assert!(store.is_following(a, b).is_ok_and(|f| f));
        assert!(store.following_of(a).is_ok_and(|v| v == vec![b]));
        assert!(store.followers_of(b).is_ok_and(|v| v == vec![a]));
        // The reverse direction is not implied.
        assert!(store.is_following(b, a).is_ok_and(|f| !f));
    }

    #[test]
    fn duplicate_follow_is_reported() {
        let mut store = MemoryStore::new();
        assert!(store.insert_follow(UserId(1), UserId(2)).is_ok_and(|f| f));
        assert!(store.insert_follow(UserId(1), UserId(2)).is_ok_and(|f| !f));
    }

    #[test]
    fn remove_follow_is_idempotent() {
        let mut store = MemoryStore::new();
        assert!(store.insert_follow(UserId(1), UserId(2)).is_ok());
        assert!(store.remove_follow(UserId(1), UserId(2)).is_ok_and(|r| r));
        assert!(store.remove_follow(UserId(1), UserId(2)).is_ok_and(|r| !r));
        assert!(store.following_of(UserId(1)).is_ok_and(|v| v.is_empty()));
        assert!(store.followers_of(UserId(2)).is_ok_and(|v| v.is_empty()));
    }

    #[test]
    fn ids_are_monotonic() {
        let mut store = MemoryStore::new();
        let first = store.allocate_post_id();
        let second = store.allocate_post_id();
        assert!(first.is_ok_and(|f| second.is_ok_and(|s| s.0 > f.0)));
    }
}
