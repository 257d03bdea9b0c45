//! # Session Module
//!
//! The operation facade over a storage backend. A `Session` owns either the
//! in-memory store or the redb-backed store and exposes every operation the
//! HTTP layer calls: accounts, the follow graph, posts, comments, likes, and
//! the per-user aggregations.
//!
//! ## Storage Backends
//!
//! - `InMemory`: uses `MemoryStore` (fast, volatile)
//! - `Persistent`: uses `RedbStore` for disk-backed ACID storage

use crate::accounts::{self, ProfileUpdate};
use crate::content::Post;
use crate::feed::{self, CommentSort, CommentView, MediaView, PostView, ReplyView};
use crate::identity::{PublicProfile, User, UserSummary};
use crate::primitives::{MAX_POST_IMAGES, MAX_TITLE_LENGTH};
use crate::storage::RedbStore;
use crate::store::{MemoryStore, SocialStore};
use crate::types::{CommentId, PostId, SocialError, UserId};
use std::path::Path;

// =============================================================================
// STORAGE BACKEND
// =============================================================================

/// Storage backend for a Session.
#[derive(Debug)]
pub enum StorageBackend {
    /// In-memory store (fast, volatile).
    InMemory(MemoryStore),
    /// Disk-backed store using redb (ACID, persistent).
    Persistent(RedbStore),
}

impl Default for StorageBackend {
    fn default() -> Self {
        Self::InMemory(MemoryStore::new())
    }
}

// NOTE: StorageBackend does NOT implement Clone.
// RedbStore (database handle) cannot be safely cloned.

// =============================================================================
// USER IDENTIFIERS
// =============================================================================

/// A user reference as it arrives from the outside: either a numeric id or a
/// username. Resolution order is fixed by the variant, never guessed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UserIdent {
    Id(UserId),
    Name(String),
}

// =============================================================================
// SESSION
// =============================================================================

/// A Session wraps a storage backend and exposes the social operations.
///
/// The HTTP layer holds one Session behind a read-write lock; the store's
/// own write serialization is the only other concurrency guard.
#[derive(Debug, Default)]
pub struct Session {
    backend: StorageBackend,
}

impl Session {
    /// Create a new session with in-memory storage.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Open a session with persistent storage at the given path.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, SocialError> {
        Ok(Self {
            backend: StorageBackend::Persistent(RedbStore::open(path)?),
        })
    }

    /// Create a session from an explicit backend.
    #[must_use]
    pub fn with_backend(backend: StorageBackend) -> Self {
        Self { backend }
    }

    fn store(&self) -> &dyn SocialStore {
        match &self.backend {
            StorageBackend::InMemory(store) => store,
            StorageBackend::Persistent(store) => store,
        }
    }

    fn store_mut(&mut self) -> &mut dyn SocialStore {
        match &mut self.backend {
            StorageBackend::InMemory(store) => store,
            StorageBackend::Persistent(store) => store,
        }
    }

    // =========================================================================
    // ACCOUNTS
    // =========================================================================

    /// Register a new user.
    pub fn register(
        &mut self,
        username: &str,
        email: &str,
        password: &str,
    ) -> Result<User, SocialError> {
        accounts::register(self.store_mut(), username, email, password)
    }

    /// Authenticate by email and password.
    pub fn login(&self, email: &str, password: &str) -> Result<User, SocialError> {
        accounts::login(self.store(), email, password)
    }

    /// Look up a user by id. This is what the authentication gate calls to
    /// resolve a token subject.
    pub fn user(&self, id: UserId) -> Result<User, SocialError> {
        self.store().user(id)?.ok_or(SocialError::NotFound("User"))
    }

    /// Resolve a user by id or username.
    pub fn resolve_user(&self, ident: &UserIdent) -> Result<User, SocialError> {
        let found = match ident {
            UserIdent::Id(id) => self.store().user(*id)?,
            UserIdent::Name(name) => self.store().user_by_username(name)?,
        };
        found.ok_or(SocialError::NotFound("User"))
    }

    /// Apply a partial profile update.
    pub fn update_profile(
        &mut self,
        id: UserId,
        update: ProfileUpdate,
    ) -> Result<User, SocialError> {
        accounts::update_profile(self.store_mut(), id, update)
    }

    /// Public profile with derived content counts.
    pub fn public_profile(&self, ident: &UserIdent) -> Result<PublicProfile, SocialError> {
        let user = self.resolve_user(ident)?;
        feed::public_profile(self.store(), &user)
    }

    // =========================================================================
    // SOCIAL GRAPH
    // =========================================================================

    /// Follow a user. Self-follow and duplicate follows are rejected.
    pub fn follow(&mut self, follower: UserId, target: UserId) -> Result<(), SocialError> {
        if self.store().user(target)?.is_none() {
            return Err(SocialError::NotFound("User"));
        }
        if follower == target {
            return Err(SocialError::Validation(
                "You cannot follow yourself".to_string(),
            ));
        }
        if !self.store_mut().insert_follow(follower, target)? {
            return Err(SocialError::Validation(
                "Already following this user".to_string(),
            ));
        }
        Ok(())
    }

    /// Unfollow a user. Idempotent: unfollowing someone you do not follow is
    /// a silent success.
    pub fn unfollow(&mut self, follower: UserId, target: UserId) -> Result<(), SocialError> {
        if self.store().user(target)?.is_none() {
            return Err(SocialError::NotFound("User"));
        }
        let _ = self.store_mut().remove_follow(follower, target)?;
        Ok(())
    }

    /// Everyone the subject follows, as summary profiles.
    pub fn following_list(&self, ident: &UserIdent) -> Result<Vec<UserSummary>, SocialError> {
        let user = self.resolve_user(ident)?;
        let ids = self.store().following_of(user.id)?;
        feed::summaries(self.store(), &ids)
    }

    /// Everyone following the subject, as summary profiles.
    pub fn followers_list(&self, ident: &UserIdent) -> Result<Vec<UserSummary>, SocialError> {
        let user = self.resolve_user(ident)?;
        let ids = self.store().followers_of(user.id)?;
        feed::summaries(self.store(), &ids)
    }

    // =========================================================================
    // CONTENT
    // =========================================================================

    /// Create a post owned by `owner` and return its materialized view.
    pub fn create_post(
        &mut self,
        owner: UserId,
        title: &str,
        content: &str,
        images: Vec<String>,
    ) -> Result<PostView, SocialError> {
        let title = title.trim();
        if title.is_empty() || content.is_empty() {
            return Err(SocialError::Validation(
                "Title and content are required".to_string(),
            ));
        }
        if title.chars().count() > MAX_TITLE_LENGTH {
            return Err(SocialError::Validation(
                "Title must be at most 100 characters".to_string(),
            ));
        }
        if images.len() > MAX_POST_IMAGES {
            return Err(SocialError::Validation(
                "A post can carry at most 5 images".to_string(),
            ));
        }
        if self.store().user(owner)?.is_none() {
            return Err(SocialError::NotFound("User"));
        }

        let id = self.store_mut().allocate_post_id()?;
        let post = Post::new(id, owner, title.to_string(), content.to_string(), images);
        self.store_mut().insert_post(post.clone())?;
        feed::post_view(self.store(), &post, CommentSort::Time)
    }

    /// All posts, newest-first, with owner and comment summaries expanded.
    pub fn list_posts(&self, sort: CommentSort) -> Result<Vec<PostView>, SocialError> {
        feed::list_posts(self.store(), sort)
    }

    /// A single post by id.
    pub fn get_post(&self, id: PostId, sort: CommentSort) -> Result<PostView, SocialError> {
        let Some(post) = self.store().post(id)? else {
            return Err(SocialError::NotFound("Post"));
        };
        feed::post_view(self.store(), &post, sort)
    }

    /// All posts owned by a user, newest-first.
    pub fn posts_by_user(&self, user: UserId, sort: CommentSort) -> Result<Vec<PostView>, SocialError> {
        if self.store().user(user)?.is_none() {
            return Err(SocialError::NotFound("User"));
        }
        feed::posts_by_user(self.store(), user, sort)
    }

    /// Add a comment at the head of a post's comment collection.
    ///
    /// The author's display name and avatar are captured now and stored with
    /// the comment; later profile edits do not rewrite them.
    pub fn add_comment(
        &mut self,
        post_id: PostId,
        author: UserId,
        text: &str,
    ) -> Result<CommentView, SocialError> {
        let text = text.trim();
        if text.is_empty() {
            return Err(SocialError::Validation(
                "Comment text cannot be empty".to_string(),
            ));
        }
        let Some(author_user) = self.store().user(author)? else {
            return Err(SocialError::NotFound("User"));
        };
        let Some(mut post) = self.store().post(post_id)? else {
            return Err(SocialError::NotFound("Post"));
        };

        let comment_id = post.add_comment(
            author,
            text.to_string(),
            author_user.username.as_str().to_string(),
            author_user.avatar.clone(),
        );
        self.store_mut().update_post(&post)?;

        // The id was just allocated, so this lookup is exact even if another
        // writer raced ahead of us at the head of the collection.
        let comment = post
            .comment(comment_id)
            .ok_or(SocialError::NotFound("Comment"))?;
        Ok(CommentView {
            id: comment.id,
            user: Some(author_user.summary()),
            text: comment.text.clone(),
            name: comment.name.clone(),
            avatar: comment.avatar.clone(),
            likes: Vec::new(),
            created_at: comment.created_at,
        })
    }

    /// Delete a comment. Allowed for the comment's author and the post's
    /// owner only.
    pub fn delete_comment(
        &mut self,
        post_id: PostId,
        comment_id: CommentId,
        caller: UserId,
    ) -> Result<(), SocialError> {
        let Some(mut post) = self.store().post(post_id)? else {
            return Err(SocialError::NotFound("Post"));
        };
        let Some(comment) = post.comment(comment_id) else {
            return Err(SocialError::NotFound("Comment"));
        };

        let is_comment_author = comment.user == caller;
        let is_post_author = post.user == caller;
        if !is_comment_author && !is_post_author {
            return Err(SocialError::Forbidden(
                "Not allowed to delete this comment".to_string(),
            ));
        }

        post.remove_comment(comment_id);
        self.store_mut().update_post(&post)
    }

    /// Toggle the caller's membership in a post's like set and return the
    /// updated set.
    pub fn toggle_like_post(
        &mut self,
        post_id: PostId,
        caller: UserId,
    ) -> Result<Vec<UserId>, SocialError> {
        let Some(mut post) = self.store().post(post_id)? else {
            return Err(SocialError::NotFound("Post"));
        };
        post.toggle_like(caller);
        self.store_mut().update_post(&post)?;
        Ok(post.likes.iter().copied().collect())
    }

    /// Toggle the caller's membership in a comment's like set and return the
    /// updated set.
    pub fn toggle_like_comment(
        &mut self,
        post_id: PostId,
        comment_id: CommentId,
        caller: UserId,
    ) -> Result<Vec<UserId>, SocialError> {
        let Some(mut post) = self.store().post(post_id)? else {
            return Err(SocialError::NotFound("Post"));
        };
        let Some(comment) = post.comment_mut(comment_id) else {
            return Err(SocialError::NotFound("Comment"));
        };
        comment.toggle_like(caller);
        let likes: Vec<UserId> = comment.likes.iter().copied().collect();
        post.touch();
        self.store_mut().update_post(&post)?;
        Ok(likes)
    }

    // =========================================================================
    // AGGREGATIONS
    // =========================================================================

    /// All comments authored by a user, newest-first.
    pub fn user_replies(&self, user: UserId) -> Result<Vec<ReplyView>, SocialError> {
        if self.store().user(user)?.is_none() {
            return Err(SocialError::NotFound("User"));
        }
        feed::user_replies(self.store(), user)
    }

    /// All images from a user's posts, newest post first.
    pub fn user_media(&self, user: UserId) -> Result<Vec<MediaView>, SocialError> {
        if self.store().user(user)?.is_none() {
            return Err(SocialError::NotFound("User"));
        }
        feed::user_media(self.store(), user)
    }

    /// All posts a user has liked, newest-first.
    pub fn user_liked_posts(&self, user: UserId) -> Result<Vec<PostView>, SocialError> {
        if self.store().user(user)?.is_none() {
            return Err(SocialError::NotFound("User"));
        }
        feed::user_liked_posts(self.store(), user, CommentSort::Time)
    }

    // =========================================================================
    // STATUS
    // =========================================================================

    /// Total registered users.
    pub fn user_count(&self) -> Result<usize, SocialError> {
        self.store().user_count()
    }

    /// Total posts.
    pub fn post_count(&self) -> Result<usize, SocialError> {
        self.store().post_count()
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn session_with_users(names: &[&str]) -> (Session, Vec<UserId>) {
        let mut session = Session::new();
        let ids = names
            .iter()
            .filter_map(|name| {
                session
                    .register(name, &format!("{name}@x.com"), "secret1")
                    .ok()
                    .map(|u| u.id)
            })
            .collect();
        (session, ids)
    }

    #[test]
    fn follow_updates_both_directions() {
        let (mut session, ids) = session_with_users(&["alice", "bob"]);
        let (alice, bob) = (ids[0], ids[1]);

        assert!(session.follow(alice, bob).is_ok());
        let following = session.following_list(&UserIdent::Id(alice));
        assert!(following.is_ok_and(|v| v.iter().any(|s| s.id == bob)));
        let followers = session.followers_list(&UserIdent::Id(bob));
        assert!(followers.is_ok_and(|v| v.iter().any(|s| s.id == alice)));

        assert!(session.unfollow(alice, bob).is_ok());
        let following = session.following_list(&UserIdent::Id(alice));
        assert!(following.is_ok_and(|v| v.is_empty()));
        let followers = session.followers_list(&UserIdent::Id(bob));
        assert!(followers.is_ok_and(|v| v.is_empty()));
    }

    #[test]
    fn self_follow_always_fails() {
        let (mut session, ids) = session_with_users(&["alice"]);
        assert!(matches!(
            session.follow(ids[0], ids[0]),
            Err(SocialError::Validation(_))
        ));
    }

    #[test]
    fn duplicate_follow_is_rejected_unfollow_is_idempotent() {
        let (mut session, ids) = session_with_users(&["alice", "bob"]);
        let (alice, bob) = (ids[0], ids[1]);

        assert!(session.follow(alice, bob).is_ok());
        assert!(matches!(
            session.follow(alice, bob),
            Err(SocialError::Validation(_))
        ));
        assert!(session.unfollow(alice, bob).is_ok());
        // Second unfollow of a missing edge silently succeeds.
        assert!(session.unfollow(alice, bob).is_ok());
    }

    #[test]
    fn follow_unknown_target_is_not_found() {
        let (mut session, ids) = session_with_users(&["alice"]);
        assert!(matches!(
            session.follow(ids[0], UserId(999)),
            Err(SocialError::NotFound("User"))
        ));
    }

    #[test]
    fn follow_lists_resolve_by_username_too() {
        let (mut session, ids) = session_with_users(&["alice", "bob"]);
        assert!(session.follow(ids[0], ids[1]).is_ok());
        let list = session.following_list(&UserIdent::Name("alice".to_string()));
        assert!(list.is_ok_and(|v| v.len() == 1));
        assert!(matches!(
            session.following_list(&UserIdent::Name("nobody".to_string())),
            Err(SocialError::NotFound("User"))
        ));
    }

    #[test]
    fn end_to_end_register_post_comment_like() {
        let mut session = Session::new();

        let alice = session.register("alice", "a@x.com", "secret1");
        assert!(alice.is_ok());
        let Ok(alice) = alice else { return };

        let post = session.create_post(alice.id, "hi", "world", Vec::new());
        assert!(post.as_ref().is_ok_and(|p| p.user.username == "alice"));
        let Ok(post) = post else { return };

        let comment = session.add_comment(post.id, alice.id, "nice");
        assert!(comment.as_ref().is_ok_and(|c| c.text == "nice"));

        let likes = session.toggle_like_post(post.id, alice.id);
        assert!(likes.is_ok_and(|l| l == vec![alice.id]));
        let likes = session.toggle_like_post(post.id, alice.id);
        assert!(likes.is_ok_and(|l| l.is_empty()));
    }

    #[test]
    fn create_post_requires_title_and_content() {
        let (mut session, ids) = session_with_users(&["alice"]);
        assert!(matches!(
            session.create_post(ids[0], "  ", "body", Vec::new()),
            Err(SocialError::Validation(_))
        ));
        assert!(matches!(
            session.create_post(ids[0], "title", "", Vec::new()),
            Err(SocialError::Validation(_))
        ));
    }

    #[test]
    fn list_posts_newest_first_with_owner() {
        let (mut session, ids) = session_with_users(&["alice"]);
        let first = session.create_post(ids[0], "first", "body", Vec::new());
        let second = session.create_post(ids[0], "second", "body", Vec::new());
        assert!(first.is_ok() && second.is_ok());

        let posts = session.list_posts(CommentSort::Time);
        assert!(posts.is_ok_and(|p| p.len() == 2 && p[0].title == "second"));
    }

    #[test]
    fn get_post_not_found() {
        let session = Session::new();
        assert!(matches!(
            session.get_post(PostId(1), CommentSort::Time),
            Err(SocialError::NotFound("Post"))
        ));
    }

    #[test]
    fn comment_captures_denormalized_author_fields() {
        let (mut session, ids) = session_with_users(&["alice", "bob"]);
        let Ok(post) = session.create_post(ids[0], "hi", "world", Vec::new()) else {
            return;
        };
        let Ok(comment) = session.add_comment(post.id, ids[1], "  hello  ") else {
            return;
        };
        assert_eq!(comment.name, "bob");
        assert_eq!(comment.text, "hello");

        // Later profile edits leave the stored fields untouched.
        let updated = session.update_profile(
            ids[1],
            ProfileUpdate {
                username: Some("robert".to_string()),
                ..ProfileUpdate::default()
            },
        );
        assert!(updated.is_ok());
        let view = session.get_post(post.id, CommentSort::Time);
        assert!(view.is_ok_and(|v| {
            v.comments[0].name == "bob"
                && v.comments[0]
                    .user
                    .as_ref()
                    .is_some_and(|u| u.username == "robert")
        }));
    }

    #[test]
    fn blank_comment_is_rejected() {
        let (mut session, ids) = session_with_users(&["alice"]);
        let Ok(post) = session.create_post(ids[0], "hi", "world", Vec::new()) else {
            return;
        };
        assert!(matches!(
            session.add_comment(post.id, ids[0], "   "),
            Err(SocialError::Validation(_))
        ));
    }

    #[test]
    fn delete_comment_authorization() {
        let (mut session, ids) = session_with_users(&["alice", "bob", "carol"]);
        let (alice, bob, carol) = (ids[0], ids[1], ids[2]);
        let Ok(post) = session.create_post(alice, "hi", "world", Vec::new()) else {
            return;
        };
        let Ok(comment) = session.add_comment(post.id, bob, "hello") else {
            return;
        };

        // A bystander can delete nothing.
        assert!(matches!(
            session.delete_comment(post.id, comment.id, carol),
            Err(SocialError::Forbidden(_))
        ));
        // The comment's author can.
        assert!(session.delete_comment(post.id, comment.id, bob).is_ok());

        // The post's owner can delete someone else's comment.
        let Ok(comment) = session.add_comment(post.id, bob, "again") else {
            return;
        };
        assert!(session.delete_comment(post.id, comment.id, alice).is_ok());
    }

    #[test]
    fn delete_missing_comment_is_not_found() {
        let (mut session, ids) = session_with_users(&["alice"]);
        let Ok(post) = session.create_post(ids[0], "hi", "world", Vec::new()) else {
            return;
        };
        assert!(matches!(
            session.delete_comment(post.id, CommentId(42), ids[0]),
            Err(SocialError::NotFound("Comment"))
        ));
    }

    #[test]
    fn comment_like_toggle_round_trip() {
        let (mut session, ids) = session_with_users(&["alice", "bob"]);
        let Ok(post) = session.create_post(ids[0], "hi", "world", Vec::new()) else {
            return;
        };
        let Ok(comment) = session.add_comment(post.id, ids[0], "hello") else {
            return;
        };

        let likes = session.toggle_like_comment(post.id, comment.id, ids[1]);
        assert!(likes.is_ok_and(|l| l == vec![ids[1]]));
        let likes = session.toggle_like_comment(post.id, comment.id, ids[1]);
        assert!(likes.is_ok_and(|l| l.is_empty()));
    }

    #[test]
    fn public_profile_counts_posts_and_likes() {
        let (mut session, ids) = session_with_users(&["alice", "bob"]);
        let Ok(post) = session.create_post(ids[0], "hi", "world", Vec::new()) else {
            return;
        };
        assert!(session.toggle_like_post(post.id, ids[1]).is_ok());

        let profile = session.public_profile(&UserIdent::Name("alice".to_string()));
        assert!(profile.is_ok_and(|p| p.post_count == 1 && p.likes_received == 1));
    }

    #[test]
    fn aggregations_for_unknown_user_are_not_found() {
        let session = Session::new();
        assert!(matches!(
            session.user_replies(UserId(1)),
            Err(SocialError::NotFound("User"))
        ));
        assert!(matches!(
            session.user_media(UserId(1)),
            Err(SocialError::NotFound("User"))
        ));
        assert!(matches!(
            session.user_liked_posts(UserId(1)),
            Err(SocialError::NotFound("User"))
        ));
    }
}
