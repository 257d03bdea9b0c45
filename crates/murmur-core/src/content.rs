//! # Content Records
//!
//! Posts and their embedded comments.
//!
//! Comments live inside their post (one document), are stored newest-first
//! (inserts go to the head), and carry denormalized author display fields
//! captured at comment time. Like sets are `BTreeSet<UserId>`, so membership
//! toggles can never produce duplicates and iteration order is deterministic.

use crate::types::{CommentId, PostId, UserId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

// =============================================================================
// COMMENT
// =============================================================================

/// A comment embedded in a post.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Comment {
    /// Unique within the containing post.
    pub id: CommentId,
    /// The comment's author.
    pub user: UserId,
    /// Comment body, non-empty after trimming.
    pub text: String,
    /// Author username captured at comment time; never refreshed.
    pub name: String,
    /// Author avatar captured at comment time; never refreshed.
    pub avatar: String,
    /// Users who liked this comment.
    pub likes: BTreeSet<UserId>,
    pub created_at: DateTime<Utc>,
}

impl Comment {
    /// Create a new comment with an empty like set.
    #[must_use]
    pub fn new(id: CommentId, user: UserId, text: String, name: String, avatar: String) -> Self {
        Self {
            id,
            user,
            text,
            name,
            avatar,
            likes: BTreeSet::new(),
            created_at: Utc::now(),
        }
    }

    /// Toggle `user` in the like set. Returns `true` when the user is a
    /// member after the call.
    pub fn toggle_like(&mut self, user: UserId) -> bool {
        if self.likes.remove(&user) {
            false
        } else {
            self.likes.insert(user);
            true
        }
    }
}

// =============================================================================
// POST
// =============================================================================

/// A post with embedded comments and a like set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Post {
    /// Store-allocated identifier.
    pub id: PostId,
    /// Owning user; immutable after creation.
    pub user: UserId,
    /// Required, trimmed.
    pub title: String,
    /// Required body text.
    pub content: String,
    /// Stored image paths, at most `MAX_POST_IMAGES`.
    pub images: Vec<String>,
    /// Users who liked this post.
    pub likes: BTreeSet<UserId>,
    /// Newest-first: index 0 is the most recent comment.
    pub comments: Vec<Comment>,
    /// Counter for comment-local identifiers.
    pub next_comment_id: u64,
    pub created_at: DateTime<Utc>,
    /// Recomputed on every save through [`Post::touch`].
    pub updated_at: DateTime<Utc>,
}

impl Post {
    /// Create a new post with no comments and no likes.
    #[must_use]
    pub fn new(id: PostId, user: UserId, title: String, content: String, images: Vec<String>) -> Self {
        let now = Utc::now();
        Self {
            id,
            user,
            title,
            content,
            images,
            likes: BTreeSet::new(),
            comments: Vec::new(),
            next_comment_id: 0,
            created_at: now,
            updated_at: now,
        }
    }

    /// Refresh the last-modified timestamp. Callers invoke this before every
    /// store write, mirroring a save hook.
    pub fn touch(&mut self) {
        self.updated_at = Utc::now();
    }

    /// Insert a new comment at the head of the collection and return its id.
    ///
    /// `name` and `avatar` are the author's display fields at this instant;
    /// they are stored as-is and never refreshed.
    pub fn add_comment(
        &mut self,
        user: UserId,
        text: String,
        name: String,
        avatar: String,
    ) -> CommentId {
        let id = CommentId(self.next_comment_id);
        self.next_comment_id = self.next_comment_id.saturating_add(1);
        self.comments
            .insert(0, Comment::new(id, user, text, name, avatar));
        self.touch();
        id
    }

    /// Look up a comment by its post-local id.
    #[must_use]
    pub fn comment(&self, id: CommentId) -> Option<&Comment> {
        self.comments.iter().find(|c| c.id == id)
    }

    /// Mutable lookup of a comment by its post-local id.
    pub fn comment_mut(&mut self, id: CommentId) -> Option<&mut Comment> {
        self.comments.iter_mut().find(|c| c.id == id)
    }

    /// Remove a comment. Returns `false` if no comment had that id.
    pub fn remove_comment(&mut self, id: CommentId) -> bool {
        let before = self.comments.len();
        self.comments.retain(|c| c.id != id);
        let removed = self.comments.len() != before;
        if removed {
            self.touch();
        }
        removed
    }

    /// Toggle `user` in the post's like set. Returns `true` when the user is
    /// a member after the call.
    pub fn toggle_like(&mut self, user: UserId) -> bool {
        let liked = if self.likes.remove(&user) {
            false
        } else {
            self.likes.insert(user);
            true
        };
        self.touch();
        liked
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn test_post() -> Post {
        Post::new(
            PostId(1),
            UserId(1),
            "hi".to_string(),
            "world".to_string(),
            Vec::new(),
        )
    }

    #[test]
    fn comments_insert_at_head() {
        let mut post = test_post();
        let first = post.add_comment(UserId(2), "one".into(), "bob".into(), "a.png".into());
        let second = post.add_comment(UserId(3), "two".into(), "carol".into(), "b.png".into());

        assert_eq!(post.comments[0].id, second);
        assert_eq!(post.comments[1].id, first);
        assert_ne!(first, second);
    }

    #[test]
    fn comment_ids_survive_deletion() {
        let mut post = test_post();
        let first = post.add_comment(UserId(2), "one".into(), "bob".into(), "a.png".into());
        assert!(post.remove_comment(first));
        let second = post.add_comment(UserId(2), "two".into(), "bob".into(), "a.png".into());
        // Ids keep counting up; a fresh comment never reuses a deleted id.
        assert_ne!(first, second);
    }

    #[test]
    fn remove_missing_comment_is_false() {
        let mut post = test_post();
        assert!(!post.remove_comment(CommentId(7)));
    }

    #[test]
    fn like_toggle_pair_restores_set() {
        let mut post = test_post();
        let before = post.likes.clone();
        assert!(post.toggle_like(UserId(9)));
        assert!(post.likes.contains(&UserId(9)));
        assert!(!post.toggle_like(UserId(9)));
        assert_eq!(post.likes, before);
    }

    #[test]
    fn like_set_holds_no_duplicates() {
        let mut post = test_post();
        post.toggle_like(UserId(9));
        post.toggle_like(UserId(9));
        post.toggle_like(UserId(9));
        assert_eq!(post.likes.len(), 1);
    }

    #[test]
    fn comment_like_toggle() {
        let mut post = test_post();
        let id = post.add_comment(UserId(2), "one".into(), "bob".into(), "a.png".into());
        let comment = post.comment_mut(id);
        assert!(comment.is_some());
        if let Some(c) = comment {
            assert!(c.toggle_like(UserId(5)));
            assert!(!c.toggle_like(UserId(5)));
            assert!(c.likes.is_empty());
        }
    }

    #[test]
    fn touch_advances_updated_at() {
        let mut post = test_post();
        let before = post.updated_at;
        post.touch();
        assert!(post.updated_at >= before);
    }
}
