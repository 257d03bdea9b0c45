//! # Feed Views and Aggregations
//!
//! The read side of the content store: materialized post/comment views with
//! user summaries joined in, comment ordering, and the per-user aggregation
//! scans (replies, media, liked posts, like counts).
//!
//! Every aggregation here is an unindexed full scan over the content store.
//! That is the documented contract: acceptable at small scale, revisit with
//! secondary indexes if the post table grows.

use crate::content::{Comment, Post};
use crate::identity::{PublicProfile, User, UserSummary};
use crate::store::SocialStore;
use crate::types::{CommentId, PostId, SocialError, UserId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// =============================================================================
// COMMENT ORDERING
// =============================================================================

/// How to order comments inside a post view.
///
/// The hint applies uniformly to post listings and single-post fetches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CommentSort {
    /// Newest first (the default).
    #[default]
    Time,
    /// Most liked first; ties break newest-first.
    Likes,
}

impl CommentSort {
    /// Parse a request hint. Anything other than `"likes"` is `Time`.
    #[must_use]
    pub fn from_hint(hint: &str) -> Self {
        match hint {
            "likes" => Self::Likes,
            _ => Self::Time,
        }
    }
}

// =============================================================================
// MATERIALIZED VIEWS
// =============================================================================

/// A comment as returned to callers: the stored record plus a read-time
/// author summary. The denormalized `name`/`avatar` reflect the author at
/// comment time; `user` reflects the author now.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommentView {
    pub id: CommentId,
    pub user: Option<UserSummary>,
    pub text: String,
    pub name: String,
    pub avatar: String,
    pub likes: Vec<UserId>,
    pub created_at: DateTime<Utc>,
}

/// A post with its owner summary and comment views expanded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PostView {
    pub id: PostId,
    pub user: UserSummary,
    pub title: String,
    pub content: String,
    pub images: Vec<String>,
    pub likes: Vec<UserId>,
    pub comments: Vec<CommentView>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// One entry of a user's reply feed: a comment they authored plus where it
/// lives.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplyView {
    pub post_id: PostId,
    pub post_title: String,
    pub comment: CommentView,
}

/// One entry of a user's media feed: an image from one of their posts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaView {
    pub post_id: PostId,
    pub image: String,
    pub created_at: DateTime<Utc>,
}

// =============================================================================
// VIEW CONSTRUCTION
// =============================================================================

fn comment_view(store: &dyn SocialStore, comment: &Comment) -> Result<CommentView, SocialError> {
    let author = store.user(comment.user)?.map(|u| u.summary());
    Ok(CommentView {
        id: comment.id,
        user: author,
        text: comment.text.clone(),
        name: comment.name.clone(),
        avatar: comment.avatar.clone(),
        likes: comment.likes.iter().copied().collect(),
        created_at: comment.created_at,
    })
}

/// Materialize a post with owner summary and sorted comment views.
pub fn post_view(
    store: &dyn SocialStore,
    post: &Post,
    sort: CommentSort,
) -> Result<PostView, SocialError> {
    let Some(owner) = store.user(post.user)? else {
        return Err(SocialError::NotFound("User"));
    };

    let mut comments = Vec::with_capacity(post.comments.len());
    for comment in &post.comments {
        comments.push(comment_view(store, comment)?);
    }
    sort_comments(&mut comments, sort);

    Ok(PostView {
        id: post.id,
        user: owner.summary(),
        title: post.title.clone(),
        content: post.content.clone(),
        images: post.images.clone(),
        likes: post.likes.iter().copied().collect(),
        comments,
        created_at: post.created_at,
        updated_at: post.updated_at,
    })
}

fn sort_comments(comments: &mut [CommentView], sort: CommentSort) {
    match sort {
        CommentSort::Time => {
            comments.sort_by(|a, b| (b.created_at, b.id).cmp(&(a.created_at, a.id)));
        }
        CommentSort::Likes => {
            comments.sort_by(|a, b| {
                (b.likes.len(), b.created_at, b.id).cmp(&(a.likes.len(), a.created_at, a.id))
            });
        }
    }
}

/// Sort posts newest-first. Ids are monotonic, so they break same-instant
/// ties deterministically.
fn sort_posts_newest_first(posts: &mut [Post]) {
    posts.sort_by(|a, b| (b.created_at, b.id).cmp(&(a.created_at, a.id)));
}

/// Materialize all posts, newest-first.
pub fn list_posts(store: &dyn SocialStore, sort: CommentSort) -> Result<Vec<PostView>, SocialError> {
    let mut posts = store.posts()?;
    sort_posts_newest_first(&mut posts);
    posts.iter().map(|p| post_view(store, p, sort)).collect()
}

/// Materialize one user's posts, newest-first.
pub fn posts_by_user(
    store: &dyn SocialStore,
    user: UserId,
    sort: CommentSort,
) -> Result<Vec<PostView>, SocialError> {
    let mut posts = store.posts_by_user(user)?;
    sort_posts_newest_first(&mut posts);
    posts.iter().map(|p| post_view(store, p, sort)).collect()
}

// =============================================================================
// PER-USER AGGREGATIONS
// =============================================================================

/// All comments authored by `user` across every post, newest-first.
pub fn user_replies(store: &dyn SocialStore, user: UserId) -> Result<Vec<ReplyView>, SocialError> {
    let mut replies = Vec::new();
    for post in store.posts()? {
        for comment in &post.comments {
            if comment.user == user {
                replies.push(ReplyView {
                    post_id: post.id,
                    post_title: post.title.clone(),
                    comment: comment_view(store, comment)?,
                });
            }
        }
    }
    replies.sort_by(|a, b| {
        (b.comment.created_at, b.post_id, b.comment.id).cmp(&(
            a.comment.created_at,
            a.post_id,
            a.comment.id,
        ))
    });
    Ok(replies)
}

/// All images from `user`'s posts, newest post first.
pub fn user_media(store: &dyn SocialStore, user: UserId) -> Result<Vec<MediaView>, SocialError> {
    let mut posts = store.posts_by_user(user)?;
    sort_posts_newest_first(&mut posts);
    Ok(posts
        .into_iter()
        .flat_map(|post| {
            let post_id = post.id;
            let created_at = post.created_at;
            post.images.into_iter().map(move |image| MediaView {
                post_id,
                image,
                created_at,
            })
        })
        .collect())
}

/// All posts `user` has liked, newest-first.
pub fn user_liked_posts(
    store: &dyn SocialStore,
    user: UserId,
    sort: CommentSort,
) -> Result<Vec<PostView>, SocialError> {
    let mut posts: Vec<Post> = store
        .posts()?
        .into_iter()
        .filter(|p| p.likes.contains(&user))
        .collect();
    sort_posts_newest_first(&mut posts);
    posts.iter().map(|p| post_view(store, p, sort)).collect()
}

/// Derived profile counts: posts authored and likes received across them.
/// Computed at query time, not maintained incrementally.
pub fn user_stats(store: &dyn SocialStore, user: UserId) -> Result<(usize, usize), SocialError> {
    let posts = store.posts_by_user(user)?;
    let likes_received = posts.iter().map(|p| p.likes.len()).sum();
    Ok((posts.len(), likes_received))
}

/// Build the public profile view for a user record.
pub fn public_profile(store: &dyn SocialStore, user: &User) -> Result<PublicProfile, SocialError> {
    let (post_count, likes_received) = user_stats(store, user.id)?;
    Ok(PublicProfile {
        id: user.id,
        username: user.username.as_str().to_string(),
        avatar: user.avatar.clone(),
        bio: user.bio.clone(),
        created_at: user.created_at,
        post_count,
        likes_received,
    })
}

/// Expand a set of user ids into summaries, skipping ids that no longer
/// resolve.
pub fn summaries(store: &dyn SocialStore, ids: &[UserId]) -> Result<Vec<UserSummary>, SocialError> {
    let mut out = Vec::with_capacity(ids.len());
    for id in ids {
        if let Some(user) = store.user(*id)? {
            out.push(user.summary());
        }
    }
    Ok(out)
}

// =============================================================================
// TESTS
// =============================================================================
