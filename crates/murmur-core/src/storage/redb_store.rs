//! # redb-backed Social Store
//!
//! A disk-backed `SocialStore` using the redb embedded database, providing:
//! - ACID transactions
//! - Crash safety (copy-on-write B-trees)
//! - MVCC (concurrent readers, single writer)
//! - Zero configuration
//!
//! Records are serialized with postcard. Every multi-key write (a user plus
//! its two unique index entries, a follow edge) happens inside a single
//! write transaction, so uniqueness and the follow graph stay consistent
//! across crashes.

use crate::content::Post;
use crate::identity::User;
use crate::store::SocialStore;
use crate::types::{PostId, SocialError, UserId};
use chrono::Utc;
use redb::{Database, ReadableDatabase, ReadableTable, ReadableTableMetadata, TableDefinition};
use std::path::Path;

/// Table for users: UserId(u64) -> serialized User bytes
const USERS: TableDefinition<u64, &[u8]> = TableDefinition::new("users");

/// Unique index: username -> UserId(u64)
const USERNAME_INDEX: TableDefinition<&str, u64> = TableDefinition::new("username_index");

/// Unique index: lowercase email -> UserId(u64)
const EMAIL_INDEX: TableDefinition<&str, u64> = TableDefinition::new("email_index");

/// Table for posts: PostId(u64) -> serialized Post bytes
const POSTS: TableDefinition<u64, &[u8]> = TableDefinition::new("posts");

/// Follow edges: (follower, followee) -> followed_at in unix millis
const FOLLOWS: TableDefinition<(u64, u64), i64> = TableDefinition::new("follows");

/// Table for metadata: key string -> value u64
const METADATA: TableDefinition<&str, u64> = TableDefinition::new("metadata");

/// A disk-backed social store using redb.
pub struct RedbStore {
    /// The redb database handle.
    db: Database,
    /// Next available user id.
    next_user_id: u64,
    /// Next available post id.
    next_post_id: u64,
}

impl std::fmt::Debug for RedbStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedbStore")
            .field("next_user_id", &self.next_user_id)
            .field("next_post_id", &self.next_post_id)
            .finish_non_exhaustive()
    }
}

impl RedbStore {
    /// Open or create a store database at the given path.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, SocialError> {
        let db = Database::create(path.as_ref()).map_err(|e| SocialError::Io(e.to_string()))?;

        // Initialize tables if they don't exist
        {
            let write_txn = db
                .begin_write()
                .map_err(|e| SocialError::Io(e.to_string()))?;
            let _ = write_txn
                .open_table(USERS)
                .map_err(|e| SocialError::Io(e.to_string()))?;
            let _ = write_txn
                .open_table(USERNAME_INDEX)
                .map_err(|e| SocialError::Io(e.to_string()))?;
            let _ = write_txn
                .open_table(EMAIL_INDEX)
                .map_err(|e| SocialError::Io(e.to_string()))?;
            let _ = write_txn
                .open_table(POSTS)
                .map_err(|e| SocialError::Io(e.to_string()))?;
            let _ = write_txn
                .open_table(FOLLOWS)
                .map_err(|e| SocialError::Io(e.to_string()))?;
            let _ = write_txn
                .open_table(METADATA)
                .map_err(|e| SocialError::Io(e.to_string()))?;
            write_txn
                .commit()
                .map_err(|e| SocialError::Io(e.to_string()))?;
        }

        // Load id counters
        let read_txn = db
            .begin_read()
            .map_err(|e| SocialError::Io(e.to_string()))?;
        let meta_table = read_txn
            .open_table(METADATA)
            .map_err(|e| SocialError::Io(e.to_string()))?;
        let next_user_id = meta_table
            .get("next_user_id")
            .map_err(|e| SocialError::Io(e.to_string()))?
            .map(|v| v.value())
            .unwrap_or(1);
        let next_post_id = meta_table
            .get("next_post_id")
            .map_err(|e| SocialError::Io(e.to_string()))?
            .map(|v| v.value())
            .unwrap_or(1);

        Ok(Self {
            db,
            next_user_id,
            next_post_id,
        })
    }

    /// Compact the database (optional optimization).
    pub fn compact(&mut self) -> Result<(), SocialError> {
        self.db
            .compact()
            .map_err(|e| SocialError::Io(e.to_string()))?;
        Ok(())
    }

    /// Persist an id counter inside its own transaction.
    fn store_counter(&self, key: &str, value: u64) -> Result<(), SocialError> {
        let write_txn = self
            .db
            .begin_write()
            .map_err(|e| SocialError::Io(e.to_string()))?;
        {
            let mut meta_table = write_txn
                .open_table(METADATA)
                .map_err(|e| SocialError::Io(e.to_string()))?;
            meta_table
                .insert(key, value)
                .map_err(|e| SocialError::Io(e.to_string()))?;
        }
        write_txn
            .commit()
            .map_err(|e| SocialError::Io(e.to_string()))?;
        Ok(())
    }

    fn read_user(&self, id: UserId) -> Result<Option<User>, SocialError> {
        let read_txn = self
            .db
            .begin_read()
            .map_err(|e| SocialError::Io(e.to_string()))?;
        let users_table = read_txn
            .open_table(USERS)
            .map_err(|e| SocialError::Io(e.to_string()))?;
        users_table
            .get(id.0)
            .map_err(|e| SocialError::Io(e.to_string()))?
            .map(|bytes| {
                postcard::from_bytes::<User>(bytes.value())
                    .map_err(|e| SocialError::Serialization(e.to_string()))
            })
            .transpose()
    }

    fn read_user_by_index(
        &self,
        index: TableDefinition<&'static str, u64>,
        key: &str,
    ) -> Result<Option<User>, SocialError> {
        let read_txn = self
            .db
            .begin_read()
            .map_err(|e| SocialError::Io(e.to_string()))?;
        let index_table = read_txn
            .open_table(index)
            .map_err(|e| SocialError::Io(e.to_string()))?;
        let Some(id) = index_table
            .get(key)
            .map_err(|e| SocialError::Io(e.to_string()))?
            .map(|v| v.value())
        else {
            return Ok(None);
        };
        drop(index_table);
        let users_table = read_txn
            .open_table(USERS)
            .map_err(|e| SocialError::Io(e.to_string()))?;
        users_table
            .get(id)
            .map_err(|e| SocialError::Io(e.to_string()))?
            .map(|bytes| {
                postcard::from_bytes::<User>(bytes.value())
                    .map_err(|e| SocialError::Serialization(e.to_string()))
            })
            .transpose()
    }
}

// =============================================================================
// SOCIALSTORE TRAIT IMPLEMENTATION
// =============================================================================

impl SocialStore for RedbStore {
    fn allocate_user_id(&mut self) -> Result<UserId, SocialError> {
        let id = UserId(self.next_user_id.max(1));
        let next = id.0.saturating_add(1);
        self.store_counter("next_user_id", next)?;
        self.next_user_id = next;
        Ok(id)
    }

    fn insert_user(&mut self, user: User) -> Result<(), SocialError> {
        let user_bytes = postcard::to_allocvec(&user)
            .map_err(|e| SocialError::Serialization(e.to_string()))?;

        let write_txn = self
            .db
            .begin_write()
            .map_err(|e| SocialError::Io(e.to_string()))?;
        {
            let mut username_table = write_txn
                .open_table(USERNAME_INDEX)
                .map_err(|e| SocialError::Io(e.to_string()))?;
            let mut email_table = write_txn
                .open_table(EMAIL_INDEX)
                .map_err(|e| SocialError::Io(e.to_string()))?;

            // Uniqueness backstop, checked and written in one transaction.
            let username_taken = username_table
                .get(user.username.as_str())
                .map_err(|e| SocialError::Io(e.to_string()))?
                .is_some();
            let email_taken = email_table
                .get(user.email.as_str())
                .map_err(|e| SocialError::Io(e.to_string()))?
                .is_some();
            if username_taken || email_taken {
                return Err(SocialError::Conflict(
                    "Email or username already exists".to_string(),
                ));
            }

            username_table
                .insert(user.username.as_str(), user.id.0)
                .map_err(|e| SocialError::Io(e.to_string()))?;
            email_table
                .insert(user.email.as_str(), user.id.0)
                .map_err(|e| SocialError::Io(e.to_string()))?;

            let mut users_table = write_txn
                .open_table(USERS)
                .map_err(|e| SocialError::Io(e.to_string()))?;
            users_table
                .insert(user.id.0, user_bytes.as_slice())
                .map_err(|e| SocialError::Io(e.to_string()))?;
        }
        write_txn
            .commit()
            .map_err(|e| SocialError::Io(e.to_string()))?;
        Ok(())
    }

    fn update_user(&mut self, user: &User) -> Result<(), SocialError> {
        let user_bytes = postcard::to_allocvec(user)
            .map_err(|e| SocialError::Serialization(e.to_string()))?;

        let write_txn = self
            .db
            .begin_write()
            .map_err(|e| SocialError::Io(e.to_string()))?;
        {
            let mut users_table = write_txn
                .open_table(USERS)
                .map_err(|e| SocialError::Io(e.to_string()))?;
            let Some(old) = users_table
                .get(user.id.0)
                .map_err(|e| SocialError::Io(e.to_string()))?
                .map(|bytes| {
                    postcard::from_bytes::<User>(bytes.value())
                        .map_err(|e| SocialError::Serialization(e.to_string()))
                })
                .transpose()?
            else {
                return Err(SocialError::NotFound("User"));
            };

            let mut username_table = write_txn
                .open_table(USERNAME_INDEX)
                .map_err(|e| SocialError::Io(e.to_string()))?;
            let mut email_table = write_txn
                .open_table(EMAIL_INDEX)
                .map_err(|e| SocialError::Io(e.to_string()))?;

            let username_taken = username_table
                .get(user.username.as_str())
                .map_err(|e| SocialError::Io(e.to_string()))?
                .map(|v| v.value())
                .is_some_and(|id| id != user.id.0);
            let email_taken = email_table
                .get(user.email.as_str())
                .map_err(|e| SocialError::Io(e.to_string()))?
                .map(|v| v.value())
                .is_some_and(|id| id != user.id.0);
            if username_taken || email_taken {
                return Err(SocialError::Conflict(
                    "Email or username already exists".to_string(),
                ));
            }

            if old.username != user.username {
                username_table
                    .remove(old.username.as_str())
                    .map_err(|e| SocialError::Io(e.to_string()))?;
            }
            if old.email != user.email {
                email_table
                    .remove(old.email.as_str())
                    .map_err(|e| SocialError::Io(e.to_string()))?;
            }
            username_table
                .insert(user.username.as_str(), user.id.0)
                .map_err(|e| SocialError::Io(e.to_string()))?;
            email_table
                .insert(user.email.as_str(), user.id.0)
                .map_err(|e| SocialError::Io(e.to_string()))?;
            users_table
                .insert(user.id.0, user_bytes.as_slice())
                .map_err(|e| SocialError::Io(e.to_string()))?;
        }
        write_txn
            .commit()
            .map_err(|e| SocialError::Io(e.to_string()))?;
        Ok(())
    }

    fn user(&self, id: UserId) -> Result<Option<User>, SocialError> {
        self.read_user(id)
    }

    fn user_by_username(&self, username: &str) -> Result<Option<User>, SocialError> {
        self.read_user_by_index(USERNAME_INDEX, username)
    }

    fn user_by_email(&self, email: &str) -> Result<Option<User>, SocialError> {
        self.read_user_by_index(EMAIL_INDEX, email)
    }

    fn user_count(&self) -> Result<usize, SocialError> {
        let read_txn = self
            .db
            .begin_read()
            .map_err(|e| SocialError::Io(e.to_string()))?;
        let users_table = read_txn
            .open_table(USERS)
            .map_err(|e| SocialError::Io(e.to_string()))?;
        let len = users_table
            .len()
            .map_err(|e| SocialError::Io(e.to_string()))?;
        Ok(len as usize)
    }

    fn insert_follow(&mut self, follower: UserId, followee: UserId) -> Result<bool, SocialError> {
        let write_txn = self
            .db
            .begin_write()
            .map_err(|e| SocialError::Io(e.to_string()))?;
        let inserted = {
            let mut follows_table = write_txn
                .open_table(FOLLOWS)
                .map_err(|e| SocialError::Io(e.to_string()))?;
            let exists = follows_table
                .get((follower.0, followee.0))
                .map_err(|e| SocialError::Io(e.to_string()))?
                .is_some();
            if exists {
                false
            } else {
                follows_table
                    .insert((follower.0, followee.0), Utc::now().timestamp_millis())
                    .map_err(|e| SocialError::Io(e.to_string()))?;
                true
            }
        };
        write_txn
            .commit()
            .map_err(|e| SocialError::Io(e.to_string()))?;
        Ok(inserted)
    }

    fn remove_follow(&mut self, follower: UserId, followee: UserId) -> Result<bool, SocialError> {
        let write_txn = self
            .db
            .begin_write()
            .map_err(|e| SocialError::Io(e.to_string()))?;
        let removed = {
            let mut follows_table = write_txn
                .open_table(FOLLOWS)
                .map_err(|e| SocialError::Io(e.to_string()))?;
            follows_table
                .remove((follower.0, followee.0))
                .map_err(|e| SocialError::Io(e.to_string()))?
                .is_some()
        };
        write_txn
            .commit()
            .map_err(|e| SocialError::Io(e.to_string()))?;
        Ok(removed)
    }

    fn is_following(&self, follower: UserId, followee: UserId) -> Result<bool, SocialError> {
        let read_txn = self
            .db
            .begin_read()
            .map_err(|e| SocialError::Io(e.to_string()))?;
        let follows_table = read_txn
            .open_table(FOLLOWS)
            .map_err(|e| SocialError::Io(e.to_string()))?;
        Ok(follows_table
            .get((follower.0, followee.0))
            .map_err(|e| SocialError::Io(e.to_string()))?
            .is_some())
    }

    fn following_of(&self, user: UserId) -> Result<Vec<UserId>, SocialError> {
        let read_txn = self
            .db
            .begin_read()
            .map_err(|e| SocialError::Io(e.to_string()))?;
        let follows_table = read_txn
            .open_table(FOLLOWS)
            .map_err(|e| SocialError::Io(e.to_string()))?;

        let mut following = Vec::new();
        for entry in follows_table
            .range((user.0, 0)..=(user.0, u64::MAX))
            .map_err(|e| SocialError::Io(e.to_string()))?
        {
            let (key, _) = entry.map_err(|e| SocialError::Io(e.to_string()))?;
            let (_, followee) = key.value();
            following.push(UserId(followee));
        }
        Ok(following)
    }

    fn followers_of(&self, user: UserId) -> Result<Vec<UserId>, SocialError> {
        let read_txn = self
            .db
            .begin_read()
            .map_err(|e| SocialError::Io(e.to_string()))?;
        let follows_table = read_txn
            .open_table(FOLLOWS)
            .map_err(|e| SocialError::Io(e.to_string()))?;

        // Reverse direction of the edge table: full scan, see DESIGN.md.
        let mut followers = Vec::new();
        for entry in follows_table
            .iter()
            .map_err(|e| SocialError::Io(e.to_string()))?
        {
            let (key, _) = entry.map_err(|e| SocialError::Io(e.to_string()))?;
            let (follower, followee) = key.value();
            if followee == user.0 {
                followers.push(UserId(follower));
            }
        }
        Ok(followers)
    }

    fn allocate_post_id(&mut self) -> Result<PostId, SocialError> {
        let id = PostId(self.next_post_id.max(1));
        let next = id.0.saturating_add(1);
        self.store_counter("next_post_id", next)?;
        self.next_post_id = next;
        Ok(id)
    }

    fn insert_post(&mut self, post: Post) -> Result<(), SocialError> {
        let post_bytes = postcard::to_allocvec(&post)
            .map_err(|e| SocialError::Serialization(e.to_string()))?;

        let write_txn = self
            .db
            .begin_write()
            .map_err(|e| SocialError::Io(e.to_string()))?;
        {
            let mut posts_table = write_txn
                .open_table(POSTS)
                .map_err(|e| SocialError::Io(e.to_string()))?;
            posts_table
                .insert(post.id.0, post_bytes.as_slice())
                .map_err(|e| SocialError::Io(e.to_string()))?;
        }
        write_txn
            .commit()
            .map_err(|e| SocialError::Io(e.to_string()))?;
        Ok(())
    }

    fn update_post(&mut self, post: &Post) -> Result<(), SocialError> {
        let post_bytes = postcard::to_allocvec(post)
            .map_err(|e| SocialError::Serialization(e.to_string()))?;

        let write_txn = self
            .db
            .begin_write()
            .map_err(|e| SocialError::Io(e.to_string()))?;
        {
            let mut posts_table = write_txn
                .open_table(POSTS)
                .map_err(|e| SocialError::Io(e.to_string()))?;
            let exists = posts_table
                .get(post.id.0)
                .map_err(|e| SocialError::Io(e.to_string()))?
                .is_some();
            if !exists {
                return Err(SocialError::NotFound("Post"));
            }
            posts_table
                .insert(post.id.0, post_bytes.as_slice())
                .map_err(|e| SocialError::Io(e.to_string()))?;
        }
        write_txn
            .commit()
            .map_err(|e| SocialError::Io(e.to_string()))?;
        Ok(())
    }

    fn post(&self, id: PostId) -> Result<Option<Post>, SocialError> {
        let read_txn = self
            .db
            .begin_read()
            .map_err(|e| SocialError::Io(e.to_string()))?;
        let posts_table = read_txn
            .open_table(POSTS)
            .map_err(|e| SocialError::Io(e.to_string()))?;
        posts_table
            .get(id.0)
            .map_err(|e| SocialError::Io(e.to_string()))?
            .map(|bytes| {
                postcard::from_bytes::<Post>(bytes.value())
                    .map_err(|e| SocialError::Serialization(e.to_string()))
            })
            .transpose()
    }

    fn posts(&self) -> Result<Vec<Post>, SocialError> {
        let read_txn = self
            .db
            .begin_read()
            .map_err(|e| SocialError::Io(e.to_string()))?;
        let posts_table = read_txn
            .open_table(POSTS)
            .map_err(|e| SocialError::Io(e.to_string()))?;

        let mut posts = Vec::new();
        for entry in posts_table
            .iter()
            .map_err(|e| SocialError::Io(e.to_string()))?
        {
            let (_, bytes) = entry.map_err(|e| SocialError::Io(e.to_string()))?;
            let post: Post = postcard::from_bytes(bytes.value())
                .map_err(|e| SocialError::Serialization(e.to_string()))?;
            posts.push(post);
        }
        Ok(posts)
    }

    fn posts_by_user(&self, user: UserId) -> Result<Vec<Post>, SocialError> {
        Ok(self.posts()?.into_iter().filter(|p| p.user == user).collect())
    }

    fn post_count(&self) -> Result<usize, SocialError> {
        let read_txn = self
            .db
            .begin_read()
            .map_err(|e| SocialError::Io(e.to_string()))?;
        let posts_table = read_txn
            .open_table(POSTS)
            .map_err(|e| SocialError::Io(e.to_string()))?;
        let len = posts_table
            .len()
            .map_err(|e| SocialError::Io(e.to_string()))?;
        Ok(len as usize)
    }
}

// =============================================================================
// TESTS
// =============================================================================
