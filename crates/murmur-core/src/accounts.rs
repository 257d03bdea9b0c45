//! # Account Operations
//!
//! Registration, login, and profile updates, operating through the
//! `SocialStore` trait.
//!
//! Duplicate checks at registration are two independent lookups followed by
//! the store's single-transaction unique index as the final backstop, so a
//! race between two identical registrations still resolves to exactly one
//! account.

use crate::identity::{User, hash_password, verify_password};
use crate::primitives::{MAX_BIO_LENGTH, MIN_PASSWORD_LENGTH};
use crate::store::SocialStore;
use crate::types::{Email, SocialError, UserId, Username};

// =============================================================================
// UPDATE PAYLOAD
// =============================================================================

/// A partial profile update. `None` fields are left unchanged; `Some("")`
/// for `bio` explicitly clears it.
#[derive(Debug, Clone, Default)]
pub struct ProfileUpdate {
    /// New username. Blank values are treated as absent.
    pub username: Option<String>,
    /// New email. Blank values are treated as absent.
    pub email: Option<String>,
    /// New bio. An empty string is applied, not ignored.
    pub bio: Option<String>,
    /// New clear-text password, re-hashed on application. Blank values are
    /// treated as absent.
    pub password: Option<String>,
    /// New stored avatar path. Set by the upload layer after the file is
    /// written.
    pub avatar: Option<String>,
}

// =============================================================================
// REGISTRATION / LOGIN
// =============================================================================

/// Register a new user. Returns the persisted record.
pub fn register(
    store: &mut dyn SocialStore,
    username: &str,
    email: &str,
    password: &str,
) -> Result<User, SocialError> {
    let username = Username::new(username);
    let email = Email::new(email);

    if !username.is_valid() || email.as_str().is_empty() || password.is_empty() {
        return Err(SocialError::Validation(
            "Please provide all required fields".to_string(),
        ));
    }
    if !email.is_valid() {
        return Err(SocialError::Validation(
            "Please fill a valid email address".to_string(),
        ));
    }
    if password.len() < MIN_PASSWORD_LENGTH {
        return Err(SocialError::Validation(
            "Password must be at least 6 characters long".to_string(),
        ));
    }

    // Two independent pre-checks; the store's unique index catches the race
    // where both pass before either write lands.
    if store.user_by_email(email.as_str())?.is_some() {
        return Err(SocialError::Conflict(
            "User already exists with this email".to_string(),
        ));
    }
    if store.user_by_username(username.as_str())?.is_some() {
        return Err(SocialError::Conflict(
            "Username is already taken".to_string(),
        ));
    }

    let password_hash = hash_password(password)?;
    let id = store.allocate_user_id()?;
    let user = User::new(id, username, email, password_hash);
    store.insert_user(user.clone())?;
    Ok(user)
}

/// Authenticate by email and password.
///
/// An unknown email and a wrong password produce the same error.
pub fn login(store: &dyn SocialStore, email: &str, password: &str) -> Result<User, SocialError> {
    if email.trim().is_empty() || password.is_empty() {
        return Err(SocialError::Validation(
            "Please provide email and password".to_string(),
        ));
    }

    let email = Email::new(email);
    match store.user_by_email(email.as_str())? {
        Some(user) if verify_password(password, &user.password_hash) => Ok(user),
        _ => Err(SocialError::Authentication),
    }
}

// =============================================================================
// PROFILE UPDATE
// =============================================================================

/// Apply a partial profile update and return the new record.
pub fn update_profile(
    store: &mut dyn SocialStore,
    id: UserId,
    update: ProfileUpdate,
) -> Result<User, SocialError> {
    let Some(mut user) = store.user(id)? else {
        return Err(SocialError::NotFound("User"));
    };

    if let Some(username) = update.username {
        let username = Username::new(username);
        if username.is_valid() {
            user.username = username;
        }
    }
    if let Some(email) = update.email {
        let email = Email::new(email);
        if !email.as_str().is_empty() {
            if !email.is_valid() {
                return Err(SocialError::Validation(
                    "Please fill a valid email address".to_string(),
                ));
            }
            user.email = email;
        }
    }
    if let Some(bio) = update.bio {
        if bio.chars().count() > MAX_BIO_LENGTH {
            return Err(SocialError::Validation(
                "Bio must be at most 200 characters".to_string(),
            ));
        }
        user.bio = bio;
    }
    if let Some(password) = update.password {
        if !password.is_empty() {
            if password.len() < MIN_PASSWORD_LENGTH {
                return Err(SocialError::Validation(
                    "Password must be at least 6 characters long".to_string(),
                ));
            }
            user.password_hash = hash_password(&password)?;
        }
    }
    if let Some(avatar) = update.avatar {
        user.avatar = avatar;
    }

    store.update_user(&user)?;
    Ok(user)
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    #[test]
    fn register_then_login_round_trip() {
        let mut store = MemoryStore::new();
        let user = register(&mut store, "alice", "a@x.com", "secret1");
        assert!(user.is_ok());

        let logged_in = login(&store, "a@x.com", "secret1");
        assert!(logged_in.is_ok_and(|u| u.username.as_str() == "alice"));
    }

    #[test]
    fn login_is_case_insensitive_on_email() {
        let mut store = MemoryStore::new();
        assert!(register(&mut store, "alice", "a@x.com", "secret1").is_ok());
        assert!(login(&store, "A@X.COM", "secret1").is_ok());
    }

    #[test]
    fn register_missing_fields() {
        let mut store = MemoryStore::new();
        assert!(matches!(
            register(&mut store, "", "a@x.com", "secret1"),
            Err(SocialError::Validation(_))
        ));
        assert!(matches!(
            register(&mut store, "alice", "", "secret1"),
            Err(SocialError::Validation(_))
        ));
        assert!(matches!(
            register(&mut store, "alice", "a@x.com", ""),
            Err(SocialError::Validation(_))
        ));
    }

    #[test]
    fn register_short_password() {
        let mut store = MemoryStore::new();
        assert!(matches!(
            register(&mut store, "alice", "a@x.com", "short"),
            Err(SocialError::Validation(_))
        ));
    }

    #[test]
    fn register_duplicate_email_or_username_conflicts() {
        let mut store = MemoryStore::new();
        assert!(register(&mut store, "alice", "a@x.com", "secret1").is_ok());
        assert!(matches!(
            register(&mut store, "bob", "a@x.com", "secret1"),
            Err(SocialError::Conflict(_))
        ));
        assert!(matches!(
            register(&mut store, "alice", "b@x.com", "secret1"),
            Err(SocialError::Conflict(_))
        ));
    }

    #[test]
    fn login_failures_are_indistinguishable() {
        let mut store = MemoryStore::new();
        assert!(register(&mut store, "alice", "a@x.com", "secret1").is_ok());

        let unknown = login(&store, "nobody@x.com", "secret1");
        let wrong = login(&store, "a@x.com", "wrong-password");
        let unknown_msg = unknown.err().map(|e| e.to_string());
        let wrong_msg = wrong.err().map(|e| e.to_string());
        assert!(unknown_msg.is_some());
        assert_eq!(unknown_msg, wrong_msg);
    }

    #[test]
    fn update_applies_only_present_fields() {
        let mut store = MemoryStore::new();
        let user = register(&mut store, "alice", "a@x.com", "secret1");
        let Ok(user) = user else {
            return;
        };

        let updated = update_profile(
            &mut store,
            user.id,
            ProfileUpdate {
                bio: Some(String::new()),
                ..ProfileUpdate::default()
            },
        );
        assert!(updated.is_ok_and(|u| {
            u.username.as_str() == "alice" && u.email.as_str() == "a@x.com" && u.bio.is_empty()
        }));
    }

    #[test]
    fn update_blank_username_is_ignored() {
        let mut store = MemoryStore::new();
        let Ok(user) = register(&mut store, "alice", "a@x.com", "secret1") else {
            return;
        };
        let updated = update_profile(
            &mut store,
            user.id,
            ProfileUpdate {
                username: Some("  ".to_string()),
                ..ProfileUpdate::default()
            },
        );
        assert!(updated.is_ok_and(|u| u.username.as_str() == "alice"));
    }

    #[test]
    fn update_rotates_password() {
        let mut store = MemoryStore::new();
        let Ok(user) = register(&mut store, "alice", "a@x.com", "secret1") else {
            return;
        };
        let updated = update_profile(
            &mut store,
            user.id,
            ProfileUpdate {
                password: Some("secret2".to_string()),
                ..ProfileUpdate::default()
            },
        );
        assert!(updated.is_ok());
        assert!(login(&store, "a@x.com", "secret2").is_ok());
        assert!(login(&store, "a@x.com", "secret1").is_err());
    }

    #[test]
    fn update_short_password_rejected() {
        let mut store = MemoryStore::new();
        let Ok(user) = register(&mut store, "alice", "a@x.com", "secret1") else {
            return;
        };
        assert!(matches!(
            update_profile(
                &mut store,
                user.id,
                ProfileUpdate {
                    password: Some("abc".to_string()),
                    ..ProfileUpdate::default()
                },
            ),
            Err(SocialError::Validation(_))
        ));
    }

    #[test]
    fn update_to_taken_email_conflicts() {
        let mut store = MemoryStore::new();
        assert!(register(&mut store, "alice", "a@x.com", "secret1").is_ok());
        let Ok(bob) = register(&mut store, "bob", "b@x.com", "secret1") else {
            return;
        };
        assert!(matches!(
            update_profile(
                &mut store,
                bob.id,
                ProfileUpdate {
                    email: Some("a@x.com".to_string()),
                    ..ProfileUpdate::default()
                },
            ),
            Err(SocialError::Conflict(_))
        ));
    }

    #[test]
    fn update_oversized_bio_rejected() {
        let mut store = MemoryStore::new();
        let Ok(user) = register(&mut store, "alice", "a@x.com", "secret1") else {
            return;
        };
        assert!(matches!(
            update_profile(
                &mut store,
                user.id,
                ProfileUpdate {
                    bio: Some("x".repeat(MAX_BIO_LENGTH + 1)),
                    ..ProfileUpdate::default()
                },
            ),
            Err(SocialError::Validation(_))
        ));
    }
}
