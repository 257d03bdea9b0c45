//! # API Endpoint Handlers
//!
//! This module implements the actual HTTP endpoint handlers.
//!
//! Every handler converts a `SocialError` into exactly one status code plus
//! a `{"message"}` body through [`failure`]. Store and I/O failures are
//! logged and surface as a generic 500.

use super::{
    AppState,
    auth::CurrentUser,
    types::{
        AuthResponse, CommentRequest, CreatePostRequest, HealthResponse, LikesResponse,
        LoginRequest, MessageResponse, ProfileResponse, RegisterRequest, SortQuery,
        UpdateProfileRequest,
    },
    uploads::UploadStore,
};
use axum::{
    Json,
    extract::{FromRequest, Multipart, Path, Query, Request, State},
    http::{StatusCode, header},
};
use murmur_core::{
    CommentId, CommentView, MediaView, PostId, PostView, PublicProfile, ReplyView, SocialError,
    UserId, UserIdent, UserSummary, primitives::MAX_POST_IMAGES,
};

/// The uniform error shape handlers return.
type ApiError = (StatusCode, Json<MessageResponse>);

// =============================================================================
// ERROR MAPPING
// =============================================================================

/// Map a core error onto its status code and message body.
fn failure(err: SocialError) -> ApiError {
    let status = match &err {
        SocialError::Validation(_) => StatusCode::BAD_REQUEST,
        SocialError::Authentication => StatusCode::UNAUTHORIZED,
        SocialError::Forbidden(_) => StatusCode::FORBIDDEN,
        SocialError::NotFound(_) => StatusCode::NOT_FOUND,
        SocialError::Conflict(_) => StatusCode::CONFLICT,
        SocialError::Serialization(_) | SocialError::Io(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };
    if status == StatusCode::INTERNAL_SERVER_ERROR {
        tracing::error!(error = %err, "Store failure while handling request");
        return (status, Json(MessageResponse::new("Server error")));
    }
    (status, Json(MessageResponse::new(err.to_string())))
}

fn bad_request(message: impl Into<String>) -> ApiError {
    (StatusCode::BAD_REQUEST, Json(MessageResponse::new(message)))
}

/// Parse a path id, treating malformed values as a missing entity.
fn parse_id_or_missing(raw: &str, entity: &'static str) -> Result<u64, ApiError> {
    raw.parse::<u64>()
        .map_err(|_| failure(SocialError::NotFound(entity)))
}

/// Parse a path id, treating malformed values as a validation error. Used by
/// the follow-list routes, which distinguish bad ids from missing users.
fn parse_id_or_invalid(raw: &str) -> Result<u64, ApiError> {
    raw.parse::<u64>()
        .map_err(|_| bad_request("Invalid user id"))
}

fn is_multipart(request: &Request) -> bool {
    request
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|ct| ct.starts_with("multipart/form-data"))
}

// =============================================================================
// HEALTH HANDLER
// =============================================================================

/// Health check endpoint.
pub async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse::default())
}

// =============================================================================
// AUTH HANDLERS
// =============================================================================

/// Register a new user and issue a token.
pub async fn register_handler(
    State(state): State<AppState>,
    Json(request): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<AuthResponse>), ApiError> {
    let user = {
        let mut session = state.session.write().await;
        session
            .register(&request.username, &request.email, &request.password)
            .map_err(failure)?
    };
    let token = state.tokens.issue(user.id).map_err(failure)?;
    tracing::info!(user = %user.username, "User registered");
    Ok((
        StatusCode::CREATED,
        Json(AuthResponse::from_user(&user, token)),
    ))
}

/// Log in with email and password and issue a token.
pub async fn login_handler(
    State(state): State<AppState>,
    Json(request): Json<LoginRequest>,
) -> Result<Json<AuthResponse>, ApiError> {
    let user = {
        let session = state.session.read().await;
        session
            .login(&request.email, &request.password)
            .map_err(failure)?
    };
    let token = state.tokens.issue(user.id).map_err(failure)?;
    Ok(Json(AuthResponse::from_user(&user, token)))
}

// =============================================================================
// PROFILE HANDLERS
// =============================================================================

/// The caller's own profile.
pub async fn me_handler(
    State(state): State<AppState>,
    user: CurrentUser,
) -> Result<Json<ProfileResponse>, ApiError> {
    let session = state.session.read().await;
    let user = session.user(user.id).map_err(failure)?;
    Ok(Json(ProfileResponse::from_user(&user)))
}

/// Update the caller's profile. Accepts JSON, or multipart form data when a
/// new avatar file is included.
pub async fn update_profile_handler(
    State(state): State<AppState>,
    user: CurrentUser,
    request: Request,
) -> Result<Json<AuthResponse>, ApiError> {
    let (fields, new_avatar) = if is_multipart(&request) {
        read_profile_form(&state.uploads, user.id, request).await?
    } else {
        let Json(fields) = Json::<UpdateProfileRequest>::from_request(request, &())
            .await
            .map_err(|e| bad_request(e.to_string()))?;
        (fields, None)
    };

    let replaced_avatar = new_avatar.is_some();
    let previous_avatar = user.avatar.clone();
    let updated = {
        let mut session = state.session.write().await;
        session
            .update_profile(user.id, fields.into_update(new_avatar))
            .map_err(failure)?
    };

    // Best-effort cleanup of the replaced file; sentinel and external
    // values are skipped inside delete_stored.
    if replaced_avatar {
        state.uploads.delete_stored(&previous_avatar).await;
    }

    let token = state.tokens.issue(updated.id).map_err(failure)?;
    Ok(Json(AuthResponse::from_user(&updated, token)))
}

async fn read_profile_form(
    uploads: &UploadStore,
    user: UserId,
    request: Request,
) -> Result<(UpdateProfileRequest, Option<String>), ApiError> {
    let mut multipart = Multipart::from_request(request, &())
        .await
        .map_err(|e| bad_request(e.to_string()))?;

    let mut fields = UpdateProfileRequest::default();
    let mut avatar = None;
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| bad_request(e.to_string()))?
    {
        let name = field.name().map(ToString::to_string);
        match name.as_deref() {
            Some("username") => {
                fields.username = Some(field.text().await.map_err(|e| bad_request(e.to_string()))?);
            }
            Some("email") => {
                fields.email = Some(field.text().await.map_err(|e| bad_request(e.to_string()))?);
            }
            Some("bio") => {
                fields.bio = Some(field.text().await.map_err(|e| bad_request(e.to_string()))?);
            }
            Some("password") => {
                fields.password = Some(field.text().await.map_err(|e| bad_request(e.to_string()))?);
            }
            Some("avatar") => {
                let file_name = field.file_name().map(ToString::to_string);
                let content_type = field.content_type().map(ToString::to_string);
                let data = field.bytes().await.map_err(|e| bad_request(e.to_string()))?;
                let stored = uploads
                    .save_avatar(user, file_name.as_deref(), content_type.as_deref(), data)
                    .await
                    .map_err(failure)?;
                avatar = Some(stored);
            }
            _ => {}
        }
    }
    Ok((fields, avatar))
}

/// Public profile by user id.
pub async fn profile_by_id_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<PublicProfile>, ApiError> {
    let id = parse_id_or_missing(&id, "User")?;
    let session = state.session.read().await;
    let profile = session
        .public_profile(&UserIdent::Id(UserId(id)))
        .map_err(failure)?;
    Ok(Json(profile))
}

/// Public profile by username.
pub async fn profile_by_username_handler(
    State(state): State<AppState>,
    Path(username): Path<String>,
) -> Result<Json<PublicProfile>, ApiError> {
    let session = state.session.read().await;
    let profile = session
        .public_profile(&UserIdent::Name(username))
        .map_err(failure)?;
    Ok(Json(profile))
}

// =============================================================================
// SOCIAL GRAPH HANDLERS
// =============================================================================

/// Follow a user.
pub async fn follow_handler(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<String>,
) -> Result<Json<MessageResponse>, ApiError> {
    let target = parse_id_or_missing(&id, "User")?;
    let mut session = state.session.write().await;
    session.follow(user.id, UserId(target)).map_err(failure)?;
    Ok(Json(MessageResponse::new("User followed")))
}

/// Unfollow a user. Idempotent.
pub async fn unfollow_handler(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<String>,
) -> Result<Json<MessageResponse>, ApiError> {
    let target = parse_id_or_missing(&id, "User")?;
    let mut session = state.session.write().await;
    session.unfollow(user.id, UserId(target)).map_err(failure)?;
    Ok(Json(MessageResponse::new("User unfollowed")))
}

/// Users the subject follows, addressed by id.
pub async fn following_by_id_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Vec<UserSummary>>, ApiError> {
    let id = parse_id_or_invalid(&id)?;
    let session = state.session.read().await;
    let list = session
        .following_list(&UserIdent::Id(UserId(id)))
        .map_err(failure)?;
    Ok(Json(list))
}

/// Users the subject follows, addressed by username.
pub async fn following_by_username_handler(
    State(state): State<AppState>,
    Path(username): Path<String>,
) -> Result<Json<Vec<UserSummary>>, ApiError> {
    let session = state.session.read().await;
    let list = session
        .following_list(&UserIdent::Name(username))
        .map_err(failure)?;
    Ok(Json(list))
}

/// Users following the subject, addressed by id.
pub async fn followers_by_id_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Vec<UserSummary>>, ApiError> {
    let id = parse_id_or_invalid(&id)?;
    let session = state.session.read().await;
    let list = session
        .followers_list(&UserIdent::Id(UserId(id)))
        .map_err(failure)?;
    Ok(Json(list))
}

/// Users following the subject, addressed by username.
pub async fn followers_by_username_handler(
    State(state): State<AppState>,
    Path(username): Path<String>,
) -> Result<Json<Vec<UserSummary>>, ApiError> {
    let session = state.session.read().await;
    let list = session
        .followers_list(&UserIdent::Name(username))
        .map_err(failure)?;
    Ok(Json(list))
}

// =============================================================================
// AGGREGATION HANDLERS
// =============================================================================

/// All comments authored by the subject, newest-first.
pub async fn user_replies_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Vec<ReplyView>>, ApiError> {
    let id = parse_id_or_missing(&id, "User")?;
    let session = state.session.read().await;
    let replies = session.user_replies(UserId(id)).map_err(failure)?;
    Ok(Json(replies))
}

/// All images from the subject's posts, newest post first.
pub async fn user_media_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Vec<MediaView>>, ApiError> {
    let id = parse_id_or_missing(&id, "User")?;
    let session = state.session.read().await;
    let media = session.user_media(UserId(id)).map_err(failure)?;
    Ok(Json(media))
}

/// All posts the subject has liked, newest-first.
pub async fn user_liked_posts_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Vec<PostView>>, ApiError> {
    let id = parse_id_or_missing(&id, "User")?;
    let session = state.session.read().await;
    let posts = session.user_liked_posts(UserId(id)).map_err(failure)?;
    Ok(Json(posts))
}

// =============================================================================
// POST HANDLERS
// =============================================================================

/// Create a post. Accepts JSON, or multipart form data carrying up to five
/// image files under the `images` field.
pub async fn create_post_handler(
    State(state): State<AppState>,
    user: CurrentUser,
    request: Request,
) -> Result<(StatusCode, Json<PostView>), ApiError> {
    let body = if is_multipart(&request) {
        read_post_form(&state.uploads, user.id, request).await?
    } else {
        let Json(body) = Json::<CreatePostRequest>::from_request(request, &())
            .await
            .map_err(|e| bad_request(e.to_string()))?;
        body
    };

    let mut session = state.session.write().await;
    let view = session
        .create_post(user.id, &body.title, &body.content, body.images)
        .map_err(failure)?;
    Ok((StatusCode::CREATED, Json(view)))
}

async fn read_post_form(
    uploads: &UploadStore,
    user: UserId,
    request: Request,
) -> Result<CreatePostRequest, ApiError> {
    let mut multipart = Multipart::from_request(request, &())
        .await
        .map_err(|e| bad_request(e.to_string()))?;

    let mut body = CreatePostRequest::default();
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| bad_request(e.to_string()))?
    {
        let name = field.name().map(ToString::to_string);
        match name.as_deref() {
            Some("title") => {
                body.title = field.text().await.map_err(|e| bad_request(e.to_string()))?;
            }
            Some("content") => {
                body.content = field.text().await.map_err(|e| bad_request(e.to_string()))?;
            }
            Some("images") => {
                if body.images.len() >= MAX_POST_IMAGES {
                    return Err(bad_request("A post can carry at most 5 images"));
                }
                let file_name = field.file_name().map(ToString::to_string);
                let content_type = field.content_type().map(ToString::to_string);
                let data = field.bytes().await.map_err(|e| bad_request(e.to_string()))?;
                let stored = uploads
                    .save_post_image(
                        user,
                        body.images.len(),
                        file_name.as_deref(),
                        content_type.as_deref(),
                        data,
                    )
                    .await
                    .map_err(failure)?;
                body.images.push(stored);
            }
            _ => {}
        }
    }
    Ok(body)
}

/// All posts, newest-first.
pub async fn list_posts_handler(
    State(state): State<AppState>,
    Query(query): Query<SortQuery>,
) -> Result<Json<Vec<PostView>>, ApiError> {
    let session = state.session.read().await;
    let posts = session.list_posts(query.comment_sort()).map_err(failure)?;
    Ok(Json(posts))
}

/// A single post by id.
pub async fn get_post_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(query): Query<SortQuery>,
) -> Result<Json<PostView>, ApiError> {
    let id = parse_id_or_missing(&id, "Post")?;
    let session = state.session.read().await;
    let post = session
        .get_post(PostId(id), query.comment_sort())
        .map_err(failure)?;
    Ok(Json(post))
}

/// All posts owned by a user, newest-first.
pub async fn posts_by_user_handler(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
    Query(query): Query<SortQuery>,
) -> Result<Json<Vec<PostView>>, ApiError> {
    let user_id = parse_id_or_missing(&user_id, "User")?;
    let session = state.session.read().await;
    let posts = session
        .posts_by_user(UserId(user_id), query.comment_sort())
        .map_err(failure)?;
    Ok(Json(posts))
}

// =============================================================================
// COMMENT HANDLERS
// =============================================================================

/// Add a comment to a post.
pub async fn add_comment_handler(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<String>,
    Json(request): Json<CommentRequest>,
) -> Result<(StatusCode, Json<CommentView>), ApiError> {
    let post_id = parse_id_or_missing(&id, "Post")?;
    let mut session = state.session.write().await;
    let comment = session
        .add_comment(PostId(post_id), user.id, &request.text)
        .map_err(failure)?;
    Ok((StatusCode::CREATED, Json(comment)))
}

/// Delete a comment. Allowed for the comment's author or the post's owner.
pub async fn delete_comment_handler(
    State(state): State<AppState>,
    user: CurrentUser,
    Path((post_id, comment_id)): Path<(String, String)>,
) -> Result<Json<MessageResponse>, ApiError> {
    let post_id = parse_id_or_missing(&post_id, "Post")?;
    let comment_id = parse_id_or_missing(&comment_id, "Comment")?;
    let mut session = state.session.write().await;
    session
        .delete_comment(PostId(post_id), CommentId(comment_id), user.id)
        .map_err(failure)?;
    Ok(Json(MessageResponse::new("Comment deleted")))
}

// =============================================================================
// LIKE HANDLERS
// =============================================================================

/// Toggle the caller's like on a post.
pub async fn like_post_handler(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<String>,
) -> Result<Json<LikesResponse>, ApiError> {
    let post_id = parse_id_or_missing(&id, "Post")?;
    let mut session = state.session.write().await;
    let likes = session
        .toggle_like_post(PostId(post_id), user.id)
        .map_err(failure)?;
    Ok(Json(LikesResponse::new(likes)))
}

/// Toggle the caller's like on a comment.
pub async fn like_comment_handler(
    State(state): State<AppState>,
    user: CurrentUser,
    Path((post_id, comment_id)): Path<(String, String)>,
) -> Result<Json<LikesResponse>, ApiError> {
    let post_id = parse_id_or_missing(&post_id, "Post")?;
    let comment_id = parse_id_or_missing(&comment_id, "Comment")?;
    let mut session = state.session.write().await;
    let likes = session
        .toggle_like_comment(PostId(post_id), CommentId(comment_id), user.id)
        .map_err(failure)?;
    Ok(Json(LikesResponse::new(likes)))
}
