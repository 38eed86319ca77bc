use crate::{
    AppState,
    auth::{AuthUser, issue_token},
    error::{ApiError, ErrorResponse},
    models::{
        ChangePasswordRequest, CreatePostRequest, LoginRequest, LoginResponse, MessageResponse,
        NewUser, Post, RegisterRequest, RegisterResponse, Role, UpdatePostRequest,
        UpdateProfileRequest, UpdateUserRequest, User,
    },
    password::{hash_password, verify_password},
};
use axum::{
    Json,
    extract::{
        Path, State,
        rejection::{JsonRejection, PathRejection},
    },
};

// Column widths in the users and posts tables.
const MAX_USERNAME_LEN: usize = 255;
const MAX_NAME_LEN: usize = 255;
const MAX_EMAIL_LEN: usize = 255;
const MAX_TITLE_LEN: usize = 300;
const MAX_LINK_LEN: usize = 300;

/// Rejects a present-but-blank replacement value.
fn reject_blank(field: &str, value: Option<&str>) -> Result<(), ApiError> {
    match value {
        Some(v) if v.trim().is_empty() => {
            Err(ApiError::BadRequest(format!("{} must not be empty", field)))
        }
        _ => Ok(()),
    }
}

/// Rejects a value wider than its column. Counts characters, as Postgres `VARCHAR(n)` does.
fn reject_too_long(field: &str, value: Option<&str>, max: usize) -> Result<(), ApiError> {
    match value {
        Some(v) if v.chars().count() > max => Err(ApiError::BadRequest(format!(
            "{} must be at most {} characters",
            field, max
        ))),
        _ => Ok(()),
    }
}

/// Usernames are stored and looked up trimmed.
fn trim_username(username: Option<String>) -> Option<String> {
    username.map(|u| u.trim().to_string())
}

// --- Users & Auth ---

/// list_users
///
/// [Admin Route] Lists every account. Password hashes are never serialized.
#[utoipa::path(
    get,
    path = "/api/v1",
    responses(
        (status = 200, description = "All users", body = [User]),
        (status = 401, description = "Unauthorized", body = ErrorResponse),
        (status = 403, description = "Not an admin", body = ErrorResponse)
    )
)]
pub async fn list_users(
    auth: AuthUser,
    State(state): State<AppState>,
) -> Result<Json<Vec<User>>, ApiError> {
    auth.require_role(Role::Admin)?;
    Ok(Json(state.repo.list_users().await?))
}

/// register
///
/// [Public Route] Creates a new account with the `user` role. Any role in the request
/// body is ignored; promotion happens only through `update_user`.
#[utoipa::path(
    post,
    path = "/api/v1/register",
    request_body = RegisterRequest,
    responses(
        (status = 200, description = "Registered", body = RegisterResponse),
        (status = 400, description = "Invalid request", body = ErrorResponse),
        (status = 409, description = "Username already taken", body = ErrorResponse)
    )
)]
pub async fn register(
    State(state): State<AppState>,
    payload: Result<Json<RegisterRequest>, JsonRejection>,
) -> Result<Json<RegisterResponse>, ApiError> {
    let Json(req) = payload?;

    let username = req.username.trim().to_string();
    if username.is_empty() || req.password.is_empty() {
        return Err(ApiError::BadRequest(
            "Username and password are required".to_string(),
        ));
    }
    reject_too_long("username", Some(&username), MAX_USERNAME_LEN)?;
    reject_too_long("name", Some(&req.name), MAX_NAME_LEN)?;
    reject_too_long("email", Some(&req.email), MAX_EMAIL_LEN)?;

    if state.repo.find_user_by_username(&username).await?.is_some() {
        return Err(ApiError::Conflict("Username already taken".to_string()));
    }

    let password_hash = hash_password(&req.password, state.config.bcrypt_cost).await?;

    // The unique index still guards against a concurrent registration racing the check above.
    let user = state
        .repo
        .create_user(NewUser {
            username,
            name: req.name,
            email: req.email,
            password_hash,
            role: Role::User,
        })
        .await?;

    tracing::info!(user_id = user.id, username = %user.username, "user registered");

    Ok(Json(RegisterResponse {
        message: "User Registered".to_string(),
        success: true,
        name: user.name,
        email: user.email,
    }))
}

/// login
///
/// [Public Route] Checks credentials and issues a bearer token embedding the user's id,
/// name and role. An unknown username and a wrong password produce the same 401.
#[utoipa::path(
    post,
    path = "/api/v1/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Login successful", body = LoginResponse),
        (status = 400, description = "Invalid request", body = ErrorResponse),
        (status = 401, description = "Invalid credentials", body = ErrorResponse)
    )
)]
pub async fn login(
    State(state): State<AppState>,
    payload: Result<Json<LoginRequest>, JsonRejection>,
) -> Result<Json<LoginResponse>, ApiError> {
    let Json(req) = payload?;
    let invalid = || ApiError::Unauthorized("Invalid credentials".to_string());

    let user = state
        .repo
        .find_user_by_username(req.username.trim())
        .await?
        .ok_or_else(invalid)?;

    if !verify_password(&req.password, &user.password_hash).await? {
        tracing::debug!(username = %req.username, "login rejected: wrong password");
        return Err(invalid());
    }

    let token = issue_token(&state.config, user.id, &user.name, user.role)?;

    tracing::info!(user_id = user.id, "user logged in");

    Ok(Json(LoginResponse {
        message: "Login successful".to_string(),
        success: true,
        token,
        name: user.name,
        email: user.email,
        role: user.role,
    }))
}

/// logout
///
/// [Public Route] Tokens are stateless, so there is nothing to invalidate server side.
/// Clients discard the token.
#[utoipa::path(
    post,
    path = "/api/v1/logout",
    responses((status = 200, description = "Logged out", body = MessageResponse))
)]
pub async fn logout() -> Json<MessageResponse> {
    Json(MessageResponse::new("Logout successful"))
}

/// change_password
///
/// [Authenticated Route] Replaces the caller's password after re-checking the old one.
#[utoipa::path(
    put,
    path = "/api/v1/changePassword",
    request_body = ChangePasswordRequest,
    responses(
        (status = 200, description = "Password changed", body = MessageResponse),
        (status = 400, description = "Invalid request", body = ErrorResponse),
        (status = 401, description = "Invalid credentials", body = ErrorResponse),
        (status = 404, description = "User no longer exists", body = ErrorResponse)
    )
)]
pub async fn change_password(
    auth: AuthUser,
    State(state): State<AppState>,
    payload: Result<Json<ChangePasswordRequest>, JsonRejection>,
) -> Result<Json<MessageResponse>, ApiError> {
    let Json(req) = payload?;
    if req.new_password.is_empty() {
        return Err(ApiError::BadRequest("New password is required".to_string()));
    }

    let user = state
        .repo
        .get_user(auth.id)
        .await?
        .ok_or_else(|| ApiError::NotFound("User not found".to_string()))?;

    if !verify_password(&req.old_password, &user.password_hash).await? {
        return Err(ApiError::Unauthorized("Invalid credentials".to_string()));
    }

    let password_hash = hash_password(&req.new_password, state.config.bcrypt_cost).await?;
    if !state.repo.update_password(user.id, &password_hash).await? {
        return Err(ApiError::NotFound("User not found".to_string()));
    }

    tracing::info!(user_id = user.id, "password changed");
    Ok(Json(MessageResponse::new("Password changed successfully")))
}

/// update_user
///
/// [Admin Route] Partially updates another account's username, name, or role.
#[utoipa::path(
    put,
    path = "/api/v1/updateUser/{id}",
    params(("id" = i64, Path, description = "User ID")),
    request_body = UpdateUserRequest,
    responses(
        (status = 200, description = "Updated", body = MessageResponse),
        (status = 403, description = "Not an admin", body = ErrorResponse),
        (status = 404, description = "Not Found", body = ErrorResponse),
        (status = 409, description = "Username already taken", body = ErrorResponse)
    )
)]
pub async fn update_user(
    auth: AuthUser,
    State(state): State<AppState>,
    path: Result<Path<i64>, PathRejection>,
    payload: Result<Json<UpdateUserRequest>, JsonRejection>,
) -> Result<Json<MessageResponse>, ApiError> {
    auth.require_role(Role::Admin)?;
    let Path(id) = path?;
    let Json(mut changes) = payload?;
    changes.username = trim_username(changes.username);
    reject_blank("username", changes.username.as_deref())?;
    reject_too_long("username", changes.username.as_deref(), MAX_USERNAME_LEN)?;
    reject_too_long("name", changes.name.as_deref(), MAX_NAME_LEN)?;

    match state.repo.update_user(id, changes).await? {
        Some(user) => {
            tracing::info!(admin_id = auth.id, user_id = user.id, role = %user.role, "user updated");
            Ok(Json(MessageResponse::new("User data updated successfully")))
        }
        None => Err(ApiError::NotFound("User not found".to_string())),
    }
}

/// delete_user
///
/// [Admin Route] Deletes an account. Posts it owned are kept with their owner cleared.
#[utoipa::path(
    delete,
    path = "/api/v1/deleteUser/{id}",
    params(("id" = i64, Path, description = "User ID")),
    responses(
        (status = 200, description = "Deleted", body = MessageResponse),
        (status = 403, description = "Not an admin", body = ErrorResponse),
        (status = 404, description = "Not Found", body = ErrorResponse)
    )
)]
pub async fn delete_user(
    auth: AuthUser,
    State(state): State<AppState>,
    path: Result<Path<i64>, PathRejection>,
) -> Result<Json<MessageResponse>, ApiError> {
    auth.require_role(Role::Admin)?;
    let Path(id) = path?;

    if !state.repo.delete_user(id).await? {
        return Err(ApiError::NotFound("Unable to delete user".to_string()));
    }

    tracing::info!(admin_id = auth.id, user_id = id, "user deleted");
    Ok(Json(MessageResponse::new("User deleted successfully")))
}

/// get_profile
///
/// [Authenticated Route] Returns the caller's own record.
#[utoipa::path(
    get,
    path = "/api/v1/profile",
    responses(
        (status = 200, description = "Profile", body = User),
        (status = 404, description = "User no longer exists", body = ErrorResponse)
    )
)]
pub async fn get_profile(
    auth: AuthUser,
    State(state): State<AppState>,
) -> Result<Json<User>, ApiError> {
    state
        .repo
        .get_user(auth.id)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::NotFound("User not found".to_string()))
}

/// update_profile
///
/// [Authenticated Route] Lets the caller change their own username and display name.
/// Role is not editable here.
#[utoipa::path(
    put,
    path = "/api/v1/updateProfile",
    request_body = UpdateProfileRequest,
    responses(
        (status = 200, description = "Updated profile", body = User),
        (status = 404, description = "User no longer exists", body = ErrorResponse),
        (status = 409, description = "Username already taken", body = ErrorResponse)
    )
)]
pub async fn update_profile(
    auth: AuthUser,
    State(state): State<AppState>,
    payload: Result<Json<UpdateProfileRequest>, JsonRejection>,
) -> Result<Json<User>, ApiError> {
    let Json(req) = payload?;
    let username = trim_username(req.username);
    reject_blank("username", username.as_deref())?;
    reject_too_long("username", username.as_deref(), MAX_USERNAME_LEN)?;
    reject_too_long("name", req.name.as_deref(), MAX_NAME_LEN)?;

    let changes = UpdateUserRequest {
        username,
        name: req.name,
        role: None,
    };

    state
        .repo
        .update_user(auth.id, changes)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::NotFound("User not found".to_string()))
}

// --- Posts ---

/// list_posts
///
/// [Authenticated Route] Lists every post. Any role may read.
#[utoipa::path(
    get,
    path = "/api/v1/posts",
    responses(
        (status = 200, description = "All posts", body = [Post]),
        (status = 401, description = "Unauthorized", body = ErrorResponse)
    )
)]
pub async fn list_posts(
    auth: AuthUser,
    State(state): State<AppState>,
) -> Result<Json<Vec<Post>>, ApiError> {
    auth.require_role(Role::User)?;
    Ok(Json(state.repo.list_posts().await?))
}

/// get_post
///
/// [Public Route] Retrieves a single post by ID.
#[utoipa::path(
    get,
    path = "/api/v1/posts/{id}",
    params(("id" = i64, Path, description = "Post ID")),
    responses(
        (status = 200, description = "Found", body = Post),
        (status = 404, description = "Not Found", body = ErrorResponse)
    )
)]
pub async fn get_post(
    State(state): State<AppState>,
    path: Result<Path<i64>, PathRejection>,
) -> Result<Json<Post>, ApiError> {
    let Path(id) = path?;
    state
        .repo
        .get_post(id)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::NotFound("Post not found".to_string()))
}

/// create_post
///
/// [Authenticated Route] Creates a post owned by the caller. The owner always comes from
/// the token, never from the body.
#[utoipa::path(
    post,
    path = "/api/v1/posts",
    request_body = CreatePostRequest,
    responses(
        (status = 200, description = "Created", body = Post),
        (status = 400, description = "Invalid request", body = ErrorResponse)
    )
)]
pub async fn create_post(
    auth: AuthUser,
    State(state): State<AppState>,
    payload: Result<Json<CreatePostRequest>, JsonRejection>,
) -> Result<Json<Post>, ApiError> {
    let Json(req) = payload?;
    if req.title.trim().is_empty() {
        return Err(ApiError::BadRequest("Title is required".to_string()));
    }
    reject_too_long("title", Some(&req.title), MAX_TITLE_LEN)?;
    reject_too_long("link", Some(&req.link), MAX_LINK_LEN)?;

    let post = state.repo.create_post(req, auth.id).await?;
    tracing::info!(post_id = post.id, user_id = auth.id, "post created");
    Ok(Json(post))
}

/// update_post
///
/// [Authenticated Route] Partially updates a post. Only the owner or an admin may edit.
#[utoipa::path(
    put,
    path = "/api/v1/posts/{id}",
    params(("id" = i64, Path, description = "Post ID")),
    request_body = UpdatePostRequest,
    responses(
        (status = 200, description = "Updated", body = MessageResponse),
        (status = 403, description = "Not owner", body = ErrorResponse),
        (status = 404, description = "Not Found", body = ErrorResponse)
    )
)]
pub async fn update_post(
    auth: AuthUser,
    State(state): State<AppState>,
    path: Result<Path<i64>, PathRejection>,
    payload: Result<Json<UpdatePostRequest>, JsonRejection>,
) -> Result<Json<MessageResponse>, ApiError> {
    let Path(id) = path?;
    let Json(req) = payload?;
    reject_blank("title", req.title.as_deref())?;
    reject_too_long("title", req.title.as_deref(), MAX_TITLE_LEN)?;
    reject_too_long("link", req.link.as_deref(), MAX_LINK_LEN)?;

    let existing = state
        .repo
        .get_post(id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Post not found".to_string()))?;
    auth.require_owner_or_admin(existing.user_id)?;

    if state.repo.update_post(id, req).await?.is_none() {
        return Err(ApiError::NotFound("Post not found".to_string()));
    }

    Ok(Json(MessageResponse::new("Post updated successfully")))
}

/// delete_post
///
/// [Admin Route] Deletes any post.
#[utoipa::path(
    delete,
    path = "/api/v1/posts/{id}",
    params(("id" = i64, Path, description = "Post ID")),
    responses(
        (status = 200, description = "Deleted", body = MessageResponse),
        (status = 403, description = "Not an admin", body = ErrorResponse),
        (status = 404, description = "Not Found", body = ErrorResponse)
    )
)]
pub async fn delete_post(
    auth: AuthUser,
    State(state): State<AppState>,
    path: Result<Path<i64>, PathRejection>,
) -> Result<Json<MessageResponse>, ApiError> {
    auth.require_role(Role::Admin)?;
    let Path(id) = path?;

    if !state.repo.delete_post(id).await? {
        return Err(ApiError::NotFound("Unable to delete post".to_string()));
    }

    tracing::info!(admin_id = auth.id, post_id = id, "post deleted");
    Ok(Json(MessageResponse::new("Post deleted successfully")))
}
