use axum::{
    extract::{FromRef, Path, Query, State},
    http::StatusCode,
    routing::{delete, get, post, put},
    Json, Router,
};
use lazy_static::lazy_static;
use regex::Regex;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::{
    auth::{
        dto::JwtKeys,
        extractors::{CurrentUser, RequireAdmin},
        password::{hash_password, verify_password},
    },
    error::{ApiError, ApiResult},
    recipes,
    state::AppState,
    users::{
        dto::{
            registration_role, AuthResponse, EmailQuery, FavoriteRequest, FavoritesEnvelope,
            LoginRequest, MessageEnvelope, PromoteRequest, PublicUser, RegisterRequest,
            UpdatePasswordRequest, UpdateUserRequest, UserEnvelope, UsersEnvelope,
        },
        repo::{self, Role, User},
    },
};

pub fn user_routes() -> Router<AppState> {
    Router::new()
        .route("/users/register", post(register))
        .route("/users/login", post(login))
        .route("/users/allUser", get(list_users))
        .route("/users/email", get(get_user_by_email))
        .route(
            "/users/:id",
            get(get_user_by_id).put(update_user).delete(delete_user),
        )
        .route("/users/password/:id", put(update_password))
}

pub fn favorites_routes() -> Router<AppState> {
    Router::new()
        .route("/users/addToFav/:id", post(add_to_favorites))
        .route("/users/removeFromFav/:id", delete(remove_from_favorites))
        .route("/users/favRecipes/:id", get(list_fav_recipes))
}

pub fn admin_routes() -> Router<AppState> {
    Router::new().route("/admin/promote", post(promote_to_admin))
}

fn is_valid_email(email: &str) -> bool {
    lazy_static! {
        static ref EMAIL_RE: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
    }
    EMAIL_RE.is_match(email)
}

/// Mutations on a user document are allowed to its owner and to admins.
fn ensure_owner_or_admin(caller: &User, target: Uuid) -> ApiResult<()> {
    if caller.id != target && caller.role != Role::Admin {
        warn!(caller = %caller.id, %target, "user mutation denied");
        return Err(ApiError::Forbidden);
    }
    Ok(())
}

#[instrument(skip(state, payload))]
pub async fn register(
    State(state): State<AppState>,
    Json(payload): Json<RegisterRequest>,
) -> ApiResult<(StatusCode, Json<AuthResponse>)> {
    if payload.full_name.trim().is_empty() {
        return Err(ApiError::Validation("Full name is required".into()));
    }
    if !is_valid_email(&payload.email) {
        warn!(email = %payload.email, "invalid email");
        return Err(ApiError::Validation("Invalid email".into()));
    }
    if payload.password.is_empty() {
        return Err(ApiError::Validation("Password is required".into()));
    }
    let role = registration_role(payload.role.as_deref())?;

    if User::find_by_email(&state.db, &payload.email).await?.is_some() {
        warn!(email = %payload.email, "email already registered");
        return Err(ApiError::Conflict("User already exists".into()));
    }

    let hash = hash_password(&payload.password)?;
    let user = User::create(
        &state.db,
        payload.full_name.trim(),
        &payload.email,
        &hash,
        payload.profile_picture.as_deref(),
        payload.bio.as_deref(),
        role,
    )
    .await?;

    let keys = JwtKeys::from_ref(&state);
    let token = keys.sign(user.id, user.role)?;

    info!(user_id = %user.id, email = %user.email, role = %user.role, "user registered");
    Ok((
        StatusCode::CREATED,
        Json(AuthResponse {
            token,
            user: user.into(),
        }),
    ))
}

#[instrument(skip(state, payload))]
pub async fn login(
    State(state): State<AppState>,
    Json(payload): Json<LoginRequest>,
) -> ApiResult<Json<AuthResponse>> {
    // Unknown email and wrong password fail identically so callers cannot
    // probe which addresses are registered.
    let user = User::find_by_email(&state.db, &payload.email)
        .await?
        .ok_or(ApiError::InvalidCredentials)?;

    if !verify_password(&payload.password, &user.password_hash)? {
        warn!(user_id = %user.id, "login invalid password");
        return Err(ApiError::InvalidCredentials);
    }

    let keys = JwtKeys::from_ref(&state);
    let token = keys.sign(user.id, user.role)?;

    info!(user_id = %user.id, email = %user.email, "user logged in");
    Ok(Json(AuthResponse {
        token,
        user: user.into(),
    }))
}

#[instrument(skip(state))]
pub async fn list_users(State(state): State<AppState>) -> ApiResult<Json<UsersEnvelope>> {
    let users = User::list_all(&state.db).await?;
    Ok(Json(UsersEnvelope {
        success: true,
        users: users.into_iter().map(PublicUser::from).collect(),
    }))
}

#[instrument(skip(state))]
pub async fn get_user_by_email(
    State(state): State<AppState>,
    Query(q): Query<EmailQuery>,
) -> ApiResult<Json<UserEnvelope>> {
    let email = q
        .email
        .ok_or_else(|| ApiError::Validation("Email is required".into()))?;
    let user = User::find_by_email(&state.db, &email)
        .await?
        .ok_or(ApiError::NotFound("User"))?;
    Ok(Json(UserEnvelope {
        success: true,
        user: user.into(),
    }))
}

#[instrument(skip(state))]
pub async fn get_user_by_id(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<UserEnvelope>> {
    let user = User::find_by_id(&state.db, id)
        .await?
        .ok_or(ApiError::NotFound("User"))?;
    Ok(Json(UserEnvelope {
        success: true,
        user: user.into(),
    }))
}

#[instrument(skip(state, payload, caller))]
pub async fn update_user(
    State(state): State<AppState>,
    CurrentUser(caller): CurrentUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateUserRequest>,
) -> ApiResult<Json<UserEnvelope>> {
    ensure_owner_or_admin(&caller, id)?;
    let user = User::update_profile(
        &state.db,
        id,
        payload.full_name.as_deref(),
        payload.profile_picture.as_deref(),
        payload.bio.as_deref(),
    )
    .await?
    .ok_or(ApiError::NotFound("User"))?;

    info!(user_id = %id, "profile updated");
    Ok(Json(UserEnvelope {
        success: true,
        user: user.into(),
    }))
}

#[instrument(skip(state, payload, caller))]
pub async fn update_password(
    State(state): State<AppState>,
    CurrentUser(caller): CurrentUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdatePasswordRequest>,
) -> ApiResult<Json<MessageEnvelope>> {
    ensure_owner_or_admin(&caller, id)?;
    let target = User::find_by_id(&state.db, id)
        .await?
        .ok_or(ApiError::NotFound("User"))?;

    if !verify_password(&payload.old_password, &target.password_hash)? {
        warn!(user_id = %id, "password change with wrong old password");
        return Err(ApiError::InvalidCredentials);
    }
    if payload.new_password.is_empty() {
        return Err(ApiError::Validation("New password is required".into()));
    }

    let hash = hash_password(&payload.new_password)?;
    User::update_password_hash(&state.db, id, &hash).await?;

    info!(user_id = %id, "password updated");
    Ok(Json(MessageEnvelope {
        success: true,
        message: "Password updated".into(),
    }))
}

#[instrument(skip(state, admin))]
pub async fn delete_user(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<MessageEnvelope>> {
    let cascaded = repo::User::delete_cascading(&state.db, id)
        .await?
        .ok_or(ApiError::NotFound("User"))?;

    info!(deleted_by = %admin.id, user_id = %id, cascaded, "user deleted");
    Ok(Json(MessageEnvelope {
        success: true,
        message: format!("User deleted ({cascaded} recipes removed)"),
    }))
}

#[instrument(skip(state, caller, payload))]
pub async fn add_to_favorites(
    State(state): State<AppState>,
    CurrentUser(caller): CurrentUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<FavoriteRequest>,
) -> ApiResult<Json<FavoritesEnvelope>> {
    ensure_owner_or_admin(&caller, id)?;

    if recipes::repo::Recipe::find_by_id(&state.db, payload.recipe_id)
        .await?
        .is_none()
    {
        return Err(ApiError::NotFound("Recipe"));
    }

    if !repo::add_favorite(&state.db, id, payload.recipe_id).await? {
        return Err(ApiError::Conflict("Recipe already in favorites".into()));
    }

    info!(user_id = %id, recipe_id = %payload.recipe_id, "favorite added");
    let fav_recipes = repo::list_favorites(&state.db, id).await?;
    Ok(Json(FavoritesEnvelope {
        success: true,
        fav_recipes,
    }))
}

#[instrument(skip(state, caller, payload))]
pub async fn remove_from_favorites(
    State(state): State<AppState>,
    CurrentUser(caller): CurrentUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<FavoriteRequest>,
) -> ApiResult<Json<FavoritesEnvelope>> {
    ensure_owner_or_admin(&caller, id)?;

    if !repo::remove_favorite(&state.db, id, payload.recipe_id).await? {
        return Err(ApiError::NotFound("Favorite"));
    }

    info!(user_id = %id, recipe_id = %payload.recipe_id, "favorite removed");
    let fav_recipes = repo::list_favorites(&state.db, id).await?;
    Ok(Json(FavoritesEnvelope {
        success: true,
        fav_recipes,
    }))
}

#[instrument(skip(state, caller))]
pub async fn list_fav_recipes(
    State(state): State<AppState>,
    CurrentUser(caller): CurrentUser,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<FavoritesEnvelope>> {
    ensure_owner_or_admin(&caller, id)?;
    let fav_recipes = repo::list_favorites(&state.db, id).await?;
    Ok(Json(FavoritesEnvelope {
        success: true,
        fav_recipes,
    }))
}

#[instrument(skip(state, admin, payload))]
pub async fn promote_to_admin(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    Json(payload): Json<PromoteRequest>,
) -> ApiResult<Json<UserEnvelope>> {
    let user = User::set_role(&state.db, payload.user_id, Role::Admin)
        .await?
        .ok_or(ApiError::NotFound("User"))?;

    info!(promoted_by = %admin.id, user_id = %user.id, "user promoted to admin");
    Ok(Json(UserEnvelope {
        success: true,
        user: user.into(),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::OffsetDateTime;

    fn make_user(id: Uuid, role: Role) -> User {
        User {
            id,
            full_name: "A B".into(),
            email: "a@b.com".into(),
            password_hash: "hash".into(),
            profile_picture: None,
            bio: None,
            role,
            created_at: OffsetDateTime::now_utc(),
        }
    }

    #[test]
    fn email_validation() {
        assert!(is_valid_email("a@b.com"));
        assert!(is_valid_email("first.last@sub.domain.org"));
        assert!(!is_valid_email("not-an-email"));
        assert!(!is_valid_email("a@b"));
        assert!(!is_valid_email("a b@c.com"));
    }

    #[test]
    fn owner_may_mutate_own_record() {
        let id = Uuid::new_v4();
        let user = make_user(id, Role::User);
        assert!(ensure_owner_or_admin(&user, id).is_ok());
    }

    #[test]
    fn admin_may_mutate_any_record() {
        let admin = make_user(Uuid::new_v4(), Role::Admin);
        assert!(ensure_owner_or_admin(&admin, Uuid::new_v4()).is_ok());
    }

    #[test]
    fn other_users_are_forbidden() {
        for role in [Role::User, Role::Cook] {
            let caller = make_user(Uuid::new_v4(), role);
            let err = ensure_owner_or_admin(&caller, Uuid::new_v4()).unwrap_err();
            assert_eq!(err.status(), StatusCode::FORBIDDEN);
        }
    }
}
