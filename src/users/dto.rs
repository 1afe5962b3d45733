use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::error::{ApiError, ApiResult};
use crate::recipes::repo::Recipe;
use crate::users::repo::{Role, User};

/// Request body for user registration. `role` is kept as a raw string and
/// required fields default to empty so a missing or unknown value surfaces
/// as a 400 validation error, not a body-deserialization rejection.
#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct RegisterRequest {
    pub full_name: String,
    pub email: String,
    pub password: String,
    pub profile_picture: Option<String>,
    pub bio: Option<String>,
    pub role: Option<String>,
}

/// Only `user` and `cook` may be self-assigned; `admin` and anything
/// unrecognized are rejected before touching the store.
pub fn registration_role(role: Option<&str>) -> ApiResult<Role> {
    match role {
        None | Some("user") => Ok(Role::User),
        Some("cook") => Ok(Role::Cook),
        Some(other) => Err(ApiError::Validation(format!(
            "Role '{other}' is not allowed at registration"
        ))),
    }
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct EmailQuery {
    pub email: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateUserRequest {
    pub full_name: Option<String>,
    pub profile_picture: Option<String>,
    pub bio: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct UpdatePasswordRequest {
    pub old_password: String,
    pub new_password: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FavoriteRequest {
    pub recipe_id: Uuid,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PromoteRequest {
    pub user_id: Uuid,
}

/// Public projection of a user: an explicit allow-list of fields, so the
/// password hash can never leak into a response.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PublicUser {
    pub id: Uuid,
    pub full_name: String,
    pub email: String,
    pub profile_picture: Option<String>,
    pub bio: Option<String>,
    pub role: Role,
    #[serde(with = "time::serde::rfc3339")]
    pub joined_at: OffsetDateTime,
}

impl From<User> for PublicUser {
    fn from(u: User) -> Self {
        Self {
            id: u.id,
            full_name: u.full_name,
            email: u.email,
            profile_picture: u.profile_picture,
            bio: u.bio,
            role: u.role,
            joined_at: u.created_at,
        }
    }
}

/// Response returned after register or login. The client persists this
/// payload whole as its session.
#[derive(Debug, Serialize, Deserialize)]
pub struct AuthResponse {
    pub token: String,
    pub user: PublicUser,
}

#[derive(Debug, Serialize)]
pub struct UserEnvelope {
    pub success: bool,
    pub user: PublicUser,
}

#[derive(Debug, Serialize)]
pub struct UsersEnvelope {
    pub success: bool,
    pub users: Vec<PublicUser>,
}

#[derive(Debug, Serialize)]
pub struct MessageEnvelope {
    pub success: bool,
    pub message: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FavoritesEnvelope {
    pub success: bool,
    pub fav_recipes: Vec<Recipe>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::StatusCode;

    #[test]
    fn registration_role_defaults_to_user() {
        assert_eq!(registration_role(None).unwrap(), Role::User);
        assert_eq!(registration_role(Some("user")).unwrap(), Role::User);
        assert_eq!(registration_role(Some("cook")).unwrap(), Role::Cook);
    }

    #[test]
    fn registration_role_rejects_admin_and_unknown() {
        for bad in ["admin", "superuser", "Cook", ""] {
            let err = registration_role(Some(bad)).unwrap_err();
            assert_eq!(err.status(), StatusCode::BAD_REQUEST, "role {bad:?}");
        }
    }

    #[test]
    fn public_user_never_carries_the_hash() {
        let user = User {
            id: Uuid::new_v4(),
            full_name: "A B".into(),
            email: "a@b.com".into(),
            password_hash: "$argon2id$secret".into(),
            profile_picture: None,
            bio: Some("hi".into()),
            role: Role::Cook,
            created_at: OffsetDateTime::now_utc(),
        };
        let json = serde_json::to_string(&PublicUser::from(user)).unwrap();
        assert!(!json.contains("argon2"));
        assert!(!json.contains("password"));
        assert!(json.contains("\"fullName\":\"A B\""));
        assert!(json.contains("\"role\":\"cook\""));
    }

    #[test]
    fn favorite_request_uses_camel_case_key() {
        let req: FavoriteRequest =
            serde_json::from_str(r#"{"recipeId":"8c3f4a2e-9d1b-4c6a-8e5f-1a2b3c4d5e6f"}"#)
                .unwrap();
        assert_eq!(
            req.recipe_id.to_string(),
            "8c3f4a2e-9d1b-4c6a-8e5f-1a2b3c4d5e6f"
        );
    }
}
