use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::recipes::repo::Recipe;

/// Role of a user. Stored as the `user_role` Postgres enum.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(type_name = "user_role", rename_all = "lowercase")]
pub enum Role {
    User,
    Cook,
    Admin,
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Role::User => "user",
            Role::Cook => "cook",
            Role::Admin => "admin",
        };
        f.write_str(s)
    }
}

/// User record in the database.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct User {
    pub id: Uuid,
    pub full_name: String,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String, // Argon2 hash, never exposed in JSON
    pub profile_picture: Option<String>,
    pub bio: Option<String>,
    pub role: Role,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

const USER_COLUMNS: &str =
    "id, full_name, email, password_hash, profile_picture, bio, role, created_at";

impl User {
    /// Find a user by exact email. No normalization; matching is
    /// case-sensitive by contract.
    pub async fn find_by_email(db: &PgPool, email: &str) -> sqlx::Result<Option<User>> {
        sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE email = $1"
        ))
        .bind(email)
        .fetch_optional(db)
        .await
    }

    pub async fn find_by_id(db: &PgPool, id: Uuid) -> sqlx::Result<Option<User>> {
        sqlx::query_as::<_, User>(&format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1"))
            .bind(id)
            .fetch_optional(db)
            .await
    }

    pub async fn list_all(db: &PgPool) -> sqlx::Result<Vec<User>> {
        sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users ORDER BY created_at"
        ))
        .fetch_all(db)
        .await
    }

    pub async fn create(
        db: &PgPool,
        full_name: &str,
        email: &str,
        password_hash: &str,
        profile_picture: Option<&str>,
        bio: Option<&str>,
        role: Role,
    ) -> sqlx::Result<User> {
        sqlx::query_as::<_, User>(&format!(
            r#"
            INSERT INTO users (full_name, email, password_hash, profile_picture, bio, role)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING {USER_COLUMNS}
            "#
        ))
        .bind(full_name)
        .bind(email)
        .bind(password_hash)
        .bind(profile_picture)
        .bind(bio)
        .bind(role)
        .fetch_one(db)
        .await
    }

    /// Merge-update of the mutable profile fields. Absent fields keep their
    /// stored values; email, role and password have dedicated paths.
    pub async fn update_profile(
        db: &PgPool,
        id: Uuid,
        full_name: Option<&str>,
        profile_picture: Option<&str>,
        bio: Option<&str>,
    ) -> sqlx::Result<Option<User>> {
        sqlx::query_as::<_, User>(&format!(
            r#"
            UPDATE users
            SET full_name = COALESCE($2, full_name),
                profile_picture = COALESCE($3, profile_picture),
                bio = COALESCE($4, bio)
            WHERE id = $1
            RETURNING {USER_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(full_name)
        .bind(profile_picture)
        .bind(bio)
        .fetch_optional(db)
        .await
    }

    pub async fn update_password_hash(
        db: &PgPool,
        id: Uuid,
        password_hash: &str,
    ) -> sqlx::Result<u64> {
        let res = sqlx::query("UPDATE users SET password_hash = $2 WHERE id = $1")
            .bind(id)
            .bind(password_hash)
            .execute(db)
            .await?;
        Ok(res.rows_affected())
    }

    pub async fn set_role(db: &PgPool, id: Uuid, role: Role) -> sqlx::Result<Option<User>> {
        sqlx::query_as::<_, User>(&format!(
            "UPDATE users SET role = $2 WHERE id = $1 RETURNING {USER_COLUMNS}"
        ))
        .bind(id)
        .bind(role)
        .fetch_optional(db)
        .await
    }

    /// Delete a user. When the user's role was cook, all recipes owned by
    /// the user go with it, in the same transaction. Returns the number of
    /// cascaded recipes, or None when the user does not exist.
    pub async fn delete_cascading(db: &PgPool, id: Uuid) -> sqlx::Result<Option<u64>> {
        let mut tx = db.begin().await?;

        let role: Option<Role> =
            sqlx::query_scalar("SELECT role FROM users WHERE id = $1 FOR UPDATE")
                .bind(id)
                .fetch_optional(&mut *tx)
                .await?;
        let Some(role) = role else {
            return Ok(None);
        };

        let mut cascaded = 0;
        if role == Role::Cook {
            cascaded = sqlx::query("DELETE FROM recipes WHERE user_id = $1")
                .bind(id)
                .execute(&mut *tx)
                .await?
                .rows_affected();
        }

        sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(Some(cascaded))
    }
}

/// Add-if-absent, as a single statement so two concurrent submissions of
/// the same favorite cannot both insert. Returns false when it was already
/// present.
pub async fn add_favorite(db: &PgPool, user_id: Uuid, recipe_id: Uuid) -> sqlx::Result<bool> {
    let res = sqlx::query(
        r#"
        INSERT INTO favorites (user_id, recipe_id)
        VALUES ($1, $2)
        ON CONFLICT DO NOTHING
        "#,
    )
    .bind(user_id)
    .bind(recipe_id)
    .execute(db)
    .await?;
    Ok(res.rows_affected() == 1)
}

/// Remove-if-present. Returns false when the recipe was not favorited.
pub async fn remove_favorite(db: &PgPool, user_id: Uuid, recipe_id: Uuid) -> sqlx::Result<bool> {
    let res = sqlx::query("DELETE FROM favorites WHERE user_id = $1 AND recipe_id = $2")
        .bind(user_id)
        .bind(recipe_id)
        .execute(db)
        .await?;
    Ok(res.rows_affected() == 1)
}

/// Favorites joined to the full recipe documents, in insertion order.
pub async fn list_favorites(db: &PgPool, user_id: Uuid) -> sqlx::Result<Vec<Recipe>> {
    sqlx::query_as::<_, Recipe>(
        r#"
        SELECT r.id, r.title, r.picture, r.cook_time_minutes, r.description,
               r.ingredients, r.instructions, r.tags, r.category, r.user_id,
               r.created_at, r.updated_at
        FROM favorites f
        JOIN recipes r ON r.id = f.recipe_id
        WHERE f.user_id = $1
        ORDER BY f.added_at
        "#,
    )
    .bind(user_id)
    .fetch_all(db)
    .await
}
