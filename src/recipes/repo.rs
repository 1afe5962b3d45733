use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};
use time::OffsetDateTime;
use uuid::Uuid;

/// Recipe record in the database. `user` is the owning user and never
/// changes after creation; deleting the owner nulls it unless the cascade
/// removes the recipe entirely.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Recipe {
    pub id: Uuid,
    pub title: String,
    pub picture: Option<String>,
    pub cook_time_minutes: Option<i32>,
    pub description: Option<String>,
    pub ingredients: Vec<String>,
    pub instructions: Option<String>,
    pub tags: Vec<String>,
    pub category: Option<String>,
    #[serde(rename = "user")]
    pub user_id: Option<Uuid>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

/// One rating row with the rating user expanded to id + display name.
/// The name is gone when the rating user was deleted.
#[derive(Debug, Clone, Serialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct RatingEntry {
    #[serde(rename = "user")]
    pub user_id: Uuid,
    pub full_name: Option<String>,
    pub rating: i32,
}

#[derive(Debug, Clone, Serialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct ReviewEntry {
    #[serde(rename = "user")]
    pub user_id: Uuid,
    pub full_name: Option<String>,
    pub review: String,
}

/// Owner reference expanded for detail responses.
#[derive(Debug, Clone, Serialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct OwnerRef {
    pub id: Uuid,
    pub full_name: String,
}

const RECIPE_COLUMNS: &str = "id, title, picture, cook_time_minutes, description, \
     ingredients, instructions, tags, category, user_id, created_at, updated_at";

pub struct NewRecipe<'a> {
    pub title: &'a str,
    pub picture: Option<&'a str>,
    pub cook_time_minutes: Option<i32>,
    pub description: Option<&'a str>,
    pub ingredients: &'a [String],
    pub instructions: Option<&'a str>,
    pub tags: &'a [String],
    pub category: Option<&'a str>,
}

impl Recipe {
    pub async fn create(db: &PgPool, owner: Uuid, new: NewRecipe<'_>) -> sqlx::Result<Recipe> {
        sqlx::query_as::<_, Recipe>(&format!(
            r#"
            INSERT INTO recipes
                (title, picture, cook_time_minutes, description, ingredients,
                 instructions, tags, category, user_id)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            RETURNING {RECIPE_COLUMNS}
            "#
        ))
        .bind(new.title)
        .bind(new.picture)
        .bind(new.cook_time_minutes)
        .bind(new.description)
        .bind(new.ingredients)
        .bind(new.instructions)
        .bind(new.tags)
        .bind(new.category)
        .bind(owner)
        .fetch_one(db)
        .await
    }

    pub async fn find_by_id(db: &PgPool, id: Uuid) -> sqlx::Result<Option<Recipe>> {
        sqlx::query_as::<_, Recipe>(&format!(
            "SELECT {RECIPE_COLUMNS} FROM recipes WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(db)
        .await
    }

    pub async fn list_all(db: &PgPool) -> sqlx::Result<Vec<Recipe>> {
        sqlx::query_as::<_, Recipe>(&format!(
            "SELECT {RECIPE_COLUMNS} FROM recipes ORDER BY created_at DESC"
        ))
        .fetch_all(db)
        .await
    }

    pub async fn list_by_owner(db: &PgPool, owner: Uuid) -> sqlx::Result<Vec<Recipe>> {
        sqlx::query_as::<_, Recipe>(&format!(
            "SELECT {RECIPE_COLUMNS} FROM recipes WHERE user_id = $1 ORDER BY created_at DESC"
        ))
        .bind(owner)
        .fetch_all(db)
        .await
    }

    /// Merge-update of the mutable fields; the owner reference is not
    /// touched here.
    #[allow(clippy::too_many_arguments)]
    pub async fn update(
        db: &PgPool,
        id: Uuid,
        title: Option<&str>,
        picture: Option<&str>,
        cook_time_minutes: Option<i32>,
        description: Option<&str>,
        ingredients: Option<&[String]>,
        instructions: Option<&str>,
        tags: Option<&[String]>,
        category: Option<&str>,
    ) -> sqlx::Result<Option<Recipe>> {
        sqlx::query_as::<_, Recipe>(&format!(
            r#"
            UPDATE recipes
            SET title = COALESCE($2, title),
                picture = COALESCE($3, picture),
                cook_time_minutes = COALESCE($4, cook_time_minutes),
                description = COALESCE($5, description),
                ingredients = COALESCE($6, ingredients),
                instructions = COALESCE($7, instructions),
                tags = COALESCE($8, tags),
                category = COALESCE($9, category),
                updated_at = now()
            WHERE id = $1
            RETURNING {RECIPE_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(title)
        .bind(picture)
        .bind(cook_time_minutes)
        .bind(description)
        .bind(ingredients)
        .bind(instructions)
        .bind(tags)
        .bind(category)
        .fetch_optional(db)
        .await
    }

    pub async fn delete(db: &PgPool, id: Uuid) -> sqlx::Result<bool> {
        let res = sqlx::query("DELETE FROM recipes WHERE id = $1")
            .bind(id)
            .execute(db)
            .await?;
        Ok(res.rows_affected() == 1)
    }

    pub async fn delete_by_owner(db: &PgPool, owner: Uuid) -> sqlx::Result<u64> {
        let res = sqlx::query("DELETE FROM recipes WHERE user_id = $1")
            .bind(owner)
            .execute(db)
            .await?;
        Ok(res.rows_affected())
    }

    /// Case-insensitive substring match across title, description,
    /// category, tags and ingredients. No ranking.
    pub async fn search(db: &PgPool, query: &str) -> sqlx::Result<Vec<Recipe>> {
        let pattern = like_pattern(query);
        sqlx::query_as::<_, Recipe>(&format!(
            r#"
            SELECT {RECIPE_COLUMNS} FROM recipes
            WHERE title ILIKE $1
               OR description ILIKE $1
               OR category ILIKE $1
               OR EXISTS (SELECT 1 FROM unnest(tags) AS t WHERE t ILIKE $1)
               OR EXISTS (SELECT 1 FROM unnest(ingredients) AS i WHERE i ILIKE $1)
            ORDER BY created_at DESC
            "#
        ))
        .bind(pattern)
        .fetch_all(db)
        .await
    }

    /// Exact category match and/or tag overlap.
    pub async fn filter(
        db: &PgPool,
        category: Option<&str>,
        tags: &[String],
    ) -> sqlx::Result<Vec<Recipe>> {
        sqlx::query_as::<_, Recipe>(&format!(
            r#"
            SELECT {RECIPE_COLUMNS} FROM recipes
            WHERE ($1::text IS NULL OR category = $1)
              AND (cardinality($2::text[]) = 0 OR tags && $2)
            ORDER BY created_at DESC
            "#
        ))
        .bind(category)
        .bind(tags)
        .fetch_all(db)
        .await
    }
}

pub async fn owner_ref(db: &PgPool, recipe: &Recipe) -> sqlx::Result<Option<OwnerRef>> {
    let Some(owner) = recipe.user_id else {
        return Ok(None);
    };
    sqlx::query_as::<_, OwnerRef>("SELECT id, full_name FROM users WHERE id = $1")
        .bind(owner)
        .fetch_optional(db)
        .await
}

pub async fn list_ratings(db: &PgPool, recipe_id: Uuid) -> sqlx::Result<Vec<RatingEntry>> {
    sqlx::query_as::<_, RatingEntry>(
        r#"
        SELECT rr.user_id, u.full_name, rr.rating
        FROM recipe_ratings rr
        LEFT JOIN users u ON u.id = rr.user_id
        WHERE rr.recipe_id = $1
        ORDER BY rr.created_at
        "#,
    )
    .bind(recipe_id)
    .fetch_all(db)
    .await
}

pub async fn list_reviews(db: &PgPool, recipe_id: Uuid) -> sqlx::Result<Vec<ReviewEntry>> {
    sqlx::query_as::<_, ReviewEntry>(
        r#"
        SELECT rv.user_id, u.full_name, rv.review
        FROM recipe_reviews rv
        LEFT JOIN users u ON u.id = rv.user_id
        WHERE rv.recipe_id = $1
        ORDER BY rv.created_at
        "#,
    )
    .bind(recipe_id)
    .fetch_all(db)
    .await
}

/// Upsert keyed by (recipe, user): a second submission overwrites the first
/// instead of appending, so each user holds at most one rating per recipe.
pub async fn upsert_rating(
    db: &PgPool,
    recipe_id: Uuid,
    user_id: Uuid,
    rating: i32,
) -> sqlx::Result<()> {
    sqlx::query(
        r#"
        INSERT INTO recipe_ratings (recipe_id, user_id, rating)
        VALUES ($1, $2, $3)
        ON CONFLICT (recipe_id, user_id) DO UPDATE SET rating = EXCLUDED.rating
        "#,
    )
    .bind(recipe_id)
    .bind(user_id)
    .bind(rating)
    .execute(db)
    .await?;
    Ok(())
}

pub async fn upsert_review(
    db: &PgPool,
    recipe_id: Uuid,
    user_id: Uuid,
    review: &str,
) -> sqlx::Result<()> {
    sqlx::query(
        r#"
        INSERT INTO recipe_reviews (recipe_id, user_id, review)
        VALUES ($1, $2, $3)
        ON CONFLICT (recipe_id, user_id) DO UPDATE SET review = EXCLUDED.review
        "#,
    )
    .bind(recipe_id)
    .bind(user_id)
    .bind(review)
    .execute(db)
    .await?;
    Ok(())
}

/// Escape LIKE wildcards so a user query matches literally.
pub(crate) fn like_pattern(query: &str) -> String {
    let escaped = query
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_");
    format!("%{escaped}%")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn like_pattern_wraps_in_wildcards() {
        assert_eq!(like_pattern("pasta"), "%pasta%");
    }

    #[test]
    fn like_pattern_escapes_metacharacters() {
        assert_eq!(like_pattern("50%_off"), "%50\\%\\_off%");
        assert_eq!(like_pattern(r"back\slash"), "%back\\\\slash%");
    }

    #[test]
    fn recipe_serializes_owner_as_user() {
        let recipe = Recipe {
            id: Uuid::new_v4(),
            title: "T".into(),
            picture: None,
            cook_time_minutes: Some(30),
            description: None,
            ingredients: vec!["i1".into()],
            instructions: None,
            tags: vec![],
            category: None,
            user_id: Some(Uuid::new_v4()),
            created_at: time::OffsetDateTime::now_utc(),
            updated_at: time::OffsetDateTime::now_utc(),
        };
        let json = serde_json::to_value(&recipe).unwrap();
        assert!(json.get("user").is_some());
        assert!(json.get("userId").is_none());
        assert_eq!(json["cookTimeMinutes"], 30);
    }
}
