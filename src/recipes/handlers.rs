use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{delete, get, post, put},
    Json, Router,
};
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::{
    auth::extractors::{CurrentUser, RequireAdmin, RequireCook},
    error::{ApiError, ApiResult},
    state::AppState,
    users::{dto::MessageEnvelope, repo::Role, repo::User},
};

use super::dto::{
    validate_rating, CreateRecipeRequest, CreatedRecipeEnvelope, FilterQuery, RatingRequest,
    RecipeDetails, RecipeDetailsEnvelope, RecipesEnvelope, ReviewRequest, SearchQuery,
    UpdateRecipeRequest, UpdatedRecipeEnvelope,
};
use super::repo::{self, NewRecipe, Recipe};

pub fn read_routes() -> Router<AppState> {
    Router::new()
        .route("/recipes", get(list_recipes))
        .route("/recipes/search/recipe", get(search_recipes))
        .route("/recipes/filter", get(filter_recipes))
        .route("/recipes/user/:userId", get(list_recipes_by_user))
        .route("/recipes/:id", get(get_recipe))
}

pub fn write_routes() -> Router<AppState> {
    Router::new()
        .route("/recipes", post(create_recipe))
        .route("/recipes/:id", put(update_recipe).delete(delete_recipe))
        .route("/recipes/:id/rating", put(add_rating))
        .route("/recipes/:id/review", put(add_review))
        .route("/recipes/user/:userId", delete(delete_recipes_by_user))
}

/// Recipe mutations are allowed to the owner and to admins.
fn ensure_recipe_owner(caller: &User, recipe: &Recipe) -> ApiResult<()> {
    if caller.role != Role::Admin && recipe.user_id != Some(caller.id) {
        warn!(caller = %caller.id, recipe = %recipe.id, "recipe mutation denied");
        return Err(ApiError::Forbidden);
    }
    Ok(())
}

async fn load_details(state: &AppState, recipe: Recipe) -> ApiResult<RecipeDetails> {
    let owner = repo::owner_ref(&state.db, &recipe).await?;
    let ratings = repo::list_ratings(&state.db, recipe.id).await?;
    let reviews = repo::list_reviews(&state.db, recipe.id).await?;
    Ok(RecipeDetails {
        recipe,
        owner,
        ratings,
        reviews,
    })
}

#[instrument(skip(state, cook, payload))]
pub async fn create_recipe(
    State(state): State<AppState>,
    RequireCook(cook): RequireCook,
    Json(payload): Json<CreateRecipeRequest>,
) -> ApiResult<(StatusCode, Json<CreatedRecipeEnvelope>)> {
    if payload.title.trim().is_empty() {
        return Err(ApiError::Validation("Title is required".into()));
    }
    if payload.ingredients.iter().all(|i| i.trim().is_empty()) {
        return Err(ApiError::Validation("Ingredients are required".into()));
    }

    let recipe = Recipe::create(
        &state.db,
        cook.id,
        NewRecipe {
            title: payload.title.trim(),
            picture: payload.picture.as_deref(),
            cook_time_minutes: payload.cook_time_minutes,
            description: payload.description.as_deref(),
            ingredients: &payload.ingredients,
            instructions: payload.instructions.as_deref(),
            tags: &payload.tags,
            category: payload.category.as_deref(),
        },
    )
    .await?;

    info!(recipe_id = %recipe.id, owner = %cook.id, "recipe created");
    Ok((
        StatusCode::CREATED,
        Json(CreatedRecipeEnvelope {
            success: true,
            message: "New Recipe added".into(),
            new_recipe: recipe,
        }),
    ))
}

#[instrument(skip(state))]
pub async fn list_recipes(State(state): State<AppState>) -> ApiResult<Json<RecipesEnvelope>> {
    let recipes = Recipe::list_all(&state.db).await?;
    Ok(Json(RecipesEnvelope::new(recipes)))
}

#[instrument(skip(state))]
pub async fn get_recipe(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<RecipeDetailsEnvelope>> {
    let recipe = Recipe::find_by_id(&state.db, id)
        .await?
        .ok_or(ApiError::NotFound("Recipe"))?;
    let recipe = load_details(&state, recipe).await?;
    Ok(Json(RecipeDetailsEnvelope {
        success: true,
        recipe,
    }))
}

#[instrument(skip(state, cook, payload))]
pub async fn update_recipe(
    State(state): State<AppState>,
    RequireCook(cook): RequireCook,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateRecipeRequest>,
) -> ApiResult<Json<UpdatedRecipeEnvelope>> {
    let existing = Recipe::find_by_id(&state.db, id)
        .await?
        .ok_or(ApiError::NotFound("Recipe"))?;
    ensure_recipe_owner(&cook, &existing)?;

    if let Some(ingredients) = &payload.ingredients {
        if ingredients.iter().all(|i| i.trim().is_empty()) {
            return Err(ApiError::Validation("Ingredients must not be empty".into()));
        }
    }
    if let Some(title) = &payload.title {
        if title.trim().is_empty() {
            return Err(ApiError::Validation("Title must not be empty".into()));
        }
    }

    let recipe = Recipe::update(
        &state.db,
        id,
        payload.title.as_deref(),
        payload.picture.as_deref(),
        payload.cook_time_minutes,
        payload.description.as_deref(),
        payload.ingredients.as_deref(),
        payload.instructions.as_deref(),
        payload.tags.as_deref(),
        payload.category.as_deref(),
    )
    .await?
    .ok_or(ApiError::NotFound("Recipe"))?;

    info!(recipe_id = %id, "recipe updated");
    Ok(Json(UpdatedRecipeEnvelope {
        success: true,
        message: "Recipe updated".into(),
        recipe,
    }))
}

#[instrument(skip(state, cook))]
pub async fn delete_recipe(
    State(state): State<AppState>,
    RequireCook(cook): RequireCook,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<MessageEnvelope>> {
    let existing = Recipe::find_by_id(&state.db, id)
        .await?
        .ok_or(ApiError::NotFound("Recipe"))?;
    ensure_recipe_owner(&cook, &existing)?;

    Recipe::delete(&state.db, id).await?;
    info!(recipe_id = %id, deleted_by = %cook.id, "recipe deleted");
    Ok(Json(MessageEnvelope {
        success: true,
        message: "Recipe deleted successfully".into(),
    }))
}

/// Empty matches are 200 with `recipes: []`, never 404.
#[instrument(skip(state))]
pub async fn search_recipes(
    State(state): State<AppState>,
    Query(q): Query<SearchQuery>,
) -> ApiResult<Json<RecipesEnvelope>> {
    let query = q
        .query
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| ApiError::Validation("Query is required".into()))?;

    let recipes = Recipe::search(&state.db, query).await?;
    Ok(Json(RecipesEnvelope::new(recipes)))
}

#[instrument(skip(state))]
pub async fn filter_recipes(
    State(state): State<AppState>,
    Query(q): Query<FilterQuery>,
) -> ApiResult<Json<RecipesEnvelope>> {
    let tags: Vec<String> = q
        .tags
        .as_deref()
        .unwrap_or_default()
        .split(',')
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(String::from)
        .collect();

    let recipes = Recipe::filter(&state.db, q.category.as_deref(), &tags).await?;
    Ok(Json(RecipesEnvelope::new(recipes)))
}

#[instrument(skip(state, caller, payload))]
pub async fn add_rating(
    State(state): State<AppState>,
    CurrentUser(caller): CurrentUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<RatingRequest>,
) -> ApiResult<Json<RecipeDetailsEnvelope>> {
    validate_rating(payload.rating)?;
    let recipe = Recipe::find_by_id(&state.db, id)
        .await?
        .ok_or(ApiError::NotFound("Recipe"))?;

    repo::upsert_rating(&state.db, id, caller.id, payload.rating).await?;

    info!(recipe_id = %id, user_id = %caller.id, rating = payload.rating, "rating upserted");
    let recipe = load_details(&state, recipe).await?;
    Ok(Json(RecipeDetailsEnvelope {
        success: true,
        recipe,
    }))
}

#[instrument(skip(state, caller, payload))]
pub async fn add_review(
    State(state): State<AppState>,
    CurrentUser(caller): CurrentUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<ReviewRequest>,
) -> ApiResult<Json<RecipeDetailsEnvelope>> {
    if payload.review.trim().is_empty() {
        return Err(ApiError::Validation("Review is required".into()));
    }
    let recipe = Recipe::find_by_id(&state.db, id)
        .await?
        .ok_or(ApiError::NotFound("Recipe"))?;

    repo::upsert_review(&state.db, id, caller.id, payload.review.trim()).await?;

    info!(recipe_id = %id, user_id = %caller.id, "review upserted");
    let recipe = load_details(&state, recipe).await?;
    Ok(Json(RecipeDetailsEnvelope {
        success: true,
        recipe,
    }))
}

#[instrument(skip(state))]
pub async fn list_recipes_by_user(
    State(state): State<AppState>,
    Path(user_id): Path<Uuid>,
) -> ApiResult<Json<RecipesEnvelope>> {
    let recipes = Recipe::list_by_owner(&state.db, user_id).await?;
    Ok(Json(RecipesEnvelope::new(recipes)))
}

#[instrument(skip(state, admin))]
pub async fn delete_recipes_by_user(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    Path(user_id): Path<Uuid>,
) -> ApiResult<Json<MessageEnvelope>> {
    let deleted = Recipe::delete_by_owner(&state.db, user_id).await?;
    info!(owner = %user_id, deleted_by = %admin.id, deleted, "recipes bulk-deleted");
    Ok(Json(MessageEnvelope {
        success: true,
        message: format!("{deleted} recipes deleted"),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::OffsetDateTime;

    fn make_user(role: Role) -> User {
        User {
            id: Uuid::new_v4(),
            full_name: "A B".into(),
            email: "a@b.com".into(),
            password_hash: "hash".into(),
            profile_picture: None,
            bio: None,
            role,
            created_at: OffsetDateTime::now_utc(),
        }
    }

    fn make_recipe(owner: Option<Uuid>) -> Recipe {
        Recipe {
            id: Uuid::new_v4(),
            title: "T".into(),
            picture: None,
            cook_time_minutes: None,
            description: None,
            ingredients: vec!["i1".into()],
            instructions: None,
            tags: vec![],
            category: None,
            user_id: owner,
            created_at: OffsetDateTime::now_utc(),
            updated_at: OffsetDateTime::now_utc(),
        }
    }

    #[test]
    fn owner_may_mutate_own_recipe() {
        let cook = make_user(Role::Cook);
        let recipe = make_recipe(Some(cook.id));
        assert!(ensure_recipe_owner(&cook, &recipe).is_ok());
    }

    #[test]
    fn admin_may_mutate_any_recipe() {
        let admin = make_user(Role::Admin);
        let recipe = make_recipe(Some(Uuid::new_v4()));
        assert!(ensure_recipe_owner(&admin, &recipe).is_ok());
    }

    #[test]
    fn other_cooks_are_forbidden() {
        let cook = make_user(Role::Cook);
        let recipe = make_recipe(Some(Uuid::new_v4()));
        let err = ensure_recipe_owner(&cook, &recipe).unwrap_err();
        assert_eq!(err.status(), StatusCode::FORBIDDEN);
    }

    #[test]
    fn ownerless_recipe_is_admin_only() {
        let cook = make_user(Role::Cook);
        let recipe = make_recipe(None);
        assert!(ensure_recipe_owner(&cook, &recipe).is_err());
        let admin = make_user(Role::Admin);
        assert!(ensure_recipe_owner(&admin, &recipe).is_ok());
    }
}
