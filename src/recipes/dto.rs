use serde::{Deserialize, Serialize};

use crate::error::{ApiError, ApiResult};
use crate::recipes::repo::{OwnerRef, RatingEntry, Recipe, ReviewEntry};

/// Request body for recipe creation. Required fields default to empty so a
/// missing field surfaces as a validation error, not a body rejection.
#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct CreateRecipeRequest {
    pub title: String,
    pub picture: Option<String>,
    pub cook_time_minutes: Option<i32>,
    pub description: Option<String>,
    pub ingredients: Vec<String>,
    pub instructions: Option<String>,
    pub tags: Vec<String>,
    pub category: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct UpdateRecipeRequest {
    pub title: Option<String>,
    pub picture: Option<String>,
    pub cook_time_minutes: Option<i32>,
    pub description: Option<String>,
    pub ingredients: Option<Vec<String>>,
    pub instructions: Option<String>,
    pub tags: Option<Vec<String>>,
    pub category: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct RatingRequest {
    pub rating: i32,
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct ReviewRequest {
    pub review: String,
}

#[derive(Debug, Deserialize)]
pub struct SearchQuery {
    pub query: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct FilterQuery {
    pub category: Option<String>,
    /// Comma-separated list, e.g. `?tags=vegan,quick`.
    pub tags: Option<String>,
}

pub fn validate_rating(rating: i32) -> ApiResult<()> {
    if !(1..=5).contains(&rating) {
        return Err(ApiError::Validation(
            "Rating must be between 1 and 5".into(),
        ));
    }
    Ok(())
}

/// A recipe with its owner and rating/review user references expanded.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RecipeDetails {
    #[serde(flatten)]
    pub recipe: Recipe,
    pub owner: Option<OwnerRef>,
    pub ratings: Vec<RatingEntry>,
    pub reviews: Vec<ReviewEntry>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RecipesEnvelope {
    pub success: bool,
    pub total_recipes: usize,
    pub recipes: Vec<Recipe>,
}

impl RecipesEnvelope {
    pub fn new(recipes: Vec<Recipe>) -> Self {
        Self {
            success: true,
            total_recipes: recipes.len(),
            recipes,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct RecipeDetailsEnvelope {
    pub success: bool,
    pub recipe: RecipeDetails,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatedRecipeEnvelope {
    pub success: bool,
    pub message: String,
    pub new_recipe: Recipe,
}

#[derive(Debug, Serialize)]
pub struct UpdatedRecipeEnvelope {
    pub success: bool,
    pub message: String,
    pub recipe: Recipe,
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::StatusCode;

    #[test]
    fn rating_bounds() {
        for ok in 1..=5 {
            assert!(validate_rating(ok).is_ok());
        }
        for bad in [0, -1, 6, 100] {
            let err = validate_rating(bad).unwrap_err();
            assert_eq!(err.status(), StatusCode::BAD_REQUEST, "rating {bad}");
        }
    }

    #[test]
    fn missing_required_fields_default_to_empty() {
        let req: CreateRecipeRequest = serde_json::from_str("{}").unwrap();
        assert!(req.title.is_empty());
        assert!(req.ingredients.is_empty());
    }

    #[test]
    fn empty_search_result_envelope_pins_the_contract() {
        // Empty match is 200 with recipes: [] and totalRecipes: 0.
        let json = serde_json::to_value(RecipesEnvelope::new(vec![])).unwrap();
        assert_eq!(json["success"], true);
        assert_eq!(json["totalRecipes"], 0);
        assert_eq!(json["recipes"], serde_json::json!([]));
    }
}
