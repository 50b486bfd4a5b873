//! Recipe collection handlers. Every route here is mounted behind the session gate.

use anyhow::{Context, Result};
use axum::{
    Json,
    extract::{Extension, Path, Query, rejection::JsonRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::path::Path as FsPath;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info, instrument};
use ulid::Ulid;
use utoipa::{IntoParams, ToSchema};

use super::auth::SessionRecord;

#[derive(ToSchema, Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Recipe {
    #[serde(default)]
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub ingredients: Vec<String>,
    #[serde(default)]
    pub instructions: Vec<String>,
    #[serde(default = "Utc::now")]
    pub published_at: DateTime<Utc>,
}

#[derive(Deserialize, IntoParams, Debug)]
#[into_params(parameter_in = Query)]
pub struct SearchQuery {
    /// Tag to match, case-insensitive.
    pub tag: String,
}

/// In-memory recipe collection shared by all requests.
#[derive(Debug, Default)]
pub struct RecipeStore {
    recipes: RwLock<Vec<Recipe>>,
}

impl RecipeStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_recipes(recipes: Vec<Recipe>) -> Self {
        Self {
            recipes: RwLock::new(recipes),
        }
    }

    /// Load a JSON array of recipes from disk.
    ///
    /// # Errors
    /// Returns an error if the file cannot be read or parsed.
    pub async fn load(path: &FsPath) -> Result<Self> {
        let data = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read recipes file: {}", path.display()))?;
        let recipes: Vec<Recipe> = serde_json::from_str(&data)
            .with_context(|| format!("Invalid recipes JSON: {}", path.display()))?;
        info!("Loaded {} recipes from {}", recipes.len(), path.display());
        Ok(Self::with_recipes(recipes))
    }

    pub async fn list(&self) -> Vec<Recipe> {
        self.recipes.read().await.clone()
    }

    pub async fn insert(&self, mut recipe: Recipe) -> Recipe {
        recipe.id = Ulid::new().to_string();
        recipe.published_at = Utc::now();
        self.recipes.write().await.push(recipe.clone());
        recipe
    }

    /// Replace the recipe with `id`, keeping its id. Returns `None` if absent.
    pub async fn update(&self, id: &str, mut recipe: Recipe) -> Option<Recipe> {
        let mut recipes = self.recipes.write().await;
        let slot = recipes.iter_mut().find(|existing| existing.id == id)?;
        recipe.id = id.to_string();
        *slot = recipe.clone();
        Some(recipe)
    }

    /// Remove the recipe with `id`. Returns `false` if absent.
    pub async fn delete(&self, id: &str) -> bool {
        let mut recipes = self.recipes.write().await;
        let before = recipes.len();
        recipes.retain(|existing| existing.id != id);
        recipes.len() != before
    }

    pub async fn search(&self, tag: &str) -> Vec<Recipe> {
        self.recipes
            .read()
            .await
            .iter()
            .filter(|recipe| recipe.tags.iter().any(|t| t.eq_ignore_ascii_case(tag)))
            .cloned()
            .collect()
    }
}

fn not_found() -> Response {
    (
        StatusCode::NOT_FOUND,
        Json(json!({ "error": "recipe not found" })),
    )
        .into_response()
}

fn bad_request(rejection: &JsonRejection) -> Response {
    (
        StatusCode::BAD_REQUEST,
        Json(json!({ "error": rejection.body_text() })),
    )
        .into_response()
}

#[utoipa::path(
    get,
    path = "/recipes",
    responses(
        (status = 200, description = "All recipes", body = [Recipe]),
        (status = 403, description = "Not logged")
    ),
    tag = "recipes"
)]
pub async fn list_recipes(store: Extension<Arc<RecipeStore>>) -> impl IntoResponse {
    Json(store.list().await)
}

#[utoipa::path(
    post,
    path = "/recipes",
    request_body = Recipe,
    responses(
        (status = 200, description = "Recipe created", body = Recipe),
        (status = 400, description = "Invalid input"),
        (status = 403, description = "Not logged")
    ),
    tag = "recipes"
)]
#[instrument(skip_all, fields(username = %session.username))]
pub async fn new_recipe(
    store: Extension<Arc<RecipeStore>>,
    Extension(session): Extension<SessionRecord>,
    payload: Result<Json<Recipe>, JsonRejection>,
) -> Response {
    let recipe = match payload {
        Ok(Json(recipe)) => recipe,
        Err(rejection) => return bad_request(&rejection),
    };
    let recipe = store.insert(recipe).await;
    debug!(id = %recipe.id, "recipe created");
    (StatusCode::OK, Json(recipe)).into_response()
}

#[utoipa::path(
    put,
    path = "/recipes/{id}",
    params(("id" = String, Path, description = "ID of the recipe")),
    request_body = Recipe,
    responses(
        (status = 200, description = "Recipe updated", body = Recipe),
        (status = 400, description = "Invalid input"),
        (status = 403, description = "Not logged"),
        (status = 404, description = "Invalid recipe ID")
    ),
    tag = "recipes"
)]
#[instrument(skip(store, payload))]
pub async fn update_recipe(
    store: Extension<Arc<RecipeStore>>,
    Path(id): Path<String>,
    payload: Result<Json<Recipe>, JsonRejection>,
) -> Response {
    let recipe = match payload {
        Ok(Json(recipe)) => recipe,
        Err(rejection) => return bad_request(&rejection),
    };
    match store.update(&id, recipe).await {
        Some(recipe) => (StatusCode::OK, Json(recipe)).into_response(),
        None => not_found(),
    }
}

#[utoipa::path(
    delete,
    path = "/recipes/{id}",
    params(("id" = String, Path, description = "ID of the recipe")),
    responses(
        (status = 200, description = "Recipe deleted"),
        (status = 403, description = "Not logged"),
        (status = 404, description = "Invalid recipe ID")
    ),
    tag = "recipes"
)]
#[instrument(skip(store))]
pub async fn delete_recipe(store: Extension<Arc<RecipeStore>>, Path(id): Path<String>) -> Response {
    if store.delete(&id).await {
        (
            StatusCode::OK,
            Json(json!({ "message": "Recipe has been deleted" })),
        )
            .into_response()
    } else {
        not_found()
    }
}

#[utoipa::path(
    get,
    path = "/recipes/search",
    params(SearchQuery),
    responses(
        (status = 200, description = "Recipes carrying the tag", body = [Recipe]),
        (status = 403, description = "Not logged")
    ),
    tag = "recipes"
)]
pub async fn search_recipes(
    store: Extension<Arc<RecipeStore>>,
    Query(query): Query<SearchQuery>,
) -> impl IntoResponse {
    Json(store.search(&query.tag).await)
}
