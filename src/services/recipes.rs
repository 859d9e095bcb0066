//! Recipe API passthrough.

use crate::client::MealieClient;
use crate::errors::GatewayResult;
use http::Method;
use serde_json::Value;
use std::sync::Arc;

/// Thin passthrough to the Mealie recipe endpoints
pub struct RecipesService {
    client: Arc<MealieClient>,
}

impl RecipesService {
    /// Create a service bound to a client handle
    pub fn new(client: Arc<MealieClient>) -> Self {
        Self { client }
    }

    /// List recipes with pagination
    pub async fn list(&self, page: u64, per_page: u64) -> GatewayResult<Value> {
        self.client
            .request_json(
                Method::GET,
                &format!("/api/recipes?page={}&perPage={}", page, per_page),
                None,
            )
            .await
    }

    /// Fetch a single recipe by slug
    pub async fn get(&self, slug: &str) -> GatewayResult<Value> {
        self.client
            .request_json(Method::GET, &format!("/api/recipes/{}", slug), None)
            .await
    }

    /// Create a recipe
    pub async fn create(&self, recipe: Value) -> GatewayResult<Value> {
        self.client
            .request_json(Method::POST, "/api/recipes", Some(recipe))
            .await
    }

    /// Update a recipe by slug
    pub async fn update(&self, slug: &str, recipe: Value) -> GatewayResult<Value> {
        self.client
            .request_json(Method::PUT, &format!("/api/recipes/{}", slug), Some(recipe))
            .await
    }

    /// Delete a recipe by slug
    pub async fn delete(&self, slug: &str) -> GatewayResult<Value> {
        self.client
            .request_json(Method::DELETE, &format!("/api/recipes/{}", slug), None)
            .await
    }
}
