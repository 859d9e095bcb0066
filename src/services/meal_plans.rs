//! Meal plan API passthrough.

use crate::client::MealieClient;
use crate::errors::GatewayResult;
use http::Method;
use serde_json::Value;
use std::sync::Arc;

/// Thin passthrough to the Mealie meal plan endpoints
pub struct MealPlansService {
    client: Arc<MealieClient>,
}

impl MealPlansService {
    /// Create a service bound to a client handle
    pub fn new(client: Arc<MealieClient>) -> Self {
        Self { client }
    }

    /// List meal plan entries in a date range (ISO dates)
    pub async fn list_range(&self, start_date: &str, end_date: &str) -> GatewayResult<Value> {
        self.client
            .request_json(
                Method::GET,
                &format!(
                    "/api/households/mealplans?start_date={}&end_date={}",
                    start_date, end_date
                ),
                None,
            )
            .await
    }

    /// Create a meal plan entry
    pub async fn create(&self, entry: Value) -> GatewayResult<Value> {
        self.client
            .request_json(Method::POST, "/api/households/mealplans", Some(entry))
            .await
    }

    /// Delete a meal plan entry by id
    pub async fn delete(&self, id: &str) -> GatewayResult<Value> {
        self.client
            .request_json(
                Method::DELETE,
                &format!("/api/households/mealplans/{}", id),
                None,
            )
            .await
    }
}
