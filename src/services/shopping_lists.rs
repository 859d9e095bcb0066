//! Shopping list API passthrough.

use crate::client::MealieClient;
use crate::errors::GatewayResult;
use http::Method;
use serde_json::Value;
use std::sync::Arc;

/// Thin passthrough to the Mealie shopping list endpoints
pub struct ShoppingListsService {
    client: Arc<MealieClient>,
}

impl ShoppingListsService {
    /// Create a service bound to a client handle
    pub fn new(client: Arc<MealieClient>) -> Self {
        Self { client }
    }

    /// List shopping lists
    pub async fn list(&self) -> GatewayResult<Value> {
        self.client
            .request_json(Method::GET, "/api/households/shopping/lists", None)
            .await
    }

    /// Fetch a single shopping list by id
    pub async fn get(&self, id: &str) -> GatewayResult<Value> {
        self.client
            .request_json(
                Method::GET,
                &format!("/api/households/shopping/lists/{}", id),
                None,
            )
            .await
    }

    /// Add an item to a shopping list
    pub async fn add_item(&self, item: Value) -> GatewayResult<Value> {
        self.client
            .request_json(Method::POST, "/api/households/shopping/items", Some(item))
            .await
    }
}
