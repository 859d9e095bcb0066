//! Domain passthrough services.
//!
//! These are deliberately thin: each method builds a path, calls through the
//! authenticated client and returns the raw JSON payload. All resilience,
//! caching and lifecycle behavior lives in the mediation layers, not here.

mod meal_plans;
mod recipes;
mod shopping_lists;

pub use meal_plans::MealPlansService;
pub use recipes::RecipesService;
pub use shopping_lists::ShoppingListsService;
