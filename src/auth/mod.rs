//! Authentication for the Mealie API.

use http::HeaderMap;
use secrecy::{ExposeSecret, SecretString};

/// Trait for managing authentication headers
pub trait AuthManager: Send + Sync {
    /// Get the authentication headers for a request
    fn headers(&self) -> HeaderMap;

    /// Validate the API token format
    fn validate_token(&self) -> Result<(), String>;
}

/// Bearer token authentication manager for Mealie API tokens
pub struct TokenAuthManager {
    api_token: SecretString,
}

impl TokenAuthManager {
    /// Create a new token authentication manager
    pub fn new(api_token: SecretString) -> Self {
        Self { api_token }
    }
}

impl AuthManager for TokenAuthManager {
    fn headers(&self) -> HeaderMap {
        let mut headers = HeaderMap::new();

        let bearer = format!("Bearer {}", self.api_token.expose_secret());
        if let Ok(value) = bearer.parse() {
            headers.insert("authorization", value);
        }

        if let Ok(value) = "application/json".parse() {
            headers.insert("content-type", value);
        }

        headers
    }

    fn validate_token(&self) -> Result<(), String> {
        let token = self.api_token.expose_secret();

        if token.is_empty() {
            return Err("API token cannot be empty".to_string());
        }

        if token.chars().any(char::is_whitespace) {
            return Err("API token must not contain whitespace".to_string());
        }

        if token.len() < 8 {
            return Err("API token is too short".to_string());
        }

        Ok(())
    }
}
