//! Request DTOs for the admin API
//!
//! Defines the structure of incoming query strings and bodies.

use serde::Deserialize;

/// Query for DELETE /_cache/:partition/entry
///
/// # Fields
/// - `url`: URL of the GET request whose stored response should be dropped
#[derive(Debug, Clone, Deserialize)]
pub struct InvalidateQuery {
    pub url: String,
}

impl InvalidateQuery {
    /// Returns an error message if validation fails, None if valid.
    pub fn validate(&self) -> Option<String> {
        if self.url.is_empty() {
            return Some("url cannot be empty".to_string());
        }
        None
    }
}

/// Request body for POST /_cache/:partition/precache
#[derive(Debug, Clone, Deserialize)]
pub struct PrecacheRequest {
    pub urls: Vec<String>,
}

impl PrecacheRequest {
    /// Returns an error message if validation fails, None if valid.
    pub fn validate(&self) -> Option<String> {
        if self.urls.is_empty() {
            return Some("urls cannot be empty".to_string());
        }
        if self.urls.iter().any(|u| u.is_empty()) {
            return Some("urls cannot contain empty entries".to_string());
        }
        None
    }
}
