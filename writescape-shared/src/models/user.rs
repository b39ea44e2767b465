//! Session user and the account request bodies.

use serde::{Deserialize, Serialize};

/// The logged-in user as returned by `/login` and `/register` and persisted between runs.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SessionUser {
    /// Public username.
    pub username: String,
    /// Bearer token sent with every authenticated request.
    pub token: String,
    /// Avatar image URL.
    pub avatar: String,
}

/// Credentials for `/login`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LoginRequest {
    /// Account username.
    pub username: String,
    /// Account password.
    pub password: String,
}

/// New account payload for `/register`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RegisterRequest {
    /// Requested username.
    pub username: String,
    /// Contact email.
    pub email: String,
    /// Chosen password.
    pub password: String,
}

/// Body carrying only the session token (`/checkToken`, follow actions, feed, profile).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TokenRequest {
    /// Session token; profile lookups accept an anonymous visitor.
    pub token: Option<String>,
}

impl TokenRequest {
    /// Builds a request for an authenticated call.
    #[must_use]
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: Some(token.into()),
        }
    }
}

/// Body for `/doesUsernameExist`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct UsernameExistsRequest {
    /// Username to probe.
    pub username: String,
}

/// Body for `/doesEmailExist`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct EmailExistsRequest {
    /// Email to probe.
    pub email: String,
}
