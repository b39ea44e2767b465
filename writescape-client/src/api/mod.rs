//! Backend operations consumed by the feature controllers.

pub mod http;

#[cfg(test)]
pub(crate) mod fake;

use async_trait::async_trait;
use shared::models::{
    CreatePostRequest, EditPostRequest, FollowEntry, LoginRequest, Post, ProfileSnapshot,
    RegisterRequest, SessionUser,
};
use std::fmt::Debug;

use crate::error::ClientResult;

pub use http::HttpApi;

/// Everything the Writescape backend offers.
///
/// Lookups answer `Ok(None)` when the backend replies with a falsy payload.
#[async_trait]
pub trait WritescapeApi: Send + Sync + Debug {
    /// Exchanges credentials for a session user; `None` when they are wrong.
    async fn login(&self, request: &LoginRequest) -> ClientResult<Option<SessionUser>>;

    /// Creates an account and returns its session user.
    ///
    /// # Errors
    /// [`ClientError::Rejected`](crate::ClientError::Rejected) lists the backend's reasons.
    async fn register(&self, request: &RegisterRequest) -> ClientResult<SessionUser>;

    /// Whether `token` still identifies a live session.
    async fn check_token(&self, token: &str) -> ClientResult<bool>;

    /// Publishes a post and returns its id.
    async fn create_post(&self, request: &CreatePostRequest) -> ClientResult<String>;

    /// Loads a post.
    async fn get_post(&self, id: &str) -> ClientResult<Option<Post>>;

    /// Saves a post.
    ///
    /// # Errors
    /// [`ClientError::Permission`](crate::ClientError::Permission) when the token does
    /// not own the post.
    async fn edit_post(&self, id: &str, request: &EditPostRequest) -> ClientResult<()>;

    /// Deletes a post.
    async fn delete_post(&self, id: &str, token: &str) -> ClientResult<()>;

    /// Posts by the users the token's owner follows.
    async fn home_feed(&self, token: &str) -> ClientResult<Vec<Post>>;

    /// Profile header as seen by the token's owner, or anonymously.
    async fn get_profile(
        &self,
        username: &str,
        token: Option<&str>,
    ) -> ClientResult<Option<ProfileSnapshot>>;

    /// Starts following `username`.
    async fn add_follow(&self, username: &str, token: &str) -> ClientResult<()>;

    /// Stops following `username`.
    async fn remove_follow(&self, username: &str, token: &str) -> ClientResult<()>;

    /// Users following `username`.
    async fn followers(&self, username: &str) -> ClientResult<Vec<FollowEntry>>;

    /// Users `username` follows.
    async fn following(&self, username: &str) -> ClientResult<Vec<FollowEntry>>;

    /// Posts written by `username`.
    async fn profile_posts(&self, username: &str) -> ClientResult<Vec<Post>>;

    /// Whether the username is already registered.
    async fn username_exists(&self, username: &str) -> ClientResult<bool>;

    /// Whether the email is already registered.
    async fn email_exists(&self, email: &str) -> ClientResult<bool>;

    /// Full-text search over posts.
    async fn search(&self, term: &str) -> ClientResult<Vec<Post>>;
}
