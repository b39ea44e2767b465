//! `reqwest` implementation of the backend API.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder};
use serde::de::DeserializeOwned;
use serde_json::Value;
use shared::{
    config::ClientConfig,
    models::{
        CreatePostRequest, EditPostRequest, EmailExistsRequest, FollowEntry, LoginRequest, Post,
        ProfileSnapshot, RegisterRequest, SearchRequest, SessionUser, TokenRequest,
        UsernameExistsRequest, is_falsy,
    },
};
use tracing::{debug, instrument};
use url::Url;

use super::WritescapeApi;
use crate::error::{ClientError, ClientResult};

const USER_AGENT: &str = concat!("writescape/", env!("CARGO_PKG_VERSION"));
const NO_PERMISSION: &str = "no permission";

/// [`WritescapeApi`] over HTTP+JSON.
#[derive(Clone, Debug)]
pub struct HttpApi {
    base_url: Url,
    client: Client,
}

impl HttpApi {
    /// Client for the backend at `base_url`.
    ///
    /// # Errors
    /// Returns an error if the HTTP client cannot be built or the URL cannot carry paths.
    pub fn new(base_url: Url, timeout: Duration) -> ClientResult<Self> {
        if base_url.cannot_be_a_base() {
            return Err(ClientError::Url(url::ParseError::RelativeUrlWithCannotBeABaseBase));
        }
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(timeout)
            .build()?;
        Ok(Self { base_url, client })
    }

    /// Client configured from `config`.
    ///
    /// # Errors
    /// See [`HttpApi::new`].
    pub fn from_config(config: &ClientConfig) -> ClientResult<Self> {
        Self::new(config.backend_url.clone(), config.timing.request_timeout())
    }

    /// Backend root.
    #[must_use]
    pub const fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn api_url(&self, segments: &[&str]) -> ClientResult<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|()| ClientError::Url(url::ParseError::RelativeUrlWithCannotBeABaseBase))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    async fn send(&self, request: RequestBuilder) -> ClientResult<Value> {
        let response = request.send().await?;
        let status = response.status();
        let body = response.text().await?;
        debug!(%status, bytes = body.len(), "backend responded");

        if !status.is_success() {
            if let Ok(reasons) = serde_json::from_str::<Vec<String>>(&body) {
                return Err(ClientError::Rejected(reasons));
            }
            return Err(ClientError::Status { status, body });
        }

        if body.trim().is_empty() {
            return Ok(Value::Null);
        }
        // Status words such as "success" may arrive as plain text.
        Ok(serde_json::from_str(&body).unwrap_or(Value::String(body)))
    }

    async fn post<B: serde::Serialize + Sync>(
        &self,
        segments: &[&str],
        body: &B,
    ) -> ClientResult<Value> {
        let url = self.api_url(segments)?;
        self.send(self.client.post(url).json(body)).await
    }

    async fn get(&self, segments: &[&str]) -> ClientResult<Value> {
        let url = self.api_url(segments)?;
        self.send(self.client.get(url)).await
    }
}

fn decode<T: DeserializeOwned>(value: Value) -> ClientResult<T> {
    match serde_json::from_value::<T>(value.clone()) {
        Ok(decoded) => Ok(decoded),
        // Object endpoints report validation failures as a list of strings.
        Err(err) => match serde_json::from_value::<Vec<String>>(value) {
            Ok(reasons) if !reasons.is_empty() => Err(ClientError::Rejected(reasons)),
            _ => Err(err.into()),
        },
    }
}

fn decode_optional<T: DeserializeOwned>(value: Value) -> ClientResult<Option<T>> {
    if is_falsy(&value) {
        return Ok(None);
    }
    decode(value).map(Some)
}

fn decode_list<T: DeserializeOwned>(value: Value) -> ClientResult<Vec<T>> {
    if is_falsy(&value) {
        return Ok(Vec::new());
    }
    decode(value)
}

fn check_permission(value: &Value, action: &str) -> ClientResult<()> {
    match value {
        Value::String(text) if text.eq_ignore_ascii_case(NO_PERMISSION) => {
            Err(ClientError::Permission(action.to_owned()))
        }
        Value::Array(items) if !items.is_empty() => Err(ClientError::Rejected(
            items
                .iter()
                .map(|item| item.as_str().map_or_else(|| item.to_string(), ToOwned::to_owned))
                .collect(),
        )),
        _ => Ok(()),
    }
}

#[async_trait]
impl WritescapeApi for HttpApi {
    #[instrument(skip_all, fields(username = %request.username))]
    async fn login(&self, request: &LoginRequest) -> ClientResult<Option<SessionUser>> {
        decode_optional(self.post(&["login"], request).await?)
    }

    #[instrument(skip_all, fields(username = %request.username))]
    async fn register(&self, request: &RegisterRequest) -> ClientResult<SessionUser> {
        decode(self.post(&["register"], request).await?)
    }

    #[instrument(skip_all)]
    async fn check_token(&self, token: &str) -> ClientResult<bool> {
        let value = self.post(&["checkToken"], &TokenRequest::new(token)).await?;
        Ok(!is_falsy(&value))
    }

    #[instrument(skip_all, fields(title = %request.title))]
    async fn create_post(&self, request: &CreatePostRequest) -> ClientResult<String> {
        decode(self.post(&["create-post"], request).await?)
    }

    #[instrument(skip(self))]
    async fn get_post(&self, id: &str) -> ClientResult<Option<Post>> {
        decode_optional(self.get(&["post", id]).await?)
    }

    #[instrument(skip(self, request))]
    async fn edit_post(&self, id: &str, request: &EditPostRequest) -> ClientResult<()> {
        let value = self.post(&["post", id, "edit"], request).await?;
        check_permission(&value, "edit post")
    }

    #[instrument(skip(self, token))]
    async fn delete_post(&self, id: &str, token: &str) -> ClientResult<()> {
        let url = self.api_url(&["post", id])?;
        let value = self
            .send(self.client.delete(url).json(&TokenRequest::new(token)))
            .await?;
        check_permission(&value, "delete post")
    }

    #[instrument(skip_all)]
    async fn home_feed(&self, token: &str) -> ClientResult<Vec<Post>> {
        decode_list(self.post(&["getHomeFeed"], &TokenRequest::new(token)).await?)
    }

    #[instrument(skip(self, token))]
    async fn get_profile(
        &self,
        username: &str,
        token: Option<&str>,
    ) -> ClientResult<Option<ProfileSnapshot>> {
        let body = TokenRequest {
            token: token.map(ToOwned::to_owned),
        };
        decode_optional(self.post(&["profile", username], &body).await?)
    }

    #[instrument(skip(self, token))]
    async fn add_follow(&self, username: &str, token: &str) -> ClientResult<()> {
        let value = self
            .post(&["addFollow", username], &TokenRequest::new(token))
            .await?;
        check_permission(&value, "follow")
    }

    #[instrument(skip(self, token))]
    async fn remove_follow(&self, username: &str, token: &str) -> ClientResult<()> {
        let value = self
            .post(&["removeFollow", username], &TokenRequest::new(token))
            .await?;
        check_permission(&value, "unfollow")
    }

    #[instrument(skip(self))]
    async fn followers(&self, username: &str) -> ClientResult<Vec<FollowEntry>> {
        decode_list(self.get(&["profile", username, "followers"]).await?)
    }

    #[instrument(skip(self))]
    async fn following(&self, username: &str) -> ClientResult<Vec<FollowEntry>> {
        decode_list(self.get(&["profile", username, "following"]).await?)
    }

    #[instrument(skip(self))]
    async fn profile_posts(&self, username: &str) -> ClientResult<Vec<Post>> {
        decode_list(self.get(&["profile", username, "posts"]).await?)
    }

    #[instrument(skip(self))]
    async fn username_exists(&self, username: &str) -> ClientResult<bool> {
        let body = UsernameExistsRequest {
            username: username.to_owned(),
        };
        Ok(!is_falsy(&self.post(&["doesUsernameExist"], &body).await?))
    }

    #[instrument(skip_all)]
    async fn email_exists(&self, email: &str) -> ClientResult<bool> {
        let body = EmailExistsRequest {
            email: email.to_owned(),
        };
        Ok(!is_falsy(&self.post(&["doesEmailExist"], &body).await?))
    }

    #[instrument(skip(self))]
    async fn search(&self, term: &str) -> ClientResult<Vec<Post>> {
        let body = SearchRequest {
            search_term: term.to_owned(),
        };
        decode_list(self.post(&["search"], &body).await?)
    }
}
