use std::{
    collections::HashMap,
    sync::{Mutex, MutexGuard},
    time::Duration,
};

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use shared::models::{
    Author, CreatePostRequest, EditPostRequest, FollowEntry, LoginRequest, Post, ProfileCounts,
    ProfileSnapshot, RegisterRequest, SessionUser,
};
use tokio::time::sleep;

use super::WritescapeApi;
use crate::error::{ClientError, ClientResult};

/// Canned backend behaviour.
#[derive(Debug, Default)]
pub(crate) struct Script {
    pub users: HashMap<String, SessionUser>,
    pub passwords: HashMap<String, String>,
    pub register_rejection: Option<Vec<String>>,
    pub valid_tokens: Vec<String>,
    pub posts: HashMap<String, Post>,
    pub next_post_id: u32,
    pub profiles: HashMap<String, ProfileSnapshot>,
    pub fail_follow: bool,
    pub taken_usernames: Vec<String>,
    pub taken_emails: Vec<String>,
    pub search_results: Vec<Post>,
    pub feed: Vec<Post>,
    pub followers: Vec<FollowEntry>,
    pub delays: HashMap<&'static str, Duration>,
    pub offline: bool,
}

/// In-memory backend that records every call by name.
#[derive(Debug, Default)]
pub(crate) struct FakeApi {
    script: Mutex<Script>,
    calls: Mutex<Vec<String>>,
}

pub(crate) fn user(name: &str) -> SessionUser {
    SessionUser {
        username: name.to_owned(),
        token: format!("tok-{name}"),
        avatar: format!("https://gravatar.com/avatar/{name}?s=128"),
    }
}

pub(crate) fn post(id: &str, title: &str, author: &str) -> Post {
    Post {
        id: id.to_owned(),
        title: title.to_owned(),
        body: format!("{title} body"),
        created_date: Utc.with_ymd_and_hms(2021, 3, 4, 10, 0, 0).unwrap(),
        author: Author {
            username: author.to_owned(),
            avatar: format!("https://gravatar.com/avatar/{author}?s=128"),
        },
        is_visitor_owner: false,
    }
}

pub(crate) fn profile(name: &str, followers: u64, is_following: bool) -> ProfileSnapshot {
    ProfileSnapshot {
        profile_username: name.to_owned(),
        profile_avatar: format!("https://gravatar.com/avatar/{name}?s=128"),
        is_following,
        counts: ProfileCounts {
            post_count: 2,
            follower_count: followers,
            following_count: 1,
        },
    }
}

impl FakeApi {
    pub fn new() -> Self {
        Self::default()
    }

    /// Backend with `alice` registered (password `correct-horse`).
    pub fn with_alice() -> Self {
        let api = Self::new();
        api.script(|s| {
            let alice = user("alice");
            s.valid_tokens.push(alice.token.clone());
            s.passwords.insert("alice".into(), "correct-horse".into());
            s.users.insert("alice".into(), alice);
        });
        api
    }

    pub fn script(&self, edit: impl FnOnce(&mut Script)) {
        edit(&mut self.lock());
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn count(&self, name: &str) -> usize {
        self.calls()
            .iter()
            .filter(|call| call.split(':').next() == Some(name))
            .count()
    }

    fn lock(&self) -> MutexGuard<'_, Script> {
        self.script.lock().unwrap()
    }

    async fn enter(&self, name: &'static str, detail: &str) -> ClientResult<()> {
        self.calls.lock().unwrap().push(format!("{name}:{detail}"));
        let (delay, offline) = {
            let script = self.lock();
            (script.delays.get(name).copied(), script.offline)
        };
        if let Some(delay) = delay {
            sleep(delay).await;
        }
        if offline {
            return Err(ClientError::Status {
                status: http::StatusCode::SERVICE_UNAVAILABLE,
                body: "offline".into(),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl WritescapeApi for FakeApi {
    async fn login(&self, request: &LoginRequest) -> ClientResult<Option<SessionUser>> {
        self.enter("login", &request.username).await?;
        let script = self.lock();
        let matches = script.passwords.get(&request.username) == Some(&request.password);
        Ok(matches
            .then(|| script.users.get(&request.username).cloned())
            .flatten())
    }

    async fn register(&self, request: &RegisterRequest) -> ClientResult<SessionUser> {
        self.enter("register", &request.username).await?;
        let mut script = self.lock();
        if let Some(reasons) = script.register_rejection.clone() {
            return Err(ClientError::Rejected(reasons));
        }
        let created = user(&request.username);
        script.valid_tokens.push(created.token.clone());
        script.users.insert(request.username.clone(), created.clone());
        Ok(created)
    }

    async fn check_token(&self, token: &str) -> ClientResult<bool> {
        self.enter("checkToken", token).await?;
        Ok(self.lock().valid_tokens.iter().any(|valid| valid == token))
    }

    async fn create_post(&self, request: &CreatePostRequest) -> ClientResult<String> {
        self.enter("create-post", &request.title).await?;
        let mut script = self.lock();
        script.next_post_id += 1;
        let id = format!("p{}", script.next_post_id);
        let author = script
            .users
            .values()
            .find(|u| u.token == request.token)
            .map_or_else(|| "anonymous".to_owned(), |u| u.username.clone());
        let mut created = post(&id, &request.title, &author);
        created.body.clone_from(&request.body);
        script.posts.insert(id.clone(), created);
        Ok(id)
    }

    async fn get_post(&self, id: &str) -> ClientResult<Option<Post>> {
        self.enter("post", id).await?;
        Ok(self.lock().posts.get(id).cloned())
    }

    async fn edit_post(&self, id: &str, request: &EditPostRequest) -> ClientResult<()> {
        self.enter("edit", id).await?;
        let mut script = self.lock();
        let owner = script.posts.get(id).map(|p| p.author.username.clone());
        let caller = script
            .users
            .values()
            .find(|u| u.token == request.token)
            .map(|u| u.username.clone());
        if owner.is_none() || owner != caller {
            return Err(ClientError::Permission("edit post".into()));
        }
        if let Some(existing) = script.posts.get_mut(id) {
            existing.title.clone_from(&request.title);
            existing.body.clone_from(&request.body);
        }
        Ok(())
    }

    async fn delete_post(&self, id: &str, _token: &str) -> ClientResult<()> {
        self.enter("delete", id).await?;
        self.lock().posts.remove(id);
        Ok(())
    }

    async fn home_feed(&self, token: &str) -> ClientResult<Vec<Post>> {
        self.enter("getHomeFeed", token).await?;
        Ok(self.lock().feed.clone())
    }

    async fn get_profile(
        &self,
        username: &str,
        _token: Option<&str>,
    ) -> ClientResult<Option<ProfileSnapshot>> {
        self.enter("profile", username).await?;
        Ok(self.lock().profiles.get(username).cloned())
    }

    async fn add_follow(&self, username: &str, _token: &str) -> ClientResult<()> {
        self.enter("addFollow", username).await?;
        if self.lock().fail_follow {
            return Err(ClientError::Status {
                status: http::StatusCode::INTERNAL_SERVER_ERROR,
                body: String::new(),
            });
        }
        Ok(())
    }

    async fn remove_follow(&self, username: &str, _token: &str) -> ClientResult<()> {
        self.enter("removeFollow", username).await?;
        if self.lock().fail_follow {
            return Err(ClientError::Status {
                status: http::StatusCode::INTERNAL_SERVER_ERROR,
                body: String::new(),
            });
        }
        Ok(())
    }

    async fn followers(&self, username: &str) -> ClientResult<Vec<FollowEntry>> {
        self.enter("followers", username).await?;
        Ok(self.lock().followers.clone())
    }

    async fn following(&self, username: &str) -> ClientResult<Vec<FollowEntry>> {
        self.enter("following", username).await?;
        Ok(self.lock().followers.clone())
    }

    async fn profile_posts(&self, username: &str) -> ClientResult<Vec<Post>> {
        self.enter("posts", username).await?;
        Ok(self
            .lock()
            .posts
            .values()
            .filter(|p| p.author.username == username)
            .cloned()
            .collect())
    }

    async fn username_exists(&self, username: &str) -> ClientResult<bool> {
        self.enter("doesUsernameExist", username).await?;
        Ok(self.lock().taken_usernames.iter().any(|u| u == username))
    }

    async fn email_exists(&self, email: &str) -> ClientResult<bool> {
        self.enter("doesEmailExist", email).await?;
        Ok(self.lock().taken_emails.iter().any(|e| e == email))
    }

    async fn search(&self, term: &str) -> ClientResult<Vec<Post>> {
        self.enter("search", term).await?;
        Ok(self.lock().search_results.clone())
    }
}
