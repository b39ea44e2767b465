//! Application root: wires the backend, session, chat and background tasks together.

use std::sync::{Arc, Mutex};

use shared::config::{ClientConfig, TimingConfig};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::{
    api::{HttpApi, WritescapeApi},
    error::ClientResult,
    features::{
        CreatePostForm, EditPostForm, FeatureContext, HomeFeed, LoginForm, PostView, ProfileView,
        RegisterForm, SearchOverlay, SessionGuard, lock,
    },
    lifecycle::RequestScope,
    realtime::{ChatChannel, RealtimeConnector, SocketIoConnector},
    session::{FileSessionStorage, SessionAction, SessionStorage, SessionStore},
};

/// Flash message queued by [`Writescape::logout`].
pub const LOGGED_OUT: &str = "You logged out!";

/// One running Writescape client.
///
/// Controllers created from it are cancelled by [`Writescape::shutdown`].
#[derive(Debug)]
pub struct Writescape {
    ctx: FeatureContext,
    chat: ChatChannel,
    scope: Arc<RequestScope>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl Writescape {
    /// Builds the HTTP client, file-backed session and Socket.IO connector from `config`,
    /// restoring any persisted login.
    ///
    /// # Errors
    /// Returns an error when the HTTP client cannot be built or an endpoint is unusable.
    pub fn from_config(config: &ClientConfig) -> ClientResult<Self> {
        let api = Arc::new(HttpApi::from_config(config)?);
        let storage = Arc::new(FileSessionStorage::new(config.session_path()));
        let connector = Arc::new(SocketIoConnector::new(&config.realtime_endpoint())?);
        info!(backend = %config.backend_url, "writescape client ready");
        Ok(Self::with_parts(api, storage, connector, config.timing.clone()))
    }

    /// Assembles a client from explicit parts.
    #[must_use]
    pub fn with_parts(
        api: Arc<dyn WritescapeApi>,
        storage: Arc<dyn SessionStorage>,
        connector: Arc<dyn RealtimeConnector>,
        timing: TimingConfig,
    ) -> Self {
        let scope = Arc::new(RequestScope::new());
        let session = SessionStore::rehydrate(storage);
        let chat = ChatChannel::new(session.clone(), connector);
        Self {
            ctx: FeatureContext::new(api, session, timing, Arc::clone(&scope)),
            chat,
            scope,
            tasks: Mutex::new(Vec::new()),
        }
    }

    /// Shared controller context.
    #[must_use]
    pub const fn context(&self) -> &FeatureContext {
        &self.ctx
    }

    /// Global session.
    #[must_use]
    pub const fn session(&self) -> &SessionStore {
        self.ctx.session()
    }

    /// The chat widget.
    #[must_use]
    pub const fn chat(&self) -> &ChatChannel {
        &self.chat
    }

    /// Keeps the chat connected while logged in.
    pub fn start_chat(&self) {
        let handle = self.chat.bind_to_session(self.scope.token().child_token());
        lock(&self.tasks).push(handle);
    }

    /// Re-validates the session token periodically.
    pub fn start_session_guard(&self) {
        let handle = SessionGuard::new(&self.ctx).spawn(self.scope.token().child_token());
        lock(&self.tasks).push(handle);
    }

    /// Starts every background task.
    pub fn start(&self) {
        self.start_chat();
        self.start_session_guard();
    }

    /// Checks the stored token once. Returns `false` when the session was ended.
    pub async fn verify_session(&self) -> bool {
        SessionGuard::new(&self.ctx).check().await
    }

    /// Ends the session locally.
    pub fn logout(&self) {
        self.session().dispatch(SessionAction::Logout);
        self.session().flash(LOGGED_OUT);
    }

    /// Login form.
    #[must_use]
    pub fn login_form(&self) -> LoginForm {
        LoginForm::new(&self.ctx)
    }

    /// Registration form.
    #[must_use]
    pub fn register_form(&self) -> RegisterForm {
        RegisterForm::new(&self.ctx)
    }

    /// New post form.
    #[must_use]
    pub fn create_post_form(&self) -> CreatePostForm {
        CreatePostForm::new(&self.ctx)
    }

    /// Edit form for post `id`.
    #[must_use]
    pub fn edit_post_form(&self, id: impl Into<String>) -> EditPostForm {
        EditPostForm::new(&self.ctx, id)
    }

    /// Single post page.
    #[must_use]
    pub fn post_view(&self, id: impl Into<String>) -> PostView {
        PostView::new(&self.ctx, id)
    }

    /// Profile page.
    #[must_use]
    pub fn profile_view(&self, username: impl Into<String>) -> ProfileView {
        ProfileView::new(&self.ctx, username)
    }

    /// Home feed.
    #[must_use]
    pub fn home_feed(&self) -> HomeFeed {
        HomeFeed::new(&self.ctx)
    }

    /// Live search overlay.
    #[must_use]
    pub fn search_overlay(&self) -> SearchOverlay {
        SearchOverlay::new(&self.ctx)
    }

    /// Cancels everything in flight and waits for the background tasks.
    pub async fn shutdown(self) {
        self.scope.close();
        self.chat.close();
        let tasks = std::mem::take(&mut *lock(&self.tasks));
        for task in tasks {
            if let Err(err) = task.await {
                warn!(error = %err, "background task failed");
            }
        }
        debug!("writescape client stopped");
    }
}
