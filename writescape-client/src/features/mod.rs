//! Per-feature controllers.
//!
//! Each controller owns its reducer state behind a mutex that is never held across an
//! await, a [`RequestScope`] that dies with the last handle, and one
//! [`RequestSlot`](crate::lifecycle::RequestSlot) per side-effecting action. Results are
//! applied only after the slot accepts the ticket that produced them.

pub mod create_post;
pub mod edit_post;
pub mod feed;
pub mod login;
pub mod post_view;
pub mod profile;
pub mod register;
pub mod search;
pub mod session_check;

use std::{
    fmt,
    sync::{Arc, Mutex, MutexGuard, PoisonError},
};

use shared::config::TimingConfig;

use crate::{api::WritescapeApi, lifecycle::RequestScope, session::SessionStore};

pub use create_post::{CreatePostForm, CreatePostState};
pub use edit_post::{EditPostForm, EditPostState, EditStatus};
pub use feed::{HomeFeed, HomeFeedState};
pub use login::{LoginForm, LoginState};
pub use post_view::{PostView, PostViewState};
pub use profile::{ProfileTab, ProfileView, ProfileViewState, TabContent};
pub use register::{RegisterForm, RegisterState, UniqueField};
pub use search::{SearchOverlay, SearchShow, SearchState};
pub use session_check::{SESSION_EXPIRED, SessionGuard};

/// Where the presenter should go after a feature finished.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Route {
    /// Home page (feed or guest landing).
    Home,
    /// A single post.
    Post(String),
    /// A profile page.
    Profile(String),
}

impl fmt::Display for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Home => f.write_str("/"),
            Self::Post(id) => write!(f, "/post/{id}"),
            Self::Profile(username) => write!(f, "/profile/{username}"),
        }
    }
}

/// What every controller needs from the application.
#[derive(Debug, Clone)]
pub struct FeatureContext {
    api: Arc<dyn WritescapeApi>,
    session: SessionStore,
    timing: TimingConfig,
    scope: Arc<RequestScope>,
}

impl FeatureContext {
    /// Context whose controllers are cancelled when `scope` closes.
    #[must_use]
    pub fn new(
        api: Arc<dyn WritescapeApi>,
        session: SessionStore,
        timing: TimingConfig,
        scope: Arc<RequestScope>,
    ) -> Self {
        Self {
            api,
            session,
            timing,
            scope,
        }
    }

    /// Backend client.
    #[must_use]
    pub fn api(&self) -> &Arc<dyn WritescapeApi> {
        &self.api
    }

    /// Global session.
    #[must_use]
    pub const fn session(&self) -> &SessionStore {
        &self.session
    }

    /// Debounce and interval settings.
    #[must_use]
    pub const fn timing(&self) -> &TimingConfig {
        &self.timing
    }

    /// A scope for one controller, closed with the application.
    #[must_use]
    pub fn child_scope(&self) -> RequestScope {
        RequestScope::child_of(&self.scope)
    }
}

pub(crate) fn lock<T>(state: &Mutex<T>) -> MutexGuard<'_, T> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use crate::{api::fake::FakeApi, session::MemorySessionStorage, session::SessionAction};

    pub fn context(api: &Arc<FakeApi>) -> FeatureContext {
        let storage = Arc::new(MemorySessionStorage::default());
        FeatureContext::new(
            api.clone(),
            SessionStore::rehydrate(storage),
            TimingConfig::default(),
            Arc::new(RequestScope::new()),
        )
    }

    pub fn logged_in(api: &Arc<FakeApi>, username: &str) -> FeatureContext {
        let ctx = context(api);
        ctx.session()
            .dispatch(SessionAction::Login(crate::api::fake::user(username)));
        ctx
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn routes_render_as_paths() {
        assert_eq!(Route::Home.to_string(), "/");
        assert_eq!(Route::Post("p1".into()).to_string(), "/post/p1");
        assert_eq!(Route::Profile("alice".into()).to_string(), "/profile/alice");
    }
}
