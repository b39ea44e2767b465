//! Profile page: header, optimistic follow and list tabs.

use std::sync::{Arc, Mutex};

use shared::models::{FollowEntry, Post, ProfileCounts, ProfileSnapshot};
use tracing::{debug, info, warn};

use super::{FeatureContext, lock};
use crate::{
    error::{ClientError, ClientResult},
    lifecycle::{Outcome, RequestScope, RequestSlot},
};

const PLACEHOLDER_AVATAR: &str = "https://gravatar.com/avatar/placeholder?s=128";

/// Sub-page of a profile.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ProfileTab {
    /// Posts written by the user.
    #[default]
    Posts,
    /// Users following the user.
    Followers,
    /// Users the user follows.
    Following,
}

/// Loaded contents of the active tab.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TabContent {
    /// Nothing loaded yet.
    Loading,
    /// Post list.
    Posts(Vec<Post>),
    /// Follower or following list.
    Follows(Vec<FollowEntry>),
}

/// Profile page snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProfileViewState {
    /// Username from the route.
    pub username: String,
    /// Header data, optimistically adjusted by follow actions.
    pub profile: ProfileSnapshot,
    /// The backend has no such user.
    pub not_found: bool,
    /// A follow or unfollow is in flight.
    pub follow_action_loading: bool,
    /// Active tab.
    pub tab: ProfileTab,
    /// Active tab contents.
    pub tab_content: TabContent,
}

fn placeholder(username: &str) -> ProfileSnapshot {
    ProfileSnapshot {
        profile_username: username.to_owned(),
        profile_avatar: PLACEHOLDER_AVATAR.to_owned(),
        is_following: false,
        counts: ProfileCounts::default(),
    }
}

#[derive(Debug)]
struct ProfileCell {
    state: ProfileViewState,
    fetch: RequestSlot,
    follow: RequestSlot,
    tab: RequestSlot,
}

#[derive(Debug)]
struct ProfileInner {
    ctx: FeatureContext,
    cell: Mutex<ProfileCell>,
    _scope: RequestScope,
}

/// A profile page with follow controls and post/follower/following tabs.
#[derive(Debug, Clone)]
pub struct ProfileView {
    inner: Arc<ProfileInner>,
}

impl ProfileView {
    /// Page for `username`.
    #[must_use]
    pub fn new(ctx: &FeatureContext, username: impl Into<String>) -> Self {
        let username = username.into();
        let scope = ctx.child_scope();
        let cell = ProfileCell {
            state: ProfileViewState {
                profile: placeholder(&username),
                username,
                not_found: false,
                follow_action_loading: false,
                tab: ProfileTab::default(),
                tab_content: TabContent::Loading,
            },
            fetch: scope.slot("profile-fetch"),
            follow: scope.slot("profile-follow"),
            tab: scope.slot("profile-tab"),
        };
        Self {
            inner: Arc::new(ProfileInner {
                ctx: ctx.clone(),
                cell: Mutex::new(cell),
                _scope: scope,
            }),
        }
    }

    /// Current snapshot.
    #[must_use]
    pub fn state(&self) -> ProfileViewState {
        lock(&self.inner.cell).state.clone()
    }

    /// Switches to another user. In-flight requests for the previous user are dropped.
    pub async fn navigate(&self, username: impl Into<String>) {
        {
            let mut cell = lock(&self.inner.cell);
            let username = username.into();
            cell.tab.cancel();
            cell.state.profile = placeholder(&username);
            cell.state.username = username;
            cell.state.tab_content = TabContent::Loading;
        }
        self.load().await;
    }

    /// Fetches the profile header. A follow still in flight is dropped; the fetched
    /// header replaces its optimistic change.
    pub async fn load(&self) {
        let token = self.inner.ctx.session().token();
        let (ticket, username) = {
            let mut cell = lock(&self.inner.cell);
            cell.follow.cancel();
            cell.state.follow_action_loading = false;
            cell.state.not_found = false;
            (cell.fetch.begin(), cell.state.username.clone())
        };

        let outcome = ticket
            .run(self.inner.ctx.api().get_profile(&username, token.as_deref()))
            .await;

        let mut cell = lock(&self.inner.cell);
        if !cell.fetch.settle(&ticket) {
            return;
        }
        match outcome {
            Outcome::Completed(Some(profile)) => cell.state.profile = profile,
            Outcome::Completed(None) => cell.state.not_found = true,
            Outcome::Failed(_) | Outcome::Cancelled => {}
        }
    }

    /// Loads `tab` into [`ProfileViewState::tab_content`].
    pub async fn load_tab(&self, tab: ProfileTab) {
        let (ticket, username) = {
            let mut cell = lock(&self.inner.cell);
            cell.state.tab = tab;
            cell.state.tab_content = TabContent::Loading;
            (cell.tab.begin(), cell.state.username.clone())
        };

        let api = self.inner.ctx.api();
        let outcome = match tab {
            ProfileTab::Posts => ticket
                .run(async { api.profile_posts(&username).await.map(TabContent::Posts) })
                .await,
            ProfileTab::Followers => ticket
                .run(async { api.followers(&username).await.map(TabContent::Follows) })
                .await,
            ProfileTab::Following => ticket
                .run(async { api.following(&username).await.map(TabContent::Follows) })
                .await,
        };

        let mut cell = lock(&self.inner.cell);
        if !cell.tab.settle(&ticket) {
            return;
        }
        if let Outcome::Completed(content) = outcome {
            cell.state.tab_content = content;
        }
    }

    /// Whether the follow button applies: logged in, someone else's profile, nothing in flight.
    #[must_use]
    pub fn can_follow(&self) -> bool {
        let session = self.inner.ctx.session().snapshot();
        let cell = lock(&self.inner.cell);
        session.logged_in
            && !cell.state.not_found
            && !cell.state.follow_action_loading
            && session.username() != Some(cell.state.profile.profile_username.as_str())
    }

    /// Follows the profile, flipping the header before the backend confirms.
    ///
    /// # Errors
    /// [`ClientError::NotLoggedIn`] without a session; [`ClientError::Permission`] on
    /// one's own profile.
    pub async fn follow(&self) -> ClientResult<()> {
        self.change_follow(true).await
    }

    /// Unfollows the profile, flipping the header before the backend confirms.
    ///
    /// # Errors
    /// Same as [`follow`](Self::follow).
    pub async fn unfollow(&self) -> ClientResult<()> {
        self.change_follow(false).await
    }

    async fn change_follow(&self, follow: bool) -> ClientResult<()> {
        let session = self.inner.ctx.session().snapshot();
        let token = session.token().ok_or(ClientError::NotLoggedIn)?.to_owned();

        let (ticket, target) = {
            let mut cell = lock(&self.inner.cell);
            let state = &mut cell.state;
            if session.username() == Some(state.profile.profile_username.as_str()) {
                return Err(ClientError::Permission("follow yourself".into()));
            }
            if state.not_found || state.follow_action_loading || state.profile.is_following == follow {
                debug!(follow, "follow action ignored");
                return Ok(());
            }
            apply_follow(&mut state.profile, follow);
            state.follow_action_loading = true;
            let target = state.profile.profile_username.clone();
            (cell.follow.begin(), target)
        };

        let api = self.inner.ctx.api();
        let outcome = if follow {
            ticket.run(api.add_follow(&target, &token)).await
        } else {
            ticket.run(api.remove_follow(&target, &token)).await
        };

        let mut cell = lock(&self.inner.cell);
        if !cell.follow.settle(&ticket) {
            return Ok(());
        }
        cell.state.follow_action_loading = false;
        match outcome {
            Outcome::Completed(()) => info!(%target, follow, "follow state confirmed"),
            Outcome::Failed(err) => {
                warn!(%target, follow, error = %err, "rolling back follow change");
                apply_follow(&mut cell.state.profile, !follow);
            }
            Outcome::Cancelled => {}
        }
        Ok(())
    }
}

fn apply_follow(profile: &mut ProfileSnapshot, follow: bool) {
    profile.is_following = follow;
    let count = &mut profile.counts.follower_count;
    *count = if follow {
        count.saturating_add(1)
    } else {
        count.saturating_sub(1)
    };
}
