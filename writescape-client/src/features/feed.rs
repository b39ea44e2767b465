//! Home feed of followed users.

use std::sync::{Arc, Mutex};

use shared::models::Post;

use super::{FeatureContext, lock};
use crate::{
    error::{ClientError, ClientResult},
    lifecycle::{Outcome, RequestScope, RequestSlot},
};

/// Home feed snapshot.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HomeFeedState {
    /// A fetch is in flight.
    pub is_loading: bool,
    /// Posts from followed users, newest first as delivered.
    pub posts: Vec<Post>,
}

#[derive(Debug)]
struct HomeFeedCell {
    state: HomeFeedState,
    fetch: RequestSlot,
}

#[derive(Debug)]
struct HomeFeedInner {
    ctx: FeatureContext,
    cell: Mutex<HomeFeedCell>,
    _scope: RequestScope,
}

/// The logged-in home page.
#[derive(Debug, Clone)]
pub struct HomeFeed {
    inner: Arc<HomeFeedInner>,
}

impl HomeFeed {
    /// Empty feed.
    #[must_use]
    pub fn new(ctx: &FeatureContext) -> Self {
        let scope = ctx.child_scope();
        let cell = HomeFeedCell {
            state: HomeFeedState {
                is_loading: true,
                posts: Vec::new(),
            },
            fetch: scope.slot("home-feed"),
        };
        Self {
            inner: Arc::new(HomeFeedInner {
                ctx: ctx.clone(),
                cell: Mutex::new(cell),
                _scope: scope,
            }),
        }
    }

    /// Current snapshot.
    #[must_use]
    pub fn state(&self) -> HomeFeedState {
        lock(&self.inner.cell).state.clone()
    }

    /// Fetches the feed.
    ///
    /// # Errors
    /// [`ClientError::NotLoggedIn`] without a session.
    pub async fn load(&self) -> ClientResult<()> {
        let token = self
            .inner
            .ctx
            .session()
            .token()
            .ok_or(ClientError::NotLoggedIn)?;
        let ticket = {
            let mut cell = lock(&self.inner.cell);
            cell.state.is_loading = true;
            cell.fetch.begin()
        };

        let outcome = ticket.run(self.inner.ctx.api().home_feed(&token)).await;

        let mut cell = lock(&self.inner.cell);
        if cell.fetch.settle(&ticket)
            && let Outcome::Completed(posts) = outcome
        {
            cell.state.posts = posts;
            cell.state.is_loading = false;
        }
        Ok(())
    }
}
