//! Single post page with owner-only delete.

use std::sync::{Arc, Mutex};

use shared::models::Post;
use tracing::info;

use super::{FeatureContext, Route, lock};
use crate::{
    error::{ClientError, ClientResult},
    lifecycle::{Outcome, RequestScope, RequestSlot},
};

/// Flash shown after deleting a post.
pub const POST_DELETED: &str = "Post was successfully deleted.";

/// Single-post page snapshot.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PostViewState {
    /// Requested post id.
    pub id: String,
    /// Loaded post.
    pub post: Option<Post>,
    /// A fetch is in flight.
    pub is_loading: bool,
    /// The backend has no such post.
    pub not_found: bool,
    /// Page to show after a delete.
    pub redirect: Option<Route>,
}

#[derive(Debug)]
struct PostViewCell {
    state: PostViewState,
    fetch: RequestSlot,
    delete: RequestSlot,
}

#[derive(Debug)]
struct PostViewInner {
    ctx: FeatureContext,
    cell: Mutex<PostViewCell>,
    _scope: RequestScope,
}

/// The single-post page.
#[derive(Debug, Clone)]
pub struct PostView {
    inner: Arc<PostViewInner>,
}

impl PostView {
    /// Page for post `id`.
    #[must_use]
    pub fn new(ctx: &FeatureContext, id: impl Into<String>) -> Self {
        let scope = ctx.child_scope();
        let cell = PostViewCell {
            state: PostViewState {
                id: id.into(),
                is_loading: true,
                ..PostViewState::default()
            },
            fetch: scope.slot("post-fetch"),
            delete: scope.slot("post-delete"),
        };
        Self {
            inner: Arc::new(PostViewInner {
                ctx: ctx.clone(),
                cell: Mutex::new(cell),
                _scope: scope,
            }),
        }
    }

    /// Current snapshot.
    #[must_use]
    pub fn state(&self) -> PostViewState {
        lock(&self.inner.cell).state.clone()
    }

    /// Whether the logged-in user wrote the loaded post.
    #[must_use]
    pub fn is_owner(&self) -> bool {
        let username = self.inner.ctx.session().snapshot().username().map(ToOwned::to_owned);
        lock(&self.inner.cell)
            .state
            .post
            .as_ref()
            .is_some_and(|post| Some(&post.author.username) == username.as_ref())
    }

    /// Fetches the post.
    pub async fn load(&self) {
        let (ticket, id) = {
            let mut cell = lock(&self.inner.cell);
            cell.state.is_loading = true;
            cell.state.not_found = false;
            (cell.fetch.begin(), cell.state.id.clone())
        };

        let outcome = ticket.run(self.inner.ctx.api().get_post(&id)).await;

        let mut cell = lock(&self.inner.cell);
        if !cell.fetch.settle(&ticket) {
            return;
        }
        match outcome {
            Outcome::Completed(post) => {
                cell.state.not_found = post.is_none();
                cell.state.post = post;
                cell.state.is_loading = false;
            }
            Outcome::Failed(_) | Outcome::Cancelled => {}
        }
    }

    /// Deletes the loaded post and sends the author back to their profile.
    ///
    /// Returns `false` when nothing was deleted.
    ///
    /// # Errors
    /// [`ClientError::NotLoggedIn`] without a session; [`ClientError::Permission`] when the
    /// visitor is not the author.
    pub async fn delete(&self) -> ClientResult<bool> {
        let token = self
            .inner
            .ctx
            .session()
            .token()
            .ok_or(ClientError::NotLoggedIn)?;
        if !self.is_owner() {
            return Err(ClientError::Permission("delete post".into()));
        }

        let (ticket, id, author) = {
            let mut cell = lock(&self.inner.cell);
            let author = cell
                .state
                .post
                .as_ref()
                .map(|post| post.author.username.clone())
                .unwrap_or_default();
            (cell.delete.begin(), cell.state.id.clone(), author)
        };

        let outcome = ticket
            .run(self.inner.ctx.api().delete_post(&id, &token))
            .await;

        let mut cell = lock(&self.inner.cell);
        if !cell.delete.settle(&ticket) {
            return Ok(false);
        }
        match outcome {
            Outcome::Completed(()) => {
                info!(post = %id, "post deleted");
                self.inner.ctx.session().flash(POST_DELETED);
                cell.state.redirect = Some(Route::Profile(author));
                Ok(true)
            }
            Outcome::Failed(ClientError::Permission(action)) => Err(ClientError::Permission(action)),
            Outcome::Failed(_) | Outcome::Cancelled => Ok(false),
        }
    }
}
