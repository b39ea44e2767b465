//! Edit form for an existing post, with its status line.

use std::{
    fmt,
    sync::{Arc, Mutex},
};

use shared::models::EditPostRequest;
use tracing::{info, warn};

use super::{
    FeatureContext, Route,
    create_post::{BODY_REQUIRED, TITLE_REQUIRED},
    lock,
};
use crate::{
    error::{ClientError, ClientResult},
    lifecycle::{DraftField, Outcome, RequestScope, RequestSlot, SubmissionPhase},
};

/// Flash shown after a save.
pub const POST_UPDATED: &str = "Post successfully updated!";
/// Flash shown when the visitor does not own the post.
pub const EDIT_FORBIDDEN: &str = "You do not have permission to edit that post.";

/// Status line under the edit form.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum EditStatus {
    /// Inputs match the last save.
    #[default]
    IsUpdated,
    /// A rule fails.
    HasErrors,
    /// Inputs differ from the last save.
    HasChanges,
    /// A save is in flight.
    IsSaving,
}

impl EditStatus {
    /// Text shown to the user.
    #[must_use]
    pub const fn message(self) -> &'static str {
        match self {
            Self::IsUpdated => "Post is up to date!",
            Self::HasErrors => "There is an error above!",
            Self::HasChanges => "There are new changes, save it now!",
            Self::IsSaving => "Please wait until we save you changes...",
        }
    }
}

impl fmt::Display for EditStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.message())
    }
}

/// Edit-post form snapshot.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EditPostState {
    /// Post being edited.
    pub id: String,
    /// Title input and its saved baseline.
    pub title: DraftField,
    /// Body input and its saved baseline.
    pub body: DraftField,
    /// The post has not been loaded yet.
    pub is_fetching: bool,
    /// The post does not exist.
    pub not_found: bool,
    /// A save is in flight.
    pub is_saving: bool,
    /// Status line.
    pub status: EditStatus,
    /// Submit cycle.
    pub phase: SubmissionPhase,
    /// Page to leave for, set when the visitor may not edit.
    pub redirect: Option<Route>,
}

impl EditPostState {
    fn refresh_status(&mut self) {
        self.status = if self.title.has_errors || self.body.has_errors {
            EditStatus::HasErrors
        } else if self.is_saving {
            EditStatus::IsSaving
        } else if self.title.is_changed() || self.body.is_changed() {
            EditStatus::HasChanges
        } else {
            EditStatus::IsUpdated
        };
    }
}

#[derive(Debug)]
struct EditPostCell {
    state: EditPostState,
    fetch: RequestSlot,
    save: RequestSlot,
}

#[derive(Debug)]
struct EditPostInner {
    ctx: FeatureContext,
    cell: Mutex<EditPostCell>,
    _scope: RequestScope,
}

/// The "edit post" page.
#[derive(Debug, Clone)]
pub struct EditPostForm {
    inner: Arc<EditPostInner>,
}

impl EditPostForm {
    /// Form for post `id`; call [`load`](Self::load) before editing.
    #[must_use]
    pub fn new(ctx: &FeatureContext, id: impl Into<String>) -> Self {
        let scope = ctx.child_scope();
        let cell = EditPostCell {
            state: EditPostState {
                id: id.into(),
                is_fetching: true,
                ..EditPostState::default()
            },
            fetch: scope.slot("edit-post-fetch"),
            save: scope.slot("edit-post-save"),
        };
        Self {
            inner: Arc::new(EditPostInner {
                ctx: ctx.clone(),
                cell: Mutex::new(cell),
                _scope: scope,
            }),
        }
    }

    /// Current snapshot.
    #[must_use]
    pub fn state(&self) -> EditPostState {
        lock(&self.inner.cell).state.clone()
    }

    /// Fetches the post and fills the baseline. A visitor who is not the author is
    /// flashed and redirected home.
    pub async fn load(&self) {
        let (ticket, id) = {
            let mut cell = lock(&self.inner.cell);
            cell.state.is_fetching = true;
            cell.state.not_found = false;
            (cell.fetch.begin(), cell.state.id.clone())
        };

        let outcome = ticket.run(self.inner.ctx.api().get_post(&id)).await;

        let mut cell = lock(&self.inner.cell);
        if !cell.fetch.settle(&ticket) {
            return;
        }
        match outcome {
            Outcome::Completed(Some(post)) => {
                let session = self.inner.ctx.session();
                if session.snapshot().username() != Some(post.author.username.as_str()) {
                    warn!(post = %post.id, author = %post.author.username, "visitor does not own post");
                    session.flash(EDIT_FORBIDDEN);
                    cell.state.redirect = Some(Route::Home);
                }
                cell.state.title = DraftField::saved(post.title);
                cell.state.body = DraftField::saved(post.body);
                cell.state.is_fetching = false;
                cell.state.refresh_status();
            }
            Outcome::Completed(None) => {
                cell.state.not_found = true;
                cell.state.is_fetching = false;
            }
            Outcome::Failed(_) | Outcome::Cancelled => {}
        }
    }

    /// Updates the title, re-runs its rule and the status line.
    pub fn set_title(&self, value: impl Into<String>) {
        let mut cell = lock(&self.inner.cell);
        cell.state.title.set_value(value);
        cell.state.title.require(TITLE_REQUIRED);
        cell.state.phase = SubmissionPhase::Idle;
        cell.state.refresh_status();
    }

    /// Updates the body, re-runs its rule and the status line.
    pub fn set_body(&self, value: impl Into<String>) {
        let mut cell = lock(&self.inner.cell);
        cell.state.body.set_value(value);
        cell.state.body.require(BODY_REQUIRED);
        cell.state.phase = SubmissionPhase::Idle;
        cell.state.refresh_status();
    }

    /// Validates and saves.
    ///
    /// # Errors
    /// [`ClientError::NotLoggedIn`] without a session.
    pub async fn submit(&self) -> ClientResult<SubmissionPhase> {
        let token = self
            .inner
            .ctx
            .session()
            .token()
            .ok_or(ClientError::NotLoggedIn)?;

        let (ticket, id, request) = {
            let mut cell = lock(&self.inner.cell);
            if cell.state.is_fetching || !cell.state.phase.accepts_submit() {
                return Ok(cell.state.phase);
            }
            cell.state.phase = SubmissionPhase::Validating;
            cell.state.title.require(TITLE_REQUIRED);
            cell.state.body.require(BODY_REQUIRED);
            if cell.state.title.has_errors || cell.state.body.has_errors {
                cell.state.phase = SubmissionPhase::Invalid;
                cell.state.refresh_status();
                return Ok(cell.state.phase);
            }
            cell.state.phase = SubmissionPhase::Submitting;
            cell.state.is_saving = true;
            cell.state.refresh_status();
            let request = EditPostRequest {
                title: cell.state.title.value.clone(),
                body: cell.state.body.value.clone(),
                token,
            };
            (cell.save.begin(), cell.state.id.clone(), request)
        };

        let outcome = ticket
            .run(self.inner.ctx.api().edit_post(&id, &request))
            .await;

        let mut cell = lock(&self.inner.cell);
        if !cell.save.settle(&ticket) {
            return Ok(cell.state.phase);
        }
        cell.state.is_saving = false;
        cell.state.phase = match outcome {
            Outcome::Completed(()) => {
                info!(post = %id, "post updated");
                cell.state.title.prev_saved_value = request.title;
                cell.state.body.prev_saved_value = request.body;
                self.inner.ctx.session().flash(POST_UPDATED);
                SubmissionPhase::Settled
            }
            Outcome::Failed(ClientError::Permission(_)) => {
                self.inner.ctx.session().flash(EDIT_FORBIDDEN);
                cell.state.redirect = Some(Route::Home);
                SubmissionPhase::Failed
            }
            Outcome::Failed(_) | Outcome::Cancelled => SubmissionPhase::Failed,
        };
        cell.state.refresh_status();
        Ok(cell.state.phase)
    }
}
