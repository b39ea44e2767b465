//! New-post form.

use std::sync::{Arc, Mutex};

use shared::models::CreatePostRequest;
use tracing::info;

use super::{FeatureContext, Route, lock};
use crate::{
    error::{ClientError, ClientResult},
    lifecycle::{DraftField, Outcome, RequestScope, RequestSlot, SubmissionPhase},
};

/// Title rule message.
pub const TITLE_REQUIRED: &str = "You must provide a title.";
/// Body rule message.
pub const BODY_REQUIRED: &str = "You must provide body content.";
/// Flash shown after publishing.
pub const POST_CREATED: &str = "Congrats, post was successfully created!";

/// Create-post form snapshot.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CreatePostState {
    /// Title input.
    pub title: DraftField,
    /// Body input.
    pub body: DraftField,
    /// Submit cycle.
    pub phase: SubmissionPhase,
    /// Reasons the backend gave for refusing the post.
    pub rejections: Vec<String>,
    /// Page to show once the post exists.
    pub redirect: Option<Route>,
}

impl CreatePostState {
    fn apply_rules(&mut self) -> bool {
        self.title.require(TITLE_REQUIRED);
        self.body.require(BODY_REQUIRED);
        !self.title.has_errors && !self.body.has_errors
    }
}

#[derive(Debug)]
struct CreatePostCell {
    state: CreatePostState,
    submit: RequestSlot,
}

#[derive(Debug)]
struct CreatePostInner {
    ctx: FeatureContext,
    cell: Mutex<CreatePostCell>,
    _scope: RequestScope,
}

/// The "create post" page.
#[derive(Debug, Clone)]
pub struct CreatePostForm {
    inner: Arc<CreatePostInner>,
}

impl CreatePostForm {
    /// Empty form.
    #[must_use]
    pub fn new(ctx: &FeatureContext) -> Self {
        let scope = ctx.child_scope();
        let cell = CreatePostCell {
            state: CreatePostState::default(),
            submit: scope.slot("create-post"),
        };
        Self {
            inner: Arc::new(CreatePostInner {
                ctx: ctx.clone(),
                cell: Mutex::new(cell),
                _scope: scope,
            }),
        }
    }

    /// Current snapshot.
    #[must_use]
    pub fn state(&self) -> CreatePostState {
        lock(&self.inner.cell).state.clone()
    }

    /// Updates the title and re-runs its rule.
    pub fn set_title(&self, value: impl Into<String>) {
        let mut cell = lock(&self.inner.cell);
        cell.state.title.set_value(value);
        cell.state.title.require(TITLE_REQUIRED);
        cell.state.phase = SubmissionPhase::Idle;
    }

    /// Updates the body and re-runs its rule.
    pub fn set_body(&self, value: impl Into<String>) {
        let mut cell = lock(&self.inner.cell);
        cell.state.body.set_value(value);
        cell.state.body.require(BODY_REQUIRED);
        cell.state.phase = SubmissionPhase::Idle;
    }

    /// Validates and, when both fields pass, publishes the post.
    ///
    /// # Errors
    /// [`ClientError::NotLoggedIn`] without a session; nothing is validated or sent.
    pub async fn submit(&self) -> ClientResult<SubmissionPhase> {
        let token = self
            .inner
            .ctx
            .session()
            .token()
            .ok_or(ClientError::NotLoggedIn)?;

        let (ticket, request) = {
            let mut cell = lock(&self.inner.cell);
            if !cell.state.phase.accepts_submit() {
                return Ok(cell.state.phase);
            }
            cell.state.phase = SubmissionPhase::Validating;
            cell.state.rejections.clear();
            if !cell.state.apply_rules() {
                cell.state.phase = SubmissionPhase::Invalid;
                return Ok(cell.state.phase);
            }
            cell.state.phase = SubmissionPhase::Submitting;
            let request = CreatePostRequest {
                title: cell.state.title.value.clone(),
                body: cell.state.body.value.clone(),
                token,
            };
            (cell.submit.begin(), request)
        };

        let outcome = ticket.run(self.inner.ctx.api().create_post(&request)).await;

        let mut cell = lock(&self.inner.cell);
        if !cell.submit.settle(&ticket) {
            return Ok(cell.state.phase);
        }
        cell.state.phase = match outcome {
            Outcome::Completed(id) => {
                info!(post = %id, "post created");
                self.inner.ctx.session().flash(POST_CREATED);
                cell.state.redirect = Some(Route::Post(id));
                SubmissionPhase::Settled
            }
            Outcome::Failed(ClientError::Rejected(reasons)) => {
                cell.state.rejections = reasons;
                SubmissionPhase::Failed
            }
            Outcome::Failed(_) | Outcome::Cancelled => SubmissionPhase::Failed,
        };
        Ok(cell.state.phase)
    }
}
