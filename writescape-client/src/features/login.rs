//! Login form.

use std::sync::{Arc, Mutex};

use shared::models::LoginRequest;
use tracing::info;

use super::{FeatureContext, lock};
use crate::{
    lifecycle::{Outcome, RequestScope, RequestSlot, SubmissionPhase},
    session::SessionAction,
};

/// Flash shown after a successful login.
pub const LOGIN_SUCCESS: &str = "You have successfully logged in!";
/// Flash shown when the backend refuses the credentials.
pub const LOGIN_INVALID: &str = "Invalid username or password.";

/// Login form snapshot.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoginState {
    /// Entered username.
    pub username: String,
    /// Entered password.
    pub password: String,
    /// Submit cycle.
    pub phase: SubmissionPhase,
}

#[derive(Debug)]
struct LoginCell {
    state: LoginState,
    submit: RequestSlot,
}

#[derive(Debug)]
struct LoginInner {
    ctx: FeatureContext,
    cell: Mutex<LoginCell>,
    _scope: RequestScope,
}

/// Header login form.
#[derive(Debug, Clone)]
pub struct LoginForm {
    inner: Arc<LoginInner>,
}

impl LoginForm {
    /// Fresh, empty form.
    #[must_use]
    pub fn new(ctx: &FeatureContext) -> Self {
        let scope = ctx.child_scope();
        let cell = LoginCell {
            state: LoginState::default(),
            submit: scope.slot("login"),
        };
        Self {
            inner: Arc::new(LoginInner {
                ctx: ctx.clone(),
                cell: Mutex::new(cell),
                _scope: scope,
            }),
        }
    }

    /// Current snapshot.
    #[must_use]
    pub fn state(&self) -> LoginState {
        lock(&self.inner.cell).state.clone()
    }

    /// Updates the username input.
    pub fn set_username(&self, value: impl Into<String>) {
        let mut cell = lock(&self.inner.cell);
        cell.state.username = value.into();
        cell.state.phase = SubmissionPhase::Idle;
    }

    /// Updates the password input.
    pub fn set_password(&self, value: impl Into<String>) {
        let mut cell = lock(&self.inner.cell);
        cell.state.password = value.into();
        cell.state.phase = SubmissionPhase::Idle;
    }

    /// Sends the credentials. Logs in and flashes on success; flashes on bad credentials.
    pub async fn submit(&self) -> SubmissionPhase {
        let (ticket, request) = {
            let mut cell = lock(&self.inner.cell);
            cell.state.phase = SubmissionPhase::Submitting;
            let request = LoginRequest {
                username: cell.state.username.clone(),
                password: cell.state.password.clone(),
            };
            (cell.submit.begin(), request)
        };

        let outcome = ticket.run(self.inner.ctx.api().login(&request)).await;

        let mut cell = lock(&self.inner.cell);
        if !cell.submit.settle(&ticket) {
            return cell.state.phase;
        }
        let session = self.inner.ctx.session();
        cell.state.phase = match outcome {
            Outcome::Completed(Some(user)) => {
                info!(username = %user.username, "logged in");
                session.dispatch(SessionAction::Login(user));
                session.flash(LOGIN_SUCCESS);
                cell.state.password.clear();
                SubmissionPhase::Settled
            }
            Outcome::Completed(None) => {
                session.flash(LOGIN_INVALID);
                SubmissionPhase::Failed
            }
            Outcome::Failed(_) | Outcome::Cancelled => SubmissionPhase::Failed,
        };
        cell.state.phase
    }
}
