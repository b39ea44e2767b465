//! Registration form with debounced rule and availability checks.

use std::{
    future::Future,
    pin::Pin,
    sync::{Arc, LazyLock, Mutex, Weak},
};

use regex::Regex;
use shared::models::RegisterRequest;
use tracing::{debug, info};

use super::{FeatureContext, lock};
use crate::{
    error::{ClientError, ClientResult},
    lifecycle::{
        Debouncer, DraftField, Outcome, RequestScope, RequestSlot, RequestTicket, SubmissionPhase,
    },
    session::SessionAction,
};

/// Username longer than 30 characters.
pub const USERNAME_TOO_LONG: &str = "Username can not exceed 30 characters.";
/// Username with characters other than letters and digits.
pub const USERNAME_NOT_ALPHANUMERIC: &str = "Username can only contain letters and numbers.";
/// Username shorter than 3 characters.
pub const USERNAME_TOO_SHORT: &str = "Username must be at least 3 characters.";
/// Username already registered.
pub const USERNAME_TAKEN: &str = "That username is already taken!";
/// Email that does not look like an address.
pub const EMAIL_INVALID: &str = "You must provide a valid email address.";
/// Email already registered.
pub const EMAIL_TAKEN: &str = "That email is already being used!";
/// Password longer than 50 characters.
pub const PASSWORD_TOO_LONG: &str = "Password can not exceed 50 characters.";
/// Password shorter than 12 characters.
pub const PASSWORD_TOO_SHORT: &str = "Password must be at least 12 characters.";
/// Flash shown after the account is created.
pub const REGISTERED: &str = "Congrats! Welcome to your new account.";

static ALPHANUMERIC: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-zA-Z0-9]+$").expect("username pattern compiles"));
static EMAIL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\S+@\S+\.\S+$").expect("email pattern compiles"));

/// A registration field whose value must also be unused on the backend.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UniqueField {
    /// Value and rule state.
    pub field: DraftField,
    /// The backend confirmed the current value is free.
    pub is_unique: bool,
}

/// Registration form snapshot.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RegisterState {
    /// Username input.
    pub username: UniqueField,
    /// Email input.
    pub email: UniqueField,
    /// Password input.
    pub password: DraftField,
    /// Submit cycle.
    pub phase: SubmissionPhase,
    /// Reasons the backend gave for refusing the account.
    pub rejections: Vec<String>,
}

impl RegisterState {
    fn username_immediately(&mut self, value: String) {
        let field = &mut self.username.field;
        field.set_value(value);
        if field.value.chars().count() > 30 {
            field.set_error(USERNAME_TOO_LONG);
        }
        if !field.value.is_empty() && !ALPHANUMERIC.is_match(&field.value) {
            field.set_error(USERNAME_NOT_ALPHANUMERIC);
        }
    }

    /// Returns whether a uniqueness check should follow.
    fn username_after_delay(&mut self) -> bool {
        let field = &mut self.username.field;
        if field.value.chars().count() < 3 {
            field.set_error(USERNAME_TOO_SHORT);
        }
        !field.has_errors
    }

    fn email_immediately(&mut self, value: String) {
        self.email.field.set_value(value);
    }

    fn email_after_delay(&mut self) -> bool {
        let field = &mut self.email.field;
        if !EMAIL.is_match(&field.value) {
            field.set_error(EMAIL_INVALID);
        }
        !field.has_errors
    }

    fn password_immediately(&mut self, value: String) {
        let field = &mut self.password;
        field.set_value(value);
        if field.value.chars().count() > 50 {
            field.set_error(PASSWORD_TOO_LONG);
        }
    }

    fn password_after_delay(&mut self) {
        let field = &mut self.password;
        if field.value.chars().count() < 12 {
            field.set_error(PASSWORD_TOO_SHORT);
        }
    }

    fn unique_results(field: &mut UniqueField, taken: bool, message: &str) {
        field.is_unique = !taken;
        if taken {
            field.field.set_error(message);
        }
    }

    fn is_submittable(&self) -> bool {
        !self.username.field.has_errors
            && self.username.is_unique
            && !self.email.field.has_errors
            && self.email.is_unique
            && !self.password.has_errors
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Unique {
    Username,
    Email,
}

#[derive(Debug)]
struct RegisterCell {
    state: RegisterState,
    username_check: RequestSlot,
    email_check: RequestSlot,
    submit: RequestSlot,
}

impl RegisterCell {
    fn slot(&mut self, which: Unique) -> &mut RequestSlot {
        match which {
            Unique::Username => &mut self.username_check,
            Unique::Email => &mut self.email_check,
        }
    }
}

#[derive(Debug)]
struct RegisterInner {
    ctx: FeatureContext,
    cell: Mutex<RegisterCell>,
    username_timer: Debouncer,
    email_timer: Debouncer,
    password_timer: Debouncer,
    _scope: RequestScope,
}

type CheckFuture<'a> = Pin<Box<dyn Future<Output = ClientResult<bool>> + Send + 'a>>;

/// The registration form on the guest home page.
///
/// Length and charset rules run on every change. The minimum-length rules and the
/// username/email availability checks run once input has settled.
#[derive(Debug, Clone)]
pub struct RegisterForm {
    inner: Arc<RegisterInner>,
}

impl RegisterForm {
    /// Empty form.
    #[must_use]
    pub fn new(ctx: &FeatureContext) -> Self {
        let scope = ctx.child_scope();
        let delay = ctx.timing().validation_debounce();
        let cell = RegisterCell {
            state: RegisterState::default(),
            username_check: scope.slot("username-exists"),
            email_check: scope.slot("email-exists"),
            submit: scope.slot("register"),
        };
        Self {
            inner: Arc::new(RegisterInner {
                ctx: ctx.clone(),
                cell: Mutex::new(cell),
                username_timer: Debouncer::new("username", delay, scope.token()),
                email_timer: Debouncer::new("email", delay, scope.token()),
                password_timer: Debouncer::new("password", delay, scope.token()),
                _scope: scope,
            }),
        }
    }

    /// Current snapshot.
    #[must_use]
    pub fn state(&self) -> RegisterState {
        lock(&self.inner.cell).state.clone()
    }

    /// Updates the username; availability is checked once typing settles.
    pub fn set_username(&self, value: impl Into<String>) {
        let empty = {
            let mut cell = lock(&self.inner.cell);
            cell.username_check.cancel();
            cell.state.username.is_unique = false;
            cell.state.phase = SubmissionPhase::Idle;
            cell.state.username_immediately(value.into());
            cell.state.username.field.value.is_empty()
        };
        self.arm(&self.inner.username_timer, empty, |form| {
            Box::pin(async move { form.settle_unique(Unique::Username).await })
        });
    }

    /// Updates the email; availability is checked once typing settles.
    pub fn set_email(&self, value: impl Into<String>) {
        let empty = {
            let mut cell = lock(&self.inner.cell);
            cell.email_check.cancel();
            cell.state.email.is_unique = false;
            cell.state.phase = SubmissionPhase::Idle;
            cell.state.email_immediately(value.into());
            cell.state.email.field.value.is_empty()
        };
        self.arm(&self.inner.email_timer, empty, |form| {
            Box::pin(async move { form.settle_unique(Unique::Email).await })
        });
    }

    /// Updates the password.
    pub fn set_password(&self, value: impl Into<String>) {
        let empty = {
            let mut cell = lock(&self.inner.cell);
            cell.state.phase = SubmissionPhase::Idle;
            cell.state.password_immediately(value.into());
            cell.state.password.value.is_empty()
        };
        self.arm(&self.inner.password_timer, empty, |form| {
            Box::pin(async move { lock(&form.inner.cell).state.password_after_delay() })
        });
    }

    fn arm<F>(&self, timer: &Debouncer, empty: bool, job: F)
    where
        F: FnOnce(Self) -> Pin<Box<dyn Future<Output = ()> + Send>> + Send + 'static,
    {
        if empty {
            timer.cancel();
            return;
        }
        let weak: Weak<RegisterInner> = Arc::downgrade(&self.inner);
        timer.schedule(move || async move {
            if let Some(inner) = weak.upgrade() {
                job(Self { inner }).await;
            }
        });
    }

    /// Runs the delayed rules now and waits for both availability checks, skipping the
    /// settle delay. Used by non-interactive front-ends before [`submit`](Self::submit).
    pub async fn validate_now(&self) {
        self.inner.username_timer.cancel();
        self.inner.email_timer.cancel();
        self.inner.password_timer.cancel();
        lock(&self.inner.cell).state.password_after_delay();
        tokio::join!(
            self.settle_unique(Unique::Username),
            self.settle_unique(Unique::Email),
        );
    }

    async fn settle_unique(&self, which: Unique) {
        let ticket: Option<(RequestTicket, String)> = {
            let mut cell = lock(&self.inner.cell);
            let passes = match which {
                Unique::Username => cell.state.username_after_delay(),
                Unique::Email => cell.state.email_after_delay(),
            };
            let value = match which {
                Unique::Username => cell.state.username.field.value.clone(),
                Unique::Email => cell.state.email.field.value.clone(),
            };
            passes.then(|| (cell.slot(which).begin(), value))
        };
        let Some((ticket, value)) = ticket else {
            return;
        };

        let api = self.inner.ctx.api();
        let check: CheckFuture<'_> = match which {
            Unique::Username => api.username_exists(&value),
            Unique::Email => api.email_exists(&value),
        };
        let outcome = ticket.run(check).await;

        let mut cell = lock(&self.inner.cell);
        if !cell.slot(which).settle(&ticket) {
            return;
        }
        if let Outcome::Completed(taken) = outcome {
            debug!(?which, taken, "availability checked");
            match which {
                Unique::Username => {
                    RegisterState::unique_results(&mut cell.state.username, taken, USERNAME_TAKEN);
                }
                Unique::Email => {
                    RegisterState::unique_results(&mut cell.state.email, taken, EMAIL_TAKEN);
                }
            }
        }
    }

    /// Re-runs every rule and, when all pass and both values are confirmed free,
    /// creates the account and logs in.
    pub async fn submit(&self) -> SubmissionPhase {
        self.inner.username_timer.cancel();
        self.inner.email_timer.cancel();
        self.inner.password_timer.cancel();

        let (ticket, request) = {
            let mut cell = lock(&self.inner.cell);
            if !cell.state.phase.accepts_submit() {
                return cell.state.phase;
            }
            cell.state.phase = SubmissionPhase::Validating;
            cell.state.rejections.clear();

            let state = &mut cell.state;
            let username = state.username.field.value.clone();
            let email = state.email.field.value.clone();
            let password = state.password.value.clone();
            let (username_unique, email_unique) = (state.username.is_unique, state.email.is_unique);
            state.username_immediately(username);
            state.username_after_delay();
            state.email_immediately(email);
            state.email_after_delay();
            state.password_immediately(password);
            state.password_after_delay();
            state.username.is_unique = username_unique;
            state.email.is_unique = email_unique;

            if !state.is_submittable() {
                state.phase = SubmissionPhase::Invalid;
                return state.phase;
            }
            state.phase = SubmissionPhase::Submitting;
            let request = RegisterRequest {
                username: state.username.field.value.clone(),
                email: state.email.field.value.clone(),
                password: state.password.value.clone(),
            };
            (cell.submit.begin(), request)
        };

        let outcome = ticket.run(self.inner.ctx.api().register(&request)).await;

        let mut cell = lock(&self.inner.cell);
        if !cell.submit.settle(&ticket) {
            return cell.state.phase;
        }
        cell.state.phase = match outcome {
            Outcome::Completed(user) => {
                info!(username = %user.username, "account created");
                let session = self.inner.ctx.session();
                session.dispatch(SessionAction::Login(user));
                session.flash(REGISTERED);
                SubmissionPhase::Settled
            }
            Outcome::Failed(ClientError::Rejected(reasons)) => {
                cell.state.rejections = reasons;
                SubmissionPhase::Failed
            }
            Outcome::Failed(_) | Outcome::Cancelled => SubmissionPhase::Failed,
        };
        cell.state.phase
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{api::fake::FakeApi, features::testing};
    use std::time::Duration;
    use tokio::time::sleep;

    const SETTLE: Duration = Duration::from_millis(900);

    #[tokio::test(start_paused = true)]
    async fn short_username_fails_after_delay_without_check() {
        let api = Arc::new(FakeApi::new());
        let ctx = testing::context(&api);
        let form = RegisterForm::new(&ctx);

        form.set_username("ab");
        assert!(!form.state().username.field.has_errors);

        sleep(SETTLE).await;
        let username = form.state().username;
        assert!(username.field.has_errors);
        assert_eq!(username.field.message, USERNAME_TOO_SHORT);
        assert_eq!(api.count("doesUsernameExist"), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn immediate_rules_run_on_every_change() {
        let api = Arc::new(FakeApi::new());
        let ctx = testing::context(&api);
        let form = RegisterForm::new(&ctx);

        form.set_username("bad name!");
        assert_eq!(form.state().username.field.message, USERNAME_NOT_ALPHANUMERIC);

        form.set_username("a".repeat(31));
        assert_eq!(form.state().username.field.message, USERNAME_TOO_LONG);

        form.set_password("p".repeat(51));
        assert_eq!(form.state().password.message, PASSWORD_TOO_LONG);
    }

    #[tokio::test(start_paused = true)]
    async fn only_the_settled_username_is_checked() {
        let api = Arc::new(FakeApi::new());
        let ctx = testing::context(&api);
        let form = RegisterForm::new(&ctx);

        for value in ["ali", "alic", "alice"] {
            form.set_username(value);
            sleep(Duration::from_millis(300)).await;
        }
        sleep(SETTLE).await;

        assert_eq!(api.calls(), vec!["doesUsernameExist:alice"]);
        assert!(form.state().username.is_unique);
    }

    #[tokio::test(start_paused = true)]
    async fn taken_values_are_flagged() {
        let api = Arc::new(FakeApi::new());
        api.script(|s| {
            s.taken_usernames.push("alice".into());
            s.taken_emails.push("alice@example.com".into());
        });
        let ctx = testing::context(&api);
        let form = RegisterForm::new(&ctx);

        form.set_username("alice");
        form.set_email("alice@example.com");
        sleep(SETTLE).await;

        let state = form.state();
        assert_eq!(state.username.field.message, USERNAME_TAKEN);
        assert!(!state.username.is_unique);
        assert_eq!(state.email.field.message, EMAIL_TAKEN);
    }

    #[tokio::test(start_paused = true)]
    async fn invalid_email_is_reported_after_delay() {
        let api = Arc::new(FakeApi::new());
        let ctx = testing::context(&api);
        let form = RegisterForm::new(&ctx);

        form.set_email("not-an-email");
        sleep(SETTLE).await;

        assert_eq!(form.state().email.field.message, EMAIL_INVALID);
        assert_eq!(api.count("doesEmailExist"), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn submit_requires_confirmed_availability() {
        let api = Arc::new(FakeApi::new());
        let ctx = testing::context(&api);
        let form = RegisterForm::new(&ctx);

        form.set_username("carol");
        form.set_email("carol@example.com");
        form.set_password("a-long-enough-password");

        assert_eq!(form.submit().await, SubmissionPhase::Invalid);
        assert_eq!(api.count("register"), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn settled_form_registers_and_logs_in() {
        let api = Arc::new(FakeApi::new());
        let ctx = testing::context(&api);
        let form = RegisterForm::new(&ctx);

        form.set_username("carol");
        form.set_email("carol@example.com");
        form.set_password("a-long-enough-password");
        sleep(SETTLE).await;

        assert_eq!(form.submit().await, SubmissionPhase::Settled);
        assert_eq!(ctx.session().snapshot().username(), Some("carol"));
        assert_eq!(ctx.session().take_flash_messages(), vec![REGISTERED]);
    }

    #[tokio::test]
    async fn validate_now_skips_the_delay() {
        let api = Arc::new(FakeApi::new());
        let ctx = testing::context(&api);
        let form = RegisterForm::new(&ctx);

        form.set_username("dave");
        form.set_email("dave@example.com");
        form.set_password("short");
        form.validate_now().await;

        let state = form.state();
        assert!(state.username.is_unique);
        assert!(state.email.is_unique);
        assert_eq!(state.password.message, PASSWORD_TOO_SHORT);
        assert_eq!(form.submit().await, SubmissionPhase::Invalid);
    }

    #[tokio::test]
    async fn backend_rejections_are_kept() {
        let api = Arc::new(FakeApi::new());
        api.script(|s| s.register_rejection = Some(vec!["Username is taken.".into()]));
        let ctx = testing::context(&api);
        let form = RegisterForm::new(&ctx);

        form.set_username("erin");
        form.set_email("erin@example.com");
        form.set_password("a-long-enough-password");
        form.validate_now().await;

        assert_eq!(form.submit().await, SubmissionPhase::Failed);
        assert_eq!(form.state().rejections, vec!["Username is taken."]);
        assert!(!ctx.session().is_logged_in());
    }
}
