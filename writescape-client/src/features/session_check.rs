//! Periodic token check that ends expired sessions.

use std::{sync::Arc, time::Duration};

use tokio::{
    task::JoinHandle,
    time::{MissedTickBehavior, interval},
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::FeatureContext;
use crate::{api::WritescapeApi, session::SessionAction, session::SessionStore};

/// Flash shown when the backend no longer accepts the stored token.
pub const SESSION_EXPIRED: &str = "Your session has expired. Please log in again.";

/// Logs the user out once the backend stops accepting their token.
#[derive(Debug, Clone)]
pub struct SessionGuard {
    api: Arc<dyn WritescapeApi>,
    session: SessionStore,
    every: Duration,
}

impl SessionGuard {
    /// Guard using the configured check interval.
    #[must_use]
    pub fn new(ctx: &FeatureContext) -> Self {
        Self {
            api: Arc::clone(ctx.api()),
            session: ctx.session().clone(),
            every: ctx.timing().session_check_interval(),
        }
    }

    /// Checks the current token once. Returns `false` when the session was ended.
    pub async fn check(&self) -> bool {
        let Some(token) = self.session.token() else {
            return true;
        };

        match self.api.check_token(&token).await {
            Ok(true) => {
                debug!("session token still valid");
                true
            }
            Ok(false) => {
                // A re-login while the check was in flight keeps the new session.
                if self.session.token().as_deref() != Some(token.as_str()) {
                    return true;
                }
                info!("session token expired");
                self.session.dispatch(SessionAction::Logout);
                self.session.flash(SESSION_EXPIRED);
                false
            }
            Err(err) => {
                warn!(error = %err, "could not verify session token");
                true
            }
        }
    }

    /// Checks immediately, then on every interval, until `shutdown` fires.
    pub fn spawn(self, shutdown: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = interval(self.every);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    biased;
                    () = shutdown.cancelled() => break,
                    _ = ticker.tick() => {}
                }
                if !self.session.is_logged_in() {
                    continue;
                }
                tokio::select! {
                    biased;
                    () = shutdown.cancelled() => break,
                    _ = self.check() => {}
                }
            }
            debug!("session guard stopped");
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{api::fake::FakeApi, features::testing};

    #[tokio::test]
    async fn expired_token_logs_out_with_notice() {
        let api = Arc::new(FakeApi::new());
        let ctx = testing::logged_in(&api, "alice");
        let guard = SessionGuard::new(&ctx);

        assert!(!guard.check().await);
        assert!(!ctx.session().is_logged_in());
        assert_eq!(ctx.session().take_flash_messages(), vec![SESSION_EXPIRED]);
    }

    #[tokio::test]
    async fn transport_failure_keeps_session() {
        let api = Arc::new(FakeApi::new());
        api.script(|s| s.offline = true);
        let ctx = testing::logged_in(&api, "alice");

        assert!(SessionGuard::new(&ctx).check().await);
        assert!(ctx.session().is_logged_in());
        assert!(ctx.session().take_flash_messages().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn periodic_check_catches_later_expiry() {
        let api = Arc::new(FakeApi::with_alice());
        let ctx = testing::logged_in(&api, "alice");
        let shutdown = CancellationToken::new();
        let handle = SessionGuard::new(&ctx).spawn(shutdown.clone());

        tokio::time::sleep(Duration::from_secs(1)).await;
        assert!(ctx.session().is_logged_in());
        assert_eq!(api.count("checkToken"), 1);

        api.script(|s| s.valid_tokens.clear());
        tokio::time::sleep(ctx.timing().session_check_interval()).await;
        assert!(!ctx.session().is_logged_in());

        shutdown.cancel();
        handle.await.unwrap();
    }
}
