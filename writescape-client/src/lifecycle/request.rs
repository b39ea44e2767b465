//! Cancellation scopes and latest-only request slots.

use std::future::Future;

use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use super::epoch::{Epoch, EpochCounter};
use crate::error::{ClientError, ClientResult};

/// Lifetime of a feature controller. Every slot and debouncer created from it is
/// cancelled when the scope closes or is dropped.
#[derive(Debug)]
pub struct RequestScope {
    token: CancellationToken,
}

impl Default for RequestScope {
    fn default() -> Self {
        Self::new()
    }
}

impl RequestScope {
    /// A fresh, open scope.
    #[must_use]
    pub fn new() -> Self {
        Self {
            token: CancellationToken::new(),
        }
    }

    /// A scope that also closes when `parent` closes.
    #[must_use]
    pub fn child_of(parent: &Self) -> Self {
        Self {
            token: parent.token.child_token(),
        }
    }

    /// A new request slot owned by this scope.
    #[must_use]
    pub fn slot(&self, name: &'static str) -> RequestSlot {
        RequestSlot {
            name,
            epoch: EpochCounter::new(),
            active: None,
            scope: self.token.clone(),
        }
    }

    /// Cancels everything in flight under this scope.
    pub fn close(&self) {
        self.token.cancel();
    }

    /// Whether the scope has been closed.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.token.is_cancelled()
    }

    pub(crate) fn token(&self) -> &CancellationToken {
        &self.token
    }
}

impl Drop for RequestScope {
    fn drop(&mut self) {
        self.token.cancel();
    }
}

/// One logical request position (a submit button, a uniqueness check, a search box).
///
/// Lives inside the feature state so that triggering and applying happen under the
/// same lock: a ticket is accepted only while it is the slot's latest.
#[derive(Debug)]
pub struct RequestSlot {
    name: &'static str,
    epoch: EpochCounter,
    active: Option<CancellationToken>,
    scope: CancellationToken,
}

impl RequestSlot {
    /// Advances the epoch, cancels the previous request and hands out a ticket for the new one.
    pub fn begin(&mut self) -> RequestTicket {
        if let Some(previous) = self.active.take() {
            previous.cancel();
        }
        let epoch = self.epoch.advance();
        let token = self.scope.child_token();
        self.active = Some(token.clone());
        debug!(slot = self.name, %epoch, "request triggered");
        RequestTicket {
            slot: self.name,
            epoch,
            token,
        }
    }

    /// Cancels the in-flight request, if any, without advancing the epoch.
    pub fn cancel(&mut self) {
        if let Some(active) = self.active.take() {
            active.cancel();
        }
    }

    /// Whether `ticket` is still the latest, uncancelled request of this slot.
    #[must_use]
    pub fn accepts(&self, ticket: &RequestTicket) -> bool {
        ticket.epoch == self.epoch.current() && !ticket.token.is_cancelled()
    }

    /// Accepts `ticket` and retires it; `false` means the resolution must be dropped.
    pub fn settle(&mut self, ticket: &RequestTicket) -> bool {
        if self.accepts(ticket) {
            self.active = None;
            true
        } else {
            debug!(slot = self.name, epoch = %ticket.epoch, "discarding stale resolution");
            false
        }
    }

    /// Whether a request is currently outstanding.
    #[must_use]
    pub const fn is_pending(&self) -> bool {
        self.active.is_some()
    }

    /// The slot's epoch counter.
    #[must_use]
    pub const fn counter(&self) -> &EpochCounter {
        &self.epoch
    }
}

/// Handle for one triggered request.
#[derive(Debug, Clone)]
pub struct RequestTicket {
    slot: &'static str,
    epoch: Epoch,
    token: CancellationToken,
}

/// How a ticketed request ended.
#[derive(Debug)]
pub enum Outcome<T> {
    /// The call resolved with a value; the caller still has to [`RequestSlot::settle`].
    Completed(T),
    /// Cancelled by scope teardown, a newer request, or an explicit reset.
    Cancelled,
    /// The call failed; transport problems were already logged.
    Failed(ClientError),
}

impl<T> Outcome<T> {
    /// The resolved value, if any.
    pub fn completed(self) -> Option<T> {
        match self {
            Self::Completed(value) => Some(value),
            Self::Cancelled | Self::Failed(_) => None,
        }
    }
}

impl RequestTicket {
    /// Epoch that triggered this request.
    #[must_use]
    pub const fn epoch(&self) -> Epoch {
        self.epoch
    }

    /// Whether the request has been cancelled.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Drives `call` until it resolves or the ticket is cancelled, whichever comes first.
    pub async fn run<T, F>(&self, call: F) -> Outcome<T>
    where
        F: Future<Output = ClientResult<T>>,
    {
        tokio::select! {
            biased;
            () = self.token.cancelled() => {
                debug!(slot = self.slot, epoch = %self.epoch, "request cancelled");
                Outcome::Cancelled
            }
            result = call => match result {
                Ok(value) => Outcome::Completed(value),
                Err(err) => {
                    if err.is_silent() {
                        warn!(slot = self.slot, epoch = %self.epoch, error = %err, "there was a problem or the request was cancelled");
                    } else {
                        debug!(slot = self.slot, epoch = %self.epoch, error = %err, "request resolved with an error");
                    }
                    Outcome::Failed(err)
                }
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tokio::time::sleep;

    #[test]
    fn newer_ticket_supersedes_older_one() {
        let scope = RequestScope::new();
        let mut slot = scope.slot("search");

        let first = slot.begin();
        let second = slot.begin();

        assert!(first.is_cancelled());
        assert!(!slot.accepts(&first));
        assert!(slot.accepts(&second));
        assert!(!slot.settle(&first));
        assert!(slot.settle(&second));
        assert!(!slot.is_pending());
        assert_eq!(slot.counter().current(), second.epoch());
    }

    #[test]
    fn closing_the_scope_cancels_every_slot() {
        let scope = RequestScope::new();
        let mut a = scope.slot("a");
        let mut b = scope.slot("b");
        let ta = a.begin();
        let tb = b.begin();

        scope.close();

        assert!(scope.is_closed());
        assert!(ta.is_cancelled());
        assert!(!b.accepts(&tb));
    }

    #[test]
    fn dropping_the_scope_cancels_tickets() {
        let ticket = {
            let scope = RequestScope::new();
            let mut slot = scope.slot("profile");
            slot.begin()
        };
        assert!(ticket.is_cancelled());
    }

    #[test]
    fn child_scope_follows_parent() {
        let parent = RequestScope::new();
        let child = RequestScope::child_of(&parent);
        parent.close();
        assert!(child.is_closed());
    }

    #[tokio::test(start_paused = true)]
    async fn run_returns_cancelled_when_superseded_mid_flight() {
        let scope = RequestScope::new();
        let mut slot = scope.slot("follow");
        let ticket = slot.begin();

        let slow = ticket.run(async {
            sleep(Duration::from_secs(5)).await;
            Ok::<_, ClientError>(1)
        });
        let _newer = slot.begin();

        assert!(matches!(slow.await, Outcome::Cancelled));
    }

    #[tokio::test]
    async fn run_reports_failures() {
        let scope = RequestScope::new();
        let mut slot = scope.slot("post");
        let ticket = slot.begin();

        let outcome = ticket
            .run(async { Err::<(), _>(ClientError::NotFound("post".into())) })
            .await;
        assert!(matches!(outcome, Outcome::Failed(ClientError::NotFound(_))));

        let ticket = slot.begin();
        let outcome = ticket.run(async { Ok::<_, ClientError>("ok") }).await;
        assert_eq!(outcome.completed(), Some("ok"));
    }
}
