//! Replaceable delayed runs.

use std::{
    future::Future,
    sync::{Arc, Mutex, MutexGuard, PoisonError},
    time::Duration,
};

use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use tracing::trace;

/// State of a [`Debouncer`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum DebouncePhase {
    /// No timer armed.
    #[default]
    Idle,
    /// A timer is armed and will fire unless replaced or cancelled.
    Scheduled,
    /// The last timer elapsed and its job ran (or is running).
    Fired,
}

#[derive(Debug, Default)]
struct DebounceState {
    phase: DebouncePhase,
    generation: u64,
    pending: Option<CancellationToken>,
}

/// Delays a job until input has been quiet for `delay`.
///
/// Every [`schedule`](Self::schedule) replaces the pending job, so only the last of a
/// burst of inputs runs. A job that already fired is cancelled too when the next input
/// arrives, as is everything once the owning scope closes.
#[derive(Debug)]
pub struct Debouncer {
    name: &'static str,
    delay: Duration,
    scope: CancellationToken,
    state: Arc<Mutex<DebounceState>>,
}

fn lock(state: &Mutex<DebounceState>) -> MutexGuard<'_, DebounceState> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}

impl Debouncer {
    /// A debouncer whose timers die with `scope`.
    #[must_use]
    pub fn new(name: &'static str, delay: Duration, scope: &CancellationToken) -> Self {
        Self {
            name,
            delay,
            scope: scope.clone(),
            state: Arc::new(Mutex::new(DebounceState::default())),
        }
    }

    /// Configured quiet period.
    #[must_use]
    pub const fn delay(&self) -> Duration {
        self.delay
    }

    /// Current phase.
    #[must_use]
    pub fn phase(&self) -> DebouncePhase {
        lock(&self.state).phase
    }

    /// Arms the timer for `job`, replacing whatever was pending.
    pub fn schedule<F, Fut>(&self, job: F)
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let token = self.scope.child_token();
        let generation = {
            let mut state = lock(&self.state);
            if let Some(previous) = state.pending.replace(token.clone()) {
                previous.cancel();
            }
            state.generation = state.generation.wrapping_add(1);
            state.phase = DebouncePhase::Scheduled;
            state.generation
        };
        trace!(debouncer = self.name, generation, "scheduled");

        let state = Arc::clone(&self.state);
        let delay = self.delay;
        let name = self.name;
        tokio::spawn(async move {
            tokio::select! {
                biased;
                () = token.cancelled() => return,
                () = sleep(delay) => {}
            }
            {
                let mut current = lock(&state);
                if current.generation != generation || token.is_cancelled() {
                    return;
                }
                current.phase = DebouncePhase::Fired;
            }
            trace!(debouncer = name, generation, "fired");
            tokio::select! {
                biased;
                () = token.cancelled() => {}
                () = job() => {}
            }
        });
    }

    /// Drops the pending or running job and returns to `Idle`.
    pub fn cancel(&self) {
        let mut state = lock(&self.state);
        if let Some(pending) = state.pending.take() {
            pending.cancel();
        }
        state.generation = state.generation.wrapping_add(1);
        state.phase = DebouncePhase::Idle;
    }
}

impl Drop for Debouncer {
    fn drop(&mut self) {
        if let Some(pending) = lock(&self.state).pending.take() {
            pending.cancel();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn recorder() -> Arc<Mutex<Vec<u32>>> {
        Arc::new(Mutex::new(Vec::new()))
    }

    fn push(
        log: &Arc<Mutex<Vec<u32>>>,
        value: u32,
    ) -> impl FnOnce() -> std::future::Ready<()> + use<> {
        let log = Arc::clone(log);
        move || {
            log.lock().unwrap().push(value);
            std::future::ready(())
        }
    }

    #[tokio::test(start_paused = true)]
    async fn only_the_last_input_of_a_burst_fires() {
        let scope = CancellationToken::new();
        let debouncer = Debouncer::new("username", Duration::from_millis(800), &scope);
        let log = recorder();

        for value in 1..=3 {
            debouncer.schedule(push(&log, value));
            assert_eq!(debouncer.phase(), DebouncePhase::Scheduled);
            sleep(Duration::from_millis(300)).await;
        }
        assert!(log.lock().unwrap().is_empty());

        sleep(Duration::from_millis(600)).await;
        assert_eq!(*log.lock().unwrap(), vec![3]);
        assert_eq!(debouncer.phase(), DebouncePhase::Fired);
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_returns_to_idle_without_firing() {
        let scope = CancellationToken::new();
        let debouncer = Debouncer::new("search", Duration::from_millis(700), &scope);
        let log = recorder();

        debouncer.schedule(push(&log, 1));
        debouncer.cancel();
        sleep(Duration::from_secs(2)).await;

        assert!(log.lock().unwrap().is_empty());
        assert_eq!(debouncer.phase(), DebouncePhase::Idle);
    }

    #[tokio::test(start_paused = true)]
    async fn closing_the_scope_disposes_pending_timers() {
        let scope = CancellationToken::new();
        let debouncer = Debouncer::new("email", Duration::from_millis(800), &scope);
        let log = recorder();

        debouncer.schedule(push(&log, 7));
        scope.cancel();
        sleep(Duration::from_secs(2)).await;

        assert!(log.lock().unwrap().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn separate_inputs_each_fire_once_settled() {
        let scope = CancellationToken::new();
        let debouncer = Debouncer::new("password", Duration::from_millis(100), &scope);
        let log = recorder();

        debouncer.schedule(push(&log, 1));
        sleep(Duration::from_millis(150)).await;
        debouncer.schedule(push(&log, 2));
        sleep(Duration::from_millis(150)).await;

        assert_eq!(*log.lock().unwrap(), vec![1, 2]);
    }
}
