//! Live search overlay.

use std::sync::{Arc, Mutex, Weak};

use shared::models::Post;
use tracing::debug;

use super::{FeatureContext, lock};
use crate::{
    lifecycle::{Debouncer, Outcome, RequestScope, RequestSlot},
    session::SessionAction,
};

/// What the overlay body shows.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SearchShow {
    /// No term entered.
    #[default]
    Neither,
    /// Waiting for input to settle or for the backend.
    Loading,
    /// Results for the current term.
    Results,
}

/// Search overlay snapshot.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SearchState {
    /// Raw input.
    pub search_term: String,
    /// Results of the last completed search.
    pub results: Vec<Post>,
    /// Body mode.
    pub show: SearchShow,
}

#[derive(Debug)]
struct SearchCell {
    state: SearchState,
    request: RequestSlot,
}

#[derive(Debug)]
struct SearchInner {
    ctx: FeatureContext,
    cell: Mutex<SearchCell>,
    debouncer: Debouncer,
    _scope: RequestScope,
}

/// The live-search overlay.
///
/// Typing shows the loader immediately; the search itself runs once the term has
/// been stable for the configured delay.
#[derive(Debug, Clone)]
pub struct SearchOverlay {
    inner: Arc<SearchInner>,
}

impl SearchOverlay {
    /// Overlay bound to the session's search flag.
    #[must_use]
    pub fn new(ctx: &FeatureContext) -> Self {
        let scope = ctx.child_scope();
        let debouncer = Debouncer::new("search", ctx.timing().search_debounce(), scope.token());
        let cell = SearchCell {
            state: SearchState::default(),
            request: scope.slot("search"),
        };
        Self {
            inner: Arc::new(SearchInner {
                ctx: ctx.clone(),
                cell: Mutex::new(cell),
                debouncer,
                _scope: scope,
            }),
        }
    }

    /// Current snapshot.
    #[must_use]
    pub fn state(&self) -> SearchState {
        lock(&self.inner.cell).state.clone()
    }

    /// Shows the overlay.
    pub fn open(&self) {
        self.inner.ctx.session().dispatch(SessionAction::OpenSearch);
    }

    /// Updates the term and (re)arms the debounced search.
    pub fn set_term(&self, term: impl Into<String>) {
        let blank = {
            let mut cell = lock(&self.inner.cell);
            cell.state.search_term = term.into();
            let blank = cell.state.search_term.trim().is_empty();
            cell.state.show = if blank {
                cell.request.cancel();
                SearchShow::Neither
            } else {
                SearchShow::Loading
            };
            blank
        };

        if blank {
            self.inner.debouncer.cancel();
            return;
        }

        let weak: Weak<SearchInner> = Arc::downgrade(&self.inner);
        self.inner.debouncer.schedule(move || async move {
            if let Some(inner) = weak.upgrade() {
                SearchOverlay { inner }.fetch_results().await;
            }
        });
    }

    /// Sets the term and searches right away, skipping the settle delay.
    pub async fn search_now(&self, term: impl Into<String>) -> Vec<Post> {
        self.inner.debouncer.cancel();
        {
            let mut cell = lock(&self.inner.cell);
            cell.state.search_term = term.into();
            cell.state.show = SearchShow::Loading;
        }
        self.fetch_results().await;
        self.state().results
    }

    /// Handles a key press; `Escape` closes the overlay.
    pub fn key_pressed(&self, key: &str) {
        if key == "Escape" {
            self.close();
        }
    }

    /// Hides the overlay, dropping any pending or in-flight search.
    pub fn close(&self) {
        self.inner.debouncer.cancel();
        {
            let mut cell = lock(&self.inner.cell);
            cell.request.cancel();
            cell.state = SearchState::default();
        }
        self.inner.ctx.session().dispatch(SessionAction::CloseSearch);
    }

    async fn fetch_results(&self) {
        let (ticket, term) = {
            let mut cell = lock(&self.inner.cell);
            let term = cell.state.search_term.trim().to_owned();
            if term.is_empty() {
                return;
            }
            (cell.request.begin(), term)
        };
        debug!(%term, "searching");

        let outcome = ticket.run(self.inner.ctx.api().search(&term)).await;

        let mut cell = lock(&self.inner.cell);
        if !cell.request.settle(&ticket) {
            return;
        }
        if let Outcome::Completed(results) = outcome {
            cell.state.results = results;
            cell.state.show = SearchShow::Results;
        }
    }
}
