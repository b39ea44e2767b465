//! Global session state and its reducer.

use std::sync::{Arc, Mutex, PoisonError};

use shared::models::SessionUser;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use super::persistence::{SESSION_KEY, SessionStorage};
use crate::error::ClientError;

/// Snapshot of the global session.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionState {
    /// Whether a user is logged in.
    pub logged_in: bool,
    /// The logged-in user.
    pub user: Option<SessionUser>,
    /// Notifications waiting to be shown, oldest first.
    pub flash_messages: Vec<String>,
    /// Whether the search overlay is open.
    pub is_search_open: bool,
    /// Whether the chat panel is visible.
    pub is_chat_open: bool,
    /// Chat messages received while the panel was hidden.
    pub unread_chat_count: u32,
}

impl SessionState {
    /// Token of the logged-in user.
    #[must_use]
    pub fn token(&self) -> Option<&str> {
        self.user.as_ref().map(|user| user.token.as_str())
    }

    /// Username of the logged-in user.
    #[must_use]
    pub fn username(&self) -> Option<&str> {
        self.user.as_ref().map(|user| user.username.as_str())
    }
}

/// Every transition the session accepts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionAction {
    /// Stores the user and marks the session logged in.
    Login(SessionUser),
    /// Drops the user, hides chat and search, zeroes the unread counter.
    Logout,
    /// Queues a notification.
    FlashMessage(String),
    /// Shows the search overlay.
    OpenSearch,
    /// Hides the search overlay.
    CloseSearch,
    /// Flips chat visibility; showing it clears the unread counter.
    ToggleChat,
    /// Hides the chat panel.
    CloseChat,
    /// Counts one unseen chat message.
    IncrementUnreadChatCount,
    /// Marks every chat message seen.
    ClearUnreadChatCount,
}

/// Applies `action` to `state`. Pure; never performs I/O.
pub fn reduce(state: &mut SessionState, action: SessionAction) {
    match action {
        SessionAction::Login(user) => {
            state.logged_in = true;
            state.user = Some(user);
        }
        SessionAction::Logout => {
            state.logged_in = false;
            state.user = None;
            state.is_chat_open = false;
            state.is_search_open = false;
            state.unread_chat_count = 0;
        }
        SessionAction::FlashMessage(message) => state.flash_messages.push(message),
        SessionAction::OpenSearch => state.is_search_open = true,
        SessionAction::CloseSearch => state.is_search_open = false,
        SessionAction::ToggleChat => {
            state.is_chat_open = !state.is_chat_open;
            if state.is_chat_open {
                state.unread_chat_count = 0;
            }
        }
        SessionAction::CloseChat => state.is_chat_open = false,
        SessionAction::IncrementUnreadChatCount => {
            state.unread_chat_count = state.unread_chat_count.saturating_add(1);
        }
        SessionAction::ClearUnreadChatCount => state.unread_chat_count = 0,
    }
}

/// The single authoritative session, shared by every feature.
///
/// Actions are applied one at a time; observers get snapshots through
/// [`subscribe`](Self::subscribe). The logged-in user is written through to storage
/// whenever it changes, before the next action is applied, so storage always ends on
/// the last transition.
#[derive(Debug, Clone)]
pub struct SessionStore {
    state: Arc<watch::Sender<SessionState>>,
    storage: Arc<dyn SessionStorage>,
    transitions: Arc<Mutex<()>>,
}

impl SessionStore {
    /// Rebuilds the session from `storage`. Missing or unreadable data means logged out.
    pub fn rehydrate(storage: Arc<dyn SessionStorage>) -> Self {
        let user = match storage.get(SESSION_KEY) {
            Ok(Some(raw)) => match serde_json::from_str::<SessionUser>(&raw) {
                Ok(user) => Some(user),
                Err(err) => {
                    warn!(error = %err, "ignoring malformed persisted session");
                    None
                }
            },
            Ok(None) => None,
            Err(err) => {
                warn!(error = %err, "could not read persisted session");
                None
            }
        };

        if let Some(user) = &user {
            debug!(username = %user.username, "restored persisted session");
        }

        let state = SessionState {
            logged_in: user.is_some(),
            user,
            ..SessionState::default()
        };
        Self {
            state: Arc::new(watch::Sender::new(state)),
            storage,
            transitions: Arc::new(Mutex::new(())),
        }
    }

    /// Current snapshot.
    #[must_use]
    pub fn snapshot(&self) -> SessionState {
        self.state.borrow().clone()
    }

    /// Receiver that observes every applied transition.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.state.subscribe()
    }

    /// Logged-in user, if any.
    #[must_use]
    pub fn user(&self) -> Option<SessionUser> {
        self.state.borrow().user.clone()
    }

    /// Token of the logged-in user, if any.
    #[must_use]
    pub fn token(&self) -> Option<String> {
        self.state.borrow().token().map(ToOwned::to_owned)
    }

    /// Whether a user is logged in.
    #[must_use]
    pub fn is_logged_in(&self) -> bool {
        self.state.borrow().logged_in
    }

    /// Applies `action` and persists the user if the login state moved.
    pub fn dispatch(&self, action: SessionAction) {
        debug!(?action, "session dispatch");
        let _serial = self
            .transitions
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        let mut persist = None;
        self.state.send_if_modified(|state| {
            let before = state.clone();
            reduce(state, action);
            if before.logged_in != state.logged_in || before.user != state.user {
                persist = Some(state.user.clone().filter(|_| state.logged_in));
            }
            before != *state
        });

        if let Some(user) = persist {
            self.persist(user.as_ref());
        }
    }

    /// Queues `message` for the presenter.
    pub fn flash(&self, message: impl Into<String>) {
        self.dispatch(SessionAction::FlashMessage(message.into()));
    }

    /// Removes and returns every queued flash message.
    pub fn take_flash_messages(&self) -> Vec<String> {
        let mut drained = Vec::new();
        self.state.send_if_modified(|state| {
            if state.flash_messages.is_empty() {
                return false;
            }
            drained = std::mem::take(&mut state.flash_messages);
            true
        });
        drained
    }

    fn persist(&self, user: Option<&SessionUser>) {
        let result = match user {
            Some(user) => serde_json::to_string(user)
                .map_err(ClientError::from)
                .and_then(|raw| self.storage.set(SESSION_KEY, &raw)),
            None => self.storage.remove(SESSION_KEY),
        };
        match result {
            Ok(()) => info!(logged_in = user.is_some(), "session persisted"),
            Err(err) => warn!(error = %err, "failed to persist session"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::MemorySessionStorage;

    fn alice() -> SessionUser {
        SessionUser {
            username: "alice".into(),
            token: "tok-a".into(),
            avatar: "a.png".into(),
        }
    }

    fn empty_store() -> (SessionStore, Arc<MemorySessionStorage>) {
        let storage = Arc::new(MemorySessionStorage::default());
        (SessionStore::rehydrate(storage.clone()), storage)
    }

    #[test]
    fn rehydrates_logged_in_user() {
        let raw = serde_json::to_string(&alice()).unwrap();
        let storage = Arc::new(MemorySessionStorage::with_entry(SESSION_KEY, &raw));
        let store = SessionStore::rehydrate(storage);
        let state = store.snapshot();
        assert!(state.logged_in);
        assert_eq!(state.username(), Some("alice"));
    }

    #[test]
    fn malformed_storage_defaults_to_logged_out() {
        let storage = Arc::new(MemorySessionStorage::with_entry(SESSION_KEY, "{oops"));
        let store = SessionStore::rehydrate(storage);
        assert!(!store.is_logged_in());
        assert_eq!(store.user(), None);
    }

    #[test]
    fn login_and_logout_write_through_to_storage() {
        let (store, storage) = empty_store();

        store.dispatch(SessionAction::Login(alice()));
        let saved = storage.get(SESSION_KEY).unwrap().unwrap();
        assert_eq!(serde_json::from_str::<SessionUser>(&saved).unwrap(), alice());

        store.dispatch(SessionAction::Logout);
        assert_eq!(storage.get(SESSION_KEY).unwrap(), None);
        assert_eq!(store.token(), None);
    }

    #[test]
    fn logout_resets_transient_ui_flags() {
        let (store, _) = empty_store();
        store.dispatch(SessionAction::Login(alice()));
        store.dispatch(SessionAction::OpenSearch);
        store.dispatch(SessionAction::ToggleChat);
        store.dispatch(SessionAction::CloseChat);
        store.dispatch(SessionAction::IncrementUnreadChatCount);
        store.dispatch(SessionAction::ToggleChat);
        store.dispatch(SessionAction::Logout);

        let state = store.snapshot();
        assert!(!state.is_chat_open);
        assert!(!state.is_search_open);
        assert_eq!(state.unread_chat_count, 0);
    }

    #[test]
    fn opening_chat_clears_unread_but_closing_keeps_it() {
        let mut state = SessionState::default();
        reduce(&mut state, SessionAction::IncrementUnreadChatCount);
        reduce(&mut state, SessionAction::IncrementUnreadChatCount);
        assert_eq!(state.unread_chat_count, 2);

        reduce(&mut state, SessionAction::ToggleChat);
        assert!(state.is_chat_open);
        assert_eq!(state.unread_chat_count, 0);

        reduce(&mut state, SessionAction::IncrementUnreadChatCount);
        reduce(&mut state, SessionAction::ToggleChat);
        assert!(!state.is_chat_open);
        assert_eq!(state.unread_chat_count, 1);
    }

    #[test]
    fn flash_messages_are_drained_in_order() {
        let (store, _) = empty_store();
        store.flash("first");
        store.flash("second");
        assert_eq!(store.take_flash_messages(), vec!["first", "second"]);
        assert!(store.take_flash_messages().is_empty());
    }

    #[derive(Debug, Default)]
    struct SlowStorage {
        inner: MemorySessionStorage,
    }

    impl SessionStorage for SlowStorage {
        fn get(&self, key: &str) -> crate::error::ClientResult<Option<String>> {
            self.inner.get(key)
        }

        fn set(&self, key: &str, value: &str) -> crate::error::ClientResult<()> {
            std::thread::sleep(std::time::Duration::from_millis(200));
            self.inner.set(key, value)
        }

        fn remove(&self, key: &str) -> crate::error::ClientResult<()> {
            self.inner.remove(key)
        }
    }

    #[test]
    fn logout_during_slow_login_write_leaves_storage_cleared() {
        let storage = Arc::new(SlowStorage::default());
        let store = SessionStore::rehydrate(storage.clone());

        let login = {
            let store = store.clone();
            std::thread::spawn(move || store.dispatch(SessionAction::Login(alice())))
        };
        while !store.is_logged_in() {
            std::thread::yield_now();
        }
        store.dispatch(SessionAction::Logout);
        login.join().unwrap();

        assert!(!store.is_logged_in());
        assert_eq!(storage.get(SESSION_KEY).unwrap(), None);
    }

    #[tokio::test]
    async fn subscribers_observe_transitions() {
        let (store, _) = empty_store();
        let mut rx = store.subscribe();
        store.dispatch(SessionAction::Login(alice()));
        rx.changed().await.unwrap();
        assert!(rx.borrow_and_update().logged_in);

        store.dispatch(SessionAction::CloseSearch);
        assert!(!rx.has_changed().unwrap());
    }
}
