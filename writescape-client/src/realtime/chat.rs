//! Chat channel bound to the session.

use std::sync::{Arc, Mutex, Weak};

use shared::models::{ChatMessage, ChatSend};
use tokio::{
    sync::{broadcast, mpsc, watch},
    task::JoinHandle,
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::transport::RealtimeConnector;
use crate::{
    error::{ClientError, ClientResult},
    features::lock,
    session::{SessionAction, SessionStore},
};

const INBOUND_BUFFER: usize = 64;

/// Whether the chat socket is connected.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ChannelStatus {
    /// No connection.
    #[default]
    Closed,
    /// Connected and joined.
    Open,
}

#[derive(Debug)]
struct Live {
    outbound: mpsc::UnboundedSender<ChatSend>,
    shutdown: CancellationToken,
}

#[derive(Debug, Default)]
struct ChatCell {
    messages: Vec<ChatMessage>,
    connection: Option<Live>,
    generation: u64,
}

#[derive(Debug)]
struct ChatInner {
    session: SessionStore,
    connector: Arc<dyn RealtimeConnector>,
    cell: Mutex<ChatCell>,
    status: watch::Sender<ChannelStatus>,
    inbound: broadcast::Sender<ChatMessage>,
}

impl ChatInner {
    fn receive(&self, generation: u64, message: ChatMessage) {
        {
            let mut cell = lock(&self.cell);
            if cell.generation != generation {
                debug!("dropping message from a replaced connection");
                return;
            }
            cell.messages.push(message.clone());
        }
        let _ = self.inbound.send(message);
        if !self.session.snapshot().is_chat_open {
            self.session.dispatch(SessionAction::IncrementUnreadChatCount);
        }
    }

    fn disconnected(&self, generation: u64) {
        let mut cell = lock(&self.cell);
        if cell.generation == generation && cell.connection.take().is_some() {
            drop(cell);
            info!("chat connection lost");
            self.status.send_replace(ChannelStatus::Closed);
        }
    }

    fn close(&self) {
        let mut cell = lock(&self.cell);
        cell.generation += 1;
        cell.messages.clear();
        if let Some(live) = cell.connection.take() {
            live.shutdown.cancel();
            drop(cell);
            debug!("chat closed");
            self.status.send_replace(ChannelStatus::Closed);
        }
    }
}

/// The chat widget: one connection at most, an append-only message log and the
/// unread counter kept in the session.
#[derive(Debug, Clone)]
pub struct ChatChannel {
    inner: Arc<ChatInner>,
}

impl ChatChannel {
    /// Closed channel.
    #[must_use]
    pub fn new(session: SessionStore, connector: Arc<dyn RealtimeConnector>) -> Self {
        let (status, _) = watch::channel(ChannelStatus::Closed);
        let (inbound, _) = broadcast::channel(INBOUND_BUFFER);
        Self {
            inner: Arc::new(ChatInner {
                session,
                connector,
                cell: Mutex::new(ChatCell::default()),
                status,
                inbound,
            }),
        }
    }

    /// Current connection status.
    #[must_use]
    pub fn status(&self) -> ChannelStatus {
        *self.inner.status.borrow()
    }

    /// Status change notifications.
    #[must_use]
    pub fn subscribe_status(&self) -> watch::Receiver<ChannelStatus> {
        self.inner.status.subscribe()
    }

    /// Messages received from other users from now on. Local echoes are not included.
    #[must_use]
    pub fn subscribe_messages(&self) -> broadcast::Receiver<ChatMessage> {
        self.inner.inbound.subscribe()
    }

    /// Messages of the current connection, oldest first.
    #[must_use]
    pub fn messages(&self) -> Vec<ChatMessage> {
        lock(&self.inner.cell).messages.clone()
    }

    /// Connects unless already connected.
    ///
    /// # Errors
    /// [`ClientError::NotLoggedIn`] without a session, or the connector's error.
    pub async fn open(&self) -> ClientResult<()> {
        if !self.inner.session.is_logged_in() {
            return Err(ClientError::NotLoggedIn);
        }
        let generation = {
            let mut cell = lock(&self.inner.cell);
            if cell.connection.is_some() {
                return Ok(());
            }
            cell.generation += 1;
            cell.generation
        };

        let (outbound, mut inbound, shutdown) = self.inner.connector.connect().await?.into_parts();

        {
            let mut cell = lock(&self.inner.cell);
            if cell.generation != generation {
                debug!("chat was closed while connecting");
                shutdown.cancel();
                return Ok(());
            }
            cell.messages.clear();
            cell.connection = Some(Live {
                outbound,
                shutdown: shutdown.clone(),
            });
        }
        self.inner.status.send_replace(ChannelStatus::Open);

        let weak: Weak<ChatInner> = Arc::downgrade(&self.inner);
        tokio::spawn(async move {
            loop {
                let message = tokio::select! {
                    biased;
                    () = shutdown.cancelled() => break,
                    message = inbound.recv() => message,
                };
                let (Some(message), Some(inner)) = (message, weak.upgrade()) else {
                    break;
                };
                inner.receive(generation, message);
            }
            if let Some(inner) = weak.upgrade() {
                inner.disconnected(generation);
            }
        });
        Ok(())
    }

    /// Disconnects and forgets the message log.
    pub fn close(&self) {
        self.inner.close();
    }

    /// Sends `text`, echoing it locally first. Returns `false` for blank input.
    ///
    /// The echo is kept even when transmission fails.
    ///
    /// # Errors
    /// [`ClientError::NotLoggedIn`] without a session, [`ClientError::Realtime`] when the
    /// channel is closed.
    pub fn send(&self, text: &str) -> ClientResult<bool> {
        if text.trim().is_empty() {
            return Ok(false);
        }
        let user = self.inner.session.user().ok_or(ClientError::NotLoggedIn)?;

        let mut cell = lock(&self.inner.cell);
        let Some(outbound) = cell.connection.as_ref().map(|live| live.outbound.clone()) else {
            return Err(ClientError::Realtime("chat is not connected".into()));
        };
        cell.messages.push(ChatMessage {
            message: text.to_owned(),
            username: user.username,
            avatar: user.avatar,
        });
        drop(cell);

        if outbound
            .send(ChatSend {
                message: text.to_owned(),
                token: user.token,
            })
            .is_err()
        {
            warn!("chat connection closed before the message was sent");
        }
        Ok(true)
    }

    /// Shows or hides the panel.
    pub fn toggle_panel(&self) {
        self.inner.session.dispatch(SessionAction::ToggleChat);
    }

    /// Hides the panel.
    pub fn close_panel(&self) {
        self.inner.session.dispatch(SessionAction::CloseChat);
    }

    /// Opens the channel whenever the session logs in (including at startup) and closes it
    /// on logout, until `shutdown` fires.
    pub fn bind_to_session(&self, shutdown: CancellationToken) -> JoinHandle<()> {
        let chat = self.clone();
        let mut changes = self.inner.session.subscribe();
        tokio::spawn(async move {
            let mut was_logged_in = false;
            loop {
                let logged_in = changes.borrow_and_update().logged_in;
                if logged_in != was_logged_in {
                    was_logged_in = logged_in;
                    if logged_in {
                        tokio::select! {
                            biased;
                            () = shutdown.cancelled() => break,
                            opened = chat.open() => {
                                if let Err(err) = opened {
                                    warn!(error = %err, "could not open chat");
                                }
                            }
                        }
                    } else {
                        chat.close();
                    }
                }
                tokio::select! {
                    biased;
                    () = shutdown.cancelled() => break,
                    changed = changes.changed() => {
                        if changed.is_err() {
                            break;
                        }
                    }
                }
            }
            chat.close();
            debug!("chat binding stopped");
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        api::fake,
        realtime::transport::RealtimeConnection,
        session::MemorySessionStorage,
    };
    use async_trait::async_trait;
    use shared::models::ChatDeliver;

    /// Server side of one fake connection.
    #[derive(Debug)]
    struct Remote {
        sent: mpsc::UnboundedReceiver<ChatSend>,
        deliver: mpsc::UnboundedSender<ChatDeliver>,
        shutdown: CancellationToken,
    }

    #[derive(Debug, Default)]
    struct FakeConnector {
        remotes: Mutex<Vec<Remote>>,
    }

    impl FakeConnector {
        fn connections(&self) -> usize {
            lock(&self.remotes).len()
        }

        fn deliver(&self, index: usize, text: &str) {
            lock(&self.remotes)[index]
                .deliver
                .send(ChatDeliver {
                    message: text.into(),
                    username: "bob".into(),
                    avatar: "bob.png".into(),
                })
                .unwrap();
        }

        fn sent(&self, index: usize) -> Vec<ChatSend> {
            let mut remotes = lock(&self.remotes);
            let mut sent = Vec::new();
            while let Ok(message) = remotes[index].sent.try_recv() {
                sent.push(message);
            }
            sent
        }

        fn is_shut_down(&self, index: usize) -> bool {
            lock(&self.remotes)[index].shutdown.is_cancelled()
        }
    }

    #[async_trait]
    impl RealtimeConnector for FakeConnector {
        async fn connect(&self) -> ClientResult<RealtimeConnection> {
            let (outbound, sent) = mpsc::unbounded_channel();
            let (deliver, inbound) = mpsc::unbounded_channel();
            let shutdown = CancellationToken::new();
            lock(&self.remotes).push(Remote {
                sent,
                deliver,
                shutdown: shutdown.clone(),
            });
            Ok(RealtimeConnection::new(outbound, inbound, shutdown))
        }
    }

    fn session(logged_in: bool) -> SessionStore {
        let store = SessionStore::rehydrate(Arc::new(MemorySessionStorage::default()));
        if logged_in {
            store.dispatch(SessionAction::Login(fake::user("alice")));
        }
        store
    }

    async fn settle(mut done: impl FnMut() -> bool) {
        for _ in 0..100 {
            if done() {
                return;
            }
            tokio::task::yield_now().await;
        }
        panic!("condition never held");
    }

    #[tokio::test]
    async fn counts_unread_only_while_panel_hidden() {
        let connector = Arc::new(FakeConnector::default());
        let session = session(true);
        let chat = ChatChannel::new(session.clone(), connector.clone());
        chat.open().await.unwrap();
        assert_eq!(chat.status(), ChannelStatus::Open);

        for text in ["one", "two", "three"] {
            connector.deliver(0, text);
        }
        settle(|| chat.messages().len() == 3).await;
        assert_eq!(session.snapshot().unread_chat_count, 3);

        chat.toggle_panel();
        assert!(session.snapshot().is_chat_open);
        assert_eq!(session.snapshot().unread_chat_count, 0);

        connector.deliver(0, "four");
        settle(|| chat.messages().len() == 4).await;
        assert_eq!(session.snapshot().unread_chat_count, 0);

        chat.close_panel();
        connector.deliver(0, "five");
        settle(|| chat.messages().len() == 5).await;
        assert_eq!(session.snapshot().unread_chat_count, 1);
    }

    #[tokio::test]
    async fn inbound_messages_are_broadcast() {
        let connector = Arc::new(FakeConnector::default());
        let chat = ChatChannel::new(session(true), connector.clone());
        let mut incoming = chat.subscribe_messages();
        chat.open().await.unwrap();

        chat.send("mine").unwrap();
        connector.deliver(0, "theirs");
        assert_eq!(incoming.recv().await.unwrap().message, "theirs");
    }

    #[tokio::test]
    async fn send_echoes_locally_then_transmits() {
        let connector = Arc::new(FakeConnector::default());
        let chat = ChatChannel::new(session(true), connector.clone());
        chat.open().await.unwrap();

        assert!(!chat.send("   \n").unwrap());
        assert!(chat.messages().is_empty());

        assert!(chat.send("hello there").unwrap());
        let echoed = &chat.messages()[0];
        assert_eq!(echoed.message, "hello there");
        assert_eq!(echoed.username, "alice");
        assert_eq!(echoed.avatar, fake::user("alice").avatar);
        assert_eq!(
            connector.sent(0),
            vec![ChatSend {
                message: "hello there".into(),
                token: "tok-alice".into(),
            }]
        );
    }

    #[tokio::test]
    async fn sending_requires_a_connection() {
        let chat = ChatChannel::new(session(true), Arc::new(FakeConnector::default()));
        assert!(matches!(chat.send("hi"), Err(ClientError::Realtime(_))));

        let guest = ChatChannel::new(session(false), Arc::new(FakeConnector::default()));
        assert!(matches!(guest.open().await, Err(ClientError::NotLoggedIn)));
        assert!(matches!(guest.send("hi"), Err(ClientError::NotLoggedIn)));
    }

    #[tokio::test]
    async fn only_one_connection_at_a_time() {
        let connector = Arc::new(FakeConnector::default());
        let chat = ChatChannel::new(session(true), connector.clone());
        chat.open().await.unwrap();
        chat.open().await.unwrap();
        assert_eq!(connector.connections(), 1);
    }

    #[tokio::test]
    async fn messages_from_a_closed_connection_are_dropped() {
        let connector = Arc::new(FakeConnector::default());
        let chat = ChatChannel::new(session(true), connector.clone());
        chat.open().await.unwrap();
        connector.deliver(0, "before");
        settle(|| chat.messages().len() == 1).await;

        chat.close();
        assert!(connector.is_shut_down(0));
        assert!(chat.messages().is_empty());
        assert_eq!(chat.status(), ChannelStatus::Closed);

        chat.open().await.unwrap();
        let _ = lock(&connector.remotes)[0].deliver.send(ChatDeliver {
            message: "late".into(),
            username: "bob".into(),
            avatar: "bob.png".into(),
        });
        connector.deliver(1, "fresh");
        settle(|| !chat.messages().is_empty()).await;
        for _ in 0..10 {
            tokio::task::yield_now().await;
        }
        let texts: Vec<_> = chat.messages().into_iter().map(|m| m.message).collect();
        assert_eq!(texts, vec!["fresh"]);
    }

    #[tokio::test]
    async fn follows_login_and_logout() {
        let connector = Arc::new(FakeConnector::default());
        let session = session(true);
        let chat = ChatChannel::new(session.clone(), connector.clone());
        let shutdown = CancellationToken::new();
        let handle = chat.bind_to_session(shutdown.clone());

        settle(|| chat.status() == ChannelStatus::Open).await;
        assert_eq!(connector.connections(), 1);

        session.dispatch(SessionAction::ToggleChat);
        session.dispatch(SessionAction::Logout);
        settle(|| chat.status() == ChannelStatus::Closed).await;
        assert!(connector.is_shut_down(0));
        assert!(!session.snapshot().is_chat_open);

        session.dispatch(SessionAction::Login(fake::user("alice")));
        settle(|| chat.status() == ChannelStatus::Open).await;
        assert_eq!(connector.connections(), 2);

        shutdown.cancel();
        handle.await.unwrap();
        assert_eq!(chat.status(), ChannelStatus::Closed);
        assert!(connector.is_shut_down(1));
    }

    #[tokio::test]
    async fn server_disconnect_closes_channel() {
        let connector = Arc::new(FakeConnector::default());
        let chat = ChatChannel::new(session(true), connector.clone());
        chat.open().await.unwrap();

        lock(&connector.remotes).clear();
        settle(|| chat.status() == ChannelStatus::Closed).await;
    }
}
