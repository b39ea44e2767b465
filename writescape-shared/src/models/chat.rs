//! Chat events relayed over the realtime channel.

use serde::{Deserialize, Serialize};

/// Socket.IO event name for messages sent by this client.
pub const CHAT_FROM_BROWSER: &str = "chatFromBrowser";
/// Socket.IO event name for messages relayed by the server.
pub const CHAT_FROM_SERVER: &str = "chatFromServer";

/// Outbound chat payload (`chatFromBrowser`).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChatSend {
    /// Message text.
    pub message: String,
    /// Sender's session token; the server resolves username and avatar from it.
    pub token: String,
}

/// Inbound chat payload (`chatFromServer`).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChatDeliver {
    /// Message text.
    pub message: String,
    /// Sender username.
    pub username: String,
    /// Sender avatar URL.
    pub avatar: String,
}

/// One entry of the in-memory chat log.
pub type ChatMessage = ChatDeliver;
