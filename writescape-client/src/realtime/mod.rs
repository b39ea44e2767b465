//! Realtime chat over Socket.IO.

pub mod chat;
pub mod codec;
pub mod transport;

pub use chat::{ChannelStatus, ChatChannel};
pub use transport::{RealtimeConnection, RealtimeConnector, SocketIoConnector};
