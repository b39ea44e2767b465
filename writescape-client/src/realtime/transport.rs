//! Socket.IO over WebSocket connector.

use std::{fmt::Debug, time::Duration};

use async_trait::async_trait;
use futures_util::{Sink, SinkExt, Stream, StreamExt};
use shared::models::{
    ChatDeliver, ChatSend,
    chat::{CHAT_FROM_BROWSER, CHAT_FROM_SERVER},
};
use tokio::{sync::mpsc, time::timeout};
use tokio_tungstenite::{
    connect_async,
    tungstenite::{Error as WsError, Message},
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};
use url::Url;

use super::codec::{self, CONNECT, DISCONNECT, Frame, PONG};
use crate::error::{ClientError, ClientResult};

const HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(10);

/// An established chat connection.
///
/// Dropping `outbound` or cancelling `shutdown` closes the socket; `inbound` yields
/// `None` once the connection is gone.
#[derive(Debug)]
pub struct RealtimeConnection {
    outbound: mpsc::UnboundedSender<ChatSend>,
    inbound: mpsc::UnboundedReceiver<ChatDeliver>,
    shutdown: CancellationToken,
}

impl RealtimeConnection {
    /// Bundles the channel ends of a running connection.
    #[must_use]
    pub const fn new(
        outbound: mpsc::UnboundedSender<ChatSend>,
        inbound: mpsc::UnboundedReceiver<ChatDeliver>,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            outbound,
            inbound,
            shutdown,
        }
    }

    /// Splits into sender, receiver and shutdown handle.
    #[must_use]
    pub fn into_parts(
        self,
    ) -> (
        mpsc::UnboundedSender<ChatSend>,
        mpsc::UnboundedReceiver<ChatDeliver>,
        CancellationToken,
    ) {
        (self.outbound, self.inbound, self.shutdown)
    }
}

/// Opens chat connections.
#[async_trait]
pub trait RealtimeConnector: Send + Sync + Debug {
    /// Connects and joins the chat.
    async fn connect(&self) -> ClientResult<RealtimeConnection>;
}

/// Socket.IO over WebSocket.
#[derive(Debug, Clone)]
pub struct SocketIoConnector {
    endpoint: Url,
}

impl SocketIoConnector {
    /// Connector for the Socket.IO server at `base` (http, https, ws or wss).
    ///
    /// # Errors
    /// Returns an error for other schemes or URLs that cannot carry a path.
    pub fn new(base: &Url) -> ClientResult<Self> {
        let mut endpoint = base.clone();
        let scheme = match base.scheme() {
            "http" | "ws" => "ws",
            "https" | "wss" => "wss",
            other => {
                return Err(ClientError::Realtime(format!(
                    "unsupported realtime scheme {other}"
                )));
            }
        };
        endpoint
            .set_scheme(scheme)
            .map_err(|()| ClientError::Realtime(format!("cannot use scheme {scheme}")))?;
        endpoint
            .path_segments_mut()
            .map_err(|()| ClientError::Url(url::ParseError::RelativeUrlWithCannotBeABaseBase))?
            .pop_if_empty()
            .extend(["socket.io", ""]);
        endpoint
            .query_pairs_mut()
            .clear()
            .append_pair("EIO", "4")
            .append_pair("transport", "websocket");
        Ok(Self { endpoint })
    }

    /// WebSocket URL that will be dialled.
    #[must_use]
    pub const fn endpoint(&self) -> &Url {
        &self.endpoint
    }
}

/// Waits for the Engine.IO open packet, then joins the default namespace.
async fn join_namespace<S>(socket: &mut S) -> ClientResult<()>
where
    S: Stream<Item = Result<Message, WsError>> + Sink<Message, Error = WsError> + Unpin,
{
    let mut opened = false;
    while let Some(message) = socket.next().await {
        let Message::Text(text) = message? else {
            continue;
        };
        match codec::decode(&text)? {
            Frame::Open(handshake) => {
                trace!(sid = %handshake.sid, "engine.io open");
                opened = true;
                socket.send(Message::Text(CONNECT.into())).await?;
            }
            Frame::Ping => socket.send(Message::Text(PONG.into())).await?,
            Frame::Connect if opened => return Ok(()),
            Frame::ConnectError(reason) => {
                return Err(ClientError::Realtime(format!("chat refused: {reason}")));
            }
            _ => {}
        }
    }
    Err(ClientError::Realtime("socket closed during handshake".into()))
}

#[async_trait]
impl RealtimeConnector for SocketIoConnector {
    async fn connect(&self) -> ClientResult<RealtimeConnection> {
        debug!(endpoint = %self.endpoint, "opening chat socket");
        let (mut socket, _) = timeout(HANDSHAKE_TIMEOUT, connect_async(self.endpoint.as_str()))
            .await
            .map_err(|_| ClientError::Realtime("websocket handshake timed out".into()))??;
        timeout(HANDSHAKE_TIMEOUT, join_namespace(&mut socket))
            .await
            .map_err(|_| ClientError::Realtime("socket.io handshake timed out".into()))??;
        let (mut sink, mut stream) = socket.split();
        info!("chat connected");

        let (outbound_tx, mut outbound_rx) = mpsc::unbounded_channel::<ChatSend>();
        let (inbound_tx, inbound_rx) = mpsc::unbounded_channel::<ChatDeliver>();
        let shutdown = CancellationToken::new();
        let stop = shutdown.clone();

        tokio::spawn(async move {
            loop {
                tokio::select! {
                    biased;
                    () = stop.cancelled() => {
                        let _ = sink.send(Message::Text(DISCONNECT.into())).await;
                        break;
                    }
                    outgoing = outbound_rx.recv() => {
                        let Some(outgoing) = outgoing else {
                            let _ = sink.send(Message::Text(DISCONNECT.into())).await;
                            break;
                        };
                        let sent = match codec::encode_event(CHAT_FROM_BROWSER, &outgoing) {
                            Ok(frame) => sink.send(Message::Text(frame)).await.map_err(ClientError::from),
                            Err(err) => Err(err),
                        };
                        if let Err(err) = sent {
                            warn!(error = %err, "failed to send chat message");
                            break;
                        }
                    }
                    incoming = stream.next() => {
                        let text = match incoming {
                            Some(Ok(Message::Text(text))) => text,
                            Some(Ok(Message::Close(_))) | None => break,
                            Some(Ok(_)) => continue,
                            Some(Err(err)) => {
                                warn!(error = %err, "chat socket failed");
                                break;
                            }
                        };
                        match codec::decode(&text) {
                            Ok(Frame::Ping) => {
                                if sink.send(Message::Text(PONG.into())).await.is_err() {
                                    break;
                                }
                            }
                            Ok(Frame::Event { name, data }) if name == CHAT_FROM_SERVER => {
                                match serde_json::from_value::<ChatDeliver>(data) {
                                    Ok(message) => {
                                        if inbound_tx.send(message).is_err() {
                                            break;
                                        }
                                    }
                                    Err(err) => warn!(error = %err, "ignoring malformed chat message"),
                                }
                            }
                            Ok(Frame::Close | Frame::Disconnect) => break,
                            Ok(other) => trace!(?other, "ignoring frame"),
                            Err(err) => warn!(error = %err, "ignoring undecodable frame"),
                        }
                    }
                }
            }
            let _ = sink.close().await;
            info!("chat disconnected");
        });

        Ok(RealtimeConnection::new(outbound_tx, inbound_rx, shutdown))
    }
}
