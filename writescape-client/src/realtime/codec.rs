//! Engine.IO v4 / Socket.IO v5 text framing for the default namespace.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{ClientError, ClientResult};

/// Engine.IO ping from the server.
pub const PING: &str = "2";
/// Engine.IO pong answer.
pub const PONG: &str = "3";
/// Socket.IO connect request for the default namespace.
pub const CONNECT: &str = "40";
/// Socket.IO disconnect notice for the default namespace.
pub const DISCONNECT: &str = "41";

/// Engine.IO open payload.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Handshake {
    /// Engine.IO session id.
    pub sid: String,
    /// Server ping period in milliseconds.
    pub ping_interval: u64,
    /// Grace period after a ping, in milliseconds.
    pub ping_timeout: u64,
}

/// One decoded text frame.
#[derive(Debug, Clone, PartialEq)]
pub enum Frame {
    /// Engine.IO session opened.
    Open(Handshake),
    /// Engine.IO session closed.
    Close,
    /// Engine.IO heartbeat.
    Ping,
    /// Engine.IO heartbeat answer.
    Pong,
    /// Namespace joined.
    Connect,
    /// Namespace refused.
    ConnectError(Value),
    /// Namespace left.
    Disconnect,
    /// Named event with its first argument.
    Event {
        /// Event name.
        name: String,
        /// First argument, `null` when absent.
        data: Value,
    },
    /// Anything this client does not act on.
    Ignored,
}

fn protocol_error(frame: &str) -> ClientError {
    ClientError::Realtime(format!("malformed frame: {frame:?}"))
}

/// Parses one WebSocket text message.
///
/// # Errors
/// Returns an error for empty frames and for open or event frames whose JSON is invalid.
pub fn decode(text: &str) -> ClientResult<Frame> {
    let mut chars = text.chars();
    let Some(engine) = chars.next() else {
        return Err(protocol_error(text));
    };
    let rest = chars.as_str();

    match engine {
        '0' => Ok(Frame::Open(serde_json::from_str(rest)?)),
        '1' => Ok(Frame::Close),
        '2' => Ok(Frame::Ping),
        '3' => Ok(Frame::Pong),
        '4' => decode_socket(rest).map_err(|err| match err {
            ClientError::Realtime(_) => protocol_error(text),
            other => other,
        }),
        '5' | '6' => Ok(Frame::Ignored),
        _ => Err(protocol_error(text)),
    }
}

fn decode_socket(packet: &str) -> ClientResult<Frame> {
    let mut chars = packet.chars();
    let Some(kind) = chars.next() else {
        return Err(protocol_error(packet));
    };
    let payload = skip_ack_id(skip_namespace(chars.as_str()));

    match kind {
        '0' => Ok(Frame::Connect),
        '1' => Ok(Frame::Disconnect),
        '2' => {
            let mut args: Vec<Value> = serde_json::from_str(payload)?;
            if args.is_empty() {
                return Err(protocol_error(packet));
            }
            let data = if args.len() > 1 { args.swap_remove(1) } else { Value::Null };
            match args.swap_remove(0) {
                Value::String(name) => Ok(Frame::Event { name, data }),
                _ => Err(protocol_error(packet)),
            }
        }
        '4' => Ok(Frame::ConnectError(
            serde_json::from_str(payload).unwrap_or(Value::Null),
        )),
        _ => Ok(Frame::Ignored),
    }
}

fn skip_namespace(packet: &str) -> &str {
    if packet.starts_with('/') {
        packet.split_once(',').map_or("", |(_, rest)| rest)
    } else {
        packet
    }
}

fn skip_ack_id(packet: &str) -> &str {
    packet.trim_start_matches(|c: char| c.is_ascii_digit())
}

/// Encodes `42["name",data]`.
///
/// # Errors
/// Returns an error if `data` cannot be serialized.
pub fn encode_event<T: Serialize>(name: &str, data: &T) -> ClientResult<String> {
    Ok(format!("42{}", serde_json::to_string(&(name, data))?))
}
