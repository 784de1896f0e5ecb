//! Minimal Engine.IO v4 / Socket.IO v4 text framing, enough to join a room
//! and receive its events over a raw WebSocket.

use serde_json::Value;

/// Namespace connect request for the default namespace.
pub const CONNECT: &str = "40";
/// Engine.IO pong, sent in answer to a server ping.
pub const PONG: &str = "3";

#[derive(Debug, Clone, PartialEq)]
pub enum Packet {
    /// Engine.IO handshake (`0{...}`).
    Open,
    /// Engine.IO close (`1`).
    Close,
    /// Server heartbeat (`2`); must be answered with [`PONG`].
    Ping,
    Pong,
    /// Namespace connected (`40...`).
    Connected,
    /// Namespace refused (`44...`).
    ConnectError(String),
    /// Namespace disconnected by the server (`41`).
    Disconnect,
    /// Event with its JSON argument array (`42[...]`).
    Event(Value),
    Noop,
    /// Anything else, including events whose payload is not valid JSON.
    Unknown,
}

pub fn decode(frame: &str) -> Packet {
    let mut chars = frame.chars();
    match chars.next() {
        Some('0') => Packet::Open,
        Some('1') => Packet::Close,
        Some('2') => Packet::Ping,
        Some('3') => Packet::Pong,
        Some('6') => Packet::Noop,
        Some('4') => decode_socket(&frame[1..]),
        _ => Packet::Unknown,
    }
}

fn decode_socket(body: &str) -> Packet {
    let Some(kind) = body.chars().next() else {
        return Packet::Unknown;
    };
    let rest = strip_namespace_and_ack(&body[kind.len_utf8()..]);
    match kind {
        '0' => Packet::Connected,
        '1' => Packet::Disconnect,
        '2' => match serde_json::from_str::<Value>(rest) {
            Ok(v @ Value::Array(_)) => Packet::Event(v),
            _ => Packet::Unknown,
        },
        '4' => Packet::ConnectError(rest.to_string()),
        _ => Packet::Unknown,
    }
}

/// Drop an optional `/namespace,` prefix and numeric ack id.
fn strip_namespace_and_ack(s: &str) -> &str {
    let s = if s.starts_with('/') {
        s.find(',').map(|i| &s[i + 1..]).unwrap_or("")
    } else {
        s
    };
    s.trim_start_matches(|c: char| c.is_ascii_digit())
}

/// `42["name", arg]`
pub fn encode_event(name: &str, arg: &Value) -> String {
    let payload = Value::Array(vec![Value::String(name.to_string()), arg.clone()]);
    format!("42{}", payload)
}

/// Room subscription used by the bitbank stream.
pub fn join_room(room: &str) -> String {
    encode_event("join-room", &Value::String(room.to_string()))
}
