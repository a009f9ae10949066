//! Engine.IO v4 / Socket.IO v4 text framing.
//!
//! Only the subset used by the orders namespace is decoded: open, ping/pong,
//! close, namespace connect/disconnect/connect-error and plain events.
//! Acks and binary attachments are recognised and ignored.

use serde::Deserialize;
use serde_json::Value;

use crate::{prelude::*, Error};

pub const ENGINE_IO_VERSION: u8 = 4;

/// Engine.IO pong, the reply to a server heartbeat ping.
pub const ENGINE_PONG: &str = "3";

const DEFAULT_NAMESPACE: &str = "/";

/// Engine.IO `open` packet body.
#[derive(Deserialize, Clone, Debug, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct OpenPacket {
    pub sid: String,
    #[serde(default)]
    pub ping_interval: u64,
    #[serde(default)]
    pub ping_timeout: u64,
    #[serde(default)]
    pub max_payload: u64,
}

#[derive(Clone, Debug, PartialEq)]
pub enum Frame {
    Open(OpenPacket),
    Close,
    Ping,
    Pong,
    Noop,
    Connected {
        namespace: String,
    },
    Disconnected {
        namespace: String,
    },
    Event {
        namespace: String,
        name: String,
        payload: Value,
    },
    ConnectError {
        namespace: String,
        message: String,
    },
    /// Acks, binary packets, transport upgrades
    Ignored,
}

/// Decode one websocket text message.
pub fn decode_frame(text: &str) -> Result<Frame> {
    let mut chars = text.chars();
    let packet_type = chars
        .next()
        .ok_or_else(|| Error::MalformedFrame("empty frame".to_string()))?;
    let body = chars.as_str();

    match packet_type {
        '0' => serde_json::from_str::<OpenPacket>(body)
            .map(Frame::Open)
            .map_err(|e| Error::MalformedFrame(format!("open packet: {e}"))),
        '1' => Ok(Frame::Close),
        '2' => Ok(Frame::Ping),
        '3' => Ok(Frame::Pong),
        '4' => decode_socket_packet(body),
        '5' => Ok(Frame::Ignored),
        '6' => Ok(Frame::Noop),
        other => Err(Error::MalformedFrame(format!(
            "unknown engine packet type '{other}'"
        ))),
    }
}

fn decode_socket_packet(packet: &str) -> Result<Frame> {
    let mut chars = packet.chars();
    let packet_type = chars
        .next()
        .ok_or_else(|| Error::MalformedFrame("empty socket packet".to_string()))?;
    let rest = chars.as_str();

    // Binary event / binary ack: attachments follow in separate frames
    if matches!(packet_type, '5' | '6') {
        return Ok(Frame::Ignored);
    }

    let (namespace, rest) = split_namespace(rest);
    let rest = rest.trim_start_matches(|c: char| c.is_ascii_digit());

    match packet_type {
        '0' => Ok(Frame::Connected { namespace }),
        '1' => Ok(Frame::Disconnected { namespace }),
        '2' => {
            let (name, payload) = decode_event_args(rest)?;
            Ok(Frame::Event {
                namespace,
                name,
                payload,
            })
        }
        '3' => Ok(Frame::Ignored),
        '4' => Ok(Frame::ConnectError {
            namespace,
            message: connect_error_message(rest),
        }),
        other => Err(Error::MalformedFrame(format!(
            "unknown socket packet type '{other}'"
        ))),
    }
}

fn split_namespace(rest: &str) -> (String, &str) {
    if !rest.starts_with('/') {
        return (DEFAULT_NAMESPACE.to_string(), rest);
    }
    match rest.split_once(',') {
        Some((namespace, tail)) => (namespace.to_string(), tail),
        None => (rest.to_string(), ""),
    }
}

fn decode_event_args(data: &str) -> Result<(String, Value)> {
    let args: Vec<Value> = serde_json::from_str(data)
        .map_err(|e| Error::MalformedFrame(format!("event arguments: {e}")))?;
    let mut args = args.into_iter();
    let name = match args.next() {
        Some(Value::String(name)) => name,
        _ => return Err(Error::MalformedFrame("event without a name".to_string())),
    };
    Ok((name, args.next().unwrap_or(Value::Null)))
}

fn connect_error_message(data: &str) -> String {
    match serde_json::from_str::<Value>(data) {
        Ok(Value::Object(map)) => map
            .get("message")
            .and_then(Value::as_str)
            .unwrap_or("connection refused")
            .to_string(),
        Ok(Value::String(message)) => message,
        _ => data.to_string(),
    }
}

fn namespace_prefix(namespace: &str) -> String {
    if namespace == DEFAULT_NAMESPACE {
        String::new()
    } else {
        format!("{namespace},")
    }
}

/// Namespace connect request, e.g. `40/orders,`.
pub fn encode_connect(namespace: &str) -> String {
    format!("40{}", namespace_prefix(namespace))
}

/// Namespace disconnect, e.g. `41/orders,`.
pub fn encode_disconnect(namespace: &str) -> String {
    format!("41{}", namespace_prefix(namespace))
}

/// Event packet, e.g. `42/orders,["update_order_status",{...}]`.
pub fn encode_event(namespace: &str, name: &str, payload: Option<&Value>) -> Result<String> {
    let mut args = vec![Value::String(name.to_string())];
    if let Some(payload) = payload {
        args.push(payload.clone());
    }
    let data = serde_json::to_string(&args).map_err(|e| Error::json_parse(e.to_string()))?;
    Ok(format!("42{}{data}", namespace_prefix(namespace)))
}
